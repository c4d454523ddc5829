//! The Drime Cloud backend.
//!
//! S3 semantics are bridged onto the remote drive API: a bucket is a
//! top-level folder in the workspace, nested keys map to nested folders,
//! and files are addressed by opaque entry ids. Drime's native content hash
//! is not MD5, so every upload tees the bytes through an MD5 hasher and
//! records the digest in the [`Md5Cache`]; metadata reads consult the cache
//! first and fall back to the native hash when no trustworthy entry exists.

mod client;

pub use client::{DrimeClient, DrimeError, RemoteEntry, DEFAULT_BASE_URL};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use digest::Digest;
use futures::StreamExt;
use md5::Md5;
use shoreline_model::types::DeleteOutcome;
use shoreline_model::{Bucket, ObjectInfo, ObjectPage, UserMetadata};
use tracing::{debug, warn};

use crate::cache::Md5Cache;
use crate::error::StoreError;
use crate::listing::paginate_keys;
use crate::provider::{
    ByteRange, ByteStream, GetObjectResult, ListParams, PutOptions, StorageProvider,
};

/// Attempts at creating/resolving a contested folder before giving up.
const FOLDER_RACE_ATTEMPTS: usize = 3;

/// Outcome of a cache migration pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Files inspected on the remote backend.
    pub scanned: u64,
    /// Files lacking a trustworthy cache entry.
    pub missing: u64,
    /// Entries actually written (zero on a dry run).
    pub written: u64,
}

/// Drime-backed storage provider.
pub struct DrimeProvider {
    client: DrimeClient,
    cache: Md5Cache,
    /// Resolved folder ids by slash-joined path (`bucket` or `bucket/dir`).
    folder_ids: DashMap<String, i64>,
    /// Keys already warned about falling back to the native hash; one
    /// warning per key per process lifetime.
    hash_warned: DashMap<String, ()>,
    readonly: bool,
}

impl DrimeProvider {
    /// Create a provider over an API client and its MD5 cache.
    #[must_use]
    pub fn new(client: DrimeClient, cache: Md5Cache, readonly: bool) -> Self {
        Self {
            client,
            cache,
            folder_ids: DashMap::new(),
            hash_warned: DashMap::new(),
            readonly,
        }
    }

    fn workspace_id(&self) -> i64 {
        self.client.workspace_id()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.readonly {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }

    /// Resolve a slash-joined folder path to its id, consulting the cache
    /// of already-resolved folders first.
    async fn resolve_folder(&self, path: &str) -> Result<Option<i64>, StoreError> {
        if let Some(id) = self.folder_ids.get(path) {
            return Ok(Some(*id));
        }

        let mut parent: Option<i64> = None;
        let mut walked = String::new();
        for component in path.split('/') {
            if !walked.is_empty() {
                walked.push('/');
            }
            walked.push_str(component);

            if let Some(id) = self.folder_ids.get(&walked) {
                parent = Some(*id);
                continue;
            }

            let found = self
                .client
                .find_child(parent, component)
                .await
                .map_err(map_remote_err)?;
            match found {
                Some(entry) if entry.is_folder() => {
                    self.folder_ids.insert(walked.clone(), entry.id);
                    parent = Some(entry.id);
                }
                _ => return Ok(None),
            }
        }
        Ok(parent)
    }

    async fn require_bucket(&self, bucket: &str) -> Result<i64, StoreError> {
        self.resolve_folder(bucket)
            .await?
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_owned()))
    }

    /// Create-or-resolve one folder under a parent, tolerating creation
    /// races: attempt-create, catch conflict, re-resolve, three attempts.
    async fn ensure_folder(
        &self,
        parent: Option<i64>,
        name: &str,
        path: &str,
    ) -> Result<i64, StoreError> {
        if let Some(id) = self.folder_ids.get(path) {
            return Ok(*id);
        }

        for _ in 0..FOLDER_RACE_ATTEMPTS {
            if let Some(entry) = self
                .client
                .find_child(parent, name)
                .await
                .map_err(map_remote_err)?
            {
                if entry.is_folder() {
                    self.folder_ids.insert(path.to_owned(), entry.id);
                    return Ok(entry.id);
                }
                return Err(StoreError::InvalidKey(
                    path.to_owned(),
                    "a file occupies this folder path".to_owned(),
                ));
            }

            match self.client.create_folder(name, parent).await {
                Ok(entry) => {
                    self.folder_ids.insert(path.to_owned(), entry.id);
                    return Ok(entry.id);
                }
                // Lost the race: loop back and re-resolve the winner's id.
                Err(DrimeError::Conflict(_)) => continue,
                Err(err) => return Err(map_remote_err(err)),
            }
        }

        Err(StoreError::Unavailable(format!(
            "folder {path:?} kept conflicting after {FOLDER_RACE_ATTEMPTS} attempts"
        )))
    }

    /// Ensure every parent folder of `key` exists under the bucket and
    /// return the immediate parent's id.
    async fn ensure_key_parents(&self, bucket: &str, key: &str) -> Result<i64, StoreError> {
        let (dirs, _) = split_key(key);
        let mut parent = self.require_bucket(bucket).await?;
        let mut path = bucket.to_owned();
        for dir in dirs {
            path.push('/');
            path.push_str(dir);
            parent = self.ensure_folder(Some(parent), dir, &path).await?;
        }
        Ok(parent)
    }

    /// Resolve a key to its remote file entry, if present.
    async fn resolve_entry(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<RemoteEntry>, StoreError> {
        let (dirs, name) = split_key(key);
        let folder_path = if dirs.is_empty() {
            bucket.to_owned()
        } else {
            format!("{bucket}/{}", dirs.join("/"))
        };

        let Some(folder_id) = self.resolve_folder(&folder_path).await? else {
            return Ok(None);
        };

        let entry = self
            .client
            .find_child(Some(folder_id), name)
            .await
            .map_err(map_remote_err)?;
        Ok(entry.filter(|entry| !entry.is_folder()))
    }

    /// Build object metadata for a remote entry, preferring the cached MD5.
    ///
    /// A cache entry is trusted only when its recorded size matches the
    /// live remote size; a stale entry is evicted and the native hash used
    /// instead, with one warning per key per process lifetime.
    async fn object_info_for(
        &self,
        bucket: &str,
        key: &str,
        entry: &RemoteEntry,
    ) -> Result<ObjectInfo, StoreError> {
        let cached = self.cache.get(self.workspace_id(), bucket, key).await?;

        let (etag, native) = match cached {
            Some(cached) if cached.size == entry.file_size => (cached.md5, false),
            Some(stale) => {
                debug!(
                    bucket,
                    key,
                    cached_size = stale.size,
                    remote_size = entry.file_size,
                    "evicting stale cache entry"
                );
                self.cache.remove(self.workspace_id(), bucket, key).await?;
                (self.native_hash_fallback(bucket, key, entry), true)
            }
            None => (self.native_hash_fallback(bucket, key, entry), true),
        };

        Ok(ObjectInfo {
            key: key.to_owned(),
            size: u64::try_from(entry.file_size).unwrap_or_default(),
            etag,
            content_type: entry
                .mime
                .clone()
                .unwrap_or_else(|| shoreline_model::types::DEFAULT_CONTENT_TYPE.to_owned()),
            last_modified: entry.updated_at.unwrap_or_else(Utc::now),
            user_metadata: UserMetadata::new(),
            etag_is_native_hash: native,
        })
    }

    fn native_hash_fallback(&self, bucket: &str, key: &str, entry: &RemoteEntry) -> String {
        let warned_key = format!("{bucket}/{key}");
        if self.hash_warned.insert(warned_key, ()).is_none() {
            warn!(
                bucket,
                key, "no cached MD5; returning the backend's native hash as ETag"
            );
        }
        if entry.hash.is_empty() {
            format!("{:032x}", entry.id)
        } else {
            entry.hash.clone()
        }
    }

    /// Recursively walk a bucket folder, returning `(key, entry)` pairs for
    /// every file, sorted by key.
    async fn collect_entries(
        &self,
        bucket: &str,
    ) -> Result<Vec<(String, RemoteEntry)>, StoreError> {
        let bucket_id = self.require_bucket(bucket).await?;

        let mut files = Vec::new();
        let mut stack: Vec<(i64, String)> = vec![(bucket_id, String::new())];
        while let Some((folder_id, prefix)) = stack.pop() {
            let children = self
                .client
                .list_children(Some(folder_id))
                .await
                .map_err(map_remote_err)?;
            for entry in children {
                let key = if prefix.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{prefix}/{}", entry.name)
                };
                if entry.is_folder() {
                    self.folder_ids.insert(format!("{bucket}/{key}"), entry.id);
                    stack.push((entry.id, key));
                } else {
                    files.push((key, entry));
                }
            }
        }

        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }

    /// Walk the remote tree and fill in missing cache entries by streaming
    /// each file through an MD5 hasher. With `dry_run`, only counts.
    ///
    /// # Errors
    ///
    /// Returns the first backend failure encountered.
    pub async fn migrate_cache(
        &self,
        bucket: Option<&str>,
        dry_run: bool,
    ) -> Result<MigrationReport, StoreError> {
        let buckets: Vec<String> = match bucket {
            Some(bucket) => vec![bucket.to_owned()],
            None => self
                .list_buckets()
                .await?
                .into_iter()
                .map(|b| b.name)
                .collect(),
        };

        let mut report = MigrationReport::default();
        for bucket in &buckets {
            for (key, entry) in self.collect_entries(bucket).await? {
                report.scanned += 1;

                let cached = self.cache.get(self.workspace_id(), bucket, &key).await?;
                if cached.is_some_and(|c| c.size == entry.file_size) {
                    continue;
                }
                report.missing += 1;
                if dry_run {
                    continue;
                }

                let body = self
                    .client
                    .download_file(entry.id)
                    .await
                    .map_err(map_remote_err)?;
                let (md5, size) = hash_stream(body).await?;
                self.cache
                    .upsert(
                        self.workspace_id(),
                        bucket,
                        &key,
                        &md5,
                        i64::try_from(size).unwrap_or_default(),
                        entry.id,
                    )
                    .await?;
                report.written += 1;
                debug!(bucket, key = %key, md5 = %md5, "cache entry migrated");
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl StorageProvider for DrimeProvider {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError> {
        let children = self
            .client
            .list_children(None)
            .await
            .map_err(map_remote_err)?;

        let mut buckets: Vec<Bucket> = children
            .into_iter()
            .filter(|entry| {
                entry.is_folder() && shoreline_model::validate_bucket_name(&entry.name).is_ok()
            })
            .map(|entry| {
                self.folder_ids.insert(entry.name.clone(), entry.id);
                Bucket {
                    name: entry.name,
                    created_at: entry.updated_at.unwrap_or_else(Utc::now),
                }
            })
            .collect();
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<Bucket, StoreError> {
        self.check_writable()?;
        if self.resolve_folder(bucket).await?.is_some() {
            return Err(StoreError::BucketAlreadyExists(bucket.to_owned()));
        }

        // A concurrent creation of the same folder resolves to the winner's
        // id and still counts as success here.
        self.ensure_folder(None, bucket, bucket).await?;
        Ok(Bucket {
            name: bucket.to_owned(),
            created_at: Utc::now(),
        })
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let bucket_id = self.require_bucket(bucket).await?;

        if !self.collect_entries(bucket).await?.is_empty() {
            return Err(StoreError::BucketNotEmpty(bucket.to_owned()));
        }

        self.client
            .delete_entries(&[bucket_id])
            .await
            .map_err(map_remote_err)?;
        self.cache.purge(self.workspace_id(), Some(bucket)).await?;

        let prefix = format!("{bucket}/");
        self.folder_ids
            .retain(|path, _| path != bucket && !path.starts_with(&prefix));
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        Ok(self.resolve_folder(bucket).await?.is_some())
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ByteStream,
        opts: PutOptions,
    ) -> Result<ObjectInfo, StoreError> {
        self.check_writable()?;
        let parent = self.ensure_key_parents(bucket, key).await?;
        let (_, name) = split_key(key);

        // Remember any entry being overwritten; last-write-wins means the
        // old entry goes away after the new upload commits.
        let previous = self.resolve_entry(bucket, key).await?;

        // Tee the upload through an MD5 hasher and a byte counter.
        let hasher = Arc::new(Mutex::new(Md5::new()));
        let counted = Arc::new(AtomicU64::new(0));
        let tee = {
            let hasher = Arc::clone(&hasher);
            let counted = Arc::clone(&counted);
            body.map(move |chunk| {
                if let Ok(chunk) = &chunk {
                    hasher.lock().expect("hasher lock").update(chunk);
                    counted.fetch_add(chunk.len() as u64, Ordering::Relaxed);
                }
                chunk
            })
        };

        let entry = self
            .client
            .upload_file(name, Some(parent), &opts.content_type, Box::pin(tee))
            .await
            .map_err(map_remote_err)?;

        let md5 = {
            let mut hasher = hasher.lock().expect("hasher lock");
            hex::encode(std::mem::take(&mut *hasher).finalize())
        };
        let size = counted.load(Ordering::Relaxed);

        if let Some(expected) = &opts.expected_md5 {
            if expected != &md5 {
                // Discard the write; the mismatch means the body is not
                // what the client intended to store.
                let _ = self.client.delete_entries(&[entry.id]).await;
                return Err(StoreError::DigestMismatch {
                    expected: expected.clone(),
                    computed: md5,
                });
            }
        }

        if let Some(previous) = previous {
            if previous.id != entry.id {
                if let Err(err) = self.client.delete_entries(&[previous.id]).await {
                    warn!(bucket, key, error = %err, "failed to remove overwritten entry");
                }
            }
        }

        // Commit the MD5 before reporting success. A failed cache write
        // does not fail the upload; the next HEAD falls back to the native
        // hash and logs the degradation.
        if let Err(err) = self
            .cache
            .upsert(
                self.workspace_id(),
                bucket,
                key,
                &md5,
                i64::try_from(size).unwrap_or_default(),
                entry.id,
            )
            .await
        {
            warn!(bucket, key, error = %err, "MD5 cache write failed; ETag degraded until re-upload");
        }

        debug!(bucket, key, size, md5 = %md5, "object uploaded");
        Ok(ObjectInfo {
            key: key.to_owned(),
            size,
            etag: md5,
            content_type: opts.content_type,
            last_modified: entry.updated_at.unwrap_or_else(Utc::now),
            user_metadata: opts.user_metadata,
            etag_is_native_hash: false,
        })
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<GetObjectResult, StoreError> {
        self.require_bucket(bucket).await?;
        let entry = self
            .resolve_entry(bucket, key)
            .await?
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })?;

        let info = self.object_info_for(bucket, key, &entry).await?;
        let resolved = range.map(|r| r.resolve(info.size)).transpose()?;

        let stream = self
            .client
            .download_file(entry.id)
            .await
            .map_err(map_remote_err)?;
        let body = match resolved {
            Some((start, end)) => window_stream(stream, start, end - start + 1),
            None => stream,
        };

        Ok(GetObjectResult {
            info,
            range: resolved,
            body,
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, StoreError> {
        self.require_bucket(bucket).await?;
        let entry = self
            .resolve_entry(bucket, key)
            .await?
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: bucket.to_owned(),
                key: key.to_owned(),
            })?;
        self.object_info_for(bucket, key, &entry).await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        self.require_bucket(bucket).await?;

        // Remote first, then the cache entry; a dangling cache entry for a
        // missing remote file is harmless and self-heals on the next stat.
        if let Some(entry) = self.resolve_entry(bucket, key).await? {
            self.client
                .delete_entries(&[entry.id])
                .await
                .map_err(map_remote_err)?;
        }
        self.cache.remove(self.workspace_id(), bucket, key).await?;
        debug!(bucket, key, "object deleted");
        Ok(())
    }

    async fn delete_objects(
        &self,
        bucket: &str,
        keys: &[String],
    ) -> Result<Vec<DeleteOutcome>, StoreError> {
        self.check_writable()?;
        self.require_bucket(bucket).await?;

        let mut outcomes = Vec::with_capacity(keys.len());
        for key in keys {
            match self.delete_object(bucket, key).await {
                Ok(()) => outcomes.push(DeleteOutcome::Deleted { key: key.clone() }),
                Err(err) => outcomes.push(DeleteOutcome::Failed {
                    key: key.clone(),
                    code: "InternalError".to_owned(),
                    message: err.to_string(),
                }),
            }
        }
        Ok(outcomes)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<ObjectInfo, StoreError> {
        self.check_writable()?;

        if src_bucket == dst_bucket && src_key == dst_key {
            // Same-key copy only refreshes metadata.
            return self.head_object(src_bucket, src_key).await;
        }

        self.require_bucket(src_bucket).await?;
        let src_entry = self
            .resolve_entry(src_bucket, src_key)
            .await?
            .ok_or_else(|| StoreError::ObjectNotFound {
                bucket: src_bucket.to_owned(),
                key: src_key.to_owned(),
            })?;

        let cached = self.cache.get(self.workspace_id(), src_bucket, src_key).await?;
        let trusted_md5 = cached
            .filter(|c| c.size == src_entry.file_size)
            .map(|c| c.md5);

        if let Some(md5) = trusted_md5 {
            // Server-side copy: the source MD5 is known good, so no bytes
            // need to move through the gateway.
            let dst_parent = self.ensure_key_parents(dst_bucket, dst_key).await?;
            let (_, dst_name) = split_key(dst_key);

            let previous = self.resolve_entry(dst_bucket, dst_key).await?;
            let mut copied = self
                .client
                .duplicate_entry(src_entry.id, Some(dst_parent))
                .await
                .map_err(map_remote_err)?;
            if copied.name != dst_name {
                copied = self
                    .client
                    .rename_entry(copied.id, dst_name)
                    .await
                    .map_err(map_remote_err)?;
            }
            if let Some(previous) = previous {
                if previous.id != copied.id {
                    let _ = self.client.delete_entries(&[previous.id]).await;
                }
            }

            self.cache
                .upsert(
                    self.workspace_id(),
                    dst_bucket,
                    dst_key,
                    &md5,
                    src_entry.file_size,
                    copied.id,
                )
                .await?;

            return Ok(ObjectInfo {
                key: dst_key.to_owned(),
                size: u64::try_from(src_entry.file_size).unwrap_or_default(),
                etag: md5,
                content_type: src_entry
                    .mime
                    .clone()
                    .unwrap_or_else(|| shoreline_model::types::DEFAULT_CONTENT_TYPE.to_owned()),
                last_modified: copied.updated_at.unwrap_or_else(Utc::now),
                user_metadata: UserMetadata::new(),
                etag_is_native_hash: false,
            });
        }

        // No trustworthy MD5: stream down and back up, recomputing the
        // digest from the bytes actually stored.
        let source = self.get_object(src_bucket, src_key, None).await?;
        self.put_object(
            dst_bucket,
            dst_key,
            source.body,
            PutOptions {
                content_type: source.info.content_type.clone(),
                user_metadata: source.info.user_metadata.clone(),
                expected_md5: None,
            },
        )
        .await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        params: &ListParams,
    ) -> Result<ObjectPage, StoreError> {
        let entries = self.collect_entries(bucket).await?;
        let keys: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
        let page = paginate_keys(
            keys,
            &params.prefix,
            &params.delimiter,
            &params.start_after,
            params.max_keys,
        );

        let mut objects = Vec::with_capacity(page.keys.len());
        for key in &page.keys {
            let entry = entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, entry)| entry)
                .ok_or_else(|| StoreError::Internal("listed key vanished".to_owned()))?;
            objects.push(self.object_info_for(bucket, key, entry).await?);
        }

        Ok(ObjectPage {
            objects,
            common_prefixes: page.common_prefixes,
            is_truncated: page.is_truncated,
            next_key: page.next_key,
        })
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }
}

/// Split a key into its folder components and final name.
fn split_key(key: &str) -> (Vec<&str>, &str) {
    let mut components: Vec<&str> = key.split('/').filter(|c| !c.is_empty()).collect();
    let name = components.pop().unwrap_or(key);
    (components, name)
}

/// Map client errors onto the provider taxonomy.
fn map_remote_err(err: DrimeError) -> StoreError {
    if err.is_transient() {
        StoreError::Unavailable(err.to_string())
    } else {
        match err {
            DrimeError::NotFound(message) => StoreError::Internal(format!(
                "remote entry disappeared mid-operation: {message}"
            )),
            other => StoreError::Internal(other.to_string()),
        }
    }
}

/// Window a stream to `len` bytes starting at byte `skip`.
fn window_stream(stream: ByteStream, skip: u64, len: u64) -> ByteStream {
    let mut to_skip = skip;
    let mut remaining = len;
    stream
        .filter_map(move |chunk| {
            let result = match chunk {
                Err(err) => Some(Err(err)),
                Ok(chunk) => {
                    let mut chunk = chunk;
                    if to_skip >= chunk.len() as u64 {
                        to_skip -= chunk.len() as u64;
                        None
                    } else {
                        if to_skip > 0 {
                            chunk = chunk.slice(usize::try_from(to_skip).unwrap_or(usize::MAX)..);
                            to_skip = 0;
                        }
                        if remaining == 0 {
                            None
                        } else {
                            if (chunk.len() as u64) > remaining {
                                chunk =
                                    chunk.slice(..usize::try_from(remaining).unwrap_or(usize::MAX));
                            }
                            remaining -= chunk.len() as u64;
                            Some(Ok(chunk))
                        }
                    }
                }
            };
            async move { result }
        })
        .boxed()
}

/// Drain a stream, returning its hex MD5 and byte count.
async fn hash_stream(mut stream: ByteStream) -> Result<(String, u64), StoreError> {
    let mut hasher = Md5::new();
    let mut size: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(StoreError::Io)?;
        hasher.update(&chunk);
        size += chunk.len() as u64;
    }
    Ok((hex::encode(hasher.finalize()), size))
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::stream;

    use crate::provider::collect_stream;

    use super::*;

    fn chunks(parts: &[&'static [u8]]) -> ByteStream {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p)))
                .collect::<Vec<std::io::Result<Bytes>>>(),
        )
        .boxed()
    }

    #[test]
    fn test_should_split_keys_into_folders_and_name() {
        assert_eq!(split_key("a.txt"), (vec![], "a.txt"));
        assert_eq!(split_key("a/b/c.txt"), (vec!["a", "b"], "c.txt"));
    }

    #[tokio::test]
    async fn test_should_window_streams_across_chunk_boundaries() {
        let body = window_stream(chunks(&[b"0123", b"4567", b"89"]), 2, 5);
        assert_eq!(collect_stream(body).await.unwrap(), b"23456");

        let body = window_stream(chunks(&[b"0123", b"4567", b"89"]), 0, 10);
        assert_eq!(collect_stream(body).await.unwrap(), b"0123456789");

        let body = window_stream(chunks(&[b"0123456789"]), 7, 3);
        assert_eq!(collect_stream(body).await.unwrap(), b"789");
    }

    #[tokio::test]
    async fn test_should_hash_streams_incrementally() {
        let (md5, size) = hash_stream(chunks(&[b"H", b"i"])).await.unwrap();
        assert_eq!(md5, "c1a5298f939e87e8f962a5edfc206918");
        assert_eq!(size, 2);
    }

    #[test]
    fn test_should_map_transient_errors_to_unavailable() {
        let err = map_remote_err(DrimeError::Api {
            status: 502,
            message: "bad gateway".to_owned(),
        });
        assert!(matches!(err, StoreError::Unavailable(_)));

        let err = map_remote_err(DrimeError::Conflict("dup".to_owned()));
        assert!(matches!(err, StoreError::Internal(_)));
    }
}
