//! The local filesystem backend.
//!
//! Layout under the configured data root:
//!
//! ```text
//! <root>/<bucket>/objects/<key>            payload bytes (0600)
//! <root>/<bucket>/.metadata/<key>.json     sidecar record (0600)
//! ```
//!
//! Keys containing `/` become nested directories (created on demand with
//! mode 0700). Puts are atomic: the body streams into a temp file in the
//! destination directory while an MD5 runs alongside, then fsync + rename,
//! then the sidecar takes the same temp/fsync/rename path. A payload
//! without its sidecar is a corruption signal, not a valid object.

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use digest::Digest;
use futures::StreamExt;
use md5::Md5;
use serde::{Deserialize, Serialize};
use shoreline_model::types::DeleteOutcome;
use shoreline_model::{Bucket, ObjectInfo, ObjectPage, UserMetadata};
use tokio::fs;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, warn};

use crate::error::StoreError;
use crate::listing::paginate_keys;
use crate::provider::{
    ByteRange, ByteStream, GetObjectResult, ListParams, PutOptions, StorageProvider,
};

use async_trait::async_trait;

/// Subdirectory holding payload files.
const OBJECTS_DIR: &str = "objects";

/// Subdirectory holding metadata sidecars.
const METADATA_DIR: &str = ".metadata";

/// Prefix of in-flight temp files, skipped by listings and never a valid key.
const TMP_PREFIX: &str = ".shoreline-tmp.";

#[cfg(unix)]
const DIR_MODE: u32 = 0o700;
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// The sidecar record stored beside each payload.
#[derive(Debug, Serialize, Deserialize)]
struct Sidecar {
    content_type: String,
    md5: String,
    size: u64,
    last_modified_ms: i64,
    #[serde(default)]
    user_metadata: UserMetadata,
}

/// Filesystem-backed storage provider.
#[derive(Debug)]
pub struct LocalProvider {
    root: PathBuf,
    readonly: bool,
}

impl LocalProvider {
    /// Create a provider rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error when the root cannot be created.
    pub async fn new(root: impl Into<PathBuf>, readonly: bool) -> Result<Self, StoreError> {
        let root = root.into();
        create_dir_private(&root).await?;
        debug!(root = %root.display(), readonly, "local provider initialized");
        Ok(Self { root, readonly })
    }

    fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    async fn require_bucket(&self, bucket: &str) -> Result<PathBuf, StoreError> {
        let dir = self.bucket_dir(bucket);
        if fs::try_exists(dir.join(OBJECTS_DIR))
            .await
            .map_err(StoreError::Io)?
        {
            Ok(dir)
        } else {
            Err(StoreError::BucketNotFound(bucket.to_owned()))
        }
    }

    /// Map a key onto its payload path, refusing anything that would escape
    /// the bucket directory.
    fn payload_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.bucket_dir(bucket).join(OBJECTS_DIR);
        for component in key_components(key)? {
            path.push(component);
        }
        Ok(path)
    }

    /// Map a key onto its sidecar path.
    fn sidecar_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.bucket_dir(bucket).join(METADATA_DIR);
        let components = key_components(key)?;
        let (last, parents) = components.split_last().expect("components are non-empty");
        for component in parents {
            path.push(component);
        }
        path.push(format!("{last}.json"));
        Ok(path)
    }

    async fn read_sidecar(&self, bucket: &str, key: &str) -> Result<Sidecar, StoreError> {
        let path = self.sidecar_path(bucket, key)?;
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                // The payload may still exist; that is the corruption case.
                let payload = self.payload_path(bucket, key)?;
                if fs::try_exists(&payload).await.unwrap_or(false) {
                    error!(bucket, key, "payload present but metadata sidecar missing");
                    return Err(StoreError::Internal(format!(
                        "metadata sidecar missing for {bucket}/{key}"
                    )));
                }
                return Err(StoreError::ObjectNotFound {
                    bucket: bucket.to_owned(),
                    key: key.to_owned(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        serde_json::from_slice(&raw).map_err(|err| {
            error!(bucket, key, error = %err, "metadata sidecar is unreadable");
            StoreError::Internal(format!("corrupt metadata sidecar for {bucket}/{key}"))
        })
    }

    fn object_info(&self, key: &str, sidecar: Sidecar) -> ObjectInfo {
        ObjectInfo {
            key: key.to_owned(),
            size: sidecar.size,
            etag: sidecar.md5,
            content_type: sidecar.content_type,
            last_modified: millis_to_datetime(sidecar.last_modified_ms),
            user_metadata: sidecar.user_metadata,
            etag_is_native_hash: false,
        }
    }

    /// Collect every key in the bucket, sorted lexicographically.
    async fn collect_keys(&self, bucket: &str) -> Result<Vec<String>, StoreError> {
        let objects_root = self.require_bucket(bucket).await?.join(OBJECTS_DIR);

        let mut keys = Vec::new();
        let mut stack = vec![objects_root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = fs::read_dir(&dir).await.map_err(StoreError::Io)?;
            while let Some(entry) = entries.next_entry().await.map_err(StoreError::Io)? {
                let file_type = entry.file_type().await.map_err(StoreError::Io)?;
                if file_type.is_dir() {
                    stack.push(entry.path());
                } else if file_type.is_file() {
                    let name = entry.file_name();
                    if name.to_string_lossy().starts_with(TMP_PREFIX) {
                        continue;
                    }
                    let rel = entry
                        .path()
                        .strip_prefix(&objects_root)
                        .map_err(|_| StoreError::Internal("walk escaped objects root".to_owned()))?
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join("/");
                    keys.push(rel);
                }
            }
        }

        keys.sort_unstable();
        Ok(keys)
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.readonly {
            Err(StoreError::ReadOnly)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    async fn list_buckets(&self) -> Result<Vec<Bucket>, StoreError> {
        let mut buckets = Vec::new();
        let mut entries = fs::read_dir(&self.root).await.map_err(StoreError::Io)?;
        while let Some(entry) = entries.next_entry().await.map_err(StoreError::Io)? {
            if !entry.file_type().await.map_err(StoreError::Io)?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if shoreline_model::validate_bucket_name(&name).is_err() {
                continue;
            }
            let meta = entry.metadata().await.map_err(StoreError::Io)?;
            let created = meta.created().or_else(|_| meta.modified()).ok();
            buckets.push(Bucket {
                name,
                created_at: created.map_or_else(Utc::now, DateTime::from),
            });
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    async fn create_bucket(&self, bucket: &str) -> Result<Bucket, StoreError> {
        self.check_writable()?;
        let dir = self.bucket_dir(bucket);
        if fs::try_exists(&dir).await.map_err(StoreError::Io)? {
            return Err(StoreError::BucketAlreadyExists(bucket.to_owned()));
        }
        create_dir_private(&dir).await?;
        create_dir_private(&dir.join(OBJECTS_DIR)).await?;
        create_dir_private(&dir.join(METADATA_DIR)).await?;
        debug!(bucket, "bucket created");
        Ok(Bucket {
            name: bucket.to_owned(),
            created_at: now_secs(),
        })
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let keys = self.collect_keys(bucket).await?;
        if !keys.is_empty() {
            return Err(StoreError::BucketNotEmpty(bucket.to_owned()));
        }
        fs::remove_dir_all(self.bucket_dir(bucket))
            .await
            .map_err(|err| {
                // A concurrent put can land between the emptiness check and
                // the removal; surface that as the S3 conflict it is.
                if err.kind() == std::io::ErrorKind::DirectoryNotEmpty {
                    StoreError::BucketNotEmpty(bucket.to_owned())
                } else {
                    StoreError::Io(err)
                }
            })?;
        debug!(bucket, "bucket deleted");
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StoreError> {
        fs::try_exists(self.bucket_dir(bucket).join(OBJECTS_DIR))
            .await
            .map_err(StoreError::Io)
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ByteStream,
        opts: PutOptions,
    ) -> Result<ObjectInfo, StoreError> {
        self.check_writable()?;
        self.require_bucket(bucket).await?;

        let payload_path = self.payload_path(bucket, key)?;
        let payload_dir = payload_path
            .parent()
            .ok_or_else(|| StoreError::Internal("payload path has no parent".to_owned()))?
            .to_path_buf();
        create_dir_private(&payload_dir)
            .await
            .map_err(|err| key_collision(err, key))?;

        // Stream the body into a temp file in the destination directory
        // while the MD5 runs alongside.
        let tmp_path = payload_dir.join(tmp_name());
        let mut file = open_private(&tmp_path).await.map_err(|err| key_collision(err, key))?;
        let mut hasher = Md5::new();
        let mut size: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    // Client went away mid-upload: abort cleanly.
                    drop(file);
                    let _ = fs::remove_file(&tmp_path).await;
                    warn!(bucket, key, error = %err, "upload aborted, temp removed");
                    return Err(StoreError::Io(err));
                }
            };
            hasher.update(&chunk);
            size += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                drop(file);
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        }

        file.flush().await.map_err(StoreError::Io)?;
        file.sync_all().await.map_err(StoreError::Io)?;
        drop(file);

        let md5 = hex::encode(hasher.finalize());
        if let Some(expected) = &opts.expected_md5 {
            if expected != &md5 {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::DigestMismatch {
                    expected: expected.clone(),
                    computed: md5,
                });
            }
        }

        if let Err(err) = fs::rename(&tmp_path, &payload_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            let mapped = key_collision(StoreError::Io(err), key);
            return Err(mapped);
        }

        // Sidecar follows the same temp/fsync/rename discipline.
        let last_modified_ms = Utc::now().timestamp_millis();
        let sidecar = Sidecar {
            content_type: opts.content_type.clone(),
            md5: md5.clone(),
            size,
            last_modified_ms,
            user_metadata: opts.user_metadata.clone(),
        };
        let sidecar_path = self.sidecar_path(bucket, key)?;
        write_sidecar(&sidecar_path, &sidecar).await?;

        debug!(bucket, key, size, md5 = %md5, "object stored");
        Ok(self.object_info(key, sidecar))
    }

    async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> Result<GetObjectResult, StoreError> {
        let info = self.head_object(bucket, key).await?;

        let resolved = range.map(|r| r.resolve(info.size)).transpose()?;

        let mut file = fs::File::open(self.payload_path(bucket, key)?)
            .await
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    StoreError::ObjectNotFound {
                        bucket: bucket.to_owned(),
                        key: key.to_owned(),
                    }
                } else {
                    StoreError::Io(err)
                }
            })?;

        let reader = match resolved {
            Some((start, end)) => {
                file.seek(std::io::SeekFrom::Start(start))
                    .await
                    .map_err(StoreError::Io)?;
                tokio::io::AsyncReadExt::take(file, end - start + 1)
            }
            None => tokio::io::AsyncReadExt::take(file, info.size),
        };

        Ok(GetObjectResult {
            info,
            range: resolved,
            body: ReaderStream::new(reader).boxed(),
        })
    }

    async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectInfo, StoreError> {
        self.require_bucket(bucket).await?;
        let sidecar = self.read_sidecar(bucket, key).await?;
        Ok(self.object_info(key, sidecar))
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        self.check_writable()?;
        let bucket_dir = self.require_bucket(bucket).await?;

        for (path, root) in [
            (self.payload_path(bucket, key)?, bucket_dir.join(OBJECTS_DIR)),
            (self.sidecar_path(bucket, key)?, bucket_dir.join(METADATA_DIR)),
        ] {
            match fs::remove_file(&path).await {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
            // Drop directories the key no longer needs so a future object
            // can reuse the name of a deleted "folder".
            prune_empty_dirs(path.parent(), &root).await;
        }
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
                // Absent keys report success: the batch delete is idempotent.
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
            let mut sidecar = self.read_sidecar(src_bucket, src_key).await?;
            sidecar.last_modified_ms = Utc::now().timestamp_millis();
            write_sidecar(&self.sidecar_path(src_bucket, src_key)?, &sidecar).await?;
            return Ok(self.object_info(src_key, sidecar));
        }

        let source = self.get_object(src_bucket, src_key, None).await?;
        self.require_bucket(dst_bucket).await?;
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
        let keys = self.collect_keys(bucket).await?;
        let page = paginate_keys(
            keys,
            &params.prefix,
            &params.delimiter,
            &params.start_after,
            params.max_keys,
        );

        let mut objects = Vec::with_capacity(page.keys.len());
        for key in &page.keys {
            objects.push(self.head_object(bucket, key).await?);
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

/// Remove now-empty directories between `dir` and `root`, exclusive of
/// `root`. Best-effort: a concurrent writer repopulating a directory makes
/// the removal fail and the walk stop, which is the correct outcome.
async fn prune_empty_dirs(mut dir: Option<&Path>, root: &Path) {
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        if fs::remove_dir(current).await.is_err() {
            break;
        }
        dir = current.parent();
    }
}

/// Translate filesystem name collisions into a key error.
///
/// The on-disk layout cannot hold both an object `a` and an object `a/x`:
/// one needs a file and the other a directory under the same name.
fn key_collision(err: StoreError, key: &str) -> StoreError {
    match &err {
        StoreError::Io(io)
            if matches!(
                io.kind(),
                std::io::ErrorKind::AlreadyExists
                    | std::io::ErrorKind::NotADirectory
                    | std::io::ErrorKind::IsADirectory
                    | std::io::ErrorKind::DirectoryNotEmpty
            ) =>
        {
            StoreError::InvalidKey(
                key.to_owned(),
                "key collides with an existing object path".to_owned(),
            )
        }
        _ => err,
    }
}

/// Split a key into path components, refusing traversal and empty segments.
fn key_components(key: &str) -> Result<Vec<String>, StoreError> {
    let components: Vec<String> = key.split('/').map(ToOwned::to_owned).collect();
    for component in &components {
        if component.is_empty() || component == "." || component == ".." {
            return Err(StoreError::InvalidKey(
                key.to_owned(),
                "keys must not contain empty, '.', or '..' path segments".to_owned(),
            ));
        }
    }
    Ok(components)
}

/// Generate a temp file name unique enough for a single directory.
fn tmp_name() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{TMP_PREFIX}{}.{nanos:x}", std::process::id())
}

fn now_secs() -> DateTime<Utc> {
    millis_to_datetime(Utc::now().timestamp_millis())
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Create a directory tree with owner-only permissions.
async fn create_dir_private(path: &Path) -> Result<(), StoreError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(DIR_MODE)
                .create(&path)
        })
        .await
        .map_err(|err| StoreError::Internal(err.to_string()))?
        .map_err(StoreError::Io)
    }
    #[cfg(not(unix))]
    {
        fs::create_dir_all(path).await.map_err(StoreError::Io)
    }
}

/// Open a new file for writing with owner-only permissions.
async fn open_private(path: &Path) -> Result<fs::File, StoreError> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        options.mode(FILE_MODE);
    }
    options.open(path).await.map_err(StoreError::Io)
}

/// Write a sidecar atomically: temp file, fsync, rename.
async fn write_sidecar(path: &Path, sidecar: &Sidecar) -> Result<(), StoreError> {
    let parent = path
        .parent()
        .ok_or_else(|| StoreError::Internal("sidecar path has no parent".to_owned()))?;
    create_dir_private(parent).await?;

    let tmp_path = parent.join(tmp_name());
    let mut file = open_private(&tmp_path).await?;
    let payload =
        serde_json::to_vec(sidecar).map_err(|err| StoreError::Internal(err.to_string()))?;

    if let Err(err) = file.write_all(&payload).await {
        drop(file);
        let _ = fs::remove_file(&tmp_path).await;
        return Err(err.into());
    }
    file.sync_all().await.map_err(StoreError::Io)?;
    drop(file);

    fs::rename(&tmp_path, path).await.map_err(StoreError::Io)
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use futures::stream;

    use crate::provider::{collect_stream, stream_from_bytes};

    use super::*;

    async fn provider() -> (tempfile::TempDir, LocalProvider) {
        let dir = tempfile::tempdir().expect("tempdir");
        let provider = LocalProvider::new(dir.path(), false).await.expect("provider");
        (dir, provider)
    }

    fn put_opts() -> PutOptions {
        PutOptions {
            content_type: "text/plain".to_owned(),
            ..PutOptions::default()
        }
    }

    #[tokio::test]
    async fn test_should_round_trip_put_and_get() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();

        let info = provider
            .put_object("b1", "hello.txt", stream_from_bytes(Bytes::from_static(b"Hi")), put_opts())
            .await
            .unwrap();
        assert_eq!(info.size, 2);
        assert_eq!(info.etag, "c1a5298f939e87e8f962a5edfc206918");

        let result = provider.get_object("b1", "hello.txt", None).await.unwrap();
        assert_eq!(result.info.etag, info.etag);
        assert_eq!(collect_stream(result.body).await.unwrap(), b"Hi");
    }

    #[tokio::test]
    async fn test_should_store_sidecar_with_documented_schema() {
        let (dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        provider
            .put_object("b1", "a/b.txt", stream_from_bytes(Bytes::from_static(b"xy")), put_opts())
            .await
            .unwrap();

        let raw = std::fs::read(dir.path().join("b1/.metadata/a/b.txt.json")).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        assert_eq!(value["content_type"], "text/plain");
        assert_eq!(value["size"], 2);
        assert!(value["md5"].as_str().unwrap().len() == 32);
        assert!(value["last_modified_ms"].as_i64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_should_reject_bad_expected_md5_and_discard_write() {
        let (dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();

        let err = provider
            .put_object(
                "b1",
                "bad.txt",
                stream_from_bytes(Bytes::from_static(b"data")),
                PutOptions {
                    expected_md5: Some("0".repeat(32)),
                    ..put_opts()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DigestMismatch { .. }));

        // No payload, no sidecar, no temp residue.
        assert!(!dir.path().join("b1/objects/bad.txt").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("b1/objects"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_should_abort_cleanly_on_body_error() {
        let (dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();

        let body: ByteStream = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ])
        .boxed();

        let err = provider.put_object("b1", "cut.txt", body, put_opts()).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
        assert!(!dir.path().join("b1/objects/cut.txt").exists());
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("b1/objects"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_should_overwrite_atomically() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        provider
            .put_object("b1", "k", stream_from_bytes(Bytes::from_static(b"one")), put_opts())
            .await
            .unwrap();
        let info = provider
            .put_object("b1", "k", stream_from_bytes(Bytes::from_static(b"two")), put_opts())
            .await
            .unwrap();

        let result = provider.get_object("b1", "k", None).await.unwrap();
        assert_eq!(collect_stream(result.body).await.unwrap(), b"two");
        assert_eq!(result.info.etag, info.etag);
    }

    #[tokio::test]
    async fn test_should_serve_ranges() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        provider
            .put_object("b1", "r.txt", stream_from_bytes(Bytes::from_static(b"0123456789")), put_opts())
            .await
            .unwrap();

        let result = provider
            .get_object("b1", "r.txt", Some(ByteRange::FromTo(2, 4)))
            .await
            .unwrap();
        assert_eq!(result.range, Some((2, 4)));
        assert_eq!(collect_stream(result.body).await.unwrap(), b"234");

        let result = provider
            .get_object("b1", "r.txt", Some(ByteRange::Suffix(3)))
            .await
            .unwrap();
        assert_eq!(result.range, Some((7, 9)));
        assert_eq!(collect_stream(result.body).await.unwrap(), b"789");
    }

    #[tokio::test]
    async fn test_should_report_missing_sidecar_as_corruption() {
        let (dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        provider
            .put_object("b1", "x", stream_from_bytes(Bytes::from_static(b"data")), put_opts())
            .await
            .unwrap();

        std::fs::remove_file(dir.path().join("b1/.metadata/x.json")).unwrap();
        let err = provider.head_object("b1", "x").await.unwrap_err();
        assert!(matches!(err, StoreError::Internal(_)));
    }

    #[tokio::test]
    async fn test_should_enforce_bucket_lifecycle() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        assert!(matches!(
            provider.create_bucket("b1").await.unwrap_err(),
            StoreError::BucketAlreadyExists(_)
        ));

        provider
            .put_object("b1", "k", stream_from_bytes(Bytes::from_static(b"v")), put_opts())
            .await
            .unwrap();
        assert!(matches!(
            provider.delete_bucket("b1").await.unwrap_err(),
            StoreError::BucketNotEmpty(_)
        ));
        // The failed delete left everything intact.
        assert!(provider.head_object("b1", "k").await.is_ok());

        provider.delete_object("b1", "k").await.unwrap();
        provider.delete_bucket("b1").await.unwrap();
        assert!(!provider.bucket_exists("b1").await.unwrap());
        assert!(matches!(
            provider.delete_bucket("b1").await.unwrap_err(),
            StoreError::BucketNotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_should_delete_idempotently() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        provider.delete_object("b1", "never-existed").await.unwrap();

        let outcomes = provider
            .delete_objects("b1", &["ghost.txt".to_owned()])
            .await
            .unwrap();
        assert_eq!(
            outcomes,
            vec![DeleteOutcome::Deleted { key: "ghost.txt".to_owned() }]
        );
    }

    #[tokio::test]
    async fn test_should_list_nested_keys_with_delimiter() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        for key in ["a/x", "a/y", "b", "c"] {
            provider
                .put_object("b1", key, stream_from_bytes(Bytes::from_static(b"v")), put_opts())
                .await
                .unwrap();
        }

        let page = provider
            .list_objects(
                "b1",
                &ListParams {
                    delimiter: "/".to_owned(),
                    max_keys: 1000,
                    ..ListParams::default()
                },
            )
            .await
            .unwrap();

        let keys: Vec<&str> = page.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
        assert_eq!(page.common_prefixes, vec!["a/".to_owned()]);
    }

    #[tokio::test]
    async fn test_should_free_directory_names_after_delete() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        provider
            .put_object("b1", "a/x", stream_from_bytes(Bytes::from_static(b"v")), put_opts())
            .await
            .unwrap();
        provider.delete_object("b1", "a/x").await.unwrap();

        // With "a/x" gone, nothing keeps the name "a" reserved.
        provider
            .put_object("b1", "a", stream_from_bytes(Bytes::from_static(b"v")), put_opts())
            .await
            .unwrap();
        assert!(provider.head_object("b1", "a").await.is_ok());
    }

    #[tokio::test]
    async fn test_should_reject_keys_colliding_with_existing_paths() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        provider
            .put_object("b1", "a", stream_from_bytes(Bytes::from_static(b"v")), put_opts())
            .await
            .unwrap();

        // "a" is a payload file; "a/x" would need it to be a directory.
        let err = provider
            .put_object("b1", "a/x", stream_from_bytes(Bytes::from_static(b"v")), put_opts())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_, _)));

        // The original object is untouched.
        assert!(provider.head_object("b1", "a").await.is_ok());
    }

    #[tokio::test]
    async fn test_should_paginate_consistently() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        for i in 0..10 {
            provider
                .put_object(
                    "b1",
                    &format!("key-{i:02}"),
                    stream_from_bytes(Bytes::from_static(b"v")),
                    put_opts(),
                )
                .await
                .unwrap();
        }

        let mut collected = Vec::new();
        let mut start_after = String::new();
        loop {
            let page = provider
                .list_objects(
                    "b1",
                    &ListParams {
                        start_after: start_after.clone(),
                        max_keys: 3,
                        ..ListParams::default()
                    },
                )
                .await
                .unwrap();
            collected.extend(page.objects.iter().map(|o| o.key.clone()));
            if !page.is_truncated {
                break;
            }
            start_after = page.next_key.unwrap();
        }

        let expected: Vec<String> = (0..10).map(|i| format!("key-{i:02}")).collect();
        assert_eq!(collected, expected);
    }

    #[tokio::test]
    async fn test_should_copy_between_keys_and_buckets() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("src").await.unwrap();
        provider.create_bucket("dst").await.unwrap();
        let original = provider
            .put_object("src", "a", stream_from_bytes(Bytes::from_static(b"payload")), put_opts())
            .await
            .unwrap();

        let copied = provider.copy_object("src", "a", "dst", "b").await.unwrap();
        assert_eq!(copied.etag, original.etag);
        assert_eq!(copied.content_type, "text/plain");

        let fetched = provider.get_object("dst", "b", None).await.unwrap();
        assert_eq!(collect_stream(fetched.body).await.unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_should_refuse_writes_when_readonly() {
        let dir = tempfile::tempdir().unwrap();
        let writable = LocalProvider::new(dir.path(), false).await.unwrap();
        writable.create_bucket("b1").await.unwrap();

        let readonly = LocalProvider::new(dir.path(), true).await.unwrap();
        assert!(matches!(
            readonly
                .put_object("b1", "k", stream_from_bytes(Bytes::new()), put_opts())
                .await
                .unwrap_err(),
            StoreError::ReadOnly
        ));
        assert!(matches!(
            readonly.create_bucket("b2").await.unwrap_err(),
            StoreError::ReadOnly
        ));
    }

    #[tokio::test]
    async fn test_should_reject_traversal_keys() {
        let (_dir, provider) = provider().await;
        provider.create_bucket("b1").await.unwrap();
        let err = provider
            .put_object("b1", "../escape", stream_from_bytes(Bytes::new()), put_opts())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidKey(_, _)));
    }
}
