//! Listing pagination shared by both backends.
//!
//! Providers hand this module a sorted key sequence; it applies the prefix
//! filter, rolls keys up into common prefixes at the delimiter, resumes
//! after a marker, and enforces the page size. Keys and common prefixes
//! both count toward `max_keys`, matching S3.

/// One paginated page of keys, before metadata is attached.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct KeyPage {
    /// Selected keys, in input (lexicographic) order.
    pub keys: Vec<String>,
    /// Distinct common prefixes, in first-seen (lexicographic) order.
    pub common_prefixes: Vec<String>,
    /// Whether more entries remain past this page.
    pub is_truncated: bool,
    /// The last underlying key consumed; resuming strictly after it
    /// continues the listing without duplicates.
    pub next_key: Option<String>,
}

/// Paginate a sorted key sequence.
///
/// When a delimiter groups keys into a common prefix, the whole group is
/// consumed in one step so the continuation key always points past it.
pub fn paginate_keys<I>(
    sorted_keys: I,
    prefix: &str,
    delimiter: &str,
    start_after: &str,
    max_keys: usize,
) -> KeyPage
where
    I: IntoIterator<Item = String>,
{
    let mut page = KeyPage::default();
    let mut count = 0usize;
    // The group being consumed after its common prefix was emitted.
    let mut open_group: Option<String> = None;

    for key in sorted_keys {
        if !start_after.is_empty() && key.as_str() <= start_after {
            continue;
        }

        if !key.starts_with(prefix) {
            if key.as_str() > prefix && !prefix.is_empty() {
                // Sorted input: nothing past the prefix range can match.
                break;
            }
            continue;
        }

        // Keys inside an already-emitted group only advance the cursor.
        if let Some(group) = &open_group {
            if key.starts_with(group) {
                page.next_key = Some(key);
                continue;
            }
            open_group = None;
        }

        if count >= max_keys {
            page.is_truncated = true;
            break;
        }

        if !delimiter.is_empty() {
            let rest = &key[prefix.len()..];
            if let Some(pos) = rest.find(delimiter) {
                let group = format!("{prefix}{}{delimiter}", &rest[..pos]);
                page.common_prefixes.push(group.clone());
                page.next_key = Some(key);
                open_group = Some(group);
                count += 1;
                continue;
            }
        }

        page.next_key = Some(key.clone());
        page.keys.push(key);
        count += 1;
    }

    if !page.is_truncated {
        page.next_key = None;
    }
    page
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn test_should_list_all_keys_without_options() {
        let page = paginate_keys(keys(&["a", "b", "c"]), "", "", "", 1000);
        assert_eq!(page.keys, keys(&["a", "b", "c"]));
        assert!(!page.is_truncated);
        assert!(page.next_key.is_none());
    }

    #[test]
    fn test_should_filter_by_prefix() {
        let page = paginate_keys(
            keys(&["logs/1", "logs/2", "photos/1", "z"]),
            "logs/",
            "",
            "",
            1000,
        );
        assert_eq!(page.keys, keys(&["logs/1", "logs/2"]));
    }

    #[test]
    fn test_should_group_keys_at_delimiter() {
        let page = paginate_keys(keys(&["a", "a/x", "a/y", "b"]), "", "/", "", 1000);
        assert_eq!(page.keys, keys(&["a", "b"]));
        assert_eq!(page.common_prefixes, keys(&["a/"]));
    }

    #[test]
    fn test_should_resume_after_marker() {
        let all = keys(&["a", "b", "c", "d"]);
        let page = paginate_keys(all, "", "", "b", 1000);
        assert_eq!(page.keys, keys(&["c", "d"]));
    }

    #[test]
    fn test_should_truncate_and_expose_continuation() {
        let page = paginate_keys(keys(&["a", "b", "c"]), "", "", "", 2);
        assert_eq!(page.keys, keys(&["a", "b"]));
        assert!(page.is_truncated);
        assert_eq!(page.next_key.as_deref(), Some("b"));
    }

    #[test]
    fn test_should_paginate_identically_to_unpaginated_listing() {
        let all: Vec<String> = (0..25).map(|i| format!("key-{i:02}")).collect();

        let mut collected = Vec::new();
        let mut marker = String::new();
        loop {
            let page = paginate_keys(all.clone(), "", "", &marker, 7);
            collected.extend(page.keys.clone());
            if !page.is_truncated {
                break;
            }
            marker = page.next_key.expect("truncated page has a next key");
        }

        assert_eq!(collected, all);
    }

    #[test]
    fn test_should_continue_past_consumed_groups() {
        // Page 1 consumes the whole "a/" group even though only one entry
        // (the common prefix) is emitted.
        let all = keys(&["a/x", "a/y", "a/z", "b", "c"]);
        let page = paginate_keys(all.clone(), "", "/", "", 2);
        assert_eq!(page.common_prefixes, keys(&["a/"]));
        assert_eq!(page.keys, keys(&["b"]));
        assert!(page.is_truncated);

        let marker = page.next_key.unwrap();
        let page2 = paginate_keys(all, "", "/", &marker, 2);
        assert_eq!(page2.keys, keys(&["c"]));
        assert!(page2.common_prefixes.is_empty());
        assert!(!page2.is_truncated);
    }

    #[test]
    fn test_should_count_common_prefixes_toward_max_keys() {
        let all = keys(&["a/x", "b/x", "c/x"]);
        let page = paginate_keys(all, "", "/", "", 2);
        assert_eq!(page.common_prefixes, keys(&["a/", "b/"]));
        assert!(page.is_truncated);
    }

    #[test]
    fn test_should_not_duplicate_group_prefixes() {
        let page = paginate_keys(keys(&["p/a/1", "p/a/2", "p/b/1"]), "p/", "/", "", 1000);
        assert_eq!(page.common_prefixes, keys(&["p/a/", "p/b/"]));
        assert!(page.keys.is_empty());
    }
}
