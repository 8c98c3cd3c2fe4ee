//! Reference naming for series images in local storage.

/// Registry host under which every locally produced image is stored.
pub const LOCAL_HOST: &str = "localhost";

/// Repository that holds source images while they are being chunked.
///
/// Processing is sequential, so one repository is reused for every tag of a run.
pub const TRANSIENT_REPOSITORY: &str = "localhost/tmp-chunk-src";

/// Local repository for a storage prefix (`fcos` -> `localhost/fcos`).
pub fn local_repository(prefix: &str) -> String {
    format!("{}/{}", LOCAL_HOST, prefix)
}

/// Prefix under which un-chunked originals are kept.
pub fn original_prefix(prefix: &str) -> String {
    format!("{}-orig", prefix)
}

/// `localhost/{prefix}:{index}`
pub fn series_ref(prefix: &str, index: usize) -> String {
    format!("{}:{}", local_repository(prefix), index)
}

pub fn transient_ref(tag: &str) -> String {
    format!("{}:{}", TRANSIENT_REPOSITORY, tag)
}

/// Default storage prefix derived from the last path segment of a repository.
pub fn default_prefix(repo: &str) -> String {
    let name = repo.rsplit('/').next().unwrap_or(repo);
    format!("{}-chunked", name)
}

/// Tag part of `repository:tag`, ignoring a `host:port` colon.
pub fn tag_of(reference: &str) -> Option<&str> {
    let (repository, tag) = reference.rsplit_once(':')?;
    if tag.contains('/') || repository.is_empty() {
        None
    } else {
        Some(tag)
    }
}

pub fn repository_of(reference: &str) -> &str {
    match tag_of(reference) {
        Some(tag) => &reference[..reference.len() - tag.len() - 1],
        None => reference,
    }
}

/// Ordinal of a series reference such as `localhost/fcos:3`.
pub fn series_index(reference: &str) -> Option<usize> {
    tag_of(reference)?.parse().ok()
}
