//! Opaque, URL-safe identifiers for collection files.
//!
//! An id is the unpadded URL-safe base64 of the file's path relative to the
//! collection root. Base64 is a bijection on byte strings, so every id decodes
//! back to exactly the path it came from.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use std::path::{Component, Path, PathBuf};

/// Errors raised while turning an id back into a path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("identifier is not valid base64: {0}")]
    Encoding(String),
    #[error("identifier does not decode to UTF-8")]
    NotUtf8,
    #[error("identifier does not name a document inside the collection")]
    OutsideCollection,
}

/// Encode a relative path.
pub fn encode(path: &Path) -> String {
    URL_SAFE_NO_PAD.encode(path.to_string_lossy().as_bytes())
}

/// Decode an id produced by [`encode`].
pub fn decode(id: &str) -> Result<PathBuf, CodecError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(id)
        .map_err(|e| CodecError::Encoding(e.to_string()))?;
    let path = String::from_utf8(bytes).map_err(|_| CodecError::NotUtf8)?;
    Ok(PathBuf::from(path))
}

/// Id of `path`, relative to `base_dir` when it lies inside it.
pub fn id_for(base_dir: &Path, path: &Path) -> String {
    encode(path.strip_prefix(base_dir).unwrap_or(path))
}

/// Decode `id` into a document path under `base_dir`.
///
/// Only relative paths made of plain components and ending in `.bru` are
/// accepted, so an id can never address a file outside the collection.
pub fn resolve(base_dir: &Path, id: &str) -> Result<PathBuf, CodecError> {
    let relative = decode(id)?;

    let plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    let is_document = relative.extension().is_some_and(|ext| ext == "bru");
    if relative.as_os_str().is_empty() || !plain || !is_document {
        return Err(CodecError::OutsideCollection);
    }

    Ok(base_dir.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_awkward_names() {
        let paths = [
            "users/Get User.bru",
            "a-b_c/d_-e.bru",
            "dots.v2/x..y.bru",
            "~~/--/__.bru",
            "ünïcode/名前.bru",
            "deep/nested/folder/with spaces/Request.bru",
        ];
        for p in paths {
            let path = Path::new(p);
            assert_eq!(decode(&encode(path)).unwrap(), path, "{}", p);
        }
    }

    #[test]
    fn test_ids_are_url_safe() {
        let id = encode(Path::new("users/?? weird &name.bru"));
        assert!(id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_distinct_paths_give_distinct_ids() {
        // Pairs that collide under naive character-replacement schemes.
        assert_ne!(encode(Path::new("a-_b.bru")), encode(Path::new("a--b.bru")));
        assert_ne!(encode(Path::new("a/b.bru")), encode(Path::new("a~~b.bru")));
    }

    #[test]
    fn test_id_for_is_relative() {
        let base = Path::new("/srv/collection");
        let id = id_for(base, Path::new("/srv/collection/users/List.bru"));
        assert_eq!(decode(&id).unwrap(), Path::new("users/List.bru"));
        assert_eq!(
            resolve(base, &id).unwrap(),
            Path::new("/srv/collection/users/List.bru")
        );
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let base = Path::new("/srv/collection");
        for bad in ["../secret.bru", "/etc/passwd.bru", "users/notes.txt", ""] {
            let id = encode(Path::new(bad));
            assert_eq!(
                resolve(base, &id),
                Err(CodecError::OutsideCollection),
                "{}",
                bad
            );
        }
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode("!!not base64!!"), Err(CodecError::Encoding(_))));
        assert_eq!(decode(&URL_SAFE_NO_PAD.encode([0xff, 0xfe])), Err(CodecError::NotUtf8));
    }
}
