//! Reversal cache for domain substitution
//!
//! The cache is a gzip-compressed tarball:
//!
//! ```text
//! manifest.json         list of substituted files with both digests
//! orig/<tree path>      original bytes of every substituted file
//! ```
//!
//! It is written in full before any tree file is rewritten, so an
//! interrupted substitution can always be reverted.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MANIFEST_NAME: &str = "manifest.json";
const ORIGINALS_DIR: &str = "orig";
const FORMAT_VERSION: u32 = 1;

/// One substituted file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedFile {
    /// Path relative to the tree root
    pub path: String,
    pub original_sha256: String,
    pub substituted_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub files: Vec<CachedFile>,
}

/// A loaded cache: the manifest plus original contents by path
#[derive(Debug)]
pub struct DomainCache {
    pub manifest: CacheManifest,
    pub originals: HashMap<String, Vec<u8>>,
}

fn cache_error(cache: &Path, message: impl Into<String>) -> Error {
    Error::Substitution {
        path: cache.to_path_buf(),
        message: message.into(),
    }
}

/// Write a new cache file. Fails if `cache_path` already exists.
pub fn write_cache<'a, I>(cache_path: &Path, files: I) -> Result<()>
where
    I: IntoIterator<Item = (CachedFile, &'a [u8])>,
{
    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(cache_path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => Error::already_exists(cache_path),
            _ => Error::Io(e),
        })?;
    let mut builder = tar::Builder::new(GzEncoder::new(BufWriter::new(file), Compression::default()));

    let mut manifest = CacheManifest {
        version: FORMAT_VERSION,
        files: Vec::new(),
    };
    for (entry, original) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(original.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, format!("{}/{}", ORIGINALS_DIR, entry.path), original)?;
        manifest.files.push(entry);
    }

    let json = serde_json::to_vec_pretty(&manifest)?;
    let mut header = tar::Header::new_gnu();
    header.set_size(json.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder.append_data(&mut header, MANIFEST_NAME, json.as_slice())?;

    let mut writer = builder.into_inner()?.finish()?;
    writer.flush()?;
    Ok(())
}

/// Read a cache written by [`write_cache`].
pub fn read_cache(cache_path: &Path) -> Result<DomainCache> {
    if !cache_path.is_file() {
        return Err(Error::not_found("domain substitution cache", cache_path));
    }
    let reader = GzDecoder::new(BufReader::new(File::open(cache_path)?));
    let mut archive = tar::Archive::new(reader);

    let mut manifest = None;
    let mut originals = HashMap::new();
    let entries = archive
        .entries()
        .map_err(|e| cache_error(cache_path, e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| cache_error(cache_path, e.to_string()))?;
        let name = entry
            .path()
            .map_err(|e| cache_error(cache_path, e.to_string()))?
            .to_string_lossy()
            .into_owned();
        let mut content = Vec::new();
        entry.read_to_end(&mut content)?;

        if name == MANIFEST_NAME {
            let parsed: CacheManifest = serde_json::from_slice(&content)?;
            if parsed.version != FORMAT_VERSION {
                return Err(cache_error(
                    cache_path,
                    format!("unsupported cache version {}", parsed.version),
                ));
            }
            manifest = Some(parsed);
        } else if let Some(path) = name.strip_prefix(ORIGINALS_DIR).and_then(|p| p.strip_prefix('/')) {
            originals.insert(path.to_string(), content);
        }
    }

    let manifest = manifest.ok_or_else(|| cache_error(cache_path, "missing manifest.json"))?;
    if let Some(missing) = manifest.files.iter().find(|f| !originals.contains_key(&f.path)) {
        return Err(cache_error(
            cache_path,
            format!("no original content for {}", missing.path),
        ));
    }
    Ok(DomainCache {
        manifest,
        originals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(path: &str) -> CachedFile {
        CachedFile {
            path: path.to_string(),
            original_sha256: "a".repeat(64),
            substituted_sha256: "b".repeat(64),
        }
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("domsubcache.tar.gz");
        write_cache(
            &cache,
            vec![
                (entry("net/base/url.cc"), b"google.com".as_slice()),
                (entry("README"), b"".as_slice()),
            ],
        )
        .unwrap();

        let loaded = read_cache(&cache).unwrap();
        assert_eq!(loaded.manifest.files.len(), 2);
        assert_eq!(loaded.manifest.files[0].path, "net/base/url.cc");
        assert_eq!(loaded.originals["net/base/url.cc"], b"google.com");
        assert_eq!(loaded.originals["README"], b"");
    }

    #[test]
    fn test_write_refuses_existing_cache() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("domsubcache.tar.gz");
        std::fs::write(&cache, "old").unwrap();
        assert!(matches!(
            write_cache(&cache, Vec::new()),
            Err(Error::AlreadyExists { .. })
        ));
        assert_eq!(std::fs::read(&cache).unwrap(), b"old");
    }

    #[test]
    fn test_read_missing_cache() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            read_cache(&temp.path().join("none.tar.gz")),
            Err(Error::NotFound { .. })
        ));
    }
}
