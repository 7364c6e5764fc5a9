//! # Source Retrieval
//!
//! Fetches the upstream archives a bundle declares, verifies them and
//! unpacks them into a fresh workspace tree.
//!
//! ## Process
//!
//! 1.  **Preconditions**: the downloads directory must exist and the tree
//!     must not.
//! 2.  **Fetch & verify**: every archive missing from the downloads
//!     directory is downloaded, then every archive is hashed against its
//!     declared digest. Nothing is extracted until all of them match, so a
//!     bad digest never creates or extends the tree.
//! 3.  **Extract**: archives are unpacked in declared order into their
//!     extraction roots.
//! 4.  **Prune**: when enabled, pruning paths are deleted as soon as the
//!     archive containing them has been unpacked. Paths no archive provided
//!     are reported at the end.
//!
//! Extraction is not transactional across archives; on failure the partial
//! tree is left for inspection and must be removed before retrying.

pub mod digest;
pub mod download;
pub mod extract;

use std::path::Path;

use log::{info, warn};

use crate::bundle::ConfigBundle;
use crate::error::{Error, Result};
use crate::prune::{prune_existing, report_missing};

use self::digest::verify_file;
use self::download::Downloader;
use self::extract::{Extractor, ExtractorPaths};

/// Options for [`retrieve_and_extract`]
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    /// Delete the bundle's pruning paths while extracting
    pub prune: bool,
    /// Show download progress bars
    pub show_progress: bool,
    /// External extractor programs
    pub extractors: ExtractorPaths,
    /// Verify TLS certificates when downloading
    pub ssl_verify: bool,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            prune: true,
            show_progress: true,
            extractors: ExtractorPaths::default(),
            ssl_verify: true,
        }
    }
}

/// Download, verify and extract every archive of `bundle` into `tree_dir`.
pub fn retrieve_and_extract(
    bundle: &ConfigBundle,
    downloads_dir: &Path,
    tree_dir: &Path,
    options: &RetrievalOptions,
) -> Result<()> {
    if !downloads_dir.exists() {
        return Err(Error::not_found("downloads directory", downloads_dir));
    }
    if !downloads_dir.is_dir() {
        return Err(Error::NotADirectory {
            path: downloads_dir.to_path_buf(),
        });
    }
    if tree_dir.exists() {
        return Err(Error::already_exists(tree_dir));
    }

    fetch_and_verify(bundle, downloads_dir, options)?;

    std::fs::create_dir_all(tree_dir)?;
    let mut pending = if options.prune {
        bundle.pruning().clone()
    } else {
        Default::default()
    };

    for archive in bundle.downloads() {
        let local = archive.local_path(downloads_dir);
        let destination = archive.extraction_root(tree_dir);
        info!("Extracting {} into {}", archive.name, destination.display());
        Extractor::for_kind(archive.extractor, &options.extractors).extract(
            &local,
            &destination,
            archive.strip_leading_dirs.as_deref(),
        )?;

        if options.prune && !pending.is_empty() {
            let removed = prune_existing(tree_dir, &mut pending)?;
            info!("Pruned {} files after extracting {}", removed, archive.name);
        }
    }

    if options.prune {
        report_missing(&pending)?;
    }
    Ok(())
}

/// Make sure every archive is present locally and matches its digest.
pub fn fetch_and_verify(
    bundle: &ConfigBundle,
    downloads_dir: &Path,
    options: &RetrievalOptions,
) -> Result<()> {
    let mut downloader = None;
    for archive in bundle.downloads() {
        let local = archive.local_path(downloads_dir);
        if local.exists() {
            if !local.is_file() {
                return Err(Error::NotAFile { path: local });
            }
            info!("{} already downloaded", archive.download_filename);
        } else {
            if downloader.is_none() {
                downloader = Some(Downloader::new(options.ssl_verify, options.show_progress)?);
            }
            if let Some(downloader) = &downloader {
                downloader.fetch(archive, &local)?;
            }
        }

        info!("Verifying {} ({})", archive.download_filename, archive.digest.algorithm);
        if let Err(e) = verify_file(&local, &archive.digest) {
            warn!("Archive {} failed verification", archive.name);
            return Err(e);
        }
    }
    Ok(())
}
