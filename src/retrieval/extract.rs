//! Archive extraction
//!
//! Each archive declares the format it is in. The set of formats is closed:
//!
//! - **`tar`**: plain and gzip-compressed tarballs are unpacked in-process
//!   with the `tar` and `flate2` crates. Other compressions (`.tar.xz`,
//!   `.tar.bz2`, ...) are handed to an external `tar` program.
//! - **`7z`**: unpacked by an external 7-Zip binary.
//!
//! External programs unpack into a staging directory next to the
//! destination, and the (optionally stripped) contents are then moved into
//! place. In-process extraction rewrites entry paths directly. Either way no
//! entry may land outside the destination.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Component, Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

use flate2::read::GzDecoder;
use log::debug;
use tar::{Archive, EntryType};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Archive formats an archive descriptor can declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtractorKind {
    Tar,
    SevenZip,
}

impl ExtractorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ExtractorKind::Tar => "tar",
            ExtractorKind::SevenZip => "7z",
        }
    }

    /// Guess the format from a file name when none is declared.
    pub fn infer(filename: &str) -> Self {
        if filename.to_ascii_lowercase().ends_with(".7z") {
            ExtractorKind::SevenZip
        } else {
            ExtractorKind::Tar
        }
    }
}

impl FromStr for ExtractorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tar" => Ok(ExtractorKind::Tar),
            "7z" | "7zip" | "sevenzip" => Ok(ExtractorKind::SevenZip),
            other => Err(format!("unknown extractor \"{}\"", other)),
        }
    }
}

impl fmt::Display for ExtractorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Paths of the external extraction programs
#[derive(Debug, Clone)]
pub struct ExtractorPaths {
    pub tar: PathBuf,
    pub sevenzip: PathBuf,
}

impl Default for ExtractorPaths {
    fn default() -> Self {
        Self {
            tar: PathBuf::from("tar"),
            sevenzip: PathBuf::from("7z"),
        }
    }
}

/// An extractor for one archive format
#[derive(Debug, Clone)]
pub enum Extractor {
    /// Tarballs; `program` handles compressions the crate does not
    Tar { program: PathBuf },
    /// 7-Zip archives through an external binary
    SevenZip { program: PathBuf },
}

impl Extractor {
    /// Select the extractor for a declared format.
    pub fn for_kind(kind: ExtractorKind, paths: &ExtractorPaths) -> Self {
        match kind {
            ExtractorKind::Tar => Extractor::Tar {
                program: paths.tar.clone(),
            },
            ExtractorKind::SevenZip => Extractor::SevenZip {
                program: paths.sevenzip.clone(),
            },
        }
    }

    /// Unpack `archive` into `destination`, dropping the `strip` prefix from
    /// every entry. Entries outside `strip` are skipped.
    pub fn extract(&self, archive: &Path, destination: &Path, strip: Option<&str>) -> Result<()> {
        fs::create_dir_all(destination)?;
        match self {
            Extractor::Tar { program } => match TarCompression::detect(archive) {
                TarCompression::None => {
                    let file = BufReader::new(File::open(archive)?);
                    unpack_tar(file, archive, destination, strip)
                }
                TarCompression::Gzip => {
                    let file = BufReader::new(File::open(archive)?);
                    unpack_tar(GzDecoder::new(file), archive, destination, strip)
                }
                TarCompression::External => {
                    let mut command = Command::new(program);
                    command.arg("-xf").arg(archive).arg("-C");
                    extract_external(command, None, archive, destination, strip)
                }
            },
            Extractor::SevenZip { program } => {
                let mut command = Command::new(program);
                command.arg("x").arg("-y").arg(archive);
                extract_external(command, Some("-o"), archive, destination, strip)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TarCompression {
    None,
    Gzip,
    External,
}

impl TarCompression {
    fn detect(archive: &Path) -> Self {
        let name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        if name.ends_with(".tar") {
            TarCompression::None
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            TarCompression::Gzip
        } else {
            TarCompression::External
        }
    }
}

fn archive_error(archive: &Path, message: impl Into<String>) -> Error {
    Error::Extraction {
        archive: archive.display().to_string(),
        message: message.into(),
    }
}

/// Turn an entry path into a safe destination-relative path, or `None` if
/// the entry lies outside the stripped prefix.
fn strip_entry_path(path: &Path, strip: Option<&str>) -> std::result::Result<Option<PathBuf>, String> {
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => return Err(format!("entry escapes the destination: {}", path.display())),
        }
    }

    let relative = match strip {
        Some(prefix) => match relative.strip_prefix(prefix) {
            Ok(rest) => rest.to_path_buf(),
            Err(_) => return Ok(None),
        },
        None => relative,
    };
    if relative.as_os_str().is_empty() {
        return Ok(None);
    }
    Ok(Some(relative))
}

/// Fail unless every existing prefix of `relative` resolves inside `root`.
///
/// `root` must be canonical. Components that do not exist yet are created as
/// plain directories afterwards, so only the existing part can redirect a
/// write through a symlink.
fn ensure_inside(root: &Path, relative: &Path, archive: &Path) -> Result<()> {
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(_) => {
                let resolved = fs::canonicalize(&current).map_err(|e| {
                    archive_error(archive, format!("cannot resolve {}: {}", current.display(), e))
                })?;
                if !resolved.starts_with(root) {
                    return Err(archive_error(
                        archive,
                        format!("entry escapes the destination through {}", relative.display()),
                    ));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Whether a symlink stored at `relative` and pointing to `link` resolves
/// inside the destination. Absolute targets never do.
fn symlink_stays_inside(relative: &Path, link: &Path) -> bool {
    let mut depth = relative.components().count().saturating_sub(1);
    for component in link.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(up) => depth = up,
                None => return false,
            },
            Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    true
}

fn unpack_tar<R: Read>(reader: R, archive: &Path, destination: &Path, strip: Option<&str>) -> Result<()> {
    let mut tarball = Archive::new(reader);
    tarball.set_preserve_permissions(true);
    tarball.set_preserve_mtime(true);
    let root = fs::canonicalize(destination)?;

    let mut unpacked = 0usize;
    let entries = tarball
        .entries()
        .map_err(|e| archive_error(archive, e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| archive_error(archive, e.to_string()))?;
        let entry_type = entry.header().entry_type();
        if matches!(entry_type, EntryType::XGlobalHeader | EntryType::XHeader) {
            continue;
        }

        let entry_path = entry
            .path()
            .map_err(|e| archive_error(archive, e.to_string()))?
            .into_owned();
        let Some(relative) =
            strip_entry_path(&entry_path, strip).map_err(|m| archive_error(archive, m))?
        else {
            continue;
        };
        if let Some(parent) = relative.parent() {
            ensure_inside(&root, parent, archive)?;
        }
        let target = root.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        // A symlink already at the target is replaced, never written through.
        if fs::symlink_metadata(&target).is_ok_and(|m| m.file_type().is_symlink()) {
            fs::remove_file(&target)?;
        }

        if entry_type.is_hard_link() {
            let link = entry
                .link_name()
                .map_err(|e| archive_error(archive, e.to_string()))?
                .ok_or_else(|| archive_error(archive, "hard link without a target"))?;
            let Some(link_relative) =
                strip_entry_path(&link, strip).map_err(|m| archive_error(archive, m))?
            else {
                return Err(archive_error(
                    archive,
                    format!("hard link target outside the stripped prefix: {}", link.display()),
                ));
            };
            ensure_inside(&root, &link_relative, archive)?;
            fs::hard_link(root.join(link_relative), &target)?;
        } else {
            if entry_type.is_symlink() {
                let link = entry
                    .link_name()
                    .map_err(|e| archive_error(archive, e.to_string()))?
                    .ok_or_else(|| archive_error(archive, "symlink without a target"))?;
                if !symlink_stays_inside(&relative, &link) {
                    return Err(archive_error(
                        archive,
                        format!(
                            "symlink {} points outside the destination: {}",
                            relative.display(),
                            link.display()
                        ),
                    ));
                }
            }
            entry
                .unpack(&target)
                .map_err(|e| archive_error(archive, format!("{}: {}", relative.display(), e)))?;
        }
        unpacked += 1;
    }

    debug!("Unpacked {} entries from {}", unpacked, archive.display());
    Ok(())
}

fn extract_external(
    mut command: Command,
    output_flag: Option<&str>,
    archive: &Path,
    destination: &Path,
    strip: Option<&str>,
) -> Result<()> {
    let parent = destination.parent().unwrap_or(destination);
    let staging = tempfile::Builder::new()
        .prefix(".bundlekit-extract")
        .tempdir_in(parent)?;

    match output_flag {
        Some(flag) => {
            let mut arg = std::ffi::OsString::from(flag);
            arg.push(staging.path());
            command.arg(arg);
        }
        None => {
            command.arg(staging.path());
        }
    }

    debug!("Running {:?}", command);
    let output = command
        .output()
        .map_err(|e| archive_error(archive, format!("failed to run {:?}: {}", command.get_program(), e)))?;
    if !output.status.success() {
        return Err(archive_error(
            archive,
            format!(
                "{:?} exited with {}: {}",
                command.get_program(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }

    let source = match strip {
        Some(prefix) => staging.path().join(prefix),
        None => staging.path().to_path_buf(),
    };
    if !source.is_dir() {
        return Err(archive_error(
            archive,
            format!("archive has no leading directory \"{}\"", strip.unwrap_or_default()),
        ));
    }
    move_contents(&source, destination)?;
    Ok(())
}

/// Move every entry under `source` into `destination`, merging into
/// directories that already exist there.
fn move_contents(source: &Path, destination: &Path) -> Result<()> {
    fs::create_dir_all(destination)?;
    for entry in WalkDir::new(source).min_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let Ok(relative) = entry.path().strip_prefix(source) else {
            continue;
        };
        let to = destination.join(relative);
        let existing = match fs::symlink_metadata(&to) {
            Ok(metadata) => Some(metadata),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };

        if entry.file_type().is_dir() {
            match existing {
                Some(metadata) if metadata.is_dir() => {}
                Some(_) => {
                    fs::remove_file(&to)?;
                    fs::create_dir(&to)?;
                }
                None => fs::create_dir(&to)?,
            }
        } else {
            match existing {
                Some(metadata) if metadata.is_dir() => fs::remove_dir_all(&to)?,
                Some(_) => fs::remove_file(&to)?,
                None => {}
            }
            fs::rename(entry.path(), &to)?;
        }
    }
    Ok(())
}
