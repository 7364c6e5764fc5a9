//! # Bundle Component Files
//!
//! Every bundle layer (base or user) is a directory of small text files. This
//! module reads and writes them:
//!
//! - **`patch_order.list`**: patch paths relative to the patches directory,
//!   in application order.
//! - **`pruning.list`**: tree-relative files to delete.
//! - **`domain_substitution.list`**: tree-relative paths or glob specs of
//!   files that receive domain substitution.
//! - **`domain_regex.list`**: `pattern#replacement` rules.
//! - **`downloads.ini`**: one section per source archive.
//! - **`version.ini`**: `[version]` metadata.
//! - **`build_flags.map`**: `key=value` build flags.
//!
//! All files are optional; a missing file is an empty component. In list
//! files blank lines and lines starting with `#` are ignored. Paths are
//! normalized on load, so every consumer sees canonical `a/b` form.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use ini::Ini;
use regex::Regex;
use url::Url;

use crate::defaults::{
    BUILD_FLAGS_MAP, DOMAIN_REGEX_LIST, DOMAIN_SUBSTITUTION_LIST, DOWNLOADS_INI,
    PATCH_ORDER_LIST, PRUNING_LIST, VERSION_INI,
};
use crate::error::{Error, Result};
use crate::merge::keyed::Keyed;
use crate::path::normalize_relative;
use crate::retrieval::digest::{ExpectedDigest, HashAlgorithm};
use crate::retrieval::extract::ExtractorKind;

const VERSION_SECTION: &str = "version";

/// Load an INI file, reporting parse errors against the file.
pub fn load_ini(path: &Path) -> Result<Ini> {
    Ini::load_from_file(path).map_err(|e| match e {
        ini::Error::Io(io) => Error::Io(io),
        ini::Error::Parse(parse) => Error::ConfigParse {
            file: path.to_path_buf(),
            message: parse.to_string(),
            hint: None,
        },
    })
}

/// Read the meaningful lines of a list file; a missing file is empty.
pub fn read_list(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn read_paths(path: &Path) -> Result<Vec<String>> {
    read_list(path)?
        .iter()
        .map(|line| normalize_relative(line))
        .collect()
}

fn write_lines<I, S>(path: &Path, lines: I) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: fmt::Display,
{
    let mut content = String::new();
    for line in lines {
        content.push_str(&line.to_string());
        content.push('\n');
    }
    fs::write(path, content)?;
    Ok(())
}

/// A domain substitution rule: `pattern#replacement`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRegex {
    /// Regular expression matching the real domain
    pub pattern: String,
    /// Replacement text; may reference capture groups as `$1`
    pub replacement: String,
}

impl DomainRegex {
    /// Parse one rule line, checking that the pattern compiles.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let (pattern, replacement) = line
            .split_once('#')
            .ok_or_else(|| format!("expected 'pattern#replacement', got \"{}\"", line))?;
        if pattern.is_empty() {
            return Err("empty pattern".to_string());
        }
        Regex::new(pattern).map_err(|e| e.to_string())?;
        Ok(Self {
            pattern: pattern.to_string(),
            replacement: replacement.to_string(),
        })
    }

    /// Compile the pattern.
    pub fn compile(&self) -> Result<Regex> {
        Ok(Regex::new(&self.pattern)?)
    }
}

impl fmt::Display for DomainRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pattern, self.replacement)
    }
}

/// A source archive declared in `downloads.ini`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveDescriptor {
    /// Section name
    pub name: String,
    /// Primary URL followed by mirrors
    pub urls: Vec<String>,
    pub digest: ExpectedDigest,
    /// File name inside the downloads directory
    pub download_filename: String,
    /// Extraction root relative to the tree; `None` is the tree itself
    pub output_path: Option<String>,
    /// Leading directory inside the archive to strip
    pub strip_leading_dirs: Option<String>,
    pub extractor: ExtractorKind,
}

impl Keyed for ArchiveDescriptor {
    fn key(&self) -> &str {
        &self.name
    }
}

impl ArchiveDescriptor {
    /// Local path of the archive inside `downloads_dir`.
    pub fn local_path(&self, downloads_dir: &Path) -> PathBuf {
        downloads_dir.join(&self.download_filename)
    }

    /// Directory the archive is extracted into.
    pub fn extraction_root(&self, tree_dir: &Path) -> PathBuf {
        match &self.output_path {
            Some(output) => tree_dir.join(output),
            None => tree_dir.to_path_buf(),
        }
    }

    fn from_section(file: &Path, name: &str, section: &ini::Properties) -> Result<Self> {
        let parse_error = |message: String, hint: Option<&str>| Error::ConfigParse {
            file: file.to_path_buf(),
            message: format!("[{}] {}", name, message),
            hint: hint.map(str::to_string),
        };

        let primary = section
            .get("url")
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| parse_error("missing url".to_string(), Some("add 'url = https://...'")))?;
        let mut urls = vec![primary.to_string()];
        urls.extend(
            section
                .get("mirrors")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
        );
        let mut parsed_urls = Vec::with_capacity(urls.len());
        for url in &urls {
            let parsed = Url::parse(url)?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(parse_error(
                    format!("unsupported URL scheme \"{}\"", parsed.scheme()),
                    None,
                ));
            }
            parsed_urls.push(parsed);
        }

        let mut digests = HashAlgorithm::ALL
            .iter()
            .filter_map(|alg| section.get(alg.as_str()).map(|hex| (*alg, hex)));
        let digest = match (digests.next(), digests.next()) {
            (Some((algorithm, hex)), None) => ExpectedDigest::new(algorithm, hex)
                .map_err(|message| parse_error(message, None))?,
            (None, _) => {
                return Err(parse_error(
                    "missing digest".to_string(),
                    Some("add 'sha256 = <hex>' or 'sha512 = <hex>'"),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(parse_error(
                    "more than one digest declared".to_string(),
                    None,
                ))
            }
        };

        let download_filename = match section.get("download_filename") {
            Some(filename) => filename.trim().to_string(),
            None => parsed_urls[0]
                .path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
                .map(str::to_string)
                .ok_or_else(|| {
                    parse_error(
                        "cannot derive a file name from the url".to_string(),
                        Some("add 'download_filename = ...'"),
                    )
                })?,
        };
        if download_filename.is_empty()
            || download_filename.contains(['/', '\\'])
            || download_filename == "."
            || download_filename == ".."
        {
            return Err(parse_error(
                format!("invalid download_filename \"{}\"", download_filename),
                None,
            ));
        }

        let output_path = match section.get("output_path").map(str::trim) {
            None | Some("") | Some(".") => None,
            Some(path) => Some(normalize_relative(path)?),
        };
        let strip_leading_dirs = match section.get("strip_leading_dirs").map(str::trim) {
            None | Some("") => None,
            Some(path) => Some(normalize_relative(path)?),
        };

        let extractor = match section.get("extractor") {
            Some(kind) => kind
                .trim()
                .parse::<ExtractorKind>()
                .map_err(|message| parse_error(message, Some("use 'tar' or '7z'")))?,
            None => ExtractorKind::infer(&download_filename),
        };

        Ok(Self {
            name: name.to_string(),
            urls,
            digest,
            download_filename,
            output_path,
            strip_leading_dirs,
            extractor,
        })
    }
}

/// Parse `downloads.ini`; sections keep their file order.
pub fn read_downloads(path: &Path) -> Result<Vec<ArchiveDescriptor>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let ini = load_ini(path)?;
    let mut archives: Vec<ArchiveDescriptor> = Vec::new();
    for (name, section) in ini.iter() {
        let Some(name) = name else {
            if section.is_empty() {
                continue;
            }
            return Err(Error::ConfigParse {
                file: path.to_path_buf(),
                message: "entries outside of an archive section".to_string(),
                hint: None,
            });
        };
        if archives.iter().any(|a| a.name == name) {
            return Err(Error::ConfigParse {
                file: path.to_path_buf(),
                message: format!("archive \"{}\" declared twice", name),
                hint: None,
            });
        }
        archives.push(ArchiveDescriptor::from_section(path, name, section)?);
    }
    Ok(archives)
}

fn write_downloads(path: &Path, archives: &[ArchiveDescriptor]) -> Result<()> {
    let mut ini = Ini::new();
    for archive in archives {
        let section = Some(archive.name.as_str());
        let mut set = |key: &str, value: String| ini.set_to(section, key.to_string(), value);
        set("url", archive.urls[0].clone());
        if archive.urls.len() > 1 {
            set("mirrors", archive.urls[1..].join(", "));
        }
        set(archive.digest.algorithm.as_str(), archive.digest.hex.clone());
        set("download_filename", archive.download_filename.clone());
        if let Some(output) = &archive.output_path {
            set("output_path", output.clone());
        }
        if let Some(strip) = &archive.strip_leading_dirs {
            set("strip_leading_dirs", strip.clone());
        }
        set("extractor", archive.extractor.as_str().to_string());
    }
    ini.write_to_file(path)?;
    Ok(())
}

fn read_version(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let ini = load_ini(path)?;
    Ok(ini
        .section(Some(VERSION_SECTION))
        .map(|section| {
            section
                .iter()
                .map(|(k, v)| (k.to_string(), v.trim().to_string()))
                .collect()
        })
        .unwrap_or_default())
}

fn write_version(path: &Path, version: &BTreeMap<String, String>) -> Result<()> {
    let mut ini = Ini::new();
    for (key, value) in version {
        ini.set_to(Some(VERSION_SECTION), key.clone(), value.clone());
    }
    ini.write_to_file(path)?;
    Ok(())
}

fn read_flags(path: &Path) -> Result<BTreeMap<String, String>> {
    let mut flags = BTreeMap::new();
    for line in read_list(path)? {
        let (key, value) = line.split_once('=').ok_or_else(|| Error::ConfigParse {
            file: path.to_path_buf(),
            message: format!("expected 'key=value', got \"{}\"", line),
            hint: None,
        })?;
        flags.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(flags)
}

fn read_domain_regex(path: &Path) -> Result<Vec<DomainRegex>> {
    read_list(path)?
        .iter()
        .map(|line| {
            DomainRegex::parse(line).map_err(|message| Error::ConfigParse {
                file: path.to_path_buf(),
                message,
                hint: None,
            })
        })
        .collect()
}

/// The components declared by one bundle layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleComponentLists {
    /// Patches in application order; repeats are meaningful
    pub patches: Vec<String>,
    pub pruning: BTreeSet<String>,
    pub domain_substitution: BTreeSet<String>,
    pub domain_regex: Vec<DomainRegex>,
    pub downloads: Vec<ArchiveDescriptor>,
    pub version: BTreeMap<String, String>,
    pub build_flags: BTreeMap<String, String>,
}

impl BundleComponentLists {
    /// Load every component file of a bundle directory.
    pub fn load(dir: &Path) -> Result<Self> {
        Ok(Self {
            patches: read_paths(&dir.join(PATCH_ORDER_LIST))?,
            pruning: read_paths(&dir.join(PRUNING_LIST))?.into_iter().collect(),
            domain_substitution: read_paths(&dir.join(DOMAIN_SUBSTITUTION_LIST))?
                .into_iter()
                .collect(),
            domain_regex: read_domain_regex(&dir.join(DOMAIN_REGEX_LIST))?,
            downloads: read_downloads(&dir.join(DOWNLOADS_INI))?,
            version: read_version(&dir.join(VERSION_INI))?,
            build_flags: read_flags(&dir.join(BUILD_FLAGS_MAP))?,
        })
    }

    /// Write every component file into an existing directory.
    pub fn write(&self, dir: &Path) -> Result<()> {
        write_lines(&dir.join(PATCH_ORDER_LIST), &self.patches)?;
        write_lines(&dir.join(PRUNING_LIST), &self.pruning)?;
        write_lines(&dir.join(DOMAIN_SUBSTITUTION_LIST), &self.domain_substitution)?;
        write_lines(&dir.join(DOMAIN_REGEX_LIST), &self.domain_regex)?;
        write_downloads(&dir.join(DOWNLOADS_INI), &self.downloads)?;
        write_version(&dir.join(VERSION_INI), &self.version)?;
        write_lines(
            &dir.join(BUILD_FLAGS_MAP),
            self.build_flags.iter().map(|(k, v)| format!("{}={}", k, v)),
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHA256_EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_read_list_skips_comments_and_blanks() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pruning.list");
        fs::write(&path, "# prebuilt tools\n\nthird_party/a.jar\n  tools/b.exe  \n").unwrap();
        assert_eq!(
            read_list(&path).unwrap(),
            vec!["third_party/a.jar", "tools/b.exe"]
        );
    }

    #[test]
    fn test_read_list_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        assert!(read_list(&temp.path().join("nope.list")).unwrap().is_empty());
    }

    #[test]
    fn test_load_normalizes_paths() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PRUNING_LIST), "./x//y\nx/y\nz\n").unwrap();
        let lists = BundleComponentLists::load(temp.path()).unwrap();
        let expected: BTreeSet<String> = ["x/y", "z"].iter().map(|s| s.to_string()).collect();
        assert_eq!(lists.pruning, expected);
    }

    #[test]
    fn test_load_rejects_escaping_paths() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(PRUNING_LIST), "../outside\n").unwrap();
        assert!(matches!(
            BundleComponentLists::load(temp.path()),
            Err(Error::InvalidPath { .. })
        ));
    }

    #[test]
    fn test_domain_regex_parse() {
        let rule = DomainRegex::parse(r"google\.com#9oo91e.qjz9zk").unwrap();
        assert_eq!(rule.pattern, r"google\.com");
        assert_eq!(rule.replacement, "9oo91e.qjz9zk");
        assert_eq!(rule.to_string(), r"google\.com#9oo91e.qjz9zk");
        assert!(DomainRegex::parse("no-separator").is_err());
        assert!(DomainRegex::parse("(unclosed#x").is_err());
    }

    #[test]
    fn test_read_downloads() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DOWNLOADS_INI);
        fs::write(
            &path,
            format!(
                "[upstream]\nurl = https://example.org/dist/upstream-1.0.tar.gz\n\
                 mirrors = https://mirror.example.net/upstream-1.0.tar.gz\n\
                 sha256 = {}\nstrip_leading_dirs = upstream-1.0\n\n\
                 [toolchain]\nurl = https://example.org/tools.7z\nsha512 = {}\n\
                 output_path = third_party/toolchain\n",
                SHA256_EMPTY.to_uppercase(),
                "ab".repeat(64)
            ),
        )
        .unwrap();

        let archives = read_downloads(&path).unwrap();
        assert_eq!(archives.len(), 2);

        let upstream = &archives[0];
        assert_eq!(upstream.name, "upstream");
        assert_eq!(upstream.urls.len(), 2);
        assert_eq!(upstream.download_filename, "upstream-1.0.tar.gz");
        assert_eq!(upstream.digest.algorithm, HashAlgorithm::Sha256);
        assert_eq!(upstream.digest.hex, SHA256_EMPTY);
        assert_eq!(upstream.strip_leading_dirs.as_deref(), Some("upstream-1.0"));
        assert_eq!(upstream.output_path, None);
        assert_eq!(upstream.extractor, ExtractorKind::Tar);

        let toolchain = &archives[1];
        assert_eq!(toolchain.extractor, ExtractorKind::SevenZip);
        assert_eq!(toolchain.output_path.as_deref(), Some("third_party/toolchain"));
        assert_eq!(
            toolchain.extraction_root(Path::new("tree")),
            PathBuf::from("tree/third_party/toolchain")
        );
    }

    #[test]
    fn test_read_downloads_requires_digest() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DOWNLOADS_INI);
        fs::write(&path, "[upstream]\nurl = https://example.org/a.tar\n").unwrap();
        match read_downloads(&path).unwrap_err() {
            Error::ConfigParse { message, hint, .. } => {
                assert!(message.contains("missing digest"));
                assert!(hint.is_some());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_downloads_rejects_bad_scheme() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(DOWNLOADS_INI);
        fs::write(
            &path,
            format!("[upstream]\nurl = ftp://example.org/a.tar\nsha256 = {}\n", SHA256_EMPTY),
        )
        .unwrap();
        assert!(matches!(
            read_downloads(&path),
            Err(Error::ConfigParse { .. })
        ));
    }

    #[test]
    fn test_read_flags() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(BUILD_FLAGS_MAP);
        fs::write(&path, "is_debug=false\nsymbol_level = 0\n").unwrap();
        let flags = read_flags(&path).unwrap();
        assert_eq!(flags.get("symbol_level").map(String::as_str), Some("0"));

        fs::write(&path, "broken\n").unwrap();
        assert!(read_flags(&path).is_err());
    }

    #[test]
    fn test_write_then_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        fs::create_dir(&source).unwrap();
        fs::write(source.join(PATCH_ORDER_LIST), "a.patch\nb.patch\na.patch\n").unwrap();
        fs::write(source.join(PRUNING_LIST), "x/y\nz\n").unwrap();
        fs::write(source.join(DOMAIN_SUBSTITUTION_LIST), "src/*.cc\n").unwrap();
        fs::write(source.join(DOMAIN_REGEX_LIST), r"example\.com#example.invalid").unwrap();
        fs::write(
            source.join(DOWNLOADS_INI),
            format!("[upstream]\nurl = https://example.org/u.tar.xz\nsha256 = {}\n", SHA256_EMPTY),
        )
        .unwrap();
        fs::write(source.join(VERSION_INI), "[version]\nupstream_version = 1.2.3\n").unwrap();
        fs::write(source.join(BUILD_FLAGS_MAP), "is_debug=false\n").unwrap();

        let lists = BundleComponentLists::load(&source).unwrap();
        let target = temp.path().join("target");
        fs::create_dir(&target).unwrap();
        lists.write(&target).unwrap();

        assert_eq!(BundleComponentLists::load(&target).unwrap(), lists);
    }
}
