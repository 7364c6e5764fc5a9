//! # Domain Substitution
//!
//! Replaces real domain names in the source tree and in patches with
//! blockable placeholder strings, and reverts the tree afterwards.
//!
//! ## Tree substitution
//!
//! 1.  **Resolve**: every spec of the bundle's domain-substitution set is
//!     resolved against the tree. Literal specs must name an existing file;
//!     glob specs must match at least one. Nothing is touched until all
//!     specs resolve.
//! 2.  **Substitute**: matched files are read and rewritten in memory, in
//!     parallel. Only text files are processed (no NUL byte, valid UTF-8);
//!     other files are skipped.
//! 3.  **Cache**: the original bytes of every changed file go into the
//!     reversal cache along with both digests.
//! 4.  **Commit**: changed files are written back.
//!
//! ## Reverting
//!
//! A cached file is restored when it still holds the substituted content.
//! A file that already holds the original content is left alone. Anything
//! else means it was edited after substitution and the revert fails before
//! touching any file.
//!
//! ## Patches
//!
//! Patches are rewritten so that they apply to a substituted tree. Only hunk
//! lines of files covered by the domain-substitution set change; headers and
//! other files' hunks are kept verbatim.

pub mod cache;

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use glob::Pattern;
use log::{debug, info, warn};
use rayon::prelude::*;
use regex::Regex;

use crate::bundle::ConfigBundle;
use crate::config::DomainRegex;
use crate::error::{Error, Result};
use crate::path::{is_glob_spec, normalize_relative, relative_display, spec_matches, SPEC_MATCH_OPTIONS};
use crate::retrieval::digest::HashAlgorithm;

use self::cache::{read_cache, write_cache, CachedFile};

/// Compiled substitution rules, applied in order
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<(Regex, String)>,
}

impl RuleSet {
    pub fn compile(rules: &[DomainRegex]) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| Ok((rule.compile()?, rule.replacement.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Apply every rule to `text`; `None` if nothing changed.
    pub fn apply(&self, text: &str) -> Option<String> {
        let mut current = text.to_string();
        let mut changed = false;
        for (regex, replacement) in &self.rules {
            let replaced = regex.replace_all(&current, replacement.as_str()).into_owned();
            if replaced != current {
                changed = true;
                current = replaced;
            }
        }
        changed.then_some(current)
    }
}

/// Whether content is eligible for substitution.
pub fn is_text(content: &[u8]) -> bool {
    !content.contains(&0) && std::str::from_utf8(content).is_ok()
}

/// Resolve path specs to the tree-relative files they name.
///
/// Every spec must match something; the first one that doesn't fails with
/// [`Error::NotFound`].
pub fn resolve_specs(tree_root: &Path, specs: &BTreeSet<String>) -> Result<BTreeSet<String>> {
    let mut files = BTreeSet::new();
    for spec in specs {
        if !is_glob_spec(spec) {
            let path = tree_root.join(spec);
            if !path.exists() {
                return Err(Error::not_found(
                    format!("file \"{}\" listed for domain substitution", spec),
                    path,
                ));
            }
            if !path.is_file() {
                return Err(Error::NotAFile { path });
            }
            files.insert(spec.clone());
            continue;
        }

        let root = tree_root.to_str().ok_or_else(|| Error::InvalidPath {
            path: tree_root.display().to_string(),
            message: "tree path is not valid UTF-8".to_string(),
        })?;
        let pattern = format!("{}/{}", Pattern::escape(root), spec);
        let mut matched = 0usize;
        for entry in glob::glob_with(&pattern, SPEC_MATCH_OPTIONS)? {
            let path = entry.map_err(|e| Error::Io(e.into_error()))?;
            if !path.is_file() {
                continue;
            }
            if let Some(relative) = relative_display(tree_root, &path) {
                files.insert(relative);
                matched += 1;
            }
        }
        if matched == 0 {
            return Err(Error::not_found(
                format!("files matching \"{}\"", spec),
                tree_root.join(spec),
            ));
        }
    }
    Ok(files)
}

struct Substituted {
    path: String,
    original: Vec<u8>,
    substituted: String,
}

fn substitute_file(tree_root: &Path, relative: &str, rules: &RuleSet) -> Result<Option<Substituted>> {
    let original = fs::read(tree_root.join(relative))?;
    if !is_text(&original) {
        info!("Skipping non-text file {}", relative);
        return Ok(None);
    }
    let Some(substituted) = std::str::from_utf8(&original)
        .ok()
        .and_then(|text| rules.apply(text))
    else {
        return Ok(None);
    };
    Ok(Some(Substituted {
        path: relative.to_string(),
        original,
        substituted,
    }))
}

/// Substitute domains in the tree files covered by `bundle`, recording
/// originals in a new cache at `cache_path`. Returns the number of files
/// changed.
pub fn process_tree(bundle: &ConfigBundle, tree_root: &Path, cache_path: &Path) -> Result<usize> {
    if cache_path.exists() {
        return Err(Error::already_exists(cache_path));
    }
    if !tree_root.is_dir() {
        return Err(Error::not_found("source tree", tree_root));
    }
    let rules = RuleSet::compile(bundle.domain_regex())?;
    let files = resolve_specs(tree_root, bundle.domain_substitution())?;
    debug!(
        "Applying {} rules to {} files in {}",
        rules.len(),
        files.len(),
        tree_root.display()
    );

    let mut changed = files
        .par_iter()
        .map(|relative| substitute_file(tree_root, relative, &rules))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();
    changed.sort_by(|a, b| a.path.cmp(&b.path));

    write_cache(
        cache_path,
        changed.iter().map(|file| {
            (
                CachedFile {
                    path: file.path.clone(),
                    original_sha256: HashAlgorithm::Sha256.hash_bytes(&file.original),
                    substituted_sha256: HashAlgorithm::Sha256.hash_bytes(file.substituted.as_bytes()),
                },
                file.original.as_slice(),
            )
        }),
    )?;

    for file in &changed {
        fs::write(tree_root.join(&file.path), &file.substituted)?;
    }
    info!(
        "Substituted domains in {} of {} files",
        changed.len(),
        files.len()
    );
    Ok(changed.len())
}

/// Restore the files recorded in the cache at `cache_path` and delete the
/// cache. Returns the number of files restored.
pub fn revert_tree(tree_root: &Path, cache_path: &Path) -> Result<usize> {
    let cache = read_cache(cache_path)?;

    let mut to_restore = Vec::new();
    for file in &cache.manifest.files {
        let path = tree_root.join(&file.path);
        if !path.is_file() {
            return Err(Error::Substitution {
                path,
                message: "file listed in the cache no longer exists".to_string(),
            });
        }
        let current = HashAlgorithm::Sha256.hash_bytes(&fs::read(&path)?);
        if current == file.original_sha256 {
            debug!("{} already holds its original content", file.path);
        } else if current == file.substituted_sha256 {
            to_restore.push(file);
        } else {
            return Err(Error::Substitution {
                path,
                message: "file was modified after domain substitution".to_string(),
            });
        }
    }

    for file in &to_restore {
        let original = &cache.originals[&file.path];
        if HashAlgorithm::Sha256.hash_bytes(original) != file.original_sha256 {
            return Err(Error::Substitution {
                path: cache_path.to_path_buf(),
                message: format!("cached original of {} is corrupt", file.path),
            });
        }
        fs::write(tree_root.join(&file.path), original)?;
    }

    fs::remove_file(cache_path)?;
    info!("Reverted domain substitution on {} files", to_restore.len());
    Ok(to_restore.len())
}

/// Substitute domains inside the hunks of `bundle`'s patches. Returns the
/// number of patch files changed.
pub fn process_patches(bundle: &ConfigBundle) -> Result<usize> {
    let patches_dir = bundle.patches_dir();
    if !patches_dir.is_dir() {
        return Err(Error::NotADirectory {
            path: patches_dir.to_path_buf(),
        });
    }
    let patches: BTreeSet<&String> = bundle.patches().iter().collect();
    for patch in &patches {
        let path = patches_dir.join(patch);
        if !path.is_file() {
            return Err(Error::not_found(format!("patch \"{}\"", patch), path));
        }
    }

    let rules = RuleSet::compile(bundle.domain_regex())?;
    let specs = bundle.domain_substitution();
    let mut changed = 0usize;
    for patch in patches {
        let path = patches_dir.join(patch);
        let content = fs::read_to_string(&path).map_err(|e| Error::Substitution {
            path: path.clone(),
            message: e.to_string(),
        })?;
        if let Some(substituted) = substitute_patch(&content, specs, &rules)? {
            fs::write(&path, substituted)?;
            debug!("Substituted domains in patch {}", patch);
            changed += 1;
        }
    }
    info!("Substituted domains in {} patches", changed);
    Ok(changed)
}

#[derive(Debug, Default)]
struct Hunk {
    old_remaining: u64,
    new_remaining: u64,
}

impl Hunk {
    fn parse(header: &str) -> Option<Self> {
        // @@ -start[,count] +start[,count] @@
        let mut fields = header.strip_prefix("@@ ")?.split_whitespace();
        let old = fields.next()?.strip_prefix('-')?;
        let new = fields.next()?.strip_prefix('+')?;
        let count = |range: &str| -> Option<u64> {
            match range.split_once(',') {
                Some((_, count)) => count.parse().ok(),
                None => Some(1),
            }
        };
        Some(Self {
            old_remaining: count(old)?,
            new_remaining: count(new)?,
        })
    }

    fn is_open(&self) -> bool {
        self.old_remaining > 0 || self.new_remaining > 0
    }

    fn consume(&mut self, marker: Option<char>) {
        match marker {
            Some('-') => self.old_remaining = self.old_remaining.saturating_sub(1),
            Some('+') => self.new_remaining = self.new_remaining.saturating_sub(1),
            Some('\\') => {}
            _ => {
                self.old_remaining = self.old_remaining.saturating_sub(1);
                self.new_remaining = self.new_remaining.saturating_sub(1);
            }
        }
    }
}

/// Path named by a `---`/`+++` header, without the `a/`/`b/` prefix.
fn header_path(rest: &str) -> Option<String> {
    let raw = rest.split('\t').next()?.trim();
    if raw == "/dev/null" {
        return None;
    }
    let raw = raw
        .strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw);
    normalize_relative(raw).ok()
}

fn covered(specs: &BTreeSet<String>, path: &str) -> Result<bool> {
    for spec in specs {
        if spec_matches(spec, path)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Rewrite the hunk lines of a unified diff whose target file is covered by
/// `specs`. Returns `None` if nothing changed.
pub fn substitute_patch(content: &str, specs: &BTreeSet<String>, rules: &RuleSet) -> Result<Option<String>> {
    let mut output = String::with_capacity(content.len());
    let mut old_path: Option<String> = None;
    let mut active = false;
    let mut hunk = Hunk::default();
    let mut changed = false;

    for line in content.split_inclusive('\n') {
        if hunk.is_open() {
            let marker = line.chars().next();
            hunk.consume(marker);
            if active && matches!(marker, Some(' ' | '-' | '+')) {
                let (prefix, body) = line.split_at(1);
                if let Some(replaced) = rules.apply(body) {
                    output.push_str(prefix);
                    output.push_str(&replaced);
                    changed = true;
                    continue;
                }
            }
            output.push_str(line);
            continue;
        }

        if let Some(rest) = line.strip_prefix("--- ") {
            old_path = header_path(rest);
            active = false;
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let target = header_path(rest).or_else(|| old_path.take());
            active = match target {
                Some(path) => covered(specs, &path)?,
                None => false,
            };
        } else if line.starts_with("@@ ") {
            match Hunk::parse(line) {
                Some(parsed) => hunk = parsed,
                None => warn!("Malformed hunk header: {}", line.trim_end()),
            }
        }
        output.push_str(line);
    }

    Ok(changed.then_some(output))
}
