//! Shared test utilities for the CLI E2E tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_bundle("linux", &[], &[]);
//!     fixture.command().args(["bunnfo", "--list"]).assert().success();
//! }
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::TestFixture;
}

/// A temporary buildspace: `resources/`, `buildspace/` and the working
/// directory for the command all live under one temp dir.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a fixture with empty `resources/config_bundles` and
    /// `buildspace/downloads` directories.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir
            .child("resources/config_bundles")
            .create_dir_all()
            .expect("Failed to create bundles dir");
        temp_dir
            .child("buildspace/downloads")
            .create_dir_all()
            .expect("Failed to create downloads dir");
        Self { temp_dir }
    }

    /// Add a base bundle with its descriptor and component files.
    pub fn with_bundle(self, name: &str, depends: &[&str], files: &[(&str, &str)]) -> Self {
        let dir = self.temp_dir.child("resources/config_bundles").child(name);
        dir.child("bundlemeta.ini")
            .write_str(&format!(
                "[bundle]\ndisplay_name = {} bundle\ndepends = {}\n",
                name,
                depends.join(", ")
            ))
            .expect("Failed to write bundlemeta.ini");
        for (file, content) in files {
            dir.child(file).write_str(content).expect("Failed to write bundle file");
        }
        self
    }

    /// Add a shared patch under `resources/patches`.
    pub fn with_patch(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child("resources/patches")
            .child(path)
            .write_str(content)
            .expect("Failed to write patch");
        self
    }

    /// Add a file relative to the fixture root.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Write a gzip tarball into `buildspace/downloads` and return its
    /// SHA-256.
    pub fn archive(&self, filename: &str, entries: &[(&str, &str)]) -> String {
        let path = self.path().join("buildspace/downloads").join(filename);
        let file = File::create(&path).expect("Failed to create archive");
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .expect("Failed to append entry");
        }
        builder
            .into_inner()
            .and_then(|gz| gz.finish())
            .expect("Failed to finish archive");
        bundlekit::retrieval::digest::file_digest(
            &path,
            bundlekit::retrieval::digest::HashAlgorithm::Sha256,
        )
        .expect("Failed to hash archive")
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of a fixture-relative path.
    pub fn join(&self, path: &str) -> PathBuf {
        self.temp_dir.path().join(path)
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command running in the fixture root, isolated from the
    /// caller's bundlekit environment variables.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("bundlekit");
        cmd.current_dir(self.path())
            .env_remove("BUNDLEKIT_RESOURCES")
            .env_remove("BUNDLEKIT_USER_BUNDLE")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
