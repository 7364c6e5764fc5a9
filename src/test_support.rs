//! Shared fixtures for unit tests.

use std::fs::{self, File};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::defaults::{BUNDLE_META_INI, CONFIG_BUNDLES_DIR};

/// Build a gzip tarball with the given (path, content) entries.
pub(crate) fn build_tar_gz(path: &Path, files: &[(&str, &[u8])]) {
    let file = File::create(path).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *content).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap();
}

/// Create `<resources>/config_bundles/<name>` with a descriptor and the given
/// component files.
pub(crate) fn write_base_bundle(
    resources: &Path,
    name: &str,
    depends: &[&str],
    files: &[(&str, &str)],
) {
    let dir = resources.join(CONFIG_BUNDLES_DIR).join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(BUNDLE_META_INI),
        format!(
            "[bundle]\ndisplay_name = {}\ndepends = {}\n",
            name,
            depends.join(", ")
        ),
    )
    .unwrap();
    for (file, content) in files {
        fs::write(dir.join(file), content).unwrap();
    }
}
