#![allow(dead_code)]

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

pub const ROOT_CLASS: &str = "PartitionCls";

pub fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/avionics")
}

/// Copies the avionics fixture into a fresh temporary directory.
pub fn fixture_copy() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    copy_tree(&fixture_root(), dir.path()).unwrap();
    dir
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            fs::create_dir_all(&target)?;
            copy_tree(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

pub fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).unwrap()
}
