//! Unprocessable marker: a small file inside the item directory whose
//! presence removes the item from candidate listings.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// File name of the marker placed inside an item directory.
pub const SKIP_MARKER: &str = ".shortcast-skip";

pub fn marker_path(item_dir: &Path) -> PathBuf {
    item_dir.join(SKIP_MARKER)
}

pub fn is_marked(item_dir: &Path) -> bool {
    marker_path(item_dir).is_file()
}

/// Writes the marker with `reason` as its content. Overwrites an existing marker.
pub fn write_marker(item_dir: &Path, reason: &str) -> io::Result<()> {
    let mut file = fs::File::create(marker_path(item_dir))?;
    writeln!(file, "{}", reason)?;
    file.sync_all()
}

/// Reason recorded in the marker, if the marker exists.
pub fn read_reason(item_dir: &Path) -> Option<String> {
    fs::read_to_string(marker_path(item_dir))
        .ok()
        .map(|s| s.trim().to_string())
}
