//! Content store: read-only view of the backlog directory tree.
//!
//! Each immediate subdirectory of the backlog root is one work item; its name
//! is the item's identity. Listing is lexicographic so repeated runs make
//! predictable progress. Archiving moves a finished item directory into the
//! archive directory. Unprocessable items get a marker file and are left in
//! place.

mod marker;

pub use marker::SKIP_MARKER;

use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::ShortcastConfig;

/// One backlog entry: a directory with a source video and optional sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Directory name relative to the backlog root.
    pub id: String,
    pub dir: PathBuf,
    /// First video file (lexicographic) with a recognized extension.
    pub video: Option<PathBuf>,
    /// First `.txt` file (lexicographic).
    pub sidecar: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("read backlog {path}: {source}")]
    ReadBacklog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("archive destination already exists: {0}")]
    ArchiveExists(PathBuf),
    #[error("archive {item} to {dest}: {source}")]
    Archive {
        item: String,
        dest: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("mark {item} unprocessable: {source}")]
    Mark {
        item: String,
        #[source]
        source: io::Error,
    },
}

/// An item carrying the unprocessable marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnprocessableItem {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    backlog_dir: PathBuf,
    archive_dir: PathBuf,
    video_extensions: Vec<String>,
}

impl ContentStore {
    pub fn new(backlog_dir: PathBuf, archive_dir: PathBuf, video_extensions: Vec<String>) -> Self {
        let video_extensions = video_extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
            .collect();
        Self {
            backlog_dir,
            archive_dir,
            video_extensions,
        }
    }

    pub fn from_config(cfg: &ShortcastConfig) -> Self {
        Self::new(
            cfg.backlog_dir.clone(),
            cfg.archive_dir(),
            cfg.video_extensions.clone(),
        )
    }

    pub fn backlog_dir(&self) -> &Path {
        &self.backlog_dir
    }

    pub fn archive_dir(&self) -> &Path {
        &self.archive_dir
    }

    /// Candidate work items in deterministic (lexicographic) order.
    pub fn list_candidates(&self) -> Result<Vec<WorkItem>, StoreError> {
        let mut items = Vec::new();
        for (id, dir) in self.item_dirs()? {
            if marker::is_marked(&dir) {
                continue;
            }
            items.push(self.load_item(id, dir)?);
        }
        Ok(items)
    }

    /// Items excluded because they carry the unprocessable marker.
    pub fn list_unprocessable(&self) -> Result<Vec<UnprocessableItem>, StoreError> {
        Ok(self
            .item_dirs()?
            .into_iter()
            .filter_map(|(id, dir)| {
                marker::read_reason(&dir).map(|reason| UnprocessableItem { id, reason })
            })
            .collect())
    }

    /// Moves a fully published item into the archive directory.
    ///
    /// Fails if the destination already exists; the item stays where it is.
    pub fn archive(&self, item: &WorkItem) -> Result<(), StoreError> {
        let dest = self.archive_dir.join(&item.id);
        let archive_err = |source| StoreError::Archive {
            item: item.id.clone(),
            dest: dest.clone(),
            source,
        };
        fs::create_dir_all(&self.archive_dir).map_err(archive_err)?;
        if dest.exists() {
            return Err(StoreError::ArchiveExists(dest.clone()));
        }
        fs::rename(&item.dir, &dest).map_err(archive_err)?;
        tracing::info!(item = %item.id, dest = %dest.display(), "archived work item");
        Ok(())
    }

    /// Marks an item unprocessable so future listings skip it. Never deletes anything.
    pub fn mark_unprocessable(&self, item: &WorkItem, reason: &str) -> Result<(), StoreError> {
        marker::write_marker(&item.dir, reason).map_err(|source| StoreError::Mark {
            item: item.id.clone(),
            source,
        })?;
        tracing::warn!(item = %item.id, reason, "marked work item unprocessable");
        Ok(())
    }

    /// Visible subdirectories of the backlog, sorted by name, minus the archive directory.
    fn item_dirs(&self) -> Result<Vec<(String, PathBuf)>, StoreError> {
        let read_err = |source| StoreError::ReadBacklog {
            path: self.backlog_dir.clone(),
            source,
        };
        let archive = fs::canonicalize(&self.archive_dir).ok();
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.backlog_dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                tracing::warn!(path = %path.display(), "skipping backlog entry with non UTF-8 name");
                continue;
            };
            if id.starts_with('.') {
                continue;
            }
            if archive.is_some() && fs::canonicalize(&path).ok() == archive {
                continue;
            }
            out.push((id, path));
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn load_item(&self, id: String, dir: PathBuf) -> Result<WorkItem, StoreError> {
        let read_err = |source| StoreError::ReadBacklog {
            path: dir.clone(),
            source,
        };
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir).map_err(read_err)? {
            let path = entry.map_err(read_err)?.path();
            let hidden = path
                .file_name()
                .and_then(OsStr::to_str)
                .map_or(true, |n| n.starts_with('.'));
            if path.is_file() && !hidden {
                files.push(path);
            }
        }
        files.sort();

        let video = files.iter().find(|p| self.is_video(p)).cloned();
        let sidecar = files
            .iter()
            .find(|p| extension_lower(p).as_deref() == Some("txt"))
            .cloned();
        Ok(WorkItem {
            id,
            dir,
            video,
            sidecar,
        })
    }

    fn is_video(&self, path: &Path) -> bool {
        extension_lower(path).map_or(false, |ext| self.video_extensions.contains(&ext))
    }
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
}
