//! Segmenter: splits over-length sources into bounded parts.
//!
//! Planning is a pure function of the item, the source file and its
//! duration; part files are content addressed and materialized lazily, one
//! at a time, right before they are needed. An existing part file is always
//! reused as is. New parts are transcoded into a temp name and renamed into
//! place only after the transcoder reports success, so a half-written file
//! can never be mistaken for a finished part.

mod media;
mod plan;

#[cfg(test)]
pub(crate) mod testing;

pub use media::{parse_probe_duration, Ffmpeg, MediaTool, ToolError};
pub use plan::{part_count, plan_parts, PartSpan, MIN_TAIL_SECS};

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::metadata::sanitize_path_component;

/// Suffix of in-progress part files.
pub const TEMP_SUFFIX: &str = ".tmp";

/// One part of a work item, ready to be materialized and uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct PartRef {
    pub item_id: String,
    /// 1-based.
    pub index: u32,
    pub total: u32,
    pub start_secs: f64,
    pub length_secs: f64,
    pub source: PathBuf,
    /// Where the part lives; equals `source` for single-part items.
    pub path: PathBuf,
    /// True when the part is the untouched source file.
    pub whole_source: bool,
}

#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("duration of {path}: {source}")]
    Duration {
        path: PathBuf,
        #[source]
        source: ToolError,
    },
    #[error("inspect source {path}: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("prepare part file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("transcode of part {index} failed: {source}")]
    Transcode {
        index: u32,
        #[source]
        source: ToolError,
    },
    #[error("transcoder reported success but left no output at {0}")]
    EmptyOutput(PathBuf),
}

/// Path used while a part is being written: appends `.tmp` to the final path.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

fn millis(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

/// Content-addressed file name for one part.
fn part_file_name(
    item_id: &str,
    source_name: &str,
    source_len: u64,
    max_part_secs: f64,
    span: &PartSpan,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(source_name.as_bytes());
    hasher.update([0u8]);
    hasher.update(source_len.to_le_bytes());
    hasher.update(millis(max_part_secs).to_le_bytes());
    hasher.update(millis(span.start_secs).to_le_bytes());
    hasher.update(millis(span.length_secs).to_le_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("p{:03}-{}.mp4", span.index, &digest[..12])
}

pub struct Segmenter<M> {
    tool: M,
    parts_dir: PathBuf,
    max_part_secs: f64,
}

impl<M: MediaTool> Segmenter<M> {
    pub fn new(tool: M, parts_dir: PathBuf, max_part_secs: f64) -> Self {
        Self {
            tool,
            parts_dir,
            max_part_secs,
        }
    }

    /// Directory holding the generated parts of one item.
    pub fn item_parts_dir(&self, item_id: &str) -> PathBuf {
        self.parts_dir.join(sanitize_path_component(item_id))
    }

    pub fn max_part_secs(&self) -> f64 {
        self.max_part_secs
    }

    /// Source duration in seconds, with no fallback.
    pub fn measured_duration(&self, source: &Path) -> Result<f64, SegmentError> {
        let duration_err = |source_err| SegmentError::Duration {
            path: source.to_path_buf(),
            source: source_err,
        };
        match self.tool.probe_duration(source) {
            Ok(secs) if secs.is_finite() && secs > 0.0 => Ok(secs),
            Ok(secs) => Err(duration_err(ToolError::Parse(format!(
                "duration out of range: {}",
                secs
            )))),
            Err(e) => Err(duration_err(e)),
        }
    }

    /// Source duration in seconds.
    ///
    /// A failed probe yields `max_part_secs`: the item is then treated as a
    /// single part and uploaded whole instead of blocking the backlog. Only
    /// valid for items without recorded progress.
    pub fn duration(&self, source: &Path) -> f64 {
        self.measured_duration(source).unwrap_or_else(|e| {
            tracing::warn!(source = %source.display(), "assuming one part: {}", e);
            self.max_part_secs
        })
    }

    /// Plans the parts of `source`. Does not touch the transcoder.
    pub fn compute_parts(
        &self,
        item_id: &str,
        source: &Path,
        duration: f64,
    ) -> Result<Vec<PartRef>, SegmentError> {
        let spans = plan_parts(duration, self.max_part_secs);
        let total = spans.len() as u32;

        if total == 1 {
            return Ok(vec![PartRef {
                item_id: item_id.to_string(),
                index: 1,
                total: 1,
                start_secs: 0.0,
                length_secs: spans[0].length_secs,
                source: source.to_path_buf(),
                path: source.to_path_buf(),
                whole_source: true,
            }]);
        }

        let source_len = fs::metadata(source)
            .map_err(|e| SegmentError::Source {
                path: source.to_path_buf(),
                source: e,
            })?
            .len();
        let source_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let dir = self.item_parts_dir(item_id);

        Ok(spans
            .iter()
            .map(|span| PartRef {
                item_id: item_id.to_string(),
                index: span.index,
                total,
                start_secs: span.start_secs,
                length_secs: span.length_secs,
                source: source.to_path_buf(),
                path: dir.join(part_file_name(
                    item_id,
                    &source_name,
                    source_len,
                    self.max_part_secs,
                    span,
                )),
                whole_source: false,
            })
            .collect())
    }

    /// Makes sure the part file exists, transcoding it if needed.
    pub fn ensure_part(&self, part: &PartRef) -> Result<(), SegmentError> {
        if part.whole_source {
            return Ok(());
        }
        if part.path.is_file() {
            tracing::debug!(item = %part.item_id, part = part.index, path = %part.path.display(), "reusing existing part");
            return Ok(());
        }

        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SegmentError::Io { path, source }
        };
        if let Some(dir) = part.path.parent() {
            fs::create_dir_all(dir).map_err(io_err(dir))?;
        }
        let tmp = temp_path(&part.path);
        remove_if_exists(&tmp).map_err(io_err(&tmp))?;

        tracing::info!(
            item = %part.item_id,
            part = part.index,
            total = part.total,
            start_secs = part.start_secs,
            length_secs = part.length_secs,
            "generating part"
        );
        if let Err(source) =
            self.tool
                .transcode(&part.source, part.start_secs, part.length_secs, &tmp)
        {
            if let Err(e) = remove_if_exists(&tmp) {
                tracing::warn!(path = %tmp.display(), "could not remove failed part output: {}", e);
            }
            return Err(SegmentError::Transcode {
                index: part.index,
                source,
            });
        }

        let produced = fs::metadata(&tmp).map(|m| m.len() > 0).unwrap_or(false);
        if !produced {
            let _ = remove_if_exists(&tmp);
            return Err(SegmentError::EmptyOutput(tmp));
        }
        fs::rename(&tmp, &part.path).map_err(io_err(&part.path))?;
        Ok(())
    }

    /// Deletes the generated parts of an item. Failures are logged, not returned:
    /// parts are derived data.
    pub fn purge(&self, item_id: &str) {
        let dir = self.item_parts_dir(item_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => tracing::debug!(item = item_id, dir = %dir.display(), "removed cached parts"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(item = item_id, dir = %dir.display(), "could not remove cached parts: {}", e),
        }
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeTool;
    use super::*;

    fn setup(duration: Option<f64>) -> (tempfile::TempDir, PathBuf, FakeTool) {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("story1.mp4");
        fs::write(&source, vec![7u8; 4096]).unwrap();
        let tool = FakeTool {
            duration,
            ..FakeTool::default()
        };
        (dir, source, tool)
    }

    #[test]
    fn short_source_is_single_whole_part() {
        let (dir, source, tool) = setup(Some(59.0));
        let seg = Segmenter::new(&tool, dir.path().join("parts"), 59.0);
        let parts = seg.compute_parts("story1", &source, seg.duration(&source)).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].whole_source);
        assert_eq!(parts[0].path, source);
        seg.ensure_part(&parts[0]).unwrap();
        assert_eq!(tool.transcode_count(), 0);
    }

    #[test]
    fn probe_failure_falls_back_to_single_part() {
        let (dir, source, tool) = setup(None);
        let seg = Segmenter::new(&tool, dir.path().join("parts"), 59.0);
        assert_eq!(seg.duration(&source), 59.0);
        assert!(matches!(
            seg.measured_duration(&source),
            Err(SegmentError::Duration { .. })
        ));
        let parts = seg.compute_parts("story1", &source, seg.duration(&source)).unwrap();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].whole_source);
    }

    #[test]
    fn long_source_plans_content_addressed_parts() {
        let (dir, source, tool) = setup(Some(130.0));
        let seg = Segmenter::new(&tool, dir.path().join("parts"), 59.0);
        let parts = seg.compute_parts("story1", &source, 130.0).unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.total == 3 && !p.whole_source));
        assert_eq!(parts[2].start_secs, 118.0);
        assert_eq!(parts[2].length_secs, 12.0);
        assert!(parts[0].path.starts_with(dir.path().join("parts/story1")));
        assert!(parts[1]
            .path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("p002-"));

        let again = seg.compute_parts("story1", &source, 130.0).unwrap();
        assert_eq!(parts, again);
        assert_eq!(tool.transcode_count(), 0, "planning must not transcode");
    }

    #[test]
    fn changing_the_bound_changes_part_names() {
        let (dir, source, tool) = setup(Some(130.0));
        let a = Segmenter::new(&tool, dir.path().join("parts"), 59.0)
            .compute_parts("story1", &source, 130.0)
            .unwrap();
        let b = Segmenter::new(&tool, dir.path().join("parts"), 60.0)
            .compute_parts("story1", &source, 130.0)
            .unwrap();
        assert_ne!(a[0].path, b[0].path);
    }

    #[test]
    fn ensure_part_transcodes_once_then_reuses() {
        let (dir, source, tool) = setup(Some(130.0));
        let seg = Segmenter::new(&tool, dir.path().join("parts"), 59.0);
        let parts = seg.compute_parts("story1", &source, 130.0).unwrap();

        seg.ensure_part(&parts[1]).unwrap();
        assert!(parts[1].path.is_file());
        assert!(!temp_path(&parts[1].path).exists());
        assert_eq!(tool.transcodes.borrow()[0].0, 59.0);
        assert_eq!(tool.transcodes.borrow()[0].1, 59.0);

        seg.ensure_part(&parts[1]).unwrap();
        assert_eq!(tool.transcode_count(), 1);
        assert!(!parts[0].path.exists(), "only the requested part is generated");
    }

    #[test]
    fn failed_transcode_leaves_no_part_file() {
        let (dir, source, tool) = setup(Some(130.0));
        tool.fail_transcode.set(true);
        let seg = Segmenter::new(&tool, dir.path().join("parts"), 59.0);
        let parts = seg.compute_parts("story1", &source, 130.0).unwrap();

        let err = seg.ensure_part(&parts[0]).unwrap_err();
        assert!(matches!(err, SegmentError::Transcode { index: 1, .. }));
        assert!(!parts[0].path.exists());
        assert!(!temp_path(&parts[0].path).exists());

        tool.fail_transcode.set(false);
        seg.ensure_part(&parts[0]).unwrap();
        assert!(parts[0].path.is_file());
    }

    #[test]
    fn purge_removes_item_parts() {
        let (dir, source, tool) = setup(Some(130.0));
        let seg = Segmenter::new(&tool, dir.path().join("parts"), 59.0);
        let parts = seg.compute_parts("story1", &source, 130.0).unwrap();
        seg.ensure_part(&parts[0]).unwrap();
        seg.purge("story1");
        assert!(!seg.item_parts_dir("story1").exists());
        seg.purge("story1");
    }
}
