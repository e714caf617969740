//! Scripted media tool for tests.

use std::cell::{Cell, RefCell};
use std::fs;
use std::path::{Path, PathBuf};

use super::media::{MediaTool, ToolError};

/// Reports a fixed duration (or a probe failure) and "transcodes" by writing
/// a small file. Can be told to fail after writing partial output.
#[derive(Debug, Default)]
pub(crate) struct FakeTool {
    pub duration: Option<f64>,
    pub fail_transcode: Cell<bool>,
    pub transcodes: RefCell<Vec<(f64, f64, PathBuf)>>,
}

impl FakeTool {
    pub fn with_duration(secs: f64) -> Self {
        Self {
            duration: Some(secs),
            ..Self::default()
        }
    }

    pub fn transcode_count(&self) -> usize {
        self.transcodes.borrow().len()
    }
}

impl MediaTool for FakeTool {
    fn probe_duration(&self, _path: &Path) -> Result<f64, ToolError> {
        self.duration
            .ok_or_else(|| ToolError::Parse("missing format.duration".to_string()))
    }

    fn transcode(
        &self,
        _source: &Path,
        start_secs: f64,
        length_secs: f64,
        out: &Path,
    ) -> Result<(), ToolError> {
        self.transcodes
            .borrow_mut()
            .push((start_secs, length_secs, out.to_path_buf()));
        fs::write(out, format!("{}+{}", start_secs, length_secs)).map_err(|source| {
            ToolError::Spawn {
                program: "fake".to_string(),
                source,
            }
        })?;
        if self.fail_transcode.get() {
            return Err(ToolError::Failed {
                program: "fake".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "conversion failed".to_string(),
            });
        }
        Ok(())
    }
}
