//! Video metadata: sidecar parsing and the per-part title/description.
//!
//! A work item may carry a `.txt` sidecar. Two layouts are understood:
//!
//! ```text
//! Title: Night shift, part one
//! Description:
//! The longer text, possibly
//! spanning lines.
//! ```
//!
//! or, without labels, the first non-empty line as title and everything
//! after it as description.

mod sanitize;

pub use sanitize::{
    part_title, sanitize_description, sanitize_path_component, sanitize_title, title_from_stem,
    FALLBACK_TITLE, MAX_DESCRIPTION_BYTES, MAX_TITLE_CHARS,
};

use std::io;
use std::path::Path;

use crate::config::{Privacy, UploadConfig};

/// Title and description as authored in a sidecar, before sanitizing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SidecarText {
    pub title: String,
    pub description: String,
}

/// Everything sent to the endpoint alongside the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
    pub made_for_kids: bool,
}

/// Per-video settings that do not depend on the work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishDefaults {
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
    pub made_for_kids: bool,
}

impl PublishDefaults {
    pub fn from_config(cfg: &UploadConfig) -> Self {
        Self {
            tags: cfg.tags.clone(),
            category_id: cfg.category_id.clone(),
            privacy: cfg.privacy,
            made_for_kids: cfg.made_for_kids,
        }
    }

    /// Metadata for part `index` of `total`, with the part qualifier appended when needed.
    pub fn for_part(&self, text: &SidecarText, index: u32, total: u32) -> VideoMetadata {
        let base = sanitize_title(&text.title);
        VideoMetadata {
            title: part_title(&base, index, total),
            description: sanitize_description(&text.description),
            tags: self.tags.clone(),
            category_id: self.category_id.clone(),
            privacy: self.privacy,
            made_for_kids: self.made_for_kids,
        }
    }
}

fn label_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let (name, rest) = line.split_once(':')?;
    if name.trim().eq_ignore_ascii_case(label) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Parses sidecar text into title and description.
pub fn parse_sidecar(text: &str) -> SidecarText {
    let lines: Vec<&str> = text.lines().collect();
    let labelled = lines
        .iter()
        .any(|l| label_value(l, "title").is_some() || label_value(l, "description").is_some());

    if labelled {
        let mut title = String::new();
        let mut description: Vec<&str> = Vec::new();
        let mut in_description = false;
        for line in &lines {
            if let Some(v) = label_value(line, "title").filter(|_| !in_description) {
                title = v.to_string();
            } else if let Some(v) = label_value(line, "description").filter(|_| !in_description) {
                in_description = true;
                if !v.is_empty() {
                    description.push(v);
                }
            } else if in_description {
                description.push(*line);
            }
        }
        return SidecarText {
            title,
            description: description.join("\n").trim().to_string(),
        };
    }

    let mut rest = lines.iter().skip_while(|l| l.trim().is_empty());
    let title = rest.next().map(|l| l.trim().to_string()).unwrap_or_default();
    let description = rest.copied().collect::<Vec<_>>().join("\n").trim().to_string();
    SidecarText { title, description }
}

/// Reads and parses a sidecar file.
pub fn read_sidecar(path: &Path) -> io::Result<SidecarText> {
    let bytes = std::fs::read(path)?;
    Ok(parse_sidecar(&String::from_utf8_lossy(&bytes)))
}

/// Sidecar text for a video: the sidecar when present and readable, otherwise
/// the video's file stem as title and an empty description.
pub fn load_text(video: &Path, sidecar: Option<&Path>) -> SidecarText {
    if let Some(path) = sidecar {
        match read_sidecar(path) {
            Ok(text) if !text.title.trim().is_empty() => return text,
            Ok(text) => {
                tracing::warn!(sidecar = %path.display(), "sidecar has no title, using file name");
                return SidecarText {
                    title: stem_title(video),
                    description: text.description,
                };
            }
            Err(e) => {
                tracing::warn!(sidecar = %path.display(), "could not read sidecar: {}", e);
            }
        }
    } else {
        tracing::warn!(video = %video.display(), "no sidecar found, using file name as title");
    }
    SidecarText {
        title: stem_title(video),
        description: String::new(),
    }
}

fn stem_title(video: &Path) -> String {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    title_from_stem(&stem)
}
