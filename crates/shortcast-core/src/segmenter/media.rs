//! Media tool boundary: duration probe and single-range transcode.
//!
//! The production implementation shells out to `ffprobe`/`ffmpeg`. The
//! [`MediaTool`] trait is the seam the segmenter depends on.

use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::process::Command;

use serde::Deserialize;
use thiserror::Error;

use crate::config::SegmentConfig;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("could not run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
    #[error("unusable probe output: {0}")]
    Parse(String),
}

/// External probe/transcode tool.
pub trait MediaTool {
    /// Total duration of the media container in seconds.
    fn probe_duration(&self, path: &Path) -> Result<f64, ToolError>;

    /// Writes `[start, start + length)` of `source` to `out`, re-encoded.
    /// Deterministic for identical inputs.
    fn transcode(
        &self,
        source: &Path,
        start_secs: f64,
        length_secs: f64,
        out: &Path,
    ) -> Result<(), ToolError>;
}

impl<T: MediaTool + ?Sized> MediaTool for &T {
    fn probe_duration(&self, path: &Path) -> Result<f64, ToolError> {
        (**self).probe_duration(path)
    }

    fn transcode(
        &self,
        source: &Path,
        start_secs: f64,
        length_secs: f64,
        out: &Path,
    ) -> Result<(), ToolError> {
        (**self).transcode(source, start_secs, length_secs, out)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parses `ffprobe -show_entries format=duration -of json` output.
pub fn parse_probe_duration(json: &str) -> Result<f64, ToolError> {
    let out: ProbeOutput =
        serde_json::from_str(json).map_err(|e| ToolError::Parse(e.to_string()))?;
    let raw = out
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| ToolError::Parse("missing format.duration".to_string()))?;
    let secs: f64 = raw
        .trim()
        .parse()
        .map_err(|_| ToolError::Parse(format!("duration is not a number: {:?}", raw)))?;
    if !(secs.is_finite() && secs > 0.0) {
        return Err(ToolError::Parse(format!("duration out of range: {}", secs)));
    }
    Ok(secs)
}

/// `ffprobe` + `ffmpeg` with fixed frame rate, pixel format and codecs.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    cfg: SegmentConfig,
}

impl Ffmpeg {
    pub fn from_config(cfg: &SegmentConfig) -> Self {
        Self { cfg: cfg.clone() }
    }

    /// Arguments for one transcode invocation (everything after the program name).
    pub fn transcode_args(
        &self,
        source: &Path,
        start_secs: f64,
        length_secs: f64,
        out: &Path,
    ) -> Vec<OsString> {
        let c = &self.cfg;
        vec![
            "-y".into(),
            "-v".into(),
            "error".into(),
            "-ss".into(),
            format!("{:.3}", start_secs).into(),
            "-i".into(),
            source.as_os_str().to_owned(),
            "-t".into(),
            format!("{:.3}", length_secs).into(),
            "-r".into(),
            c.frame_rate.to_string().into(),
            "-pix_fmt".into(),
            c.pixel_format.as_str().into(),
            "-c:v".into(),
            c.video_codec.as_str().into(),
            "-preset".into(),
            c.preset.as_str().into(),
            "-crf".into(),
            c.crf.to_string().into(),
            "-c:a".into(),
            c.audio_codec.as_str().into(),
            "-b:a".into(),
            c.audio_bitrate.as_str().into(),
            "-movflags".into(),
            "+faststart".into(),
            "-f".into(),
            "mp4".into(),
            out.as_os_str().to_owned(),
        ]
    }
}

fn run(program: &str, args: &[OsString]) -> Result<Vec<u8>, ToolError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| ToolError::Spawn {
            program: program.to_string(),
            source,
        })?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        let tail_start = stderr
            .char_indices()
            .rev()
            .nth(499)
            .map_or(0, |(i, _)| i);
        return Err(ToolError::Failed {
            program: program.to_string(),
            status: output.status.to_string(),
            stderr: stderr[tail_start..].to_string(),
        });
    }
    Ok(output.stdout)
}

impl MediaTool for Ffmpeg {
    fn probe_duration(&self, path: &Path) -> Result<f64, ToolError> {
        let args: Vec<OsString> = vec![
            "-v".into(),
            "error".into(),
            "-show_entries".into(),
            "format=duration".into(),
            "-of".into(),
            "json".into(),
            path.as_os_str().to_owned(),
        ];
        let stdout = run(&self.cfg.ffprobe, &args)?;
        parse_probe_duration(&String::from_utf8_lossy(&stdout))
    }

    fn transcode(
        &self,
        source: &Path,
        start_secs: f64,
        length_secs: f64,
        out: &Path,
    ) -> Result<(), ToolError> {
        let args = self.transcode_args(source, start_secs, length_secs, out);
        tracing::debug!(
            source = %source.display(),
            start_secs,
            length_secs,
            "running {}",
            self.cfg.ffmpeg
        );
        run(&self.cfg.ffmpeg, &args).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_probe_duration() {
        let json = r#"{ "format": { "duration": "130.048000" } }"#;
        assert!((parse_probe_duration(json).unwrap() - 130.048).abs() < 1e-9);
    }

    #[test]
    fn probe_without_duration_is_an_error() {
        assert!(parse_probe_duration(r#"{ "format": {} }"#).is_err());
        assert!(parse_probe_duration(r#"{}"#).is_err());
        assert!(parse_probe_duration(r#"{ "format": { "duration": "N/A" } }"#).is_err());
        assert!(parse_probe_duration(r#"{ "format": { "duration": "0.0" } }"#).is_err());
        assert!(parse_probe_duration("not json").is_err());
    }

    #[test]
    fn transcode_args_fix_rate_format_and_codecs() {
        let tool = Ffmpeg::from_config(&SegmentConfig::default());
        let args: Vec<String> = tool
            .transcode_args(
                &PathBuf::from("/in/story.mp4"),
                59.0,
                12.5,
                &PathBuf::from("/out/p002.mp4.tmp"),
            )
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        let joined = args.join(" ");
        assert!(joined.starts_with("-y -v error -ss 59.000 -i /in/story.mp4 -t 12.500"));
        assert!(joined.contains("-r 30 -pix_fmt yuv420p -c:v libx264"));
        assert!(joined.contains("-c:a aac -b:a 128k"));
        assert!(joined.ends_with("-f mp4 /out/p002.mp4.tmp"));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let cfg = SegmentConfig {
            ffprobe: "/nonexistent/ffprobe-for-tests".to_string(),
            ..SegmentConfig::default()
        };
        let err = Ffmpeg::from_config(&cfg)
            .probe_duration(Path::new("x.mp4"))
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }));
    }
}
