use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Retry policy parameters (optional `[retry]` section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries per upload after the first attempt.
    pub max_retries: u32,
    /// Base delay in seconds; the n-th retry waits `base * 2^n`.
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay_secs: 1.0,
            max_delay_secs: 60,
        }
    }
}

/// Transcode parameters used when a source has to be split into parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub ffmpeg: String,
    pub ffprobe: String,
    pub frame_rate: u32,
    pub pixel_format: String,
    pub video_codec: String,
    pub preset: String,
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            frame_rate: 30,
            pixel_format: "yuv420p".to_string(),
            video_codec: "libx264".to_string(),
            preset: "veryfast".to_string(),
            crf: 20,
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
        }
    }
}

/// Visibility of published videos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Public,
    Unlisted,
    Private,
}

impl Privacy {
    pub fn as_str(self) -> &'static str {
        match self {
            Privacy::Public => "public",
            Privacy::Unlisted => "unlisted",
            Privacy::Private => "private",
        }
    }
}

/// Remote endpoint and per-video publishing defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Resumable upload endpoint (the session is opened with a POST here).
    pub endpoint: String,
    /// Bytes sent per chunk. The endpoint expects multiples of 256 KiB except for the last chunk.
    pub chunk_bytes: u64,
    pub privacy: Privacy,
    pub tags: Vec<String>,
    pub category_id: String,
    pub made_for_kids: bool,
    pub connect_timeout_secs: u64,
    /// Upper bound for a single HTTP exchange (one chunk).
    pub request_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://www.googleapis.com/upload/youtube/v3/videos".to_string(),
            chunk_bytes: 8 * 1024 * 1024,
            privacy: Privacy::Public,
            tags: Vec::new(),
            category_id: "22".to_string(),
            made_for_kids: false,
            connect_timeout_secs: 30,
            request_timeout_secs: 600,
        }
    }
}

/// Where the access token comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// OAuth token file holding `client_id`, `client_secret` and `refresh_token`.
    /// When unset, a ready-made access token is read from `access_token_env`.
    pub token_file: Option<PathBuf>,
    pub access_token_env: String,
    /// Used when the token file does not carry its own `token_uri`.
    pub token_uri: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_file: None,
            access_token_env: "SHORTCAST_ACCESS_TOKEN".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        }
    }
}

/// Global configuration loaded from `~/.config/shortcast/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortcastConfig {
    /// Backlog root; every subdirectory is one work item.
    pub backlog_dir: PathBuf,
    /// Where fully published items are moved. Defaults to `<backlog_dir>/Uploaded`.
    #[serde(default)]
    pub archive_dir: Option<PathBuf>,
    /// Cache for generated parts. Defaults to `~/.cache/shortcast/parts`.
    #[serde(default)]
    pub parts_dir: Option<PathBuf>,
    /// Progress ledger file. Defaults to `~/.local/state/shortcast/ledger.json`.
    #[serde(default)]
    pub ledger_path: Option<PathBuf>,
    /// Longest part the platform accepts, in seconds.
    pub max_part_seconds: f64,
    /// Extensions (without dot, case-insensitive) recognized as source videos.
    pub video_extensions: Vec<String>,
    #[serde(default)]
    pub segment: SegmentConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for ShortcastConfig {
    fn default() -> Self {
        Self {
            backlog_dir: PathBuf::from("clips"),
            archive_dir: None,
            parts_dir: None,
            ledger_path: None,
            max_part_seconds: 59.0,
            video_extensions: vec!["mp4".to_string()],
            segment: SegmentConfig::default(),
            upload: UploadConfig::default(),
            retry: RetryConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

/// Filesystem locations after defaults are applied. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub backlog_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub parts_dir: PathBuf,
    pub ledger_path: PathBuf,
}

impl ShortcastConfig {
    /// Archive directory with the default applied.
    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.backlog_dir.join("Uploaded"))
    }

    /// Resolve every path, falling back to XDG cache/state locations.
    pub fn resolve_paths(&self) -> Result<ResolvedPaths> {
        let parts_dir = match &self.parts_dir {
            Some(p) => p.clone(),
            None => xdg_dirs()?
                .create_cache_directory("parts")
                .context("create parts cache directory")?,
        };
        let ledger_path = match &self.ledger_path {
            Some(p) => p.clone(),
            None => xdg_dirs()?
                .place_state_file("ledger.json")
                .context("create state directory for ledger")?,
        };
        Ok(ResolvedPaths {
            backlog_dir: self.backlog_dir.clone(),
            archive_dir: self.archive_dir(),
            parts_dir,
            ledger_path,
        })
    }

    /// Rejects values that would make segmentation or chunking meaningless.
    pub fn validate(&self) -> Result<()> {
        if !(self.max_part_seconds.is_finite() && self.max_part_seconds > 0.0) {
            anyhow::bail!(
                "max_part_seconds must be a positive number, got {}",
                self.max_part_seconds
            );
        }
        if self.upload.chunk_bytes == 0 {
            anyhow::bail!("upload.chunk_bytes must be greater than zero");
        }
        if self.video_extensions.is_empty() {
            anyhow::bail!("video_extensions must list at least one extension");
        }
        Ok(())
    }
}

fn xdg_dirs() -> Result<xdg::BaseDirectories> {
    Ok(xdg::BaseDirectories::with_prefix("shortcast")?)
}

pub fn config_path() -> Result<PathBuf> {
    Ok(xdg_dirs()?.place_config_file("config.toml")?)
}

/// Load configuration from the default location, creating a default file if none exists.
pub fn load_or_init() -> Result<ShortcastConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ShortcastConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

/// Load configuration from an explicit file. A missing file is an error here.
pub fn load_from_path(path: &Path) -> Result<ShortcastConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config: {}", path.display()))?;
    let cfg: ShortcastConfig =
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
