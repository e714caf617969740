//! `shortcast plan <video>` – show the part plan for a source video.

use anyhow::{Context, Result};
use shortcast_core::config::ShortcastConfig;
use shortcast_core::segmenter::{Ffmpeg, Segmenter};
use std::path::Path;

pub fn run_plan(cfg: &ShortcastConfig, video: &Path) -> Result<()> {
    let paths = cfg.resolve_paths()?;
    let item_id = video
        .parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "-".to_string());
    let segmenter = Segmenter::new(
        Ffmpeg::from_config(&cfg.segment),
        paths.parts_dir,
        cfg.max_part_seconds,
    );
    let duration = segmenter.duration(video);
    let parts = segmenter
        .compute_parts(&item_id, video, duration)
        .with_context(|| format!("plan {}", video.display()))?;

    println!(
        "{} ({:.3}s, max {:.3}s per part): {} part(s)",
        video.display(),
        duration,
        segmenter.max_part_secs(),
        parts.len()
    );
    println!("{:<6} {:>10} {:>10}  {}", "PART", "START", "LENGTH", "FILE");
    for p in parts {
        let file = if p.whole_source {
            "(source, uploaded as is)".to_string()
        } else {
            p.path.display().to_string()
        };
        println!(
            "{:<6} {:>10.3} {:>10.3}  {}",
            format!("{}/{}", p.index, p.total),
            p.start_secs,
            p.length_secs,
            file
        );
    }
    Ok(())
}
