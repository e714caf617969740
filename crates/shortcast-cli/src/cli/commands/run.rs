//! `shortcast run` – one orchestrator step.

use anyhow::Result;
use shortcast_core::auth;
use shortcast_core::config::ShortcastConfig;
use shortcast_core::content_store::ContentStore;
use shortcast_core::metadata::PublishDefaults;
use shortcast_core::orchestrator::Orchestrator;
use shortcast_core::retry::RetryPolicy;
use shortcast_core::segmenter::{Ffmpeg, Segmenter};
use shortcast_core::transfer::{UploadSettings, Uploader};
use std::time::Duration;

pub fn run_step(cfg: &ShortcastConfig) -> Result<()> {
    let paths = cfg.resolve_paths()?;
    let store = ContentStore::from_config(cfg);
    let segmenter = Segmenter::new(
        Ffmpeg::from_config(&cfg.segment),
        paths.parts_dir,
        cfg.max_part_seconds,
    );
    let credentials = auth::provider_from_config(
        &cfg.auth,
        Duration::from_secs(cfg.upload.connect_timeout_secs.max(1)),
    );
    let uploader = Uploader::new(
        UploadSettings::from_config(&cfg.upload),
        RetryPolicy::from_config(&cfg.retry),
        credentials,
    );
    let orchestrator = Orchestrator::new(
        store,
        segmenter,
        paths.ledger_path,
        uploader,
        PublishDefaults::from_config(&cfg.upload),
    );

    match orchestrator.run_once() {
        Ok(outcome) => {
            println!("{}", outcome);
            Ok(())
        }
        Err(e) => {
            let status = e.status();
            tracing::error!(status, "run failed: {}", e);
            Err(anyhow::Error::new(e).context(format!("run failed ({})", status)))
        }
    }
}
