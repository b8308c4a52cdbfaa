use archivist_archivers::{
    Archiver, ArchiverChain, Collaborators, DisabledScreenshots, FfmpegThumbnailer, PlatformArchiver,
    Sha256Hasher, YtDlpExtractor,
};
use archivist_core::{ArchiveResult, Config};
use archivist_storage::Storage;
use serde::Serialize;
use std::sync::Arc;

/// One line of CLI output.
#[derive(Debug, Serialize)]
pub struct ArchiveRecord {
    pub url: String,
    /// `None` when no archiver could handle the URL.
    pub archiver: Option<String>,
    pub result: Option<ArchiveResult>,
}

/// Archivers in dispatch order: platform specific first, the generic
/// extractor last.
pub fn build_chain(config: &Config, storage: Arc<dyn Storage>) -> ArchiverChain {
    let extractor = YtDlpExtractor::new(config.ytdlp_path())
        .with_facebook_cookie(config.facebook_cookie().map(String::from));
    let collaborators = Collaborators {
        extractor: Arc::new(extractor),
        thumbnailer: Arc::new(FfmpegThumbnailer::new(
            config.ffmpeg_path(),
            storage.clone(),
            config.thumbnail_count(),
        )),
        hasher: Arc::new(Sha256Hasher),
        screenshots: Arc::new(DisabledScreenshots),
    };

    let tiktok: Arc<dyn Archiver> = Arc::new(PlatformArchiver::tiktok(
        storage.clone(),
        collaborators.clone(),
        config.scratch_dir(),
    ));
    let youtube_dl: Arc<dyn Archiver> = Arc::new(PlatformArchiver::youtube_dl(
        storage,
        collaborators,
        config.scratch_dir(),
    ));

    ArchiverChain::new(vec![tiktok, youtube_dl])
}

/// Initialize tracing for the CLI.
///
/// `RUST_LOG` overrides the default `archivist=info` filter; `LOG_FORMAT=json`
/// switches to JSON lines.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("archivist=info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
