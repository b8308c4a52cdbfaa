use archivist_core::ArchiveResult;
use async_trait::async_trait;

/// What an archiver made of a URL.
#[derive(Debug, Clone)]
pub enum ArchiveOutcome {
    /// The URL is not for this archiver; the next one should try.
    NotApplicable,
    /// The archiver handled the URL. The result may still carry a failure status.
    Completed(ArchiveResult),
}

impl ArchiveOutcome {
    pub fn is_applicable(&self) -> bool {
        matches!(self, ArchiveOutcome::Completed(_))
    }

    pub fn into_result(self) -> Option<ArchiveResult> {
        match self {
            ArchiveOutcome::NotApplicable => None,
            ArchiveOutcome::Completed(result) => Some(result),
        }
    }
}

/// A platform-specific downloader.
///
/// `download` never fails: transport and platform errors are reported through
/// the result status.
#[async_trait]
pub trait Archiver: Send + Sync {
    /// Short identifier, also used as the storage key prefix.
    fn name(&self) -> &str;

    async fn download(&self, url: &str, check_if_exists: bool) -> ArchiveOutcome;
}
