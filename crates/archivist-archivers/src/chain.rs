use crate::archiver::{ArchiveOutcome, Archiver};
use archivist_core::ArchiveResult;
use std::sync::Arc;

/// Archivers tried in order; the first that does not return
/// [`ArchiveOutcome::NotApplicable`] handles the URL.
#[derive(Clone, Default)]
pub struct ArchiverChain {
    archivers: Vec<Arc<dyn Archiver>>,
}

impl ArchiverChain {
    pub fn new(archivers: Vec<Arc<dyn Archiver>>) -> Self {
        Self { archivers }
    }

    pub fn push(&mut self, archiver: Arc<dyn Archiver>) {
        self.archivers.push(archiver);
    }

    pub fn len(&self) -> usize {
        self.archivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archivers.is_empty()
    }

    /// Returns the name of the archiver that handled the URL with its result,
    /// or `None` when no archiver applies.
    #[tracing::instrument(skip(self))]
    pub async fn archive(
        &self,
        url: &str,
        check_if_exists: bool,
    ) -> Option<(String, ArchiveResult)> {
        for archiver in &self.archivers {
            match archiver.download(url, check_if_exists).await {
                ArchiveOutcome::NotApplicable => {
                    tracing::debug!(archiver = archiver.name(), "Archiver not applicable");
                }
                ArchiveOutcome::Completed(result) => {
                    tracing::info!(
                        archiver = archiver.name(),
                        status = %result.status(),
                        "URL archived"
                    );
                    return Some((archiver.name().to_string(), result));
                }
            }
        }

        tracing::warn!("No archiver could handle URL");
        None
    }
}
