//! Document download into the output directory.

use async_trait::async_trait;
use mgen_core::OutputFile;
use mgen_scraper::{FileSink, SinkError};
use mgen_session::Transport;
use std::path::Path;
use std::sync::Arc;

/// Downloads documents through the run's session.
///
/// A file already present under its target name is left alone, so
/// statements sharing a month keep the first one downloaded.
pub struct DownloadFileSink {
    session: Arc<dyn Transport>,
}

impl DownloadFileSink {
    #[must_use]
    pub fn new(session: Arc<dyn Transport>) -> Self {
        Self { session }
    }
}

#[async_trait]
impl FileSink for DownloadFileSink {
    async fn save_files(&self, files: &[OutputFile], folder: &Path) -> Result<usize, SinkError> {
        tokio::fs::create_dir_all(folder).await?;

        let mut saved = 0;
        let mut first_failure = None;

        for file in files {
            let target = folder.join(&file.filename);
            if tokio::fs::try_exists(&target).await? {
                tracing::debug!("{} already present, skipping", file.filename);
                continue;
            }

            match self.session.download(&file.file_url, &file.headers).await {
                Ok(bytes) => {
                    tokio::fs::write(&target, bytes).await?;
                    tracing::info!("Saved {}", target.display());
                    saved += 1;
                }
                Err(source) => {
                    tracing::warn!("Could not download {}: {}", file.filename, source);
                    if first_failure.is_none() {
                        first_failure = Some(SinkError::Download {
                            filename: file.filename.clone(),
                            source,
                        });
                    }
                }
            }
        }

        match first_failure {
            Some(err) => Err(err),
            None => Ok(saved),
        }
    }
}
