use super::{ExportDocument, ExportJob};
use crate::metrics_helper;
use crate::token_provider::TokenKind;
use anyhow::{Context, Result};
use function_timer::time;
use tracing::{info, warn};

impl ExportJob {
    /// Load the previous export from the remote store. Absent blob means a
    /// fresh start; so does a blob that no longer parses as an export
    /// document (any other schema shape is replaced, not migrated).
    #[time("download_snapshot_duration")]
    pub async fn load_snapshot(&self) -> Result<Option<ExportDocument>> {
        let token = self.tokens.get_valid_token(TokenKind::Storage).await?;

        let file_id = match self.drive.find_file(&token, &self.export_filename).await? {
            Some(id) => id,
            None => {
                info!(
                    "No existing export named '{}' in the store, starting fresh",
                    self.export_filename
                );
                return Ok(None);
            }
        };

        let content = self.drive.download(&token, &file_id).await?;

        match serde_json::from_slice::<ExportDocument>(&content) {
            Ok(document) => {
                info!(
                    "Loaded previous export with {} workouts (exported at {})",
                    document.workouts.len(),
                    document.metadata.exported_at
                );
                Ok(Some(document))
            }
            Err(e) => {
                warn!("Existing export is not a readable document ({e}), starting fresh");
                Ok(None)
            }
        }
    }

    /// Persist the finished document: local file first, then overwrite (or
    /// create) the remote blob. Only called once the document is fully
    /// built, so a failed run never touches the previous remote export.
    #[time("upload_snapshot_duration")]
    pub async fn save_snapshot(&self, document: &ExportDocument) -> Result<()> {
        let content = serde_json::to_vec_pretty(document).context("failed to serialize export")?;

        metrics_helper::record_export_size_bytes(content.len() as u64);
        metrics_helper::set_export_workout_count(document.workouts.len() as u64);

        if let Some(parent) = self.local_export_file.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create export directory {}", parent.display())
            })?;
        }
        std::fs::write(&self.local_export_file, &content).with_context(|| {
            format!(
                "failed to write local export to {}",
                self.local_export_file.display()
            )
        })?;
        info!(
            "Wrote local export to {}",
            self.local_export_file.display()
        );

        let token = self.tokens.get_valid_token(TokenKind::Storage).await?;

        // The store distinguishes create from update, so resolve the name first
        match self.drive.find_file(&token, &self.export_filename).await? {
            Some(file_id) => {
                self.drive
                    .upload(&token, &file_id, content)
                    .await
                    .context("failed to update remote export")?;
                info!("Updated '{}' in the remote store", self.export_filename);
            }
            None => {
                let file_id = self
                    .drive
                    .create_file(&token, &self.export_filename)
                    .await
                    .context("failed to create remote export")?;
                self.drive
                    .upload(&token, &file_id, content)
                    .await
                    .context("failed to write newly created remote export")?;
                info!("Uploaded '{}' to the remote store", self.export_filename);
            }
        }

        Ok(())
    }
}
