//! FileLibrary: uploaded file metadata and visit attachments.

use tracing::{info, warn};

use super::StoreResult;
use crate::api::ClinicApi;
use crate::db::Database;
use crate::models::{FileMeta, VisitFileLink};

/// Where an attachment was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The server linked the files to the visit.
    Server,
    /// The server refused or was unreachable; links are kept locally.
    LocalOnly,
}

/// Uploaded files and their links to visits.
pub struct FileLibrary<'a> {
    api: &'a dyn ClinicApi,
    db: &'a Database,
}

impl<'a> FileLibrary<'a> {
    pub fn new(api: &'a dyn ClinicApi, db: &'a Database) -> Self {
        Self { api, db }
    }

    /// Record uploaded files and attach them to a visit.
    ///
    /// Metadata and local links are always written; the server link is
    /// attempted first and its failure only downgrades the outcome.
    pub fn attach_uploaded(&self, visit_id: &str, metas: Vec<FileMeta>) -> StoreResult<(Vec<FileMeta>, AttachOutcome)> {
        let metas: Vec<FileMeta> = metas.into_iter().map(FileMeta::normalized).collect();
        if metas.is_empty() {
            return Ok((metas, AttachOutcome::Server));
        }

        let now = chrono::Utc::now().to_rfc3339();
        for meta in &metas {
            self.db.upsert_file(meta)?;
            self.db.link_file(&VisitFileLink {
                visit_id: visit_id.to_string(),
                file_id: meta.file_id.clone(),
                linked_at: now.clone(),
            })?;
        }

        let stored_names: Vec<String> = metas.iter().map(|m| m.stored_name.clone()).collect();
        let outcome = match self.api.attach_files(visit_id, &stored_names) {
            Ok(()) => AttachOutcome::Server,
            Err(e) => {
                warn!(visit_id, error = %e, "server attach failed; keeping local links");
                AttachOutcome::LocalOnly
            }
        };

        info!(visit_id, files = metas.len(), ?outcome, "files attached");
        Ok((metas, outcome))
    }

    /// Detach a file from a visit, keeping the file itself.
    pub fn detach(&self, visit_id: &str, file_id: &str) -> StoreResult<bool> {
        Ok(self.db.unlink_file(visit_id, file_id)?)
    }

    pub fn files_for_visit(&self, visit_id: &str) -> StoreResult<Vec<FileMeta>> {
        Ok(self.db.files_for_visit(visit_id)?)
    }

    /// Delete the upload on the server, then forget it locally.
    pub fn delete_file(&self, file_id: &str) -> StoreResult<bool> {
        let Some(meta) = self.db.get_file(file_id)? else {
            return Ok(false);
        };
        self.api.delete_upload(&meta.stored_name)?;
        let deleted = self.db.delete_file(file_id)?;
        info!(file_id, stored_name = %meta.stored_name, "file deleted");
        Ok(deleted)
    }
}
