//! Uploaded file metadata and visit attachments.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::lenient;

/// Metadata of a file stored by the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileMeta {
    /// Local ID derived from `stored_name`
    #[serde(default)]
    pub file_id: String,
    /// Original file name
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    /// Unique name on the server
    pub stored_name: String,
    /// Public URL (e.g., `/uploads/<stored_name>`)
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    /// Size in bytes
    #[serde(default)]
    pub size: i64,
    /// MIME type
    #[serde(default, rename = "type", deserialize_with = "lenient::string")]
    pub mime_type: String,
    /// When the metadata was recorded locally
    #[serde(default)]
    pub uploaded_at: String,
}

impl FileMeta {
    /// Derive the local file ID for a server-side stored name.
    pub fn file_id_for(stored_name: &str) -> String {
        let digest = Sha256::digest(stored_name.as_bytes());
        format!("file_{}", &hex::encode(digest)[..16])
    }

    /// Fill derived fields after decoding server metadata.
    pub fn normalized(mut self) -> Self {
        self.file_id = Self::file_id_for(&self.stored_name);
        if self.url.is_empty() {
            self.url = format!("/uploads/{}", self.stored_name);
        }
        if self.uploaded_at.is_empty() {
            self.uploaded_at = chrono::Utc::now().to_rfc3339();
        }
        self
    }

    /// Whether the file is an image that can be previewed inline.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// A local link between a visit and an uploaded file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VisitFileLink {
    pub visit_id: String,
    pub file_id: String,
    pub linked_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_id_is_stable() {
        let a = FileMeta::file_id_for("1700000000_abc.pdf");
        let b = FileMeta::file_id_for("1700000000_abc.pdf");
        assert_eq!(a, b);
        assert!(a.starts_with("file_"));
        assert_eq!(a.len(), "file_".len() + 16);
        assert_ne!(a, FileMeta::file_id_for("other.pdf"));
    }

    #[test]
    fn test_normalize_server_meta() {
        let meta: FileMeta = serde_json::from_str(
            r#"{"name": "xray.png", "stored_name": "1_x.png", "size": 1024, "type": "image/png"}"#,
        )
        .unwrap();
        let meta = meta.normalized();

        assert_eq!(meta.url, "/uploads/1_x.png");
        assert_eq!(meta.file_id, FileMeta::file_id_for("1_x.png"));
        assert!(meta.is_image());
        assert!(!meta.uploaded_at.is_empty());
    }
}
