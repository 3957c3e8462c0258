//! Multipart form parsing helpers
//!
//! Provides reusable abstractions for parsing multipart/form-data uploads.
//! The registration form carries two separately named file fields plus a
//! dozen text fields, so files are collected by field name rather than
//! assuming a single upload.

use std::collections::HashMap;

use axum::extract::Multipart;

use crate::error::ApiError;
use crate::validation::{validate_content_type, validate_file_size};

/// Represents a file uploaded via multipart form
#[derive(Debug, Clone)]
pub struct FileField {
    /// File data bytes
    pub data: Vec<u8>,
    /// Content-Type from the multipart field (if provided)
    pub content_type: Option<String>,
    /// Original filename from the multipart field (if provided)
    pub file_name: Option<String>,
}

/// Parsed multipart form fields
///
/// Provides structured access to file and text fields from a
/// multipart/form-data request.
#[derive(Debug)]
pub struct MultipartFields {
    /// File fields indexed by field name
    files: HashMap<String, FileField>,
    /// Text fields indexed by name
    text_fields: HashMap<String, String>,
}

impl MultipartFields {
    /// Parse all fields from a multipart request.
    ///
    /// Fields named in `file_fields` are read as file uploads and validated
    /// (Content-Type allowlist, size limit); everything else is read as
    /// text.
    pub async fn parse(
        multipart: &mut Multipart,
        file_fields: &[&str],
        max_file_size: usize,
    ) -> Result<Self, ApiError> {
        let mut files = HashMap::new();
        let mut text_fields = HashMap::new();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();

            if file_fields.contains(&name.as_str()) {
                let content_type = field.content_type().map(|s| s.to_string());
                let file_name = field.file_name().map(|s| s.to_string());

                validate_content_type(content_type.as_deref())?;

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| {
                        ApiError::bad_request(format!("Failed to read file '{}': {}", name, e))
                    })?
                    .to_vec();

                validate_file_size(data.len(), max_file_size)?;

                files.insert(
                    name,
                    FileField {
                        data,
                        content_type,
                        file_name,
                    },
                );
            } else {
                let value = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed to read field '{}': {}", name, e))
                })?;
                text_fields.insert(name, value);
            }
        }

        Ok(Self { files, text_fields })
    }

    /// Get a file field (required)
    pub fn require_file(&self, name: &str) -> Result<&FileField, ApiError> {
        self.files.get(name).ok_or_else(|| {
            ApiError::bad_request(format!(
                "No file provided. Use '{}' field in multipart form.",
                name
            ))
        })
    }

    /// Get a file field (optional)
    pub fn get_file(&self, name: &str) -> Option<&FileField> {
        self.files.get(name)
    }

    /// Get a required text field. Missing or empty values are rejected.
    pub fn require_text(&self, name: &str) -> Result<&str, ApiError> {
        match self.text_fields.get(name).map(|s| s.trim()) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(ApiError::bad_request(format!(
                "Missing required field '{}'",
                name
            ))),
        }
    }

    /// Get a text field value
    ///
    /// Returns `None` if the field is not present or empty.
    pub fn get_text(&self, name: &str) -> Option<&str> {
        self.text_fields
            .get(name)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields_with_text(pairs: &[(&str, &str)]) -> MultipartFields {
        MultipartFields {
            files: HashMap::new(),
            text_fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    #[test]
    fn test_get_text() {
        let fields = fields_with_text(&[("name", "test"), ("empty", "  ")]);
        assert_eq!(fields.get_text("name"), Some("test"));
        assert_eq!(fields.get_text("empty"), None);
        assert_eq!(fields.get_text("missing"), None);
    }

    #[test]
    fn test_require_text() {
        let fields = fields_with_text(&[("name", " Asha "), ("blank", "")]);
        assert_eq!(fields.require_text("name").unwrap(), "Asha");
        assert!(fields.require_text("blank").is_err());
        assert!(fields.require_text("missing").is_err());
    }

    #[test]
    fn test_require_file_missing() {
        let fields = fields_with_text(&[]);
        assert!(fields.require_file("image").is_err());
        assert!(fields.get_file("image").is_none());
    }

    #[test]
    fn test_files_are_keyed_by_name() {
        let mut files = HashMap::new();
        files.insert(
            "image".to_string(),
            FileField {
                data: vec![1, 2, 3],
                content_type: Some("image/png".to_string()),
                file_name: None,
            },
        );
        let fields = MultipartFields {
            files,
            text_fields: HashMap::new(),
        };
        assert_eq!(fields.require_file("image").unwrap().data, vec![1, 2, 3]);
        assert!(fields.get_file("aadhar_image").is_none());
    }
}
