use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// The kind of instructional material
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum MaterialType {
    #[sea_orm(string_value = "pdf")]
    Pdf,
    #[sea_orm(string_value = "doc")]
    Doc,
    #[sea_orm(string_value = "docx")]
    Docx,
    #[sea_orm(string_value = "ppt")]
    Ppt,
    #[sea_orm(string_value = "pptx")]
    Pptx,
    #[sea_orm(string_value = "video")]
    Video,
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "link")]
    Link,
    #[sea_orm(string_value = "quiz")]
    Quiz,
    #[sea_orm(string_value = "assignment")]
    Assignment,
}

impl MaterialType {
    /// Links point at a URL, every other type is backed by a stored file
    pub fn is_link(self) -> bool {
        self == Self::Link
    }
}

impl Display for MaterialType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", sea_orm::ActiveEnum::to_value(self))
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[serde(rename_all = "lowercase")]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum Priority {
    #[sea_orm(string_value = "low")]
    Low,
    #[default]
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
}

/// File extensions accepted for upload: documents, presentations,
/// spreadsheets, text, images and video
pub const ALLOWED_EXTENSIONS: [&str; 18] = [
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "txt", "jpg", "jpeg", "png", "gif",
    "webp", "mp4", "webm", "mov", "avi", "mkv",
];

/// Default upload size limit (10 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Lowercased extension of `filename` if it is on the allow-list
pub fn allowed_extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }

    let ext = ext.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Best guess at a MIME type from an allowed extension
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "txt" => "text/plain",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extension() {
        assert_eq!(allowed_extension("notes.PDF"), Some("pdf".to_string()));
        assert_eq!(allowed_extension("lecture.final.pptx"), Some("pptx".to_string()));
        assert_eq!(allowed_extension("script.sh"), None);
        assert_eq!(allowed_extension("no_extension"), None);
        assert_eq!(allowed_extension(".pdf"), None);
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(mime_for_extension("pdf"), "application/pdf");
        assert_eq!(mime_for_extension("jpeg"), "image/jpeg");
        assert_eq!(mime_for_extension("unknown"), "application/octet-stream");
    }

    #[test]
    fn test_material_type_display() {
        assert_eq!(MaterialType::Pptx.to_string(), "pptx");
        assert!(MaterialType::Link.is_link());
        assert!(!MaterialType::Video.is_link());
    }
}
