//! Files attached to a user turn.
//!
//! Images and documents travel inline with the message as raw bytes. The
//! supported formats are the ones the Bedrock `Converse` API accepts; the
//! Claude request builder maps what it can and notes what it cannot.

use std::path::Path;
use std::sync::OnceLock;

use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AttachmentError;
use crate::Turn;

/// Largest inline image the providers accept.
pub const MAX_IMAGE_BYTES: u64 = 3_750_000;
/// Largest inline document the providers accept.
pub const MAX_DOCUMENT_BYTES: u64 = 4_500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "gif" => Some(ImageFormat::Gif),
            "webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }

    /// Format name on the wire (`"jpeg"`, not `"jpg"`).
    pub fn as_str(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Gif => "gif",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Gif => "image/gif",
            ImageFormat::Webp => "image/webp",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Csv,
    Doc,
    Docx,
    Xls,
    Xlsx,
    Html,
    Txt,
    Md,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "csv" => Some(DocumentFormat::Csv),
            "doc" => Some(DocumentFormat::Doc),
            "docx" => Some(DocumentFormat::Docx),
            "xls" => Some(DocumentFormat::Xls),
            "xlsx" => Some(DocumentFormat::Xlsx),
            "html" | "htm" => Some(DocumentFormat::Html),
            "txt" => Some(DocumentFormat::Txt),
            "md" | "markdown" => Some(DocumentFormat::Md),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Doc => "doc",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Xls => "xls",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Html => "html",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Md => "md",
        }
    }

    /// Plain-text formats whose bytes can be sent as a text source.
    pub fn is_text(self) -> bool {
        matches!(
            self,
            DocumentFormat::Csv | DocumentFormat::Html | DocumentFormat::Txt | DocumentFormat::Md
        )
    }
}

/// An image or document sent along with a user message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Attachment {
    Image {
        format: ImageFormat,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
    Document {
        format: DocumentFormat,
        name: String,
        #[serde(with = "base64_bytes")]
        bytes: Vec<u8>,
    },
}

impl Attachment {
    pub fn image(format: ImageFormat, bytes: Vec<u8>) -> Self {
        Attachment::Image { format, bytes }
    }

    /// A document named `name`, cleaned to the characters providers accept.
    pub fn document(name: &str, format: DocumentFormat, bytes: Vec<u8>) -> Self {
        Attachment::Document {
            format,
            name: sanitize_document_name(name),
            bytes,
        }
    }

    /// Read a file, picking image or document by its extension.
    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        if let Some(format) = ImageFormat::from_extension(ext) {
            let bytes = read_limited(path, MAX_IMAGE_BYTES)?;
            return Ok(Attachment::image(format, bytes));
        }
        if let Some(format) = DocumentFormat::from_extension(ext) {
            let bytes = read_limited(path, MAX_DOCUMENT_BYTES)?;
            let stem = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or_default();
            return Ok(Attachment::document(stem, format, bytes));
        }
        Err(AttachmentError::UnsupportedFormat(path.display().to_string()))
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            Attachment::Image { bytes, .. } | Attachment::Document { bytes, .. } => bytes,
        }
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.bytes())
    }

    /// Short human-readable label, e.g. `report.pdf` or `png image`.
    pub fn label(&self) -> String {
        match self {
            Attachment::Image { format, .. } => format!("{} image", format.as_str()),
            Attachment::Document { format, name, .. } => format!("{name}.{}", format.as_str()),
        }
    }
}

/// What a user submits: text plus any attachments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInput {
    pub text: String,
    pub attachments: Vec<Attachment>,
}

impl UserInput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn into_turn(self) -> Turn {
        Turn::user_with_attachments(self.text, self.attachments)
    }
}

impl From<&str> for UserInput {
    fn from(text: &str) -> Self {
        UserInput::new(text)
    }
}

impl From<String> for UserInput {
    fn from(text: String) -> Self {
        UserInput::new(text)
    }
}

fn document_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9\s\-()\[\]]").expect("valid regex"))
}

fn whitespace_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("valid regex"))
}

/// Document names may only hold letters, digits, single spaces, hyphens,
/// parentheses and square brackets.
pub fn sanitize_document_name(name: &str) -> String {
    let cleaned = document_name_regex().replace_all(name, " ");
    let collapsed = whitespace_regex().replace_all(&cleaned, " ");
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        "document".to_string()
    } else {
        trimmed.to_string()
    }
}

fn read_limited(path: &Path, limit: u64) -> Result<Vec<u8>, AttachmentError> {
    let io_error = |source| AttachmentError::Io {
        path: path.display().to_string(),
        source,
    };
    let size = std::fs::metadata(path).map_err(io_error)?.len();
    if size > limit {
        return Err(AttachmentError::TooLarge {
            path: path.display().to_string(),
            size,
            limit,
        });
    }
    std::fs::read(path).map_err(io_error)
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn document_names_are_sanitized() {
        assert_eq!(sanitize_document_name("Q3 report (final)"), "Q3 report (final)");
        assert_eq!(sanitize_document_name("notes_v2.draft"), "notes v2 draft");
        assert_eq!(sanitize_document_name("  a   b  "), "a b");
        assert_eq!(sanitize_document_name("***"), "document");
        assert_eq!(sanitize_document_name(""), "document");
    }

    #[test]
    fn formats_from_extension() {
        assert_eq!(ImageFormat::from_extension("JPG"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::Jpeg.as_str(), "jpeg");
        assert_eq!(ImageFormat::from_extension("bmp"), None);
        assert_eq!(DocumentFormat::from_extension("md"), Some(DocumentFormat::Md));
        assert!(DocumentFormat::Csv.is_text());
        assert!(!DocumentFormat::Pdf.is_text());
        assert!(!DocumentFormat::Docx.is_text());
    }

    #[test]
    fn from_path_reads_documents_and_images() {
        let dir = tempfile::tempdir().unwrap();

        let doc_path = dir.path().join("meeting_notes.txt");
        std::fs::write(&doc_path, "agenda").unwrap();
        let doc = Attachment::from_path(&doc_path).unwrap();
        assert_eq!(
            doc,
            Attachment::Document {
                format: DocumentFormat::Txt,
                name: "meeting notes".into(),
                bytes: b"agenda".to_vec(),
            }
        );
        assert_eq!(doc.label(), "meeting notes.txt");

        let image_path = dir.path().join("chart.PNG");
        std::fs::write(&image_path, [0x89, b'P', b'N', b'G']).unwrap();
        let image = Attachment::from_path(&image_path).unwrap();
        assert!(matches!(image, Attachment::Image { format: ImageFormat::Png, .. }));
        assert_eq!(image.to_base64(), "iVBORw==");
    }

    #[test]
    fn from_path_rejects_unknown_missing_and_oversized() {
        let dir = tempfile::tempdir().unwrap();

        let exe = dir.path().join("tool.exe");
        std::fs::write(&exe, "MZ").unwrap();
        assert!(matches!(
            Attachment::from_path(&exe),
            Err(AttachmentError::UnsupportedFormat(_))
        ));

        let missing = dir.path().join("missing.pdf");
        assert!(matches!(
            Attachment::from_path(&missing),
            Err(AttachmentError::Io { .. })
        ));

        let big = dir.path().join("big.gif");
        let mut file = std::fs::File::create(&big).unwrap();
        file.write_all(&vec![0u8; MAX_IMAGE_BYTES as usize + 1]).unwrap();
        drop(file);
        assert!(matches!(
            Attachment::from_path(&big),
            Err(AttachmentError::TooLarge { limit: MAX_IMAGE_BYTES, .. })
        ));
    }

    #[test]
    fn serializes_bytes_as_base64() {
        let attachment = Attachment::image(ImageFormat::Gif, b"GIF89a".to_vec());
        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["kind"], "image");
        assert_eq!(json["format"], "gif");
        assert_eq!(json["bytes"], "R0lGODlh");

        let back: Attachment = serde_json::from_value(json).unwrap();
        assert_eq!(back, attachment);
    }

    #[test]
    fn user_input_into_turn() {
        let plain = UserInput::from("hello").into_turn();
        assert_eq!(plain.text(), "hello");
        assert!(plain.attachments().is_empty());

        let input = UserInput::new("summarize")
            .with_attachment(Attachment::document("a", DocumentFormat::Md, b"# A".to_vec()));
        let turn = input.into_turn();
        assert_eq!(turn.text(), "summarize");
        assert_eq!(turn.attachments().len(), 1);
    }
}
