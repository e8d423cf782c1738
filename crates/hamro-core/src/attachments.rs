//! Turns user-picked files into [`Attachment`]s.
//!
//! PDFs are sent to the model as inline base64 parts. Word documents and
//! everything else are decoded to text locally and folded into the prompt.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use futures_util::future::join_all;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::ChatError;
use crate::state::Attachment;

/// Largest single file accepted by the encoder.
pub const MAX_ATTACHMENT_BYTES: usize = 20 * 1024 * 1024;
/// Largest combined attachment payload accepted for one send.
pub const MAX_PAYLOAD_BYTES: usize = 20 * 1024 * 1024;
/// Largest PDF whose base64 form still fits in the payload cap.
pub const MAX_INLINE_BYTES: usize = MAX_PAYLOAD_BYTES / 4 * 3;
pub const MAX_ATTACHMENTS: usize = 10;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A file as picked by the user, before encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodeReport {
    pub attachments: Vec<Attachment>,
    pub skipped: Vec<SkippedFile>,
}

#[derive(Debug, Error)]
enum EncodeError {
    #[error("too large ({size} bytes, limit {limit})")]
    TooLarge { size: usize, limit: usize },

    #[error("legacy .doc format is not supported; convert to .docx")]
    LegacyDoc,

    #[error("not a valid .docx archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("{0}")]
    Read(std::io::Error),

    #[error("could not read document body: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed document XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Pdf,
    Docx,
    LegacyDoc,
    Text,
}

fn extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

fn classify(name: &str, bytes: &[u8]) -> FileKind {
    match extension(name).as_str() {
        "pdf" => FileKind::Pdf,
        "docx" => FileKind::Docx,
        "doc" if bytes.starts_with(ZIP_MAGIC) => FileKind::Docx,
        "doc" => FileKind::LegacyDoc,
        _ if bytes.starts_with(PDF_MAGIC) => FileKind::Pdf,
        _ => FileKind::Text,
    }
}

fn encode_file(file: &SelectedFile) -> Result<Attachment, EncodeError> {
    if file.bytes.len() > MAX_ATTACHMENT_BYTES {
        return Err(EncodeError::TooLarge {
            size: file.bytes.len(),
            limit: MAX_ATTACHMENT_BYTES,
        });
    }

    match classify(&file.name, &file.bytes) {
        FileKind::Pdf if file.bytes.len() > MAX_INLINE_BYTES => Err(EncodeError::TooLarge {
            size: file.bytes.len(),
            limit: MAX_INLINE_BYTES,
        }),
        FileKind::Pdf => Ok(Attachment::inline(
            &file.name,
            PDF_MIME,
            STANDARD.encode(&file.bytes),
        )),
        FileKind::Docx => Ok(Attachment::text(
            &file.name,
            DOCX_MIME,
            extract_docx_text(&file.bytes)?,
        )),
        FileKind::LegacyDoc => Err(EncodeError::LegacyDoc),
        FileKind::Text => {
            let mime = mime_guess::from_path(&file.name)
                .first_raw()
                .unwrap_or("text/plain");
            Ok(Attachment::text(
                &file.name,
                mime,
                String::from_utf8_lossy(&file.bytes).into_owned(),
            ))
        }
    }
}

/// Plain text of a .docx body: one line per paragraph, tabs and breaks kept.
fn extract_docx_text(bytes: &[u8]) -> Result<String, EncodeError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let mut xml = String::new();
    archive.by_name("word/document.xml")?.read_to_string(&mut xml)?;

    let mut reader = Reader::from_str(&xml);
    let mut text = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Event::End(e) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Event::Text(e) if in_run_text => text.push_str(&e.unescape()?),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}

/// Encode every file, in order. A file that fails is logged and reported as
/// skipped; the rest of the batch still goes through.
pub fn encode_files(files: &[SelectedFile]) -> EncodeReport {
    let mut report = EncodeReport::default();

    for file in files {
        match encode_file(file) {
            Ok(attachment) => {
                debug!(name = %file.name, inline = attachment.is_inline, "encoded attachment");
                report.attachments.push(attachment);
            }
            Err(e) => {
                warn!(name = %file.name, error = %e, "skipping attachment");
                report.skipped.push(SkippedFile {
                    name: file.name.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

fn display_name(path: &Path, root: Option<&Path>) -> String {
    let relative = root
        .and_then(|root| path.strip_prefix(root).ok())
        .unwrap_or(path);

    if root.is_none() {
        if let Some(name) = path.file_name() {
            return name.to_string_lossy().into_owned();
        }
    }

    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Expand the picked paths into files: directories recurse (hidden entries
/// skipped) and files inside them are named relative to the picked folder's
/// parent, e.g. `notes/today.md`. All reads run concurrently.
pub async fn read_paths(paths: &[PathBuf]) -> (Vec<SelectedFile>, Vec<SkippedFile>) {
    let mut targets: Vec<(PathBuf, String)> = Vec::new();
    let mut skipped = Vec::new();

    for path in paths {
        if path.is_dir() {
            let root = path.parent().map(Path::to_path_buf);
            let walker = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| entry.depth() == 0 || !is_hidden(entry.file_name()));

            for entry in walker {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => {
                        let name = display_name(entry.path(), root.as_deref());
                        targets.push((entry.into_path(), name));
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to walk directory");
                        skipped.push(SkippedFile {
                            name: path.display().to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        } else {
            targets.push((path.clone(), display_name(path, None)));
        }
    }

    let reads = targets.into_iter().map(|(path, name)| async move {
        let result = read_capped(&path).await;
        (name, result)
    });

    let mut files = Vec::new();
    for (name, result) in join_all(reads).await {
        match result {
            Ok(bytes) => files.push(SelectedFile { name, bytes }),
            Err(e) => {
                warn!(name = %name, error = %e, "failed to read attachment");
                skipped.push(SkippedFile {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    (files, skipped)
}

/// Read a file unless its size on disk is already over the cap.
async fn read_capped(path: &Path) -> Result<Vec<u8>, EncodeError> {
    let size = tokio::fs::metadata(path).await.map_err(EncodeError::Read)?.len();
    if size > MAX_ATTACHMENT_BYTES as u64 {
        return Err(EncodeError::TooLarge {
            size: usize::try_from(size).unwrap_or(usize::MAX),
            limit: MAX_ATTACHMENT_BYTES,
        });
    }
    tokio::fs::read(path).await.map_err(EncodeError::Read)
}

/// Read and encode a batch of picked paths.
pub async fn load_attachments(paths: &[PathBuf]) -> EncodeReport {
    let (files, mut skipped) = read_paths(paths).await;
    let mut report = encode_files(&files);
    skipped.append(&mut report.skipped);
    report.skipped = skipped;
    report
}

/// Reject a send whose attachments exceed the combined size or count caps.
pub fn check_payload(attachments: &[Attachment]) -> Result<(), ChatError> {
    let size: usize = attachments.iter().map(|a| a.data.len()).sum();
    if size > MAX_PAYLOAD_BYTES || attachments.len() > MAX_ATTACHMENTS {
        return Err(ChatError::PayloadTooLarge {
            size,
            count: attachments.len(),
            limit: MAX_PAYLOAD_BYTES,
            max_files: MAX_ATTACHMENTS,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::SimpleFileOptions;

    fn docx_with_body(body: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/document.xml", SimpleFileOptions::default())
            .unwrap();
        write!(
            writer,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
            body
        )
        .unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_pdf_is_inline_base64() {
        let report = encode_files(&[SelectedFile::new("x.pdf", b"%PDF-1.4 body".to_vec())]);

        let attachment = &report.attachments[0];
        assert!(attachment.is_inline);
        assert_eq!(attachment.mime_type, "application/pdf");
        assert_eq!(attachment.data, STANDARD.encode(b"%PDF-1.4 body"));
    }

    #[test]
    fn test_pdf_sniffed_without_extension() {
        let report = encode_files(&[SelectedFile::new("scan", b"%PDF-1.7".to_vec())]);
        assert!(report.attachments[0].is_inline);
        assert_eq!(report.attachments[0].mime_type, PDF_MIME);
    }

    #[test]
    fn test_text_file_is_decoded() {
        let report = encode_files(&[SelectedFile::new("x.txt", "hello\nworld".as_bytes())]);

        let attachment = &report.attachments[0];
        assert!(!attachment.is_inline);
        assert_eq!(attachment.mime_type, "text/plain");
        assert_eq!(attachment.data, "hello\nworld");
    }

    #[test]
    fn test_docx_paragraphs_become_lines() {
        let body = r#"<w:p><w:r><w:t>First</w:t></w:r><w:r><w:tab/><w:t xml:space="preserve"> line &amp; more</w:t></w:r></w:p><w:p><w:r><w:t>Second</w:t></w:r></w:p>"#;
        let report = encode_files(&[SelectedFile::new("Report.DOCX", docx_with_body(body))]);

        assert!(report.skipped.is_empty());
        let attachment = &report.attachments[0];
        assert!(!attachment.is_inline);
        assert_eq!(attachment.mime_type, DOCX_MIME);
        assert_eq!(attachment.data, "First\t line & more\nSecond");
    }

    #[test]
    fn test_zip_backed_doc_is_read_as_docx() {
        let bytes = docx_with_body("<w:p><w:r><w:t>renamed</w:t></w:r></w:p>");
        let report = encode_files(&[SelectedFile::new("old.doc", bytes)]);
        assert_eq!(report.attachments[0].data, "renamed");
    }

    #[test]
    fn test_failures_are_skipped_and_order_kept() {
        let files = vec![
            SelectedFile::new("a.txt", "a".as_bytes()),
            SelectedFile::new("legacy.doc", vec![0xD0u8, 0xCF, 0x11, 0xE0]),
            SelectedFile::new("broken.docx", "not a zip".as_bytes()),
            SelectedFile::new("b.md", "b".as_bytes()),
        ];
        let report = encode_files(&files);

        let names: Vec<_> = report.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.md"]);

        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].name, "legacy.doc");
        assert!(report.skipped[0].reason.contains("convert to .docx"));
        assert_eq!(report.skipped[1].name, "broken.docx");
    }

    #[test]
    fn test_oversized_file_is_skipped() {
        let report = encode_files(&[SelectedFile::new(
            "big.txt",
            vec![b'a'; MAX_ATTACHMENT_BYTES + 1],
        )]);
        assert!(report.attachments.is_empty());
        assert!(report.skipped[0].reason.starts_with("too large"));
    }

    #[test]
    fn test_pdf_over_inline_cap_is_skipped_before_send() {
        let mut bytes = b"%PDF-1.4 ".to_vec();
        bytes.resize(MAX_INLINE_BYTES + 1, b'x');
        let report = encode_files(&[SelectedFile::new("scan.pdf", bytes)]);

        assert!(report.attachments.is_empty());
        assert!(report.skipped[0].reason.starts_with("too large"));

        let mut fits = b"%PDF-1.4 ".to_vec();
        fits.resize(MAX_INLINE_BYTES, b'x');
        let report = encode_files(&[SelectedFile::new("scan.pdf", fits)]);
        assert!(check_payload(&report.attachments).is_ok());
    }

    #[tokio::test]
    async fn test_oversized_file_on_disk_is_not_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("huge.log");
        let file = fs::File::create(&path).unwrap();
        file.set_len(MAX_ATTACHMENT_BYTES as u64 + 1).unwrap();

        let (files, skipped) = read_paths(&[path]).await;

        assert!(files.is_empty());
        assert_eq!(skipped[0].name, "huge.log");
        assert!(skipped[0].reason.starts_with("too large"));
    }

    #[test]
    fn test_payload_caps() {
        let small = Attachment::text("a.txt", "text/plain", "a".to_string());
        assert!(check_payload(&vec![small.clone(); MAX_ATTACHMENTS]).is_ok());

        let err = check_payload(&vec![small; MAX_ATTACHMENTS + 1]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::PayloadTooLarge);

        let huge = Attachment::inline("x.pdf", PDF_MIME, "A".repeat(MAX_PAYLOAD_BYTES + 1));
        assert!(check_payload(&[huge]).is_err());
    }

    #[tokio::test]
    async fn test_folder_recurses_and_skips_hidden() {
        let dir = tempdir().unwrap();
        let notes = dir.path().join("notes");
        fs::create_dir_all(notes.join("deep")).unwrap();
        fs::create_dir_all(notes.join(".git")).unwrap();
        fs::write(notes.join("a.txt"), "alpha").unwrap();
        fs::write(notes.join("deep").join("b.txt"), "beta").unwrap();
        fs::write(notes.join(".secret"), "hidden").unwrap();
        fs::write(notes.join(".git").join("HEAD"), "ref").unwrap();

        let loose = dir.path().join("loose.md");
        fs::write(&loose, "# loose").unwrap();

        let report = load_attachments(&[notes, loose, dir.path().join("missing.txt")]).await;

        let names: Vec<_> = report.attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["notes/a.txt", "notes/deep/b.txt", "loose.md"]);
        assert_eq!(report.attachments[1].data, "beta");

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].name, "missing.txt");
    }
}
