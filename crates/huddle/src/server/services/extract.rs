//! Plain-text extraction for uploaded context documents

use std::io::{Cursor, Read};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

const DOCX_BODY: &str = "word/document.xml";

/// Text runs, run-level tabs and breaks, and paragraph ends in WordprocessingML
static DOCX_TOKEN: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|(<w:tab/>)|(<w:br(?:\s[^>]*)?/>)|(</w:p>)")
    .expect("docx token pattern is valid")
});

static XML_ENTITY: Lazy<Regex> = Lazy::new(|| {
  Regex::new(r"&(#x[0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos);").expect("entity pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
  #[error("Unsupported file type '{0}'. Please upload a .pdf, .txt or .docx file.")]
  UnsupportedFormat(String),

  #[error("Failed to extract text from {filename}: {message}")]
  Extraction { filename: String, message: String },

  #[error("Text extraction was interrupted")]
  Interrupted,
}

impl ExtractError {
  fn extraction(filename: &str, message: impl std::fmt::Display) -> Self {
    Self::Extraction { filename: filename.to_string(), message: message.to_string() }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
  Text,
  Pdf,
  Docx,
}

impl DocumentFormat {
  /// Pick the format from the file extension, case-insensitively
  pub fn from_filename(filename: &str) -> Result<Self, ExtractError> {
    let extension = Path::new(filename)
      .extension()
      .map(|e| e.to_string_lossy().to_lowercase())
      .unwrap_or_default();

    match extension.as_str() {
      "txt" => Ok(Self::Text),
      "pdf" => Ok(Self::Pdf),
      "docx" => Ok(Self::Docx),
      "" => Err(ExtractError::UnsupportedFormat(filename.to_string())),
      other => Err(ExtractError::UnsupportedFormat(format!(".{other}"))),
    }
  }
}

/// Extract the full text of an uploaded document.
///
/// CPU-bound for PDFs; call from a blocking task.
pub fn extract_text(filename: &str, bytes: &[u8]) -> Result<String, ExtractError> {
  match DocumentFormat::from_filename(filename)? {
    DocumentFormat::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
    DocumentFormat::Pdf => {
      pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::extraction(filename, e))
    }
    DocumentFormat::Docx => {
      let xml = read_docx_body(bytes).map_err(|e| ExtractError::extraction(filename, e))?;
      Ok(docx_text(&xml))
    }
  }
}

/// Run [`extract_text`] on the blocking pool.
///
/// A parser panic is reported as an extraction failure for `filename`.
pub async fn extract_text_blocking<B>(filename: String, bytes: B) -> Result<String, ExtractError>
where
  B: AsRef<[u8]> + Send + 'static,
{
  run_blocking(filename, move |name| extract_text(name, bytes.as_ref())).await
}

async fn run_blocking<F>(filename: String, job: F) -> Result<String, ExtractError>
where
  F: FnOnce(&str) -> Result<String, ExtractError> + Send + 'static,
{
  let name = filename.clone();
  match tokio::task::spawn_blocking(move || job(&name)).await {
    Ok(result) => result,
    Err(e) if e.is_panic() => {
      tracing::warn!("text extraction panicked on {filename}");
      Err(ExtractError::extraction(&filename, "the document could not be parsed"))
    }
    Err(_) => Err(ExtractError::Interrupted),
  }
}

fn read_docx_body(bytes: &[u8]) -> Result<String, Box<dyn std::error::Error>> {
  let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
  let mut body = archive.by_name(DOCX_BODY)?;
  let mut xml = String::new();
  body.read_to_string(&mut xml)?;
  Ok(xml)
}

/// Flatten `word/document.xml` into text, one line per paragraph
fn docx_text(xml: &str) -> String {
  let mut text = String::new();
  for token in DOCX_TOKEN.captures_iter(xml) {
    if let Some(run) = token.get(1) {
      text.push_str(&unescape_xml(run.as_str()));
    } else if token.get(2).is_some() {
      text.push('\t');
    } else {
      text.push('\n');
    }
  }
  text.trim_end_matches('\n').to_string()
}

fn unescape_xml(raw: &str) -> String {
  XML_ENTITY
    .replace_all(raw, |caps: &regex::Captures| {
      let entity = &caps[1];
      let decoded = match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ if entity.starts_with("#x") => u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32),
        _ => entity[1..].parse::<u32>().ok().and_then(char::from_u32),
      };
      decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}
