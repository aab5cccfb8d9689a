//! Text extraction for uploaded files (.txt, .pdf, .eml).

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use mail_parser::MessageParser;
use tracing::{debug, warn};

use crate::error::ExtractError;

/// Extract plain text from an uploaded file, dispatching on extension.
pub fn extract_text(file_name: &str, data: &[u8]) -> Result<String, ExtractError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    let text = match extension.as_str() {
        "txt" => String::from_utf8_lossy(data).into_owned(),
        "pdf" => extract_pdf_text(data)?,
        "eml" => extract_eml_text(data)?,
        _ => return Err(ExtractError::UnsupportedFormat { extension }),
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ExtractError::Empty {
            file_name: file_name.to_string(),
        });
    }
    debug!(file_name, chars = text.chars().count(), "Extracted upload text");
    Ok(text)
}

fn extract_pdf_text(data: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed documents.
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(data))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => {
            warn!(error = %e, "PDF extraction failed");
            Err(ExtractError::Pdf(e.to_string()))
        }
        Err(_) => {
            warn!("PDF extraction panicked");
            Err(ExtractError::Pdf("malformed document".to_string()))
        }
    }
}

fn extract_eml_text(data: &[u8]) -> Result<String, ExtractError> {
    let parsed = MessageParser::default()
        .parse(data)
        .ok_or(ExtractError::Email)?;

    let body = if let Some(text) = parsed.body_text(0) {
        strip_quoted_text(&text)
    } else if let Some(html) = parsed.body_html(0) {
        strip_html(&html)
    } else {
        String::new()
    };

    Ok(match parsed.subject() {
        Some(subject) if !subject.trim().is_empty() => format!("{}\n\n{}", subject.trim(), body),
        _ => body,
    })
}

/// Drop quoted reply lines and everything after a reply attribution.
pub fn strip_quoted_text(body: &str) -> String {
    let mut kept = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('>') {
            continue;
        }
        if is_reply_attribution(trimmed) {
            break;
        }
        kept.push(line);
    }

    while kept.last().is_some_and(|l| l.trim().is_empty()) {
        kept.pop();
    }
    kept.join("\n")
}

/// "On ... wrote:", "Em ... escreveu:" and forwarded-message separators.
fn is_reply_attribution(line: &str) -> bool {
    (line.starts_with("On ") && line.ends_with("wrote:"))
        || (line.starts_with("Em ") && line.ends_with("escreveu:"))
        || (line.starts_with("---")
            && (line.contains("Original Message") || line.contains("Mensagem original")))
}

/// Remove tags and collapse whitespace.
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
