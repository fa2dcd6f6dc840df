//! Best-effort extraction of ticket attributes from generated `.docx` files.
//!
//! Every value carries a [`Provenance`] tag: the regexes here are heuristics
//! and a mined value is never treated as authoritative.

use crate::workorder::model::{
    Field, MinedDocument, PLACEHOLDER_CLIENT, PLACEHOLDER_EQUIPMENT, PLACEHOLDER_PRICE, Status,
};
use crate::workorder::filename::{IdMode, extract_id};
use crate::workorder::util::{collapse_whitespace, truncate_chars};
use regex::Regex;
use std::fmt;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;
use zip::ZipArchive;

pub const DOCUMENT_TEXT_PART: &str = "word/document.xml";
pub const MAX_CLIENT_CHARS: usize = 40;
pub const MAX_EQUIPMENT_CHARS: usize = 30;
/// Upper bound on the decompressed text part.
const MAX_TEXT_PART_BYTES: u64 = 32 * 1024 * 1024;

static LINE_BREAK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)</w:p>|<w:br\b[^>]*>|<w:cr\b[^>]*>").expect("line break regex is valid")
});
static TAB_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<w:tab\b[^>]*>").expect("tab regex is valid"));
static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex is valid"));

static PHONE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\(?\d{2}\)?\s?)?9?\d{4}[-\s]?\d{4}").expect("phone regex is valid")
});
static PRICE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"R\$\s?[\d.,]+").expect("price regex is valid"));
static CLIENT_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:cliente|nome)[ \t]*[:;\-][ \t]*([^\s.,;][^.,;\n]*)")
        .expect("client regex is valid")
});
static EQUIPMENT_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:equipamento|aparelho|modelo)[ \t]*[:;\-][ \t]*([^\s.,;][^.,;\n]*)")
        .expect("equipment regex is valid")
});

/// Turns the bytes of one output document into mined attributes.
///
/// Implementations must not fail: anything they cannot resolve degrades to
/// placeholder values.
pub trait DocumentMiner: Send + Sync {
    fn mine(&self, id: u32, file_name: &str, bytes: &[u8]) -> MinedDocument;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DocxMiner;

impl DocumentMiner for DocxMiner {
    fn mine(&self, id: u32, file_name: &str, bytes: &[u8]) -> MinedDocument {
        match read_text_part(bytes) {
            Ok(xml) => mine_text(&flatten_markup(&xml), file_name),
            Err(err) => {
                debug!(id, file = file_name, reason = %err, "document unreadable, using placeholders");
                MinedDocument::fallback(file_name)
            }
        }
    }
}

#[derive(Debug)]
enum TextPartError {
    NotAnArchive(zip::result::ZipError),
    MissingTextPart,
    Unreadable(std::io::Error),
}

impl fmt::Display for TextPartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnArchive(err) => write!(f, "not a zip archive: {err}"),
            Self::MissingTextPart => write!(f, "missing {DOCUMENT_TEXT_PART}"),
            Self::Unreadable(err) => write!(f, "failed to read {DOCUMENT_TEXT_PART}: {err}"),
        }
    }
}

fn read_text_part(bytes: &[u8]) -> Result<String, TextPartError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(TextPartError::NotAnArchive)?;
    let part = archive
        .by_name(DOCUMENT_TEXT_PART)
        .map_err(|_| TextPartError::MissingTextPart)?;

    let mut raw = Vec::new();
    part.take(MAX_TEXT_PART_BYTES)
        .read_to_end(&mut raw)
        .map_err(TextPartError::Unreadable)?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}

/// Reduce WordprocessingML to plain text, one line per paragraph.
pub fn flatten_markup(xml: &str) -> String {
    let with_breaks = LINE_BREAK_REGEX.replace_all(xml, "\n");
    let with_tabs = TAB_REGEX.replace_all(&with_breaks, " ");
    let stripped = TAG_REGEX.replace_all(&with_tabs, "");
    unescape_xml(&stripped)
}

fn unescape_xml(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn mine_text(text: &str, file_name: &str) -> MinedDocument {
    let phone = PHONE_REGEX
        .find(text)
        .map(|m| Field::content(m.as_str().trim()))
        .unwrap_or_else(|| Field::placeholder(""));

    let price = PRICE_REGEX
        .find(text)
        .map(|m| m.as_str().trim().trim_end_matches(['.', ',']))
        .filter(|v| v.chars().any(|c| c.is_ascii_digit()))
        .map(Field::content)
        .unwrap_or_else(|| Field::placeholder(PLACEHOLDER_PRICE));

    let client = labeled_value(&CLIENT_LABEL_REGEX, text, MAX_CLIENT_CHARS)
        .map(Field::content)
        .or_else(|| client_from_file_name(file_name).map(Field::filename))
        .unwrap_or_else(|| Field::placeholder(PLACEHOLDER_CLIENT));

    let equipment = labeled_value(&EQUIPMENT_LABEL_REGEX, text, MAX_EQUIPMENT_CHARS)
        .map(Field::content)
        .unwrap_or_else(|| Field::placeholder(PLACEHOLDER_EQUIPMENT));

    MinedDocument {
        client,
        phone,
        equipment,
        price,
        status: Status::from_file_name(file_name),
    }
}

fn labeled_value(regex: &Regex, text: &str, max_chars: usize) -> Option<String> {
    let caps = regex.captures(text)?;
    let value = collapse_whitespace(caps.get(1)?.as_str());
    let value = truncate_chars(&value, max_chars).trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// `"1050 - João Silva - HP.docx"` yields `"João Silva"`: the segment that
/// follows the id, or the second `-` segment when the name has no leading id.
pub fn client_from_file_name(file_name: &str) -> Option<String> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);
    let candidate = match extract_id(stem, IdMode::Anchored) {
        Some(found) => found.residual.split('-').next().map(str::to_owned),
        None => stem.split('-').nth(1).map(str::to_owned),
    }?;
    let candidate = candidate.trim();
    if starts_numeric(candidate) || candidate.chars().count() <= 2 {
        return None;
    }
    Some(candidate.to_string())
}

fn starts_numeric(value: &str) -> bool {
    let mut chars = value.trim_start().chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('+') | Some('-') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}
