//! Turns an uploaded CSV file into candidate records.
//!
//! The header is matched case-insensitively. `personal` and `family` are
//! required, plus at least one of `username` and `email`; `event` and `role`
//! are optional and unknown columns are ignored.

use crate::error::IngestError;
use common::model::candidate::{CandidateField, CandidateRecord};
use std::collections::HashMap;

pub const DEFAULT_CHARSET: &str = "utf-8";

/// Decodes raw upload bytes using the declared charset.
pub fn decode(bytes: &[u8], charset: &str) -> Result<String, IngestError> {
    match charset.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => {
            let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                IngestError::MalformedInput("Please provide a file in utf-8 encoding.".to_string())
            })?;
            Ok(text.trim_start_matches('\u{feff}').to_string())
        }
        "iso-8859-1" | "latin1" | "latin-1" => Ok(bytes.iter().map(|&b| b as char).collect()),
        "us-ascii" | "ascii" => {
            if bytes.is_ascii() {
                Ok(bytes.iter().map(|&b| b as char).collect())
            } else {
                Err(IngestError::MalformedInput(
                    "Please provide a file in us-ascii encoding.".to_string(),
                ))
            }
        }
        other => Err(IngestError::MalformedInput(format!(
            "Unsupported charset '{}'",
            other
        ))),
    }
}

fn header_index(headers: &csv::StringRecord) -> HashMap<CandidateField, usize> {
    let mut index = HashMap::new();
    for (i, title) in headers.iter().enumerate() {
        let title = title.trim().to_ascii_lowercase();
        if let Some(field) = CandidateField::ALL.iter().find(|f| f.column() == title) {
            // first occurrence wins
            index.entry(*field).or_insert(i);
        }
    }
    index
}

fn missing_columns(index: &HashMap<CandidateField, usize>) -> Vec<String> {
    let mut missing = Vec::new();
    for field in [CandidateField::Personal, CandidateField::Family] {
        if !index.contains_key(&field) {
            missing.push(field.column().to_string());
        }
    }
    if !index.contains_key(&CandidateField::Username) && !index.contains_key(&CandidateField::Email)
    {
        missing.push("username or email".to_string());
    }
    missing
}

/// Reports whether a quoted field is still open at the end of `text`.
///
/// The csv reader does not fail on this: the field runs to end of input and
/// swallows every following row.
fn has_unterminated_quote(text: &str) -> bool {
    let mut in_quotes = false;
    let mut field_start = true;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
        } else {
            match c {
                // quotes are only special at the start of a field
                '"' if field_start => in_quotes = true,
                ',' | '\n' | '\r' => {
                    field_start = true;
                    continue;
                }
                _ => {}
            }
        }
        field_start = false;
    }
    in_quotes
}

/// Parses decoded CSV text into candidates, preserving file order.
///
/// Rows whose cells are all empty are skipped.
pub fn parse_candidates(text: &str) -> Result<Vec<CandidateRecord>, IngestError> {
    if has_unterminated_quote(text) {
        return Err(IngestError::MalformedInput(
            "error processing uploaded CSV file: unterminated quoted field".to_string(),
        ));
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let index = header_index(reader.headers()?);
    let missing = missing_columns(&index);
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    let mut candidates = Vec::new();
    for result in reader.records() {
        let row = result?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        let cell = |field: CandidateField| -> Option<String> {
            index
                .get(&field)
                .and_then(|&i| row.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        candidates.push(CandidateRecord {
            personal: cell(CandidateField::Personal).unwrap_or_default(),
            family: cell(CandidateField::Family).unwrap_or_default(),
            username: cell(CandidateField::Username),
            email: cell(CandidateField::Email),
            event: cell(CandidateField::Event),
            role: cell(CandidateField::Role),
            errors: Default::default(),
        });
    }
    Ok(candidates)
}

/// Decodes and parses an upload in one step.
pub fn parse_upload(bytes: &[u8], charset: &str) -> Result<Vec<CandidateRecord>, IngestError> {
    parse_candidates(&decode(bytes, charset)?)
}

/// Header row of the downloadable upload template.
pub fn template_header() -> Vec<&'static str> {
    CandidateField::ALL.iter().map(|f| f.column()).collect()
}
