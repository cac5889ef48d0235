//! CSV reading for uploaded files.
//!
//! Bytes are decoded with encoding auto-detection, then scanned once, left to
//! right, with a single "in quotes" flag. Supported:
//!
//! - commas and newlines inside double-quoted fields
//! - `""` as an escaped quote inside a quoted field
//! - CRLF and LF line endings (mixed is fine)
//!
//! The first non-empty line is the header. Short rows are padded with empty
//! cells, extra cells are dropped.

use std::path::Path;

use crate::config::MAX_FILE_SIZE;
use crate::error::{CsvError, CsvResult};
use crate::models::CsvRow;

/// Parsed file: header plus one [`CsvRow`] per non-empty data line.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCsv {
    pub headers: Vec<String>,
    pub rows: Vec<CsvRow>,
}

/// A file chosen on the file-selection step, already decoded to text.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub contents: String,
    pub encoding: String,
    pub size: usize,
}

impl SelectedFile {
    /// Read and decode a file from disk.
    pub fn from_path<P: AsRef<Path>>(path: P) -> CsvResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.csv")
            .to_string();
        Self::from_bytes(name, &bytes)
    }

    /// Decode raw upload bytes.
    pub fn from_bytes(name: impl Into<String>, bytes: &[u8]) -> CsvResult<Self> {
        if bytes.len() > MAX_FILE_SIZE {
            return Err(CsvError::TooLarge {
                size: bytes.len(),
                max: MAX_FILE_SIZE,
            });
        }
        let encoding = detect_encoding(bytes);
        let contents = decode_content(bytes, &encoding)?;
        Ok(Self {
            name: name.into(),
            contents,
            encoding,
            size: bytes.len(),
        })
    }

    /// Wrap text that is already decoded.
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let contents = text.into();
        Self {
            name: name.into(),
            size: contents.len(),
            contents,
            encoding: "utf-8".to_string(),
        }
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xEF, 0xBB, 0xBF]) {
        return "utf-8".to_string();
    }
    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to a string using the given encoding label.
///
/// Spreadsheet files saved under a `.csv` name decode to text full of NULs;
/// those are rejected rather than parsed into garbage.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let text = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        "iso-8859-1" | "latin-1" | "latin1" => {
            encoding_rs::ISO_8859_15.decode(bytes).0.into_owned()
        }
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        label => match encoding_rs::Encoding::for_label(label.as_bytes()) {
            Some(enc) => enc.decode(bytes).0.into_owned(),
            None => String::from_utf8_lossy(bytes).into_owned(),
        },
    };

    if text.contains('\0') {
        return Err(CsvError::Encoding(
            "file is not plain text; export the spreadsheet as CSV".to_string(),
        ));
    }

    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Parse CSV text into header and rows.
pub fn parse_csv(text: &str) -> CsvResult<ParsedCsv> {
    let mut records = scan_records(text.trim_start_matches('\u{feff}'))
        .into_iter()
        .filter(|record| record.iter().any(|cell| !cell.trim().is_empty()));

    let headers: Vec<String> = records
        .next()
        .ok_or(CsvError::EmptyFile)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let rows: Vec<CsvRow> = records
        .map(|record| {
            let fields = headers
                .iter()
                .enumerate()
                .map(|(i, header)| {
                    let value = record.get(i).map(|c| c.trim()).unwrap_or("");
                    (header.clone(), value.to_string())
                })
                .collect();
            CsvRow::new(fields)
        })
        .collect();

    if rows.is_empty() {
        return Err(CsvError::NoDataRows);
    }

    Ok(ParsedCsv { headers, rows })
}

/// Parse CSV text, keeping only the rows.
pub fn parse_rows(text: &str) -> CsvResult<Vec<CsvRow>> {
    parse_csv(text).map(|parsed| parsed.rows)
}

/// Split text into raw records. Cells are not trimmed here.
fn scan_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

/// Write rows back to CSV text (CRLF, quoting only where needed).
///
/// Columns follow `headers`; cells missing from a row are written empty.
pub fn to_csv(headers: &[String], rows: &[CsvRow]) -> CsvResult<String> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(headers).map_err(std::io::Error::from)?;
    for row in rows {
        writer
            .write_record(headers.iter().map(|h| row.get(h).unwrap_or("")))
            .map_err(std::io::Error::from)?;
    }

    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| CsvError::Encoding(e.to_string()))
}
