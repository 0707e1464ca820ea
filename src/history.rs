//! History records returned by the conversion service.
//!
//! The service appends one record per conversion to a JSON log and returns
//! it verbatim from `GET /history`, with no ordering guarantee. PDF
//! conversions carry `input_pdf`/`output_md`/`ocr`; Markdown→DOCX exports
//! are logged in the same list with `"type": "md_to_docx"` and
//! `input_md`/`output_docx` instead, so every path field is optional here.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Summary of one past session, as listed by `GET /history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub session_id: String,
    /// ISO-8601 timestamp as written by the service (usually UTC with `Z`).
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_pdf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_md: Option<String>,
    /// Display filename; also the lookup key for `GET /get_file`.
    pub filename: String,
    #[serde(default)]
    pub ocr: bool,
    /// Record kind; absent for PDF conversions.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl HistoryEntry {
    /// Parse [`Self::timestamp`]; `None` when it is not a recognisable date-time.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    /// Whether this record can be reopened in the conversion view.
    pub fn is_pdf_conversion(&self) -> bool {
        self.kind.is_none() && self.input_pdf.is_some()
    }
}

/// Full payload for one history entry, from `GET /get_file`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryFile {
    pub filename: String,
    pub markdown_content: String,
    /// Service-relative path of the original PDF, resolved against the base address.
    pub pdf_url: String,
}

/// Parse the timestamp formats the service emits.
///
/// Accepts RFC 3339 (`2024-06-01T10:00:00.123456Z`) and zone-less forms
/// with or without seconds (`2024-06-01T10:00`), which are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(naive, fmt).ok())
        .map(|dt| dt.and_utc())
}

/// Sort entries most-recent first.
///
/// Entries with unparseable timestamps sink to the end. Ties keep their
/// relative order from the service.
pub fn sort_by_recency(entries: &mut [HistoryEntry]) {
    entries.sort_by(|a, b| compare_recency(a.recorded_at(), b.recorded_at()));
}

fn compare_recency(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, ts: &str) -> HistoryEntry {
        HistoryEntry {
            session_id: id.into(),
            timestamp: ts.into(),
            input_pdf: Some(format!("temp_sessions/{id}/doc.pdf")),
            output_md: Some(format!("temp_sessions/{id}/doc.md")),
            filename: format!("{id}.pdf"),
            ocr: false,
            kind: None,
        }
    }

    #[test]
    fn sorts_descending_by_timestamp() {
        let mut entries = vec![
            entry("t1", "2024-01-01T00:00"),
            entry("t2", "2024-06-01T00:00"),
            entry("t3", "2024-03-01T00:00"),
        ];
        sort_by_recency(&mut entries);
        let ids: Vec<_> = entries.iter().map(|e| e.session_id.as_str()).collect();
        assert_eq!(ids, vec!["t2", "t3", "t1"]);
    }

    #[test]
    fn mixed_formats_compare_as_instants() {
        let mut entries = vec![
            entry("a", "2024-06-01T09:00:00.500000Z"),
            entry("b", "2024-06-01T10:00:00+02:00"), // 08:00 UTC
            entry("c", "2024-06-01T09:30"),
        ];
        sort_by_recency(&mut entries);
        let ids: Vec<_> = entries.iter().map(|e| e.session_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn unparseable_timestamps_sink() {
        let mut entries = vec![entry("bad", "yesterday"), entry("ok", "2020-01-01T00:00")];
        sort_by_recency(&mut entries);
        assert_eq!(entries[0].session_id, "ok");
        assert_eq!(entries[1].recorded_at(), None);
    }

    #[test]
    fn parses_service_timestamp() {
        let dt = parse_timestamp("2025-02-03T04:05:06.789012Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2025-02-03T04:05:06.789012+00:00");
    }

    #[test]
    fn decodes_pdf_record() {
        let json = r#"{"session_id":"abc","timestamp":"2025-01-01T00:00:00Z",
            "input_pdf":"temp_sessions/abc/SPASSIGN.pdf","output_md":"temp_sessions/abc/SPASSIGN.md",
            "filename":"SPASSIGN.pdf","ocr":true}"#;
        let e: HistoryEntry = serde_json::from_str(json).unwrap();
        assert!(e.ocr);
        assert!(e.is_pdf_conversion());
    }

    #[test]
    fn decodes_docx_export_record() {
        let json = r#"{"session_id":"def","timestamp":"2025-01-01T00:00:00Z",
            "input_md":"temp_sessions/def/document.md","output_docx":"temp_sessions/def/document.docx",
            "filename":"document.md","type":"md_to_docx"}"#;
        let e: HistoryEntry = serde_json::from_str(json).unwrap();
        assert!(!e.ocr);
        assert_eq!(e.kind.as_deref(), Some("md_to_docx"));
        assert!(!e.is_pdf_conversion());
    }
}
