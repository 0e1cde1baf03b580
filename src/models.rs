//! Core data models used throughout Evidence Harness.
//!
//! These types represent the documents and candidate sentences that flow
//! from the corpus loader through segmentation into the embedding index.

use chrono::NaiveDate;
use std::fmt;

/// Kind of source document a record was scraped from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Pdf,
    Excel,
    Html,
    Other,
}

impl DocumentType {
    /// Map a free-form `File Type` cell onto a [`DocumentType`].
    ///
    /// Accepts labels (`PDF`, `Excel`), extensions (`xlsx`, `.htm`) and MIME
    /// types (`application/pdf`, `text/html`). Anything else is `Other`.
    pub fn from_label(label: &str) -> Self {
        let l = label.trim().trim_start_matches('.').to_ascii_lowercase();
        if l.contains("pdf") {
            DocumentType::Pdf
        } else if l.contains("excel")
            || l.contains("spreadsheet")
            || matches!(l.as_str(), "xls" | "xlsx" | "xlsm")
        {
            DocumentType::Excel
        } else if l.contains("html") || l == "htm" || l == "web" || l == "webpage" {
            DocumentType::Html
        } else {
            DocumentType::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Pdf => "PDF",
            DocumentType::Excel => "Excel",
            DocumentType::Html => "HTML",
            DocumentType::Other => "Other",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scraped document, as read from an organization's `content.csv`.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub organization: String,
    pub url: String,
    pub raw_content: String,
    pub document_type: DocumentType,
    /// `None` when the cell was blank or could not be parsed as a date.
    pub publication_date: Option<NaiveDate>,
    pub collected: String,
}

/// A single sentence from one page of one document, with its provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub organization: String,
    pub url: String,
    pub page: String,
    pub document_type: DocumentType,
    pub publication_date: Option<NaiveDate>,
    pub collected: String,
    pub text: String,
}

impl Candidate {
    /// Render as `"[Page <n>] <sentence>"`.
    pub fn formatted(&self) -> String {
        format!("[Page {}] {}", self.page, self.text)
    }
}

/// Render an optional date the way it appears in output tables.
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_type_labels() {
        assert_eq!(DocumentType::from_label("PDF"), DocumentType::Pdf);
        assert_eq!(
            DocumentType::from_label("application/pdf"),
            DocumentType::Pdf
        );
        assert_eq!(DocumentType::from_label(".xlsx"), DocumentType::Excel);
        assert_eq!(DocumentType::from_label("Excel"), DocumentType::Excel);
        assert_eq!(DocumentType::from_label("text/html"), DocumentType::Html);
        assert_eq!(DocumentType::from_label("HTML"), DocumentType::Html);
        assert_eq!(DocumentType::from_label(""), DocumentType::Other);
        assert_eq!(DocumentType::from_label("docx"), DocumentType::Other);
    }

    #[test]
    fn formatted_candidate() {
        let c = Candidate {
            organization: "Acme".into(),
            url: String::new(),
            page: "3".into(),
            document_type: DocumentType::Pdf,
            publication_date: None,
            collected: String::new(),
            text: "Water use fell.".into(),
        };
        assert_eq!(c.formatted(), "[Page 3] Water use fell.");
    }

    #[test]
    fn format_optional_date() {
        assert_eq!(format_date(None), "");
        let d = NaiveDate::from_ymd_opt(2023, 6, 30);
        assert_eq!(format_date(d), "2023-06-30");
    }
}
