//! Join retrieval results back onto the question table and write it out.
//!
//! Every input row yields exactly one output row. The six result columns
//! overwrite same-named input columns in place; otherwise they are appended
//! in the order of [`OUTPUT_COLUMNS`].

use anyhow::{Context, Result};
use std::path::Path;

use crate::progress::{ProgressEvent, ProgressReporter};
use crate::questions::QuestionTable;
use crate::retrieval::{RetrievalParams, RetrievalResult, RetrievalSession};

pub const OUTPUT_COLUMNS: [&str; 6] = [
    "Filtered Content",
    "URL",
    "Page number",
    "Document Type",
    "Publication Date",
    "Last updated Date",
];

/// Emit a retrieving progress event every this many rows.
const PROGRESS_EVERY: usize = 25;

/// The six result cells for one question row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowOutput {
    pub filtered_content: String,
    pub urls: String,
    pub pages: String,
    pub document_type: String,
    pub publication_date: String,
    pub last_updated: String,
}

impl RowOutput {
    fn cells(&self) -> [&str; 6] {
        [
            &self.filtered_content,
            &self.urls,
            &self.pages,
            &self.document_type,
            &self.publication_date,
            &self.last_updated,
        ]
    }

    pub fn is_blank(&self) -> bool {
        self.cells().iter().all(|c| c.is_empty())
    }
}

impl From<&RetrievalResult<'_>> for RowOutput {
    fn from(r: &RetrievalResult<'_>) -> Self {
        Self {
            filtered_content: r.joined_content(),
            urls: r.joined_urls(),
            pages: r.joined_pages(),
            document_type: r.document_type_label(),
            publication_date: r.publication_date_label(),
            last_updated: r.collected_label(),
        }
    }
}

/// Run one retrieval per question row, in row order.
pub async fn answer_all(
    session: &RetrievalSession,
    table: &QuestionTable,
    params: &RetrievalParams,
    progress: &dyn ProgressReporter,
) -> Result<Vec<RowOutput>> {
    let total = table.len();
    let mut outputs = Vec::with_capacity(total);

    for (n, query) in table.queries().enumerate() {
        let result = session
            .retrieve(query.question, query.organization, params)
            .await?;
        outputs.push(RowOutput::from(&result));

        let done = n + 1;
        if done % PROGRESS_EVERY == 0 || done == total {
            progress.report(ProgressEvent::Retrieving {
                n: done as u64,
                total: total as u64,
            });
        }
    }

    Ok(outputs)
}

/// The question table with result columns merged in.
#[derive(Debug, Clone)]
pub struct AugmentedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl AugmentedTable {
    /// Merge `outputs` (one per row, in row order) into `table`.
    pub fn build(table: &QuestionTable, outputs: &[RowOutput]) -> Result<Self> {
        anyhow::ensure!(
            outputs.len() == table.len(),
            "{} result rows for {} question rows",
            outputs.len(),
            table.len()
        );

        let mut headers = table.headers.clone();
        let slots: Vec<usize> = OUTPUT_COLUMNS
            .iter()
            .map(|name| match headers.iter().position(|h| h.trim() == *name) {
                Some(i) => i,
                None => {
                    headers.push(name.to_string());
                    headers.len() - 1
                }
            })
            .collect();

        let rows = table
            .rows
            .iter()
            .zip(outputs)
            .map(|(row, out)| {
                let mut row = row.clone();
                row.resize(headers.len(), String::new());
                for (slot, cell) in slots.iter().zip(out.cells()) {
                    row[*slot] = cell.to_string();
                }
                row
            })
            .collect();

        Ok(Self { headers, rows })
    }

    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(&self.headers)?;
        for row in &self.rows {
            wtr.write_record(row)?;
        }
        wtr.into_inner().context("Failed to flush CSV output")
    }

    /// Write the table to `path`, replacing any existing file only once the
    /// new content is complete.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let bytes = self.to_csv_bytes()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = std::path::PathBuf::from(tmp);

        std::fs::write(&tmp, bytes)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to move output into place: {}", path.display()))?;
        Ok(())
    }
}
