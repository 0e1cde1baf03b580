//! The question dataset: one (organization, question) pair per row.
//!
//! The table keeps every original column and cell so the augmented output
//! can reproduce the input verbatim alongside the retrieval columns.

use anyhow::{bail, Context, Result};
use std::io::Read;

use crate::config::QuestionsConfig;

#[derive(Debug, Clone)]
pub struct QuestionTable {
    pub headers: Vec<String>,
    /// Rows padded or truncated to `headers.len()`.
    pub rows: Vec<Vec<String>>,
    organization_col: usize,
    question_col: usize,
}

/// One row's query, borrowed from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Query<'a> {
    pub organization: &'a str,
    pub question: &'a str,
}

impl QuestionTable {
    pub fn load(config: &QuestionsConfig) -> Result<Self> {
        let file = std::fs::File::open(&config.path)
            .with_context(|| format!("Failed to open questions file: {}", config.path.display()))?;
        Self::from_reader(file, &config.organization_column, &config.question_column)
            .with_context(|| format!("Failed to parse questions file: {}", config.path.display()))
    }

    /// Parse a CSV question table.
    ///
    /// Both named columns must be present (matched after trimming). Short
    /// rows are padded with empty cells.
    pub fn from_reader<R: Read>(
        reader: R,
        organization_column: &str,
        question_column: &str,
    ) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()?
            .iter()
            .enumerate()
            .map(|(i, h)| {
                if i == 0 {
                    h.trim_start_matches('\u{feff}').to_string()
                } else {
                    h.to_string()
                }
            })
            .collect();

        let find = |name: &str| headers.iter().position(|h| h.trim() == name.trim());
        let Some(organization_col) = find(organization_column) else {
            bail!("Questions file has no '{}' column", organization_column);
        };
        let Some(question_col) = find(question_column) else {
            bail!("Questions file has no '{}' column", question_column);
        };

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().map(str::to_string).collect();
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(Self {
            headers,
            rows,
            organization_col,
            question_col,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Queries in row order. Organization names are trimmed.
    pub fn queries(&self) -> impl Iterator<Item = Query<'_>> + '_ {
        self.rows.iter().map(move |row| Query {
            organization: row[self.organization_col].trim(),
            question: row[self.question_col].as_str(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reader() {
        let csv = "\u{feff}Organization,SDG Question,Notes\nAcme ,Water targets?,x\nBeta,Energy?\n";
        let table =
            QuestionTable::from_reader(csv.as_bytes(), "Organization", "SDG Question").unwrap();
        assert_eq!(table.headers, vec!["Organization", "SDG Question", "Notes"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[1], vec!["Beta", "Energy?", ""]);

        let queries: Vec<Query> = table.queries().collect();
        assert_eq!(
            queries[0],
            Query {
                organization: "Acme",
                question: "Water targets?"
            }
        );
        assert_eq!(queries[1].organization, "Beta");
    }

    #[test]
    fn test_custom_columns() {
        let csv = "Company,Prompt\nAcme,Q\n";
        let table = QuestionTable::from_reader(csv.as_bytes(), "Company", "Prompt").unwrap();
        assert_eq!(table.queries().next().unwrap().question, "Q");
    }

    #[test]
    fn test_missing_column() {
        let err = QuestionTable::from_reader(
            "Organization\nAcme\n".as_bytes(),
            "Organization",
            "SDG Question",
        )
        .unwrap_err();
        assert!(err.to_string().contains("SDG Question"));
    }

    #[test]
    fn test_header_only_is_empty() {
        let table = QuestionTable::from_reader(
            "Organization,SDG Question\n".as_bytes(),
            "Organization",
            "SDG Question",
        )
        .unwrap();
        assert!(table.is_empty());
    }
}
