//! Corpus discovery and `content.csv` parsing.
//!
//! The corpus root holds one directory per organization; each contains a
//! `content.csv` with one scraped document per row. The organization of
//! every record is the name of the directory holding its file, regardless
//! of what the file's own `Organization` column says.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::CorpusConfig;
use crate::models::{DocumentRecord, DocumentType};

/// Outcome of loading a corpus.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub documents: Vec<DocumentRecord>,
    pub files_loaded: usize,
    /// Files that matched but could not be read, with the reason.
    pub files_skipped: Vec<(PathBuf, String)>,
}

/// Content files found under the corpus root.
#[derive(Debug, Default)]
pub struct Discovered {
    /// Matching files, sorted by path.
    pub files: Vec<PathBuf>,
    /// Entries the walk could not visit, with the reason.
    pub skipped: Vec<(PathBuf, String)>,
}

/// Find every content file under the corpus root.
///
/// Entries that cannot be visited (dangling symlinks, loops, permission
/// errors) are recorded in [`Discovered::skipped`] and the walk continues.
pub fn discover_content_files(config: &CorpusConfig) -> Result<Discovered> {
    let root = &config.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut found = Discovered::default();

    let walker = WalkDir::new(root).follow_links(config.follow_symlinks);
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().unwrap_or(root.as_path()).to_path_buf();
                eprintln!("Warning: skipping {}: {}", path.display(), e);
                found.skipped.push((path, e.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().replace('\\', "/");

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        found.files.push(path.to_path_buf());
    }

    // Sort for deterministic ordering
    found.files.sort();

    Ok(found)
}

/// Load every discovered content file. Unreadable files are skipped with a warning.
pub fn load_corpus(config: &CorpusConfig) -> Result<LoadReport> {
    let found = discover_content_files(config)?;
    let mut report = LoadReport {
        files_skipped: found.skipped,
        ..Default::default()
    };

    for path in found.files {
        let organization = organization_for(&path);
        match read_content_file(&path, &organization) {
            Ok(docs) => {
                report.documents.extend(docs);
                report.files_loaded += 1;
            }
            Err(e) => {
                eprintln!("Warning: skipping {}: {:#}", path.display(), e);
                report.files_skipped.push((path, format!("{:#}", e)));
            }
        }
    }

    Ok(report)
}

/// Name of the directory containing `path`.
pub fn organization_for(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

pub fn read_content_file(path: &Path, organization: &str) -> Result<Vec<DocumentRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    read_content(file, organization)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Parse `content.csv` rows from any reader.
///
/// Header names are trimmed. Missing columns yield empty fields; extra
/// columns (such as `Page Count`) are ignored.
pub fn read_content<R: Read>(reader: R, organization: &str) -> Result<Vec<DocumentRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    let col = |name: &str| headers.iter().position(|h| h == name);

    let url_col = col("URL");
    let content_col = col("Raw Content");
    let type_col = col("File Type");
    let published_col = col("Publication Date");
    let collected_col = col("Date Collected");

    let mut docs = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let field = |idx: Option<usize>| {
            idx.and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };

        docs.push(DocumentRecord {
            organization: organization.to_string(),
            url: field(url_col),
            raw_content: field(content_col),
            document_type: DocumentType::from_label(&field(type_col)),
            publication_date: parse_publication_date(&field(published_col)),
            collected: field(collected_col),
        });
    }

    Ok(docs)
}

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d %B %Y", "%B %d, %Y"];

/// Coerce a free-form date cell. Unparseable or blank values become `None`.
pub fn parse_publication_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }

    // Year-month and bare year resolve to the first day of the period.
    if let Ok(d) = NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d") {
        return Some(d);
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        return s.parse().ok().and_then(|y| NaiveDate::from_ymd_opt(y, 1, 1));
    }

    None
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).case_insensitive(true).build()?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const HEADER: &str =
        "Organization,URL,Raw Content,File Type,Publication Date,Date Collected,Page Count\n";

    fn corpus_config(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/content.csv".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }

    #[test]
    fn test_read_content_rows() {
        let csv = format!(
            "{}Ignored, https://acme.test/r.pdf ,\"===== PAGE 1 ===== Water use fell.\",PDF,2023-05-01,2024-01-02,1\n",
            HEADER
        );
        let docs = read_content(csv.as_bytes(), "Acme").unwrap();
        assert_eq!(docs.len(), 1);
        let d = &docs[0];
        assert_eq!(d.organization, "Acme");
        assert_eq!(d.url, "https://acme.test/r.pdf");
        assert_eq!(d.document_type, DocumentType::Pdf);
        assert_eq!(d.publication_date, NaiveDate::from_ymd_opt(2023, 5, 1));
        assert_eq!(d.collected, "2024-01-02");
    }

    #[test]
    fn test_read_content_missing_columns() {
        let docs = read_content("URL,Raw Content\nhttps://x,hello\n".as_bytes(), "Beta").unwrap();
        assert_eq!(docs[0].raw_content, "hello");
        assert_eq!(docs[0].document_type, DocumentType::Other);
        assert_eq!(docs[0].publication_date, None);
        assert_eq!(docs[0].collected, "");
    }

    #[test]
    fn test_parse_publication_date_formats() {
        let d = NaiveDate::from_ymd_opt(2023, 5, 1);
        assert_eq!(parse_publication_date("2023-05-01"), d);
        assert_eq!(parse_publication_date("2023-05-01 10:30:00"), d);
        assert_eq!(parse_publication_date("2023-05-01T10:30:00+02:00"), d);
        assert_eq!(parse_publication_date("2023/05/01"), d);
        assert_eq!(parse_publication_date("05/01/2023"), d);
        assert_eq!(parse_publication_date("1 May 2023"), d);
        assert_eq!(parse_publication_date("May 01, 2023"), d);
        assert_eq!(parse_publication_date("2023-05"), d);
        assert_eq!(
            parse_publication_date("2023"),
            NaiveDate::from_ymd_opt(2023, 1, 1)
        );
    }

    #[test]
    fn test_parse_publication_date_invalid() {
        assert_eq!(parse_publication_date(""), None);
        assert_eq!(parse_publication_date("  "), None);
        assert_eq!(parse_publication_date("unknown"), None);
        assert_eq!(parse_publication_date("2023-13-45"), None);
    }

    #[test]
    fn test_load_corpus_organizations_from_directories() {
        let tmp = TempDir::new().unwrap();
        for org in ["Beta", "Acme"] {
            let dir = tmp.path().join(org);
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("content.csv"),
                format!("{}Wrong,https://{}.test,text,HTML,,2024-01-01,1\n", HEADER, org),
            )
            .unwrap();
        }
        // Case-insensitive file name match.
        let gamma = tmp.path().join("Gamma");
        std::fs::create_dir_all(&gamma).unwrap();
        std::fs::write(gamma.join("Content.CSV"), format!("{}G,,x,PDF,,,1\n", HEADER)).unwrap();
        // Not a content file.
        std::fs::write(tmp.path().join("Acme").join("notes.csv"), "a,b\n").unwrap();

        let report = load_corpus(&corpus_config(tmp.path())).unwrap();
        assert_eq!(report.files_loaded, 3);
        assert!(report.files_skipped.is_empty());
        let orgs: Vec<&str> = report
            .documents
            .iter()
            .map(|d| d.organization.as_str())
            .collect();
        assert_eq!(orgs, vec!["Acme", "Beta", "Gamma"]);
    }

    #[test]
    fn test_load_corpus_skips_bad_file() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("Acme");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("content.csv"), [0xff, 0xfe, 0x00, b'\n', 0xff]).unwrap();

        let report = load_corpus(&corpus_config(tmp.path())).unwrap();
        assert_eq!(report.files_loaded, 0);
        assert_eq!(report.files_skipped.len(), 1);
        assert!(report.documents.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_load_corpus_survives_dangling_symlink() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("Acme");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("content.csv"),
            format!("{}Acme,https://acme.test,\"===== PAGE 1 ===== Hi.\",PDF,,,1\n", HEADER),
        )
        .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone"), tmp.path().join("stale_link")).unwrap();

        let mut config = corpus_config(tmp.path());
        config.follow_symlinks = true;
        let report = load_corpus(&config).unwrap();

        assert_eq!(report.files_loaded, 1);
        assert_eq!(report.documents.len(), 1);
        assert_eq!(report.documents[0].organization, "Acme");
        assert_eq!(report.files_skipped.len(), 1);
        assert!(report.files_skipped[0].0.ends_with("stale_link"));
    }

    #[test]
    fn test_missing_root_errors() {
        let tmp = TempDir::new().unwrap();
        let err = load_corpus(&corpus_config(&tmp.path().join("nope"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }
}
