//! Run progress reporting.
//!
//! Reports observable progress during `evh run` so users see which phase
//! is active and how much is left. Progress is emitted on **stderr** so
//! stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Content files discovered under the corpus root.
    Loading { files: u64 },
    /// Documents being split into candidate sentences.
    Segmenting { documents: u64 },
    /// Distinct sentences encoded so far.
    Encoding { n: u64, total: u64 },
    /// Question rows answered so far.
    Retrieving { n: u64, total: u64 },
}

/// Reports run progress. Implementations write to stderr (human or JSON).
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "encode  1,234 / 5,000 sentences".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Loading { files } => {
                format!("load  {} content files\n", format_number(*files))
            }
            ProgressEvent::Segmenting { documents } => {
                format!("segment  {} documents\n", format_number(*documents))
            }
            ProgressEvent::Encoding { n, total } => format!(
                "encode  {} / {} sentences\n",
                format_number(*n),
                format_number(*total)
            ),
            ProgressEvent::Retrieving { n, total } => format!(
                "retrieve  {} / {} questions\n",
                format_number(*n),
                format_number(*total)
            ),
        };
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(line.as_bytes());
        let _ = err.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let obj = match &event {
            ProgressEvent::Loading { files } => serde_json::json!({
                "event": "progress",
                "phase": "loading",
                "files": files
            }),
            ProgressEvent::Segmenting { documents } => serde_json::json!({
                "event": "progress",
                "phase": "segmenting",
                "documents": documents
            }),
            ProgressEvent::Encoding { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "encoding",
                "n": n,
                "total": total
            }),
            ProgressEvent::Retrieving { n, total } => serde_json::json!({
                "event": "progress",
                "phase": "retrieving",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut err = std::io::stderr().lock();
            let _ = writeln!(err, "{}", line);
            let _ = err.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn off_mode_is_silent() {
        // Must not panic or write; nothing observable beyond that.
        ProgressMode::Off
            .reporter()
            .report(ProgressEvent::Encoding { n: 1, total: 2 });
    }
}
