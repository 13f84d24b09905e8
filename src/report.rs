//! Report sinks and persisted results.
//!
//! Islands accumulate human-readable text in a [`Report`] buffer; the
//! objective callback may append to it as well. When a filename key is
//! configured, each island's report lands in its own `.rpt` file and the
//! final populations are aggregated into a single tabular `.res` or
//! `.json` file. I/O failures are logged and never interrupt evolution.

use crate::island::Island;
use crate::population::PopulationRecord;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Append-only text sink handed to the objective callback and filled by
/// the islands' per-generation reporting.
#[derive(Debug, Clone, Default)]
pub struct Report {
    buf: String,
}

impl Report {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends raw text.
    pub fn append(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    /// Appends a line.
    pub fn appendln(&mut self, line: &str) {
        self.buf.push_str(line);
        self.buf.push('\n');
    }

    /// The accumulated text.
    pub fn as_str(&self) -> &str {
        &self.buf
    }

    /// Whether anything has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Number of accumulated bytes.
    pub fn len(&self) -> usize {
        self.buf.len()
    }
}

impl fmt::Write for Report {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.buf.push_str(s);
        Ok(())
    }
}

/// Writes one island's report to `<dir>/<fn_key>-<id>.rpt`.
///
/// Failures are downgraded to warnings.
pub fn save_island_report(dir: &str, fn_key: &str, id: usize, report: &Report) {
    if report.is_empty() {
        return;
    }
    let path = Path::new(dir).join(format!("{fn_key}-{id}.rpt"));
    if let Err(e) = fs::create_dir_all(dir).and_then(|_| fs::write(&path, report.as_str())) {
        warn!(path = %path.display(), error = %e, "failed to write island report");
    }
}

/// Writes the aggregate of all final populations to
/// `<dir>/<fn_key>-<key>.res` (tabular) or `.json`.
pub fn save_results(dir: &str, fn_key: &str, key: &str, islands: &[Island], json: bool) {
    let (ext, body) = if json {
        let records: Vec<PopulationRecord> = islands
            .iter()
            .map(|isl| isl.pop.to_record(isl.id))
            .collect();
        match serde_json::to_string_pretty(&records) {
            Ok(s) => ("json", s),
            Err(e) => {
                warn!(error = %e, "failed to serialize results");
                return;
            }
        }
    } else {
        let mut body = String::new();
        for (i, isl) in islands.iter().enumerate() {
            if i > 0 {
                body.push('\n');
            }
            body.push_str(&format!("island {}\n", isl.id));
            body.push_str(&isl.pop.output_table());
        }
        ("res", body)
    };
    let path = Path::new(dir).join(format!("{fn_key}-{key}.{ext}"));
    if let Err(e) = fs::create_dir_all(dir).and_then(|_| fs::write(&path, body)) {
        warn!(path = %path.display(), error = %e, "failed to write results");
    }
}
