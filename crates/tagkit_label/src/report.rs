//! Run report models and mutable report builder.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Counters and diagnostics for one `run_generate` call.
#[derive(Debug, Default, Clone)]
pub struct ReportRun {
    /// Records handed to the run.
    pub cnt_records: u64,
    /// Records left after filtering.
    pub cnt_filtered: u64,
    /// Rendered chunks (front pages).
    pub cnt_chunks: u64,
    /// Pages in the saved document, blank and back pages included.
    pub cnt_pages: u64,
    /// Save attempts that needed a lock release.
    pub cnt_lock_retries: u64,
    /// Written output file.
    pub path_output: Option<PathBuf>,
    /// Non-fatal warnings.
    pub warnings: Vec<String>,
}

impl ReportRun {
    /// Number of collected warnings.
    pub fn warning_count(&self) -> usize {
        self.warnings.len()
    }

    /// Machine-readable counters.
    pub fn to_dict(&self) -> BTreeMap<String, u64> {
        let mut dict_counts = BTreeMap::new();
        dict_counts.insert("cnt_records".to_string(), self.cnt_records);
        dict_counts.insert("cnt_filtered".to_string(), self.cnt_filtered);
        dict_counts.insert("cnt_chunks".to_string(), self.cnt_chunks);
        dict_counts.insert("cnt_pages".to_string(), self.cnt_pages);
        dict_counts.insert("cnt_lock_retries".to_string(), self.cnt_lock_retries);
        dict_counts.insert("cnt_warnings".to_string(), self.warning_count() as u64);
        dict_counts
    }

    /// Human-readable one-line summary.
    pub fn format(&self, prefix: &str) -> String {
        let dict_counts = self.to_dict();
        let c_path = self
            .path_output
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "-".to_string());
        format!(
            "{prefix} records={} filtered={} chunks={} pages={} lock_retries={} warnings={} output={c_path}",
            dict_counts["cnt_records"],
            dict_counts["cnt_filtered"],
            dict_counts["cnt_chunks"],
            dict_counts["cnt_pages"],
            dict_counts["cnt_lock_retries"],
            dict_counts["cnt_warnings"],
        )
    }
}

impl fmt::Display for ReportRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format("[TAGS]"))
    }
}

/// Mutable accumulator for run statistics.
#[derive(Debug, Default, Clone)]
pub struct ReportRunBuilder {
    /// See [`ReportRun::cnt_records`].
    pub cnt_records: u64,
    /// See [`ReportRun::cnt_filtered`].
    pub cnt_filtered: u64,
    /// See [`ReportRun::cnt_chunks`].
    pub cnt_chunks: u64,
    /// See [`ReportRun::cnt_pages`].
    pub cnt_pages: u64,
    /// See [`ReportRun::cnt_lock_retries`].
    pub cnt_lock_retries: u64,
    /// See [`ReportRun::path_output`].
    pub path_output: Option<PathBuf>,
    /// See [`ReportRun::warnings`].
    pub warnings: Vec<String>,
}

impl ReportRunBuilder {
    /// Add warning message.
    pub fn add_warning(&mut self, warning: String) {
        tracing::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Increment lock retry count by one.
    pub fn add_lock_retry(&mut self) {
        self.cnt_lock_retries += 1;
    }

    /// Finalize builder into immutable report.
    pub fn build(self) -> ReportRun {
        ReportRun {
            cnt_records: self.cnt_records,
            cnt_filtered: self.cnt_filtered,
            cnt_chunks: self.cnt_chunks,
            cnt_pages: self.cnt_pages,
            cnt_lock_retries: self.cnt_lock_retries,
            path_output: self.path_output,
            warnings: self.warnings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_run_to_dict_and_format() {
        let mut builder = ReportRunBuilder {
            cnt_records: 10,
            cnt_filtered: 10,
            cnt_chunks: 2,
            cnt_pages: 2,
            path_output: Some(PathBuf::from("out/tags.docx")),
            ..ReportRunBuilder::default()
        };
        builder.add_warning("serial fallback".to_string());
        let report = builder.build();

        let dict_counts = report.to_dict();
        assert_eq!(dict_counts["cnt_chunks"], 2);
        assert_eq!(dict_counts["cnt_warnings"], 1);
        assert_eq!(
            report.format("[RUN]"),
            "[RUN] records=10 filtered=10 chunks=2 pages=2 lock_retries=0 warnings=1 output=out/tags.docx"
        );
        assert!(report.to_string().starts_with("[TAGS] "));
    }
}
