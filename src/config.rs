//! Configuration types for export jobs
//!
//! An export is described by one YAML (or JSON) document: the source to page
//! over, the page size, how the cursor learns its bound and recognises the
//! last page, the execution mode and the output format.

use crate::engine::ExportMode;
use crate::error::{Error, Result};
use crate::output::OutputFormat;
use crate::pagination::{BoundPolicy, CountSupplier, LastPageSignal, PageCursor, PageFetcher};
use crate::source::{
    DuckDbSource, DuckDbSourceConfig, HttpPageSource, HttpSourceConfig, MemorySource,
};
use crate::types::{JsonValue, PageRequest, PageResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Cursor over JSON records, as built from an [`ExportConfig`]
pub type RecordCursor = PageCursor<PageResult<JsonValue>, JsonValue>;

// ============================================================================
// Top-Level Export Config
// ============================================================================

/// Complete export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Items per page
    pub page_size: u64,

    /// First page index
    #[serde(default)]
    pub start_page: u64,

    /// How the cursor learns the extent of the result set
    #[serde(default)]
    pub bound: BoundConfig,

    /// How the cursor recognises the last page
    #[serde(default)]
    pub last_page: LastPageConfig,

    /// Sequential or parallel execution
    #[serde(default)]
    pub mode: ExportMode,

    /// Output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Output file; stdout when unset
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// Where records come from
    pub source: SourceConfig,
}

/// Bound policy configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoundConfig {
    /// Total item count known up front
    ExactItems { count: u64 },
    /// Total page count known up front
    ExactPages { count: u64 },
    /// Ask the source for its record count on first need
    LazyCount,
    /// Prefetch the first page to learn the page count
    #[default]
    Discover,
}

/// Last-page signal configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastPageConfig {
    /// A page shorter than the page size is the last one
    #[default]
    ShortPage,
    /// The source flags the last page
    BackendFlag,
}

/// Source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// JSON array or JSON Lines file loaded into memory
    File { path: PathBuf },
    /// JSON HTTP endpoint
    Http(HttpSourceConfig),
    /// DuckDB query
    Duckdb(DuckDbSourceConfig),
}

impl SourceConfig {
    /// Short name used in logs and plans
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Http(_) => "http",
            Self::Duckdb(_) => "duckdb",
        }
    }
}

impl ExportConfig {
    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::config(format!("Failed to read {}: {e}", path.display())))?;

        let config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Reject configurations no cursor or job can run with
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::config("page_size must be greater than zero"));
        }
        if self.mode.workers() == 0 {
            return Err(Error::config("parallel mode needs at least one worker"));
        }

        if let SourceConfig::Http(http) = &self.source {
            if self.bound == BoundConfig::LazyCount {
                return Err(Error::config("lazy_count bound is not supported by http sources"));
            }
            if self.bound == BoundConfig::Discover
                && http.total_pages_path.is_none()
                && http.total_items_path.is_none()
            {
                return Err(Error::config(
                    "discover bound needs total_pages_path or total_items_path",
                ));
            }
            if self.last_page == LastPageConfig::BackendFlag && http.is_last_path.is_none() {
                return Err(Error::config("backend_flag last page needs is_last_path"));
            }
        }
        Ok(())
    }

    /// Open the source and build a cursor over it
    ///
    /// HTTP sources capture the current tokio runtime, so call this from
    /// inside one.
    pub fn build_cursor(&self) -> Result<RecordCursor> {
        self.validate()?;
        tracing::debug!(source = self.source.kind(), "Opening source");

        match &self.source {
            SourceConfig::File { path } => {
                let source = MemorySource::from_file(path)?;
                self.cursor_over(source.clone(), Some(Box::new(source)))
            }
            SourceConfig::Http(http) => {
                self.cursor_over(HttpPageSource::current(http.clone())?, None)
            }
            SourceConfig::Duckdb(duckdb) => {
                let source = Arc::new(DuckDbSource::open(duckdb)?);
                let counter = Arc::clone(&source);
                self.cursor_over(
                    move |request: PageRequest| source.fetch(request),
                    Some(Box::new(move || counter.row_count())),
                )
            }
        }
    }

    fn cursor_over(
        &self,
        fetcher: impl PageFetcher<PageResult<JsonValue>> + 'static,
        counter: Option<Box<dyn CountSupplier>>,
    ) -> Result<RecordCursor> {
        let bound = match self.bound {
            BoundConfig::ExactItems { count } => BoundPolicy::ExactItemCount(count),
            BoundConfig::ExactPages { count } => BoundPolicy::ExactPageCount(count),
            BoundConfig::LazyCount => BoundPolicy::LazyItemCount(counter.ok_or_else(|| {
                Error::config("lazy_count bound needs a source that can count its records")
            })?),
            BoundConfig::Discover => BoundPolicy::discover_from_results(),
        };
        let signal = match self.last_page {
            LastPageConfig::ShortPage => LastPageSignal::ShortPage,
            LastPageConfig::BackendFlag => LastPageSignal::flag_from_results(),
        };

        PageCursor::for_results(self.page_size, fetcher, bound)
            .start_page(self.start_page)
            .last_page_signal(signal)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn users_file(count: u64) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for id in 0..count {
            writeln!(file, "{}", serde_json::json!({ "id": id })).unwrap();
        }
        file
    }

    fn file_config(path: &Path, page_size: u64) -> ExportConfig {
        ExportConfig {
            page_size,
            start_page: 0,
            bound: BoundConfig::Discover,
            last_page: LastPageConfig::ShortPage,
            mode: ExportMode::Sequential,
            format: OutputFormat::Csv,
            output: None,
            source: SourceConfig::File {
                path: path.to_path_buf(),
            },
        }
    }

    #[test]
    fn test_parse_minimal_config() {
        let yaml = r#"
page_size: 100
source:
  type: file
  path: users.jsonl
"#;

        let config = ExportConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config, file_config(Path::new("users.jsonl"), 100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
page_size: 500
start_page: 2
bound:
  type: exact_items
  count: 12000
last_page: backend_flag
mode:
  kind: parallel
  workers: 8
format: jsonl
output: /tmp/users.jsonl
source:
  type: http
  url: "https://api.example.com/users"
  page_param: p
  items_path: data
  is_last_path: meta.last
  rate_limit:
    requests_per_second: 20
    burst_size: 5
"#;

        let config = ExportConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.start_page, 2);
        assert_eq!(config.bound, BoundConfig::ExactItems { count: 12000 });
        assert_eq!(config.last_page, LastPageConfig::BackendFlag);
        assert_eq!(config.mode, ExportMode::Parallel { workers: 8 });
        assert_eq!(config.format, OutputFormat::Jsonl);
        assert_eq!(config.output, Some(PathBuf::from("/tmp/users.jsonl")));

        let SourceConfig::Http(http) = &config.source else {
            panic!("Expected http source");
        };
        assert_eq!(http.page_param, "p");
        assert_eq!(http.size_param, "size");
        assert_eq!(http.items_path.as_deref(), Some("data"));
        assert_eq!(http.rate_limit.as_ref().map(|r| r.burst_size), Some(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_duckdb_source() {
        let yaml = r#"
page_size: 1000
bound:
  type: lazy_count
source:
  type: duckdb
  database: warehouse.duckdb
  query: SELECT * FROM users ORDER BY id
"#;

        let config = ExportConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.source.kind(), "duckdb");
        assert_eq!(config.bound, BoundConfig::LazyCount);
    }

    #[test]
    fn test_parse_rejects_unknown_bound() {
        let yaml = "page_size: 10\nbound:\n  type: guess\nsource:\n  type: file\n  path: x\n";
        assert!(matches!(
            ExportConfig::from_yaml_str(yaml),
            Err(Error::YamlParse(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let config = file_config(Path::new("users.jsonl"), 0);
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_validate_rejects_zero_workers() {
        let mut config = file_config(Path::new("users.jsonl"), 10);
        config.mode = ExportMode::Parallel { workers: 0 };
        assert!(config.validate().unwrap_err().is_config());
    }

    #[test]
    fn test_validate_http_needs_paths_for_discovery_and_flag() {
        let mut config = file_config(Path::new("unused"), 10);
        config.source = SourceConfig::Http(HttpSourceConfig::new("http://localhost/users"));
        assert!(config.validate().is_err());

        config.source = SourceConfig::Http(
            HttpSourceConfig::new("http://localhost/users").with_total_items_path("total"),
        );
        assert!(config.validate().is_ok());

        config.last_page = LastPageConfig::BackendFlag;
        assert!(config.validate().is_err());

        config.bound = BoundConfig::LazyCount;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"page_size": 25, "source": {{"type": "file", "path": "users.json"}}}}"#
        )
        .unwrap();

        let config = ExportConfig::from_file(file.path()).unwrap();
        assert_eq!(config.page_size, 25);
    }

    #[test]
    fn test_from_missing_file() {
        let err = ExportConfig::from_file("/nonexistent/export.yaml").unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_build_cursor_over_file_with_lazy_count() {
        let file = users_file(42);
        let mut config = file_config(file.path(), 10);
        config.bound = BoundConfig::LazyCount;

        let cursor = config.build_cursor().unwrap();
        assert_eq!(cursor.bound_kind(), "lazy_items");
        assert_eq!(cursor.estimate_size().unwrap(), 42);

        let records: Vec<JsonValue> = cursor.into_sequence().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 42);
    }

    #[test]
    fn test_build_cursor_honours_start_page() {
        let file = users_file(30);
        let mut config = file_config(file.path(), 10);
        config.start_page = 1;

        let records: Vec<JsonValue> = config
            .build_cursor()
            .unwrap()
            .into_sequence()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(records.first(), Some(&serde_json::json!({ "id": 10 })));
        assert_eq!(records.len(), 20);
    }

    #[test]
    fn test_build_cursor_over_duckdb_with_lazy_count() {
        let mut config = file_config(Path::new("unused"), 7);
        config.bound = BoundConfig::LazyCount;
        config.last_page = LastPageConfig::BackendFlag;
        config.source = SourceConfig::Duckdb(DuckDbSourceConfig {
            database: None,
            setup: Some("CREATE TABLE t AS SELECT range AS id FROM range(20);".to_string()),
            query: "SELECT id FROM t ORDER BY id".to_string(),
        });

        let cursor = config.build_cursor().unwrap();
        assert_eq!(cursor.estimate_size().unwrap(), 20);

        let records: Vec<JsonValue> = cursor.into_sequence().collect::<Result<_>>().unwrap();
        assert_eq!(records.len(), 20);
        assert_eq!(records[19], serde_json::json!({ "id": 19 }));
    }
}
