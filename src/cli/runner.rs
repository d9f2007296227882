//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands};
use crate::config::ExportConfig;
use crate::engine::{ExportJob, ExportMode};
use crate::error::{Error, Result, ResultExt};
use crate::output::{open_sink, OutputFormat};
use crate::stream::decompose_fully;
use serde_json::{json, Value};
use std::path::PathBuf;

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Export {
                output,
                format,
                workers,
            } => {
                let mut config = self.load_config()?;
                apply_overrides(&mut config, output.clone(), *format, *workers);
                self.export(config).await
            }
            Commands::Plan => self.plan().await,
            Commands::Validate => self.validate(),
        }
    }

    /// Load and validate the export configuration
    fn load_config(&self) -> Result<ExportConfig> {
        let path = self
            .cli
            .config
            .as_ref()
            .ok_or_else(|| Error::config("Export config not specified (use -C flag)"))?;
        let config = ExportConfig::from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Export every record and report the outcome
    async fn export(&self, config: ExportConfig) -> Result<()> {
        let cursor = config.build_cursor()?;
        let sink = open_sink(config.format, config.output.as_deref())
            .with_context(|| format!("Cannot write {} output", config.format))?;

        let report = ExportJob::new(cursor).with_mode(config.mode).run(sink).await?;

        let msg = json!({
            "type": "REPORT",
            "source": config.source.kind(),
            "format": config.format,
            "output": config.output,
            "records": report.records,
            "pages": report.pages,
            "units": report.units,
            "mode": report.mode,
            "duration_ms": report.duration().num_milliseconds(),
            "records_per_second": report.records_per_second(),
        });
        // Records own stdout when no output file is set.
        if config.output.is_some() {
            self.output_message(&msg);
        } else {
            eprintln!("{}", serde_json::to_string(&msg)?);
        }
        Ok(())
    }

    /// Print the units a parallel export would drain
    async fn plan(&self) -> Result<()> {
        let config = self.load_config()?;
        let plan = build_plan(&config).await?;
        self.output_message(&plan);
        Ok(())
    }

    /// Validate the configuration without opening the source
    fn validate(&self) -> Result<()> {
        let config = self.load_config()?;
        self.output_message(&json!({
            "type": "VALIDATION",
            "status": "VALID",
            "source": config.source.kind(),
            "page_size": config.page_size,
            "mode": config.mode,
        }));
        Ok(())
    }

    fn output_message(&self, msg: &Value) {
        if self.cli.verbose {
            println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
        } else {
            println!("{}", serde_json::to_string(msg).unwrap_or_default());
        }
    }
}

/// Command-line flags take precedence over the config file
fn apply_overrides(
    config: &mut ExportConfig,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
    workers: Option<usize>,
) {
    if output.is_some() {
        config.output = output;
    }
    if let Some(format) = format {
        config.format = format;
    }
    if let Some(workers) = workers {
        config.mode = ExportMode::Parallel { workers };
    }
}

/// Decompose the configured cursor and describe each unit
///
/// Discovery and counting may fetch, so this runs on a blocking worker.
pub async fn build_plan(config: &ExportConfig) -> Result<Value> {
    let cursor = config.build_cursor()?;
    let (estimate, units) = tokio::task::spawn_blocking(move || -> Result<_> {
        let estimate = cursor.estimate_size()?;
        let units = decompose_fully(cursor)?;
        Ok((estimate, units))
    })
    .await
    .map_err(|e| Error::Other(format!("Plan worker failed: {e}")))??;

    let units: Vec<Value> = units
        .iter()
        .map(|unit| {
            json!({
                "page": unit.first_page(),
                "kind": unit.kind(),
                "prefetched": unit.is_prefetched(),
            })
        })
        .collect();

    Ok(json!({
        "type": "PLAN",
        "source": config.source.kind(),
        "page_size": config.page_size,
        "estimated_items": estimate,
        "unit_count": units.len(),
        "units": units,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_parse_export_overrides() {
        let cli = parse(&[
            "solidafy-pagestream",
            "-C",
            "export.yaml",
            "export",
            "--output",
            "users.jsonl",
            "--format",
            "jsonl",
            "--workers",
            "4",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("export.yaml")));
        let Commands::Export {
            output,
            format,
            workers,
        } = cli.command
        else {
            panic!("expected export command");
        };
        assert_eq!(output, Some(PathBuf::from("users.jsonl")));
        assert_eq!(format, Some(OutputFormat::Jsonl));
        assert_eq!(workers, Some(4));
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = ExportConfig::from_yaml_str(
            "page_size: 10\nsource:\n  type: file\n  path: users.json\n",
        )
        .unwrap();

        apply_overrides(&mut config, None, None, None);
        assert_eq!(config.mode, ExportMode::Sequential);
        assert_eq!(config.output, None);

        apply_overrides(
            &mut config,
            Some(PathBuf::from("out.csv")),
            Some(OutputFormat::Jsonl),
            Some(3),
        );
        assert_eq!(config.mode, ExportMode::Parallel { workers: 3 });
        assert_eq!(config.format, OutputFormat::Jsonl);
        assert_eq!(config.output, Some(PathBuf::from("out.csv")));
    }

    #[tokio::test]
    async fn test_missing_config_flag() {
        let runner = Runner::new(parse(&["solidafy-pagestream", "plan"]));
        let err = runner.run().await.unwrap_err();
        assert!(err.is_config());
    }
}
