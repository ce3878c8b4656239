//! CLI command definitions and dispatch.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use cadbridge_convert::batch::{BatchDisposition, BatchDriver};
use cadbridge_convert::config::ConverterConfig;
use cadbridge_convert::formats::{FORMAT_TABLE, HandlerClass, NativeKind, ToolKind};
use cadbridge_convert::processor::ConversionPipeline;

use crate::output::OutputFormat;

/// CadBridge — CAD file conversion pipeline
#[derive(Debug, Parser)]
#[command(name = "cadbridge", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert files sequentially and report per-file outcomes
    Ingest(IngestArgs),
    /// Show which conversion backends are available
    Probe,
    /// List supported formats grouped by route
    Formats,
}

/// Arguments for `ingest`
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Input files, processed in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Execute the selected command.
    pub async fn execute(self) -> anyhow::Result<()> {
        let config = ConverterConfig::load(&self.config).context("loading configuration")?;
        let pipeline = ConversionPipeline::new(config).context("building pipeline")?;

        match &self.command {
            Commands::Ingest(args) => self.run_ingest(&pipeline, args).await,
            Commands::Probe => self.run_probe(&pipeline),
            Commands::Formats => self.run_formats(),
        }
    }

    async fn run_ingest(
        &self,
        pipeline: &ConversionPipeline,
        args: &IngestArgs,
    ) -> anyhow::Result<()> {
        // Conversion-only: promotion needs a host geometry kernel
        let summary = BatchDriver::run(pipeline, None, &args.files).await;

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
            OutputFormat::Text => {
                for file in &summary.files {
                    let tag = match file.disposition {
                        BatchDisposition::Imported => "ok      ",
                        BatchDisposition::Promoted => "solid   ",
                        BatchDisposition::Degraded => "shell   ",
                        BatchDisposition::ManualRequired => "manual  ",
                        BatchDisposition::Failed => "failed  ",
                    };
                    println!("{tag} {}  {}", file.path.display(), file.detail);
                }
                println!(
                    "\n{} file(s): {} succeeded, {} manual, {} failed",
                    summary.total(),
                    summary.successes(),
                    summary.manual,
                    summary.failed
                );
            }
        }

        if summary.failed > 0 {
            anyhow::bail!("{} file(s) failed", summary.failed);
        }
        Ok(())
    }

    fn run_probe(&self, pipeline: &ConversionPipeline) -> anyhow::Result<()> {
        let reports = pipeline.backend_report();

        match self.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
            OutputFormat::Text => {
                for report in &reports {
                    let status = if report.availability.available {
                        match &report.availability.resolved_executable_path {
                            Some(path) => format!("found at {}", path.display()),
                            None => "found".to_string(),
                        }
                    } else {
                        "not found".to_string()
                    };
                    println!("{:<14} {status}", report.kind.to_string());
                    println!("               formats: {}", report.formats.join(", "));
                }
            }
        }
        Ok(())
    }

    fn run_formats(&self) -> anyhow::Result<()> {
        let groups = [
            (
                "native (direct import)",
                HandlerClass::Native(NativeKind::Boundary),
            ),
            (
                "native mesh (import + promotion)",
                HandlerClass::Native(NativeKind::Mesh),
            ),
            (
                "via 3-D content tool",
                HandlerClass::External(ToolKind::ContentTool),
            ),
            (
                "via drawing tool",
                HandlerClass::External(ToolKind::DrawingTool),
            ),
            ("manual / remote only", HandlerClass::RemoteManual),
        ];

        match self.format {
            OutputFormat::Json => {
                let map: serde_json::Map<String, serde_json::Value> = groups
                    .iter()
                    .map(|(label, class)| {
                        let exts: Vec<&str> = FORMAT_TABLE
                            .iter()
                            .filter(|(_, c)| c == class)
                            .map(|(ext, _)| *ext)
                            .collect();
                        ((*label).to_string(), serde_json::json!(exts))
                    })
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
            }
            OutputFormat::Text => {
                for (label, class) in &groups {
                    let exts: Vec<&str> = FORMAT_TABLE
                        .iter()
                        .filter(|(_, c)| c == class)
                        .map(|(ext, _)| *ext)
                        .collect();
                    println!("{label}:");
                    println!("  {}", exts.join(", "));
                }
            }
        }
        Ok(())
    }
}
