//! schemashift CLI
//!
//! Plans and applies the schema migration from an RU-based document
//! database to a vCore-based one.
//! Pedantic lints relaxed for CLI ergonomics.

// CLI tool - relax pedantic lints for ergonomics
#![allow(clippy::pedantic)]

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use schemashift::config::{LogFormat, LoggingSettings, DEFAULT_SETTINGS_FILE};
use schemashift::connectors::recording::RecordingExecutor;
use schemashift::connectors::{create_catalog, create_executor, script::ScriptConfig};
use schemashift::{
    load_sections, render, Pipeline, ReportFormat, SourceConfig, TargetConfig, ToolSettings,
};
use schemashift_core::{Orchestrator, TransformationPlan};

#[derive(Parser)]
#[command(name = "schemashift")]
#[command(version)]
#[command(about = "Plan the schema migration from RU-based to vCore collections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Tool settings file path
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SETTINGS_FILE, global = true)]
    settings: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the plan and print it
    Plan {
        /// Sections file (JSON or YAML)
        #[arg(short, long, value_name = "FILE")]
        sections: PathBuf,

        /// Source metadata snapshot (JSON)
        #[arg(long, value_name = "FILE")]
        source: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Build the plan and apply it to a target
    Apply {
        /// Sections file (JSON or YAML)
        #[arg(short, long, value_name = "FILE")]
        sections: PathBuf,

        /// Source metadata snapshot (JSON)
        #[arg(long, value_name = "FILE")]
        source: PathBuf,

        /// Write a mongosh script to this path
        #[arg(long, value_name = "FILE", required_unless_present = "dry_run", conflicts_with = "dry_run")]
        script: Option<PathBuf>,

        /// Print the operations without writing anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate a sections file
    Validate {
        /// Sections file (JSON or YAML)
        #[arg(short, long, value_name = "FILE")]
        sections: PathBuf,
    },

    /// Generate example configuration
    Init {
        /// Sections file to create
        #[arg(short, long, default_value = "sections.yaml")]
        output: PathBuf,

        /// Also write a settings file next to it
        #[arg(long)]
        with_settings: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = ToolSettings::load_from_path(&cli.settings)?;
    init_logging(&settings.logging, cli.verbose)?;

    match cli.command {
        Commands::Plan {
            sections,
            source,
            format,
            output,
        } => {
            let plan = build_plan(&sections, &source, &settings).await?;
            let report = render(&plan, format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, report)?;
                    println!("✅ Plan written to {:?}", path);
                }
                None => print!("{report}"),
            }
        }
        Commands::Apply {
            sections,
            source,
            script,
            dry_run,
        } => {
            apply_plan(&sections, &source, script, dry_run, &settings).await?;
        }
        Commands::Validate { sections } => {
            validate_sections(&sections)?;
        }
        Commands::Init {
            output,
            with_settings,
        } => {
            generate_config(&output, with_settings)?;
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingSettings, verbose: bool) -> anyhow::Result<()> {
    let directive = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}

fn pipeline(sections: &Path, source: &Path, settings: &ToolSettings) -> anyhow::Result<Pipeline> {
    info!("Loading sections from {:?}", sections);
    let document = load_sections(sections)?;
    let orchestrator = Orchestrator::from_document(&document)?
        .with_low_cardinality_threshold(settings.low_cardinality_threshold);
    let catalog = create_catalog(&SourceConfig::snapshot(source));
    Ok(Pipeline::new(orchestrator, catalog, settings))
}

async fn build_plan(
    sections: &Path,
    source: &Path,
    settings: &ToolSettings,
) -> anyhow::Result<TransformationPlan> {
    let mut pipeline = pipeline(sections, source, settings)?;
    Ok(pipeline.plan().await?)
}

async fn apply_plan(
    sections: &Path,
    source: &Path,
    script: Option<PathBuf>,
    dry_run: bool,
    settings: &ToolSettings,
) -> anyhow::Result<()> {
    let mut pipeline = pipeline(sections, source, settings)?.with_progress(!dry_run);
    let plan = pipeline.plan().await?;
    print!("{}", render(&plan, ReportFormat::Text)?);

    let stats = match script {
        Some(path) if !dry_run => {
            let mut executor = create_executor(&TargetConfig::Script(ScriptConfig { path: path.clone() }));
            let stats = pipeline.apply(&plan, executor.as_mut()).await?;
            println!("\n✅ Script written to {:?}", path);
            println!("   Run it with: mongosh <connection-string> {}", path.display());
            stats
        }
        _ => {
            let mut executor = RecordingExecutor::new();
            let log = executor.log();
            let stats = pipeline.apply(&plan, &mut executor).await?;
            println!("\n🔍 Dry run, operations in execution order:");
            for operation in log.operations() {
                println!("   {operation}");
            }
            stats
        }
    };

    println!("\n✅ Apply Complete!");
    println!("   Collections: {}", stats.collections);
    println!("   Operations:  {}", stats.operations);
    println!("   Retries:     {}", stats.retries);
    println!("   Duration:    {:.2}s", stats.duration_secs);

    Ok(())
}

fn validate_sections(sections: &Path) -> anyhow::Result<()> {
    info!("Validating sections from {:?}", sections);

    let document = load_sections(sections)?;
    let orchestrator = Orchestrator::from_document(&document)?;

    println!("✅ Sections are valid!");
    println!("   Sections:  {}", orchestrator.rules().len());
    println!("   Databases: {}", orchestrator.rules().database_filter());

    Ok(())
}

fn generate_config(output: &Path, with_settings: bool) -> anyhow::Result<()> {
    std::fs::write(output, SECTIONS_TEMPLATE)?;
    println!("✅ Generated sections: {:?}", output);

    if with_settings {
        let settings_path = output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(DEFAULT_SETTINGS_FILE);
        std::fs::write(&settings_path, SETTINGS_TEMPLATE)?;
        println!("✅ Generated settings: {:?}", settings_path);
    }

    println!(
        "   Edit the file and run: schemashift plan --sections {:?} --source snapshot.json",
        output
    );

    Ok(())
}

const SECTIONS_TEMPLATE: &str = r#"# schemashift sections
# Sections are evaluated in order; the last section that includes a
# collection decides its options.
sections:
  # Every collection, compound index prefixes removed
  - include: ["*"]
    exclude: ["admin.*", "local.*"]
    optimize_compound_indexes: true

  # Keep the shard key of the orders collection and place it with customers
  - include: ["shop.orders"]
    migrate_shard_key: true
    optimize_compound_indexes: true
    co_locate_with: customers
    # drop_if_exists: true  # Drop the target collection first
"#;

const SETTINGS_TEMPLATE: &str = r#"# schemashift settings
# Every key can be overridden with SCHEMASHIFT_<KEY>, nested keys joined
# with "__" (e.g. SCHEMASHIFT_RETRY__MAX_RETRIES=5).

# Concurrent metadata fetches during discovery
workers = 4

# Retained shard keys with fewer distinct values are flagged
low_cardinality_threshold = 1000

[logging]
level = "info"
format = "text"  # or "json"

[retry]
max_retries = 3
initial_delay_ms = 500
max_delay_ms = 30000
"#;
