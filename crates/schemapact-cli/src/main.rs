use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use schemapact_cache::{FileCache, SchemaCache};
use schemapact_core::config::CONFIG_FILE_NAME;
use schemapact_core::{
    Config, DocumentRole, FailOn, Issue, IssueSeverity, Report, SchemaCollection, SchemaDocument,
};
use schemapact_dbt::DbtSchemaSource;
use schemapact_engine::validate;
use schemapact_models::ModelExtractor;

/// SchemaPact - Data contract validation between dbt models and API models
#[derive(Parser)]
#[command(name = "schemapact")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: schemapact.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the dbt project provides every table and column the API models need
    Validate(ValidateArgs),

    /// Extract one side of the contract into a schema document
    Extract {
        /// Which side to extract
        #[arg(value_enum)]
        side: Side,

        /// Output document (.json, .yml or .yaml)
        #[arg(short, long)]
        output: PathBuf,

        /// Skip the manifest and compiler, infer from SQL only
        #[arg(long)]
        fast: bool,

        /// Do not read or write the extraction cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args)]
struct ValidateArgs {
    /// Read source schemas from a document instead of the dbt project
    #[arg(long)]
    source_doc: Option<PathBuf>,

    /// Read target schemas from a document instead of the API models
    #[arg(long)]
    target_doc: Option<PathBuf>,

    /// Skip the manifest and compiler, infer from SQL only
    #[arg(long)]
    fast: bool,

    /// How to print results
    #[arg(long, value_enum, default_value_t = OutputFormat::Terminal)]
    output_format: OutputFormat,

    /// Output file for report.json
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also output markdown report
    #[arg(short, long)]
    markdown: Option<PathBuf>,

    /// Lowest severity that fails the run (overrides config)
    #[arg(long, value_enum)]
    fail_on: Option<FailLevel>,

    /// Only validate when one of these files is relevant
    #[arg(long, num_args = 1..)]
    changed_files: Vec<String>,

    /// Do not read or write the extraction cache
    #[arg(long)]
    no_cache: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Terminal,
    Github,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Side {
    Source,
    Target,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum FailLevel {
    Critical,
    Warning,
}

impl From<FailLevel> for FailOn {
    fn from(level: FailLevel) -> Self {
        match level {
            FailLevel::Critical => FailOn::Critical,
            FailLevel::Warning => FailOn::Warning,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Commands::Init { force } = cli.command {
        return init_command(cli.config.as_deref(), force);
    }

    let config = load_config(cli.config.as_deref())?;
    let config_file = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));

    match cli.command {
        Commands::Validate(args) => validate_command(&config, &config_file, &args),
        Commands::Extract { side, output, fast, no_cache } => {
            extract_command(&config, side, &output, fast, no_cache)
        }
        Commands::Init { .. } => Ok(()),
    }
}

/// Log to stderr so stdout stays machine-readable
fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        return Config::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let default_path = Path::new(CONFIG_FILE_NAME);
    if default_path.exists() {
        Config::from_file(default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()))
    } else {
        tracing::info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Validate command - diff source schemas against API model requirements
fn validate_command(config: &Config, config_file: &Path, args: &ValidateArgs) -> Result<()> {
    let started = Instant::now();

    if !args.changed_files.is_empty() && !has_relevant_changes(&args.changed_files, config_file) {
        tracing::info!(changed = args.changed_files.len(), "no schema files changed");
        let report = Report::skipped("No schema files changed, skipping validation")
            .with_duration(started.elapsed());
        return emit_report(&report, args);
    }

    let (source, strategy) = source_schemas(config, args.source_doc.as_deref(), args.fast, args.no_cache)?;
    let target = target_schemas(config, args.target_doc.as_deref())?;

    let result = validate(source, target);

    let fail_on = args.fail_on.map(FailOn::from).unwrap_or(config.validation.fail_on);
    let report = Report::from_result(&result)
        .with_duration(started.elapsed())
        .with_metadata(serde_json::json!({
            "source_strategy": strategy,
            "project_path": config.project_path().display().to_string(),
            "model_source": args
                .target_doc
                .clone()
                .unwrap_or_else(|| config.model_source())
                .display()
                .to_string(),
            "fail_on": format!("{:?}", fail_on).to_lowercase(),
        }));

    emit_report(&report, args)?;

    // Exit with error code if the threshold is met
    if result.has_issues_at_least(fail_on.threshold()) {
        std::process::exit(1);
    }

    Ok(())
}

/// Print, save and render a report the way the arguments ask
fn emit_report(report: &Report, args: &ValidateArgs) -> Result<()> {
    if let Some(output) = &args.output {
        report
            .save_to_file(output)
            .with_context(|| format!("Failed to write report to {}", output.display()))?;
        tracing::info!(path = %output.display(), "report saved");
    }

    if let Some(md_path) = &args.markdown {
        std::fs::write(md_path, report.to_markdown())
            .with_context(|| format!("Failed to write markdown report to {}", md_path.display()))?;
        tracing::info!(path = %md_path.display(), "markdown report saved");
    }

    match args.output_format {
        OutputFormat::Terminal => print_report_summary(report),
        OutputFormat::Github => print_github_annotations(report),
        OutputFormat::Json => println!("{}", report.to_json()?),
    }

    Ok(())
}

/// Source schemas plus a label for how they were obtained
fn source_schemas(
    config: &Config,
    document: Option<&Path>,
    fast: bool,
    no_cache: bool,
) -> Result<(SchemaCollection, String)> {
    if let Some(path) = document {
        let document = SchemaDocument::from_file(path)
            .with_context(|| format!("Failed to read source document {}", path.display()))?;
        return Ok((document.into_collection(DocumentRole::Source), "document".to_string()));
    }

    let mut source_config = config.source.clone();
    source_config.fast_mode |= fast;

    let mut source = DbtSchemaSource::new(config.project_path(), source_config);
    if config.cache.enabled && !no_cache {
        let cache: Arc<dyn SchemaCache> = Arc::new(FileCache::new(config.cache_dir(), config.cache.ttl()));
        source = source.with_cache(cache);
    }

    let extraction = source.extract_with_strategy();
    tracing::info!(
        strategy = %extraction.strategy,
        tables = extraction.schemas.len(),
        "extracted source schemas"
    );

    Ok((extraction.schemas, extraction.strategy.to_string()))
}

fn target_schemas(config: &Config, document: Option<&Path>) -> Result<SchemaCollection> {
    if let Some(path) = document {
        let document = SchemaDocument::from_file(path)
            .with_context(|| format!("Failed to read target document {}", path.display()))?;
        return Ok(document.into_collection(DocumentRole::Target));
    }

    let model_source = config.model_source();
    let schemas = ModelExtractor::try_extract_from_path(&model_source)
        .with_context(|| format!("Failed to load API models from {}", model_source.display()))?;
    tracing::info!(tables = schemas.len(), "extracted API model schemas");

    Ok(schemas)
}

/// Extract command - write one side of the contract as a document
fn extract_command(config: &Config, side: Side, output: &Path, fast: bool, no_cache: bool) -> Result<()> {
    let schemas = match side {
        Side::Source => source_schemas(config, None, fast, no_cache)?.0,
        Side::Target => target_schemas(config, None)?,
    };

    SchemaDocument::from_collection(&schemas)
        .save_to_file(output)
        .with_context(|| format!("Failed to write schema document {}", output.display()))?;

    println!(
        "{} {} tables ({} columns) to {}",
        "Wrote".green(),
        schemas.len(),
        schemas.column_count(),
        output.display()
    );

    Ok(())
}

/// Init command - write the default config
fn init_command(path: Option<&Path>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| Path::new(CONFIG_FILE_NAME));

    if path.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
    }

    Config::default()
        .save_to_file(path)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!("{} {}", "Created".green(), path.display());
    Ok(())
}

const RELEVANT_PATTERNS: &[&str] = &["models/", "app/models", "models.py"];
const RELEVANT_EXTENSIONS: &[&str] = &[".sql", ".py", ".yml", ".yaml", ".json", ".toml"];

/// Whether any changed path can affect either side of the contract
fn has_relevant_changes(changed_files: &[String], config_file: &Path) -> bool {
    let config_name = config_file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(CONFIG_FILE_NAME);

    changed_files.iter().any(|file| {
        let matches_pattern = RELEVANT_PATTERNS.iter().any(|p| file.contains(p))
            || file.ends_with(config_name);
        matches_pattern && RELEVANT_EXTENSIONS.iter().any(|ext| file.ends_with(ext))
    })
}

/// Print report summary to stdout
fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Data Contract Validation Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!("Duration: {}ms", report.duration_ms);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Source tables: {}", report.summary.source_tables);
    println!("  Target tables: {}", report.summary.target_tables);

    if report.summary.critical > 0 {
        println!("  Critical: {}", format!("{}", report.summary.critical).red().bold());
    } else {
        println!("  Critical: {}", format!("{}", report.summary.critical).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.issues.is_empty() {
        println!("{}", format!("✓ {}", report.summary_line).green().bold());
    } else {
        println!("{}", "Issues:".bold());
        for issue in &report.issues {
            let severity_str = match issue.severity {
                IssueSeverity::Critical => "CRITICAL".red().bold(),
                IssueSeverity::Warning => "WARNING".yellow().bold(),
                IssueSeverity::Info => "INFO".cyan(),
            };

            println!("  [{}] {}: {}", severity_str, issue.category, issue.qualified_name());
            println!("    {}", issue.message);

            if let Some(file) = &issue.file_path {
                println!("    at {}", file);
            }
            if let Some(expected) = &issue.target_expectation {
                println!("    API expects:      {}", expected);
            }
            if let Some(actual) = &issue.source_actual {
                println!("    Source provides:  {}", actual);
            }
            if let Some(fix) = &issue.suggested_fix {
                println!("    Fix: {}", fix.cyan());
            }
        }

        println!();
        if report.success {
            println!("{}", report.summary_line.yellow().bold());
        } else {
            println!("{}", report.summary_line.red().bold());
        }
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}

/// Print GitHub Actions workflow annotations
fn print_github_annotations(report: &Report) {
    for issue in &report.issues {
        println!("{}", github_annotation(issue));
    }

    if report.success {
        println!(
            "::notice::Contract validation passed in {}ms - {}",
            report.duration_ms,
            escape_data(&report.summary_line)
        );
    } else {
        println!("::error::Contract validation failed - {}", escape_data(&report.summary_line));
    }
}

/// One `::error`/`::warning`/`::notice` line for an issue
fn github_annotation(issue: &Issue) -> String {
    let level = match issue.severity {
        IssueSeverity::Critical => "error",
        IssueSeverity::Warning => "warning",
        IssueSeverity::Info => "notice",
    };

    let mut properties = Vec::new();
    if let Some(file) = &issue.file_path {
        properties.push(format!("file={}", escape_property(file)));
    }
    properties.push(format!("title={}", escape_property(&issue.category)));

    let mut message = format!("{}: {}", issue.qualified_name(), issue.message);
    if let Some(fix) = &issue.suggested_fix {
        message.push_str(&format!("\n{}", fix));
    }

    format!("::{} {}::{}", level, properties.join(","), escape_data(&message))
}

fn escape_data(value: &str) -> String {
    value
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn escape_property(value: &str) -> String {
    escape_data(value).replace(':', "%3A").replace(',', "%2C")
}
