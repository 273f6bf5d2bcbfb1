use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use kpi_core::config::CONFIG_FILE;
use kpi_core::{logging, Collector, Config, Period, ReportData};
use kpi_report::{html, json, markdown, text};

#[derive(Parser)]
#[command(name = "kpi")]
#[command(about = "Release KPI reports from git tags, with a narrative executive summary")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect release metrics and print or write a report
    Report {
        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
        /// Reporting period: all, YYYY, YYYY-MM or YYYY-QN
        #[arg(long, default_value = "all")]
        period: String,
        /// Output directory for HTML reports (overrides report_output)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Single-line JSON output
        #[arg(long)]
        compact: bool,
        /// Skip fetching tags from remotes
        #[arg(long)]
        no_fetch: bool,
        /// Config file path (defaults to kpi.local.toml, then kpi.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Create a default kpi.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
    /// Load and validate the configuration
    Validate {
        /// Config file path
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Markdown,
    Json,
    Html,
}

/// Returned when no configured project yielded any releases.
#[derive(Debug)]
struct NoProjects;

impl std::fmt::Display for NoProjects {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("no analyzable projects found (check projects_directory and tags)")
    }
}

impl std::error::Error for NoProjects {}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let result = match cli.command {
        Commands::Report {
            format,
            period,
            output,
            compact,
            no_fetch,
            config,
        } => cmd_report(
            format,
            &period,
            output.as_deref(),
            compact,
            !no_fetch,
            config.as_deref(),
        ),
        Commands::Init { force } => cmd_init(force),
        Commands::Validate { config } => cmd_validate(config.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        let code = if e.is::<NoProjects>() { 1 } else { 2 };
        process::exit(code);
    }
}

fn cmd_report(
    format: Format,
    period: &str,
    output: Option<&Path>,
    compact: bool,
    fetch: bool,
    config_path: Option<&Path>,
) -> Result<()> {
    let config = load_config(config_path)?;
    let period = Period::parse_lenient(period);

    let records = Collector::git(&config, period, fetch).collect(&config);
    if records.is_empty() {
        return Err(NoProjects.into());
    }

    let data = ReportData::prepare(records, period, &config, Local::now().naive_local());

    match format {
        Format::Text => print!("{}", text::format_report(&data)),
        Format::Markdown => print!("{}", markdown::format_report(&data)),
        Format::Json => println!("{}", json::format_report(&data, compact)),
        Format::Html => {
            let dir = output.unwrap_or(config.project.report_output.as_path());
            let path = html::write_report(&data, dir)?;
            println!("Report written to {}", path.display());
        }
    }
    Ok(())
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from(CONFIG_FILE);
    if target.exists() && !force {
        anyhow::bail!("{CONFIG_FILE} already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml())
        .with_context(|| format!("failed to write {CONFIG_FILE}"))?;
    println!("Created {CONFIG_FILE} with default configuration.");
    Ok(())
}

fn cmd_validate(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    let project = &config.project;

    println!("{}", "Configuration is valid".green().bold());
    println!("  Projects directory: {}", project.projects_directory.display());
    println!("  Projects:           {}", project.included_projects.join(", "));
    println!("  Categories:         {}", config.categories.priority.join(", "));
    println!("  Tags:               {}", config.tags.descriptions.len());
    println!("  Layers:             {}", config.layers.len());
    println!("  File exclusions:    {}", project.file_exclusions.len());
    println!("  Report output:      {}", project.report_output.display());
    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    let path = Config::resolve_path(&cwd, config_path);
    Config::load(&path)
}
