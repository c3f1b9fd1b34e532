//! CLI entry point for `mailtriage`.

use std::path::{Path, PathBuf};

use chrono::Utc;
use clap::{Args, CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailtriage::config::{self, Config};
use mailtriage::error::TriageError;
use mailtriage::model::FolderListing;
use mailtriage::organize::report::{render_actions, render_table, RunOutput};
use mailtriage::organize::{self, executor, summarize, ActionPlan, ExecutionReport};
use mailtriage::transport::maildir::MaildirTransport;
use mailtriage::transport::{collect_snapshot, DelimiterCache, Transport};

#[derive(Parser)]
#[command(
    name = "mailtriage",
    version,
    about = "Sort a mailbox into spam and topic folders by content similarity"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to $MAILTRIAGE_CONFIG or the user config dir)
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Triage a mailbox and apply the resulting plan
    Organize {
        /// Maildir++ root
        maildir: PathBuf,
        /// Compute and log the plan without touching the mailbox
        #[arg(long)]
        dry_run: bool,
        /// Print the summary, plan and action results as JSON
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Compute the plan only; never modifies the mailbox
    Plan {
        maildir: PathBuf,
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Show the folder structure
    Folders {
        maildir: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

/// Command-line values that take precedence over the config file.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Folder to organize
    #[arg(long)]
    folder: Option<String>,
    /// Maximum number of most recent messages to consider
    #[arg(long)]
    limit: Option<usize>,
    /// Only messages from the last N days
    #[arg(long, value_name = "DAYS")]
    since_days: Option<u32>,
    /// Only messages on or after this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    since_date: Option<String>,
    /// Pairwise similarity at which messages are grouped
    #[arg(long, value_name = "SCORE")]
    similarity_threshold: Option<f64>,
    /// Smallest cluster acted upon
    #[arg(long, value_name = "N")]
    min_cluster_size: Option<usize>,
    /// Smallest cluster, as a fraction of eligible messages
    #[arg(long, value_name = "FRACTION")]
    min_cluster_fraction: Option<f64>,
}

impl Overrides {
    fn apply_to(&self, config: &mut Config) {
        if let Some(folder) = &self.folder {
            config.fetch.folder = folder.clone();
        }
        if let Some(limit) = self.limit {
            config.fetch.limit = limit;
        }
        if let Some(days) = self.since_days {
            config.fetch.since_days = Some(days);
        }
        if let Some(date) = &self.since_date {
            config.fetch.since_date = Some(date.clone());
        }
        if let Some(t) = self.similarity_threshold {
            config.clustering.similarity_threshold = t;
        }
        if let Some(n) = self.min_cluster_size {
            config.clustering.min_cluster_size = n;
        }
        if let Some(f) = self.min_cluster_fraction {
            config.clustering.min_cluster_fraction = f;
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    match &cli.command {
        Commands::Organize {
            dry_run, overrides, ..
        } => {
            overrides.apply_to(&mut config);
            config.general.dry_run |= *dry_run;
        }
        Commands::Plan { overrides, .. } => overrides.apply_to(&mut config),
        _ => {}
    }
    config.validate()?;

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Organize { maildir, json, .. } => cmd_organize(&maildir, &config, json),
        Commands::Plan { maildir, json, .. } => cmd_plan(&maildir, &config, json),
        Commands::Folders { maildir, json } => cmd_folders(&maildir, json),
        Commands::InitConfig { force } => cmd_init_config(force),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailtriage.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

fn open_maildir(path: &Path) -> anyhow::Result<MaildirTransport> {
    if !path.exists() {
        anyhow::bail!("Maildir not found: {}", path.display());
    }
    Ok(MaildirTransport::open(path)?)
}

/// Snapshot the mailbox and compute the plan.
fn build_plan(transport: &mut dyn Transport, config: &Config) -> anyhow::Result<ActionPlan> {
    let mut delimiters = DelimiterCache::new();
    let (messages, snapshot) = collect_snapshot(transport, &mut delimiters, config, Utc::now())?;
    Ok(organize::run(&messages, &snapshot, config))
}

/// Triage the mailbox and apply (or, under dry-run, log) the plan.
fn cmd_organize(path: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    let mut transport = open_maildir(path)?;
    let plan = build_plan(&mut transport, config)?;
    let dry_run = config.general.dry_run;

    let pb = ProgressBar::new(plan.actions.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Applying [{bar:40.cyan/blue}] {pos}/{len}")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    if json || dry_run {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let result = executor::apply_with_progress(&plan, &mut transport, dry_run, |_| pb.inc(1));
    pb.finish_and_clear();

    match result {
        Ok(report) => print_run(&plan, Some(&report), json),
        Err(TriageError::RunAborted { report, source }) => {
            print_run(&plan, Some(report.as_ref()), json)?;
            anyhow::bail!("Run aborted after a transport failure: {source}")
        }
        Err(e) => Err(e.into()),
    }
}

/// Compute and print the plan without applying it.
fn cmd_plan(path: &Path, config: &Config, json: bool) -> anyhow::Result<()> {
    let mut transport = open_maildir(path)?;
    let plan = build_plan(&mut transport, config)?;
    let report = executor::apply(&plan, &mut transport, true)?;
    print_run(&plan, Some(&report), json)
}

fn print_run(
    plan: &ActionPlan,
    execution: Option<&ExecutionReport>,
    json: bool,
) -> anyhow::Result<()> {
    let summary = summarize(plan, execution);
    if json {
        let output = RunOutput {
            summary,
            plan,
            execution,
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    print!("{}", render_table(&summary));
    for cluster in &plan.clusters {
        println!(
            "  {:<24} {:>6}  {}",
            if cluster.is_new_folder() { "new" } else { "reuse" },
            cluster.members.len(),
            cluster.target
        );
    }
    if let Some(report) = execution {
        println!();
        if report.dry_run {
            println!("  Dry run: {} action(s) planned", report.outcomes.len());
        } else {
            println!(
                "  {} applied, {} failed, {} skipped",
                report.applied(),
                report.failed(),
                report.skipped()
            );
        }
        print!("{}", render_actions(report));
    }
    println!();
    Ok(())
}

/// Print the folder tree with message counts.
fn cmd_folders(path: &Path, json: bool) -> anyhow::Result<()> {
    let mut transport = open_maildir(path)?;
    let listing = FolderListing {
        delimiter: transport.hierarchy_delimiter()?,
        folders: transport.list_folders()?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    println!();
    for folder in &listing.folders {
        let indent = "  ".repeat(listing.depth(&folder.name));
        let label = format!("{indent}{}", listing.leaf(&folder.name));
        println!("  {label:<40} {:>6}", folder.message_count);
    }
    println!();
    Ok(())
}

/// Write the built-in defaults to the config file.
fn cmd_init_config(force: bool) -> anyhow::Result<()> {
    if let Some(path) = config::config_file_path() {
        if path.exists() && !force {
            anyhow::bail!(
                "Config file already exists: {} (use --force to overwrite)",
                path.display()
            );
        }
    }
    let path = config::save_config(&Config::default())?;
    println!("  {:<20} {}", "Config written", path.display());
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailtriage", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
