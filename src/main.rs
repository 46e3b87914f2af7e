//! CLI entry point for `mailbunch`.

use std::cell::{Cell, OnceCell};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailbunch::config::{self, Config, RunSettings};
use mailbunch::error::BunchError;
use mailbunch::model::bucket::Bucket;
use mailbunch::pipeline::{self, Progress, RunSummary};

#[derive(Parser)]
#[command(
    name = "mailbunch",
    version,
    about = "Bunch scattered maildirs into one de-duplicated maildir",
    long_about = "Reads every message from the given inbox and archive maildirs, \
                  marks duplicates by Message-ID (optionally dropping them), and \
                  writes them into Inbox, Sent and Archive maildirs under fresh \
                  file names whose mtime is the message's own time."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output maildir root (its previous contents are removed)
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Inbox maildirs to bunch (repeatable or comma-separated)
    #[arg(long = "inbox", value_name = "DIR", value_delimiter = ',')]
    inboxes: Vec<PathBuf>,

    /// Archive maildirs to bunch (repeatable or comma-separated)
    #[arg(long = "archive", value_name = "DIR", value_delimiter = ',')]
    archives: Vec<PathBuf>,

    /// Addresses you send (or used to send) mail from; their messages go to Sent
    #[arg(long = "identity", value_name = "ADDR", value_delimiter = ',')]
    identities: Vec<String>,

    /// Domain used in generated file names and Message-IDs
    #[arg(long, value_name = "DOMAIN")]
    domain: Option<String>,

    /// Flags to remove from every message (e.g. "FRT")
    #[arg(long, value_name = "FLAGS")]
    remove_flags: Option<String>,

    /// Do not write duplicate messages
    #[arg(long)]
    no_dupes: bool,

    /// Where to write the tab-separated duplicates log
    #[arg(long, value_name = "FILE")]
    dupes_log: Option<PathBuf>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => cmd_bunch(&cli, &config),
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
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailbunch.log");
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

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailbunch", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}

/// Merge command-line values over the config file defaults.
fn settings_from(cli: &Cli, config: &Config) -> RunSettings {
    let mut settings = RunSettings::from_config(&config.bunch);

    settings.output = cli.output.clone().unwrap_or_default();
    settings.inboxes = non_empty_paths(&cli.inboxes);
    settings.archives = non_empty_paths(&cli.archives);
    if !cli.identities.is_empty() {
        settings.identities = cli.identities.clone();
    }
    if let Some(domain) = &cli.domain {
        settings.domain = domain.clone();
    }
    if let Some(flags) = &cli.remove_flags {
        settings.remove_flags = flags.clone();
    }
    settings.no_dupes |= cli.no_dupes;
    if let Some(path) = &cli.dupes_log {
        settings.dupes_log = path.clone();
    }
    settings
}

fn non_empty_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|p| !p.as_os_str().is_empty())
        .cloned()
        .collect()
}

/// Bunch the input maildirs into the output maildir.
fn cmd_bunch(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    let settings = settings_from(cli, config);
    if let Err(e) = settings.validate() {
        Cli::command()
            .error(clap::error::ErrorKind::MissingRequiredArgument, e)
            .exit();
    }

    if !cli.yes && !confirm(&settings)? {
        eprintln!("{}", BunchError::Cancelled);
        std::process::exit(2);
    }

    let progress = BarProgress::new();
    let start = Instant::now();
    let summary = pipeline::run(&settings, &progress)?;
    progress.finish();
    let elapsed = start.elapsed();

    if cli.json {
        print_summary_json(&summary, elapsed)?;
    } else {
        print_summary_table(&summary, elapsed);
    }
    Ok(())
}

/// Show the resolved settings and ask before the output is cleared.
fn confirm(settings: &RunSettings) -> anyhow::Result<bool> {
    println!();
    println!("  Using the following settings:");
    println!();
    println!("  {:<22} {}", "Output maildir", settings.output.display());
    println!("  {:<22} (will be cleared!)", "");
    println!("  {:<22} {}", "Inboxes", join_paths(&settings.inboxes));
    println!("  {:<22} {}", "Archives", join_paths(&settings.archives));
    println!("  {:<22} {}", "Identities", settings.identities.join(", "));
    println!("  {:<22} {}", "Flags to remove", settings.remove_flags);
    println!("  {:<22} {}", "Eliminate duplicates", settings.no_dupes);
    println!("  {:<22} {}", "Duplicates log", settings.dupes_log.display());
    println!();
    print!("  Is this OK? (y/n): ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Terminal progress: a spinner while reading, a bar per bucket while writing.
struct BarProgress {
    reading: ProgressBar,
    writing: OnceCell<ProgressBar>,
    current: Cell<Option<Bucket>>,
}

impl BarProgress {
    fn new() -> Self {
        let reading = ProgressBar::new_spinner();
        reading.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} Reading {pos} messages ({elapsed})")
                .expect("valid template"),
        );
        reading.enable_steady_tick(Duration::from_millis(120));
        Self {
            reading,
            writing: OnceCell::new(),
            current: Cell::new(None),
        }
    }

    fn finish(&self) {
        self.reading.finish_and_clear();
        if let Some(bar) = self.writing.get() {
            bar.finish_and_clear();
        }
    }
}

impl Progress for BarProgress {
    fn read(&self, total: u64) {
        self.reading.set_position(total);
    }

    fn write(&self, bucket: Bucket, done: usize, total: usize) {
        let bar = self.writing.get_or_init(|| {
            self.reading.finish_and_clear();
            let bar = ProgressBar::new(0);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} Writing {msg:<8} [{bar:40.cyan/blue}] {pos}/{len}")
                    .expect("valid template")
                    .progress_chars("#>-"),
            );
            bar
        });
        if self.current.get() != Some(bucket) {
            self.current.set(Some(bucket));
            bar.set_message(bucket.to_string());
            bar.set_length(total as u64);
            bar.set_position(0);
        }
        bar.set_position(done as u64);
    }
}

/// Print the run summary in a human-readable table.
fn print_summary_table(summary: &RunSummary, elapsed: Duration) {
    use humansize::{format_size, BINARY};

    let stats = &summary.stats;
    println!();
    println!("  {:<20} {}", "Total messages", stats.total);
    println!("  {:<20} {}", "Unique messages", stats.unique);
    println!("  {:<20} {}", "Duplicates", stats.duplicates);
    println!("  {:<20} {}", "No date", stats.no_timestamp);
    println!("  {:<20} {}", "No Message-ID", stats.no_id);
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);
    println!();
    println!(
        "  {:<10} {:>10} {:>10} {:>12}",
        "Bucket", "Messages", "Written", "Size"
    );
    println!("  {}", "-".repeat(45));
    for report in &summary.buckets {
        println!(
            "  {:<10} {:>10} {:>10} {:>12}",
            report.bucket.dir_name(),
            report.size,
            report.written,
            format_size(report.bytes, BINARY)
        );
    }
    println!();
}

/// Print the run summary as JSON.
fn print_summary_json(summary: &RunSummary, elapsed: Duration) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "stats": summary.stats,
        "buckets": summary.buckets,
        "elapsed_ms": elapsed.as_millis(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
