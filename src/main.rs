//! Grapefruit CLI
//!
//! Discovers attached machines, sends free-form command batches, streams
//! G-code files and issues single motion commands over a serial link.

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use grapefruit::{endpoint, init_logging, link_config, stream_options, BUILD_DATE, VERSION};
use grapefruit_communication::{
    list_machines, stream_with, CancelToken, CncLink, SendOutcome, StreamEvent, StreamHandle,
    StreamSummary, StreamWorker,
};
use grapefruit_gcodeeditor::{list_gcode_files, GcodeFile, TextBuffer};
use grapefruit_settings::Config;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text
    Text,
    /// JSON format for scripting
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "grapefruit",
    version,
    about = "Serial G-code sender for hobby CNC machines",
    long_about = None
)]
struct Cli {
    /// Config file (TOML or JSON); defaults to the platform config directory
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging and per-line traffic
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Where to find the machine; falls back to the `[connection]` section
#[derive(Args, Debug)]
struct PortArgs {
    /// Serial port (e.g., /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List attached machines
    Machines {
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// List G-code files in a directory
    Files {
        /// Directory to list; defaults to files.start_directory
        dir: Option<PathBuf>,
    },

    /// Send a batch of commands, one per argument or one per stdin line
    Send {
        #[command(flatten)]
        target: PortArgs,

        /// Forward lines verbatim, comments included
        #[arg(long)]
        raw: bool,

        /// Commands to send; read from stdin when omitted
        commands: Vec<String>,
    },

    /// Stream a G-code file (.txt, .nc, .gc, .TAP); Ctrl-C stops between lines
    Stream {
        #[command(flatten)]
        target: PortArgs,

        /// Forward lines verbatim, comments included
        #[arg(long)]
        raw: bool,

        file: PathBuf,
    },

    /// Move to a position relative to the job datum
    Move {
        #[command(flatten)]
        target: PortArgs,

        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        x: f64,

        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        y: f64,

        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        z: f64,

        /// Extruder position
        #[arg(long, allow_negative_numbers = true, default_value_t = 0.0)]
        extrude: f64,

        /// Feed rate; defaults to motion.move_rate
        #[arg(long, conflicts_with = "rapid")]
        feed: Option<f64>,

        /// Rapid move, no feed word
        #[arg(long)]
        rapid: bool,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose)?;
    tracing::debug!("grapefruit {} built {}", VERSION, BUILD_DATE);

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    run(cli.command, &config_path, cli.config.is_some(), cli.verbose)
}

/// An explicitly named config file must exist; the default one may not
fn load_config(path: &Path, explicit: bool) -> anyhow::Result<Config> {
    let config = if explicit {
        Config::load_from_file(path)
    } else {
        Config::load_or_default(path)
    };
    config.with_context(|| format!("loading {}", path.display()))
}

fn run(
    command: Commands,
    config_path: &Path,
    explicit: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let load = || load_config(config_path, explicit);

    match command {
        Commands::Machines { format } => run_machines(format),
        Commands::Config { action } => run_config(action, config_path),
        Commands::Files { dir } => {
            let config = load()?;
            let dir = dir.unwrap_or_else(|| config.files.start_directory.clone());
            for file in list_gcode_files(&dir)? {
                println!("{}", file.display());
            }
            Ok(())
        }
        Commands::Send {
            target,
            raw,
            commands,
        } => run_send(&load()?, &target, commands, raw, verbose),
        Commands::Stream { target, raw, file } => {
            run_stream(&load()?, &target, &file, raw, verbose)
        }
        Commands::Move {
            target,
            x,
            y,
            z,
            extrude,
            feed,
            rapid,
        } => {
            let config = load()?;
            let mut link = connect(&config, &target)?;
            let outcome = if rapid {
                link.move_to_rapid(extrude, x, y, z)
            } else {
                let feed = feed.unwrap_or(config.motion.move_rate);
                link.move_to(extrude, feed, x, y, z)
            };
            link.terminate();
            report_status(&link);

            if let SendOutcome::Response(response) = outcome? {
                println!("{}", response);
            }
            Ok(())
        }
    }
}

fn run_machines(format: OutputFormat) -> anyhow::Result<()> {
    let machines = list_machines()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&machines)?);
        }
        OutputFormat::Text => {
            if machines.is_empty() {
                println!("No machines found.");
            }
            for machine in &machines {
                println!("{}", machine);
            }
        }
    }
    Ok(())
}

fn run_config(action: ConfigAction, path: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists; pass --force to overwrite", path.display());
            }
            Config::default().save_to_file(path)?;
            println!("Wrote {}", path.display());
        }
        ConfigAction::Show => {
            let config = Config::load_or_default(path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        ConfigAction::Path => println!("{}", path.display()),
    }
    Ok(())
}

fn connect(config: &Config, target: &PortArgs) -> anyhow::Result<CncLink> {
    let endpoint = endpoint(config, target.port.as_deref(), target.baud)?;
    let mut link = CncLink::new(endpoint, link_config(config));
    let result = link.connect();
    report_status(&link);
    result?;
    Ok(link)
}

fn run_send(
    config: &Config,
    target: &PortArgs,
    commands: Vec<String>,
    raw: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let batch = if commands.is_empty() {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("reading commands from stdin")?;
        TextBuffer::from(text.as_str())
    } else {
        TextBuffer::from(commands.join("\n").as_str())
    };
    let lines = batch.command_lines();

    let mut link = connect(config, target)?;
    let options = stream_options(config, verbose, raw);
    let result = stream_with(&mut link, &lines, &options, &CancelToken::new(), |event| {
        report_event(&event)
    });
    link.terminate();
    report_status(&link);

    print_summary(&result?);
    Ok(())
}

fn run_stream(
    config: &Config,
    target: &PortArgs,
    path: &Path,
    raw: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let file = GcodeFile::open(path)?;
    let lines = file.lines();
    tracing::info!("Loaded {} line(s) from {}", lines.len(), path.display());

    let link = connect(config, target)?;
    let handle = StreamWorker::spawn(link, lines, stream_options(config, verbose, raw))?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let (mut link, result) = runtime.block_on(watch(handle));
    link.terminate();
    report_status(&link);

    let summary = result?;
    print_summary(&summary);
    if summary.cancelled {
        bail!("streaming cancelled");
    }
    Ok(())
}

/// Print worker events until it finishes; the first Ctrl-C cancels it
async fn watch(mut handle: StreamHandle) -> (CncLink, grapefruit_core::Result<StreamSummary>) {
    let cancel = handle.cancel_token();
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(event) => report_event(&event),
                None => break,
            },
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        eprintln!("Interrupted, stopping after the current line");
                        cancel.cancel();
                    }
                    Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
                }
            }
        }
    }

    handle.join()
}

fn report_event(event: &StreamEvent) {
    match event {
        StreamEvent::Started { total } => tracing::debug!("Batch of {} line(s)", total),
        StreamEvent::Sent {
            index,
            command,
            response,
        } => println!("{:>5}  {:<32} {}", index + 1, command, response),
        StreamEvent::Skipped { index } => tracing::debug!("Line {} skipped", index + 1),
        StreamEvent::Failed {
            index,
            command,
            error,
        } => eprintln!("{:>5}  {:<32} FAILED: {}", index + 1, command, error),
        StreamEvent::Cancelled { index } => eprintln!("Cancelled before line {}", index + 1),
        StreamEvent::Finished(_) => {}
    }
}

fn report_status(link: &CncLink) {
    eprintln!("[{}] {}", link.state(), link.endpoint());
}

fn print_summary(summary: &StreamSummary) {
    println!(
        "{} sent, {} skipped, {} failed",
        summary.transmitted, summary.skipped, summary.failed
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_move_with_negative_coordinates() {
        let cli = Cli::try_parse_from([
            "grapefruit", "move", "--port", "COM3", "--x", "-2.5", "--z", "1", "--rapid",
        ])
        .unwrap();

        match cli.command {
            Commands::Move {
                target, x, z, rapid, feed, ..
            } => {
                assert_eq!(target.port.as_deref(), Some("COM3"));
                assert_eq!(x, -2.5);
                assert_eq!(z, 1.0);
                assert!(rapid);
                assert!(feed.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_move_help_names_job_datum() {
        let cli = Cli::command();
        let about = cli
            .find_subcommand("move")
            .and_then(|cmd| cmd.get_about())
            .map(|about| about.to_string())
            .unwrap_or_default();
        assert_eq!(about, "Move to a position relative to the job datum");
    }

    #[test]
    fn test_feed_conflicts_with_rapid() {
        let parsed = Cli::try_parse_from(["grapefruit", "move", "--feed", "50", "--rapid"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_parse_send_with_global_flags() {
        let cli = Cli::try_parse_from([
            "grapefruit", "send", "-p", "/dev/ttyUSB0", "--raw", "G28", "(home)", "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Send { raw, commands, .. } => {
                assert!(raw);
                assert_eq!(commands, vec!["G28", "(home)"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
