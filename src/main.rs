//! Digiac Emulator - CLI Entry Point
//!
//! Commands:
//! - `digiac-emu [monitor]` - Interactive monitor
//! - `digiac-emu run <tape>` - Load a tape and run it
//! - `digiac-emu dump <tape>...` - List the words on tapes
//! - `digiac-emu disasm <tape>` - Disassemble a tape

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;

use digiac::monitor::command::parse_address;
use digiac::monitor::WriterSink;
use digiac::{asm, tape};
use digiac::{CancelToken, Command, Config, Endpoint, Monitor, Reply, Slot, StopReason};

#[derive(Parser)]
#[command(name = "digiac-emu")]
#[command(version)]
#[command(about = "An emulator of the Digiac-3080 paper-tape computer")]
struct Cli {
    /// Session configuration (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Diagnostics written to stderr: off, error, warn, info, debug, trace
    #[arg(long, default_value = "warn", global = true)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive monitor (the default)
    Monitor,
    /// Load a tape and run it until it stops
    Run {
        /// Tape image to load
        tape: PathBuf,
        /// Load and start address (octal)
        #[arg(short, long, default_value = "0", value_parser = parse_address)]
        start: usize,
        /// Instructions per second, 0 for no throttle
        #[arg(long)]
        ips: Option<u32>,
        /// Print each instruction as it executes
        #[arg(short, long)]
        trace: bool,
        /// Print the final status as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the words on tape images
    Dump {
        /// Tape images
        #[arg(required = true)]
        tapes: Vec<PathBuf>,
    },
    /// Disassemble a tape image
    Disasm {
        /// Tape image
        tape: PathBuf,
        /// Address of the first word (octal)
        #[arg(short, long, default_value = "0", value_parser = parse_address)]
        start: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let stderr_format = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(cli.log_level)
        .with(stderr_format)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    match cli.command.unwrap_or(Commands::Monitor) {
        Commands::Monitor => interactive(&config),
        Commands::Run { tape, start, ips, trace, json } => {
            let config = Config {
                ips: ips.unwrap_or(config.ips),
                trace: trace || config.trace,
                ..config
            };
            run_tape(&config, &tape, start, json)
        }
        Commands::Dump { tapes } => dump_tapes(&tapes),
        Commands::Disasm { tape, start } => disassemble_tape(&tape, start),
    }
}

/// A session from `config` with the console on the terminal.
fn open_session(config: &Config) -> Result<Monitor> {
    let mut monitor = Monitor::from_config(config).context("failed to set up session")?;
    if !monitor.devices().is_bound(Slot::Console) {
        monitor.devices_mut().attach(Slot::Console, Endpoint::Stdio)?;
    }
    monitor.set_trace_sink(Box::new(WriterSink::new(io::stdout())));
    watch_interrupts(monitor.cancel_token())?;
    Ok(monitor)
}

/// Cancel the running program on Ctrl-C.
fn watch_interrupts(token: CancelToken) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;

    std::thread::Builder::new()
        .name("interrupt".into())
        .spawn(move || {
            runtime.block_on(async move {
                loop {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        warn!(error = %e, "cannot listen for Ctrl-C");
                        break;
                    }
                    info!("interrupt requested");
                    token.cancel();
                }
            })
        })
        .context("failed to start interrupt thread")?;
    Ok(())
}

fn interactive(config: &Config) -> Result<()> {
    let mut monitor = open_session(config)?;
    let stdin = io::stdin();
    let mut line = String::new();

    println!("Digiac-3080 emulator {}", env!("CARGO_PKG_VERSION"));
    loop {
        print!("digiac> ");
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!();
            break;
        }

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                eprintln!("{}", e);
                continue;
            }
        };

        match monitor.execute(command) {
            Ok(Reply::None) => {}
            Ok(Reply::Text(text)) => println!("{}", text),
            Ok(Reply::Run(report)) => {
                let text = report.render(monitor.is_tracing());
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
            Ok(Reply::Quit) => break,
            Err(e) => eprintln!("{}", e),
        }
    }
    Ok(())
}

fn run_tape(config: &Config, path: &Path, start: usize, json: bool) -> Result<()> {
    let mut monitor = open_session(config)?;
    monitor.load_tape(path, start)?;
    let report = monitor.run(start)?;

    let text = report.render(monitor.is_tracing());
    if !text.is_empty() {
        println!("{}", text);
    }
    let status = monitor.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", status);
    }

    if let StopReason::Faulted(fault) = report.stop {
        return Err(anyhow::Error::new(fault).context(format!("{} faulted", path.display())));
    }
    Ok(())
}

fn dump_tapes(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path.display().to_string();
        print!("{}", tape::listing(&name, &bytes)?);
    }
    Ok(())
}

fn disassemble_tape(path: &Path, start: usize) -> Result<()> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let words = tape::load(&bytes)?;
    print!("{}", asm::disassemble(&words, (start & 0o7777) as u16));
    Ok(())
}
