use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use abi::{Level, LogRecord, MachineConfig};
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use colored::*;
use simos_core::{CommandOutput, Console, run_suite};

/// Terminal front end for the simos register machine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON machine config; flags below override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of memory cells
    #[arg(long)]
    memory_cells: Option<usize>,

    /// Scheduler tick period in milliseconds
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Do not start the background scheduler; use the `tick` verb instead
    #[arg(long)]
    no_timer: bool,

    /// Run the commands in this file, one per line, then exit
    #[arg(short, long)]
    script: Option<PathBuf>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    let period = Duration::from_millis(config.tick_period_ms);
    let console = Arc::new(Mutex::new(Console::with_config(config)));

    if let Some(path) = &args.script {
        let script = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {:?}", path))?;
        let mut console = lock(&console)?;
        for line in script.lines() {
            println!("{} {}", prompt(&console).dimmed(), line);
            render(&console.run_command(line));
            print_log(console.drain_log());
        }
        return Ok(());
    }

    println!("{}", run_suite().blue());
    println!();

    let stop = Arc::new(AtomicBool::new(false));
    let timer = (!args.no_timer).then(|| spawn_timer(Arc::clone(&console), Arc::clone(&stop), period));

    let stdin = io::stdin();
    loop {
        print!("{} ", prompt(&*lock(&console)?).green().bold());
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line == "exit" || line == "quit" {
            break;
        }
        let mut console = lock(&console)?;
        render(&console.run_command(line));
        print_log(console.drain_log());
    }

    stop.store(true, Ordering::Relaxed);
    if let Some(timer) = timer {
        timer
            .join()
            .map_err(|_| anyhow!("scheduler thread panicked"))?;
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<MachineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let src = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            MachineConfig::from_json(&src)?
        }
        None => MachineConfig::default(),
    };
    if let Some(cells) = args.memory_cells {
        config.memory_cells = cells;
    }
    if let Some(ms) = args.tick_ms {
        config.tick_period_ms = ms;
    }
    config.validate()?;
    Ok(config)
}

/// Drives `Machine::tick` on a fixed period, like a hardware timer interrupt.
fn spawn_timer(
    console: Arc<Mutex<Console>>,
    stop: Arc<AtomicBool>,
    period: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            thread::sleep(period);
            let Ok(mut console) = console.lock() else {
                break;
            };
            if console.machine().processes().ready_count() == 0 {
                continue;
            }
            for line in console.tick() {
                println!("{}", line);
            }
            print_log(console.drain_log());
        }
    })
}

fn lock(console: &Mutex<Console>) -> Result<std::sync::MutexGuard<'_, Console>> {
    console.lock().map_err(|_| anyhow!("console lock poisoned"))
}

fn prompt(console: &Console) -> String {
    format!("simos:{}$", console.machine().fs().pwd())
}

fn render(output: &CommandOutput) {
    if output.clear {
        print!("\x1b[2J\x1b[H");
    }
    for line in &output.lines {
        if line.starts_with("Error:") || line.starts_with("fault:") {
            println!("{}", line.red());
        } else if line.starts_with("Unknown command:") {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }
}

fn print_log(records: Vec<LogRecord>) {
    for record in records {
        let text = record.to_string();
        let text = match record.level {
            Level::Info => text.dimmed(),
            Level::Warn => text.yellow(),
            Level::Error => text.red(),
        };
        eprintln!("{}", text);
    }
}
