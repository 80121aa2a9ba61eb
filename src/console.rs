use abi::{
    BoundsFault, LogRecord, Machine, MachineConfig, MachineSnapshot, Pid, ProcessError, RunOutcome,
    TickReport,
};
use compiler::ParseError;
use serde::Serialize;
use thiserror::Error;
use vfs::VfsError;

pub const HELP: &str =
    "Supported: mkdir, cd, ls, write, read, rm, pwd, clear, spawn, ps, kill, tick, run, regs, mem, reset, help";

/// Upper bound for `tick <n>`; hosts hold the console lock for the whole run.
pub const MAX_TICKS_PER_COMMAND: u64 = 10_000;

#[derive(Debug, Error)]
enum CommandError {
    #[error(transparent)]
    Fs(#[from] VfsError),
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Bounds(#[from] BoundsFault),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("tick count {0} exceeds the limit of {}", MAX_TICKS_PER_COMMAND)]
    TooManyTicks(u64),
}

/// What a terminal should render for one command line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub lines: Vec<String>,
    /// Set by `clear`: the host wipes its scrollback before printing `lines`.
    pub clear: bool,
}

impl CommandOutput {
    fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            clear: false,
        }
    }
}

/// Line-oriented front door to a `Machine`: `"<verb> <args...>"` in, text out.
pub struct Console {
    machine: Machine,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self {
            machine: Machine::with_config(config),
        }
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        self.machine.snapshot()
    }

    pub fn drain_log(&mut self) -> Vec<LogRecord> {
        self.machine.drain_log()
    }

    /// One scheduler sweep, as driven by the host timer. Returns whatever the
    /// processes printed during it.
    pub fn tick(&mut self) -> Vec<String> {
        self.machine.tick();
        self.machine.take_output()
    }

    /// Never fails: errors and unknown verbs come back as output lines.
    pub fn run_command(&mut self, line: &str) -> CommandOutput {
        let line = line.trim();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        if verb.is_empty() {
            return CommandOutput::default();
        }
        if verb == "clear" {
            return CommandOutput {
                lines: Vec::new(),
                clear: true,
            };
        }

        let mut lines = match self.execute(verb, rest) {
            Ok(lines) => lines,
            Err(e) => vec![format!("Error: {}", e)],
        };
        // Output produced by background ticks since the last command.
        let mut pending = self.machine.take_output();
        pending.append(&mut lines);
        CommandOutput::lines(pending)
    }

    fn execute(&mut self, verb: &str, rest: &str) -> Result<Vec<String>, CommandError> {
        let lines = match verb {
            "help" => vec![HELP.to_string()],
            "mkdir" => {
                self.machine.fs_mut().mkdir(rest)?;
                Vec::new()
            }
            "cd" => {
                self.machine.fs_mut().cd(rest)?;
                Vec::new()
            }
            "rm" => {
                self.machine.fs_mut().rm(rest)?;
                Vec::new()
            }
            "read" => {
                let content = self.machine.fs().read(rest)?;
                vec![format!("{}: {}", rest, content)]
            }
            "write" => {
                let (name, content) = match rest.split_once(char::is_whitespace) {
                    Some((name, content)) => (name, content.trim_start()),
                    None if !rest.is_empty() => (rest, ""),
                    None => return Err(CommandError::Usage("write <name> <content...>")),
                };
                let content = compiler::unquote(content).unwrap_or(content);
                self.machine.fs_mut().write(name, content)?;
                Vec::new()
            }
            "ls" => {
                let fs = self.machine.fs();
                let mut lines = vec![fs.pwd()];
                lines.extend(fs.ls()?.iter().map(|e| e.to_string()));
                lines
            }
            "pwd" => vec![self.machine.fs().pwd()],
            "spawn" => {
                let program = compiler::parse_program(rest)?;
                let pid = self.machine.spawn(program);
                vec![format!("spawned pid {}", pid)]
            }
            "ps" => {
                let listing = self.machine.ps();
                if listing.is_empty() {
                    vec!["No active processes".to_string()]
                } else {
                    listing.iter().map(|p| p.to_string()).collect()
                }
            }
            "kill" => {
                let pid = rest
                    .parse()
                    .map(Pid)
                    .map_err(|_| CommandError::Usage("kill <pid>"))?;
                self.machine.kill(pid)?;
                vec![format!("killed pid {}", pid)]
            }
            "tick" => {
                let count: u64 = if rest.is_empty() {
                    1
                } else {
                    rest.parse().map_err(|_| CommandError::Usage("tick [count]"))?
                };
                if count > MAX_TICKS_PER_COMMAND {
                    return Err(CommandError::TooManyTicks(count));
                }
                let mut lines = Vec::new();
                for _ in 0..count {
                    let report = self.machine.tick();
                    lines.append(&mut self.machine.take_output());
                    lines.extend(describe_tick(&report));
                }
                lines
            }
            "run" => {
                if self.machine.cpu.halted {
                    return Ok(vec!["cpu is halted; use `reset` first".to_string()]);
                }
                let program = compiler::parse_program(rest)?;
                let report = self.machine.execute(&program);
                let mut lines = self.machine.take_output();
                lines.extend(report.faults.iter().map(|f| format!("fault: {}", f)));
                lines.push(match report.outcome {
                    RunOutcome::Completed => format!("completed after {} steps", report.steps),
                    RunOutcome::Halted => format!("halted after {} steps", report.steps),
                    RunOutcome::OutOfFuel => format!("out of fuel after {} steps", report.steps),
                });
                lines
            }
            "regs" => {
                let s = self.machine.snapshot();
                vec![format!(
                    "AX: {} BX: {} CX: {} SP: {} IP: {} FLAG: {:?} HALTED: {}",
                    s.ax, s.bx, s.cx, s.sp, s.ip, s.flag, s.halted
                )]
            }
            "mem" => {
                let addr: i64 = rest.parse().map_err(|_| CommandError::Usage("mem <addr>"))?;
                let value = self.machine.memory.read(addr)?;
                vec![format!("Memory[{}] = {}", addr, value)]
            }
            "reset" => {
                self.machine.reset();
                vec!["cpu reset".to_string()]
            }
            _ => vec![format!("Unknown command: {}", verb)],
        };
        Ok(lines)
    }
}

fn describe_tick(report: &TickReport) -> Vec<String> {
    let mut lines = vec![format!(
        "tick {}: {} dispatched",
        report.tick,
        report.dispatched.len()
    )];
    lines.extend(
        report
            .faults
            .iter()
            .map(|(pid, fault)| format!("pid {}: {}", pid, fault)),
    );
    lines.extend(report.halted.iter().map(|pid| format!("pid {} halted", pid)));
    lines
}
