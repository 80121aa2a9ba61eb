use std::fmt;

use serde::Serialize;

use crate::error::{Fault, ProcessError};
use crate::isa::Instruction;
use crate::vm::{AdvancePolicy, Cpu, Machine, Registers, TickAdvancePolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Pid(pub u32);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `Ready -> Halted` is the only transition. "Running" exists only inside a
/// tick while the scheduler has the process selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Ready,
    Halted,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProcessState::Ready => "ready",
            ProcessState::Halted => "halted",
        })
    }
}

#[derive(Debug, Clone)]
pub struct Process {
    pub pid: Pid,
    pub program: Vec<Instruction>,
    pub ip: usize,
    pub state: ProcessState,
    pub context: Registers,
    /// Tick number at spawn.
    pub created_at: u64,
    pub executed: u64,
    pub last_tick: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessInfo {
    pub pid: Pid,
    pub state: ProcessState,
    pub ip: usize,
    pub executed: u64,
    pub created_at: u64,
    pub program_len: usize,
}

impl fmt::Display for ProcessInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PID: {}, State: {}, IP: {}", self.pid, self.state, self.ip)
    }
}

#[derive(Debug, Default)]
pub struct ProcessTable {
    procs: Vec<Process>,
    last_pid: u32,
    ticks: u64,
}

impl ProcessTable {
    pub fn spawn(&mut self, program: Vec<Instruction>) -> Pid {
        self.last_pid += 1;
        let pid = Pid(self.last_pid);
        self.procs.push(Process {
            pid,
            program,
            ip: 0,
            state: ProcessState::Ready,
            context: Registers::default(),
            created_at: self.ticks,
            executed: 0,
            last_tick: None,
        });
        pid
    }

    pub fn kill(&mut self, pid: Pid) -> Result<(), ProcessError> {
        let proc = self
            .procs
            .iter_mut()
            .find(|p| p.pid == pid)
            .ok_or(ProcessError::NoSuchProcess(pid))?;
        proc.state = ProcessState::Halted;
        Ok(())
    }

    pub fn ps(&self) -> Vec<ProcessInfo> {
        self.procs
            .iter()
            .map(|p| ProcessInfo {
                pid: p.pid,
                state: p.state,
                ip: p.ip,
                executed: p.executed,
                created_at: p.created_at,
                program_len: p.program.len(),
            })
            .collect()
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.procs.iter().find(|p| p.pid == pid)
    }

    pub fn ready_count(&self) -> usize {
        self.procs
            .iter()
            .filter(|p| p.state == ProcessState::Ready)
            .count()
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Processes that executed an instruction this tick, in table order.
    pub dispatched: Vec<Pid>,
    /// Processes that moved to `Halted` this tick.
    pub halted: Vec<Pid>,
    pub faults: Vec<(Pid, Fault)>,
}

impl Machine {
    pub fn spawn(&mut self, program: Vec<Instruction>) -> Pid {
        let len = program.len();
        let pid = self.processes.spawn(program);
        self.log
            .info(format!("spawned pid {} ({} instructions)", pid, len));
        pid
    }

    pub fn kill(&mut self, pid: Pid) -> Result<(), ProcessError> {
        self.processes.kill(pid)?;
        self.log.info(format!("killed pid {}", pid));
        Ok(())
    }

    pub fn ps(&self) -> Vec<ProcessInfo> {
        self.processes.ps()
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    /// One scheduler sweep: every ready process, in table order, executes
    /// the instruction at its own ip with its own registers swapped in.
    /// Memory and the filesystem are shared; the foreground registers are
    /// put back once the sweep is done.
    pub fn tick(&mut self) -> TickReport {
        self.processes.ticks += 1;
        let tick = self.processes.ticks;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };
        let foreground = self.cpu;

        for idx in 0..self.processes.procs.len() {
            let proc = &self.processes.procs[idx];
            if proc.state != ProcessState::Ready {
                continue;
            }
            let (pid, fetched, context) = (proc.pid, proc.ip, proc.context);
            let Some(instr) = proc.program.get(fetched).cloned() else {
                self.processes.procs[idx].state = ProcessState::Halted;
                self.log.info(format!("pid {} finished", pid));
                report.halted.push(pid);
                continue;
            };

            self.cpu = Cpu {
                regs: context,
                ip: fetched,
                halted: false,
            };
            let result = self.dispatch(&instr);
            if let Err(fault) = &result {
                self.report_fault(Some(pid), fetched, fault);
            }

            let proc = &mut self.processes.procs[idx];
            proc.context = self.cpu.regs;
            proc.ip = TickAdvancePolicy::next_ip(fetched, self.cpu.ip);
            proc.executed += 1;
            proc.last_tick = Some(tick);
            report.dispatched.push(pid);
            if self.cpu.halted {
                proc.state = ProcessState::Halted;
                report.halted.push(pid);
            }
            if let Err(fault) = result {
                report.faults.push((pid, fault));
            }
        }

        self.cpu = foreground;
        report
    }
}
