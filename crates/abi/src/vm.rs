use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;
use vfs::{MemoryFs, Vfs};

use crate::config::{MachineConfig, UnknownOpcodePolicy};
use crate::error::{ArithmeticFault, BoundsFault, Fault};
use crate::isa::{ArithOp, Condition, Instruction, Operand, Register, Target};
use crate::log::{Level, LogQueue, LogRecord};
use crate::memory::Memory;
use crate::process::{Pid, ProcessInfo, ProcessTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Flag {
    #[default]
    Unset,
    Equal,
    Greater,
    Less,
}

/// Register file. Also the snapshot a process carries between slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Registers {
    pub ax: i64,
    pub bx: i64,
    pub cx: i64,
    pub sp: usize,
    pub flag: Flag,
}

impl Registers {
    pub fn get(&self, reg: Register) -> i64 {
        match reg {
            Register::Ax => self.ax,
            Register::Bx => self.bx,
            Register::Cx => self.cx,
        }
    }

    pub fn set(&mut self, reg: Register, value: i64) {
        match reg {
            Register::Ax => self.ax = value,
            Register::Bx => self.bx = value,
            Register::Cx => self.cx = value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Cpu {
    pub regs: Registers,
    pub ip: usize,
    pub halted: bool,
}

/// Handler for a mnemonic outside the built-in table. It owns ip advancement
/// exactly like a built-in handler does.
pub type OpcodeHandler = fn(&mut Machine, Option<&Operand>) -> Result<(), Fault>;

/// Where ip points after one dispatch.
pub trait AdvancePolicy {
    fn next_ip(fetched: usize, after_dispatch: usize) -> usize;
}

/// `execute` loop: the handler decides. Jumps jump, untaken conditional
/// jumps leave ip where it was.
pub struct FreeRunPolicy;

impl AdvancePolicy for FreeRunPolicy {
    fn next_ip(_fetched: usize, after_dispatch: usize) -> usize {
        after_dispatch
    }
}

/// Scheduler slices: ip always lands one past the fetched instruction, so
/// jumps inside spawned programs do not branch.
pub struct TickAdvancePolicy;

impl AdvancePolicy for TickAdvancePolicy {
    fn next_ip(fetched: usize, _after_dispatch: usize) -> usize {
        fetched + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// ip ran past the last instruction.
    Completed,
    Halted,
    OutOfFuel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub steps: u64,
    pub faults: Vec<Fault>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineSnapshot {
    pub ax: i64,
    pub bx: i64,
    pub cx: i64,
    pub sp: usize,
    pub ip: usize,
    pub flag: Flag,
    pub halted: bool,
    pub cwd: String,
    pub processes: Vec<ProcessInfo>,
}

pub struct Machine {
    pub cpu: Cpu,
    pub memory: Memory,
    fs: Box<dyn Vfs + Send>,
    pub(crate) processes: ProcessTable,
    extensions: HashMap<String, OpcodeHandler>,
    output: Vec<String>,
    pub(crate) log: LogQueue,
    config: MachineConfig,
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self::with_filesystem(config, Box::new(MemoryFs::new()))
    }

    pub fn with_filesystem(config: MachineConfig, fs: Box<dyn Vfs + Send>) -> Self {
        Self {
            cpu: Cpu::default(),
            memory: Memory::new(config.memory_cells),
            fs,
            processes: ProcessTable::default(),
            extensions: HashMap::new(),
            output: Vec::new(),
            log: LogQueue::default(),
            config,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn fs(&self) -> &(dyn Vfs + Send) {
        self.fs.as_ref()
    }

    pub fn fs_mut(&mut self) -> &mut (dyn Vfs + Send) {
        self.fs.as_mut()
    }

    /// Built-in mnemonics always win; a registered name is only consulted
    /// for instructions that decoded to `Instruction::Other`.
    pub fn register_opcode(&mut self, name: impl Into<String>, handler: OpcodeHandler) {
        self.extensions.insert(name.into(), handler);
    }

    /// Appends a line to the program-visible output.
    pub fn emit(&mut self, line: impl Into<String>) {
        self.output.push(line.into());
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut self.output)
    }

    pub fn log(&self) -> impl Iterator<Item = &LogRecord> {
        self.log.iter()
    }

    pub fn drain_log(&mut self) -> Vec<LogRecord> {
        self.log.drain()
    }

    /// Clears registers, flag, ip and the halt flag. Memory, the filesystem
    /// and the process table are left alone.
    pub fn reset(&mut self) {
        self.cpu = Cpu::default();
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        let regs = &self.cpu.regs;
        MachineSnapshot {
            ax: regs.ax,
            bx: regs.bx,
            cx: regs.cx,
            sp: regs.sp,
            ip: self.cpu.ip,
            flag: regs.flag,
            halted: self.cpu.halted,
            cwd: self.fs.pwd(),
            processes: self.processes.ps(),
        }
    }

    /// Runs `program` from ip 0 until it halts, runs off the end, or burns
    /// through the configured fuel.
    pub fn execute(&mut self, program: &[Instruction]) -> RunReport {
        self.cpu.ip = 0;
        let mut report = RunReport {
            outcome: RunOutcome::Completed,
            steps: 0,
            faults: Vec::new(),
        };
        loop {
            if self.cpu.halted {
                report.outcome = RunOutcome::Halted;
                break;
            }

            // Fetch
            let fetched = self.cpu.ip;
            let Some(instr) = program.get(fetched) else {
                report.outcome = RunOutcome::Completed;
                break;
            };
            if self.config.fuel.is_some_and(|fuel| report.steps >= fuel) {
                self.log.warn(format!(
                    "out of fuel after {} instructions at ip={}",
                    report.steps, fetched
                ));
                report.outcome = RunOutcome::OutOfFuel;
                break;
            }

            // Decode & Execute
            if let Err(fault) = self.dispatch(instr) {
                self.report_fault(None, fetched, &fault);
                report.faults.push(fault);
            }
            self.cpu.ip = FreeRunPolicy::next_ip(fetched, self.cpu.ip);
            report.steps += 1;
        }
        report
    }

    /// Executes one instruction at the current ip. Fatal faults set the halt
    /// flag and leave ip on the faulting instruction; recoverable ones move
    /// ip one slot forward.
    pub fn dispatch(&mut self, instr: &Instruction) -> Result<(), Fault> {
        let fetched = self.cpu.ip;
        let result = self.apply(instr);
        if let Err(fault) = &result {
            if fault.is_fatal() {
                self.cpu.halted = true;
            } else {
                self.cpu.ip = fetched + 1;
                if matches!(fault, Fault::UnknownOpcode(_))
                    && self.config.unknown_opcode == UnknownOpcodePolicy::Halt
                {
                    self.cpu.halted = true;
                }
            }
        }
        result
    }

    pub(crate) fn report_fault(&mut self, pid: Option<Pid>, ip: usize, fault: &Fault) {
        let level = if fault.is_fatal() {
            Level::Error
        } else {
            Level::Warn
        };
        let message = match pid {
            Some(pid) => format!("pid {} ip {}: {}", pid, ip, fault),
            None => format!("ip {}: {}", ip, fault),
        };
        self.log.push(level, message);
    }

    fn advance(&mut self) -> Result<(), Fault> {
        self.cpu.ip += 1;
        Ok(())
    }

    fn apply(&mut self, instr: &Instruction) -> Result<(), Fault> {
        match instr {
            // --- Data Transfer ---
            Instruction::Load(Target::Reg(reg), value) => {
                self.cpu.regs.set(*reg, *value);
                self.advance()
            }
            Instruction::Load(Target::Sp, value) => {
                self.cpu.regs.sp = usize::try_from(*value).map_err(|_| Fault::InvalidOperand {
                    op: instr.mnemonic(),
                    reason: format!("stack pointer {} out of range", value),
                })?;
                self.advance()
            }
            Instruction::SetIp(addr) | Instruction::Jump(addr) => {
                self.cpu.ip = *addr;
                Ok(())
            }
            Instruction::Move { src, dst } => {
                let value = self.cpu.regs.get(*src);
                self.cpu.regs.set(*dst, value);
                self.advance()
            }
            Instruction::Swap(a, b) => {
                let (va, vb) = (self.cpu.regs.get(*a), self.cpu.regs.get(*b));
                self.cpu.regs.set(*a, vb);
                self.cpu.regs.set(*b, va);
                self.advance()
            }

            // --- Arithmetic ---
            Instruction::Arith(op, reg, operand) => {
                let value = arith(*op, self.cpu.regs.get(*reg), *operand)?;
                self.cpu.regs.set(*reg, value);
                self.advance()
            }
            Instruction::Inc(target) => {
                match target {
                    Target::Reg(reg) => {
                        let value = arith(ArithOp::Add, self.cpu.regs.get(*reg), 1)?;
                        self.cpu.regs.set(*reg, value);
                    }
                    Target::Sp => {
                        let sp = self.cpu.regs.sp;
                        self.cpu.regs.sp = sp.checked_add(1).ok_or(BoundsFault::StackOverflow {
                            sp,
                            size: self.memory.len(),
                        })?;
                    }
                }
                self.advance()
            }
            Instruction::Dec(target) => {
                match target {
                    Target::Reg(reg) => {
                        let value = arith(ArithOp::Sub, self.cpu.regs.get(*reg), 1)?;
                        self.cpu.regs.set(*reg, value);
                    }
                    Target::Sp => {
                        self.cpu.regs.sp = self
                            .cpu
                            .regs
                            .sp
                            .checked_sub(1)
                            .ok_or(BoundsFault::StackUnderflow)?;
                    }
                }
                self.advance()
            }

            // --- Control Flow ---
            Instruction::Cmp(reg, operand) => {
                self.cpu.regs.flag = match self.cpu.regs.get(*reg).cmp(operand) {
                    Ordering::Equal => Flag::Equal,
                    Ordering::Greater => Flag::Greater,
                    Ordering::Less => Flag::Less,
                };
                self.advance()
            }
            Instruction::JumpIf(cond, addr) => {
                let flag = self.cpu.regs.flag;
                let taken = match cond {
                    Condition::Equal => flag == Flag::Equal,
                    Condition::NotEqual => flag != Flag::Equal,
                    Condition::Greater => flag == Flag::Greater,
                    Condition::Less => flag == Flag::Less,
                };
                if taken {
                    self.cpu.ip = *addr;
                }
                Ok(())
            }
            Instruction::Halt => {
                self.cpu.halted = true;
                self.log.info("cpu halted");
                Ok(())
            }
            Instruction::Padding(amount) => {
                self.cpu.ip = self.cpu.ip.saturating_add(*amount);
                Ok(())
            }

            // --- Memory ---
            Instruction::StoreMem { addr, reg } => {
                self.memory.write(*addr, self.cpu.regs.get(*reg))?;
                self.advance()
            }
            Instruction::LoadMem { addr, reg } => {
                let value = self.memory.read(*addr)?;
                self.cpu.regs.set(*reg, value);
                self.advance()
            }
            Instruction::PrintMem(addr) => {
                let value = self.memory.read(*addr)?;
                self.emit(format!("Memory[{}] = {}", addr, value));
                self.advance()
            }
            Instruction::ClearMem => {
                self.memory.clear();
                self.log.info("memory cleared");
                self.advance()
            }

            // --- Stack ---
            Instruction::Push(reg) => {
                let sp = self.cpu.regs.sp;
                if sp >= self.memory.len() {
                    return Err(BoundsFault::StackOverflow {
                        sp,
                        size: self.memory.len(),
                    }
                    .into());
                }
                self.memory.write(sp as i64, self.cpu.regs.get(*reg))?;
                self.cpu.regs.sp = sp + 1;
                self.advance()
            }
            Instruction::Pop(reg) => {
                let sp = self
                    .cpu
                    .regs
                    .sp
                    .checked_sub(1)
                    .ok_or(BoundsFault::StackUnderflow)?;
                let value = self.memory.read(sp as i64)?;
                self.cpu.regs.sp = sp;
                self.cpu.regs.set(*reg, value);
                self.advance()
            }
            Instruction::Peek => {
                let line = match self.cpu.regs.sp.checked_sub(1) {
                    Some(top) => format!("Stack top: {}", self.memory.read(top as i64)?),
                    None => "Stack is empty".to_string(),
                };
                self.emit(line);
                self.advance()
            }
            Instruction::PrintStack => {
                let sp = self.cpu.regs.sp;
                self.emit(format!("SP points to: {}", sp));
                let depth = sp.min(self.memory.len());
                let lines: Vec<String> = self.memory.cells()[..depth]
                    .iter()
                    .enumerate()
                    .map(|(i, v)| format!("Stack[{}]: {}", i, v))
                    .collect();
                self.output.extend(lines);
                self.advance()
            }

            // --- Filesystem ---
            Instruction::Mkdir(name) => {
                self.fs.mkdir(name)?;
                self.advance()
            }
            Instruction::Cd(name) => {
                self.fs.cd(name)?;
                self.advance()
            }
            Instruction::Ls => {
                let entries = self.fs.ls()?;
                self.emit(self.fs.pwd());
                self.output.extend(entries.iter().map(|e| e.to_string()));
                self.advance()
            }
            Instruction::Write { name, content } => {
                self.fs.write(name, content)?;
                self.advance()
            }
            Instruction::Read(name) => {
                let content = self.fs.read(name)?;
                self.emit(format!("{}: {}", name, content));
                self.advance()
            }
            Instruction::Rm(name) => {
                self.fs.rm(name)?;
                self.advance()
            }

            // --- Diagnostics ---
            Instruction::Print(target) => {
                let value = match target {
                    Target::Reg(reg) => self.cpu.regs.get(*reg),
                    Target::Sp => self.cpu.regs.sp as i64,
                };
                self.emit(format!("{}: {}", target.name().to_uppercase(), value));
                self.advance()
            }
            Instruction::Banner => {
                self.emit("Welcome to simos");
                self.advance()
            }
            Instruction::BiosInterrupt => {
                self.log.info("BIOS interrupt triggered");
                self.advance()
            }
            Instruction::DisableInterrupt => {
                self.log.info("interrupts disabled");
                self.advance()
            }

            Instruction::Other { op, arg } => match self.extensions.get(op.as_str()).copied() {
                Some(handler) => handler(self, arg.as_ref()),
                None => Err(Fault::UnknownOpcode(op.clone())),
            },
        }
    }
}

fn arith(op: ArithOp, lhs: i64, rhs: i64) -> Result<i64, ArithmeticFault> {
    match op {
        ArithOp::Add => lhs.checked_add(rhs).ok_or(ArithmeticFault::Overflow),
        ArithOp::Sub => lhs.checked_sub(rhs).ok_or(ArithmeticFault::Overflow),
        ArithOp::Mul => lhs.checked_mul(rhs).ok_or(ArithmeticFault::Overflow),
        ArithOp::Div if rhs == 0 => Err(ArithmeticFault::DivideByZero),
        ArithOp::Div => floor_div(lhs, rhs).ok_or(ArithmeticFault::Overflow),
        ArithOp::Mod if rhs == 0 => Err(ArithmeticFault::ModuloByZero),
        ArithOp::Mod => lhs.checked_rem(rhs).ok_or(ArithmeticFault::Overflow),
    }
}

fn floor_div(lhs: i64, rhs: i64) -> Option<i64> {
    let q = lhs.checked_div(rhs)?;
    if lhs % rhs != 0 && ((lhs < 0) != (rhs < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn division_floors_toward_negative_infinity() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-7, 2), Some(-4));
        assert_eq!(floor_div(7, -2), Some(-4));
        assert_eq!(floor_div(-7, -2), Some(3));
        assert_eq!(floor_div(-8, 2), Some(-4));
        assert_eq!(floor_div(i64::MIN, -1), None);
    }

    #[test]
    fn incsp_at_the_top_of_the_address_space_overflows() {
        let mut vm = Machine::new();
        vm.cpu.regs.sp = usize::MAX;
        let report = vm.execute(&[Instruction::Inc(Target::Sp)]);
        assert_eq!(report.outcome, RunOutcome::Halted);
        assert!(matches!(
            report.faults.as_slice(),
            [Fault::Bounds(BoundsFault::StackOverflow { sp: usize::MAX, .. })]
        ));
        assert_eq!(vm.cpu.regs.sp, usize::MAX);
    }

    #[test]
    fn modulo_keeps_dividend_sign() {
        assert_eq!(arith(ArithOp::Mod, -7, 3), Ok(-1));
        assert_eq!(arith(ArithOp::Mod, 7, -3), Ok(1));
        assert_eq!(arith(ArithOp::Mod, 7, 0), Err(ArithmeticFault::ModuloByZero));
        assert_eq!(arith(ArithOp::Add, i64::MAX, 1), Err(ArithmeticFault::Overflow));
    }
}
