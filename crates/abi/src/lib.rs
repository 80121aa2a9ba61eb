// Internal Application Binary Interface (ABI)
// Instruction set, machine state and process scheduler of the simulator.
// Host access (printing, timers, clocks) stays outside: the core only
// records output lines and log records for the host to drain.

pub mod config;
pub mod error;
pub mod isa;
pub mod log;
pub mod memory;
pub mod process;
pub mod vm;

pub use config::{MachineConfig, UnknownOpcodePolicy};
pub use error::{ArithmeticFault, BoundsFault, ConfigError, Fault, ProcessError};
pub use isa::{ArithOp, Condition, DecodeError, Instruction, Operand, RawInstruction, Register, Target};
pub use log::{Level, LogRecord};
pub use memory::Memory;
pub use process::{Pid, ProcessInfo, ProcessState, TickReport};
pub use vm::{
    AdvancePolicy, Cpu, Flag, FreeRunPolicy, Machine, MachineSnapshot, OpcodeHandler, Registers,
    RunOutcome, RunReport, TickAdvancePolicy,
};

pub const MEMORY_CELLS: usize = 256;
/// Largest memory a config may ask for (2^20 cells).
pub const MAX_MEMORY_CELLS: usize = 1 << 20;
pub const TICK_PERIOD_MS: u64 = 100;
pub const DEFAULT_FUEL: u64 = 100_000;
