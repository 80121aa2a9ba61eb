use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::{DEFAULT_FUEL, MAX_MEMORY_CELLS, MEMORY_CELLS, TICK_PERIOD_MS};

/// What the machine does after skipping an unrecognised mnemonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownOpcodePolicy {
    /// Advance one slot, then halt.
    #[default]
    Halt,
    /// Advance one slot and keep going.
    Warn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub memory_cells: usize,
    /// Upper bound on instructions dispatched by one `execute` call.
    pub fuel: Option<u64>,
    /// Period hosts should use when driving `Machine::tick`.
    pub tick_period_ms: u64,
    pub unknown_opcode: UnknownOpcodePolicy,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            memory_cells: MEMORY_CELLS,
            fuel: Some(DEFAULT_FUEL),
            tick_period_ms: TICK_PERIOD_MS,
            unknown_opcode: UnknownOpcodePolicy::Halt,
        }
    }
}

impl MachineConfig {
    pub fn from_json(src: &str) -> Result<Self, ConfigError> {
        let config: MachineConfig = serde_json::from_str(src)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_cells == 0 {
            return Err(ConfigError::Invalid("memory_cells must be positive".into()));
        }
        if self.memory_cells > MAX_MEMORY_CELLS {
            return Err(ConfigError::Invalid(format!(
                "memory_cells must be at most {}",
                MAX_MEMORY_CELLS
            )));
        }
        if self.tick_period_ms == 0 {
            return Err(ConfigError::Invalid("tick_period_ms must be positive".into()));
        }
        Ok(())
    }
}
