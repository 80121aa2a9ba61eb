use wasm_bindgen::prelude::*;

pub mod console;

pub use console::{CommandOutput, Console, HELP};

use abi::{Machine, MachineConfig, RunOutcome};

pub const SYSTEM_STATUS: &str = r#"
================================================================================
SIMOS // EDUCATIONAL REGISTER MACHINE
================================================================================
[ ARCHITECTURE ]
Flat Memory + In-Memory Tree FS + Register CPU + Round-Robin Scheduler.

[ SUBSYSTEMS ]
[x] MEMORY: fixed cells, bounds-checked, stack grows from address 0.
[x] FS: mkdir / cd / ls / write / read / rm relative to cwd.
[x] CPU: ax, bx, cx, sp, ip, flag. Fuel-limited free run.
[x] SCHEDULER: one instruction per ready process per tick.

BOOT SELF-CHECK:
"#;

/// Log to the browser console on wasm32, stderr everywhere else.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = console)]
    fn log(s: &str);
}

#[cfg(target_arch = "wasm32")]
#[doc(hidden)]
pub fn __console_log(s: &str) {
    log(s)
}

#[cfg(target_arch = "wasm32")]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        $crate::__console_log(&format!($($t)*))
    };
}

#[cfg(not(target_arch = "wasm32"))]
#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => {
        eprintln!($($t)*)
    };
}

/// Sample program exercised at boot: leaves 13 in ax.
pub const SELF_CHECK_PROGRAM: &str = "copy2ax 10; add2ax 5; mul2ax 2; sub2ax 4; div2ax 2; halt";

pub fn run_suite() -> String {
    let mut report = String::from(SYSTEM_STATUS);
    report.push_str("TEST: REGISTER_ARITHMETIC ... ");

    let program = match compiler::parse_program(SELF_CHECK_PROGRAM) {
        Ok(program) => program,
        Err(e) => {
            report.push_str(&format!("FAIL ({})\n", e));
            return report;
        }
    };
    let mut vm = Machine::with_config(MachineConfig::default());
    let run = vm.execute(&program);
    if run.outcome == RunOutcome::Halted && vm.cpu.regs.ax == 13 {
        report.push_str("PASS\n");
    } else {
        report.push_str(&format!(
            "FAIL (AX: {}, {:?})\n",
            vm.cpu.regs.ax, run.outcome
        ));
    }
    report.push('\n');
    report.push_str(HELP);
    report
}

#[wasm_bindgen]
pub fn init_shell() -> String {
    run_suite()
}

/// Browser handle. The page owns the timer and calls `tick` every
/// `tick_period_ms`; commands and ticks both return JSON-encoded
/// `CommandOutput`.
#[wasm_bindgen]
pub struct WebOs {
    console: Console,
}

#[wasm_bindgen]
impl WebOs {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WebOs {
        WebOs {
            console: Console::new(),
        }
    }

    pub fn with_config_json(config: &str) -> Result<WebOs, JsValue> {
        let config =
            MachineConfig::from_json(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WebOs {
            console: Console::with_config(config),
        })
    }

    pub fn run_command(&mut self, line: &str) -> Result<String, JsValue> {
        let output = self.console.run_command(line);
        self.flush_log();
        to_json(&output)
    }

    pub fn tick(&mut self) -> Result<String, JsValue> {
        let output = CommandOutput {
            lines: self.console.tick(),
            clear: false,
        };
        self.flush_log();
        to_json(&output)
    }

    pub fn snapshot_json(&self) -> Result<String, JsValue> {
        to_json(&self.console.snapshot())
    }

    pub fn tick_period_ms(&self) -> u64 {
        self.console.machine().config().tick_period_ms
    }
}

impl Default for WebOs {
    fn default() -> Self {
        Self::new()
    }
}

impl WebOs {
    fn flush_log(&mut self) {
        for record in self.console.drain_log() {
            console_log!("{}", record);
        }
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))
}
