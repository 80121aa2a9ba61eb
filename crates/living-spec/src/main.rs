use abi::{
    ArithmeticFault, BoundsFault, Fault, Flag, Machine, MachineConfig, ProcessState, RunOutcome,
};
use colored::*;
use vfs::{MemoryFs, Vfs, VfsError};

const MANIFESTO: &str = r#"
================================================================================
SIMOS // LIVING SPECIFICATION
================================================================================

[ MISSION ]
A small, inspectable register machine for teaching: flat memory, a tree
filesystem, six registers and a round-robin scheduler, all deterministic and
all reachable from a terminal.

[ ROADMAP ]
--------------------------------------------------------------------------------
PHASE 1: THE MACHINE
[x] 1.1 Flat memory with bounds checks and a stack at address 0.
[x] 1.2 Register CPU, flag, fetch-execute loop with fuel.
[x] 1.3 In-memory filesystem (mkdir / cd / ls / write / read / rm).
[x] 1.4 Text + JSON assembler with labels.

PHASE 2: THE SCHEDULER
[x] 2.1 Process table with monotonically increasing PIDs.
[x] 2.2 One instruction per ready process per tick.
[x] 2.3 Host timer (CLI thread, browser setInterval).

[ KNOWN BEHAVIOUR ]
--------------------------------------------------------------------------------
NOTE #001: Scheduled jumps
  - Under the scheduler every instruction advances ip by one, so jumps inside
    spawned programs do not branch. Free-run `execute` honours them.

================================================================================
UNIT TEST SUITE
================================================================================
"#;

fn main() {
    println!("{}", MANIFESTO);
    let mut passed = 0;
    let mut failed = 0;

    run_test("MEMORY_ROUND_TRIP", test_memory_round_trip, &mut passed, &mut failed);
    run_test("MEMORY_OUT_OF_RANGE_HALTS", test_memory_out_of_range, &mut passed, &mut failed);
    run_test("STACK_PUSH_POP", test_stack_push_pop, &mut passed, &mut failed);
    run_test("STACK_OVERFLOW_AT_CAPACITY", test_stack_overflow, &mut passed, &mut failed);
    run_test("FS_PATH_RESTORE", test_fs_path_restore, &mut passed, &mut failed);
    run_test("FS_WRITE_READ_RM", test_fs_write_read_rm, &mut passed, &mut failed);
    run_test("CMP_JUMP_FLAGS", test_cmp_jump, &mut passed, &mut failed);
    run_test("DIVISION_BY_ZERO_HALTS", test_division_by_zero, &mut passed, &mut failed);
    run_test("PID_ALLOCATION", test_pids, &mut passed, &mut failed);
    run_test("KILL_ISOLATION", test_kill_isolation, &mut passed, &mut failed);
    run_test("EXHAUSTED_PROCESS_HALTS", test_exhausted_process, &mut passed, &mut failed);
    run_test("END_TO_END_ARITHMETIC", test_end_to_end, &mut passed, &mut failed);

    println!("\n--------------------------------------------------------------------------------");
    println!("{} passed, {} failed", passed, failed);
    if failed == 0 {
        println!("{}", "ALL SYSTEMS NOMINAL.".green().bold());
    } else {
        std::process::exit(1);
    }
}

// --- TEST INFRASTRUCTURE ---

fn run_test<F>(name: &str, test_fn: F, passed: &mut i32, failed: &mut i32)
where F: Fn() -> Result<(), String> {
    print!("TEST: {:<30} ... ", name);
    match test_fn() {
        Ok(_) => { println!("{}", "PASS".green()); *passed += 1; }
        Err(e) => { println!("{}", "FAIL".red()); println!("  -> {}", e); *failed += 1; }
    }
}

fn check(cond: bool, msg: &str) -> Result<(), String> {
    if cond { Ok(()) } else { Err(msg.into()) }
}

fn run(src: &str) -> Result<Machine, String> {
    let program = compiler::parse_program(src).map_err(|e| e.to_string())?;
    let mut vm = Machine::new();
    vm.execute(&program);
    Ok(vm)
}

fn test_memory_round_trip() -> Result<(), String> {
    let vm = run("copy2ax -7; storeMem 10 ax; copy2ax 0; loadMem 10 bx")?;
    check(vm.cpu.regs.bx == -7, "loadMem did not return the stored value")?;
    check(vm.memory.read(10) == Ok(-7), "memory cell not written")
}

fn test_memory_out_of_range() -> Result<(), String> {
    let mut vm = Machine::new();
    let program = compiler::parse_program("copy2ax 1; storeMem 256 ax; copy2bx 9")
        .map_err(|e| e.to_string())?;
    let report = vm.execute(&program);
    check(report.outcome == RunOutcome::Halted, "out-of-range store did not halt")?;
    check(vm.cpu.regs.bx == 0, "execution continued past the fault")?;
    check(vm.memory.cells().iter().all(|&c| c == 0), "memory was modified")?;
    check(
        matches!(report.faults.first(), Some(Fault::Bounds(BoundsFault::Write { addr: 256, .. }))),
        "wrong fault",
    )
}

fn test_stack_push_pop() -> Result<(), String> {
    let vm = run("copy2bx 41; push bx; copy2bx 0; pop ax")?;
    check(vm.cpu.regs.ax == 41, "pop did not return the pushed value")?;
    check(vm.cpu.regs.sp == 0, "sp not restored")
}

fn test_stack_overflow() -> Result<(), String> {
    let config = MachineConfig { memory_cells: 4, ..MachineConfig::default() };
    let mut vm = Machine::with_config(config);
    let program = compiler::parse_program("push ax; push ax; push ax; push ax; push ax")
        .map_err(|e| e.to_string())?;
    let report = vm.execute(&program);
    check(report.steps == 5, "overflow came too early")?;
    check(vm.cpu.regs.sp == 4, "sp moved past capacity")?;
    check(
        matches!(report.faults.as_slice(), [Fault::Bounds(BoundsFault::StackOverflow { .. })]),
        "fifth push was not a stack overflow",
    )
}

fn test_fs_path_restore() -> Result<(), String> {
    let mut fs = MemoryFs::new();
    fs.mkdir("a").map_err(|e| e.to_string())?;
    fs.cd("a").map_err(|e| e.to_string())?;
    check(fs.pwd() == "/a", "cd did not enter")?;
    fs.cd("..").map_err(|e| e.to_string())?;
    check(fs.pwd() == "/", "cd .. did not restore the path")
}

fn test_fs_write_read_rm() -> Result<(), String> {
    let mut fs = MemoryFs::new();
    fs.write("f", "hello").map_err(|e| e.to_string())?;
    check(fs.read("f").as_deref() == Ok("hello"), "read did not return the content")?;
    fs.rm("f").map_err(|e| e.to_string())?;
    check(matches!(fs.read("f"), Err(VfsError::NotFound(_))), "read after rm succeeded")
}

fn test_cmp_jump() -> Result<(), String> {
    let vm = run("copy2ax 3; cmpax 3; jmpIfEqual 4; copy2bx 1; copy2cx 1")?;
    check(vm.cpu.regs.flag == Flag::Equal, "cmp did not set Equal")?;
    check(vm.cpu.regs.bx == 0 && vm.cpu.regs.cx == 1, "je did not branch")
}

fn test_division_by_zero() -> Result<(), String> {
    for src in ["copy2ax 9; div2ax 0", "copy2ax 9; mod2ax 0"] {
        let mut vm = Machine::new();
        let program = compiler::parse_program(src).map_err(|e| e.to_string())?;
        let report = vm.execute(&program);
        check(report.outcome == RunOutcome::Halted, "zero divisor did not halt")?;
        check(
            matches!(report.faults.as_slice(), [Fault::Arithmetic(
                ArithmeticFault::DivideByZero | ArithmeticFault::ModuloByZero
            )]),
            "wrong fault",
        )?;
        check(vm.cpu.regs.ax == 9, "ax modified by a failed division")?;
    }
    Ok(())
}

fn test_pids() -> Result<(), String> {
    let mut vm = Machine::new();
    let a = vm.spawn(Vec::new());
    let b = vm.spawn(Vec::new());
    check(b > a, "PIDs are not increasing")
}

fn test_kill_isolation() -> Result<(), String> {
    let mut vm = Machine::new();
    let program = compiler::parse_program("incbx; incbx").map_err(|e| e.to_string())?;
    let a = vm.spawn(program.clone());
    let b = vm.spawn(program);
    vm.kill(a).map_err(|e| e.to_string())?;
    vm.tick();
    let ps = vm.ps();
    check(ps[0].state == ProcessState::Halted && ps[0].ip == 0, "killed process ran")?;
    check(ps[1].pid == b && ps[1].ip == 1, "survivor did not run")
}

fn test_exhausted_process() -> Result<(), String> {
    let mut vm = Machine::new();
    let short = vm.spawn(compiler::parse_program("incax").map_err(|e| e.to_string())?);
    let long = vm.spawn(compiler::parse_program("incax; incax; incax").map_err(|e| e.to_string())?);
    vm.tick();
    let report = vm.tick();
    check(report.halted == vec![short], "exhausted process did not halt")?;
    check(report.dispatched == vec![long], "other process was disturbed")
}

fn test_end_to_end() -> Result<(), String> {
    let vm = run("copy2ax 10; add2ax 5; mul2ax 2; sub2ax 4; div2ax 2; halt")?;
    check(vm.cpu.regs.ax == 13, &format!("Math failed: ax = {}", vm.cpu.regs.ax))?;
    check(vm.cpu.halted, "not halted")
}
