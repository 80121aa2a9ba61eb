use simos_core::{console::MAX_TICKS_PER_COMMAND, run_suite, Console};

fn lines(console: &mut Console, cmd: &str) -> Vec<String> {
    console.run_command(cmd).lines
}

#[test]
fn boot_self_check_passes() {
    let report = run_suite();
    assert!(report.contains("REGISTER_ARITHMETIC ... PASS"), "{}", report);
}

#[test]
fn filesystem_verbs() {
    let mut c = Console::new();
    assert!(lines(&mut c, "mkdir docs").is_empty());
    assert!(lines(&mut c, "cd docs").is_empty());
    assert!(lines(&mut c, "write notes.txt hello   there").is_empty());
    assert_eq!(lines(&mut c, "read notes.txt"), vec!["notes.txt: hello   there"]);
    assert_eq!(lines(&mut c, "pwd"), vec!["/docs"]);
    assert_eq!(lines(&mut c, "ls"), vec!["/docs", "notes.txt"]);
    assert!(lines(&mut c, "rm notes.txt").is_empty());
    assert_eq!(lines(&mut c, "cd .."), Vec::<String>::new());
    assert_eq!(lines(&mut c, "ls"), vec!["/", "[DIR] docs"]);
}

#[test]
fn errors_are_reported_not_raised() {
    let mut c = Console::new();
    assert_eq!(lines(&mut c, "cd nowhere"), vec!["Error: no such file or directory: nowhere"]);
    assert_eq!(lines(&mut c, "frobnicate now"), vec!["Unknown command: frobnicate"]);
    assert_eq!(lines(&mut c, "kill abc"), vec!["Error: usage: kill <pid>"]);
    assert_eq!(lines(&mut c, "write"), vec!["Error: usage: write <name> <content...>"]);
    assert!(lines(&mut c, "").is_empty());
}

#[test]
fn clear_asks_the_host_to_wipe() {
    let mut c = Console::new();
    let out = c.run_command("clear");
    assert!(out.clear);
    assert!(out.lines.is_empty());
}

#[test]
fn run_reports_outcome_and_registers() {
    let mut c = Console::new();
    let out = lines(&mut c, "run copy2ax 7; printax; halt");
    assert_eq!(out, vec!["AX: 7", "halted after 3 steps"]);
    assert_eq!(c.snapshot().ax, 7);
    assert!(lines(&mut c, "regs")[0].starts_with("AX: 7 BX: 0 CX: 0 SP: 0 IP: 2"));

    assert_eq!(lines(&mut c, "run copy2ax 1"), vec!["cpu is halted; use `reset` first"]);
    assert_eq!(lines(&mut c, "reset"), vec!["cpu reset"]);
    assert_eq!(lines(&mut c, "run copy2ax 1"), vec!["completed after 1 steps"]);
}

#[test]
fn memory_inspection() {
    let mut c = Console::new();
    lines(&mut c, "run copy2bx 42; storeMem 3 bx");
    assert_eq!(lines(&mut c, "mem 3"), vec!["Memory[3] = 42"]);
    assert_eq!(
        lines(&mut c, "mem 999"),
        vec!["Error: memory read out of bounds: 999 (size 256)"]
    );
}

#[test]
fn spawn_tick_ps_kill() {
    let mut c = Console::new();
    assert_eq!(lines(&mut c, "ps"), vec!["No active processes"]);
    assert_eq!(lines(&mut c, "spawn copy2ax 1; incax; incax"), vec!["spawned pid 1"]);
    assert_eq!(lines(&mut c, "spawn copy2bx 5"), vec!["spawned pid 2"]);

    assert_eq!(lines(&mut c, "tick"), vec!["tick 1: 2 dispatched"]);
    assert_eq!(
        lines(&mut c, "tick 2"),
        vec!["tick 2: 1 dispatched", "pid 2 halted", "tick 3: 1 dispatched"]
    );
    assert_eq!(
        lines(&mut c, "ps"),
        vec!["PID: 1, State: ready, IP: 3", "PID: 2, State: halted, IP: 1"]
    );
    assert_eq!(lines(&mut c, "kill 1"), vec!["killed pid 1"]);
    assert_eq!(lines(&mut c, "kill 9"), vec!["Error: no such process: 9"]);
    assert_eq!(c.machine().processes().ready_count(), 0);
}

#[test]
fn background_tick_output_is_flushed_on_next_command() {
    let mut c = Console::new();
    lines(&mut c, "spawn copy2cx 4; printcx");
    assert!(c.tick().is_empty());
    c.machine_mut().tick();
    assert_eq!(lines(&mut c, "pwd"), vec!["CX: 4", "/"]);
}

#[test]
fn quoted_content_matches_program_writes() {
    let mut c = Console::new();
    lines(&mut c, "write a \"x  #1; y\"");
    lines(&mut c, "run write b \"x  #1; y\"");
    assert_eq!(lines(&mut c, "read a"), vec!["a: x  #1; y"]);
    assert_eq!(lines(&mut c, "read b"), vec!["b: x  #1; y"]);
}

#[test]
fn tick_count_is_capped() {
    let mut c = Console::new();
    lines(&mut c, "spawn incax");
    assert_eq!(
        lines(&mut c, "tick 18446744073709551615"),
        vec!["Error: tick count 18446744073709551615 exceeds the limit of 10000"]
    );
    assert_eq!(c.machine().processes().ticks(), 0);
    let out = lines(&mut c, &format!("tick {}", MAX_TICKS_PER_COMMAND));
    assert_eq!(out.len() as u64, MAX_TICKS_PER_COMMAND + 1);
}
