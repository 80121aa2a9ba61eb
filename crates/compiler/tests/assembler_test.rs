use abi::{Instruction, Machine, Register, RunOutcome, Target};
use compiler::{ParseError, assemble, disassemble, parse_program};

#[test]
fn assembles_semicolon_separated_program() {
    let program = assemble("copy2ax 10; add2ax 5; mul2ax 2; sub2ax 4; div2ax 2; halt").unwrap();
    assert_eq!(program.len(), 6);
    let mut vm = Machine::new();
    let report = vm.execute(&program);
    assert_eq!(report.outcome, RunOutcome::Halted);
    assert_eq!(vm.cpu.regs.ax, 13);
}

#[test]
fn resolves_labels_and_skips_comments() {
    let src = "
        # add 10 to ax per pass while cx counts down
        copy2cx 2
        top: add2ax 10   # loop body
        deccx
        cmpcx 0
        jmpIfNotEqual top
        done:
        halt
    ";
    let program = assemble(src).unwrap();
    assert_eq!(program[4], Instruction::JumpIf(abi::Condition::NotEqual, 1));
    assert_eq!(program[5], Instruction::Halt);

    // The branch is not taken once cx reaches zero, and an untaken branch
    // never moves ip, so the run ends on fuel.
    let config = abi::MachineConfig { fuel: Some(100), ..abi::MachineConfig::default() };
    let mut vm = Machine::with_config(config);
    let report = vm.execute(&program);
    assert_eq!(report.outcome, RunOutcome::OutOfFuel);
    assert_eq!(vm.cpu.regs.ax, 20);
    assert_eq!(vm.cpu.ip, 4);
}

#[test]
fn builds_structured_operands() {
    let program = assemble("storeMem 4 bx; write notes.txt hello there; push cx; incsp").unwrap();
    assert_eq!(program[0], Instruction::StoreMem { addr: 4, reg: Register::Bx });
    assert_eq!(
        program[1],
        Instruction::Write { name: "notes.txt".into(), content: "hello there".into() }
    );
    assert_eq!(program[2], Instruction::Push(Register::Cx));
    assert_eq!(program[3], Instruction::Inc(Target::Sp));
}

#[test]
fn reports_line_numbers() {
    let err = assemble("copy2ax 1\nadd2ax ten").unwrap_err();
    assert!(matches!(err, ParseError::Decode { line: 2, .. }), "{err}");

    let err = assemble("loadMem 3").unwrap_err();
    assert!(matches!(err, ParseError::Syntax { line: 1, .. }));

    let err = assemble("a: halt\na: halt").unwrap_err();
    assert!(matches!(err, ParseError::DuplicateLabel { line: 2, .. }));
}

#[test]
fn unknown_mnemonics_survive_assembly() {
    let program = assemble("frobnicate 3").unwrap();
    assert!(matches!(&program[0], Instruction::Other { op, .. } if op == "frobnicate"));
}

#[test]
fn json_and_text_agree() {
    let text = parse_program("copy2bx 3; loadMem 0 ax; write f x; halt").unwrap();
    let json = parse_program(
        r#"[{"op":"copy2bx","arg":3},{"op":"loadMem","arg":{"addr":0,"reg":"ax"}},
            {"op":"write","arg":{"name":"f","content":"x"}},{"op":"halt"}]"#,
    )
    .unwrap();
    assert_eq!(text, json);
    assert!(matches!(parse_program("[{\"op\": 3}]"), Err(ParseError::Json(_))));
}

#[test]
fn disassembly_reassembles() {
    let src = "copy2ax 7\nswapaxbx\nstoreMem 2 bx\ncd ..\njmpIfLess 0\nhalt";
    let program = assemble(src).unwrap();
    assert_eq!(disassemble(&program), src);
    assert_eq!(assemble(&disassemble(&program)).unwrap(), program);
}

#[test]
fn numeric_looking_names_stay_literal() {
    let program = assemble("write 007 hi; read 007; mkdir 010; cd +5").unwrap();
    assert_eq!(program[1], Instruction::Read("007".into()));
    assert_eq!(program[2], Instruction::Mkdir("010".into()));
    assert_eq!(program[3], Instruction::Cd("+5".into()));

    let mut vm = Machine::new();
    let report = vm.execute(&program[..3]);
    assert!(report.faults.is_empty(), "{:?}", report.faults);
    assert_eq!(vm.output(), ["007: hi"]);
    let names: Vec<String> = vm.fs().ls().unwrap().into_iter().map(|e| e.name).collect();
    assert_eq!(names, ["007", "010"]);

    let mkdir = vec![Instruction::Mkdir("007".into())];
    assert_eq!(assemble(&disassemble(&mkdir)).unwrap(), mkdir);
}

#[test]
fn quoted_write_content_is_kept_verbatim() {
    let program = assemble("write f \"a  #1; b\"; read f # trailing comment").unwrap();
    assert_eq!(program.len(), 2);
    assert_eq!(
        program[0],
        Instruction::Write { name: "f".into(), content: "a  #1; b".into() }
    );

    let mut vm = Machine::new();
    vm.execute(&program);
    assert_eq!(vm.output(), ["f: a  #1; b"]);

    // Unquoted content is still split on `#` and `;` with spaces collapsed.
    let plain = assemble("write g a   b # note").unwrap();
    assert_eq!(plain[0], Instruction::Write { name: "g".into(), content: "a b".into() });

    // Disassembly quotes content that would not survive reassembly.
    assert_eq!(disassemble(&program[..1]), "write f \"a  #1; b\"");
    assert_eq!(assemble(&disassemble(&program)).unwrap(), program);
}
