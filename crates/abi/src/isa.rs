use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Register {
    Ax,
    Bx,
    Cx,
}

impl Register {
    pub const ALL: [Register; 3] = [Register::Ax, Register::Bx, Register::Cx];

    pub fn name(self) -> &'static str {
        match self {
            Register::Ax => "ax",
            Register::Bx => "bx",
            Register::Cx => "cx",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ax" => Some(Register::Ax),
            "bx" => Some(Register::Bx),
            "cx" => Some(Register::Cx),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A general-purpose register or the stack pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Reg(Register),
    Sp,
}

impl Target {
    pub fn name(self) -> &'static str {
        match self {
            Target::Reg(r) => r.name(),
            Target::Sp => "sp",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sp" => Some(Target::Sp),
            _ => Register::parse(s).map(Target::Reg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div, // floors toward negative infinity
    Mod, // sign follows the dividend
}

impl ArithOp {
    pub fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Mod => "mod",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(ArithOp::Add),
            "sub" => Some(ArithOp::Sub),
            "mul" => Some(ArithOp::Mul),
            "div" => Some(ArithOp::Div),
            "mod" => Some(ArithOp::Mod),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Equal,
    NotEqual,
    Greater,
    Less,
}

impl Condition {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Condition::Equal => "jmpIfEqual",
            Condition::NotEqual => "jmpIfNotEqual",
            Condition::Greater => "jmpIfGreater",
            Condition::Less => "jmpIfLess",
        }
    }
}

/// The `arg` half of an external `{ "op": ..., "arg": ... }` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Int(i64),
    Text(String),
    Memory { addr: i64, reg: Register },
    File { name: String, content: String },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Int(v) => write!(f, "{}", v),
            Operand::Text(s) => f.write_str(s),
            Operand::Memory { addr, reg } => write!(f, "{} {}", addr, reg),
            Operand::File { name, content } => {
                let plain = !content.contains(['#', ';', '"'])
                    && content.split_whitespace().collect::<Vec<_>>().join(" ") == *content;
                if plain {
                    write!(f, "{} {}", name, content)
                } else {
                    write!(f, "{} \"{}\"", name, content)
                }
            }
        }
    }
}

/// Wire form of an instruction: a mnemonic plus an optional operand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInstruction {
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<Operand>,
}

impl RawInstruction {
    pub fn new(op: impl Into<String>, arg: Option<Operand>) -> Self {
        Self { op: op.into(), arg }
    }
}

impl fmt::Display for RawInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.arg {
            Some(arg) => write!(f, "{} {}", self.op, arg),
            None => f.write_str(&self.op),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid operand for {op}: {reason}")]
pub struct DecodeError {
    pub op: String,
    pub reason: String,
}

/// Decoded instruction. Each built-in mnemonic maps to one variant; anything
/// else is kept as `Other` and resolved against the machine's registered
/// opcodes when it is dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawInstruction", into = "RawInstruction")]
pub enum Instruction {
    // --- Data Transfer ---
    Load(Target, i64), // copy2ax, copy2bx, copy2cx, copy2sp
    SetIp(usize),      // copy2ip
    Move { src: Register, dst: Register },
    Swap(Register, Register),

    // --- Arithmetic ---
    Arith(ArithOp, Register, i64),
    Inc(Target),
    Dec(Target),

    // --- Control Flow ---
    Cmp(Register, i64),
    JumpIf(Condition, usize),
    Jump(usize),
    Halt,
    Padding(usize),

    // --- Memory ---
    StoreMem { addr: i64, reg: Register },
    LoadMem { addr: i64, reg: Register },
    PrintMem(i64),
    ClearMem,

    // --- Stack ---
    Push(Register),
    Pop(Register),
    Peek,
    PrintStack,

    // --- Filesystem ---
    Mkdir(String),
    Cd(String),
    Ls,
    Write { name: String, content: String },
    Read(String),
    Rm(String),

    // --- Diagnostics ---
    Print(Target),
    Banner,
    BiosInterrupt,
    DisableInterrupt,

    Other { op: String, arg: Option<Operand> },
}

struct Args<'a> {
    op: &'a str,
    arg: Option<Operand>,
}

impl Args<'_> {
    fn err(&self, reason: impl Into<String>) -> DecodeError {
        DecodeError {
            op: self.op.to_string(),
            reason: reason.into(),
        }
    }

    fn int(&self) -> Result<i64, DecodeError> {
        match &self.arg {
            Some(Operand::Int(v)) => Ok(*v),
            Some(Operand::Text(s)) => s
                .trim()
                .parse()
                .map_err(|_| self.err(format!("expected integer, got {:?}", s))),
            Some(other) => Err(self.err(format!("expected integer, got `{}`", other))),
            None => Err(self.err("missing integer operand")),
        }
    }

    fn address(&self) -> Result<usize, DecodeError> {
        let v = self.int()?;
        usize::try_from(v).map_err(|_| self.err(format!("negative address {}", v)))
    }

    fn text(&self) -> Result<String, DecodeError> {
        match &self.arg {
            Some(Operand::Text(s)) => Ok(s.clone()),
            Some(Operand::Int(v)) => Ok(v.to_string()),
            Some(other) => Err(self.err(format!("expected a name, got `{}`", other))),
            None => Err(self.err("missing name operand")),
        }
    }

    fn register(&self) -> Result<Register, DecodeError> {
        let name = self.text()?;
        Register::parse(&name).ok_or_else(|| self.err(format!("unknown register {:?}", name)))
    }

    fn memory(&self) -> Result<(i64, Register), DecodeError> {
        match &self.arg {
            Some(Operand::Memory { addr, reg }) => Ok((*addr, *reg)),
            _ => Err(self.err("expected {addr, reg}")),
        }
    }

    fn file(&self) -> Result<(String, String), DecodeError> {
        match &self.arg {
            Some(Operand::File { name, content }) => Ok((name.clone(), content.clone())),
            _ => Err(self.err("expected {name, content}")),
        }
    }
}

impl Instruction {
    pub fn decode(op: &str, arg: Option<Operand>) -> Result<Self, DecodeError> {
        let args = Args { op, arg };
        let instr = match op {
            "copy2ip" => Instruction::SetIp(args.address()?),
            "jmp" => Instruction::Jump(args.address()?),
            "jmpIfEqual" => Instruction::JumpIf(Condition::Equal, args.address()?),
            "jmpIfNotEqual" => Instruction::JumpIf(Condition::NotEqual, args.address()?),
            "jmpIfGreater" => Instruction::JumpIf(Condition::Greater, args.address()?),
            "jmpIfLess" => Instruction::JumpIf(Condition::Less, args.address()?),
            "halt" => Instruction::Halt,
            "padding" => Instruction::Padding(args.address()?),
            "storeMem" | "StoreMem" => {
                let (addr, reg) = args.memory()?;
                Instruction::StoreMem { addr, reg }
            }
            "loadMem" | "LoadMem" => {
                let (addr, reg) = args.memory()?;
                Instruction::LoadMem { addr, reg }
            }
            "printMem" => Instruction::PrintMem(args.int()?),
            "clearMem" => Instruction::ClearMem,
            "push" => Instruction::Push(args.register()?),
            "pop" => Instruction::Pop(args.register()?),
            "peek" => Instruction::Peek,
            "printStack" => Instruction::PrintStack,
            "mkdir" => Instruction::Mkdir(args.text()?),
            "cd" => Instruction::Cd(args.text()?),
            "ls" => Instruction::Ls,
            "write" => {
                let (name, content) = args.file()?;
                Instruction::Write { name, content }
            }
            "read" => Instruction::Read(args.text()?),
            "rm" => Instruction::Rm(args.text()?),
            "magicstr" => Instruction::Banner,
            "biosInterrupt" => Instruction::BiosInterrupt,
            "disableInterrupt" | "disableInterupt" => Instruction::DisableInterrupt,
            _ => match decode_family(&args)? {
                Some(instr) => instr,
                None => Instruction::Other {
                    op: op.to_string(),
                    arg: args.arg,
                },
            },
        };
        Ok(instr)
    }

    /// Mnemonics built from a register name: `copy2ax`, `copybx2cx`,
    /// `swapaxbx`, `add2ax`, `incsp`, `cmpcx`, `printbx`, ...
    pub fn mnemonic(&self) -> String {
        match self {
            Instruction::Load(t, _) => format!("copy2{}", t.name()),
            Instruction::SetIp(_) => "copy2ip".into(),
            Instruction::Move { src, dst } => format!("copy{}2{}", src, dst),
            Instruction::Swap(a, b) => format!("swap{}{}", a, b),
            Instruction::Arith(op, reg, _) => format!("{}2{}", op.name(), reg),
            Instruction::Inc(t) => format!("inc{}", t.name()),
            Instruction::Dec(t) => format!("dec{}", t.name()),
            Instruction::Cmp(reg, _) => format!("cmp{}", reg),
            Instruction::JumpIf(cond, _) => cond.mnemonic().into(),
            Instruction::Jump(_) => "jmp".into(),
            Instruction::Halt => "halt".into(),
            Instruction::Padding(_) => "padding".into(),
            Instruction::StoreMem { .. } => "storeMem".into(),
            Instruction::LoadMem { .. } => "loadMem".into(),
            Instruction::PrintMem(_) => "printMem".into(),
            Instruction::ClearMem => "clearMem".into(),
            Instruction::Push(_) => "push".into(),
            Instruction::Pop(_) => "pop".into(),
            Instruction::Peek => "peek".into(),
            Instruction::PrintStack => "printStack".into(),
            Instruction::Mkdir(_) => "mkdir".into(),
            Instruction::Cd(_) => "cd".into(),
            Instruction::Ls => "ls".into(),
            Instruction::Write { .. } => "write".into(),
            Instruction::Read(_) => "read".into(),
            Instruction::Rm(_) => "rm".into(),
            Instruction::Print(t) => format!("print{}", t.name()),
            Instruction::Banner => "magicstr".into(),
            Instruction::BiosInterrupt => "biosInterrupt".into(),
            Instruction::DisableInterrupt => "disableInterrupt".into(),
            Instruction::Other { op, .. } => op.clone(),
        }
    }

    pub fn operand(&self) -> Option<Operand> {
        match self {
            Instruction::Load(_, v) | Instruction::Arith(_, _, v) | Instruction::Cmp(_, v) => {
                Some(Operand::Int(*v))
            }
            Instruction::SetIp(k)
            | Instruction::JumpIf(_, k)
            | Instruction::Jump(k)
            | Instruction::Padding(k) => Some(Operand::Int(*k as i64)),
            Instruction::StoreMem { addr, reg } | Instruction::LoadMem { addr, reg } => {
                Some(Operand::Memory {
                    addr: *addr,
                    reg: *reg,
                })
            }
            Instruction::PrintMem(addr) => Some(Operand::Int(*addr)),
            Instruction::Push(reg) | Instruction::Pop(reg) => {
                Some(Operand::Text(reg.name().to_string()))
            }
            Instruction::Mkdir(name)
            | Instruction::Cd(name)
            | Instruction::Read(name)
            | Instruction::Rm(name) => Some(Operand::Text(name.clone())),
            Instruction::Write { name, content } => Some(Operand::File {
                name: name.clone(),
                content: content.clone(),
            }),
            Instruction::Other { arg, .. } => arg.clone(),
            _ => None,
        }
    }
}

fn decode_family(args: &Args<'_>) -> Result<Option<Instruction>, DecodeError> {
    let op = args.op;
    if let Some(target) = op.strip_prefix("copy2").and_then(Target::parse) {
        return Ok(Some(Instruction::Load(target, args.int()?)));
    }
    if let Some((src, dst)) = op.strip_prefix("copy").and_then(|rest| rest.split_once('2')) {
        if let (Some(src), Some(dst)) = (Register::parse(src), Register::parse(dst)) {
            if src != dst {
                return Ok(Some(Instruction::Move { src, dst }));
            }
        }
    }
    if let Some(rest) = op.strip_prefix("swap") {
        let a = rest.get(..2).and_then(Register::parse);
        let b = rest.get(2..).and_then(Register::parse);
        if let (Some(a), Some(b)) = (a, b) {
            if a != b {
                return Ok(Some(Instruction::Swap(a, b)));
            }
        }
    }
    if let Some((name, reg)) = op.split_once('2') {
        if let (Some(arith), Some(reg)) = (ArithOp::parse(name), Register::parse(reg)) {
            return Ok(Some(Instruction::Arith(arith, reg, args.int()?)));
        }
    }
    if let Some(target) = op.strip_prefix("inc").and_then(Target::parse) {
        return Ok(Some(Instruction::Inc(target)));
    }
    if let Some(target) = op.strip_prefix("dec").and_then(Target::parse) {
        return Ok(Some(Instruction::Dec(target)));
    }
    if let Some(reg) = op.strip_prefix("cmp").and_then(Register::parse) {
        return Ok(Some(Instruction::Cmp(reg, args.int()?)));
    }
    if let Some(target) = op.strip_prefix("print").and_then(Target::parse) {
        return Ok(Some(Instruction::Print(target)));
    }
    Ok(None)
}

impl TryFrom<RawInstruction> for Instruction {
    type Error = DecodeError;

    fn try_from(raw: RawInstruction) -> Result<Self, Self::Error> {
        Instruction::decode(&raw.op, raw.arg)
    }
}

impl From<Instruction> for RawInstruction {
    fn from(instr: Instruction) -> Self {
        RawInstruction::new(instr.mnemonic(), instr.operand())
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand() {
            Some(arg) => write!(f, "{} {}", self.mnemonic(), arg),
            None => f.write_str(&self.mnemonic()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_register_families() {
        let cases = [
            ("copy2sp", Some(Operand::Int(4)), Instruction::Load(Target::Sp, 4)),
            ("copybx2cx", None, Instruction::Move { src: Register::Bx, dst: Register::Cx }),
            ("swapaxcx", None, Instruction::Swap(Register::Ax, Register::Cx)),
            ("mod2bx", Some(Operand::Int(3)), Instruction::Arith(ArithOp::Mod, Register::Bx, 3)),
            ("decsp", None, Instruction::Dec(Target::Sp)),
            ("cmpcx", Some(Operand::Text("7".into())), Instruction::Cmp(Register::Cx, 7)),
            ("printsp", None, Instruction::Print(Target::Sp)),
        ];
        for (op, arg, expected) in cases {
            let instr = Instruction::decode(op, arg).unwrap();
            assert_eq!(instr, expected);
            assert_eq!(instr.mnemonic(), op);
        }
    }

    #[test]
    fn unknown_mnemonics_are_kept() {
        let instr = Instruction::decode("copyax2ax", None).unwrap();
        assert_eq!(instr, Instruction::Other { op: "copyax2ax".into(), arg: None });
        let instr = Instruction::decode("swapéé", None).unwrap();
        assert!(matches!(instr, Instruction::Other { .. }));
    }

    #[test]
    fn rejects_bad_operands() {
        assert!(Instruction::decode("add2ax", Some(Operand::Text("ten".into()))).is_err());
        assert!(Instruction::decode("jmp", Some(Operand::Int(-1))).is_err());
        assert!(Instruction::decode("push", Some(Operand::Text("dx".into()))).is_err());
        assert!(Instruction::decode("storeMem", Some(Operand::Int(3))).is_err());
    }
}
