// Program front end.
// Turns text listings (`copy2ax 10; add2ax 5; halt`) or JSON arrays of
// `{ "op", "arg" }` objects into abi instructions.

use std::collections::HashMap;

use abi::{DecodeError, Instruction, Operand};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: {source}")]
    Decode { line: usize, source: DecodeError },
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    #[error("line {line}: duplicate label `{label}`")]
    DuplicateLabel { line: usize, label: String },
    #[error("malformed JSON program: {0}")]
    Json(#[from] serde_json::Error),
}

struct Statement<'a> {
    line: usize,
    op: &'a str,
    /// Raw text after the mnemonic, for operands that keep their spacing.
    rest: &'a str,
    args: Vec<&'a str>,
}

/// Picks the JSON reader when the source looks like an array.
pub fn parse_program(source: &str) -> Result<Vec<Instruction>, ParseError> {
    if source.trim_start().starts_with('[') {
        assemble_json(source)
    } else {
        assemble(source)
    }
}

pub fn assemble_json(source: &str) -> Result<Vec<Instruction>, ParseError> {
    Ok(serde_json::from_str(source)?)
}

/// One statement per line or per `;`. `#` comments run to end of line.
/// `name:` defines a label that jump operands may use in place of an index.
/// Inside double quotes `;` and `#` are plain text, so
/// `write log "a  #1; b"` stores `a  #1; b` verbatim.
pub fn assemble(source: &str) -> Result<Vec<Instruction>, ParseError> {
    // Pass 1: split statements and record label positions
    let mut labels: HashMap<&str, usize> = HashMap::new();
    let mut statements = Vec::new();
    for (idx, raw_line) in source.lines().enumerate() {
        let line = idx + 1;
        for chunk in split_statements(raw_line) {
            let mut text = chunk.trim();
            while let Some((label, rest)) = first_token(text)
                .and_then(|(head, rest)| head.strip_suffix(':').map(|label| (label, rest)))
            {
                if label.is_empty() {
                    return Err(ParseError::Syntax {
                        line,
                        reason: "empty label".into(),
                    });
                }
                if labels.insert(label, statements.len()).is_some() {
                    return Err(ParseError::DuplicateLabel {
                        line,
                        label: label.to_string(),
                    });
                }
                text = rest;
            }
            if let Some((op, rest)) = first_token(text) {
                statements.push(Statement {
                    line,
                    op,
                    rest,
                    args: rest.split_whitespace().collect(),
                });
            }
        }
    }

    // Pass 2: build operands and decode
    statements
        .iter()
        .map(|stmt| {
            let arg = operand(stmt, &labels)?;
            Instruction::decode(stmt.op, arg).map_err(|source| ParseError::Decode {
                line: stmt.line,
                source,
            })
        })
        .collect()
}

/// Inverse of `assemble` for display: one instruction per line.
pub fn disassemble(program: &[Instruction]) -> String {
    program
        .iter()
        .map(|instr| instr.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

fn operand(stmt: &Statement<'_>, labels: &HashMap<&str, usize>) -> Result<Option<Operand>, ParseError> {
    let args = &stmt.args;
    let operand = match stmt.op {
        "storeMem" | "StoreMem" | "loadMem" | "LoadMem" => {
            let &[addr, reg] = args.as_slice() else {
                return Err(ParseError::Syntax {
                    line: stmt.line,
                    reason: format!("expected `{} <addr> <reg>`", stmt.op),
                });
            };
            let addr = addr.parse().map_err(|_| ParseError::Syntax {
                line: stmt.line,
                reason: format!("bad address {:?}", addr),
            })?;
            let reg = abi::Register::parse(reg).ok_or_else(|| ParseError::Syntax {
                line: stmt.line,
                reason: format!("unknown register {:?}", reg),
            })?;
            Some(Operand::Memory { addr, reg })
        }
        "write" => {
            let Some((name, content)) = first_token(stmt.rest) else {
                return Err(ParseError::Syntax {
                    line: stmt.line,
                    reason: "expected `write <name> <content...>`".into(),
                });
            };
            let content = match unquote(content) {
                Some(quoted) => quoted.to_string(),
                None => content.split_whitespace().collect::<Vec<_>>().join(" "),
            };
            Some(Operand::File {
                name: name.to_string(),
                content,
            })
        }
        // Names and registers stay text: `read 007` must not become `read 7`.
        "mkdir" | "cd" | "read" | "rm" | "push" | "pop" => match args.as_slice() {
            [] => None,
            _ => Some(Operand::Text(args.join(" "))),
        },
        "jmp" | "jmpIfEqual" | "jmpIfNotEqual" | "jmpIfGreater" | "jmpIfLess" | "copy2ip" => {
            match args.as_slice() {
                &[target] => Some(match labels.get(target) {
                    Some(&pos) => Operand::Int(pos as i64),
                    None => scalar(target),
                }),
                _ => generic(args),
            }
        }
        _ => generic(args),
    };
    Ok(operand)
}

fn generic(args: &[&str]) -> Option<Operand> {
    match args {
        [] => None,
        [single] => Some(scalar(single)),
        many => Some(Operand::Text(many.join(" "))),
    }
}

fn scalar(token: &str) -> Operand {
    match token.parse() {
        Ok(v) => Operand::Int(v),
        Err(_) => Operand::Text(token.to_string()),
    }
}

/// Strips one pair of surrounding double quotes.
pub fn unquote(text: &str) -> Option<&str> {
    text.trim()
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
}

fn first_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    if text.is_empty() {
        return None;
    }
    Some(match text.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (text, ""),
    })
}

/// Splits a line on `;` and drops a trailing `#` comment, ignoring both
/// inside double quotes.
fn split_statements(line: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut quoted = false;
    for (i, c) in line.char_indices() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                chunks.push(&line[start..i]);
                start = i + 1;
            }
            '#' if !quoted => {
                chunks.push(&line[start..i]);
                return chunks;
            }
            _ => {}
        }
    }
    chunks.push(&line[start..]);
    chunks
}
