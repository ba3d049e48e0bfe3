//! ARM32 (A32) assembler
//!
//! A small two-pass assembler for a subset of the ARMv7-A A32
//! instruction set. The first pass tokenizes the source and records
//! label positions in instruction slots; the second pass encodes each
//! slot into a 32-bit little-endian machine word. Branch and
//! pc-relative load offsets are computed as target - current - 2
//! instruction slots, accounting for the two words of pipeline
//! prefetch.

pub mod encode;
pub mod parse;

use std::collections::HashMap;

use thiserror::Error;

use self::encode::{
    branch, branch_exchange, data_processing_imm, data_processing_reg, mov_shifted_imm,
    mov_shifted_reg, multiply, pack_imm12, pop_multiple, push_multiple, single_data_transfer,
    Cond, DpOp, SHIFT_ASR,
};
use self::parse::{parse, Item};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AssemblerError {
    #[error("line {line}: unknown mnemonic '{mnemonic}'")]
    UnknownMnemonic { line: usize, mnemonic: String },
    #[error("line {line}: unknown register '{name}'")]
    UnknownRegister { line: usize, name: String },
    #[error("line {line}: malformed operands '{operands}'")]
    MalformedOperands { line: usize, operands: String },
    #[error("line {line}: malformed directive '.{name}'")]
    MalformedDirective { line: usize, name: String },
    #[error("line {line}: unresolved label '{name}'")]
    UnresolvedLabel { line: usize, name: String },
    #[error("line {line}: immediate {value} cannot be encoded")]
    UnencodableImmediate { line: usize, value: i64 },
    #[error("line {line}: branch target is out of range")]
    BranchOutOfRange { line: usize },
}

/// The supported base mnemonics (before any condition suffix)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mnemonic {
    Add,
    Sub,
    Mov,
    Mvn,
    And,
    Orr,
    Eor,
    Cmp,
    Mul,
    Str,
    Ldr,
    Push,
    Pop,
    B,
    Bl,
    Bx,
    Asr,
}

impl Mnemonic {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "add" => Some(Mnemonic::Add),
            "sub" => Some(Mnemonic::Sub),
            "mov" => Some(Mnemonic::Mov),
            "mvn" => Some(Mnemonic::Mvn),
            "and" => Some(Mnemonic::And),
            "orr" => Some(Mnemonic::Orr),
            "eor" => Some(Mnemonic::Eor),
            "cmp" => Some(Mnemonic::Cmp),
            "mul" => Some(Mnemonic::Mul),
            "str" => Some(Mnemonic::Str),
            "ldr" => Some(Mnemonic::Ldr),
            "push" => Some(Mnemonic::Push),
            "pop" => Some(Mnemonic::Pop),
            "b" => Some(Mnemonic::B),
            "bl" => Some(Mnemonic::Bl),
            "bx" => Some(Mnemonic::Bx),
            "asr" => Some(Mnemonic::Asr),
            _ => None,
        }
    }
}

/// Split an optional two-letter condition suffix off a mnemonic,
/// preferring the longest base mnemonic ("bls" is b+ls, "bleq" is
/// bl+eq). An absent suffix means always (AL).
fn split_mnemonic(text: &str) -> Option<(Mnemonic, Cond)> {
    if let Some(mnemonic) = Mnemonic::from_name(text) {
        return Some((mnemonic, Cond::Al));
    }
    if text.len() > 2 {
        let (stem, suffix) = text.split_at(text.len() - 2);
        if let (Some(mnemonic), Some(cond)) = (Mnemonic::from_name(stem), Cond::from_suffix(suffix))
        {
            return Some((mnemonic, cond));
        }
    }
    None
}

fn parse_register(token: &str) -> Option<u8> {
    match token {
        "fp" => Some(11),
        "ip" => Some(12),
        "sp" => Some(13),
        "lr" => Some(14),
        "pc" => Some(15),
        _ => {
            let n = token.strip_prefix('r')?.parse::<u8>().ok()?;
            (n < 16).then_some(n)
        }
    }
}

/// Parse a `#imm` token (decimal or 0x hexadecimal, optional sign)
fn parse_immediate(token: &str) -> Option<i64> {
    parse_number(token.strip_prefix('#')?)
}

fn parse_number(text: &str) -> Option<i64> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Split an operand string on top-level commas, leaving bracketed
/// address operands and register lists intact
fn split_operands(text: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();
    for ch in text.chars() {
        match ch {
            '[' | '{' => {
                depth += 1;
                current.push(ch);
            }
            ']' | '}' => {
                depth = depth.saturating_sub(1);
                current.push(ch);
            }
            ',' if depth == 0 => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

/// One emitted word of the output stream
#[derive(Debug)]
enum Slot {
    /// A `.word` literal
    Word(u32),
    /// An instruction awaiting encoding in the second pass
    Instr {
        mnemonic: Mnemonic,
        cond: Cond,
        operands: Vec<String>,
        line: usize,
    },
}

/// The second operand of a data-processing instruction
enum Op2 {
    Imm(u32),
    Reg(u8),
}

/// A parsed ldr/str address operand
struct Address {
    base: u8,
    offset: i64,
    pre_index: bool,
    writeback: bool,
}

struct Assembler {
    labels: HashMap<String, usize>,
    slots: Vec<Slot>,
}

impl Assembler {
    fn register(&self, token: &str, line: usize) -> Result<u8, AssemblerError> {
        parse_register(token).ok_or_else(|| AssemblerError::UnknownRegister {
            line,
            name: token.to_string(),
        })
    }

    fn malformed(&self, operands: &[String], line: usize) -> AssemblerError {
        AssemblerError::MalformedOperands {
            line,
            operands: operands.join(", "),
        }
    }

    /// Parse a data-processing second operand (register or rotated
    /// immediate)
    fn op2(&self, token: &str, line: usize) -> Result<Op2, AssemblerError> {
        if token.starts_with('#') {
            let value = parse_immediate(token).ok_or_else(|| AssemblerError::MalformedOperands {
                line,
                operands: token.to_string(),
            })?;
            let packed = u32::try_from(value)
                .ok()
                .and_then(pack_imm12)
                .ok_or(AssemblerError::UnencodableImmediate { line, value })?;
            Ok(Op2::Imm(packed))
        } else {
            Ok(Op2::Reg(self.register(token, line)?))
        }
    }

    /// Look up a label, returning its instruction-slot index
    fn label(&self, token: &str, line: usize) -> Result<usize, AssemblerError> {
        let name = token.strip_prefix('.').unwrap_or(token);
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| AssemblerError::UnresolvedLabel {
                line,
                name: name.to_string(),
            })
    }

    /// Pipeline-adjusted word offset from the instruction at index to
    /// a label
    fn branch_offset(&self, token: &str, index: usize, line: usize) -> Result<i64, AssemblerError> {
        let target = self.label(token, line)?;
        Ok(target as i64 - index as i64 - 2)
    }

    /// Parse `[rn]`, `[rn, #imm]` or `[rn, #imm]!`
    fn bracket_address(&self, token: &str, line: usize) -> Result<Address, AssemblerError> {
        let (inner, writeback) = match token.strip_suffix('!') {
            Some(inner) => (inner, true),
            None => (token, false),
        };
        let inner = inner
            .strip_prefix('[')
            .and_then(|t| t.strip_suffix(']'))
            .ok_or_else(|| AssemblerError::MalformedOperands {
                line,
                operands: token.to_string(),
            })?;
        let mut parts = inner.splitn(2, ',');
        let base = self.register(parts.next().unwrap_or_default().trim(), line)?;
        let offset = match parts.next() {
            Some(imm) => {
                let imm = imm.trim();
                parse_immediate(imm).ok_or_else(|| AssemblerError::MalformedOperands {
                    line,
                    operands: imm.to_string(),
                })?
            }
            None => 0,
        };
        Ok(Address {
            base,
            offset,
            pre_index: true,
            writeback,
        })
    }

    /// Parse the address operands of an ldr/str: bracketed (with
    /// optional post-index immediate) or a pc-relative label
    fn address(
        &self,
        operands: &[String],
        index: usize,
        load: bool,
        line: usize,
    ) -> Result<Address, AssemblerError> {
        match operands {
            [single] if single.starts_with('[') => self.bracket_address(single, line),
            [bracket, post] => {
                let mut address = self.bracket_address(bracket, line)?;
                if address.writeback || address.offset != 0 {
                    return Err(self.malformed(operands, line));
                }
                address.offset =
                    parse_immediate(post).ok_or_else(|| self.malformed(operands, line))?;
                address.pre_index = false;
                Ok(address)
            }
            [label] if load => {
                // pc-relative literal load
                let offset = self.branch_offset(label, index, line)? * 4;
                Ok(Address {
                    base: 15,
                    offset,
                    pre_index: true,
                    writeback: false,
                })
            }
            _ => Err(self.malformed(operands, line)),
        }
    }

    /// Parse a `{r0, r4, lr}` register list into its bitmask
    fn register_list(&self, token: &str, line: usize) -> Result<u16, AssemblerError> {
        let inner = token
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .ok_or_else(|| AssemblerError::MalformedOperands {
                line,
                operands: token.to_string(),
            })?;
        let mut registers = 0u16;
        for part in inner.split(',') {
            let reg = self.register(part.trim(), line)?;
            registers |= 1 << reg;
        }
        Ok(registers)
    }

    fn encode_slot(&self, index: usize, slot: &Slot) -> Result<u32, AssemblerError> {
        let (mnemonic, cond, operands, line) = match slot {
            Slot::Word(value) => return Ok(*value),
            Slot::Instr {
                mnemonic,
                cond,
                operands,
                line,
            } => (*mnemonic, *cond, operands, *line),
        };
        match mnemonic {
            Mnemonic::Add | Mnemonic::Sub | Mnemonic::And | Mnemonic::Orr | Mnemonic::Eor => {
                let op = match mnemonic {
                    Mnemonic::Add => DpOp::Add,
                    Mnemonic::Sub => DpOp::Sub,
                    Mnemonic::And => DpOp::And,
                    Mnemonic::Orr => DpOp::Orr,
                    _ => DpOp::Eor,
                };
                let [rd, rn, op2] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                let rd = self.register(rd, line)?;
                let rn = self.register(rn, line)?;
                Ok(match self.op2(op2, line)? {
                    Op2::Imm(imm12) => data_processing_imm(cond, op, false, rn, rd, imm12),
                    Op2::Reg(rm) => data_processing_reg(cond, op, false, rn, rd, rm),
                })
            }
            Mnemonic::Mov | Mnemonic::Mvn => {
                let op = if mnemonic == Mnemonic::Mov {
                    DpOp::Mov
                } else {
                    DpOp::Mvn
                };
                let [rd, op2] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                let rd = self.register(rd, line)?;
                Ok(match self.op2(op2, line)? {
                    Op2::Imm(imm12) => data_processing_imm(cond, op, false, 0, rd, imm12),
                    Op2::Reg(rm) => data_processing_reg(cond, op, false, 0, rd, rm),
                })
            }
            Mnemonic::Cmp => {
                let [rn, op2] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                let rn = self.register(rn, line)?;
                Ok(match self.op2(op2, line)? {
                    Op2::Imm(imm12) => data_processing_imm(cond, DpOp::Cmp, true, rn, 0, imm12),
                    Op2::Reg(rm) => data_processing_reg(cond, DpOp::Cmp, true, rn, 0, rm),
                })
            }
            Mnemonic::Mul => {
                let [rd, rm, rs] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                Ok(multiply(
                    cond,
                    self.register(rd, line)?,
                    self.register(rm, line)?,
                    self.register(rs, line)?,
                ))
            }
            Mnemonic::Asr => {
                let [rd, rm, amount] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                let rd = self.register(rd, line)?;
                let rm = self.register(rm, line)?;
                if amount.starts_with('#') {
                    let value =
                        parse_immediate(amount).ok_or_else(|| self.malformed(operands, line))?;
                    if !(0..32).contains(&value) {
                        return Err(AssemblerError::UnencodableImmediate { line, value });
                    }
                    Ok(mov_shifted_imm(cond, rd, rm, SHIFT_ASR, value as u32))
                } else {
                    let rs = self.register(amount, line)?;
                    Ok(mov_shifted_reg(cond, rd, rm, SHIFT_ASR, rs))
                }
            }
            Mnemonic::Ldr | Mnemonic::Str => {
                let load = mnemonic == Mnemonic::Ldr;
                let [rd, rest @ ..] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                let rd = self.register(rd, line)?;
                let address = self.address(rest, index, load, line)?;
                let up = address.offset >= 0;
                let magnitude = address.offset.unsigned_abs();
                if magnitude > 0xfff {
                    return Err(AssemblerError::UnencodableImmediate {
                        line,
                        value: address.offset,
                    });
                }
                Ok(single_data_transfer(
                    cond,
                    load,
                    address.pre_index,
                    up,
                    address.writeback,
                    address.base,
                    rd,
                    magnitude as u32,
                ))
            }
            Mnemonic::Push | Mnemonic::Pop => {
                let [list] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                let registers = self.register_list(list, line)?;
                Ok(if mnemonic == Mnemonic::Push {
                    push_multiple(cond, registers)
                } else {
                    pop_multiple(cond, registers)
                })
            }
            Mnemonic::B | Mnemonic::Bl => {
                let [target] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                let offset = self.branch_offset(target, index, line)?;
                if !(-(1 << 23)..(1 << 23)).contains(&offset) {
                    return Err(AssemblerError::BranchOutOfRange { line });
                }
                Ok(branch(cond, mnemonic == Mnemonic::Bl, offset as i32))
            }
            Mnemonic::Bx => {
                let [rm] = operands.as_slice() else {
                    return Err(self.malformed(operands, line));
                };
                Ok(branch_exchange(cond, self.register(rm, line)?))
            }
        }
    }
}

/// Assemble an A32 source stream into machine words, one per
/// instruction (or `.word` directive)
pub fn assemble(source: &str) -> Result<Vec<u32>, AssemblerError> {
    let mut assembler = Assembler {
        labels: HashMap::new(),
        slots: Vec::new(),
    };

    // First pass: record label positions in instruction slots
    for item in parse(source) {
        match item {
            Item::Label { name, .. } => {
                assembler.labels.insert(name, assembler.slots.len());
            }
            Item::Directive { name, args, line } => {
                if name == "word" {
                    let value = args
                        .first()
                        .and_then(|arg| parse_number(arg))
                        .ok_or_else(|| AssemblerError::MalformedDirective {
                            line,
                            name: name.clone(),
                        })?;
                    assembler.slots.push(Slot::Word(value as u32));
                }
                // Other directives (.global, .text, ...) emit nothing
            }
            Item::Instruction {
                mnemonic,
                operands,
                line,
            } => {
                let (mnemonic, cond) = split_mnemonic(&mnemonic).ok_or_else(|| {
                    AssemblerError::UnknownMnemonic {
                        line,
                        mnemonic: mnemonic.clone(),
                    }
                })?;
                assembler.slots.push(Slot::Instr {
                    mnemonic,
                    cond,
                    operands: split_operands(&operands),
                    line,
                });
            }
        }
    }

    // Second pass: encode each slot, resolving label offsets
    assembler
        .slots
        .iter()
        .enumerate()
        .map(|(index, slot)| assembler.encode_slot(index, slot))
        .collect()
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn check_data_processing_immediates() {
        let words = assemble("mov r0, #12\nsub r2, r0, #1\ncmp r2, #0").unwrap();
        assert_eq!(words, vec![0xe3a0_000c, 0xe240_2001, 0xe352_0000]);
    }

    #[test]
    fn check_data_processing_registers() {
        let words = assemble("mov r0, r1\nadd r2, r0, r1\nmvn r3, r2").unwrap();
        assert_eq!(words, vec![0xe1a0_0001, 0xe080_2001, 0xe1e0_3002]);
    }

    #[test]
    fn check_condition_suffixes() {
        let words = assemble("movgt r0, #1\nbxal lr").unwrap();
        assert_eq!(words, vec![0xc3a0_0001, 0xe12f_ff1e]);
    }

    #[test]
    fn check_backward_branch_offset() {
        // The branch at slot 2 targets slot 0: offset 0 - 2 - 2 = -4
        let words = assemble("loop:\nmov r0, #1\nmov r1, #2\nbne loop").unwrap();
        assert_eq!(words[2], 0x1aff_fffc);
    }

    #[test]
    fn check_forward_branch_offset() {
        let words = assemble("b done\nmov r0, #1\ndone:\nbx lr").unwrap();
        // Target slot 2 from slot 0: offset 0
        assert_eq!(words[0], 0xea00_0000);
    }

    #[test]
    fn check_branch_and_link() {
        let words = assemble("bl fn\nbx lr\nfn:\nbx lr").unwrap();
        assert_eq!(words[0], 0xeb00_0000);
    }

    #[test]
    fn check_load_store_addressing_modes() {
        let words = assemble(
            "str r2, [sp, #-4]!\nldr r7, [sp], #4\nldr r0, [r1]\nstr r0, [r1, #4]",
        )
        .unwrap();
        assert_eq!(
            words,
            vec![0xe52d_2004, 0xe49d_7004, 0xe591_0000, 0xe581_0004]
        );
    }

    #[test]
    fn check_ldr_literal_and_word_directive() {
        let words = assemble("ldr r0, value\nbx lr\nvalue:\n.word 0x2a").unwrap();
        // Slot 2 from slot 0: offset 0 words, so [pc, #0]
        assert_eq!(words, vec![0xe59f_0000, 0xe12f_ff1e, 0x0000_002a]);
    }

    #[test]
    fn check_push_pop_register_lists() {
        let words = assemble("push {r4, lr}\npop {r4, lr}").unwrap();
        assert_eq!(words, vec![0xe92d_4010, 0xe8bd_4010]);
    }

    #[test]
    fn check_mul_and_asr() {
        let words = assemble("mul r3, r0, r0\nasr r2, r0, #1\nasr r2, r0, r3").unwrap();
        assert_eq!(words, vec![0xe003_0090, 0xe1a0_20c0, 0xe1a0_2350]);
    }

    #[test]
    fn check_unknown_mnemonic() {
        assert_eq!(
            assemble("frob r0, r1"),
            Err(AssemblerError::UnknownMnemonic {
                line: 1,
                mnemonic: "frob".to_string()
            })
        );
    }

    #[test]
    fn check_unknown_register() {
        assert_eq!(
            assemble("mov r20, #1"),
            Err(AssemblerError::UnknownRegister {
                line: 1,
                name: "r20".to_string()
            })
        );
    }

    #[test]
    fn check_unresolved_label() {
        assert_eq!(
            assemble("b nowhere"),
            Err(AssemblerError::UnresolvedLabel {
                line: 1,
                name: "nowhere".to_string()
            })
        );
    }

    #[test]
    fn check_unencodable_immediate() {
        assert_eq!(
            assemble("mov r0, #0x102"),
            Err(AssemblerError::UnencodableImmediate {
                line: 1,
                value: 0x102
            })
        );
    }

    #[test]
    fn check_malformed_operands() {
        assert!(matches!(
            assemble("add r0, r1"),
            Err(AssemblerError::MalformedOperands { line: 1, .. })
        ));
        assert!(matches!(
            assemble("str r0, label"),
            Err(AssemblerError::MalformedOperands { line: 1, .. })
        ));
    }

    #[test]
    fn check_dot_label_and_bare_reference_match() {
        let words = assemble(".loop:\nmov r0, #0\nb loop").unwrap();
        assert_eq!(words[1], 0xeaff_fffd);
    }
}
