//! RV32I base integer instruction set
//!
//! Mnemonic groups for the instructions defined in chapter 2 of the
//! unprivileged specification version 20191213, plus the Zicsr
//! register operations used by the test harness.

/// If the branch is taken, set pc = pc + offset, where offset is a
/// multiple of two; else set pc = pc + 4. The offset is 13 bits long.
///
/// The condition for branch taken depends on the mnemonic:
/// - "beq": src1 == src2
/// - "bne": src1 != src2
/// - "blt": src1 < src2 as signed integers
/// - "bge": src1 >= src2 as signed integers
/// - "bltu": src1 < src2 as unsigned integers
/// - "bgeu": src1 >= src2 as unsigned integers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
}

/// Load the data at address base + offset into dest. The offset is 12
/// bits long.
///
/// The size of data, and the way it is loaded into dest, depends on
/// the mnemonic:
/// - "lb": load a byte, sign extend in dest
/// - "lh": load a halfword, sign extend in dest
/// - "lw": load a word
/// - "lbu": load a byte, zero extend in dest
/// - "lhu": load a halfword, zero extend in dest
///
/// Loads do not need to be aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Load {
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
}

/// Store the data in src to address base + offset. The offset is 12
/// bits long.
///
/// The mnemonic determines the width of data that is stored to memory:
/// - "sb": store a byte
/// - "sh": store a halfword
/// - "sw": store a word
///
/// Stores do not need to be aligned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Store {
    Sb,
    Sh,
    Sw,
}

/// Perform an operation between the value in register src and the
/// sign-extended 12-bit i_immediate, placing the result in dest:
/// - "addi": dest = src + i_immediate
/// - "slti": dest = (src < i_immediate) ? 1 : 0, signed comparison
/// - "sltiu": dest = (src < i_immediate) ? 1 : 0, unsigned comparison
/// - "xori": dest = src ^ i_immediate
/// - "ori": dest = src | i_immediate
/// - "andi": dest = src & i_immediate
/// - "slli": dest = src << (0x1f & i_immediate)
/// - "srli": dest = src >> (0x1f & i_immediate) (logical)
/// - "srai": dest = src >> (0x1f & i_immediate) (arithmetic)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegImm {
    Addi,
    Slti,
    Sltiu,
    Xori,
    Ori,
    Andi,
    Slli,
    Srli,
    Srai,
}

/// Perform an operation between the values in src1 and src2 and place
/// the result in dest:
/// - "add": dest = src1 + src2
/// - "sub": dest = src1 - src2
/// - "slt": dest = (src1 < src2) ? 1 : 0, signed comparison
/// - "sltu": dest = (src1 < src2) ? 1 : 0, unsigned comparison
/// - "xor": dest = src1 ^ src2
/// - "or": dest = src1 | src2
/// - "and": dest = src1 & src2
/// - "sll": dest = src1 << (0x1f & src2)
/// - "srl": dest = src1 >> (0x1f & src2) (logical)
/// - "sra": dest = src1 >> (0x1f & src2) (arithmetic)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegReg {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
}

/// Zicsr register operations. The register variants take the operand
/// from rs1; the immediate variants use the rs1 field itself as a
/// 5-bit zero-extended immediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsrOp {
    Csrrw,
    Csrrs,
    Csrrc,
    Csrrwi,
    Csrrsi,
    Csrrci,
}
