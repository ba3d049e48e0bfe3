//! Instruction-word builders
//!
//! Pack RV32I instructions into their 32-bit encodings. The test
//! suites use these to author small programs directly in memory
//! without going through an assembler. Register arguments are
//! register indices; offsets and immediates are taken as signed values
//! and truncated to the width of their field.

use crate::utils::{extract_field, interpret_i32_as_unsigned, mask};

use super::opcodes::*;

/// Make an I-type instruction. Only produces a valid I-type
/// instruction if the arguments are in range.
pub fn itype(imm: u32, rs1: u8, funct3: u32, rd: u8, opcode: u32) -> u32 {
    (imm & mask::<u32>(12)) << 20 | u32::from(rs1) << 15 | funct3 << 12 | u32::from(rd) << 7 | opcode
}

/// Make a U- or J-type instruction (if you are making a J-type
/// instruction, make sure to construct the immediate field correctly
/// first, e.g. in [`jal`])
pub fn ujtype(imm: u32, rd: u8, opcode: u32) -> u32 {
    (imm & mask::<u32>(20)) << 12 | u32::from(rd) << 7 | opcode
}

/// Make an R-, S- or B-type instruction. These instructions have the
/// same number of fields of the same size. The meaning of a and b is:
///
/// R-type: a = funct7, b = rd
/// S-type: a = imm[11:5], b = imm[4:0]
/// B-type: a = imm[12] ++ imm[10:5], b = imm[4:1] ++ imm[11]
pub fn rstype(a: u32, rs2: u8, rs1: u8, funct3: u32, b: u32, opcode: u32) -> u32 {
    a << 25 | u32::from(rs2) << 20 | u32::from(rs1) << 15 | funct3 << 12 | b << 7 | opcode
}

fn btype(funct3: u32, rs1: u8, rs2: u8, offset: i32) -> u32 {
    let imm = interpret_i32_as_unsigned(offset);
    let a = extract_field(imm, 12, 12) << 6 | extract_field(imm, 10, 5);
    let b = extract_field(imm, 4, 1) << 1 | extract_field(imm, 11, 11);
    rstype(a, rs2, rs1, funct3, b, OP_BRANCH)
}

fn stype(funct3: u32, src: u8, base: u8, offset: i32) -> u32 {
    let imm = interpret_i32_as_unsigned(offset);
    let a = extract_field(imm, 11, 5);
    let b = extract_field(imm, 4, 0);
    rstype(a, src, base, funct3, b, OP_STORE)
}

pub fn lui(rd: u8, imm: u32) -> u32 {
    ujtype(imm, rd, OP_LUI)
}

pub fn auipc(rd: u8, imm: u32) -> u32 {
    ujtype(imm, rd, OP_AUIPC)
}

pub fn jal(rd: u8, offset: i32) -> u32 {
    let imm = interpret_i32_as_unsigned(offset);
    let fields = extract_field(imm, 20, 20) << 19
        | extract_field(imm, 10, 1) << 9
        | extract_field(imm, 11, 11) << 8
        | extract_field(imm, 19, 12);
    ujtype(fields, rd, OP_JAL)
}

pub fn jalr(rd: u8, rs1: u8, offset: i32) -> u32 {
    itype(interpret_i32_as_unsigned(offset), rs1, 0, rd, OP_JALR)
}

pub fn beq(rs1: u8, rs2: u8, offset: i32) -> u32 {
    btype(FUNCT3_BEQ, rs1, rs2, offset)
}

pub fn bne(rs1: u8, rs2: u8, offset: i32) -> u32 {
    btype(FUNCT3_BNE, rs1, rs2, offset)
}

pub fn blt(rs1: u8, rs2: u8, offset: i32) -> u32 {
    btype(FUNCT3_BLT, rs1, rs2, offset)
}

pub fn bge(rs1: u8, rs2: u8, offset: i32) -> u32 {
    btype(FUNCT3_BGE, rs1, rs2, offset)
}

pub fn bltu(rs1: u8, rs2: u8, offset: i32) -> u32 {
    btype(FUNCT3_BLTU, rs1, rs2, offset)
}

pub fn bgeu(rs1: u8, rs2: u8, offset: i32) -> u32 {
    btype(FUNCT3_BGEU, rs1, rs2, offset)
}

pub fn lb(rd: u8, base: u8, offset: i32) -> u32 {
    itype(interpret_i32_as_unsigned(offset), base, FUNCT3_B, rd, OP_LOAD)
}

pub fn lh(rd: u8, base: u8, offset: i32) -> u32 {
    itype(interpret_i32_as_unsigned(offset), base, FUNCT3_H, rd, OP_LOAD)
}

pub fn lw(rd: u8, base: u8, offset: i32) -> u32 {
    itype(interpret_i32_as_unsigned(offset), base, FUNCT3_W, rd, OP_LOAD)
}

pub fn lbu(rd: u8, base: u8, offset: i32) -> u32 {
    itype(interpret_i32_as_unsigned(offset), base, FUNCT3_BU, rd, OP_LOAD)
}

pub fn lhu(rd: u8, base: u8, offset: i32) -> u32 {
    itype(interpret_i32_as_unsigned(offset), base, FUNCT3_HU, rd, OP_LOAD)
}

pub fn sb(src: u8, base: u8, offset: i32) -> u32 {
    stype(FUNCT3_B, src, base, offset)
}

pub fn sh(src: u8, base: u8, offset: i32) -> u32 {
    stype(FUNCT3_H, src, base, offset)
}

pub fn sw(src: u8, base: u8, offset: i32) -> u32 {
    stype(FUNCT3_W, src, base, offset)
}

pub fn addi(rd: u8, rs1: u8, imm: i32) -> u32 {
    itype(interpret_i32_as_unsigned(imm), rs1, FUNCT3_ADDI, rd, OP_IMM)
}

pub fn slti(rd: u8, rs1: u8, imm: i32) -> u32 {
    itype(interpret_i32_as_unsigned(imm), rs1, FUNCT3_SLTI, rd, OP_IMM)
}

pub fn sltiu(rd: u8, rs1: u8, imm: i32) -> u32 {
    itype(interpret_i32_as_unsigned(imm), rs1, FUNCT3_SLTIU, rd, OP_IMM)
}

pub fn xori(rd: u8, rs1: u8, imm: i32) -> u32 {
    itype(interpret_i32_as_unsigned(imm), rs1, FUNCT3_XORI, rd, OP_IMM)
}

pub fn ori(rd: u8, rs1: u8, imm: i32) -> u32 {
    itype(interpret_i32_as_unsigned(imm), rs1, FUNCT3_ORI, rd, OP_IMM)
}

pub fn andi(rd: u8, rs1: u8, imm: i32) -> u32 {
    itype(interpret_i32_as_unsigned(imm), rs1, FUNCT3_ANDI, rd, OP_IMM)
}

pub fn slli(rd: u8, rs1: u8, shamt: u32) -> u32 {
    itype(shamt & mask::<u32>(5), rs1, FUNCT3_SLLI, rd, OP_IMM)
}

pub fn srli(rd: u8, rs1: u8, shamt: u32) -> u32 {
    itype(shamt & mask::<u32>(5), rs1, FUNCT3_SRLI, rd, OP_IMM)
}

pub fn srai(rd: u8, rs1: u8, shamt: u32) -> u32 {
    itype(FUNCT7_SRA << 5 | shamt & mask::<u32>(5), rs1, FUNCT3_SRAI, rd, OP_IMM)
}

pub fn add(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(0, rs2, rs1, FUNCT3_ADD, rd.into(), OP)
}

pub fn sub(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(FUNCT7_SUB, rs2, rs1, FUNCT3_SUB, rd.into(), OP)
}

pub fn sll(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(0, rs2, rs1, FUNCT3_SLL, rd.into(), OP)
}

pub fn slt(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(0, rs2, rs1, FUNCT3_SLT, rd.into(), OP)
}

pub fn sltu(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(0, rs2, rs1, FUNCT3_SLTU, rd.into(), OP)
}

pub fn xor(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(0, rs2, rs1, FUNCT3_XOR, rd.into(), OP)
}

pub fn srl(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(0, rs2, rs1, FUNCT3_SRL, rd.into(), OP)
}

pub fn sra(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(FUNCT7_SRA, rs2, rs1, FUNCT3_SRA, rd.into(), OP)
}

pub fn or(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(0, rs2, rs1, FUNCT3_OR, rd.into(), OP)
}

pub fn and(rd: u8, rs1: u8, rs2: u8) -> u32 {
    rstype(0, rs2, rs1, FUNCT3_AND, rd.into(), OP)
}

pub fn fence() -> u32 {
    // fence iorw, iorw
    0x0ff0_000f
}

pub fn ecall() -> u32 {
    0x0000_0073
}

pub fn csrrw(rd: u8, csr: u16, rs1: u8) -> u32 {
    itype(csr.into(), rs1, FUNCT3_CSRRW, rd, OP_SYSTEM)
}

pub fn csrrs(rd: u8, csr: u16, rs1: u8) -> u32 {
    itype(csr.into(), rs1, FUNCT3_CSRRS, rd, OP_SYSTEM)
}

pub fn csrrc(rd: u8, csr: u16, rs1: u8) -> u32 {
    itype(csr.into(), rs1, FUNCT3_CSRRC, rd, OP_SYSTEM)
}

pub fn csrrwi(rd: u8, csr: u16, uimm: u8) -> u32 {
    itype(csr.into(), uimm, FUNCT3_CSRRWI, rd, OP_SYSTEM)
}

pub fn csrrsi(rd: u8, csr: u16, uimm: u8) -> u32 {
    itype(csr.into(), uimm, FUNCT3_CSRRSI, rd, OP_SYSTEM)
}

pub fn csrrci(rd: u8, csr: u16, uimm: u8) -> u32 {
    itype(csr.into(), uimm, FUNCT3_CSRRCI, rd, OP_SYSTEM)
}

#[cfg(test)]
mod tests {

    use super::*;

    // Expected words cross-checked against a reference assembler

    #[test]
    fn check_itype_encodings() {
        assert_eq!(addi(1, 0, -1), 0xfff0_0093);
        assert_eq!(jalr(1, 6, -4), 0xffc3_00e7);
        assert_eq!(lw(1, 2, 16), 0x0101_2083);
    }

    #[test]
    fn check_utype_and_jtype_encodings() {
        assert_eq!(lui(5, 0x12345), 0x1234_52b7);
        assert_eq!(auipc(4, 53), 0x0003_5217);
        assert_eq!(jal(1, -4), 0xffdf_f0ef);
        assert_eq!(jal(1, 2048), 0x0010_00ef);
    }

    #[test]
    fn check_btype_encodings() {
        assert_eq!(beq(1, 2, 8), 0x0020_8463);
        assert_eq!(beq(1, 2, -8), 0xfe20_8ce3);
    }

    #[test]
    fn check_stype_encodings() {
        assert_eq!(sw(2, 1, 8), 0x0020_a423);
        assert_eq!(sw(2, 1, -4), 0xfe20_ae23);
    }

    #[test]
    fn check_rtype_encodings() {
        assert_eq!(add(1, 2, 3), 0x0031_00b3);
        assert_eq!(sub(1, 2, 3), 0x4031_00b3);
        assert_eq!(sra(1, 2, 3), 0x4031_50b3);
    }

    #[test]
    fn check_shift_encodings() {
        assert_eq!(slli(1, 2, 2), 0x0021_1093);
        assert_eq!(srai(1, 2, 4), 0x4041_5093);
    }

    #[test]
    fn check_system_encodings() {
        assert_eq!(ecall(), 0x0000_0073);
        assert_eq!(csrrw(0, 0xc00, 5), 0xc002_9073);
        assert_eq!(csrrwi(0, 0xc00, 1), 0xc000_d073);
    }
}
