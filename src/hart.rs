use log::debug;
use thiserror::Error;

use crate::instr::decode::{DecodeError, Instr};
use crate::instr::rv32i::{Branch, CsrOp, Load, RegImm, RegReg, Store};
use crate::utils::{interpret_i32_as_unsigned, interpret_u32_as_signed, sign_extend};

use self::csr::{Csr, TOHOST};
use self::memory::{Memory, MemoryError, BASE};
use self::registers::Registers;

pub mod csr;
pub mod memory;
pub mod registers;

/// RISC-V Hardware Thread
///
/// This is the simplest possible RISC-V hardware thread, which is an
/// execution environment where:
///
/// * there is only one hart (this one), which supports only a single
///   privilege level (i.e. there is no notion of privilege)
/// * the hart implements only RV32I, plus the minimal CSR behaviour
///   required by the riscv-tests harness
/// * the initial state of the program is defined by a set of values
///   of memory and registers (including the program counter),
///   determined as part of making this object
/// * all memory is readable and writable, and the full address space
///   is main memory in [BASE, BASE + memory size)
/// * all traps are fatal, causing this execution environment to
///   terminate.
///
/// The member function step() controls execution of the hart. Each
/// time it is called, the instruction at the current pc is executed
/// and the hart reports whether to continue fetching or whether the
/// program signalled test-harness termination. If an error occurs,
/// step() returns the trap for the caller to report; there is no
/// recovery.
///
/// The default hart has memory and registers initialised to zero and
/// the pc at BASE.
#[derive(Debug)]
pub struct Hart {
    pub pc: u32,
    pub registers: Registers,
    pub memory: Memory,
    pub csr: Csr,
}

impl Default for Hart {
    fn default() -> Self {
        Self::new(memory::MEM_SIZE)
    }
}

/// Outcome of one successfully executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Keep fetching
    Continue,
    /// The program signalled test-harness termination (tohost write)
    Halt,
}

/// Calculate the address of the next instruction by adding four to
/// the program counter (wrapping if necessary) and returning the
/// result
fn next_instruction_address(pc: u32) -> u32 {
    pc.wrapping_add(4)
}

/// Load upper immediate
///
/// Load the (already shifted) u_immediate into dest, whose low 12
/// bits are zero. Set pc = pc + 4.
fn execute_lui(hart: &mut Hart, dest: u8, u_immediate: i32) -> Result<Step, ExecutionError> {
    hart.set_x(dest, interpret_i32_as_unsigned(u_immediate));
    hart.increment_pc();
    Ok(Step::Continue)
}

/// Add upper immediate to program counter
///
/// Add the current value of the program counter to the u_immediate
/// and store the result in the register dest. Set pc = pc + 4.
fn execute_auipc(hart: &mut Hart, dest: u8, u_immediate: i32) -> Result<Step, ExecutionError> {
    let value = hart.pc.wrapping_add(interpret_i32_as_unsigned(u_immediate));
    hart.set_x(dest, value);
    hart.increment_pc();
    Ok(Step::Continue)
}

/// Jump and link
///
/// Store the address of the next instruction (pc + 4) in the register
/// dest. Then set pc = pc + offset (an unconditional jump relative to
/// the program counter).
fn execute_jal(hart: &mut Hart, dest: u8, offset: i32) -> Result<Step, ExecutionError> {
    let return_address = next_instruction_address(hart.pc);
    hart.set_x(dest, return_address);
    hart.jump_relative_to_pc(offset);
    Ok(Step::Continue)
}

/// Jump and link register
///
/// Compute base + offset and set the least significant bit to zero to
/// make the jump target. Then store the address of the next
/// instruction (pc + 4) in the register dest and jump. The target is
/// computed before the link register is written, so the instruction
/// behaves correctly when dest and base are the same register.
fn execute_jalr(hart: &mut Hart, dest: u8, base: u8, offset: i32) -> Result<Step, ExecutionError> {
    let base_address = hart.x(base);
    let new_pc = 0xffff_fffe & base_address.wrapping_add(interpret_i32_as_unsigned(offset));
    let return_address = next_instruction_address(hart.pc);
    hart.set_x(dest, return_address);
    hart.jump_to_address(new_pc);
    Ok(Step::Continue)
}

/// Execute a conditional branch
///
/// Compute a condition specified by the mnemonic between the values
/// of the registers src1 and src2. If the result is false, set
/// pc = pc + 4; else set pc = pc + offset.
fn execute_branch(
    hart: &mut Hart,
    mnemonic: Branch,
    src1: u8,
    src2: u8,
    offset: i32,
) -> Result<Step, ExecutionError> {
    let src1 = hart.x(src1);
    let src2 = hart.x(src2);
    let branch_taken = match mnemonic {
        Branch::Beq => src1 == src2,
        Branch::Bne => src1 != src2,
        Branch::Blt => interpret_u32_as_signed(src1) < interpret_u32_as_signed(src2),
        Branch::Bge => interpret_u32_as_signed(src1) >= interpret_u32_as_signed(src2),
        Branch::Bltu => src1 < src2,
        Branch::Bgeu => src1 >= src2,
    };
    if branch_taken {
        hart.jump_relative_to_pc(offset);
    } else {
        hart.increment_pc();
    }
    Ok(Step::Continue)
}

/// Execute a load instruction
///
/// Compute a load address by adding the register base to the
/// sign-extended offset, and load data at that address into dest.
/// Loads read a full little-endian word and narrow it to the
/// requested width; the mnemonic determines the width and whether the
/// result is sign- or zero-extended.
fn execute_load(
    hart: &mut Hart,
    mnemonic: Load,
    dest: u8,
    base: u8,
    offset: i32,
) -> Result<Step, ExecutionError> {
    let load_address = hart.x(base).wrapping_add(interpret_i32_as_unsigned(offset));
    let word = hart.memory.fetch32(load_address)?;
    let load_data = match mnemonic {
        Load::Lb => sign_extend(word & 0xff, 7),
        Load::Lh => sign_extend(word & 0xffff, 15),
        Load::Lw => word,
        Load::Lbu => word & 0xff,
        Load::Lhu => word & 0xffff,
    };
    hart.set_x(dest, load_data);
    hart.increment_pc();
    Ok(Step::Continue)
}

/// Execute a store instruction
///
/// Compute a store address by adding the register base to the
/// sign-extended offset, and write data from src to that address. The
/// mnemonic determines how many of the low bytes of src are written,
/// in little-endian order.
fn execute_store(
    hart: &mut Hart,
    mnemonic: Store,
    src: u8,
    base: u8,
    offset: i32,
) -> Result<Step, ExecutionError> {
    let store_address = hart.x(base).wrapping_add(interpret_i32_as_unsigned(offset));
    let store_data = hart.x(src).to_le_bytes();
    let width = match mnemonic {
        Store::Sb => 1,
        Store::Sh => 2,
        Store::Sw => 4,
    };
    hart.memory.write_bytes(store_address, &store_data[..width])?;
    hart.increment_pc();
    Ok(Step::Continue)
}

/// Execute a register-immediate operation
///
/// Compute an operation determined by the mnemonic between the
/// register src and the sign-extended i_immediate. Place the result
/// in the register dest. Shift amounts use the low 5 bits of the
/// immediate.
fn execute_reg_imm(
    hart: &mut Hart,
    mnemonic: RegImm,
    dest: u8,
    src: u8,
    i_immediate: i32,
) -> Result<Step, ExecutionError> {
    let src: u32 = hart.x(src);
    let i_immediate = interpret_i32_as_unsigned(i_immediate);
    let value = match mnemonic {
        RegImm::Addi => src.wrapping_add(i_immediate),
        RegImm::Slti => {
            (interpret_u32_as_signed(src) < interpret_u32_as_signed(i_immediate)) as u32
        }
        RegImm::Sltiu => (src < i_immediate) as u32,
        RegImm::Xori => src ^ i_immediate,
        RegImm::Ori => src | i_immediate,
        RegImm::Andi => src & i_immediate,
        RegImm::Slli => src << (0x1f & i_immediate),
        RegImm::Srli => src >> (0x1f & i_immediate),
        RegImm::Srai => {
            interpret_i32_as_unsigned(interpret_u32_as_signed(src) >> (0x1f & i_immediate))
        }
    };
    hart.set_x(dest, value);
    hart.increment_pc();
    Ok(Step::Continue)
}

/// Execute a register-register operation
///
/// Compute an operation determined by the mnemonic between the
/// registers src1 and src2. Place the result in the register dest.
/// Shift amounts use the low 5 bits of src2.
fn execute_reg_reg(
    hart: &mut Hart,
    mnemonic: RegReg,
    dest: u8,
    src1: u8,
    src2: u8,
) -> Result<Step, ExecutionError> {
    let src1: u32 = hart.x(src1);
    let src2: u32 = hart.x(src2);
    let value = match mnemonic {
        RegReg::Add => src1.wrapping_add(src2),
        RegReg::Sub => src1.wrapping_sub(src2),
        RegReg::Slt => (interpret_u32_as_signed(src1) < interpret_u32_as_signed(src2)) as u32,
        RegReg::Sltu => (src1 < src2) as u32,
        RegReg::Xor => src1 ^ src2,
        RegReg::Or => src1 | src2,
        RegReg::And => src1 & src2,
        RegReg::Sll => src1 << (0x1f & src2),
        RegReg::Srl => src1 >> (0x1f & src2),
        RegReg::Sra => interpret_i32_as_unsigned(interpret_u32_as_signed(src1) >> (0x1f & src2)),
    };
    hart.set_x(dest, value);
    hart.increment_pc();
    Ok(Step::Continue)
}

/// Execute an environment call
///
/// The riscv-tests harness keeps the current test number in gp (x3):
/// a value greater than 1 at an ecall means that test has failed. A
/// value of 0 or 1 means execution continues (the pass signal proper
/// is the tohost CSR write).
fn execute_ecall(hart: &mut Hart) -> Result<Step, ExecutionError> {
    let gp = hart.x(3);
    if gp > 1 {
        return Err(ExecutionError::HarnessFailure { gp });
    }
    hart.increment_pc();
    Ok(Step::Continue)
}

/// Execute a Zicsr operation
///
/// A csrrw/csrrwi targeting the tohost address terminates the run
/// with success. Otherwise the prior CSR value is placed in dest and
/// the write/set/clear applied through the CSR file. Reads are
/// skipped for csrrw/csrrwi when dest is x0, and set/clear writes are
/// skipped when the source register is x0 (or the immediate is zero).
fn execute_csr(
    hart: &mut Hart,
    mnemonic: CsrOp,
    dest: u8,
    source: u8,
    csr: u16,
) -> Result<Step, ExecutionError> {
    match mnemonic {
        CsrOp::Csrrw | CsrOp::Csrrwi => {
            if csr == TOHOST {
                debug!("tohost write at pc=0x{:08x}: halting", hart.pc);
                return Ok(Step::Halt);
            }
            let csr_value = if dest != 0 {
                Some(hart.csr.read(csr))
            } else {
                None
            };
            let new_value = match mnemonic {
                CsrOp::Csrrw => hart.x(source),
                _ => source.into(),
            };
            hart.csr.write(csr, new_value);
            if let Some(csr_value) = csr_value {
                hart.set_x(dest, csr_value);
            }
        }
        CsrOp::Csrrs | CsrOp::Csrrsi => {
            let csr_value = hart.csr.read(csr);
            if source != 0 {
                let set_bits = match mnemonic {
                    CsrOp::Csrrs => hart.x(source),
                    _ => source.into(),
                };
                hart.csr.write(csr, csr_value | set_bits);
            }
            hart.set_x(dest, csr_value);
        }
        CsrOp::Csrrc | CsrOp::Csrrci => {
            let csr_value = hart.csr.read(csr);
            if source != 0 {
                let clear_bits = match mnemonic {
                    CsrOp::Csrrc => hart.x(source),
                    _ => source.into(),
                };
                hart.csr.write(csr, csr_value & !clear_bits);
            }
            hart.set_x(dest, csr_value);
        }
    }
    hart.increment_pc();
    Ok(Step::Continue)
}

impl Hart {
    /// Make a hart with a zeroed memory of the given size and the pc
    /// at BASE
    pub fn new(memory_size: usize) -> Self {
        Self {
            pc: BASE,
            registers: Registers::default(),
            memory: Memory::new(memory_size),
            csr: Csr::default(),
        }
    }

    /// Read the value of the register xn
    pub fn x(&self, n: u8) -> u32 {
        self.registers.read(n)
    }

    /// Write the value of the register xn
    pub fn set_x(&mut self, n: u8, value: u32) {
        self.registers.write(n, value)
    }

    /// Add 4 to the program counter, wrapping if necessary
    fn increment_pc(&mut self) {
        self.pc = next_instruction_address(self.pc);
    }

    /// Add an offset to the program counter, wrapping if necessary
    fn jump_relative_to_pc(&mut self, offset: i32) {
        self.pc = self.pc.wrapping_add(interpret_i32_as_unsigned(offset));
    }

    /// Jump to a new instruction address (set pc = new_pc)
    fn jump_to_address(&mut self, new_pc: u32) {
        self.pc = new_pc;
    }

    fn execute(&mut self, instr: Instr) -> Result<Step, ExecutionError> {
        match instr {
            Instr::Lui { dest, u_immediate } => execute_lui(self, dest, u_immediate),
            Instr::Auipc { dest, u_immediate } => execute_auipc(self, dest, u_immediate),
            Instr::Jal { dest, offset } => execute_jal(self, dest, offset),
            Instr::Jalr { dest, base, offset } => execute_jalr(self, dest, base, offset),
            Instr::Branch {
                mnemonic,
                src1,
                src2,
                offset,
            } => execute_branch(self, mnemonic, src1, src2, offset),
            Instr::Load {
                mnemonic,
                dest,
                base,
                offset,
            } => execute_load(self, mnemonic, dest, base, offset),
            Instr::Store {
                mnemonic,
                src,
                base,
                offset,
            } => execute_store(self, mnemonic, src, base, offset),
            Instr::RegImm {
                mnemonic,
                dest,
                src,
                i_immediate,
            } => execute_reg_imm(self, mnemonic, dest, src, i_immediate),
            Instr::RegReg {
                mnemonic,
                dest,
                src1,
                src2,
            } => execute_reg_reg(self, mnemonic, dest, src1, src2),
            Instr::Fence => {
                // Single in-order hart; nothing to order
                self.increment_pc();
                Ok(Step::Continue)
            }
            Instr::Ecall => execute_ecall(self),
            Instr::Csr {
                mnemonic,
                dest,
                source,
                csr,
            } => execute_csr(self, mnemonic, dest, source, csr),
        }
    }

    /// Fetch, decode and execute the instruction at the current pc
    ///
    /// Returns whether to continue fetching, or a trap if the
    /// instruction could not be fetched, decoded or executed.
    pub fn step(&mut self) -> Result<Step, Trap> {
        let instr = self
            .memory
            .fetch32(self.pc)
            .map_err(Trap::InstructionFetchFailed)?;
        let instr = Instr::try_from(instr)?;
        let step = self.execute(instr)?;
        Ok(step)
    }
}

#[derive(Error, Debug)]
pub enum Trap {
    #[error("instruction fetch failed: {0}")]
    InstructionFetchFailed(MemoryError),
    #[error("instruction decode failed: {0}")]
    InstructionDecodeFailed(#[from] DecodeError),
    #[error("instruction execution failed: {0}")]
    InstructionExecutionFailed(#[from] ExecutionError),
}

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("error occurred while accessing memory: {0}")]
    Memory(#[from] MemoryError),
    #[error("test harness reported failure (gp = {gp})")]
    HarnessFailure { gp: u32 },
}
