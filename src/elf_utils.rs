//! ELF loading
//!
//! Reads a statically linked ELF32 executable and copies every
//! PT_LOAD segment into the hart memory at p_paddr - BASE. Memory is
//! zero-initialised, so segments whose p_memsz exceeds p_filesz (bss)
//! need no explicit fill.

use elf::abi::PT_LOAD;
use elf::endian::AnyEndian;
use elf::parse::ParseError;
use elf::ElfBytes;
use log::info;
use thiserror::Error;

use crate::hart::memory::{Memory, MemoryError};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("could not read ELF file: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not parse ELF file: {0}")]
    Parse(#[from] ParseError),
    #[error("ELF file has no program headers")]
    MissingProgramHeaders,
    #[error("segment physical address 0x{paddr:x} is not a 32-bit address")]
    SegmentAddressTooLarge { paddr: u64 },
    #[error("segment at physical address 0x{paddr:x} does not fit in memory: {source}")]
    SegmentOutOfRange { paddr: u64, source: MemoryError },
}

/// Read the ELF executable at path and load every PT_LOAD segment
/// into memory at its physical address
pub fn load_elf(memory: &mut Memory, path: &str) -> Result<(), LoadError> {
    let file_data = std::fs::read(path)?;
    let file = ElfBytes::<AnyEndian>::minimal_parse(&file_data)?;
    let segments = file.segments().ok_or(LoadError::MissingProgramHeaders)?;
    for phdr in segments.iter().filter(|phdr| phdr.p_type == PT_LOAD) {
        let data = file.segment_data(&phdr)?;
        let paddr = u32::try_from(phdr.p_paddr)
            .map_err(|_| LoadError::SegmentAddressTooLarge { paddr: phdr.p_paddr })?;
        info!("loading segment of {} bytes at 0x{paddr:08x}", data.len());
        memory
            .write_bytes(paddr, data)
            .map_err(|source| LoadError::SegmentOutOfRange {
                paddr: phdr.p_paddr,
                source,
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::hart::memory::BASE;
    use crate::hart::{csr, Hart, Step};
    use crate::instr::encode;

    /// Build a minimal statically linked ELF32 image with a single
    /// PT_LOAD segment holding the given instruction words at paddr
    fn build_elf(paddr: u32, instructions: &[u32]) -> Vec<u8> {
        let code: Vec<u8> = instructions
            .iter()
            .flat_map(|instr| instr.to_le_bytes())
            .collect();
        let mut image = Vec::new();
        // ELF header
        image.extend_from_slice(&[0x7f, b'E', b'L', b'F', 1, 1, 1, 0]);
        image.extend_from_slice(&[0; 8]);
        image.extend_from_slice(&2u16.to_le_bytes()); // e_type = EXEC
        image.extend_from_slice(&243u16.to_le_bytes()); // e_machine = RISC-V
        image.extend_from_slice(&1u32.to_le_bytes()); // e_version
        image.extend_from_slice(&paddr.to_le_bytes()); // e_entry
        image.extend_from_slice(&52u32.to_le_bytes()); // e_phoff
        image.extend_from_slice(&0u32.to_le_bytes()); // e_shoff
        image.extend_from_slice(&0u32.to_le_bytes()); // e_flags
        image.extend_from_slice(&52u16.to_le_bytes()); // e_ehsize
        image.extend_from_slice(&32u16.to_le_bytes()); // e_phentsize
        image.extend_from_slice(&1u16.to_le_bytes()); // e_phnum
        image.extend_from_slice(&0u16.to_le_bytes()); // e_shentsize
        image.extend_from_slice(&0u16.to_le_bytes()); // e_shnum
        image.extend_from_slice(&0u16.to_le_bytes()); // e_shstrndx
        // Program header
        image.extend_from_slice(&1u32.to_le_bytes()); // p_type = PT_LOAD
        image.extend_from_slice(&84u32.to_le_bytes()); // p_offset
        image.extend_from_slice(&paddr.to_le_bytes()); // p_vaddr
        image.extend_from_slice(&paddr.to_le_bytes()); // p_paddr
        image.extend_from_slice(&(code.len() as u32).to_le_bytes()); // p_filesz
        image.extend_from_slice(&(code.len() as u32).to_le_bytes()); // p_memsz
        image.extend_from_slice(&5u32.to_le_bytes()); // p_flags = R+X
        image.extend_from_slice(&4u32.to_le_bytes()); // p_align
        image.extend_from_slice(&code);
        image
    }

    fn write_elf(name: &str, image: &[u8]) -> String {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, image).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn check_load_elf_places_segment() {
        let instructions = [encode::addi(5, 0, 42), encode::csrrw(0, csr::TOHOST, 0)];
        let image = build_elf(BASE, &instructions);
        let path = write_elf("rv32sim-load-elf.elf", &image);
        let mut memory = Memory::default();
        load_elf(&mut memory, &path).unwrap();
        assert_eq!(memory.fetch32(BASE).unwrap(), instructions[0]);
        assert_eq!(memory.fetch32(BASE + 4).unwrap(), instructions[1]);
    }

    #[test]
    fn check_segment_outside_memory_is_error() {
        let image = build_elf(0x1000, &[encode::ecall()]);
        let path = write_elf("rv32sim-load-elf-range.elf", &image);
        let mut memory = Memory::default();
        let result = load_elf(&mut memory, &path);
        assert!(matches!(result, Err(LoadError::SegmentOutOfRange { .. })));
    }

    #[test]
    fn check_missing_file_is_error() {
        let mut memory = Memory::default();
        let result = load_elf(&mut memory, "/nonexistent/rv32sim.elf");
        assert!(matches!(result, Err(LoadError::Io(_))));
    }

    #[test]
    fn check_truncated_image_is_error() {
        let path = write_elf("rv32sim-load-elf-truncated.elf", &[0x7f, b'E', b'L', b'F']);
        let mut memory = Memory::default();
        let result = load_elf(&mut memory, &path);
        assert!(matches!(result, Err(LoadError::Parse(_))));
    }

    #[test]
    fn check_loaded_program_runs_to_halt() {
        let instructions = [
            encode::addi(3, 0, 1),
            encode::addi(5, 0, 42),
            encode::ecall(),
            encode::csrrw(0, csr::TOHOST, 3),
        ];
        let image = build_elf(BASE, &instructions);
        let path = write_elf("rv32sim-load-elf-run.elf", &image);
        let mut hart = Hart::default();
        load_elf(&mut hart.memory, &path).unwrap();
        hart.pc = BASE;
        let mut retired = 0;
        loop {
            retired += 1;
            match hart.step().unwrap() {
                Step::Continue => (),
                Step::Halt => break,
            }
        }
        assert_eq!(retired, 4);
        assert_eq!(hart.x(5), 42);
    }
}
