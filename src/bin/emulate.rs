use clap::Parser;
use clap_num::maybe_hex;
use rv32sim::elf_utils::load_elf;
use rv32sim::hart::memory::{BASE, MEM_SIZE};
use rv32sim::hart::{Hart, Step};

/// Emulate a 32-bit RISC-V processor
///
/// Loads each statically linked ELF executable at the fixed base
/// address 0x80000000 and runs it until the program signals
/// termination through the riscv-tests tohost convention. On success
/// the retired instruction count is reported; any trap is fatal and
/// reported with the pc and instruction word that caused it.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Paths to input executable files
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Size of the memory region in bytes (use 0x prefix for
    /// hexadecimal)
    #[arg(short, long, value_parser=maybe_hex::<u32>, default_value_t = MEM_SIZE as u32)]
    memory_size: u32,
}

/// Run one executable to completion, returning the retired
/// instruction count, or None after printing a diagnostic
fn run(path: &str, memory_size: u32) -> Option<u64> {
    let mut hart = Hart::new(memory_size as usize);
    if let Err(e) = load_elf(&mut hart.memory, path) {
        eprintln!("  error loading elf: {e}");
        return None;
    }
    hart.pc = BASE;
    let mut retired = 0;
    loop {
        retired += 1;
        match hart.step() {
            Ok(Step::Continue) => (),
            Ok(Step::Halt) => return Some(retired),
            Err(trap) => {
                let word = hart.memory.fetch32(hart.pc).unwrap_or(0);
                eprintln!(
                    "  {trap} (pc=0x{:08x}, instruction 0x{word:08x})",
                    hart.pc
                );
                return None;
            }
        }
    }
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut failures = 0;
    for path in &args.inputs {
        println!("Execute : {path}");
        match run(path, args.memory_size) {
            Some(retired) => println!("  ran {retired} instructions"),
            None => failures += 1,
        }
    }

    if failures > 0 {
        std::process::exit(1);
    }
}
