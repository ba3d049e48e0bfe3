use clap::Parser;
use itertools::Itertools;
use rv32sim::arm::assemble;

/// Assemble ARM32 (A32) source into a hex word listing
///
/// Reads a UTF-8 assembly file and prints one 8-digit lowercase hex
/// machine word per line, in program order.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about)]
struct Args {
    /// Path to the input assembly file
    input: String,
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    let source = match std::fs::read_to_string(&args.input) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error reading {}: {e}", args.input);
            std::process::exit(1);
        }
    };

    match assemble(&source) {
        Ok(words) => {
            println!("{}", words.iter().map(|word| format!("{word:08x}")).join("\n"));
        }
        Err(e) => {
            eprintln!("{}: {e}", args.input);
            std::process::exit(1);
        }
    }
}
