//! Golden tests for the ARM32 assembler
//!
//! Assemble each fixture under testfs/ and compare the produced
//! words, instruction by instruction, against the reference hex
//! listing.

use std::path::Path;

use rv32sim::arm::assemble;

const FIXTURES: [(&str, &str); 3] = [
    ("arm32_subtract.s", "subtract.hex"),
    ("arm32_prime.s", "prime.hex"),
    ("arm32_fib.s", "fib.hex"),
];

fn read_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("testfs")
        .join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("could not read fixture {}: {e}", path.display()))
}

fn read_reference_words(name: &str) -> Vec<u32> {
    read_fixture(name)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| u32::from_str_radix(line, 16).unwrap())
        .collect()
}

#[test]
fn check_fixtures_match_reference_encodings() {
    for (source, reference) in FIXTURES {
        let words = assemble(&read_fixture(source)).unwrap();
        let expected = read_reference_words(reference);
        assert_eq!(
            words.len(),
            expected.len(),
            "{source}: word count mismatch"
        );
        for (index, (word, expected)) in words.iter().zip(&expected).enumerate() {
            assert_eq!(
                word,
                expected,
                "{source}: instruction {} encodes to 0x{word:08x}, reference is 0x{expected:08x}",
                index + 1
            );
        }
    }
}
