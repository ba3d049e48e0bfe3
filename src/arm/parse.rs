//! ARM32 assembly tokenizer
//!
//! Splits a UTF-8 source stream into labels, directives and
//! instructions, one item per meaningful line. Comments start with
//! `@` or `//` and run to the end of the line. A label is `ident:` or
//! `.ident:` (the leading dot is not part of the name, so `.loop:`
//! and `loop:` define the same label); any other line starting with
//! `.` is a directive; everything else is an instruction.

/// One meaningful item of an assembly source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// `name:` or `.name:`
    Label { name: String, line: usize },
    /// `.name arg, arg, ...`
    Directive {
        name: String,
        args: Vec<String>,
        line: usize,
    },
    /// `mnemonic operands...` (mnemonic lower-cased, operands raw)
    Instruction {
        mnemonic: String,
        operands: String,
        line: usize,
    },
}

fn strip_comment(text: &str) -> &str {
    let at = text.find('@').unwrap_or(text.len());
    let slashes = text.find("//").unwrap_or(text.len());
    &text[..at.min(slashes)]
}

/// If text begins with a label definition, split it off and return
/// (name, rest-of-line)
fn split_label(text: &str) -> Option<(&str, &str)> {
    let (head, rest) = text.split_once(':')?;
    let name = head.strip_prefix('.').unwrap_or(head);
    if name.is_empty() {
        return None;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        .then_some((name, rest))
}

pub fn parse(source: &str) -> Vec<Item> {
    let mut items = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let mut text = strip_comment(raw).trim();
        // A label may share its line with the item that follows it
        while let Some((name, rest)) = split_label(text) {
            items.push(Item::Label {
                name: name.to_string(),
                line,
            });
            text = rest.trim();
        }
        if text.is_empty() {
            continue;
        }
        if let Some(directive) = text.strip_prefix('.') {
            let mut parts = directive.splitn(2, char::is_whitespace);
            let name = parts.next().unwrap_or_default().to_ascii_lowercase();
            let args = parts
                .next()
                .unwrap_or_default()
                .split(',')
                .map(|arg| arg.trim().to_string())
                .filter(|arg| !arg.is_empty())
                .collect();
            items.push(Item::Directive { name, args, line });
        } else {
            let (mnemonic, operands) = match text.split_once(char::is_whitespace) {
                Some((mnemonic, operands)) => (mnemonic, operands.trim()),
                None => (text, ""),
            };
            items.push(Item::Instruction {
                mnemonic: mnemonic.to_ascii_lowercase(),
                operands: operands.to_string(),
                line,
            });
        }
    }
    items
}
