use std::fmt::Write;

use crate::listing::{DisassemblyListing, InstructionRecord};

/// Serialize a listing into the canonical .asm text.
/// Format, per record, in listing order:
///
///   0x<addr> <opcode>                <file>:<line>:<col>     0x<target> <file>:<line>:<col>
///
/// The address+opcode column is padded to 35 characters, the source column
/// to 30; the branch column is only present for attributed branch targets.
/// Separator records render as a bare newline. Every record produces exactly
/// one newline-terminated line, so line N of the output is the record with
/// sequence index N. The extension relies on that equivalence to navigate,
/// which is why separators still occupy a line.
pub fn render_listing(listing: &DisassemblyListing) -> String {
    // 64 bytes is a comfortable upper bound for a typical line.
    let mut content = String::with_capacity(listing.records.len() * 64);
    for record in &listing.records {
        if !record.is_separator() {
            render_record(&mut content, record);
        }
        content.push('\n');
    }
    content
}

fn render_record(out: &mut String, record: &InstructionRecord) {
    let head = format!("0x{:x} {} ", record.address, record.opcode_text);
    let _ = write!(out, "{:<35}", head);

    if record.location.has_attribution() {
        let source = format!(
            "{}:{}:{} ",
            record.location.filename, record.location.line, record.location.column
        );
        let _ = write!(out, "{:<30}", source);
    }

    if record.branch_target_location.has_attribution() {
        let _ = write!(
            out,
            "0x{:x} {}:{}:{}",
            record.branch_target_address,
            record.branch_target_location.filename,
            record.branch_target_location.line,
            record.branch_target_location.column
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodedProgram, RawInstruction};
    use crate::listing::SourceLocation;

    fn build(instructions: Vec<RawInstruction>) -> DisassemblyListing {
        DisassemblyListing::from_decoded(DecodedProgram {
            source_name: "test.elf".to_string(),
            instructions,
        })
    }

    fn attributed(address: u64, opcode: &str, file: &str, line: u32, column: u32) -> RawInstruction {
        RawInstruction {
            address,
            opcode_text: opcode.to_string(),
            branch_target_address: 0,
            branch_target_location: SourceLocation::default(),
            location: SourceLocation::new(file.to_string(), "/src".to_string(), line, column),
        }
    }

    #[test]
    fn one_line_per_record_including_separators() {
        let mut first = attributed(0x1000, "push {r7}", "main.c", 3, 1);
        first.location.is_function_start = true;
        let listing = build(vec![
            first,
            attributed(0x1002, "movs r0, #0", "main.c", 4, 5),
        ]);
        let text = render_listing(&listing);
        let lines: Vec<&str> = text.split('\n').collect();
        // split leaves one empty trailing element after the final newline
        assert_eq!(lines.len(), listing.len() + 1);
        assert_eq!(lines[listing.len()], "");
        assert!(text.ends_with('\n'));
        // The separator line is empty, and every rendered line sits at its
        // record's sequence index.
        assert_eq!(lines[0], "");
        assert!(lines[1].starts_with("0x1000 push {r7}"));
        assert!(lines[2].starts_with("0x1002 movs r0, #0"));
    }

    #[test]
    fn columns_are_padded_to_fixed_widths() {
        let listing = build(vec![attributed(0x1000, "bx lr", "a.c", 9, 2)]);
        let text = render_listing(&listing);
        let line = text.lines().next().unwrap();
        // "0x1000 bx lr " padded out to 35, then "a.c:9:2 " padded to 30.
        assert_eq!(&line[..35], format!("{:<35}", "0x1000 bx lr "));
        assert_eq!(&line[35..], format!("{:<30}", "a.c:9:2 "));
    }

    #[test]
    fn long_opcode_text_is_never_truncated() {
        let opcode = "vldmia.64 r0!, {d8-d15} ; a very wide instruction";
        let listing = build(vec![attributed(0x1000, opcode, "a.c", 1, 1)]);
        let text = render_listing(&listing);
        assert!(text.lines().next().unwrap().contains(opcode));
    }

    #[test]
    fn unattributed_record_renders_head_only() {
        let raw = RawInstruction {
            address: 0x2000,
            opcode_text: "nop".to_string(),
            branch_target_address: 0,
            branch_target_location: SourceLocation::default(),
            location: SourceLocation::default(),
        };
        let listing = build(vec![raw]);
        let text = render_listing(&listing);
        assert_eq!(text, format!("{:<35}\n", "0x2000 nop "));
    }

    #[test]
    fn branch_target_column_renders_address_and_location() {
        let mut raw = attributed(0x1000, "bl 0x1080", "main.c", 12, 3);
        raw.branch_target_address = 0x1080;
        raw.branch_target_location =
            SourceLocation::new("util.c".to_string(), "/src".to_string(), 40, 1);
        let listing = build(vec![raw]);
        let text = render_listing(&listing);
        let line = text.lines().next().unwrap();
        assert!(line.ends_with("0x1080 util.c:40:1"));
    }
}
