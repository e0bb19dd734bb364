/// The record model for an annotated disassembly. The decoder gives us a flat
/// list of instructions with source attribution; this module shapes that into
/// the final ordered listing, inserting a blank separator record in front of
/// every function entry point and stamping each record with its position.
///
/// The `sequence_index` is the stable identity of a record. Line N of the
/// rendered .asm text is the record with `sequence_index == N`, and that is
/// what the extension navigates by, so indexes must never be renumbered once
/// the listing is built.
use crate::decode::{DecodedProgram, RawInstruction};

/// Attribution of one instruction (or its branch target) to source code.
/// Empty `filename`/`path` means no attribution, e.g. a branch into a PLT
/// stub or a synthetic separator record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceLocation {
    pub filename: String,
    pub path: String,
    pub line: u32,
    pub column: u32,
    pub is_function_start: bool,
}

impl SourceLocation {
    pub fn new(filename: String, path: String, line: u32, column: u32) -> Self {
        Self {
            filename,
            path,
            line,
            column,
            is_function_start: false,
        }
    }

    pub fn has_attribution(&self) -> bool {
        !self.filename.is_empty()
    }

    /// Comparison key: `path/filename` with backslashes flattened to forward
    /// slashes and case folded. Rendering always uses the original text, the
    /// key exists only so lookups and sorting agree across platforms.
    pub fn sort_key(&self) -> String {
        let joined = format!("{}/{}", self.path, self.filename);
        joined.replace('\\', "/").to_uppercase()
    }
}

/// One decoded instruction plus its source attribution, or a separator.
/// Separators are synthetic records with address 0 and empty everything that
/// mark a function boundary in the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionRecord {
    pub address: u64,
    pub opcode_text: String,
    pub branch_target_address: u64,
    pub branch_target_location: SourceLocation,
    pub location: SourceLocation,
    pub sequence_index: usize,
}

impl InstructionRecord {
    fn separator(sequence_index: usize) -> Self {
        Self {
            address: 0,
            opcode_text: String::new(),
            branch_target_address: 0,
            branch_target_location: SourceLocation::default(),
            location: SourceLocation::default(),
            sequence_index,
        }
    }

    fn from_raw(raw: RawInstruction, sequence_index: usize) -> Self {
        Self {
            address: raw.address,
            opcode_text: raw.opcode_text,
            branch_target_address: raw.branch_target_address,
            branch_target_location: raw.branch_target_location,
            location: raw.location,
            sequence_index,
        }
    }

    pub fn is_separator(&self) -> bool {
        self.address == 0
    }
}

/// The full annotated disassembly of one binary, in address order with
/// separators interleaved. Built once per job and never mutated afterwards;
/// lookups run against a sorted copy (see `source_index`).
#[derive(Debug, Clone, Default)]
pub struct DisassemblyListing {
    pub source_name: String,
    pub records: Vec<InstructionRecord>,
}

impl DisassemblyListing {
    /// Shape the decoder output into the final listing. A separator record is
    /// inserted immediately before every instruction whose location is a
    /// function entry point, and each record gets the sequence index matching
    /// its position.
    pub fn from_decoded(program: DecodedProgram) -> Self {
        let mut records: Vec<InstructionRecord> =
            Vec::with_capacity(program.instructions.len());
        for raw in program.instructions {
            if raw.location.is_function_start {
                records.push(InstructionRecord::separator(records.len()));
            }
            let index = records.len();
            records.push(InstructionRecord::from_raw(raw, index));
        }
        Self {
            source_name: program.source_name,
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
