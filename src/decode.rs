// Copyright (c) 2026 AsmLens Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// The decoder boundary. The correlation engine never parses binaries
/// itself; it consumes the flat per-instruction records a decoder produces.
/// `ObjdumpDecoder` is the production implementation: it hands the bytes to
/// an external `objdump -d -l -C` process and parses the annotated text
/// output, line by line, into `RawInstruction`s.
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Command, Stdio};

use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use crate::listing::SourceLocation;

/// One instruction as the decoder reports it, before sequence numbering and
/// separator insertion.
#[derive(Debug, Clone, Default)]
pub struct RawInstruction {
    pub address: u64,
    pub opcode_text: String,
    pub branch_target_address: u64,
    pub branch_target_location: SourceLocation,
    pub location: SourceLocation,
}

/// Everything a decoder extracted from one binary.
#[derive(Debug, Clone, Default)]
pub struct DecodedProgram {
    /// Name of the decoded object if the decoder can tell, e.g. the format
    /// string objdump reports. May be empty.
    pub source_name: String,
    pub instructions: Vec<RawInstruction>,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to launch '{tool}': {source}")]
    Spawn { tool: String, source: io::Error },
    #[error("i/o error while decoding: {0}")]
    Io(#[from] io::Error),
    #[error("'{tool}' exited with {status}")]
    ToolFailed { tool: String, status: String },
    #[error("decoder produced no instructions")]
    NoInstructions,
}

/// Contract with the external analysis collaborator.
pub trait Decoder: Send {
    fn analyze(&mut self, bytes: &[u8]) -> Result<DecodedProgram, DecodeError>;
}

/// Decoder backed by an `objdump` child process. The bytes are spilled to a
/// temporary file because objdump only reads from disk.
pub struct ObjdumpDecoder {
    tool: String,
}

impl Default for ObjdumpDecoder {
    fn default() -> Self {
        Self::new("objdump")
    }
}

impl ObjdumpDecoder {
    pub fn new(tool: impl Into<String>) -> Self {
        Self { tool: tool.into() }
    }
}

impl Decoder for ObjdumpDecoder {
    fn analyze(&mut self, bytes: &[u8]) -> Result<DecodedProgram, DecodeError> {
        let mut scratch = tempfile::NamedTempFile::new()?;
        scratch.write_all(bytes)?;
        scratch.flush()?;

        // -d disassemble, -l interleave source file:line markers, -C demangle
        let mut child = Command::new(&self.tool)
            .args(["-d", "-l", "-C"])
            .arg(scratch.path())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| DecodeError::Spawn {
                tool: self.tool.clone(),
                source,
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "no stdout from objdump")
        })?;
        let program = parse_objdump(BufReader::with_capacity(64 * 1024, stdout))?;

        let status = child.wait()?;
        if !status.success() {
            return Err(DecodeError::ToolFailed {
                tool: self.tool.clone(),
                status: status.to_string(),
            });
        }
        if program.instructions.is_empty() {
            return Err(DecodeError::NoInstructions);
        }
        debug!(
            "objdump produced {} instructions ({})",
            program.instructions.len(),
            program.source_name
        );
        Ok(program)
    }
}

/// Parse objdump's `-d -l` text output. Streamed so a large .text section
/// never lives in memory twice.
///
/// Lines we care about:
///   `a.elf:     file format elf32-littlearm`  -> object name / format
///   `00001000 <main>:`                        -> symbol start, flags the next instruction
///   `/home/u/src/main.c:42`                   -> source marker for following instructions
///   `    1000:\t2300\tmovs\tr3, #0`           -> one instruction
pub fn parse_objdump<R: BufRead>(mut reader: R) -> io::Result<DecodedProgram> {
    let re_symbol = Regex::new(r"^[0-9a-fA-F]+ <(.+)>:$").unwrap();
    let re_source = Regex::new(r"^(.+)[/\\]([^/\\]+):(\d+)(?:\s+\(discriminator \d+\))?$").unwrap();
    let re_format = Regex::new(r"file format (\S+)").unwrap();
    let re_branch = Regex::new(r"\b([0-9a-fA-F]+)\s+<[^>]+>").unwrap();

    let mut program = DecodedProgram::default();
    let mut current_source: Option<SourceLocation> = None;
    let mut pending_function_start = false;

    let mut buf: Vec<u8> = Vec::with_capacity(8 * 1024);
    loop {
        buf.clear();
        let n = reader.read_until(b'\n', &mut buf)?;
        if n == 0 {
            break; // EOF
        }
        while buf
            .last()
            .map(|b| *b == b'\n' || *b == b'\r')
            .unwrap_or(false)
        {
            buf.pop();
        }
        let line = String::from_utf8_lossy(&buf);
        let s: &str = line.as_ref();
        if s.is_empty() {
            continue;
        }

        if program.source_name.is_empty() {
            if let Some(caps) = re_format.captures(s) {
                program.source_name = caps[1].to_string();
                continue;
            }
        }

        if let Some(caps) = re_symbol.captures(s) {
            debug!("symbol start: {}", &caps[1]);
            pending_function_start = true;
            continue;
        }

        // Instruction lines are indented and tab-separated:
        // "    1000:\t2300      \tmovs\tr3, #0"
        if let Some(stripped) = s.strip_prefix(' ').or_else(|| s.strip_prefix('\t')) {
            let trimmed = stripped.trim_start();
            if let Some((addr_text, rest)) = trimmed.split_once(":\t") {
                if let Ok(address) = u64::from_str_radix(addr_text, 16) {
                    let mut fields = rest.splitn(2, '\t');
                    let _bytes = fields.next().unwrap_or("");
                    let text = fields.next().unwrap_or("").trim();
                    if text.is_empty() {
                        continue; // byte-dump continuation line
                    }
                    let opcode_text = text.replace('\t', " ");

                    let branch_target_address = re_branch
                        .captures(&opcode_text)
                        .and_then(|caps| u64::from_str_radix(&caps[1], 16).ok())
                        .unwrap_or(0);

                    let mut location = current_source.clone().unwrap_or_default();
                    location.is_function_start = pending_function_start;
                    pending_function_start = false;

                    program.instructions.push(RawInstruction {
                        address,
                        opcode_text,
                        branch_target_address,
                        branch_target_location: SourceLocation::default(),
                        location,
                    });
                    continue;
                }
            }
        }

        if let Some(caps) = re_source.captures(s) {
            let line_number: u32 = caps[3].parse().unwrap_or(0);
            if line_number > 0 {
                current_source = Some(SourceLocation::new(
                    caps[2].to_string(),
                    caps[1].to_string(),
                    line_number,
                    0, // objdump does not report columns
                ));
            }
            continue;
        }
    }

    resolve_branch_targets(&mut program.instructions);
    Ok(program)
}

/// Second pass: a branch target inside the decoded region inherits the
/// source attribution of the instruction at that address. Targets outside
/// (PLT stubs, libraries) stay unattributed.
fn resolve_branch_targets(instructions: &mut [RawInstruction]) {
    let by_address: HashMap<u64, SourceLocation> = instructions
        .iter()
        .map(|instr| (instr.address, instr.location.clone()))
        .collect();

    let mut unresolved = 0usize;
    for instr in instructions.iter_mut() {
        if instr.branch_target_address == 0 {
            continue;
        }
        match by_address.get(&instr.branch_target_address) {
            Some(location) => instr.branch_target_location = location.clone(),
            None => unresolved += 1,
        }
    }
    if unresolved > 0 {
        warn!("{} branch targets outside the decoded region", unresolved);
    }
}
