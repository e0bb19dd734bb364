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

use serde::{Deserialize, Serialize};

// Helper request and response types for the helper <-> extension
// communication. All requests carry a 'req' field naming the request type and
// a 'seq' correlation id the response echoes back. The structs are exported
// to TypeScript with ts-rs so the extension side stays in sync.

/**
 * Arguments for a disassemble request. The extension hands us the path of the
 * compiled binary; the helper reads the bytes itself so the file content never
 * crosses the JSON channel.
 */
#[derive(Serialize, Deserialize, Debug, ts_rs::TS)]
#[ts(export, export_to = "../shared/asmlens-helper/")]
pub struct DisassembleArguments {
    /** Path of the binary to disassemble. */
    pub file: String,
}

#[derive(Serialize, Deserialize, Debug, ts_rs::TS)]
#[ts(export, export_to = "../shared/asmlens-helper/")]
pub struct DisassembleRequest {
    pub req: String, // "disasm"
    pub seq: u64,
    pub arguments: DisassembleArguments,
}

/**
 * Successful disassemble response. `text` is the canonical .asm listing: one
 * line per record, so line N is the record with sequence index N. The
 * extension writes it to a file and navigates by line number.
 */
#[derive(Serialize, Deserialize, Debug, ts_rs::TS)]
#[ts(export, export_to = "../shared/asmlens-helper/")]
pub struct DisassembleResponse {
    pub req: String, // "disasm"
    pub seq: u64,
    pub source_name: String,
    pub text: String,
}

/**
 * Arguments for a locate request: the source position the user wants to jump
 * from. `column` is carried for forward compatibility; matching currently
 * uses only path, filename and line.
 */
#[derive(Serialize, Deserialize, Debug, ts_rs::TS)]
#[ts(export, export_to = "../shared/asmlens-helper/")]
pub struct LocateArguments {
    pub path: String,
    pub filename: String,
    pub line: u32,
    pub column: u32,
}

#[derive(Serialize, Deserialize, Debug, ts_rs::TS)]
#[ts(export, export_to = "../shared/asmlens-helper/")]
pub struct LocateRequest {
    pub req: String, // "locate"
    pub seq: u64,
    pub arguments: LocateArguments,
}

/**
 * Locate response: the line number in the rendered listing. Best effort by
 * contract - 0 when no disassembly has completed yet, nearest match
 * otherwise, never an error.
 */
#[derive(Serialize, Deserialize, Debug, ts_rs::TS)]
#[ts(export, export_to = "../shared/asmlens-helper/")]
pub struct LocateResponse {
    pub req: String, // "locate"
    pub seq: u64,
    pub line: u64,
}

/**
 * Failure response for any request. `code` is stable and machine-checkable:
 * "busy", "decode", "io" or "internal". A "busy" error means the request was
 * rejected without side effects and can simply be retried later.
 */
#[derive(Serialize, Deserialize, Debug, ts_rs::TS)]
#[ts(export, export_to = "../shared/asmlens-helper/")]
pub struct ErrorResponse {
    pub req: String, // "error"
    pub seq: u64,
    pub code: String,
    pub message: String,
}

/**
 * Events generated by the helper outside the request/response cycle.
 * Internally tagged so each variant carries a 'type' field, which becomes a
 * discriminated union on the TypeScript side.
 */
#[derive(Serialize, Deserialize, Debug, ts_rs::TS)]
#[ts(export, export_to = "../shared/asmlens-helper/")]
#[serde(tag = "type")]
pub enum HelperEvent {
    /// A disassembly finished and lookups are now served from it
    DisassemblyReady {
        source_name: String,
        record_count: u64,
    },

    /// A message that could not be handled at all (no seq to reply to)
    Error { message: String },
}
