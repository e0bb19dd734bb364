/// Request parsing and dispatch for the main request loop.
use std::fs;

use log::{debug, warn};
use serde_json::Value;

use crate::disasm_worker::{DisasmPipeline, PipelineError};
use crate::helper_requests::*;
use crate::protocol;
use crate::source_index::LineQuery;
use crate::transport;

/// Parse and dispatch one request from the extension based on the 'req'
/// discriminant. Every message with a usable seq gets exactly one response;
/// anything else is answered with an Error notification. Returns false only
/// when writing to stdout failed, which means the extension is gone.
pub fn dispatch_request(msg: &Value, pipeline: &DisasmPipeline) -> bool {
    let req_type = msg.get("req").and_then(|v| v.as_str());
    debug!("dispatching request: {:?}", req_type);

    let response = match req_type {
        Some("disasm") | Some("disassemble") => handle_disassemble_request(msg, pipeline),
        Some("locate") => handle_locate_request(msg, pipeline),
        other => {
            warn!("unknown request type: {:?}", other);
            protocol::error_notification(&format!("unknown request type: {:?}", other))
        }
    };

    if let Err(e) = transport::write_json_locked(&response) {
        warn!("failed to write response: {}", e);
        return false;
    }
    true
}

fn handle_disassemble_request(msg: &Value, pipeline: &DisasmPipeline) -> Value {
    let typed: DisassembleRequest = match serde_json::from_value(msg.clone()) {
        Ok(typed) => typed,
        Err(e) => return parse_failure(msg, "disasm", &e.to_string()),
    };

    let bytes = match fs::read(&typed.arguments.file) {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(
                typed.seq,
                "io",
                &format!("cannot read '{}': {}", typed.arguments.file, e),
            )
        }
    };

    match pipeline.submit(bytes) {
        Ok(output) => {
            let record_count = output.text.matches('\n').count() as u64;
            notify(protocol::disassembly_ready_notification(
                &output.source_name,
                record_count,
            ));
            to_value(DisassembleResponse {
                req: "disasm".to_string(),
                seq: typed.seq,
                source_name: output.source_name,
                text: output.text,
            })
        }
        Err(e) => error_response(typed.seq, pipeline_error_code(&e), &e.to_string()),
    }
}

fn handle_locate_request(msg: &Value, pipeline: &DisasmPipeline) -> Value {
    let typed: LocateRequest = match serde_json::from_value(msg.clone()) {
        Ok(typed) => typed,
        Err(e) => return parse_failure(msg, "locate", &e.to_string()),
    };

    let query = LineQuery {
        path: typed.arguments.path,
        filename: typed.arguments.filename,
        line: typed.arguments.line,
        column: typed.arguments.column,
    };
    let line = pipeline.locate(&query) as u64;
    to_value(LocateResponse {
        req: "locate".to_string(),
        seq: typed.seq,
        line,
    })
}

/// A request we recognized but could not deserialize. If the raw message
/// still carries a numeric seq we answer it; otherwise all we can do is emit
/// an Error notification.
fn parse_failure(msg: &Value, req: &str, detail: &str) -> Value {
    warn!("failed to parse {} request: {}", req, detail);
    match msg.get("seq").and_then(|v| v.as_u64()) {
        Some(seq) => error_response(seq, "internal", &format!("malformed {} request: {}", req, detail)),
        None => protocol::error_notification(&format!("malformed {} request: {}", req, detail)),
    }
}

fn pipeline_error_code(e: &PipelineError) -> &'static str {
    match e {
        PipelineError::Busy => "busy",
        PipelineError::Decode(_) => "decode",
        PipelineError::WorkerExited => "internal",
    }
}

fn error_response(seq: u64, code: &str, message: &str) -> Value {
    to_value(ErrorResponse {
        req: "error".to_string(),
        seq,
        code: code.to_string(),
        message: message.to_string(),
    })
}

fn notify(notification: Value) {
    if let Err(e) = transport::write_json_locked(&notification) {
        warn!("failed to write notification: {}", e);
    }
}

fn to_value<T: serde::Serialize>(response: T) -> Value {
    serde_json::to_value(response).expect("response types always serialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{DecodeError, DecodedProgram, Decoder, RawInstruction};
    use crate::disasm_worker::spawn_pipeline;
    use crate::listing::SourceLocation;
    use serde_json::json;
    use std::io::Write;

    struct StubDecoder;

    impl Decoder for StubDecoder {
        fn analyze(&mut self, _bytes: &[u8]) -> Result<DecodedProgram, DecodeError> {
            Ok(DecodedProgram {
                source_name: "stub.elf".to_string(),
                instructions: vec![
                    RawInstruction {
                        address: 0x1000,
                        opcode_text: "nop".to_string(),
                        location: SourceLocation::new(
                            "main.c".to_string(),
                            "/src".to_string(),
                            4,
                            0,
                        ),
                        ..Default::default()
                    },
                    RawInstruction {
                        address: 0x1002,
                        opcode_text: "bx lr".to_string(),
                        location: SourceLocation::new(
                            "main.c".to_string(),
                            "/src".to_string(),
                            8,
                            0,
                        ),
                        ..Default::default()
                    },
                ],
            })
        }
    }

    #[test]
    fn disassemble_request_produces_listing_response() {
        let pipeline = spawn_pipeline(StubDecoder);
        let mut binary = tempfile::NamedTempFile::new().unwrap();
        binary.write_all(&[0x7f, b'E', b'L', b'F']).unwrap();

        let msg = json!({
            "req": "disasm",
            "seq": 5,
            "arguments": { "file": binary.path().to_string_lossy() }
        });
        let response = handle_disassemble_request(&msg, &pipeline);
        assert_eq!(response["req"], "disasm");
        assert_eq!(response["seq"], 5);
        assert_eq!(response["source_name"], "stub.elf");
        assert!(response["text"].as_str().unwrap().starts_with("0x1000 nop"));
    }

    #[test]
    fn unreadable_file_maps_to_io_error() {
        let pipeline = spawn_pipeline(StubDecoder);
        let msg = json!({
            "req": "disasm",
            "seq": 9,
            "arguments": { "file": "/no/such/file/anywhere" }
        });
        let response = handle_disassemble_request(&msg, &pipeline);
        assert_eq!(response["req"], "error");
        assert_eq!(response["seq"], 9);
        assert_eq!(response["code"], "io");
    }

    #[test]
    fn locate_request_answers_from_published_snapshot() {
        let pipeline = spawn_pipeline(StubDecoder);
        pipeline.submit(vec![0]).unwrap();

        let msg = json!({
            "req": "locate",
            "seq": 2,
            "arguments": { "path": "/src", "filename": "main.c", "line": 6, "column": 0 }
        });
        let response = handle_locate_request(&msg, &pipeline);
        assert_eq!(response["req"], "locate");
        assert_eq!(response["seq"], 2);
        // Line 6 rounds up to the line-8 record at sequence index 1.
        assert_eq!(response["line"], 1);
    }

    #[test]
    fn locate_without_a_job_returns_zero() {
        let pipeline = spawn_pipeline(StubDecoder);
        let msg = json!({
            "req": "locate",
            "seq": 3,
            "arguments": { "path": "/src", "filename": "main.c", "line": 4, "column": 0 }
        });
        let response = handle_locate_request(&msg, &pipeline);
        assert_eq!(response["line"], 0);
    }

    #[test]
    fn malformed_request_with_seq_gets_error_response() {
        let pipeline = spawn_pipeline(StubDecoder);
        let msg = json!({ "req": "locate", "seq": 11, "arguments": { "wrong": true } });
        let response = handle_locate_request(&msg, &pipeline);
        assert_eq!(response["req"], "error");
        assert_eq!(response["seq"], 11);
        assert_eq!(response["code"], "internal");
    }
}
