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

/// Content-Length framed JSON over stdio. The extension spawns the helper as
/// a child process, writes framed requests to its stdin and reads framed
/// responses and notifications from its stdout. Logging goes to stderr so it
/// can never corrupt a frame.
use std::io::{self, BufRead, Write};

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Clean end of input: the extension closed our stdin.
    #[error("end of input")]
    Eof,
    #[error("malformed frame: {0}")]
    BadFrame(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Read one framed message: `Content-Length: N\r\n\r\n<N bytes of JSON>`.
/// Unknown headers are skipped.
pub fn read_message<R: BufRead>(reader: &mut R) -> Result<Value, TransportError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            return Err(TransportError::Eof);
        }
        let header = header.trim();
        if header.is_empty() {
            break; // end of headers
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                let parsed = value.trim().parse::<usize>().map_err(|_| {
                    TransportError::BadFrame(format!("bad Content-Length '{}'", value.trim()))
                })?;
                content_length = Some(parsed);
            }
        }
    }

    let len = content_length
        .ok_or_else(|| TransportError::BadFrame("missing Content-Length header".to_string()))?;
    let mut body = vec![0u8; len];
    reader.read_exact(&mut body)?;
    Ok(serde_json::from_slice(&body)?)
}

/// Frame and write one message to an arbitrary writer.
pub fn write_message<W: Write>(writer: &mut W, msg: &Value) -> Result<(), TransportError> {
    let body = serde_json::to_vec(msg)?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

/// Frame and write one message to stdout, serialized under stdout's
/// process-wide lock so frames from different threads never interleave. The
/// message is encoded before the lock is taken to keep the critical section
/// small.
pub fn write_json_locked(msg: &Value) -> Result<(), TransportError> {
    let body = serde_json::to_vec(msg)?;
    let stdout = io::stdout();
    let mut w = stdout.lock();
    write!(w, "Content-Length: {}\r\n\r\n", body.len())?;
    w.write_all(&body)?;
    w.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[test]
    fn frame_round_trip() {
        let msg = json!({"req": "locate", "seq": 3});
        let mut wire: Vec<u8> = Vec::new();
        write_message(&mut wire, &msg).unwrap();

        let mut reader = Cursor::new(wire);
        let back = read_message(&mut reader).unwrap();
        assert_eq!(back, msg);
        // Second read hits clean EOF.
        assert!(matches!(read_message(&mut reader), Err(TransportError::Eof)));
    }

    #[test]
    fn unknown_headers_are_skipped() {
        let body = br#"{"req":"disasm","seq":1}"#;
        let mut wire = format!(
            "X-Custom: yes\r\nContent-Length: {}\r\nContent-Type: application/json\r\n\r\n",
            body.len()
        )
        .into_bytes();
        wire.extend_from_slice(body);

        let msg = read_message(&mut Cursor::new(wire)).unwrap();
        assert_eq!(msg["req"], "disasm");
    }

    #[test]
    fn missing_content_length_is_a_bad_frame() {
        let wire = b"Content-Type: application/json\r\n\r\n{}".to_vec();
        assert!(matches!(
            read_message(&mut Cursor::new(wire)),
            Err(TransportError::BadFrame(_))
        ));
    }
}
