use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::io;

use asmlens_helper::decode::ObjdumpDecoder;
use asmlens_helper::disasm_worker::spawn_pipeline;
use asmlens_helper::request_handler::dispatch_request;
use asmlens_helper::transport::{self, TransportError};

/// Disassembly helper for the AsmLens extension. Speaks Content-Length
/// framed JSON over stdio; see helper_requests for the message shapes.
#[derive(Parser, Debug)]
#[command(name = "asmlens-helper", version)]
struct Cli {
    /// objdump executable to decode with (e.g. arm-none-eabi-objdump)
    #[arg(long = "objdump", default_value = "objdump")]
    objdump: String,

    /// Log level spec, overridable with RUST_LOG (logs go to stderr)
    #[arg(long = "log-level", default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // stdout carries the protocol, so logs must stay on stderr
    let _logger = flexi_logger::Logger::try_with_env_or_str(&cli.log_level)
        .context("bad log level spec")?
        .log_to_stderr()
        .start()
        .context("failed to start logger")?;

    let pipeline = spawn_pipeline(ObjdumpDecoder::new(&cli.objdump));
    info!("asmlens-helper ready, decoding with '{}'", cli.objdump);

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    loop {
        match transport::read_message(&mut reader) {
            Ok(msg) => {
                if !dispatch_request(&msg, &pipeline) {
                    // stdout is gone, the extension has shut us down
                    break;
                }
            }
            Err(TransportError::Eof) => {
                info!("stdin closed, shutting down");
                break;
            }
            Err(e) => {
                // A framing error desyncs the stream; bail out rather than
                // misinterpret every following byte.
                warn!("transport error: {}", e);
                break;
            }
        }
    }
    Ok(())
}
