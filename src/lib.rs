// Crate root: declare modules and control visibility
pub mod decode;
pub mod disasm_worker;
pub mod helper_requests;
pub mod listing;
pub mod protocol;
pub mod render;
pub mod request_handler;
pub mod source_index;
pub mod transport;

// Re-export commonly used API from the library for binaries/tests
pub use disasm_worker::{spawn_pipeline, DisasmPipeline};
pub use listing::{DisassemblyListing, InstructionRecord, SourceLocation};
pub use render::render_listing;
pub use source_index::{LineQuery, SourceIndex};
