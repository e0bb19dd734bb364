/// Notification envelopes for the helper -> extension direction.
use crate::helper_requests::HelperEvent;
use serde_json::{json, Value};

/// Wrap an event in a JSON-RPC notification envelope for sending to the
/// extension.
pub fn wrap_event_as_notification(event: &HelperEvent) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "HelperEvent",
        "params": event
    })
}

/// Build a DisassemblyReady event notification.
pub fn disassembly_ready_notification(source_name: &str, record_count: u64) -> Value {
    let event = HelperEvent::DisassemblyReady {
        source_name: source_name.to_string(),
        record_count,
    };
    wrap_event_as_notification(&event)
}

/// Build an Error event notification for messages with no usable seq.
pub fn error_notification(message: &str) -> Value {
    let event = HelperEvent::Error {
        message: message.to_string(),
    };
    wrap_event_as_notification(&event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notification_envelope_shape() {
        let value = disassembly_ready_notification("a.elf", 12);
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["method"], "HelperEvent");
        assert_eq!(value["params"]["type"], "DisassemblyReady");
        assert_eq!(value["params"]["source_name"], "a.elf");
    }
}
