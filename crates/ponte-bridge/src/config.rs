//! Bridge configuration

use serde::{Deserialize, Serialize};

/// Options controlling bridge behavior.
///
/// Deserializable from the `[bridge]` table of a host configuration file;
/// every key is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeOptions {
    /// `log` target native log lines are emitted under
    pub native_log_target: String,

    /// Whether a message sent to an unknown object or method is an error.
    /// When false the message is dropped with a debug log.
    pub require_message_receiver: bool,

    /// Fixed-tick hook invocations per frame
    pub fixed_ticks_per_frame: u32,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            native_log_target: "native".to_string(),
            require_message_receiver: true,
            fixed_ticks_per_frame: 1,
        }
    }
}
