//! VM construction settings.

use serde::{Deserialize, Serialize};

/// Sizing and limits for a [`Vm`](crate::Vm).
///
/// Deserializes with every field optional, so a host can load a partial
/// settings file and take defaults for the rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Initial heap buffer size in bytes. The heap doubles on demand.
    pub initial_heap_size: usize,
    /// Initial operand stack size in bytes. The stack grows on demand.
    pub stack_capacity: usize,
    /// Maximum nesting of `JUMP_HISTORY` (GOSUB) frames.
    pub max_call_depth: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            initial_heap_size: 256,
            stack_capacity: 4096,
            max_call_depth: 1024,
        }
    }
}
