use serde::{Deserialize, Serialize};
use std::fmt;

/// Where the engine should place model state.
///
/// The training loop never inspects tensors on a device itself; the value is
/// only forwarded to the engine (e.g. when loading serialized parameters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Device {
    /// Main system memory. This is the default device.
    #[default]
    Cpu,
    /// An accelerator identified by its ordinal.
    Gpu(usize),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::Gpu(ordinal) => write!(f, "gpu:{}", ordinal),
        }
    }
}
