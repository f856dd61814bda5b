// MIT License - Copyright (c) 2021 TJForc
// Panel devices

pub mod output;
pub mod partition;
pub mod zone;

pub use output::CommandOutput;
pub use partition::{Partition, PartitionFlags, PartitionState};
pub use zone::{Zone, ZoneFlags, ZoneState};

/// The kinds of device an event can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceKind {
    Partition,
    Zone,
    CommandOutput,
}

impl DeviceKind {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Partition => "Partition",
            Self::Zone => "Zone",
            Self::CommandOutput => "Command Output",
        }
    }
}

/// A device whose state is driven by panel events.
pub trait Device {
    fn kind(&self) -> DeviceKind;

    /// Device number within its kind (1-based).
    fn number(&self) -> u16;

    /// Stable identifier, e.g. `zone_05`.
    fn address(&self) -> String;

    /// One-line summary of the current state for logging.
    fn describe(&self) -> String;

    fn name(&self) -> String {
        format!("{} {}", self.kind().description(), self.number())
    }
}
