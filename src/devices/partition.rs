// MIT License - Copyright (c) 2021 TJForc
// Partition device

use bitflags::bitflags;

use crate::devices::{Device, DeviceKind};
use crate::event::PartitionEvent;
use crate::protocol::ArmingMode;

/// Primary state of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PartitionState {
    #[default]
    Ready,
    NotReady,
    ArmedAway,
    ArmedStay,
    ArmedAwayZeroEntry,
    ArmedStayZeroEntry,
    Alarming,
    ExitDelay,
    EntryDelay,
}

impl PartitionState {
    pub fn armed(mode: ArmingMode) -> Self {
        match mode {
            ArmingMode::Away => Self::ArmedAway,
            ArmingMode::Stay => Self::ArmedStay,
            ArmingMode::AwayZeroEntry => Self::ArmedAwayZeroEntry,
            ArmingMode::StayZeroEntry => Self::ArmedStayZeroEntry,
        }
    }

    pub fn is_armed(&self) -> bool {
        matches!(
            self,
            Self::ArmedAway | Self::ArmedStay | Self::ArmedAwayZeroEntry | Self::ArmedStayZeroEntry
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Ready => "Ready",
            Self::NotReady => "Not Ready",
            Self::ArmedAway => "Armed Away",
            Self::ArmedStay => "Armed Stay",
            Self::ArmedAwayZeroEntry => "Armed Away (Zero Entry)",
            Self::ArmedStayZeroEntry => "Armed Stay (Zero Entry)",
            Self::Alarming => "Alarming",
            Self::ExitDelay => "Exit Delay",
            Self::EntryDelay => "Entry Delay",
        }
    }
}

bitflags! {
    /// Secondary partition conditions tracked alongside the state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PartitionFlags: u8 {
        /// 663/664 - Door chime enabled
        const CHIME       = 0b0000_0001;
        /// 840/841 - Keypad trouble LED lit
        const TROUBLE_LED = 0b0000_0010;
        /// 658 - Keypad lockout (cleared by the next state change)
        const LOCKOUT     = 0b0000_0100;
        /// 673 - Partition busy (cleared by the next state change)
        const BUSY        = 0b0000_1000;
    }
}

/// A single partition.
#[derive(Debug, Clone)]
pub struct Partition {
    pub id: u8,
    pub state: PartitionState,
    pub flags: PartitionFlags,
    /// User number of the last opening or closing
    pub last_user: Option<u16>,
}

impl Partition {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            state: PartitionState::default(),
            flags: PartitionFlags::empty(),
            last_user: None,
        }
    }

    pub fn is_chime_enabled(&self) -> bool {
        self.flags.contains(PartitionFlags::CHIME)
    }

    /// Apply an event. Returns true if the partition changed.
    pub fn update(&mut self, event: &PartitionEvent) -> bool {
        let prev_state = self.state;
        let prev_flags = self.flags;
        let prev_user = self.last_user;

        let new_state = match event {
            PartitionEvent::Ready | PartitionEvent::Disarmed => Some(PartitionState::Ready),
            PartitionEvent::NotReady => Some(PartitionState::NotReady),
            PartitionEvent::Armed(Some(mode)) => Some(PartitionState::armed(*mode)),
            PartitionEvent::InAlarm => Some(PartitionState::Alarming),
            PartitionEvent::ExitDelay => Some(PartitionState::ExitDelay),
            PartitionEvent::EntryDelay => Some(PartitionState::EntryDelay),
            _ => None,
        };

        if let Some(state) = new_state {
            self.state = state;
            self.flags -= PartitionFlags::LOCKOUT | PartitionFlags::BUSY;
        }

        match event {
            PartitionEvent::ChimeEnabled => self.flags |= PartitionFlags::CHIME,
            PartitionEvent::ChimeDisabled => self.flags -= PartitionFlags::CHIME,
            PartitionEvent::TroubleLedOn => self.flags |= PartitionFlags::TROUBLE_LED,
            PartitionEvent::TroubleLedOff => self.flags -= PartitionFlags::TROUBLE_LED,
            PartitionEvent::KeypadLockout => self.flags |= PartitionFlags::LOCKOUT,
            PartitionEvent::Busy => self.flags |= PartitionFlags::BUSY,
            PartitionEvent::UserClosing { user } | PartitionEvent::UserOpening { user } => {
                self.last_user = Some(*user)
            }
            _ => {}
        }

        prev_state != self.state || prev_flags != self.flags || prev_user != self.last_user
    }
}

impl Device for Partition {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Partition
    }

    fn number(&self) -> u16 {
        u16::from(self.id)
    }

    fn address(&self) -> String {
        format!("part_{}", self.id)
    }

    fn describe(&self) -> String {
        format!(
            "{} (chime={}, trouble={})",
            self.state.description(),
            self.is_chime_enabled(),
            self.flags.contains(PartitionFlags::TROUBLE_LED)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arming_sequence() {
        let mut part = Partition::new(1);
        assert_eq!(part.state, PartitionState::Ready);

        assert!(part.update(&PartitionEvent::ExitDelay));
        assert!(part.update(&PartitionEvent::Armed(Some(ArmingMode::Stay))));
        assert_eq!(part.state, PartitionState::ArmedStay);
        assert!(part.state.is_armed());

        assert!(part.update(&PartitionEvent::Disarmed));
        assert_eq!(part.state, PartitionState::Ready);
        assert!(!part.update(&PartitionEvent::Ready));
    }

    #[test]
    fn test_armed_without_mode_keeps_state() {
        let mut part = Partition::new(1);
        assert!(!part.update(&PartitionEvent::Armed(None)));
        assert_eq!(part.state, PartitionState::Ready);
    }

    #[test]
    fn test_flags() {
        let mut part = Partition::new(2);
        assert!(part.update(&PartitionEvent::ChimeEnabled));
        assert!(part.is_chime_enabled());
        assert!(!part.update(&PartitionEvent::ChimeEnabled));
        assert!(part.update(&PartitionEvent::KeypadLockout));
        assert!(part.update(&PartitionEvent::NotReady));
        assert!(!part.flags.contains(PartitionFlags::LOCKOUT));
        assert!(part.is_chime_enabled());
    }

    #[test]
    fn test_last_user() {
        let mut part = Partition::new(1);
        assert!(part.update(&PartitionEvent::UserOpening { user: 40 }));
        assert_eq!(part.last_user, Some(40));
        assert_eq!(part.address(), "part_1");
        assert_eq!(part.name(), "Partition 1");
    }
}
