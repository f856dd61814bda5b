// MIT License - Copyright (c) 2021 TJForc
// Zone device

use bitflags::bitflags;

use crate::devices::{Device, DeviceKind};
use crate::event::ZoneEvent;

/// Primary state of a zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZoneState {
    #[default]
    Closed,
    Open,
    Alarming,
}

impl ZoneState {
    pub fn description(&self) -> &'static str {
        match self {
            Self::Closed => "Closed",
            Self::Open => "Open",
            Self::Alarming => "Alarming",
        }
    }
}

bitflags! {
    /// Zone conditions reported independently of open/closed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ZoneFlags: u8 {
        /// From the 616 bypass dump
        const BYPASSED = 0b0000_0001;
        /// 603/604
        const TAMPER   = 0b0000_0010;
        /// 605/606
        const FAULT    = 0b0000_0100;
    }
}

/// A single alarm zone.
#[derive(Debug, Clone)]
pub struct Zone {
    pub id: u16,
    pub state: ZoneState,
    pub flags: ZoneFlags,
    /// Seconds since the zone last closed, from the latest 615 dump
    pub closed_for_secs: Option<u32>,
}

impl Zone {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            state: ZoneState::default(),
            flags: ZoneFlags::empty(),
            closed_for_secs: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == ZoneState::Open
    }

    pub fn is_bypassed(&self) -> bool {
        self.flags.contains(ZoneFlags::BYPASSED)
    }

    /// Apply an event. Returns true if the zone changed.
    pub fn update(&mut self, event: &ZoneEvent) -> bool {
        let prev_state = self.state;
        let prev_flags = self.flags;

        match event {
            ZoneEvent::Open => self.state = ZoneState::Open,
            ZoneEvent::Restored | ZoneEvent::AlarmRestored => self.state = ZoneState::Closed,
            ZoneEvent::Alarm => self.state = ZoneState::Alarming,
            ZoneEvent::Tamper => self.flags |= ZoneFlags::TAMPER,
            ZoneEvent::TamperRestored => self.flags -= ZoneFlags::TAMPER,
            ZoneEvent::Fault => self.flags |= ZoneFlags::FAULT,
            ZoneEvent::FaultRestored => self.flags -= ZoneFlags::FAULT,
        }

        prev_state != self.state || prev_flags != self.flags
    }

    /// Returns true if the bypass flag changed.
    pub fn set_bypassed(&mut self, bypassed: bool) -> bool {
        let prev = self.is_bypassed();
        self.flags.set(ZoneFlags::BYPASSED, bypassed);
        prev != bypassed
    }
}

impl Device for Zone {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Zone
    }

    fn number(&self) -> u16 {
        self.id
    }

    fn address(&self) -> String {
        format!("zone_{:02}", self.id)
    }

    fn describe(&self) -> String {
        let mut desc = self.state.description().to_string();
        if self.is_bypassed() {
            desc.push_str(", bypassed");
        }
        if self.flags.contains(ZoneFlags::TAMPER) {
            desc.push_str(", tamper");
        }
        if self.flags.contains(ZoneFlags::FAULT) {
            desc.push_str(", fault");
        }
        desc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_close() {
        let mut zone = Zone::new(5);
        assert!(zone.update(&ZoneEvent::Open));
        assert!(zone.is_open());
        assert!(!zone.update(&ZoneEvent::Open));
        assert!(zone.update(&ZoneEvent::Restored));
        assert_eq!(zone.state, ZoneState::Closed);
    }

    #[test]
    fn test_alarm_restored_closes() {
        let mut zone = Zone::new(1);
        zone.update(&ZoneEvent::Alarm);
        assert_eq!(zone.state, ZoneState::Alarming);
        zone.update(&ZoneEvent::AlarmRestored);
        assert_eq!(zone.state, ZoneState::Closed);
    }

    #[test]
    fn test_flags_and_describe() {
        let mut zone = Zone::new(3);
        assert!(zone.set_bypassed(true));
        assert!(!zone.set_bypassed(true));
        assert!(zone.update(&ZoneEvent::Tamper));
        assert_eq!(zone.describe(), "Closed, bypassed, tamper");
        assert!(zone.update(&ZoneEvent::TamperRestored));
        assert_eq!(zone.address(), "zone_03");
    }
}
