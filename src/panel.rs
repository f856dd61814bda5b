// MIT License - Copyright (c) 2021 TJForc
// In-memory panel state

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::constants::MAX_PARTITIONS;
use crate::devices::{CommandOutput, Device, Partition, Zone};
use crate::event::{LedFlags, PanelEvent, TroubleFlags};

/// State of the partitions, zones and command outputs the caller
/// configured, driven by decoded panel events.
///
/// Devices are keyed by number; events for devices outside the configured
/// set are reported as unhandled.
///
/// # Example
///
/// ```
/// use envisalink_tpi::{PanelState, PanelEvent, ZoneEvent};
///
/// let mut panel = PanelState::new(1, 8, 0);
/// assert!(panel.apply(&PanelEvent::Zone { zone: 3, event: ZoneEvent::Open }));
/// assert!(panel.zone(3).unwrap().is_open());
/// assert!(!panel.apply(&PanelEvent::Zone { zone: 9, event: ZoneEvent::Open }));
/// ```
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    partitions: BTreeMap<u8, Partition>,
    zones: BTreeMap<u16, Zone>,
    outputs: BTreeMap<(u8, u8), CommandOutput>,
    trouble: TroubleFlags,
    leds: LedFlags,
    flashing_leds: LedFlags,
}

impl PanelState {
    /// Create state for `partitions` partitions, `zones` zones and
    /// `outputs` command outputs on each partition.
    pub fn new(partitions: u8, zones: u16, outputs: u8) -> Self {
        let partitions = partitions.min(MAX_PARTITIONS);
        let mut state = Self::default();

        for p in 1..=partitions {
            state.partitions.insert(p, Partition::new(p));
            for o in 1..=outputs {
                state.outputs.insert((p, o), CommandOutput::new(p, o));
            }
        }
        for z in 1..=zones {
            state.zones.insert(z, Zone::new(z));
        }

        state
    }

    pub fn partitions(&self) -> impl Iterator<Item = &Partition> {
        self.partitions.values()
    }

    pub fn partition(&self, id: u8) -> Option<&Partition> {
        self.partitions.get(&id)
    }

    pub fn zones(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn zone(&self, id: u16) -> Option<&Zone> {
        self.zones.get(&id)
    }

    pub fn outputs(&self) -> impl Iterator<Item = &CommandOutput> {
        self.outputs.values()
    }

    pub fn output(&self, partition: u8, output: u8) -> Option<&CommandOutput> {
        self.outputs.get(&(partition, output))
    }

    /// Panel conditions currently raised.
    pub fn trouble(&self) -> TroubleFlags {
        self.trouble
    }

    /// Steady and flashing keypad LEDs from the last `510`/`511`.
    pub fn leds(&self) -> (LedFlags, LedFlags) {
        (self.leds, self.flashing_leds)
    }

    /// Apply an event. Returns true if the event addressed something this
    /// state tracks.
    pub fn apply(&mut self, event: &PanelEvent) -> bool {
        match event {
            PanelEvent::Partition { partition, event } => {
                let Some(part) = self.partitions.get_mut(partition) else {
                    return false;
                };
                if part.update(event) {
                    info!("{}: {}", part.name(), part.describe());
                }
                true
            }
            PanelEvent::Zone { zone, event } => {
                let Some(z) = self.zones.get_mut(zone) else {
                    return false;
                };
                if z.update(event) {
                    info!("{}: {}", z.name(), z.describe());
                }
                true
            }
            PanelEvent::BypassedZones(map) => {
                for zone in self.zones.values_mut() {
                    if zone.set_bypassed(map.is_bypassed(zone.id)) {
                        info!("{}: {}", zone.name(), zone.describe());
                    }
                }
                true
            }
            PanelEvent::ZoneTimers(timers) => {
                for (id, secs) in timers.iter() {
                    if let Some(zone) = self.zones.get_mut(&id) {
                        zone.closed_for_secs = Some(secs);
                    }
                }
                true
            }
            PanelEvent::CommandOutputPressed { partition, output } => {
                let Some(out) = self.outputs.get_mut(&(*partition, *output)) else {
                    return false;
                };
                out.press();
                info!("{}: {}", out.name(), out.describe());
                true
            }
            PanelEvent::Trouble { condition, active } => {
                let prev = self.trouble;
                self.trouble.set(*condition, *active);
                if prev != self.trouble {
                    info!("Panel condition {:?} {}", condition, if *active { "raised" } else { "restored" });
                }
                true
            }
            PanelEvent::KeypadLeds { leds, flashing } => {
                if *flashing {
                    self.flashing_leds = *leds;
                } else {
                    self.leds = *leds;
                }
                debug!("Keypad LEDs {:?} (flashing {:?})", self.leds, self.flashing_leds);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BypassMap, PartitionEvent, ZoneEvent, ZoneTimers};
    use crate::protocol::ArmingMode;
    use crate::devices::PartitionState;

    #[test]
    fn test_new_creates_devices() {
        let panel = PanelState::new(2, 16, 2);
        assert_eq!(panel.partitions().count(), 2);
        assert_eq!(panel.zones().count(), 16);
        assert_eq!(panel.outputs().count(), 4);
        assert!(panel.output(2, 2).is_some());
        assert!(panel.output(1, 3).is_none());
    }

    #[test]
    fn test_partition_routing() {
        let mut panel = PanelState::new(2, 8, 0);
        assert!(panel.apply(&PanelEvent::Partition {
            partition: 2,
            event: PartitionEvent::Armed(Some(ArmingMode::Away)),
        }));
        assert_eq!(panel.partition(2).unwrap().state, PartitionState::ArmedAway);
        assert_eq!(panel.partition(1).unwrap().state, PartitionState::Ready);
        assert!(!panel.apply(&PanelEvent::Partition {
            partition: 3,
            event: PartitionEvent::Ready,
        }));
    }

    #[test]
    fn test_bypass_dump_updates_all_zones() {
        let mut panel = PanelState::new(1, 4, 0);
        panel.apply(&PanelEvent::BypassedZones(BypassMap::parse("0500000000000000").unwrap()));
        let bypassed: Vec<_> = panel.zones().filter(|z| z.is_bypassed()).map(|z| z.id).collect();
        assert_eq!(bypassed, vec![1, 3]);

        panel.apply(&PanelEvent::BypassedZones(BypassMap::default()));
        assert!(panel.zones().all(|z| !z.is_bypassed()));
    }

    #[test]
    fn test_zone_timers() {
        let mut panel = PanelState::new(1, 2, 0);
        let timers = ZoneTimers::parse("FEFFFFFF0000").unwrap();
        assert!(panel.apply(&PanelEvent::ZoneTimers(timers)));
        assert_eq!(panel.zone(1).unwrap().closed_for_secs, Some(5));
        assert_eq!(panel.zone(2).unwrap().closed_for_secs, Some(0));
    }

    #[test]
    fn test_trouble_flags() {
        let mut panel = PanelState::new(1, 1, 0);
        panel.apply(&PanelEvent::Trouble { condition: TroubleFlags::AC_POWER, active: true });
        panel.apply(&PanelEvent::Trouble { condition: TroubleFlags::BATTERY, active: true });
        panel.apply(&PanelEvent::Trouble { condition: TroubleFlags::AC_POWER, active: false });
        assert_eq!(panel.trouble(), TroubleFlags::BATTERY);
    }

    #[test]
    fn test_command_output_and_unhandled() {
        let mut panel = PanelState::new(1, 1, 2);
        assert!(panel.apply(&PanelEvent::CommandOutputPressed { partition: 1, output: 2 }));
        assert_eq!(panel.output(1, 2).unwrap().presses, 1);
        assert!(!panel.apply(&PanelEvent::CommandOutputPressed { partition: 1, output: 4 }));
        assert!(!panel.apply(&PanelEvent::RingDetected));
        assert!(panel.apply(&PanelEvent::Zone { zone: 1, event: ZoneEvent::Open }));
    }
}
