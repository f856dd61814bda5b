// MIT License - Copyright (c) 2021 TJForc
// Inbound event decoding

use bitflags::bitflags;
use chrono::NaiveDateTime;

use crate::constants::{inbound, MAX_ZONES, ZONE_TIMER_TICK_SECS};
use crate::error::{Result, TpiError};
use crate::protocol::ArmingMode;

bitflags! {
    /// Panel-wide alarm and trouble conditions.
    ///
    /// Each flag is reported by a pair of codes, one raising the condition
    /// and one restoring it.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TroubleFlags: u16 {
        /// 631/632 - 2-wire smoke alarm
        const SMOKE_ALARM   = 0b0000_0000_0001;
        /// 621/622 - Fire key alarm
        const FIRE_KEY      = 0b0000_0000_0010;
        /// 623/624 - Auxiliary key alarm
        const AUX_KEY       = 0b0000_0000_0100;
        /// 625/626 - Panic key alarm
        const PANIC_KEY     = 0b0000_0000_1000;
        /// 806/807 - Bell trouble
        const BELL          = 0b0000_0001_0000;
        /// 800/801 - Panel battery trouble
        const BATTERY       = 0b0000_0010_0000;
        /// 802/803 - AC power trouble
        const AC_POWER      = 0b0000_0100_0000;
        /// 814/815 - Failure to communicate
        const FTC           = 0b0000_1000_0000;
        /// 829/830 - System tamper
        const SYSTEM_TAMPER = 0b0001_0000_0000;
        /// 842/843 - Fire trouble
        const FIRE_TROUBLE  = 0b0010_0000_0000;
    }
}

/// Code pairs in the order (raised, restored).
const TROUBLE_CODES: [(&str, &str, TroubleFlags); 10] = [
    (inbound::SMOKE_ALARM, inbound::SMOKE_RESTORED, TroubleFlags::SMOKE_ALARM),
    (inbound::FIRE_KEY_ALARM, inbound::FIRE_KEY_RESTORED, TroubleFlags::FIRE_KEY),
    (inbound::AUX_KEY_ALARM, inbound::AUX_KEY_RESTORED, TroubleFlags::AUX_KEY),
    (inbound::PANIC_KEY_ALARM, inbound::PANIC_KEY_RESTORED, TroubleFlags::PANIC_KEY),
    (inbound::BELL_TROUBLE, inbound::BELL_TROUBLE_RESTORED, TroubleFlags::BELL),
    (inbound::BATTERY_TROUBLE, inbound::BATTERY_TROUBLE_RESTORED, TroubleFlags::BATTERY),
    (inbound::AC_TROUBLE, inbound::AC_TROUBLE_RESTORED, TroubleFlags::AC_POWER),
    (inbound::FTC_TROUBLE, inbound::FTC_TROUBLE_RESTORED, TroubleFlags::FTC),
    (inbound::SYSTEM_TAMPER, inbound::SYSTEM_TAMPER_RESTORED, TroubleFlags::SYSTEM_TAMPER),
    (inbound::FIRE_TROUBLE, inbound::FIRE_TROUBLE_RESTORED, TroubleFlags::FIRE_TROUBLE),
];

impl TroubleFlags {
    /// Look up a trouble code. Returns the condition and whether it is
    /// being raised (`true`) or restored (`false`).
    pub fn from_code(code: &str) -> Option<(Self, bool)> {
        TROUBLE_CODES.iter().find_map(|(raised, restored, flag)| {
            if code == *raised {
                Some((*flag, true))
            } else if code == *restored {
                Some((*flag, false))
            } else {
                None
            }
        })
    }
}

bitflags! {
    /// Keypad LEDs reported by `510` (steady) and `511` (flashing).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LedFlags: u8 {
        const READY     = 0b0000_0001;
        const ARMED     = 0b0000_0010;
        const MEMORY    = 0b0000_0100;
        const BYPASS    = 0b0000_1000;
        const TROUBLE   = 0b0001_0000;
        const PROGRAM   = 0b0010_0000;
        const FIRE      = 0b0100_0000;
        const BACKLIGHT = 0b1000_0000;
    }
}

impl LedFlags {
    /// Parse the 2-character hex payload.
    pub fn from_hex(s: &str) -> Option<Self> {
        let s = s.get(..2)?;
        u8::from_str_radix(s, 16).ok().map(Self::from_bits_retain)
    }
}

/// Bypass state of zones 1-64 from a `616` dump.
///
/// Bit *n* set means zone *n+1* is bypassed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BypassMap(pub u64);

impl BypassMap {
    /// Parse 16 hex characters: eight byte pairs, least significant first.
    pub fn parse(data: &str) -> Option<Self> {
        if data.len() != 16 || !data.is_ascii() {
            return None;
        }
        let mut bytes = [0u8; 8];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&data[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(u64::from_le_bytes(bytes)))
    }

    pub fn is_bypassed(&self, zone: u16) -> bool {
        (1..=MAX_ZONES).contains(&zone) && self.0 & (1u64 << (zone - 1)) != 0
    }

    /// Zone numbers currently bypassed, ascending.
    pub fn zones(&self) -> impl Iterator<Item = u16> + '_ {
        (1..=MAX_ZONES).filter(|z| self.is_bypassed(*z))
    }
}

/// Time since each zone last closed, from a `615` dump.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZoneTimers(Vec<u32>);

impl ZoneTimers {
    /// Parse groups of 4 hex characters, one per zone starting at zone 1.
    /// A full dump carries 64 groups.
    pub fn parse(data: &str) -> Option<Self> {
        if data.is_empty()
            || data.len() % 4 != 0
            || data.len() > MAX_ZONES as usize * 4
            || !data.is_ascii()
        {
            return None;
        }
        (0..data.len())
            .step_by(4)
            .map(|i| Self::group_seconds(&data[i..i + 4]))
            .collect::<Option<Vec<_>>>()
            .map(Self)
    }

    /// Decode one group. The register is a little-endian `u16` counting
    /// down from 0xFFFF in 5 second ticks.
    pub fn group_seconds(group: &str) -> Option<u32> {
        if group.len() != 4 || !group.is_ascii() {
            return None;
        }
        let lo = u8::from_str_radix(&group[..2], 16).ok()?;
        let hi = u8::from_str_radix(&group[2..], 16).ok()?;
        let ticks = u16::from_le_bytes([lo, hi]) ^ 0xFFFF;
        Some(u32::from(ticks) * ZONE_TIMER_TICK_SECS)
    }

    /// Seconds since the zone closed, if the dump covered it.
    pub fn seconds(&self, zone: u16) -> Option<u32> {
        let idx = usize::from(zone).checked_sub(1)?;
        self.0.get(idx).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `(zone, seconds)` pairs in zone order.
    pub fn iter(&self) -> impl Iterator<Item = (u16, u32)> + '_ {
        self.0.iter().enumerate().map(|(i, s)| (i as u16 + 1, *s))
    }
}

/// Events addressed to a single partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionEvent {
    Ready,
    NotReady,
    /// Mode is `None` when the payload carried no mode digit.
    Armed(Option<ArmingMode>),
    ReadyToForceArm,
    InAlarm,
    Disarmed,
    ExitDelay,
    EntryDelay,
    KeypadLockout,
    FailedToArm,
    PgmOutputInProgress,
    ChimeEnabled,
    ChimeDisabled,
    InvalidAccessCode,
    FunctionNotAvailable,
    FailureToArm,
    Busy,
    ArmingInProgress,
    UserClosing { user: u16 },
    SpecialClosing,
    PartialClosing,
    UserOpening { user: u16 },
    SpecialOpening,
    TroubleLedOn,
    TroubleLedOff,
}

/// Events addressed to a single zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneEvent {
    Alarm,
    AlarmRestored,
    Tamper,
    TamperRestored,
    Fault,
    FaultRestored,
    Open,
    Restored,
}

/// Where a temperature broadcast was measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureSource {
    Indoor,
    Outdoor,
}

/// A decoded asynchronous event from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    Partition { partition: u8, event: PartitionEvent },
    Zone { zone: u16, event: ZoneEvent },
    /// A panel condition was raised (`active`) or restored
    Trouble { condition: TroubleFlags, active: bool },
    /// Keypad LED bitmap; `flashing` for `511`
    KeypadLeds { leds: LedFlags, flashing: bool },
    BypassedZones(BypassMap),
    ZoneTimers(ZoneTimers),
    CommandOutputPressed { partition: u8, output: u8 },
    MasterCodeRequired,
    InstallerCodeRequired,
    InstallersMode,
    RingDetected,
    Temperature { source: TemperatureSource, thermostat: u8, value: u16 },
    DuressAlarm { code: String },
    BufferNearFull,
    VerboseTroubleStatus(u8),
    /// A code this library does not decode
    Unrecognized { code: String, data: String },
}

/// Decode an inbound frame into an event.
///
/// Unknown codes yield [`PanelEvent::Unrecognized`]. A known code with a
/// malformed payload is an [`TpiError::InvalidPayload`].
pub fn decode(code: &str, data: &str) -> Result<PanelEvent> {
    if let Some((condition, active)) = TroubleFlags::from_code(code) {
        return Ok(PanelEvent::Trouble { condition, active });
    }

    let event = match code {
        inbound::PARTITION_READY => partition(code, data, PartitionEvent::Ready)?,
        inbound::PARTITION_NOT_READY => partition(code, data, PartitionEvent::NotReady)?,
        inbound::PARTITION_ARMED => {
            let mode = if data.len() > 1 {
                data.chars().last().and_then(ArmingMode::from_digit)
            } else {
                None
            };
            partition(code, data, PartitionEvent::Armed(mode))?
        }
        inbound::PARTITION_READY_FORCE_ARM => {
            partition(code, data, PartitionEvent::ReadyToForceArm)?
        }
        inbound::PARTITION_IN_ALARM => partition(code, data, PartitionEvent::InAlarm)?,
        inbound::PARTITION_DISARMED => partition(code, data, PartitionEvent::Disarmed)?,
        inbound::EXIT_DELAY => partition(code, data, PartitionEvent::ExitDelay)?,
        inbound::ENTRY_DELAY => partition(code, data, PartitionEvent::EntryDelay)?,
        inbound::KEYPAD_LOCKOUT => partition(code, data, PartitionEvent::KeypadLockout)?,
        inbound::PARTITION_FAILED_TO_ARM => partition(code, data, PartitionEvent::FailedToArm)?,
        inbound::PGM_OUTPUT_IN_PROGRESS => {
            partition(code, data, PartitionEvent::PgmOutputInProgress)?
        }
        inbound::CHIME_ENABLED => partition(code, data, PartitionEvent::ChimeEnabled)?,
        inbound::CHIME_DISABLED => partition(code, data, PartitionEvent::ChimeDisabled)?,
        inbound::INVALID_ACCESS_CODE => {
            partition(code, data, PartitionEvent::InvalidAccessCode)?
        }
        inbound::FUNCTION_NOT_AVAILABLE => {
            partition(code, data, PartitionEvent::FunctionNotAvailable)?
        }
        inbound::FAILURE_TO_ARM => partition(code, data, PartitionEvent::FailureToArm)?,
        inbound::PARTITION_BUSY => partition(code, data, PartitionEvent::Busy)?,
        inbound::ARMING_IN_PROGRESS => partition(code, data, PartitionEvent::ArmingInProgress)?,
        inbound::USER_CLOSING => {
            let user = user_number(code, data)?;
            partition(code, data, PartitionEvent::UserClosing { user })?
        }
        inbound::SPECIAL_CLOSING => partition(code, data, PartitionEvent::SpecialClosing)?,
        inbound::PARTIAL_CLOSING => partition(code, data, PartitionEvent::PartialClosing)?,
        inbound::USER_OPENING => {
            let user = user_number(code, data)?;
            partition(code, data, PartitionEvent::UserOpening { user })?
        }
        inbound::SPECIAL_OPENING => partition(code, data, PartitionEvent::SpecialOpening)?,
        inbound::TROUBLE_LED_ON => partition(code, data, PartitionEvent::TroubleLedOn)?,
        inbound::TROUBLE_LED_OFF => partition(code, data, PartitionEvent::TroubleLedOff)?,

        inbound::ZONE_ALARM => zone(code, data, ZoneEvent::Alarm)?,
        inbound::ZONE_ALARM_RESTORED => zone(code, data, ZoneEvent::AlarmRestored)?,
        inbound::ZONE_TAMPER => zone(code, data, ZoneEvent::Tamper)?,
        inbound::ZONE_TAMPER_RESTORED => zone(code, data, ZoneEvent::TamperRestored)?,
        inbound::ZONE_FAULT => zone(code, data, ZoneEvent::Fault)?,
        inbound::ZONE_FAULT_RESTORED => zone(code, data, ZoneEvent::FaultRestored)?,
        inbound::ZONE_OPEN => zone(code, data, ZoneEvent::Open)?,
        inbound::ZONE_RESTORED => zone(code, data, ZoneEvent::Restored)?,

        inbound::BYPASSED_ZONES_DUMP => PanelEvent::BypassedZones(
            BypassMap::parse(data).ok_or_else(|| invalid(code, "expected 16 hex characters"))?,
        ),
        inbound::ZONE_TIMER_DUMP => PanelEvent::ZoneTimers(
            ZoneTimers::parse(data)
                .ok_or_else(|| invalid(code, "expected groups of 4 hex characters"))?,
        ),
        inbound::KEYPAD_LED_STATE | inbound::KEYPAD_LED_FLASH => PanelEvent::KeypadLeds {
            leds: LedFlags::from_hex(data).ok_or_else(|| invalid(code, "expected 2 hex characters"))?,
            flashing: code == inbound::KEYPAD_LED_FLASH,
        },
        inbound::COMMAND_OUTPUT_PRESSED => {
            let mut digits = data.chars().map(|c| c.to_digit(10));
            match (digits.next().flatten(), digits.next().flatten()) {
                (Some(p), Some(o)) => PanelEvent::CommandOutputPressed {
                    partition: p as u8,
                    output: o as u8,
                },
                _ => return Err(invalid(code, "expected partition and output digits")),
            }
        }
        inbound::MASTER_CODE_REQUIRED => PanelEvent::MasterCodeRequired,
        inbound::INSTALLER_CODE_REQUIRED => PanelEvent::InstallerCodeRequired,
        inbound::INSTALLERS_MODE => PanelEvent::InstallersMode,
        inbound::RING_DETECTED => PanelEvent::RingDetected,
        inbound::INDOOR_TEMPERATURE | inbound::OUTDOOR_TEMPERATURE => {
            let source = if code == inbound::INDOOR_TEMPERATURE {
                TemperatureSource::Indoor
            } else {
                TemperatureSource::Outdoor
            };
            let thermostat = partition_number(code, data)?;
            let value = data
                .get(1..)
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| invalid(code, "expected thermostat and temperature"))?;
            PanelEvent::Temperature { source, thermostat, value }
        }
        inbound::DURESS_ALARM => PanelEvent::DuressAlarm { code: data.to_string() },
        inbound::BUFFER_NEAR_FULL => PanelEvent::BufferNearFull,
        inbound::VERBOSE_TROUBLE_STATUS => PanelEvent::VerboseTroubleStatus(
            data.get(..2)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| invalid(code, "expected 2 hex characters"))?,
        ),

        _ => PanelEvent::Unrecognized {
            code: code.to_string(),
            data: data.to_string(),
        },
    };

    Ok(event)
}

/// Panel clock from a `550` time broadcast payload (`hhmmMMDDYY`).
pub fn parse_panel_time(data: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(data, "%H%M%m%d%y")
        .map_err(|e| invalid(inbound::TIME_BROADCAST, &e.to_string()))
}

fn invalid(code: &str, details: &str) -> TpiError {
    TpiError::InvalidPayload {
        code: code.to_string(),
        details: details.to_string(),
    }
}

/// Partition number from the first payload digit.
fn partition_number(code: &str, data: &str) -> Result<u8> {
    data.chars()
        .next()
        .and_then(|c| c.to_digit(10))
        .map(|d| d as u8)
        .ok_or_else(|| invalid(code, "missing partition number"))
}

fn partition(code: &str, data: &str, event: PartitionEvent) -> Result<PanelEvent> {
    Ok(PanelEvent::Partition {
        partition: partition_number(code, data)?,
        event,
    })
}

/// Zone number from the trailing 3 payload characters.
fn zone(code: &str, data: &str, event: ZoneEvent) -> Result<PanelEvent> {
    let zone = data
        .len()
        .checked_sub(3)
        .and_then(|start| data.get(start..))
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| invalid(code, "missing zone number"))?;
    Ok(PanelEvent::Zone { zone, event })
}

/// 4-digit user number following the partition digit.
fn user_number(code: &str, data: &str) -> Result<u16> {
    data.get(1..)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(code, "missing user number"))
}

/// Type alias for the event sender held by the listener.
pub type EventSender = tokio::sync::mpsc::Sender<PanelEvent>;

/// Type alias for the event receiver handed to the caller.
pub type EventReceiver = tokio::sync::mpsc::Receiver<PanelEvent>;

/// Create a new event channel with the given capacity (at least 1).
pub fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::channel(capacity.max(1))
}
