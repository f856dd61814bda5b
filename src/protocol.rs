// MIT License - Copyright (c) 2021 TJForc
// Outbound TPI commands

use chrono::NaiveDateTime;

use crate::constants::{outbound, MAX_COMMAND_OUTPUTS, MAX_PARTITIONS};
use crate::error::{Result, TpiError};

/// Arming mode reported with a `652` partition-armed event and used to pick
/// the arming command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmingMode {
    /// Full/away arm
    Away,
    /// Stay/home arm
    Stay,
    /// Away with no entry delay
    AwayZeroEntry,
    /// Stay with no entry delay
    StayZeroEntry,
}

impl ArmingMode {
    /// Parse the mode digit of a `652` payload.
    pub fn from_digit(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Away),
            '1' => Some(Self::Stay),
            '2' => Some(Self::AwayZeroEntry),
            '3' => Some(Self::StayZeroEntry),
            _ => None,
        }
    }
}

/// Which panic alarm `060` triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicKind {
    Fire,
    Ambulance,
    Police,
}

impl PanicKind {
    fn as_digit(&self) -> char {
        match self {
            Self::Fire => '1',
            Self::Ambulance => '2',
            Self::Police => '3',
        }
    }
}

/// Commands that can be sent to the EnvisaLink.
///
/// Every command is acknowledged by a `500` frame echoing its code. Results
/// of the command (state changes, errors) arrive later as asynchronous
/// events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `001`: Ask the panel to report status of all partitions and zones.
    StatusReport,
    /// `005<password>`: Network login. Only valid during the handshake.
    NetworkLogin { password: String },
    /// `010hhmmMMDDYY`: Set panel date and time.
    SetTime(NaiveDateTime),
    /// `020<partition><output>`: Activate a command output (1-4).
    ActivateCommandOutput { partition: u8, output: u8 },
    /// `030<partition>`: Arm away.
    ArmAway { partition: u8 },
    /// `031<partition>`: Arm stay.
    ArmStay { partition: u8 },
    /// `032<partition>`: Arm with no entry delay.
    ArmZeroEntry { partition: u8 },
    /// `033<partition><code>`: Arm with a user code.
    ArmWithCode { partition: u8, code: String },
    /// `040<partition><code>`: Disarm with a user code.
    Disarm { partition: u8, code: String },
    /// `055<0|1>`: Prefix broadcasts with a timestamp.
    TimestampControl { enabled: bool },
    /// `056<0|1>`: Periodic time broadcasts, used as keep-alive.
    /// Disabling them is also how the session stops its listener.
    TimeBroadcastControl { enabled: bool },
    /// `057<0|1>`: Temperature broadcasts.
    TemperatureBroadcastControl { enabled: bool },
    /// `060<1|2|3>`: Trigger a panic alarm.
    TriggerPanic(PanicKind),
    /// `070<key>`: Send a single keystroke.
    SendKeystroke { key: char },
    /// `071<partition><keys>`: Send up to 6 keystrokes to a partition keypad.
    SendKeystrokes { partition: u8, keys: String },
    /// `074<partition>`: Keep-alive for a partition keypad.
    KeepAlive { partition: u8 },
    /// `200<code>`: Answer a code request.
    SendCode { code: String },
    /// Any other code and payload.
    Raw { code: String, data: String },
}

impl Command {
    /// The 3-digit command code.
    pub fn code(&self) -> &str {
        match self {
            Command::StatusReport => outbound::STATUS_REPORT,
            Command::NetworkLogin { .. } => outbound::NETWORK_LOGIN,
            Command::SetTime(_) => outbound::SET_TIME,
            Command::ActivateCommandOutput { .. } => outbound::ACTIVATE_COMMAND_OUTPUT,
            Command::ArmAway { .. } => outbound::ARM_AWAY,
            Command::ArmStay { .. } => outbound::ARM_STAY,
            Command::ArmZeroEntry { .. } => outbound::ARM_ZERO_ENTRY,
            Command::ArmWithCode { .. } => outbound::ARM_WITH_CODE,
            Command::Disarm { .. } => outbound::DISARM,
            Command::TimestampControl { .. } => outbound::TIMESTAMP_CONTROL,
            Command::TimeBroadcastControl { .. } => outbound::TIME_BROADCAST_CONTROL,
            Command::TemperatureBroadcastControl { .. } => outbound::TEMPERATURE_BROADCAST_CONTROL,
            Command::TriggerPanic(_) => outbound::TRIGGER_PANIC,
            Command::SendKeystroke { .. } => outbound::SEND_KEYSTROKE,
            Command::SendKeystrokes { .. } => outbound::SEND_KEYSTROKES,
            Command::KeepAlive { .. } => outbound::KEEP_ALIVE,
            Command::SendCode { .. } => outbound::SEND_CODE,
            Command::Raw { code, .. } => code,
        }
    }

    /// The data payload.
    pub fn data(&self) -> String {
        match self {
            Command::StatusReport => String::new(),
            Command::NetworkLogin { password } => password.clone(),
            Command::SetTime(t) => t.format("%H%M%m%d%y").to_string(),
            Command::ActivateCommandOutput { partition, output } => {
                format!("{}{}", partition, output)
            }
            Command::ArmAway { partition }
            | Command::ArmStay { partition }
            | Command::ArmZeroEntry { partition }
            | Command::KeepAlive { partition } => partition.to_string(),
            Command::ArmWithCode { partition, code } | Command::Disarm { partition, code } => {
                format!("{}{}", partition, code)
            }
            Command::TimestampControl { enabled }
            | Command::TimeBroadcastControl { enabled }
            | Command::TemperatureBroadcastControl { enabled } => flag(*enabled).to_string(),
            Command::TriggerPanic(kind) => kind.as_digit().to_string(),
            Command::SendKeystroke { key } => key.to_string(),
            Command::SendKeystrokes { partition, keys } => format!("{}{}", partition, keys),
            Command::SendCode { code } => code.clone(),
            Command::Raw { data, .. } => data.clone(),
        }
    }

    /// Build the arming command for a mode. Stay with no entry delay has no
    /// dedicated command and maps to plain stay.
    pub fn arm(partition: u8, mode: ArmingMode) -> Self {
        match mode {
            ArmingMode::Away => Command::ArmAway { partition },
            ArmingMode::Stay | ArmingMode::StayZeroEntry => Command::ArmStay { partition },
            ArmingMode::AwayZeroEntry => Command::ArmZeroEntry { partition },
        }
    }

    /// Check argument ranges before the command goes on the wire.
    pub fn validate(&self) -> Result<()> {
        match self {
            Command::ArmAway { partition }
            | Command::ArmStay { partition }
            | Command::ArmZeroEntry { partition }
            | Command::KeepAlive { partition } => check_partition(*partition),
            Command::ArmWithCode { partition, code } | Command::Disarm { partition, code } => {
                check_partition(*partition)?;
                check_user_code(code)
            }
            Command::SendCode { code } => check_user_code(code),
            Command::ActivateCommandOutput { partition, output } => {
                check_partition(*partition)?;
                if !(1..=MAX_COMMAND_OUTPUTS).contains(output) {
                    return Err(invalid(format!(
                        "command output {} out of range 1-{}",
                        output, MAX_COMMAND_OUTPUTS
                    )));
                }
                Ok(())
            }
            Command::SendKeystrokes { partition, keys } => {
                check_partition(*partition)?;
                if keys.is_empty() || keys.len() > 6 {
                    return Err(invalid(format!("expected 1-6 keystrokes, got {}", keys.len())));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

fn flag(enabled: bool) -> char {
    if enabled { '1' } else { '0' }
}

fn invalid(details: String) -> TpiError {
    TpiError::InvalidCommand { details }
}

fn check_partition(partition: u8) -> Result<()> {
    if (1..=MAX_PARTITIONS).contains(&partition) {
        Ok(())
    } else {
        Err(invalid(format!("partition {} out of range 1-{}", partition, MAX_PARTITIONS)))
    }
}

fn check_user_code(code: &str) -> Result<()> {
    if (4..=6).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(invalid("user code must be 4-6 digits".to_string()))
    }
}

/// Check that a code is exactly 3 ASCII digits and the data is printable
/// ASCII without a line terminator.
pub fn validate_frame_fields(code: &str, data: &str) -> Result<()> {
    if code.len() != 3 || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(format!("command code must be 3 digits, got {:?}", code)));
    }
    if !data.bytes().all(|b| b.is_ascii_graphic() || b == b' ') {
        return Err(invalid(format!("data must be printable ASCII, got {:?}", data)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn wire(cmd: &Command) -> (String, String) {
        (cmd.code().to_string(), cmd.data())
    }

    #[test]
    fn test_command_wire_fields() {
        assert_eq!(wire(&Command::StatusReport), ("001".into(), "".into()));
        assert_eq!(
            wire(&Command::NetworkLogin { password: "user".into() }),
            ("005".into(), "user".into())
        );
        assert_eq!(wire(&Command::ArmAway { partition: 1 }), ("030".into(), "1".into()));
        assert_eq!(
            wire(&Command::Disarm { partition: 2, code: "1234".into() }),
            ("040".into(), "21234".into())
        );
        assert_eq!(
            wire(&Command::TimeBroadcastControl { enabled: false }),
            ("056".into(), "0".into())
        );
        assert_eq!(
            wire(&Command::TriggerPanic(PanicKind::Police)),
            ("060".into(), "3".into())
        );
        assert_eq!(
            wire(&Command::SendKeystrokes { partition: 1, keys: "*1#".into() }),
            ("071".into(), "1*1#".into())
        );
        assert_eq!(
            wire(&Command::ActivateCommandOutput { partition: 1, output: 2 }),
            ("020".into(), "12".into())
        );
    }

    #[test]
    fn test_set_time_format() {
        let t = NaiveDate::from_ymd_opt(2024, 3, 7)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(wire(&Command::SetTime(t)), ("010".into(), "0905030724".into()));
    }

    #[test]
    fn test_arm_from_mode() {
        assert_eq!(Command::arm(1, ArmingMode::Away), Command::ArmAway { partition: 1 });
        assert_eq!(Command::arm(2, ArmingMode::Stay), Command::ArmStay { partition: 2 });
        assert_eq!(
            Command::arm(3, ArmingMode::AwayZeroEntry),
            Command::ArmZeroEntry { partition: 3 }
        );
    }

    #[test]
    fn test_validate_ranges() {
        assert!(Command::ArmAway { partition: 1 }.validate().is_ok());
        assert!(Command::ArmAway { partition: 0 }.validate().is_err());
        assert!(Command::ArmAway { partition: 9 }.validate().is_err());
        assert!(Command::Disarm { partition: 1, code: "12a4".into() }.validate().is_err());
        assert!(Command::Disarm { partition: 1, code: "123456".into() }.validate().is_ok());
        assert!(
            Command::ActivateCommandOutput { partition: 1, output: 5 }
                .validate()
                .is_err()
        );
        assert!(
            Command::SendKeystrokes { partition: 1, keys: "1234567".into() }
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_validate_frame_fields() {
        assert!(validate_frame_fields("001", "").is_ok());
        assert!(validate_frame_fields("071", "1*1#").is_ok());
        assert!(validate_frame_fields("01", "").is_err());
        assert!(validate_frame_fields("0a1", "").is_err());
        assert!(validate_frame_fields("001", "1\r\n").is_err());
    }

    #[test]
    fn test_arming_mode_digits() {
        assert_eq!(ArmingMode::from_digit('0'), Some(ArmingMode::Away));
        assert_eq!(ArmingMode::from_digit('3'), Some(ArmingMode::StayZeroEntry));
        assert_eq!(ArmingMode::from_digit('4'), None);
    }
}
