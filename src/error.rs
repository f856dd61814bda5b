// MIT License - Copyright (c) 2021 TJForc
// Error types

use std::fmt;

/// System error codes carried in the payload of a `502` frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemErrorCode {
    /// 000
    NoError,
    /// 001
    ReceiveBufferOverrun,
    /// 002
    ReceiveBufferOverflow,
    /// 003
    TransmitBufferOverflow,
    /// 010
    KeybusTransmitBufferOverrun,
    /// 011
    KeybusTransmitTimeTimeout,
    /// 012
    KeybusTransmitModeTimeout,
    /// 013
    KeybusTransmitKeystringTimeout,
    /// 014
    KeybusNotFunctioning,
    /// 015
    KeybusBusy,
    /// 016
    KeybusBusyLockout,
    /// 017
    KeybusBusyInstallersMode,
    /// 018
    KeybusBusyGeneral,
    /// 020
    CommandSyntaxError,
    /// 021
    CommandPartitionError,
    /// 022
    CommandNotSupported,
    /// 023
    SystemNotArmed,
    /// 024
    SystemNotReadyToArm,
    /// 025
    CommandInvalidLength,
    /// 026
    UserCodeNotRequired,
    /// 027
    InvalidCharacters,
}

impl SystemErrorCode {
    /// Parse the 3-digit payload of a `502` frame.
    pub fn from_code(s: &str) -> Option<Self> {
        match s {
            "000" => Some(Self::NoError),
            "001" => Some(Self::ReceiveBufferOverrun),
            "002" => Some(Self::ReceiveBufferOverflow),
            "003" => Some(Self::TransmitBufferOverflow),
            "010" => Some(Self::KeybusTransmitBufferOverrun),
            "011" => Some(Self::KeybusTransmitTimeTimeout),
            "012" => Some(Self::KeybusTransmitModeTimeout),
            "013" => Some(Self::KeybusTransmitKeystringTimeout),
            "014" => Some(Self::KeybusNotFunctioning),
            "015" => Some(Self::KeybusBusy),
            "016" => Some(Self::KeybusBusyLockout),
            "017" => Some(Self::KeybusBusyInstallersMode),
            "018" => Some(Self::KeybusBusyGeneral),
            "020" => Some(Self::CommandSyntaxError),
            "021" => Some(Self::CommandPartitionError),
            "022" => Some(Self::CommandNotSupported),
            "023" => Some(Self::SystemNotArmed),
            "024" => Some(Self::SystemNotReadyToArm),
            "025" => Some(Self::CommandInvalidLength),
            "026" => Some(Self::UserCodeNotRequired),
            "027" => Some(Self::InvalidCharacters),
            _ => None,
        }
    }

    /// Human-readable description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoError => "No Error",
            Self::ReceiveBufferOverrun => {
                "Receive Buffer Overrun (a command is received while another is still being processed)"
            }
            Self::ReceiveBufferOverflow => "Receive Buffer Overflow",
            Self::TransmitBufferOverflow => "Transmit Buffer Overflow",
            Self::KeybusTransmitBufferOverrun => "Keybus Transmit Buffer Overrun",
            Self::KeybusTransmitTimeTimeout => "Keybus Transmit Time Timeout",
            Self::KeybusTransmitModeTimeout => "Keybus Transmit Mode Timeout",
            Self::KeybusTransmitKeystringTimeout => "Keybus Transmit Keystring Timeout",
            Self::KeybusNotFunctioning => {
                "Keybus Interface Not Functioning (the TPI cannot communicate with the security system)"
            }
            Self::KeybusBusy => "Keybus Busy (Attempting to Disarm or Arm with user code)",
            Self::KeybusBusyLockout => {
                "Keybus Busy - Lockout (The panel is currently in Keypad Lockout - too many disarm attempts)"
            }
            Self::KeybusBusyInstallersMode => {
                "Keybus Busy - Installers Mode (Panel is in installers mode, most functions are unavailable)"
            }
            Self::KeybusBusyGeneral => "Keybus Busy - General Busy (The requested partition is busy)",
            Self::CommandSyntaxError => "API Command Syntax Error",
            Self::CommandPartitionError => {
                "API Command Partition Error (Requested Partition is out of bounds)"
            }
            Self::CommandNotSupported => "API Command Not Supported",
            Self::SystemNotArmed => "API System Not Armed (sent in response to a disarm command)",
            Self::SystemNotReadyToArm => {
                "API System Not Ready to Arm (system is either not-secure, in exit-delay, or already armed)"
            }
            Self::CommandInvalidLength => "API Command Invalid Length",
            Self::UserCodeNotRequired => "API User Code not Required",
            Self::InvalidCharacters => {
                "API Invalid Characters in Command (no alpha characters are allowed except for checksum)"
            }
        }
    }

    /// The wire string representation (e.g., "024").
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoError => "000",
            Self::ReceiveBufferOverrun => "001",
            Self::ReceiveBufferOverflow => "002",
            Self::TransmitBufferOverflow => "003",
            Self::KeybusTransmitBufferOverrun => "010",
            Self::KeybusTransmitTimeTimeout => "011",
            Self::KeybusTransmitModeTimeout => "012",
            Self::KeybusTransmitKeystringTimeout => "013",
            Self::KeybusNotFunctioning => "014",
            Self::KeybusBusy => "015",
            Self::KeybusBusyLockout => "016",
            Self::KeybusBusyInstallersMode => "017",
            Self::KeybusBusyGeneral => "018",
            Self::CommandSyntaxError => "020",
            Self::CommandPartitionError => "021",
            Self::CommandNotSupported => "022",
            Self::SystemNotArmed => "023",
            Self::SystemNotReadyToArm => "024",
            Self::CommandInvalidLength => "025",
            Self::UserCodeNotRequired => "026",
            Self::InvalidCharacters => "027",
        }
    }
}

impl fmt::Display for SystemErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.as_str(), self.description())
    }
}

/// Handshake step at which a login failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginStep {
    /// Waiting for the `505`/`3` password prompt
    Prompt,
    /// Waiting for the `500`/`005` acknowledgment of the password
    PasswordAck,
    /// Waiting for the `505`/`0|1` login result
    LoginResult,
    /// Waiting for the `500`/`056` acknowledgment of time broadcasts
    KeepAliveAck,
}

impl fmt::Display for LoginStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prompt => "login prompt",
            Self::PasswordAck => "password acknowledgment",
            Self::LoginResult => "login result",
            Self::KeepAliveAck => "keep-alive acknowledgment",
        };
        f.write_str(name)
    }
}

/// Failures of the login handshake.
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Expected login prompt, received {received}")]
    UnexpectedPrompt { received: String },

    #[error("Password not acknowledged, received {received}")]
    PasswordNotAcknowledged { received: String },

    #[error("Invalid password")]
    BadPassword,

    #[error("Unexpected login result: {received}")]
    UnexpectedLoginResult { received: String },

    #[error("Time broadcast enable not acknowledged, received {received}")]
    KeepAliveNotAcknowledged { received: String },

    #[error("Timed out waiting for {step}")]
    Timeout { step: LoginStep },

    #[error("Connection closed while waiting for {step}")]
    ConnectionClosed { step: LoginStep },
}

impl LoginError {
    /// The handshake step that failed.
    pub fn step(&self) -> LoginStep {
        match self {
            Self::UnexpectedPrompt { .. } => LoginStep::Prompt,
            Self::PasswordNotAcknowledged { .. } => LoginStep::PasswordAck,
            Self::BadPassword | Self::UnexpectedLoginResult { .. } => LoginStep::LoginResult,
            Self::KeepAliveNotAcknowledged { .. } => LoginStep::KeepAliveAck,
            Self::Timeout { step } | Self::ConnectionClosed { step } => *step,
        }
    }
}

/// All errors that can occur in the envisalink-tpi library.
#[derive(Debug, thiserror::Error)]
pub enum TpiError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection timeout: {addr}")]
    ConnectTimeout { addr: String },

    #[error("Login failed: {0}")]
    Login(#[from] LoginError),

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Socket disconnected")]
    Disconnected,

    #[error("Send lock not acquired")]
    LockTimeout,

    #[error("Invalid command: {details}")]
    InvalidCommand { details: String },

    #[error("Invalid payload for {code}: {details}")]
    InvalidPayload { code: String, details: String },
}

impl TpiError {
    /// Whether this error is transient and the connection should be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            TpiError::Io(_)
            | TpiError::Connect { .. }
            | TpiError::ConnectTimeout { .. }
            | TpiError::WriteTimeout
            | TpiError::Disconnected
            | TpiError::LockTimeout => true,
            TpiError::Login(e) => !matches!(e, LoginError::BadPassword),
            TpiError::InvalidCommand { .. } | TpiError::InvalidPayload { .. } => false,
        }
    }

    /// Whether the device rejected the password.
    pub fn is_bad_credentials(&self) -> bool {
        matches!(self, TpiError::Login(LoginError::BadPassword))
    }
}

pub type Result<T> = std::result::Result<T, TpiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_error_lookup() {
        let code = SystemErrorCode::from_code("024").unwrap();
        assert_eq!(code, SystemErrorCode::SystemNotReadyToArm);
        assert_eq!(code.as_str(), "024");
        assert!(code.to_string().starts_with("024: API System Not Ready to Arm"));
        assert!(SystemErrorCode::from_code("019").is_none());
        assert!(SystemErrorCode::from_code("24").is_none());
    }

    #[test]
    fn test_login_error_step() {
        assert_eq!(LoginError::BadPassword.step(), LoginStep::LoginResult);
        let e = LoginError::Timeout { step: LoginStep::KeepAliveAck };
        assert_eq!(e.step(), LoginStep::KeepAliveAck);
        assert_eq!(e.to_string(), "Timed out waiting for keep-alive acknowledgment");
    }

    #[test]
    fn test_retryable() {
        assert!(TpiError::Disconnected.is_retryable());
        assert!(!TpiError::Login(LoginError::BadPassword).is_retryable());
        assert!(TpiError::Login(LoginError::Timeout { step: LoginStep::Prompt }).is_retryable());
        assert!(
            !TpiError::InvalidCommand { details: "x".into() }.is_retryable()
        );
        assert!(TpiError::Login(LoginError::BadPassword).is_bad_credentials());
    }
}
