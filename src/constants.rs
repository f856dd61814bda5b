// MIT License - Copyright (c) 2021 TJForc
// TPI protocol constants

use std::time::Duration;

/// TCP port the EnvisaLink TPI listens on.
pub const DEFAULT_PORT: u16 = 4025;

/// Frame terminator.
pub const CRLF: &[u8; 2] = b"\r\n";

/// Read timeout used while logging in (also bounds the TCP connect).
pub const LOGIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Read timeout once streaming. The device sends a time broadcast roughly
/// every 4 minutes, so 5 minutes of silence means the link is gone.
pub const LISTEN_TIMEOUT: Duration = Duration::from_secs(300);

/// How long `shutdown` waits for the listener to exit.
pub const SHUTDOWN_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on waiting for the send lock.
pub const SEND_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on a single frame write.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Data payloads sent during login.
pub const LOGIN_PROMPT: &str = "3";
pub const LOGIN_SUCCESS: &str = "1";
pub const LOGIN_FAILED: &str = "0";

/// Outbound (client → device) command codes.
pub mod outbound {
    pub const STATUS_REPORT: &str = "001";
    pub const NETWORK_LOGIN: &str = "005";
    pub const SET_TIME: &str = "010";
    pub const ACTIVATE_COMMAND_OUTPUT: &str = "020";
    pub const ARM_AWAY: &str = "030";
    pub const ARM_STAY: &str = "031";
    pub const ARM_ZERO_ENTRY: &str = "032";
    pub const ARM_WITH_CODE: &str = "033";
    pub const DISARM: &str = "040";
    pub const TIMESTAMP_CONTROL: &str = "055";
    pub const TIME_BROADCAST_CONTROL: &str = "056";
    pub const TEMPERATURE_BROADCAST_CONTROL: &str = "057";
    pub const TRIGGER_PANIC: &str = "060";
    pub const SEND_KEYSTROKE: &str = "070";
    pub const SEND_KEYSTROKES: &str = "071";
    pub const KEEP_ALIVE: &str = "074";
    pub const SEND_CODE: &str = "200";
}

/// Inbound (device → client) codes.
pub mod inbound {
    pub const ACK: &str = "500";
    pub const CHECKSUM_ERROR: &str = "501";
    pub const SYSTEM_ERROR: &str = "502";
    pub const LOGIN_INTERACTION: &str = "505";
    pub const KEYPAD_LED_STATE: &str = "510";
    pub const KEYPAD_LED_FLASH: &str = "511";
    pub const TIME_BROADCAST: &str = "550";
    pub const RING_DETECTED: &str = "560";
    pub const INDOOR_TEMPERATURE: &str = "561";
    pub const OUTDOOR_TEMPERATURE: &str = "562";

    pub const ZONE_ALARM: &str = "601";
    pub const ZONE_ALARM_RESTORED: &str = "602";
    pub const ZONE_TAMPER: &str = "603";
    pub const ZONE_TAMPER_RESTORED: &str = "604";
    pub const ZONE_FAULT: &str = "605";
    pub const ZONE_FAULT_RESTORED: &str = "606";
    pub const ZONE_OPEN: &str = "609";
    pub const ZONE_RESTORED: &str = "610";
    pub const ZONE_TIMER_DUMP: &str = "615";
    pub const BYPASSED_ZONES_DUMP: &str = "616";

    pub const DURESS_ALARM: &str = "620";
    pub const FIRE_KEY_ALARM: &str = "621";
    pub const FIRE_KEY_RESTORED: &str = "622";
    pub const AUX_KEY_ALARM: &str = "623";
    pub const AUX_KEY_RESTORED: &str = "624";
    pub const PANIC_KEY_ALARM: &str = "625";
    pub const PANIC_KEY_RESTORED: &str = "626";
    pub const SMOKE_ALARM: &str = "631";
    pub const SMOKE_RESTORED: &str = "632";

    pub const PARTITION_READY: &str = "650";
    pub const PARTITION_NOT_READY: &str = "651";
    pub const PARTITION_ARMED: &str = "652";
    pub const PARTITION_READY_FORCE_ARM: &str = "653";
    pub const PARTITION_IN_ALARM: &str = "654";
    pub const PARTITION_DISARMED: &str = "655";
    pub const EXIT_DELAY: &str = "656";
    pub const ENTRY_DELAY: &str = "657";
    pub const KEYPAD_LOCKOUT: &str = "658";
    pub const PARTITION_FAILED_TO_ARM: &str = "659";
    pub const PGM_OUTPUT_IN_PROGRESS: &str = "660";
    pub const CHIME_ENABLED: &str = "663";
    pub const CHIME_DISABLED: &str = "664";
    pub const INVALID_ACCESS_CODE: &str = "670";
    pub const FUNCTION_NOT_AVAILABLE: &str = "671";
    pub const FAILURE_TO_ARM: &str = "672";
    pub const PARTITION_BUSY: &str = "673";
    pub const ARMING_IN_PROGRESS: &str = "674";
    pub const INSTALLERS_MODE: &str = "680";

    pub const USER_CLOSING: &str = "700";
    pub const SPECIAL_CLOSING: &str = "701";
    pub const PARTIAL_CLOSING: &str = "702";
    pub const USER_OPENING: &str = "750";
    pub const SPECIAL_OPENING: &str = "751";

    pub const BATTERY_TROUBLE: &str = "800";
    pub const BATTERY_TROUBLE_RESTORED: &str = "801";
    pub const AC_TROUBLE: &str = "802";
    pub const AC_TROUBLE_RESTORED: &str = "803";
    pub const BELL_TROUBLE: &str = "806";
    pub const BELL_TROUBLE_RESTORED: &str = "807";
    pub const FTC_TROUBLE: &str = "814";
    pub const FTC_TROUBLE_RESTORED: &str = "815";
    pub const BUFFER_NEAR_FULL: &str = "816";
    pub const SYSTEM_TAMPER: &str = "829";
    pub const SYSTEM_TAMPER_RESTORED: &str = "830";
    pub const TROUBLE_LED_ON: &str = "840";
    pub const TROUBLE_LED_OFF: &str = "841";
    pub const FIRE_TROUBLE: &str = "842";
    pub const FIRE_TROUBLE_RESTORED: &str = "843";
    pub const VERBOSE_TROUBLE_STATUS: &str = "849";

    pub const CODE_REQUIRED: &str = "900";
    pub const COMMAND_OUTPUT_PRESSED: &str = "912";
    pub const MASTER_CODE_REQUIRED: &str = "921";
    pub const INSTALLER_CODE_REQUIRED: &str = "922";
}

/// Keystrokes that make the keypad dump bypassed zones (enter and leave
/// the bypass menu).
pub const KEYS_DUMP_BYPASS_ZONES: &str = "*1#";

/// Keystrokes that toggle the door chime.
pub const KEYS_TOGGLE_DOOR_CHIME: &str = "*4";

/// Highest partition number the TPI addresses.
pub const MAX_PARTITIONS: u8 = 8;

/// Highest zone number covered by the bypass and timer dumps.
pub const MAX_ZONES: u16 = 64;

/// Highest command output number per partition.
pub const MAX_COMMAND_OUTPUTS: u8 = 4;

/// Seconds represented by one tick of a zone timer register.
pub const ZONE_TIMER_TICK_SECS: u32 = 5;
