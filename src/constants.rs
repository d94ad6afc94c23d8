//! Interrogation Constants
//!
//! HCI event codes and parameter sizes used by the interrogation procedure, as
//! fixed by the Bluetooth Core Specification (Vol 4, Part E), together with the
//! limits and defaults of this implementation. Command opcodes come from
//! `bt_hci::cmd::link_control`.

/// HCI status code for success
pub const HCI_SUCCESS: u8 = 0x00;

/// Remote Name Request Complete event code
pub const REMOTE_NAME_REQUEST_COMPLETE_EVENT: u8 = 0x07;

/// Read Remote Supported Features Complete event code
pub const READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_EVENT: u8 = 0x0B;

/// Read Remote Version Information Complete event code
pub const READ_REMOTE_VERSION_INFORMATION_COMPLETE_EVENT: u8 = 0x0C;

/// Read Remote Extended Features Complete event code
pub const READ_REMOTE_EXTENDED_FEATURES_COMPLETE_EVENT: u8 = 0x23;

/// Maximum length of an HCI event parameter block
pub const MAX_EVENT_PARAMETERS: usize = 255;

/// HCI event header length (event code + parameter total length)
pub const EVENT_HEADER_LENGTH: usize = 2;

/// Maximum length of a remote device name in bytes
pub const MAX_DEVICE_NAME_LENGTH: usize = 248;

/// Remote Name Request Complete parameter length
pub const REMOTE_NAME_REQUEST_COMPLETE_LENGTH: usize = 1 + BD_ADDR_LENGTH + MAX_DEVICE_NAME_LENGTH;

/// Read Remote Supported Features Complete parameter length
pub const READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_LENGTH: usize = 11;

/// Read Remote Version Information Complete parameter length
pub const READ_REMOTE_VERSION_INFORMATION_COMPLETE_LENGTH: usize = 8;

/// Read Remote Extended Features Complete parameter length
pub const READ_REMOTE_EXTENDED_FEATURES_COMPLETE_LENGTH: usize = 13;

/// Maximum HCI command parameter length used by the interrogation commands
pub const MAX_COMMAND_PARAMETERS: usize = 10;

/// Connection handles occupy the low 12 bits of the handle field
pub const CONNECTION_HANDLE_MASK: u16 = 0x0FFF;

/// `BD_ADDR` length in bytes
pub const BD_ADDR_LENGTH: usize = 6;

/// Page scan repetition mode R1
pub const PAGE_SCAN_REPETITION_MODE_R1: u8 = 0x01;

/// Reserved field value
pub const RESERVED_FIELD: u8 = 0x00;

/// No clock offset specified
pub const NO_CLOCK_OFFSET: u16 = 0x0000;

/// Set in the Clock_Offset parameter when the offset is valid
pub const CLOCK_OFFSET_VALID_FLAG: u16 = 0x8000;

/// Highest LMP feature page stored for a peer (pages 0..=2)
pub const MAX_FEATURE_PAGE: u8 = 2;

/// Number of LMP feature pages stored for a peer
pub const FEATURE_PAGE_COUNT: usize = MAX_FEATURE_PAGE as usize + 1;

