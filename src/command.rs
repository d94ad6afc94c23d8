//! HCI commands issued during interrogation and the dispatcher seam
//!
//! The interrogator does not own the HCI transport. It hands each
//! [`InterrogationCommand`] to a [`CommandDispatcher`], which sends it, waits
//! for the matching completion event and returns the raw [`EventPacket`].
//! Decoding the event is the interrogator's job (see `event.rs`).

use bt_hci::WriteHci;
use bt_hci::cmd::{Cmd, link_control};
use bt_hci::param::ConnHandle;
use heapless::Vec;

use crate::constants::{
    EVENT_HEADER_LENGTH, MAX_COMMAND_PARAMETERS, MAX_EVENT_PARAMETERS,
    READ_REMOTE_EXTENDED_FEATURES_COMPLETE_EVENT, READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_EVENT,
    READ_REMOTE_VERSION_INFORMATION_COMPLETE_EVENT, REMOTE_NAME_REQUEST_COMPLETE_EVENT,
    RESERVED_FIELD,
};
use crate::{BluetoothAddress, DecodeError, DispatchError};

/// Commands sent to the controller while interrogating a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterrogationCommand {
    /// HCI Remote Name Request
    RemoteNameRequest {
        /// Device to page for its name
        bd_addr: BluetoothAddress,
        /// Page scan repetition mode (R0, R1, R2)
        page_scan_repetition_mode: u8,
        /// Clock offset, bit 15 set when valid
        clock_offset: u16,
    },
    /// HCI Read Remote Version Information
    ReadRemoteVersionInformation {
        /// Connection to query
        handle: ConnHandle,
    },
    /// HCI Read Remote Supported Features
    ReadRemoteSupportedFeatures {
        /// Connection to query
        handle: ConnHandle,
    },
    /// HCI Read Remote Extended Features
    ReadRemoteExtendedFeatures {
        /// Connection to query
        handle: ConnHandle,
        /// Feature page to read
        page_number: u8,
    },
}

impl InterrogationCommand {
    /// HCI opcode
    #[must_use]
    pub fn opcode(&self) -> u16 {
        let opcode = match self {
            Self::RemoteNameRequest { .. } => link_control::RemoteNameRequest::OPCODE,
            Self::ReadRemoteVersionInformation { .. } => {
                link_control::ReadRemoteVersionInformation::OPCODE
            }
            Self::ReadRemoteSupportedFeatures { .. } => {
                link_control::ReadRemoteSupportedFeatures::OPCODE
            }
            Self::ReadRemoteExtendedFeatures { .. } => {
                link_control::ReadRemoteExtendedFeatures::OPCODE
            }
        };
        opcode.to_raw()
    }

    /// Code of the event that completes this command
    #[must_use]
    pub fn completion_event(&self) -> u8 {
        match self {
            Self::RemoteNameRequest { .. } => REMOTE_NAME_REQUEST_COMPLETE_EVENT,
            Self::ReadRemoteVersionInformation { .. } => {
                READ_REMOTE_VERSION_INFORMATION_COMPLETE_EVENT
            }
            Self::ReadRemoteSupportedFeatures { .. } => {
                READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_EVENT
            }
            Self::ReadRemoteExtendedFeatures { .. } => READ_REMOTE_EXTENDED_FEATURES_COMPLETE_EVENT,
        }
    }

    /// Command parameters in HCI (little-endian) layout
    #[must_use]
    pub fn parameters(&self) -> Vec<u8, MAX_COMMAND_PARAMETERS> {
        match *self {
            Self::RemoteNameRequest {
                bd_addr,
                page_scan_repetition_mode,
                clock_offset,
            } => encode_parameters(&link_control::RemoteNameRequest::new(
                bd_addr.into(),
                page_scan_repetition_mode,
                RESERVED_FIELD,
                clock_offset,
            )),
            Self::ReadRemoteVersionInformation { handle } => {
                encode_parameters(&link_control::ReadRemoteVersionInformation::new(handle))
            }
            Self::ReadRemoteSupportedFeatures { handle } => {
                encode_parameters(&link_control::ReadRemoteSupportedFeatures::new(handle))
            }
            Self::ReadRemoteExtendedFeatures {
                handle,
                page_number,
            } => encode_parameters(&link_control::ReadRemoteExtendedFeatures::new(
                handle,
                page_number,
            )),
        }
    }
}

/// Serialise a command's parameter block with bt-hci's encoder
fn encode_parameters<C: Cmd>(command: &C) -> Vec<u8, MAX_COMMAND_PARAMETERS> {
    let params = command.params();
    let mut buf = [0u8; MAX_COMMAND_PARAMETERS];
    let len = params.size().min(MAX_COMMAND_PARAMETERS);
    // Every interrogation command fits in MAX_COMMAND_PARAMETERS
    if params.write_hci(&mut buf[..len]).is_err() {
        return Vec::new();
    }
    Vec::from_slice(&buf[..len]).unwrap_or_default()
}

/// A raw HCI event: event code plus parameter bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventPacket {
    /// Event code
    pub code: u8,
    /// Event parameters (without the two-byte event header)
    pub parameters: Vec<u8, MAX_EVENT_PARAMETERS>,
}

impl EventPacket {
    /// Build an event from its code and parameters
    ///
    /// # Errors
    /// Returns `DecodeError::TooLong` if the parameters exceed an HCI event's capacity
    pub fn new(code: u8, parameters: &[u8]) -> Result<Self, DecodeError> {
        let parameters = Vec::from_slice(parameters).map_err(|()| DecodeError::TooLong {
            max: MAX_EVENT_PARAMETERS,
            actual: parameters.len(),
        })?;
        Ok(Self { code, parameters })
    }

    /// Parse an event from wire bytes (`code`, `length`, parameters)
    ///
    /// Bytes beyond the declared length are ignored.
    ///
    /// # Errors
    /// Returns `DecodeError::InsufficientData` if the header is incomplete or the
    /// declared parameter length exceeds the bytes present
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < EVENT_HEADER_LENGTH {
            return Err(DecodeError::InsufficientData {
                expected: EVENT_HEADER_LENGTH,
                actual: bytes.len(),
            });
        }

        let declared = usize::from(bytes[1]);
        let body = &bytes[EVENT_HEADER_LENGTH..];
        if body.len() < declared {
            return Err(DecodeError::InsufficientData {
                expected: declared,
                actual: body.len(),
            });
        }
        Self::new(bytes[0], &body[..declared])
    }
}

/// Sends one HCI command and resolves with its completion event
///
/// This is the seam to the HCI transport. Implementations must:
/// - resolve exactly once per call, with the completion event on success or a
///   [`DispatchError`] when the command could not be sent, was rejected in its
///   Command Status event, or the link went down before completion;
/// - tolerate the returned future being dropped before it resolves (the
///   interrogator drops outstanding commands when a run is cancelled).
///
/// Commands issued concurrently may complete in any order.
#[allow(async_fn_in_trait)]
pub trait CommandDispatcher {
    /// Send `command` and wait for its completion event
    async fn send_command(
        &self,
        command: InterrogationCommand,
    ) -> Result<EventPacket, DispatchError>;
}
