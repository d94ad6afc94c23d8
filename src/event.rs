//! Completion event decoding
//!
//! Field layouts are decoded by bt-hci (`FromHciBytes`). Before that, every
//! decoder checks the event code, that the status byte is present, the status
//! itself and the full parameter length; a failed command may complete with a
//! truncated event, so the status is read ahead of the layout. After decoding,
//! the event must refer to the connection (or address, or page) that was asked
//! about.

use bt_hci::event::{ReadRemoteVersionInformationComplete, RemoteNameRequestComplete};
use bt_hci::param::{ConnHandle, Status};
use bt_hci::{FromHciBytes, FromHciBytesError};

use crate::constants::{
    CONNECTION_HANDLE_MASK, HCI_SUCCESS, MAX_DEVICE_NAME_LENGTH,
    READ_REMOTE_EXTENDED_FEATURES_COMPLETE_EVENT, READ_REMOTE_EXTENDED_FEATURES_COMPLETE_LENGTH,
    READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_EVENT, READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_LENGTH,
    READ_REMOTE_VERSION_INFORMATION_COMPLETE_EVENT,
    READ_REMOTE_VERSION_INFORMATION_COMPLETE_LENGTH, REMOTE_NAME_REQUEST_COMPLETE_EVENT,
    REMOTE_NAME_REQUEST_COMPLETE_LENGTH,
};
use crate::peer::DeviceName;
use crate::{BluetoothAddress, DecodeError, EventPacket, InterrogationError, RemoteVersion};

/// Decoded Read Remote Extended Features Complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ExtendedFeaturesPage {
    pub page_number: u8,
    pub max_page_number: u8,
    pub features: u64,
}

/// Read Remote Supported Features Complete parameters
struct SupportedFeaturesComplete {
    handle: ConnHandle,
    lmp_features: [u8; 8],
}

impl<'de> FromHciBytes<'de> for SupportedFeaturesComplete {
    fn from_hci_bytes(data: &'de [u8]) -> Result<(Self, &'de [u8]), FromHciBytesError> {
        let (_, data) = Status::from_hci_bytes(data)?;
        let (handle, data) = ConnHandle::from_hci_bytes(data)?;
        let (lmp_features, data) = <[u8; 8]>::from_hci_bytes(data)?;
        Ok((
            Self {
                handle,
                lmp_features,
            },
            data,
        ))
    }
}

/// Read Remote Extended Features Complete parameters
struct ExtendedFeaturesComplete {
    handle: ConnHandle,
    page_number: u8,
    max_page_number: u8,
    extended_lmp_features: [u8; 8],
}

impl<'de> FromHciBytes<'de> for ExtendedFeaturesComplete {
    fn from_hci_bytes(data: &'de [u8]) -> Result<(Self, &'de [u8]), FromHciBytesError> {
        let (_, data) = Status::from_hci_bytes(data)?;
        let (handle, data) = ConnHandle::from_hci_bytes(data)?;
        let (page_number, data) = u8::from_hci_bytes(data)?;
        let (max_page_number, data) = u8::from_hci_bytes(data)?;
        let (extended_lmp_features, data) = <[u8; 8]>::from_hci_bytes(data)?;
        Ok((
            Self {
                handle,
                page_number,
                max_page_number,
                extended_lmp_features,
            },
            data,
        ))
    }
}

/// Check code, status and length; returns the parameters on success
fn checked_parameters(
    event: &EventPacket,
    expected_code: u8,
    expected_length: usize,
) -> Result<&[u8], InterrogationError> {
    if event.code != expected_code {
        return Err(DecodeError::UnexpectedEvent {
            expected: expected_code,
            actual: event.code,
        }
        .into());
    }

    let params = event.parameters.as_slice();
    let Some(&status) = params.first() else {
        return Err(DecodeError::InsufficientData {
            expected: expected_length,
            actual: 0,
        }
        .into());
    };
    if status != HCI_SUCCESS {
        return Err(InterrogationError::Controller(status));
    }
    if params.len() < expected_length {
        return Err(DecodeError::InsufficientData {
            expected: expected_length,
            actual: params.len(),
        }
        .into());
    }
    Ok(params)
}

fn decode_error(error: FromHciBytesError, expected: usize, actual: usize) -> DecodeError {
    match error {
        FromHciBytesError::InvalidSize => DecodeError::InsufficientData { expected, actual },
        _ => DecodeError::InvalidValue,
    }
}

fn decode<'a, T: FromHciBytes<'a>>(params: &'a [u8], expected: usize) -> Result<T, DecodeError> {
    T::from_hci_bytes(params)
        .map(|(value, _)| value)
        .map_err(|e| decode_error(e, expected, params.len()))
}

fn check_handle(reported: ConnHandle, handle: ConnHandle) -> Result<(), DecodeError> {
    if reported.raw() & CONNECTION_HANDLE_MASK == handle.raw() & CONNECTION_HANDLE_MASK {
        Ok(())
    } else {
        Err(DecodeError::ConnectionHandleMismatch)
    }
}

/// NUL-terminated UTF-8, truncated at the first invalid sequence
fn name_from_bytes(bytes: &[u8]) -> DeviceName {
    let bytes = &bytes[..bytes.len().min(MAX_DEVICE_NAME_LENGTH)];
    let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    let bytes = &bytes[..len];
    let text = match core::str::from_utf8(bytes) {
        Ok(text) => text,
        // Prefix up to valid_up_to() is valid UTF-8 by definition
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or_default(),
    };

    let mut name = DeviceName::new();
    // `bytes` is at most MAX_DEVICE_NAME_LENGTH long, so this always fits
    name.push_str(text).ok();
    name
}

pub(crate) fn decode_remote_name(
    event: &EventPacket,
    address: BluetoothAddress,
) -> Result<DeviceName, InterrogationError> {
    let params = checked_parameters(
        event,
        REMOTE_NAME_REQUEST_COMPLETE_EVENT,
        REMOTE_NAME_REQUEST_COMPLETE_LENGTH,
    )?;
    let (complete, _) = RemoteNameRequestComplete::from_hci_bytes(params).map_err(|e| {
        decode_error(e, REMOTE_NAME_REQUEST_COMPLETE_LENGTH, params.len())
    })?;

    let reported =
        BluetoothAddress::try_from(complete.bd_addr).map_err(|_| DecodeError::AddressMismatch)?;
    if reported != address {
        return Err(DecodeError::AddressMismatch.into());
    }
    Ok(name_from_bytes(&complete.remote_name))
}

pub(crate) fn decode_remote_version(
    event: &EventPacket,
    handle: ConnHandle,
) -> Result<RemoteVersion, InterrogationError> {
    let params = checked_parameters(
        event,
        READ_REMOTE_VERSION_INFORMATION_COMPLETE_EVENT,
        READ_REMOTE_VERSION_INFORMATION_COMPLETE_LENGTH,
    )?;
    let (complete, _) = ReadRemoteVersionInformationComplete::from_hci_bytes(params).map_err(
        |e| decode_error(e, READ_REMOTE_VERSION_INFORMATION_COMPLETE_LENGTH, params.len()),
    )?;
    check_handle(complete.handle, handle)?;

    Ok(RemoteVersion {
        version: complete.version,
        manufacturer: complete.company_id,
        subversion: complete.subversion,
    })
}

pub(crate) fn decode_supported_features(
    event: &EventPacket,
    handle: ConnHandle,
) -> Result<u64, InterrogationError> {
    let params = checked_parameters(
        event,
        READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_EVENT,
        READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_LENGTH,
    )?;
    let complete: SupportedFeaturesComplete =
        decode(params, READ_REMOTE_SUPPORTED_FEATURES_COMPLETE_LENGTH)?;
    check_handle(complete.handle, handle)?;

    Ok(u64::from_le_bytes(complete.lmp_features))
}

pub(crate) fn decode_extended_features(
    event: &EventPacket,
    handle: ConnHandle,
    requested_page: u8,
) -> Result<ExtendedFeaturesPage, InterrogationError> {
    let params = checked_parameters(
        event,
        READ_REMOTE_EXTENDED_FEATURES_COMPLETE_EVENT,
        READ_REMOTE_EXTENDED_FEATURES_COMPLETE_LENGTH,
    )?;
    let complete: ExtendedFeaturesComplete =
        decode(params, READ_REMOTE_EXTENDED_FEATURES_COMPLETE_LENGTH)?;
    check_handle(complete.handle, handle)?;

    if complete.page_number != requested_page {
        return Err(DecodeError::PageMismatch {
            requested: requested_page,
            reported: complete.page_number,
        }
        .into());
    }

    Ok(ExtendedFeaturesPage {
        page_number: complete.page_number,
        max_page_number: complete.max_page_number,
        features: u64::from_le_bytes(complete.extended_lmp_features),
    })
}
