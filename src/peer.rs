//! Peer records
//!
//! What the host knows about one remote BR/EDR device. Records live in the
//! [`PeerCache`](crate::PeerCache); the interrogator only ever replaces whole
//! fields through the cache's update closure.

use crate::constants::MAX_DEVICE_NAME_LENGTH;
use crate::{BluetoothAddress, LmpFeatureSet};
use bt_hci::param::CoreSpecificationVersion;
use heapless::String;

/// Stable peer identifier assigned by the peer cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeerId(pub u64);

impl core::fmt::Display for PeerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "peer:{:016x}", self.0)
    }
}

/// Remote device name as reported by Remote Name Request
pub type DeviceName = String<MAX_DEVICE_NAME_LENGTH>;

/// Link Manager version information of a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RemoteVersion {
    /// LMP version (Bluetooth Assigned Numbers, "Link Manager Protocol" versions)
    pub version: CoreSpecificationVersion,
    /// Company identifier of the controller manufacturer
    pub manufacturer: u16,
    /// Manufacturer-specific LMP subversion
    pub subversion: u16,
}

impl RemoteVersion {
    /// Core Specification release matching the LMP version
    #[must_use]
    pub fn core_specification(&self) -> &'static str {
        match self.version {
            CoreSpecificationVersion::VERSION_1_1 => "1.1",
            CoreSpecificationVersion::VERSION_1_2 => "1.2",
            CoreSpecificationVersion::VERSION_2_0_EDR => "2.0 + EDR",
            CoreSpecificationVersion::VERSION_2_1_EDR => "2.1 + EDR",
            CoreSpecificationVersion::VERSION_3_0_HS => "3.0 + HS",
            CoreSpecificationVersion::VERSION_4_0 => "4.0",
            CoreSpecificationVersion::VERSION_4_1 => "4.1",
            CoreSpecificationVersion::VERSION_4_2 => "4.2",
            CoreSpecificationVersion::VERSION_5_0 => "5.0",
            CoreSpecificationVersion::VERSION_5_1 => "5.1",
            CoreSpecificationVersion::VERSION_5_2 => "5.2",
            CoreSpecificationVersion::VERSION_5_3 => "5.3",
            CoreSpecificationVersion::VERSION_5_4 => "5.4",
            _ => "unknown",
        }
    }
}

/// Known state of one remote device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    id: PeerId,
    address: BluetoothAddress,
    name: Option<DeviceName>,
    version: Option<RemoteVersion>,
    features: LmpFeatureSet,
    page_scan_repetition_mode: Option<u8>,
    clock_offset: Option<u16>,
}

impl PeerRecord {
    /// Create an empty record
    #[must_use]
    pub fn new(id: PeerId, address: BluetoothAddress) -> Self {
        Self {
            id,
            address,
            name: None,
            version: None,
            features: LmpFeatureSet::new(),
            page_scan_repetition_mode: None,
            clock_offset: None,
        }
    }

    /// Record paging parameters learned from an inquiry result
    #[must_use]
    pub fn with_page_scan_info(mut self, repetition_mode: u8, clock_offset: u16) -> Self {
        self.page_scan_repetition_mode = Some(repetition_mode);
        self.clock_offset = Some(clock_offset);
        self
    }

    /// Peer identifier
    #[must_use]
    pub fn id(&self) -> PeerId {
        self.id
    }

    /// Device address
    #[must_use]
    pub fn address(&self) -> BluetoothAddress {
        self.address
    }

    /// Remote name, if a name request has succeeded
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Version information, if a version request has succeeded
    #[must_use]
    pub fn version(&self) -> Option<RemoteVersion> {
        self.version
    }

    /// LMP feature pages read so far
    #[must_use]
    pub fn features(&self) -> &LmpFeatureSet {
        &self.features
    }

    /// Page scan repetition mode from inquiry, if known
    #[must_use]
    pub fn page_scan_repetition_mode(&self) -> Option<u8> {
        self.page_scan_repetition_mode
    }

    /// Clock offset from inquiry (bits 16..2 of CLKNslave - CLK), if known
    #[must_use]
    pub fn clock_offset(&self) -> Option<u16> {
        self.clock_offset
    }

    /// Replace the remote name
    pub fn set_name(&mut self, name: DeviceName) {
        self.name = Some(name);
    }

    /// Replace the version information
    pub fn set_version(&mut self, version: RemoteVersion) {
        self.version = Some(version);
    }

    /// Replace one LMP feature page
    pub fn set_feature_page(&mut self, page: u8, bits: u64) {
        self.features.set_page(page, bits);
    }

    /// Record the highest feature page the device claims
    pub fn set_last_page_number(&mut self, page: u8) {
        self.features.set_last_page_number(page);
    }

    /// Update paging parameters (e.g. from a later inquiry result)
    pub fn set_page_scan_info(&mut self, repetition_mode: u8, clock_offset: u16) {
        self.page_scan_repetition_mode = Some(repetition_mode);
        self.clock_offset = Some(clock_offset);
    }
}
