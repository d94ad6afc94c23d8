#![no_std]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]
#![allow(clippy::too_many_lines)]

// Must come first so the logging macros are visible in every module below.
mod fmt;

mod address;
mod command;
pub mod constants;
mod error;
mod event;
mod features;
mod interrogator;
mod peer;
mod peer_cache;

use crate::constants::{MAX_FEATURE_PAGE, PAGE_SCAN_REPETITION_MODE_R1};

pub use address::{BluetoothAddress, InvalidAddress};
pub use bt_hci::param::{ConnHandle, CoreSpecificationVersion};
pub use command::{CommandDispatcher, EventPacket, InterrogationCommand};
pub use error::{DecodeError, DispatchError, InterrogationError, PeerCacheError};
pub use features::{LmpFeature, LmpFeatureSet};
pub use interrogator::Interrogator;
pub use peer::{DeviceName, PeerId, PeerRecord, RemoteVersion};
pub use peer_cache::PeerCache;

/// Options for configuring an [`Interrogator`]
///
/// # Examples
///
/// ```rust
/// use bredr_interrogator::{InterrogatorOptions, constants};
///
/// // Use default options
/// let default_options = InterrogatorOptions::default();
/// assert_eq!(default_options.max_extended_page, constants::MAX_FEATURE_PAGE);
///
/// // Only read page 0 and page 1 of the remote feature mask
/// let page_one_only = InterrogatorOptions {
///     max_extended_page: 1,
///     ..InterrogatorOptions::default()
/// };
/// assert!(page_one_only.read_extended_features);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterrogatorOptions {
    /// Page scan repetition mode for Remote Name Request when the peer's is unknown
    ///
    /// Peers discovered through inquiry carry their own mode, which takes precedence.
    pub page_scan_repetition_mode: u8,
    /// Highest extended feature page to read (at most [`MAX_FEATURE_PAGE`])
    pub max_extended_page: u8,
    /// Read extended feature pages when page 0 advertises them
    pub read_extended_features: bool,
}

impl Default for InterrogatorOptions {
    fn default() -> Self {
        Self {
            page_scan_repetition_mode: PAGE_SCAN_REPETITION_MODE_R1,
            max_extended_page: MAX_FEATURE_PAGE,
            read_extended_features: true,
        }
    }
}
