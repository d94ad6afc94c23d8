//! LMP Feature Pages
//!
//! A remote device advertises its Link Manager capabilities as a paged bitmap.
//! Page 0 comes from Read Remote Supported Features; pages 1 and up come from
//! Read Remote Extended Features and are only present when page 0 sets the
//! extended features bit (Core Specification Vol 2, Part C, 3.3).

use crate::constants::{FEATURE_PAGE_COUNT, MAX_FEATURE_PAGE};

/// A single LMP feature bit, addressed by page and bit index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LmpFeature {
    /// Feature page
    pub page: u8,
    /// Bit index within the page (0..64)
    pub bit: u8,
}

impl LmpFeature {
    /// 3-slot packets
    pub const THREE_SLOT_PACKETS: Self = Self::new(0, 0);
    /// 5-slot packets
    pub const FIVE_SLOT_PACKETS: Self = Self::new(0, 1);
    /// Encryption
    pub const ENCRYPTION: Self = Self::new(0, 2);
    /// Role switch
    pub const ROLE_SWITCH: Self = Self::new(0, 5);
    /// Sniff mode
    pub const SNIFF_MODE: Self = Self::new(0, 7);
    /// Enhanced Data Rate ACL 2 Mb/s mode
    pub const EDR_ACL_2MBPS: Self = Self::new(0, 25);
    /// Enhanced Data Rate ACL 3 Mb/s mode
    pub const EDR_ACL_3MBPS: Self = Self::new(0, 26);
    /// Extended Inquiry Response
    pub const EXTENDED_INQUIRY_RESPONSE: Self = Self::new(0, 48);
    /// Secure Simple Pairing (controller support)
    pub const SECURE_SIMPLE_PAIRING_CONTROLLER: Self = Self::new(0, 51);
    /// Extended features: more pages are available
    pub const EXTENDED_FEATURES: Self = Self::new(0, 63);
    /// Secure Simple Pairing (host support)
    pub const SECURE_SIMPLE_PAIRING_HOST: Self = Self::new(1, 0);
    /// LE supported (host)
    pub const LE_SUPPORTED_HOST: Self = Self::new(1, 1);
    /// Simultaneous LE and BR/EDR to same device capable (host)
    pub const SIMULTANEOUS_LE_BREDR_HOST: Self = Self::new(1, 2);
    /// Secure Connections (host support)
    pub const SECURE_CONNECTIONS_HOST: Self = Self::new(1, 3);
    /// Secure Connections (controller support)
    pub const SECURE_CONNECTIONS_CONTROLLER: Self = Self::new(2, 8);
    /// Ping
    pub const PING: Self = Self::new(2, 9);

    /// Create a feature reference
    #[must_use]
    pub const fn new(page: u8, bit: u8) -> Self {
        Self { page, bit }
    }
}

/// Paged LMP feature bitmap of a remote device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LmpFeatureSet {
    pages: [u64; FEATURE_PAGE_COUNT],
    /// Bit `n` set when page `n` has been read
    valid_pages: u8,
    last_page_number: u8,
}

impl LmpFeatureSet {
    /// Create an empty feature set
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pages: [0; FEATURE_PAGE_COUNT],
            valid_pages: 0,
            last_page_number: 0,
        }
    }

    /// Whether `page` has been read
    #[must_use]
    pub fn has_page(&self, page: u8) -> bool {
        page <= MAX_FEATURE_PAGE && self.valid_pages & (1 << page) != 0
    }

    /// Feature bits of `page`, if it has been read
    #[must_use]
    pub fn page(&self, page: u8) -> Option<u64> {
        self.has_page(page).then(|| self.pages[usize::from(page)])
    }

    /// Whether `bit` of `page` is set. Unread pages have no bits set.
    #[must_use]
    pub fn has_bit(&self, page: u8, bit: u8) -> bool {
        bit < 64 && self.page(page).is_some_and(|bits| bits & (1 << bit) != 0)
    }

    /// Whether `feature` is supported
    #[must_use]
    pub fn has_feature(&self, feature: LmpFeature) -> bool {
        self.has_bit(feature.page, feature.bit)
    }

    /// Replace the bits of `page`. Pages beyond [`MAX_FEATURE_PAGE`] are ignored.
    ///
    /// Writing page 0 without the extended features bit drops the higher pages
    /// and resets the last page number, since the device no longer claims them.
    pub fn set_page(&mut self, page: u8, bits: u64) {
        if page > MAX_FEATURE_PAGE {
            return;
        }
        self.pages[usize::from(page)] = bits;
        self.valid_pages |= 1 << page;

        if page == 0 && !self.has_feature(LmpFeature::EXTENDED_FEATURES) {
            self.valid_pages = 1;
            self.pages[1..].fill(0);
            self.last_page_number = 0;
        }
    }

    /// Highest page the device claims to support, clamped to [`MAX_FEATURE_PAGE`]
    #[must_use]
    pub fn last_page_number(&self) -> u8 {
        self.last_page_number
    }

    /// Record the highest page the device claims to support
    pub fn set_last_page_number(&mut self, page: u8) {
        self.last_page_number = page.min(MAX_FEATURE_PAGE);
    }
}
