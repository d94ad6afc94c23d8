use crate::constants::BD_ADDR_LENGTH;

/// Returned when bytes or text do not form a valid `BD_ADDR`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InvalidAddress;

impl core::fmt::Display for InvalidAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Invalid Bluetooth device address")
    }
}

/// A Bluetooth Device Address (`BD_ADDR`) in HCI (little-endian) byte order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BluetoothAddress(pub [u8; BD_ADDR_LENGTH]);

impl BluetoothAddress {
    /// Create a new Bluetooth address from bytes
    #[must_use]
    pub const fn new(addr: [u8; BD_ADDR_LENGTH]) -> Self {
        Self(addr)
    }

    /// Get the raw address bytes
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; BD_ADDR_LENGTH] {
        &self.0
    }

    /// Format the address as a colon-separated hex string, most significant byte first
    #[must_use]
    pub fn format_hex(&self) -> heapless::String<17> {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";

        let mut result = heapless::String::new();
        for (i, byte) in self.0.iter().rev().enumerate() {
            if i > 0 {
                result.push(':').ok();
            }
            result.push(char::from(HEX[usize::from(byte >> 4)])).ok();
            result.push(char::from(HEX[usize::from(byte & 0x0F)])).ok();
        }
        result
    }

    /// Parse a Bluetooth address from a colon-separated hex string (most significant byte first)
    ///
    /// # Errors
    /// Returns `InvalidAddress` if the string is not exactly 17 characters long or contains invalid characters
    pub fn from_hex(hex: &str) -> Result<Self, InvalidAddress> {
        if hex.len() != 17 {
            return Err(InvalidAddress);
        }

        let mut bytes = [0u8; BD_ADDR_LENGTH];
        let mut count = 0;
        for (i, part) in hex.split(':').enumerate() {
            if i >= BD_ADDR_LENGTH || part.len() != 2 {
                return Err(InvalidAddress);
            }
            bytes[BD_ADDR_LENGTH - 1 - i] =
                u8::from_str_radix(part, 16).map_err(|_| InvalidAddress)?;
            count += 1;
        }
        if count != BD_ADDR_LENGTH {
            return Err(InvalidAddress);
        }
        Ok(Self(bytes))
    }
}

impl core::fmt::Display for BluetoothAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.format_hex())
    }
}

impl From<[u8; BD_ADDR_LENGTH]> for BluetoothAddress {
    fn from(addr: [u8; BD_ADDR_LENGTH]) -> Self {
        Self(addr)
    }
}

impl From<BluetoothAddress> for bt_hci::param::BdAddr {
    fn from(addr: BluetoothAddress) -> Self {
        bt_hci::param::BdAddr::new(addr.0)
    }
}

impl TryFrom<&str> for BluetoothAddress {
    type Error = InvalidAddress;

    fn try_from(hex: &str) -> Result<Self, Self::Error> {
        BluetoothAddress::from_hex(hex)
    }
}

impl TryFrom<&[u8]> for BluetoothAddress {
    type Error = InvalidAddress;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let addr: [u8; BD_ADDR_LENGTH] = bytes.try_into().map_err(|_| InvalidAddress)?;
        Ok(Self(addr))
    }
}

impl TryFrom<bt_hci::param::BdAddr> for BluetoothAddress {
    type Error = InvalidAddress;

    fn try_from(bd_addr: bt_hci::param::BdAddr) -> Result<Self, Self::Error> {
        bd_addr.raw().try_into()
    }
}
