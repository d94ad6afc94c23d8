//! Error types for the interrogation procedure.
//!
//! All errors are `Copy` and carry only fixed-size data so they can be stored in
//! a run's result slot and handed to completion callbacks without allocation.

/// Failure reported by the [`CommandDispatcher`](crate::CommandDispatcher)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DispatchError {
    /// The controller rejected the command in its Command Status event
    CommandStatus(u8),
    /// The command could not be written or its event could not be read
    Transport,
    /// The connection went down while the command was outstanding
    Disconnected,
    /// The dispatcher discarded the pending completion
    Abandoned,
}

impl core::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::CommandStatus(status) => write!(f, "Command rejected with status 0x{status:02X}"),
            Self::Transport => write!(f, "HCI transport error"),
            Self::Disconnected => write!(f, "Connection lost with command outstanding"),
            Self::Abandoned => write!(f, "Command completion abandoned"),
        }
    }
}

/// Completion event payload could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DecodeError {
    /// Event code does not belong to the command that was sent
    UnexpectedEvent {
        /// Event code the command completes with
        expected: u8,
        /// Event code received
        actual: u8,
    },
    /// Fewer bytes than the event layout requires
    InsufficientData {
        /// Bytes required
        expected: usize,
        /// Bytes present
        actual: usize,
    },
    /// More parameter bytes than an HCI event can carry
    TooLong {
        /// Largest parameter block allowed
        max: usize,
        /// Bytes supplied
        actual: usize,
    },
    /// A field holds a value its type does not allow
    InvalidValue,
    /// Event refers to a different connection handle
    ConnectionHandleMismatch,
    /// Event refers to a different `BD_ADDR`
    AddressMismatch,
    /// Extended features event carries a page other than the one requested
    PageMismatch {
        /// Page requested
        requested: u8,
        /// Page reported
        reported: u8,
    },
}

impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::UnexpectedEvent { expected, actual } => write!(
                f,
                "Unexpected event 0x{actual:02X} (expected 0x{expected:02X})"
            ),
            Self::InsufficientData { expected, actual } => {
                write!(f, "Event too short: {actual} of {expected} bytes")
            }
            Self::TooLong { max, actual } => {
                write!(f, "Event too long: {actual} bytes, at most {max} allowed")
            }
            Self::InvalidValue => write!(f, "Event field out of range"),
            Self::ConnectionHandleMismatch => write!(f, "Event for another connection handle"),
            Self::AddressMismatch => write!(f, "Event for another device address"),
            Self::PageMismatch {
                requested,
                reported,
            } => write!(f, "Requested feature page {requested}, got {reported}"),
        }
    }
}

/// Aggregate failure of an interrogation run
///
/// A run reports the first failure it observes; later failures are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterrogationError {
    /// A command could not be sent or was rejected
    Dispatch(DispatchError),
    /// A completion event carried a non-success status
    Controller(u8),
    /// A completion event was malformed
    Malformed(DecodeError),
    /// The peer is not (or no longer) in the registry
    PeerNotFound,
    /// The run was cancelled or superseded
    Canceled,
    /// Every interrogation lane is held by another peer
    Busy,
}

impl From<DispatchError> for InterrogationError {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

impl From<DecodeError> for InterrogationError {
    fn from(e: DecodeError) -> Self {
        Self::Malformed(e)
    }
}

impl core::fmt::Display for InterrogationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Dispatch(e) => write!(f, "Dispatch failed: {e}"),
            Self::Controller(status) => write!(f, "Controller returned status 0x{status:02X}"),
            Self::Malformed(e) => write!(f, "Malformed event: {e}"),
            Self::PeerNotFound => write!(f, "Peer not found"),
            Self::Canceled => write!(f, "Interrogation canceled"),
            Self::Busy => write!(f, "No interrogation lane free"),
        }
    }
}

/// Peer registry errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PeerCacheError {
    /// No room for another peer
    Full,
    /// A peer with this address already exists
    DuplicateAddress,
}

impl core::fmt::Display for PeerCacheError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Full => write!(f, "Peer cache is full"),
            Self::DuplicateAddress => write!(f, "Peer address already registered"),
        }
    }
}
