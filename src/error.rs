//! Error types shared by the chain, the bus and every chip driver.
//!
//! Value clamping (currents, chopper timings, thresholds) is never an
//! error: configuration setters saturate silently. Only structural
//! problems and hardware failures are reported.

use core::convert::Infallible;
use thiserror::Error;

/// Errors returned by chain and chip operations.
///
/// `E` is the error type of the byte-transfer primitive
/// ([`ByteTransfer::Error`](crate::traits::ByteTransfer::Error)).
/// Operations that never touch the transfer primitive, like every
/// [`IoChain`](crate::IoChain) method, use [`ChainError`].
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Out-of-range board, slot, bit index, device number or board count.
    #[error("invalid parameter")]
    InvalidParameter,

    /// The output chain has no buffer (call `init` first).
    #[error("output chain not initialized")]
    NotInitialized,

    /// The output chain already owns a buffer.
    #[error("output chain already initialized")]
    AlreadyInitialized,

    /// One of the chain's dedicated output lines refused a level change.
    #[error("output line failed to change level")]
    Line,

    /// The byte-transfer primitive reported a failure.
    #[error("transfer failed: {0:?}")]
    Transfer(E),
}

/// Error type of operations that only drive the output chain.
pub type ChainError = Error<Infallible>;

impl Error<Infallible> {
    /// Re-type a chain error for use in an operation that also transfers bytes.
    pub fn widen<E>(self) -> Error<E> {
        match self {
            Error::InvalidParameter => Error::InvalidParameter,
            Error::NotInitialized => Error::NotInitialized,
            Error::AlreadyInitialized => Error::AlreadyInitialized,
            Error::Line => Error::Line,
            Error::Transfer(never) => match never {},
        }
    }
}

impl<E> Error<E> {
    /// Returns true if this error came from the byte-transfer primitive.
    pub fn is_transfer(&self) -> bool {
        matches!(self, Error::Transfer(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_keeps_variant() {
        let err: Error<u8> = ChainError::NotInitialized.widen();
        assert_eq!(err, Error::NotInitialized);

        let err: Error<&str> = ChainError::Line.widen();
        assert_eq!(err, Error::Line);
    }

    #[test]
    fn transfer_is_flagged() {
        assert!(Error::Transfer(3u8).is_transfer());
        assert!(!Error::<u8>::InvalidParameter.is_transfer());
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            format!("{}", Error::<u8>::AlreadyInitialized),
            "output chain already initialized"
        );
        assert_eq!(format!("{}", Error::Transfer(7u8)), "transfer failed: 7");
    }
}
