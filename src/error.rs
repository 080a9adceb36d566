//! ARIB caption decoding error types.
//!
//! This module provides error types specific to parsing the caption data
//! structures carried in broadcast PES payloads.

use thiserror::Error;

/// ARIB caption specific errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptionError {
    /// PES payload too short to contain a caption data group.
    #[error("PES payload too short: expected at least {expected} bytes, got {actual}")]
    PayloadTooShort {
        /// Minimum number of bytes required at this point.
        expected: usize,
        /// Number of bytes actually available.
        actual: usize,
    },

    /// Unrecognized data identifier (only 0x80 caption / 0x81 superimpose are valid).
    #[error("Invalid data identifier: 0x{0:02X}")]
    InvalidDataIdentifier(u8),

    /// Unrecognized private stream id (expected 0xFF).
    #[error("Invalid private stream id: 0x{0:02X}")]
    InvalidPrivateStreamId(u8),

    /// Data group size field exceeds the remaining payload.
    #[error("Data group truncated: declared {declared} bytes, {available} remain")]
    DataGroupTruncated {
        /// Size declared in the data group header.
        declared: usize,
        /// Bytes remaining after the header.
        available: usize,
    },

    /// Malformed caption management data.
    #[error("Invalid caption management data: {0}")]
    InvalidManagementData(String),

    /// Malformed caption statement data.
    #[error("Invalid caption statement data: {0}")]
    InvalidStatementData(String),

    /// Data unit separator missing or unit size exceeds the remaining bytes.
    #[error("Invalid data unit: {0}")]
    InvalidDataUnit(String),
}

impl CaptionError {
    /// Create an invalid management data error.
    pub fn invalid_management(msg: impl Into<String>) -> Self {
        CaptionError::InvalidManagementData(msg.into())
    }

    /// Create an invalid statement data error.
    pub fn invalid_statement(msg: impl Into<String>) -> Self {
        CaptionError::InvalidStatementData(msg.into())
    }

    /// Create an invalid data unit error.
    pub fn invalid_data_unit(msg: impl Into<String>) -> Self {
        CaptionError::InvalidDataUnit(msg.into())
    }

    /// Check if this error leaves the decoder usable for further packets.
    ///
    /// Every parse error is recoverable: the offending packet is discarded
    /// and the next `decode` call starts from a clean cursor.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

/// Result type for caption operations.
pub type Result<T> = std::result::Result<T, CaptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CaptionError::InvalidDataIdentifier(0x42);
        assert_eq!(err.to_string(), "Invalid data identifier: 0x42");
    }

    #[test]
    fn test_payload_too_short() {
        let err = CaptionError::PayloadTooShort {
            expected: 3,
            actual: 1,
        };
        assert_eq!(
            err.to_string(),
            "PES payload too short: expected at least 3 bytes, got 1"
        );
    }

    #[test]
    fn test_all_errors_recoverable() {
        assert!(CaptionError::InvalidDataIdentifier(0).is_recoverable());
        assert!(CaptionError::invalid_statement("truncated TMD").is_recoverable());
    }
}
