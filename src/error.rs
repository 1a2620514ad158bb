use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

macro_rules! consistency_error {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::Consistency(format!($fmt $(, $arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Errors fall into four groups, all of which abort processing of the current input:
///
/// ## Format Errors
/// - [`Error::Malformed`] - Corrupted or unsupported binary layout
/// - [`Error::NotImplemented`] - A schema node or value type the codec cannot handle
/// - [`Error::SchemaConflict`] - Conflicting layout markers on one field
/// - [`Error::EmptySchema`] - A record type without serializable fields
/// - [`Error::OffsetTooLarge`] - An offset that does not fit into 4 bytes
/// - [`Error::BadMagic`] - Container magic mismatch
///
/// ## Consistency Errors
/// - [`Error::Consistency`] - Control flow graph builder invariant violated
/// - [`Error::StackUnderflow`] - Symbolic stack exhausted while rebuilding statements
///
/// ## Argument Errors
/// - [`Error::InvalidArgument`] - Value does not match the schema it is written with
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O Errors
/// - [`Error::OutOfBounds`] - Attempted to read beyond the end of the data
/// - [`Error::FileError`] - Errors from the backing stream or filesystem
///
/// # Examples
///
/// ```rust
/// use sagekit::Error;
///
/// let err = Error::OffsetTooLarge(0x1_0000_0001);
/// assert_eq!(err.to_string(), "Offset 0x100000001 is larger than 4 bytes");
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged or uses a layout this library cannot decode.
    ///
    /// The error includes the source location where the malformation was
    /// detected for debugging purposes.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File or stream I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// A schema node or value type was encountered that the codec has no
    /// implementation for. The associated value names the offending type.
    #[error("Not implemented - {0}")]
    NotImplemented(&'static str),

    /// A field carries layout markers that cannot be combined.
    #[error("Conflicting layout on {type_name}::{field} - {message}")]
    SchemaConflict {
        /// The record type declaring the field
        type_name: &'static str,
        /// The field name
        field: &'static str,
        /// What conflicts
        message: String,
    },

    /// A record type has no serializable fields.
    #[error("Type {0} has no serializable fields")]
    EmptySchema(&'static str),

    /// An offset had to be recorded that does not fit into the 32-bit offset
    /// fields of the container format.
    #[error("Offset 0x{0:X} is larger than 4 bytes")]
    OffsetTooLarge(u64),

    /// The container magic did not match the expected value.
    #[error("Bad magic - expected {expected:02X?}, found {found:02X?}")]
    BadMagic {
        /// The magic the caller asked for
        expected: [u8; 4],
        /// The magic present in the data
        found: [u8; 4],
    },

    /// A value handed to a public entry point does not fit the schema it is
    /// processed with. Raised before any I/O takes place.
    #[error("Invalid argument - {0}")]
    InvalidArgument(String),

    /// A control flow graph invariant was violated while building or rewriting
    /// the graph. This indicates a builder bug or an unsupported jump pattern.
    #[error("Inconsistent control flow - {0}")]
    Consistency(String),

    /// The symbolic operand stack ran empty while rebuilding statements.
    #[error("Stack underflow at instruction 0x{offset:X}")]
    StackUnderflow {
        /// Byte offset of the instruction that popped from an empty stack
        offset: u64,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_message_is_hex() {
        assert_eq!(
            Error::OffsetTooLarge(0x1_0000_0001).to_string(),
            "Offset 0x100000001 is larger than 4 bytes"
        );
    }

    #[test]
    fn malformed_carries_location() {
        let err = malformed_error!("bad {}", 42);
        match err {
            Error::Malformed { message, file, .. } => {
                assert_eq!(message, "bad 42");
                assert!(file.ends_with("error.rs"));
            }
            _ => panic!("expected Malformed"),
        }
    }

    #[test]
    fn consistency_formats() {
        let err = consistency_error!("split point 0x{:X} not found", 0x10);
        assert_eq!(
            err.to_string(),
            "Inconsistent control flow - split point 0x10 not found"
        );
    }
}
