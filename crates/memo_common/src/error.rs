//! Error types for hashing and compact decoding.

/// A value could not be reduced to a canonical form for hashing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashingError {
    /// The value (or one of its nested parts) has no canonical form.
    #[error("value cannot be hashed: {what}")]
    Unhashable {
        /// Description of the offending value.
        what: String,
    },
}

/// Errors produced when decoding a compact base-64 string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The input contained no digits.
    #[error("empty compact encoding")]
    Empty,

    /// A character outside the compact alphabet was found.
    #[error("invalid symbol '{symbol}' at position {position}")]
    InvalidSymbol {
        /// The offending character.
        symbol: char,
        /// Byte offset of the character in the input.
        position: usize,
    },

    /// The decoded magnitude does not fit the target integer type.
    #[error("compact encoding overflows a 128-bit integer")]
    Overflow,
}
