//! The `PayloadDecoder` trait: the narrow seam between the indexer and the
//! chain's function-argument encoding.
//!
//! The indexer only needs positional access to decoded arguments; the byte
//! layout itself lives in an adapter crate (see `tokenindex-codec`).

use std::fmt;

use thiserror::Error;

/// Errors raised while decoding a `functionData` payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid base58 payload: {0}")]
    Base58(String),

    #[error("payload truncated: needed {needed} bytes at offset {offset}")]
    Truncated { offset: usize, needed: usize },

    #[error("unknown data entry tag {tag} at offset {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("argument {index} requested but payload has {len} entries")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("argument {index}: expected {expected}, got {got}")]
    UnexpectedType {
        index: usize,
        expected: &'static str,
        got: &'static str,
    },

    #[error("address {address} belongs to network '{got}', expected '{expected}'")]
    NetworkMismatch {
        address: String,
        expected: char,
        got: char,
    },

    #[error("transaction has no {0}")]
    MissingField(&'static str),
}

/// A single decoded function argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEntry {
    PublicKey(String),
    Address(String),
    Amount(u64),
    Int32(i32),
    ShortText(String),
    ContractAccount(String),
    Account(String),
    TokenId(String),
    Timestamp(u64),
    Boolean(bool),
    ShortBytes(Vec<u8>),
    Balance(u64),
}

impl DecodedEntry {
    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PublicKey(_) => "public_key",
            Self::Address(_) => "address",
            Self::Amount(_) => "amount",
            Self::Int32(_) => "int32",
            Self::ShortText(_) => "short_text",
            Self::ContractAccount(_) => "contract_account",
            Self::Account(_) => "account",
            Self::TokenId(_) => "token_id",
            Self::Timestamp(_) => "timestamp",
            Self::Boolean(_) => "boolean",
            Self::ShortBytes(_) => "short_bytes",
            Self::Balance(_) => "balance",
        }
    }

    /// Returns the account string if this entry names an account.
    pub fn as_address(&self) -> Option<&str> {
        match self {
            Self::Address(a) | Self::ContractAccount(a) | Self::Account(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the value as an unsigned integer.
    ///
    /// Negative `Int32` values are not valid token indexes or amounts.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Amount(v) | Self::Balance(v) | Self::Timestamp(v) => Some(*v),
            Self::Int32(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for DecodedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PublicKey(s)
            | Self::Address(s)
            | Self::ShortText(s)
            | Self::ContractAccount(s)
            | Self::Account(s)
            | Self::TokenId(s) => write!(f, "{s}"),
            Self::Amount(v) | Self::Timestamp(v) | Self::Balance(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::ShortBytes(b) => write!(f, "{} bytes", b.len()),
        }
    }
}

/// Turns an encoded argument blob into an ordered list of decoded values.
///
/// Implementations must be `Send + Sync`; a single decoder is shared by all
/// contract monitors.
pub trait PayloadDecoder: Send + Sync {
    fn decode(&self, payload: &str) -> Result<Vec<DecodedEntry>, DecodeError>;
}

/// Positional access helpers over a decoded argument list.
pub trait Arguments {
    fn arg(&self, index: usize) -> Result<&DecodedEntry, DecodeError>;
    fn address_arg(&self, index: usize) -> Result<&str, DecodeError>;
    fn u64_arg(&self, index: usize) -> Result<u64, DecodeError>;
}

impl Arguments for [DecodedEntry] {
    fn arg(&self, index: usize) -> Result<&DecodedEntry, DecodeError> {
        self.get(index).ok_or(DecodeError::IndexOutOfRange {
            index,
            len: self.len(),
        })
    }

    fn address_arg(&self, index: usize) -> Result<&str, DecodeError> {
        let entry = self.arg(index)?;
        entry.as_address().ok_or(DecodeError::UnexpectedType {
            index,
            expected: "address",
            got: entry.kind(),
        })
    }

    fn u64_arg(&self, index: usize) -> Result<u64, DecodeError> {
        let entry = self.arg(index)?;
        entry.as_u64().ok_or(DecodeError::UnexpectedType {
            index,
            expected: "unsigned integer",
            got: entry.kind(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positional_access() {
        let args = vec![
            DecodedEntry::Address("AU6BNRK34SLuc27evpzJbAswB6ntHV2hmjD".into()),
            DecodedEntry::Int32(7),
        ];
        assert_eq!(
            args.address_arg(0).unwrap(),
            "AU6BNRK34SLuc27evpzJbAswB6ntHV2hmjD"
        );
        assert_eq!(args.u64_arg(1).unwrap(), 7);
        assert_eq!(
            args.u64_arg(2).unwrap_err(),
            DecodeError::IndexOutOfRange { index: 2, len: 2 }
        );
    }

    #[test]
    fn type_mismatch_is_reported() {
        let args = vec![DecodedEntry::Amount(10)];
        assert!(matches!(
            args.address_arg(0),
            Err(DecodeError::UnexpectedType { expected: "address", got: "amount", .. })
        ));
    }

    #[test]
    fn negative_int32_is_not_an_index() {
        assert_eq!(DecodedEntry::Int32(-1).as_u64(), None);
        assert_eq!(DecodedEntry::Int32(0).as_u64(), Some(0));
    }
}
