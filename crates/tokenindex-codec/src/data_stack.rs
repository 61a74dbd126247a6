//! V Systems "data stack" argument layout.
//!
//! ```text
//! payload  = base58( count:u16be  entry{count} )
//! entry    = tag:u8  body
//! ```
//!
//! | tag | entry            | body                       |
//! |-----|------------------|----------------------------|
//! | 1   | public key       | 32 bytes                   |
//! | 2   | address          | 26 bytes                   |
//! | 3   | amount           | u64 be                     |
//! | 4   | int32            | i32 be                     |
//! | 5   | short text       | u16be length + utf-8 bytes |
//! | 6   | contract account | 26 bytes                   |
//! | 7   | account          | 26 bytes                   |
//! | 8   | token id         | 30 bytes                   |
//! | 9   | timestamp        | u64 be                     |
//! | 10  | boolean          | 1 byte                     |
//! | 11  | short bytes      | u16be length + bytes       |
//! | 12  | balance          | u64 be                     |
//!
//! Binary account values are re-encoded as base58 strings.

use tokenindex_core::{DecodeError, DecodedEntry, PayloadDecoder};

pub const PUBLIC_KEY_LEN: usize = 32;
pub const ADDRESS_LEN: usize = 26;
pub const TOKEN_ID_LEN: usize = 30;

/// Position of the chain id byte inside an address.
const ADDRESS_CHAIN_ID_OFFSET: usize = 1;

/// Decodes base58 data-stack payloads.
#[derive(Debug, Clone, Default)]
pub struct DataStackDecoder {
    /// When set, every address entry must carry this chain id byte.
    chain_id: Option<u8>,
}

impl DataStackDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject address entries that belong to another network.
    pub fn with_chain_id(chain_id: u8) -> Self {
        Self {
            chain_id: Some(chain_id),
        }
    }

    /// Decode raw (already base58-decoded) bytes.
    pub fn decode_bytes(&self, bytes: &[u8]) -> Result<Vec<DecodedEntry>, DecodeError> {
        let mut reader = Reader::new(bytes);
        let count = reader.u16()?;
        let mut entries = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            entries.push(self.entry(&mut reader)?);
        }
        if reader.remaining() > 0 {
            tracing::debug!(trailing = reader.remaining(), "Ignoring trailing payload bytes");
        }
        Ok(entries)
    }

    fn entry(&self, reader: &mut Reader<'_>) -> Result<DecodedEntry, DecodeError> {
        let offset = reader.offset;
        let tag = reader.u8()?;
        let entry = match tag {
            1 => DecodedEntry::PublicKey(reader.base58(PUBLIC_KEY_LEN)?),
            2 => {
                let raw = reader.take(ADDRESS_LEN)?;
                let address = bs58::encode(raw).into_string();
                self.check_network(&address, raw[ADDRESS_CHAIN_ID_OFFSET])?;
                DecodedEntry::Address(address)
            }
            3 => DecodedEntry::Amount(reader.u64()?),
            4 => DecodedEntry::Int32(reader.i32()?),
            5 => {
                let len = usize::from(reader.u16()?);
                DecodedEntry::ShortText(String::from_utf8_lossy(reader.take(len)?).into_owned())
            }
            6 => DecodedEntry::ContractAccount(reader.base58(ADDRESS_LEN)?),
            7 => DecodedEntry::Account(reader.base58(ADDRESS_LEN)?),
            8 => DecodedEntry::TokenId(reader.base58(TOKEN_ID_LEN)?),
            9 => DecodedEntry::Timestamp(reader.u64()?),
            10 => DecodedEntry::Boolean(reader.u8()? != 0),
            11 => {
                let len = usize::from(reader.u16()?);
                DecodedEntry::ShortBytes(reader.take(len)?.to_vec())
            }
            12 => DecodedEntry::Balance(reader.u64()?),
            tag => return Err(DecodeError::UnknownTag { tag, offset }),
        };
        Ok(entry)
    }

    fn check_network(&self, address: &str, got: u8) -> Result<(), DecodeError> {
        match self.chain_id {
            Some(expected) if expected != got => Err(DecodeError::NetworkMismatch {
                address: address.to_string(),
                expected: char::from(expected),
                got: char::from(got),
            }),
            _ => Ok(()),
        }
    }
}

impl PayloadDecoder for DataStackDecoder {
    fn decode(&self, payload: &str) -> Result<Vec<DecodedEntry>, DecodeError> {
        let bytes = bs58::decode(payload)
            .into_vec()
            .map_err(|e| DecodeError::Base58(e.to_string()))?;
        self.decode_bytes(&bytes)
    }
}

// ─── Byte reader ──────────────────────────────────────────────────────────────

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < n {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed: n,
            });
        }
        let slice = &self.bytes[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn base58(&mut self, n: usize) -> Result<String, DecodeError> {
        Ok(bs58::encode(self.take(n)?).into_string())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
