//! tokenindex-codec: payload decoders for contract function arguments.
//!
//! [`DataStackDecoder`] implements [`tokenindex_core::PayloadDecoder`] for the
//! base58 data-stack encoding used in `functionData`.

pub mod data_stack;

pub use data_stack::DataStackDecoder;

use tokenindex_core::Network;

/// A decoder that only accepts addresses of `network`.
pub fn decoder_for(network: Network) -> DataStackDecoder {
    DataStackDecoder::with_chain_id(network.chain_byte())
}
