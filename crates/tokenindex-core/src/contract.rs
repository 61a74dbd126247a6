//! Contract registry: resolves a contract id to its token type and the
//! function index that represents "send" for that type.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::client::ChainClient;
use crate::error::IndexerError;

/// The closed set of token contract variants the indexer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractType {
    Nft,
    NftWithBlacklist,
    NftWithWhitelist,
    TokenNoSplit,
    TokenWithSplit,
    TokenWithWhitelist,
    TokenWithBlacklist,
}

impl ContractType {
    pub const ALL: [ContractType; 7] = [
        Self::Nft,
        Self::NftWithBlacklist,
        Self::NftWithWhitelist,
        Self::TokenNoSplit,
        Self::TokenWithSplit,
        Self::TokenWithWhitelist,
        Self::TokenWithBlacklist,
    ];

    /// The type name reported by the node's contract metadata.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nft => "NonFungibleContract",
            Self::NftWithBlacklist => "NFTContractWithBlacklist",
            Self::NftWithWhitelist => "NFTContractWithWhitelist",
            Self::TokenNoSplit => "TokenContract",
            Self::TokenWithSplit => "TokenContractWithSplit",
            Self::TokenWithWhitelist => "TokenContractWithWhitelist",
            Self::TokenWithBlacklist => "TokenCtrtWithoutSplitV2BlackList",
        }
    }

    pub fn is_non_fungible(&self) -> bool {
        match self {
            Self::Nft | Self::NftWithBlacklist | Self::NftWithWhitelist => true,
            Self::TokenNoSplit
            | Self::TokenWithSplit
            | Self::TokenWithWhitelist
            | Self::TokenWithBlacklist => false,
        }
    }

    pub fn is_fungible(&self) -> bool {
        !self.is_non_fungible()
    }

    /// Function index of the "send" operation for this contract type.
    pub fn send_function_index(&self) -> u16 {
        match self {
            Self::Nft | Self::NftWithBlacklist | Self::NftWithWhitelist => 2,
            Self::TokenNoSplit => 3,
            Self::TokenWithSplit | Self::TokenWithWhitelist | Self::TokenWithBlacklist => 4,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// Error returned when a type name is not one of the supported variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownContractType(pub String);

impl fmt::Display for UnknownContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown contract type '{}'", self.0)
    }
}

impl std::error::Error for UnknownContractType {}

impl FromStr for ContractType {
    type Err = UnknownContractType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.type_name() == s)
            .ok_or_else(|| UnknownContractType(s.to_string()))
    }
}

/// Resolve the send function index straight from a reported type name.
///
/// Unknown names are an error; there is no default index.
pub fn send_function_index(type_name: &str) -> Result<u16, UnknownContractType> {
    type_name.parse::<ContractType>().map(|t| t.send_function_index())
}

/// A tracked contract with its resolved, immutable metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDescriptor {
    pub id: String,
    pub contract_type: ContractType,
    pub send_function_index: u16,
    /// Height at which the contract was registered on chain.
    pub deploy_height: u64,
}

impl ContractDescriptor {
    pub fn new(id: impl Into<String>, contract_type: ContractType, deploy_height: u64) -> Self {
        Self {
            id: id.into(),
            contract_type,
            send_function_index: contract_type.send_function_index(),
            deploy_height,
        }
    }

    pub fn is_non_fungible(&self) -> bool {
        self.contract_type.is_non_fungible()
    }
}

/// Resolves contract metadata through a [`ChainClient`] and caches it.
///
/// Contract metadata does not change after deployment, so each id is
/// fetched at most once per process.
#[derive(Default)]
pub struct ContractRegistry {
    cache: Mutex<HashMap<String, ContractDescriptor>>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `contract_id`, fetching its metadata on first use.
    pub async fn resolve<C>(
        &self,
        client: &C,
        contract_id: &str,
    ) -> Result<ContractDescriptor, IndexerError>
    where
        C: ChainClient + ?Sized,
    {
        if let Some(hit) = self.cached(contract_id) {
            return Ok(hit);
        }

        let info = client.contract_info(contract_id).await?;
        let type_name = info
            .contract_type
            .ok_or_else(|| IndexerError::MissingContractField {
                contract_id: contract_id.to_string(),
                field: "type".into(),
            })?;
        let contract_type =
            type_name
                .parse::<ContractType>()
                .map_err(|e| IndexerError::UnknownContractType {
                    contract_id: contract_id.to_string(),
                    type_name: e.0,
                })?;
        let deploy_height = info
            .height
            .ok_or_else(|| IndexerError::MissingContractField {
                contract_id: contract_id.to_string(),
                field: "height".into(),
            })?;

        let descriptor = ContractDescriptor::new(contract_id, contract_type, deploy_height);
        tracing::debug!(
            contract = contract_id,
            contract_type = %contract_type,
            send_index = descriptor.send_function_index,
            deploy_height,
            "Resolved contract"
        );

        self.cache
            .lock()
            .unwrap()
            .insert(contract_id.to_string(), descriptor.clone());
        Ok(descriptor)
    }

    fn cached(&self, contract_id: &str) -> Option<ContractDescriptor> {
        self.cache.lock().unwrap().get(contract_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedChain;

    #[test]
    fn send_index_per_type() {
        let expected = [
            ("NonFungibleContract", 2),
            ("NFTContractWithBlacklist", 2),
            ("NFTContractWithWhitelist", 2),
            ("TokenContract", 3),
            ("TokenContractWithSplit", 4),
            ("TokenContractWithWhitelist", 4),
            ("TokenCtrtWithoutSplitV2BlackList", 4),
        ];
        for (name, index) in expected {
            assert_eq!(send_function_index(name).unwrap(), index, "{name}");
        }
    }

    #[test]
    fn unknown_type_has_no_send_index() {
        let err = send_function_index("LockContract").unwrap_err();
        assert_eq!(err, UnknownContractType("LockContract".into()));
    }

    #[test]
    fn families_are_disjoint() {
        for t in ContractType::ALL {
            assert_ne!(t.is_fungible(), t.is_non_fungible(), "{t}");
        }
        assert!(ContractType::Nft.is_non_fungible());
        assert!(ContractType::TokenWithSplit.is_fungible());
    }

    #[tokio::test]
    async fn resolve_caches_metadata() {
        let chain = ScriptedChain::new(100);
        chain.add_contract("CF1", "TokenContractWithSplit", 42);

        let registry = ContractRegistry::new();
        let first = registry.resolve(&chain, "CF1").await.unwrap();
        let second = registry.resolve(&chain, "CF1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.contract_type, ContractType::TokenWithSplit);
        assert_eq!(first.send_function_index, 4);
        assert_eq!(first.deploy_height, 42);
        assert_eq!(chain.info_calls(), 1);
    }

    #[tokio::test]
    async fn resolve_rejects_unknown_type() {
        let chain = ScriptedChain::new(100);
        chain.add_contract("CF2", "SwapContract", 1);

        let err = ContractRegistry::new()
            .resolve(&chain, "CF2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexerError::UnknownContractType { ref type_name, .. } if type_name == "SwapContract"
        ));
    }
}
