//! Bitcoin network definitions and the wallet network mapping.
//!
//! The library speaks [`Network`]; the SAT20 extension speaks
//! [`WalletNetwork`] (`"livenet"` / `"testnet"`). [`to_canonical`] and
//! [`to_native`] translate between the two.

use serde::{Deserialize, Serialize};

/// Canonical Bitcoin network type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Bitcoin mainnet
    #[default]
    Mainnet,
    /// Bitcoin testnet
    Testnet,
}

impl Network {
    pub const ALL: [Network; 2] = [Network::Mainnet, Network::Testnet];

    /// Get the Bech32 human-readable part for this network.
    pub fn bech32_hrp(&self) -> &'static str {
        match self {
            Network::Mainnet => "bc",
            Network::Testnet => "tb",
        }
    }

    /// Network whose segwit addresses start with `hrp`.
    pub fn from_bech32_hrp(hrp: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|network| network.bech32_hrp() == hrp)
    }

    /// Get the mempool.space API base URL for this network.
    pub fn mempool_api_url(&self) -> &'static str {
        match self {
            Network::Mainnet => "https://mempool.space/api",
            Network::Testnet => "https://mempool.space/testnet/api",
        }
    }

    /// Parse network from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" | "bitcoin" | "livenet" => Some(Network::Mainnet),
            "testnet" | "test" | "testnet3" => Some(Network::Testnet),
            _ => None,
        }
    }

    /// Get network name as string.
    pub fn name(&self) -> &'static str {
        match self {
            Network::Mainnet => "mainnet",
            Network::Testnet => "testnet",
        }
    }

    /// Get display name for UI.
    pub fn display_name(&self) -> &'static str {
        match self {
            Network::Mainnet => "Bitcoin Mainnet",
            Network::Testnet => "Bitcoin Testnet",
        }
    }
}

impl core::fmt::Display for Network {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Network identifier as reported by the wallet extension.
///
/// Anything the extension reports that is not `"testnet"` is read as
/// [`WalletNetwork::Livenet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum WalletNetwork {
    #[default]
    Livenet,
    Testnet,
}

impl WalletNetwork {
    /// Parse a native network id, falling back to livenet.
    pub fn parse(s: &str) -> Self {
        match s {
            "testnet" => WalletNetwork::Testnet,
            _ => WalletNetwork::Livenet,
        }
    }

    /// Wire name used by the extension.
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletNetwork::Livenet => "livenet",
            WalletNetwork::Testnet => "testnet",
        }
    }
}

impl From<String> for WalletNetwork {
    fn from(value: String) -> Self {
        WalletNetwork::parse(&value)
    }
}

impl core::fmt::Display for WalletNetwork {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map the wallet's network id onto the canonical network.
pub fn to_canonical(network: WalletNetwork) -> Network {
    match network {
        WalletNetwork::Livenet => Network::Mainnet,
        WalletNetwork::Testnet => Network::Testnet,
    }
}

/// Map a canonical network onto the id the wallet expects.
pub fn to_native(network: Network) -> WalletNetwork {
    match network {
        Network::Mainnet => WalletNetwork::Livenet,
        Network::Testnet => WalletNetwork::Testnet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_round_trip() {
        for native in [WalletNetwork::Livenet, WalletNetwork::Testnet] {
            assert_eq!(to_native(to_canonical(native)), native);
        }
        for network in [Network::Mainnet, Network::Testnet] {
            assert_eq!(to_canonical(to_native(network)), network);
        }
    }

    #[test]
    fn test_unknown_native_falls_back_to_livenet() {
        assert_eq!(WalletNetwork::parse("signet"), WalletNetwork::Livenet);
        assert_eq!(WalletNetwork::parse(""), WalletNetwork::Livenet);
        assert_eq!(to_canonical(WalletNetwork::parse("regtest")), Network::Mainnet);
    }

    #[test]
    fn test_wallet_network_serde() {
        let parsed: WalletNetwork = serde_json::from_str("\"testnet\"").unwrap();
        assert_eq!(parsed, WalletNetwork::Testnet);

        let fallback: WalletNetwork = serde_json::from_str("\"bitcoin\"").unwrap();
        assert_eq!(fallback, WalletNetwork::Livenet);

        assert_eq!(serde_json::to_string(&WalletNetwork::Livenet).unwrap(), "\"livenet\"");
    }

    #[test]
    fn test_network_from_str() {
        assert_eq!(Network::from_str("mainnet"), Some(Network::Mainnet));
        assert_eq!(Network::from_str("LIVENET"), Some(Network::Mainnet));
        assert_eq!(Network::from_str("testnet"), Some(Network::Testnet));
        assert_eq!(Network::from_str("invalid"), None);
    }

    #[test]
    fn test_bech32_hrp_lookup() {
        for network in Network::ALL {
            assert_eq!(Network::from_bech32_hrp(network.bech32_hrp()), Some(network));
        }
        assert_eq!(Network::from_bech32_hrp("bcrt"), None);
        assert_eq!(Network::Testnet.display_name(), "Bitcoin Testnet");
    }
}
