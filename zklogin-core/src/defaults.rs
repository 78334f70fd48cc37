use crate::address::SuiAddress;
use crate::config::{
    Config, TransferConfig, DEFAULT_GAS_BUDGET, DEFAULT_MAX_EPOCH_LOOKAHEAD,
    GOOGLE_AUTHORIZATION_ENDPOINT, MIST_PER_SUI,
};
use crate::Network;

/// OAuth client id of the public demo application.
pub const DEMO_CLIENT_ID: &str =
    "1067056172111-l86f9v8u6o02n4lfhv03agivb0gh4fem.apps.googleusercontent.com";

/// Redirect URI of a locally served demo.
pub const DEMO_REDIRECT_URI: &str = "http://localhost:5173";

/// Default transfer recipient.
pub static DEFAULT_RECIPIENT: SuiAddress = SuiAddress::from_bytes([
    0xfa, 0x0f, 0x85, 0x42, 0xf2, 0x56, 0xe6, 0x69, 0x69, 0x46, 0x24, 0xaa, 0x3e, 0xe7, 0xbf, 0xbd,
    0xe5, 0xaf, 0x54, 0x64, 0x16, 0x46, 0xa3, 0xa0, 0x59, 0x24, 0xcf, 0x9e, 0x32, 0x9a, 0x8a, 0x36,
]);

/// Presets per [`Network`].
pub trait DefaultConfig {
    /// Builds a config for `network`, falling back to the demo client where not given.
    fn from_network(
        network: Network,
        client_id: Option<String>,
        redirect_uri: Option<String>,
    ) -> Self
    where
        Self: Sized;
}

impl DefaultConfig for Config {
    fn from_network(
        network: Network,
        client_id: Option<String>,
        redirect_uri: Option<String>,
    ) -> Self {
        let (fullnode_url, prover_url) = match network {
            Network::Devnet => (
                "https://fullnode.devnet.sui.io",
                "https://prover-dev.mystenlabs.com/v1",
            ),
            Network::Testnet => (
                "https://fullnode.testnet.sui.io",
                "https://prover.mystenlabs.com/v1",
            ),
            Network::Mainnet => (
                "https://fullnode.mainnet.sui.io",
                "https://prover.mystenlabs.com/v1",
            ),
        };

        Self {
            client_id: client_id.unwrap_or_else(|| DEMO_CLIENT_ID.to_string()),
            redirect_uri: redirect_uri.unwrap_or_else(|| DEMO_REDIRECT_URI.to_string()),
            authorization_endpoint: GOOGLE_AUTHORIZATION_ENDPOINT.to_string(),
            fullnode_url: fullnode_url.to_string(),
            prover_url: prover_url.to_string(),
            max_epoch_lookahead: DEFAULT_MAX_EPOCH_LOOKAHEAD,
            transfer: TransferConfig {
                recipient: DEFAULT_RECIPIENT,
                amount_mist: MIST_PER_SUI,
            },
            gas_budget: DEFAULT_GAS_BUDGET,
            request_timeout_secs: None,
        }
    }
}

/// Explorer page for a transaction digest.
#[must_use]
pub fn explorer_url(network: Network, digest: &str) -> String {
    format!("https://suiexplorer.com/txblock/{digest}?network={network}")
}
