/// Service configuration from environment variables
///
/// Wraps the core wallet configuration and adds the HTTP service, Esplora
/// endpoint and on-disk wallet location. Defaults target testnet.

use airgap_core::WalletConfig;
use bitcoin::Network;
use std::env;
use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Core ledger and transfer settings
    pub wallet: WalletConfig,
    /// Bitcoin network type (for the bitcoin crate)
    pub bitcoin_network: Network,
    /// Address the HTTP server binds to
    pub bind_address: String,
    /// Esplora API base URL, also used as the broadcast endpoint
    pub esplora_url: String,
    /// Directory holding the wallet vaults
    pub wallet_dir: PathBuf,
    /// Name of the wallet vault inside `wallet_dir`
    pub wallet_name: String,
    /// CORS origins; empty allows any origin
    pub allowed_origins: Vec<String>,
}

impl ServiceConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables (in addition to those read by `WalletConfig`):
    /// - `BIND_ADDRESS`: listen address (default "127.0.0.1:3000")
    /// - `ESPLORA_URL`: Esplora API endpoint (default by network)
    /// - `WALLET_DIR`: vault directory (default "./wallets")
    /// - `WALLET_NAME`: wallet name (default "default")
    /// - `ALLOWED_ORIGINS`: comma-separated CORS origins
    ///
    /// # Examples
    ///
    /// ```bash
    /// # Testnet (default)
    /// cargo run
    ///
    /// # Regtest with a local Esplora
    /// WALLET_NETWORK=regtest ESPLORA_URL=http://localhost:3002 cargo run
    /// ```
    pub fn from_env() -> Self {
        let wallet = WalletConfig::from_env();
        let bitcoin_network = bitcoin_network(&wallet.network);

        let bind_address =
            env::var("BIND_ADDRESS").unwrap_or_else(|_| "127.0.0.1:3000".to_string());

        let esplora_url = env::var("ESPLORA_URL").unwrap_or_else(|_| {
            let url = default_esplora_url(bitcoin_network);
            log::info!("📡 Esplora URL: {} (network default)", url);
            url.to_string()
        });

        let wallet_dir = env::var("WALLET_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./wallets"));
        let wallet_name = env::var("WALLET_NAME").unwrap_or_else(|_| "default".to_string());

        let allowed_origins: Vec<String> = env::var("ALLOWED_ORIGINS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            wallet,
            bitcoin_network,
            bind_address,
            esplora_url,
            wallet_dir,
            wallet_name,
            allowed_origins,
        }
    }
}

impl Default for ServiceConfig {
    /// Default configuration (testnet)
    fn default() -> Self {
        let wallet = WalletConfig::default();
        let bitcoin_network = bitcoin_network(&wallet.network);
        Self {
            wallet,
            bitcoin_network,
            bind_address: "127.0.0.1:3000".to_string(),
            esplora_url: default_esplora_url(bitcoin_network).to_string(),
            wallet_dir: PathBuf::from("./wallets"),
            wallet_name: "default".to_string(),
            allowed_origins: Vec::new(),
        }
    }
}

/// Map a core network identifier onto the bitcoin crate's network
pub fn bitcoin_network(name: &str) -> Network {
    match name {
        "mainnet" | "bitcoin" => Network::Bitcoin,
        "testnet" => Network::Testnet,
        "signet" => Network::Signet,
        "regtest" => Network::Regtest,
        other => {
            log::warn!("⚠️  Unknown network '{}', defaulting to Testnet", other);
            Network::Testnet
        }
    }
}

fn default_esplora_url(network: Network) -> &'static str {
    match network {
        Network::Bitcoin => "https://mempool.space/api",
        Network::Signet => "https://mempool.space/signet/api",
        Network::Regtest => "http://localhost:3002",
        _ => "https://mempool.space/testnet/api",
    }
}
