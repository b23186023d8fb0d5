/// Wallet configuration from environment variables
///
/// Controls the network identifier, HD account path, discovery limits and
/// optical chunk sizing. Defaults target a test network.
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct WalletConfig {
    /// Network identifier passed through to the cryptographic engine
    pub network: String,
    /// Domain prefix of export file types ("<domain>-<kind>-data")
    pub domain: String,
    /// Account-level derivation path; chain and index are appended
    pub account_path: String,
    /// Consecutive empty addresses tolerated by discovery
    pub gap_limit: u32,
    /// Addresses scanned per discovery batch before checking cancellation
    pub discovery_batch_size: u32,
    /// Maximum bytes of payload text carried by one chunk
    pub max_chunk_bytes: usize,
    /// Largest text that safely fits one optical code
    pub qr_safe_capacity: usize,
    /// Live feed polling interval in milliseconds
    pub scan_interval_ms: u64,
}

impl WalletConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `WALLET_NETWORK`: network identifier (default "testnet")
    /// - `WALLET_DOMAIN`: export file domain (default "bitcoin")
    /// - `ACCOUNT_PATH`: account derivation path (default by network)
    /// - `GAP_LIMIT`: discovery gap limit (default 20)
    /// - `DISCOVERY_BATCH_SIZE`: addresses per discovery batch (default 10)
    /// - `MAX_CHUNK_BYTES`: chunk payload size (default 400)
    /// - `QR_SAFE_CAPACITY`: single-code capacity (default 1000)
    /// - `SCAN_INTERVAL_MS`: live feed interval (default 500)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let network = env::var("WALLET_NETWORK")
            .map(|n| n.to_lowercase())
            .unwrap_or_else(|_| defaults.network.clone());
        log::info!("Using network '{}'", network);

        let domain = env::var("WALLET_DOMAIN").unwrap_or_else(|_| defaults.domain.clone());

        let account_path = env::var("ACCOUNT_PATH").unwrap_or_else(|_| {
            let path = default_account_path(&network);
            log::info!("Account path: {} (network default)", path);
            path
        });

        Self {
            network,
            domain,
            account_path,
            gap_limit: parse_var("GAP_LIMIT", defaults.gap_limit),
            discovery_batch_size: parse_var("DISCOVERY_BATCH_SIZE", defaults.discovery_batch_size),
            max_chunk_bytes: parse_var("MAX_CHUNK_BYTES", defaults.max_chunk_bytes),
            qr_safe_capacity: parse_var("QR_SAFE_CAPACITY", defaults.qr_safe_capacity),
            scan_interval_ms: parse_var("SCAN_INTERVAL_MS", defaults.scan_interval_ms),
        }
    }

    /// Get the BIP44 coin type for this network
    ///
    /// - Mainnet: 0
    /// - Everything else: 1
    pub fn coin_type(&self) -> u32 {
        coin_type(&self.network)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            network: "testnet".to_string(),
            domain: "bitcoin".to_string(),
            account_path: default_account_path("testnet"),
            gap_limit: 20,
            discovery_batch_size: 10,
            max_chunk_bytes: 400,
            qr_safe_capacity: 1000,
            scan_interval_ms: 500,
        }
    }
}

fn coin_type(network: &str) -> u32 {
    match network {
        "mainnet" | "bitcoin" => 0,
        _ => 1,
    }
}

fn default_account_path(network: &str) -> String {
    format!("m/84'/{}'/0'", coin_type(network))
}

fn parse_var<T: FromStr + std::fmt::Display>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                log::warn!("Invalid {} '{}', using default {}", name, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_testnet() {
        let config = WalletConfig::default();
        assert_eq!(config.network, "testnet");
        assert_eq!(config.account_path, "m/84'/1'/0'");
        assert_eq!(config.gap_limit, 20);
    }

    #[test]
    fn test_coin_type() {
        let mainnet = WalletConfig {
            network: "mainnet".to_string(),
            ..Default::default()
        };
        assert_eq!(mainnet.coin_type(), 0);

        let regtest = WalletConfig {
            network: "regtest".to_string(),
            ..Default::default()
        };
        assert_eq!(regtest.coin_type(), 1);
    }
}
