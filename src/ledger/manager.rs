use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::state::AddressLedgerState;
use super::types::{AddressKind, DerivedAddress, UtxoEntry};
use crate::amount::Amount;
use crate::config::WalletConfig;
use crate::engine::CryptoEngine;
use crate::error::AirgapError;

/// Allocates, tracks and rotates the wallet's HD addresses
///
/// Index allocation for each kind is serialized by its own mutex, held across
/// the engine calls, so indices stay contiguous under concurrent callers.
/// Receive and change allocation proceed independently. The maps themselves
/// sit behind one `RwLock`; no engine call is ever awaited while it is held.
pub struct AddressLedger<E: CryptoEngine> {
    pub(super) engine: Arc<E>,
    seed: E::Seed,
    account_path: String,
    pub(super) state: RwLock<AddressLedgerState>,
    receive_alloc: Mutex<()>,
    change_alloc: Mutex<()>,
}

impl<E: CryptoEngine> AddressLedger<E> {
    pub fn new(engine: Arc<E>, seed: E::Seed, config: &WalletConfig) -> Self {
        Self::with_state(engine, seed, config, AddressLedgerState::new(config.network.clone()))
    }

    /// Rebuild a ledger from persisted state, re-checking its invariants
    pub fn restore(
        engine: Arc<E>,
        seed: E::Seed,
        config: &WalletConfig,
        state: AddressLedgerState,
    ) -> Result<Self, AirgapError> {
        state.validate()?;
        if state.network != config.network {
            return Err(AirgapError::InvalidState(format!(
                "state belongs to network '{}', wallet is configured for '{}'",
                state.network, config.network
            )));
        }
        log::info!(
            "Restored ledger with {} receive and {} change address(es)",
            state.receive_index,
            state.change_index
        );
        Ok(Self::with_state(engine, seed, config, state))
    }

    fn with_state(
        engine: Arc<E>,
        seed: E::Seed,
        config: &WalletConfig,
        state: AddressLedgerState,
    ) -> Self {
        Self {
            engine,
            seed,
            account_path: config.account_path.trim_end_matches('/').to_string(),
            state: RwLock::new(state),
            receive_alloc: Mutex::new(()),
            change_alloc: Mutex::new(()),
        }
    }

    pub(super) fn allocator(&self, kind: AddressKind) -> &Mutex<()> {
        match kind {
            AddressKind::Receive => &self.receive_alloc,
            AddressKind::Change => &self.change_alloc,
        }
    }

    pub fn derivation_path(&self, kind: AddressKind, index: u32) -> String {
        format!("{}/{}/{}", self.account_path, kind.chain(), index)
    }

    pub async fn network(&self) -> String {
        self.state.read().await.network.clone()
    }

    /// Derive the entry for `(kind, index)` without touching ledger state
    pub(super) async fn derive_entry(
        &self,
        kind: AddressKind,
        index: u32,
        network: &str,
    ) -> Result<DerivedAddress, AirgapError> {
        let path = self.derivation_path(kind, index);
        let key = self
            .engine
            .derive_private_key_at(&self.seed, &path)
            .await
            .map_err(|e| {
                log::error!("Derivation failed at {}: {}", path, e);
                e
            })?;
        let address = self.engine.public_address_of(&key, network).await?;
        Ok(DerivedAddress::new(address, index, kind, path))
    }

    /// Derive and store the address at the next free index of `kind`
    pub async fn derive_next(&self, kind: AddressKind) -> Result<DerivedAddress, AirgapError> {
        let _guard = self.allocator(kind).lock().await;
        self.allocate_locked(kind).await
    }

    /// Caller must hold the allocator for `kind`
    async fn allocate_locked(&self, kind: AddressKind) -> Result<DerivedAddress, AirgapError> {
        let (index, network) = {
            let state = self.state.read().await;
            (state.next_index(kind), state.network.clone())
        };

        let entry = self.derive_entry(kind, index, &network).await?;

        self.state.write().await.insert(entry.clone())?;
        log::info!("Derived {} address #{}: {}", kind, index, entry.address);
        Ok(entry)
    }

    /// Returns `false` (and changes nothing) for addresses this ledger does not own
    pub async fn mark_used(&self, address: &str) -> bool {
        let found = self.state.write().await.mark_used(address);
        if !found {
            log::debug!("mark_used: {} is not a ledger address", address);
        }
        found
    }

    /// Returns `false` (and changes nothing) for addresses this ledger does not own
    pub async fn update_balance(&self, address: &str, balance: Amount, utxos: Vec<UtxoEntry>) -> bool {
        let found = self
            .state
            .write()
            .await
            .apply_balance(address, balance, utxos);
        if !found {
            log::debug!("update_balance: {} is not a ledger address", address);
        }
        found
    }

    /// True when the current receive address is used or funded (or none exists)
    pub async fn needs_fresh_receive_address(&self) -> bool {
        !self
            .state
            .read()
            .await
            .rotation_reasons(AddressKind::Receive)
            .is_empty()
    }

    /// Derive a new receive address if the current one must not be reused
    ///
    /// A cached `used` flag or cached balance rotates immediately. Otherwise
    /// the current address is re-queried and the live result decides.
    pub async fn ensure_fresh_receive_address(&self) -> Result<Option<DerivedAddress>, AirgapError> {
        let _guard = self.allocator(AddressKind::Receive).lock().await;

        let (current, network) = {
            let state = self.state.read().await;
            (state.current(AddressKind::Receive).cloned(), state.network.clone())
        };

        let rotate = match current {
            None => true,
            Some(ref cur) if cur.used || cur.is_funded() => true,
            Some(cur) => {
                let live = self
                    .engine
                    .query_balance_and_utxos(&cur.address, &network)
                    .await?;
                if live.is_empty() {
                    false
                } else {
                    log::info!(
                        "Receive address #{} was paid {} since last refresh",
                        cur.index,
                        live.amount
                    );
                    self.state
                        .write()
                        .await
                        .apply_balance(&cur.address, live.amount, live.utxos);
                    true
                }
            }
        };

        if rotate {
            self.allocate_locked(AddressKind::Receive).await.map(Some)
        } else {
            Ok(None)
        }
    }

    /// Re-query every known address, then rotate the receive address if needed
    ///
    /// Successful queries are applied even when others fail; the first
    /// failure is returned after applying them.
    pub async fn refresh_balances(&self) -> Result<Option<DerivedAddress>, AirgapError> {
        let (addresses, network) = {
            let state = self.state.read().await;
            let addresses: Vec<String> = state.all().map(|a| a.address.clone()).collect();
            (addresses, state.network.clone())
        };

        let queries = addresses.iter().map(|address| {
            let engine = self.engine.clone();
            let network = network.clone();
            async move { engine.query_balance_and_utxos(address, &network).await }
        });
        let results = futures::future::join_all(queries).await;

        let mut first_error = None;
        {
            let mut state = self.state.write().await;
            for (address, result) in addresses.iter().zip(results) {
                match result {
                    Ok(balance) => {
                        state.apply_balance(address, balance.amount, balance.utxos);
                    }
                    Err(e) => {
                        log::warn!("Balance query failed for {}: {}", address, e);
                        first_error.get_or_insert(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        log::debug!("Refreshed {} address balance(s)", addresses.len());
        self.ensure_fresh_receive_address().await
    }

    pub async fn get_all_addresses(&self) -> Vec<DerivedAddress> {
        self.state.read().await.all().cloned().collect()
    }

    pub async fn get_total_balance(&self) -> Amount {
        self.state.read().await.total_balance()
    }

    /// Point-in-time copy of the full ledger state
    pub async fn snapshot(&self) -> AddressLedgerState {
        self.state.read().await.clone()
    }
}
