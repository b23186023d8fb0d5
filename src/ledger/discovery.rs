//! Gap-limited address discovery
//!
//! Scans forward one index at a time, resetting the empty-run counter on
//! every funded address and stopping once `gap_limit` consecutive empty
//! addresses were seen. Scanned addresses are committed up to the highest
//! funded index, so trailing empties never enter the ledger.

use serde::Serialize;

use super::manager::AddressLedger;
use super::types::{AddressKind, DerivedAddress};
use crate::cancel::CancelToken;
use crate::engine::CryptoEngine;
use crate::error::AirgapError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryReport {
    pub kind: AddressKind,
    /// Scanned addresses with a balance, in index order
    pub funded: Vec<DerivedAddress>,
    /// First index that was not scanned
    pub next_index: u32,
    pub cancelled: bool,
}

impl<E: CryptoEngine> AddressLedger<E> {
    /// Recover funded addresses of `kind` starting at `start_index`
    pub async fn discover(
        &self,
        kind: AddressKind,
        start_index: u32,
        gap_limit: u32,
    ) -> Result<Vec<DerivedAddress>, AirgapError> {
        let report = self
            .discover_batched(kind, start_index, gap_limit, u32::MAX, &CancelToken::new())
            .await?;
        Ok(report.funded)
    }

    /// Discovery in batches of `batch_size`, checking `cancel` between batches
    ///
    /// Each finished batch is committed before the next starts; a cancelled
    /// or failed scan keeps everything committed so far.
    pub async fn discover_batched(
        &self,
        kind: AddressKind,
        start_index: u32,
        gap_limit: u32,
        batch_size: u32,
        cancel: &CancelToken,
    ) -> Result<DiscoveryReport, AirgapError> {
        let _guard = self.allocator(kind).lock().await;
        let network = self.network().await;
        let batch_size = batch_size.max(1);

        let mut report = DiscoveryReport {
            kind,
            funded: Vec::new(),
            next_index: start_index,
            cancelled: false,
        };
        if gap_limit == 0 {
            return Ok(report);
        }

        log::info!(
            "Discovering {} addresses from #{} (gap limit {})",
            kind,
            start_index,
            gap_limit
        );

        let mut pending: Vec<DerivedAddress> = Vec::new();
        let mut empty_run = 0u32;
        let mut index = start_index;

        'batches: loop {
            if cancel.is_cancelled() {
                log::info!("Discovery of {} addresses cancelled at #{}", kind, index);
                report.cancelled = true;
                break;
            }

            for _ in 0..batch_size {
                let (entry, is_new) = self.scan_index(kind, index, &network).await?;
                index = index.checked_add(1).ok_or_else(|| {
                    AirgapError::InvalidState(format!("{} index space exhausted", kind))
                })?;
                report.next_index = index;

                if entry.is_funded() {
                    empty_run = 0;
                    report.funded.push(entry.clone());
                } else {
                    empty_run += 1;
                }
                if is_new {
                    pending.push(entry);
                }

                if empty_run >= gap_limit {
                    self.commit_discovered(kind, &mut pending, &network).await?;
                    break 'batches;
                }
            }

            self.commit_discovered(kind, &mut pending, &network).await?;
        }

        log::info!(
            "Discovery found {} funded {} address(es), scanned up to #{}",
            report.funded.len(),
            kind,
            report.next_index
        );
        Ok(report)
    }

    /// Look up one index with a live balance query
    ///
    /// Known indices reuse the stored address and take the live balance
    /// immediately; new ones are returned uncommitted, flagged `true`.
    async fn scan_index(
        &self,
        kind: AddressKind,
        index: u32,
        network: &str,
    ) -> Result<(DerivedAddress, bool), AirgapError> {
        let known = self.state.read().await.get(kind, index).cloned();
        let is_new = known.is_none();
        let mut entry = match known {
            Some(entry) => entry,
            None => self.derive_entry(kind, index, network).await?,
        };

        let live = self
            .engine
            .query_balance_and_utxos(&entry.address, network)
            .await?;
        entry.balance = live.amount;
        entry.utxos = live.utxos;

        if !is_new {
            self.state
                .write()
                .await
                .apply_balance(&entry.address, entry.balance, entry.utxos.clone());
        }
        Ok((entry, is_new))
    }

    /// Insert pending entries up to the highest funded one, filling any gap
    /// between the ledger's next free index and the scan start
    async fn commit_discovered(
        &self,
        kind: AddressKind,
        pending: &mut Vec<DerivedAddress>,
        network: &str,
    ) -> Result<(), AirgapError> {
        let Some(highest) = pending.iter().filter(|e| e.is_funded()).map(|e| e.index).max() else {
            return Ok(());
        };

        let next = self.state.read().await.next_index(kind);
        let first_pending = pending.first().map(|e| e.index).unwrap_or(next);

        let mut fill = Vec::new();
        for index in next..first_pending {
            let (entry, _) = self.scan_index(kind, index, network).await?;
            fill.push(entry);
        }

        let split = pending
            .iter()
            .position(|e| e.index > highest)
            .unwrap_or(pending.len());
        let committed: Vec<DerivedAddress> = pending.drain(..split).collect();

        let mut state = self.state.write().await;
        for entry in fill.into_iter().chain(committed) {
            log::debug!("Committing discovered {} address #{}", kind, entry.index);
            state.insert(entry)?;
        }
        Ok(())
    }
}
