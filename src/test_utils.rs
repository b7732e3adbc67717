//! Test Utilities Module
//!
//! A scripted in-memory ledger for deterministic tests of fee quoting, batch
//! execution and the submission protocol. No network access.
//!
//! Only compiled when running tests or when the `test_utils` feature is
//! enabled.

#![cfg(any(test, feature = "test_utils"))]

use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use crate::layout::Reserve;
use crate::rpc::{
    ConfirmationLevel, LedgerError, LedgerReader, LedgerResult, LedgerWriter, SignatureStatus,
};

/// Outcome of one scripted broadcast
#[derive(Debug, Clone)]
pub enum ScriptedBroadcast {
    /// Accepted and reported as accepted
    Accept,
    /// Rejected; the transaction never lands
    Fail(LedgerError),
    /// Lands on the ledger, but the caller sees an error
    LandThenFail(LedgerError),
}

/// Every call made against the mock, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    AccountRead(Pubkey),
    Blockhash,
    Broadcast(Signature),
    StatusQuery(Signature),
    Airdrop(Pubkey, u64),
}

#[derive(Default)]
struct MockState {
    accounts: HashMap<Pubkey, Vec<u8>>,
    broadcast_script: VecDeque<ScriptedBroadcast>,
    status_script: VecDeque<LedgerResult<SignatureStatus>>,
    landed: HashSet<Signature>,
    transactions: Vec<Transaction>,
    events: Vec<LedgerEvent>,
    airdrops: u64,
}

/// Scripted ledger double
///
/// Broadcasts follow the broadcast script and default to `Accept` once it
/// runs out. A signature is only visible to status queries after it landed;
/// queries for a landed signature follow the status script and default to
/// finalized without error.
pub struct MockLedger {
    blockhash: Hash,
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            blockhash: Hash::new_unique(),
            state: Mutex::new(MockState::default()),
        }
    }

    pub fn with_account(self, address: Pubkey, data: Vec<u8>) -> Self {
        self.state.lock().unwrap().accounts.insert(address, data);
        self
    }

    pub fn with_broadcasts(self, script: impl IntoIterator<Item = ScriptedBroadcast>) -> Self {
        self.state.lock().unwrap().broadcast_script.extend(script);
        self
    }

    pub fn with_statuses(
        self,
        script: impl IntoIterator<Item = LedgerResult<SignatureStatus>>,
    ) -> Self {
        self.state.lock().unwrap().status_script.extend(script);
        self
    }

    /// Broadcast script that fails `failures` times with a transport error
    pub fn failing(failures: usize) -> Vec<ScriptedBroadcast> {
        (0..failures)
            .map(|i| {
                ScriptedBroadcast::Fail(LedgerError::Transport(format!(
                    "connection reset #{}",
                    i + 1
                )))
            })
            .collect()
    }

    pub fn blockhash(&self) -> Hash {
        self.blockhash
    }

    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Transactions received by `broadcast`, including rejected ones
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().transactions.clone()
    }

    pub fn broadcast_count(&self) -> usize {
        self.count(|e| matches!(e, LedgerEvent::Broadcast(_)))
    }

    pub fn status_query_count(&self) -> usize {
        self.count(|e| matches!(e, LedgerEvent::StatusQuery(_)))
    }

    fn count(&self, pred: impl Fn(&LedgerEvent) -> bool) -> usize {
        self.state.lock().unwrap().events.iter().filter(|e| pred(e)).count()
    }

    fn land(
        state: &mut MockState,
        signature: Signature,
        outcome: ScriptedBroadcast,
    ) -> LedgerResult<Signature> {
        match outcome {
            ScriptedBroadcast::Accept => {
                state.landed.insert(signature);
                Ok(signature)
            }
            ScriptedBroadcast::Fail(err) => Err(err),
            ScriptedBroadcast::LandThenFail(err) => {
                state.landed.insert(signature);
                Err(err)
            }
        }
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Finalized status, optionally with an execution error
pub fn finalized(err: Option<&str>) -> SignatureStatus {
    SignatureStatus {
        level: ConfirmationLevel::Finalized,
        err: err.map(str::to_string),
    }
}

pub fn at_level(level: ConfirmationLevel) -> SignatureStatus {
    SignatureStatus { level, err: None }
}

/// Reserve with distinct addresses and the given fee configuration
pub fn sample_reserve(flash_loan_fee_wad: u64, texture_fee_percentage: u8) -> Reserve {
    let mut reserve = Reserve {
        version: 1,
        last_update_slot: 42,
        lending_market: Pubkey::new_unique(),
        ..Reserve::default()
    };
    reserve.liquidity.mint_pubkey = Pubkey::new_unique();
    reserve.liquidity.mint_decimals = 9;
    reserve.liquidity.supply_pubkey = Pubkey::new_unique();
    reserve.liquidity.available_amount = 5_000_000_000;
    reserve.config.fees.flash_loan_fee_wad = flash_loan_fee_wad;
    reserve.config.fees.texture_fee_percentage = texture_fee_percentage;
    reserve.config.fee_receiver = Pubkey::new_unique();
    reserve
}

#[async_trait]
impl LedgerReader for MockLedger {
    async fn get_account_bytes(&self, address: &Pubkey) -> LedgerResult<Option<Vec<u8>>> {
        let mut state = self.state.lock().unwrap();
        state.events.push(LedgerEvent::AccountRead(*address));
        Ok(state.accounts.get(address).cloned())
    }
}

#[async_trait]
impl LedgerWriter for MockLedger {
    async fn latest_blockhash(&self) -> LedgerResult<Hash> {
        self.state.lock().unwrap().events.push(LedgerEvent::Blockhash);
        Ok(self.blockhash)
    }

    async fn broadcast(&self, transaction: &Transaction) -> LedgerResult<Signature> {
        let mut state = self.state.lock().unwrap();
        let signature = transaction.signatures.first().copied().unwrap_or_default();
        state.events.push(LedgerEvent::Broadcast(signature));
        state.transactions.push(transaction.clone());

        let outcome = state
            .broadcast_script
            .pop_front()
            .unwrap_or(ScriptedBroadcast::Accept);
        Self::land(&mut state, signature, outcome)
    }

    async fn signature_status(
        &self,
        signature: &Signature,
    ) -> LedgerResult<Option<SignatureStatus>> {
        let mut state = self.state.lock().unwrap();
        state.events.push(LedgerEvent::StatusQuery(*signature));
        if !state.landed.contains(signature) {
            return Ok(None);
        }
        match state.status_script.pop_front() {
            Some(scripted) => scripted.map(Some),
            None => Ok(Some(finalized(None))),
        }
    }

    async fn request_airdrop(&self, to: &Pubkey, lamports: u64) -> LedgerResult<Signature> {
        let mut state = self.state.lock().unwrap();
        state.events.push(LedgerEvent::Airdrop(*to, lamports));
        state.airdrops += 1;

        let mut bytes = [0u8; 64];
        bytes[..8].copy_from_slice(&state.airdrops.to_le_bytes());
        bytes[8..40].copy_from_slice(to.as_ref());
        let signature = Signature::from(bytes);

        let outcome = state
            .broadcast_script
            .pop_front()
            .unwrap_or(ScriptedBroadcast::Accept);
        Self::land(&mut state, signature, outcome)
    }
}
