use std::time::Duration;

use alloy::{
    consensus::{Transaction, TxEnvelope},
    eips::eip2718::Decodable2718,
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolCall,
};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::{LedgerClient, Receipt};
use crate::contract::IMiniAmm;
use crate::error::LedgerError;

/// A transaction the mock accepted
#[derive(Debug, Clone)]
pub struct SubmittedRecord {
    pub tx_hash: B256,
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub chain_id: Option<u64>,
    pub to: Option<Address>,
    pub input: Bytes,
}

struct MockState {
    reserves: (U256, U256),
    fees: (U256, U256),
    reserves_after_submit: Option<(U256, U256)>,
    raw_read_response: Option<Bytes>,
    read_error: Option<LedgerError>,
    base_nonce: u64,
    nonce_delay: Option<Duration>,
    gas_price: u128,
    submit_error: Option<LedgerError>,
    submitted: Vec<SubmittedRecord>,
    receipt_success: bool,
    /// `None` keeps the receipt pending forever
    receipt_after_lookups: Option<usize>,
    receipt_lookups: usize,
    gas_used: u64,
    balance: U256,
    block_number: u64,
}

/// Scripted in-process ledger node
pub struct MockLedger {
    state: Mutex<MockState>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                reserves: (U256::ZERO, U256::ZERO),
                fees: (U256::ZERO, U256::ZERO),
                reserves_after_submit: None,
                raw_read_response: None,
                read_error: None,
                base_nonce: 0,
                nonce_delay: None,
                gas_price: 1_000_000_000,
                submit_error: None,
                submitted: Vec::new(),
                receipt_success: true,
                receipt_after_lookups: Some(0),
                receipt_lookups: 0,
                gas_used: 21_000,
                balance: U256::ZERO,
                block_number: 1,
            }),
        }
    }

    pub fn set_reserves(&self, reserve_a: U256, reserve_b: U256) {
        self.state.lock().reserves = (reserve_a, reserve_b);
    }

    pub fn set_fees(&self, fee_a: U256, fee_b: U256) {
        self.state.lock().fees = (fee_a, fee_b);
    }

    /// Reserves reported once any transaction has been accepted
    pub fn set_reserves_after_submit(&self, reserve_a: U256, reserve_b: U256) {
        self.state.lock().reserves_after_submit = Some((reserve_a, reserve_b));
    }

    pub fn set_raw_read_response(&self, data: Bytes) {
        self.state.lock().raw_read_response = Some(data);
    }

    pub fn fail_reads(&self, error: LedgerError) {
        self.state.lock().read_error = Some(error);
    }

    pub fn set_base_nonce(&self, nonce: u64) {
        self.state.lock().base_nonce = nonce;
    }

    /// Delay between reading and returning the pending nonce
    pub fn set_nonce_delay(&self, delay: Duration) {
        self.state.lock().nonce_delay = Some(delay);
    }

    pub fn set_gas_price(&self, gas_price: u128) {
        self.state.lock().gas_price = gas_price;
    }

    pub fn fail_submissions(&self, error: LedgerError) {
        self.state.lock().submit_error = Some(error);
    }

    pub fn set_receipt_success(&self, success: bool) {
        self.state.lock().receipt_success = success;
    }

    pub fn set_receipt_after_lookups(&self, lookups: Option<usize>) {
        self.state.lock().receipt_after_lookups = lookups;
    }

    pub fn set_balance(&self, balance: U256) {
        self.state.lock().balance = balance;
    }

    pub fn submitted(&self) -> Vec<SubmittedRecord> {
        self.state.lock().submitted.clone()
    }

    pub fn receipt_lookups(&self) -> usize {
        self.state.lock().receipt_lookups
    }
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_pair(first: U256, second: U256) -> Bytes {
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(&first.to_be_bytes::<32>());
    out.extend_from_slice(&second.to_be_bytes::<32>());
    out.into()
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn read_call(&self, _to: Address, data: Bytes) -> Result<Bytes, LedgerError> {
        let state = self.state.lock();
        if let Some(error) = &state.read_error {
            return Err(error.clone());
        }
        if let Some(raw) = &state.raw_read_response {
            return Ok(raw.clone());
        }

        let selector = data.get(..4).unwrap_or_default();
        if selector == IMiniAmm::getReservesCall::SELECTOR.as_slice() {
            let (a, b) = match (&state.reserves_after_submit, state.submitted.is_empty()) {
                (Some(after), false) => *after,
                _ => state.reserves,
            };
            Ok(encode_pair(a, b))
        } else if selector == IMiniAmm::getFeesCall::SELECTOR.as_slice() {
            Ok(encode_pair(state.fees.0, state.fees.1))
        } else {
            Err(LedgerError::Rpc("unknown selector".to_string()))
        }
    }

    async fn submit_raw(&self, raw: Bytes) -> Result<B256, LedgerError> {
        let envelope = TxEnvelope::decode_2718(&mut raw.as_ref())
            .map_err(|e| LedgerError::Rpc(format!("invalid transaction: {}", e)))?;

        let mut state = self.state.lock();
        if let Some(error) = &state.submit_error {
            return Err(error.clone());
        }

        let tx_hash = *envelope.tx_hash();
        state.submitted.push(SubmittedRecord {
            tx_hash,
            nonce: envelope.nonce(),
            gas_price: envelope.gas_price().unwrap_or_default(),
            gas_limit: envelope.gas_limit(),
            chain_id: envelope.chain_id(),
            to: envelope.to(),
            input: envelope.input().clone(),
        });
        state.block_number += 1;
        Ok(tx_hash)
    }

    async fn pending_nonce(&self, _account: Address) -> Result<u64, LedgerError> {
        let (nonce, delay) = {
            let state = self.state.lock();
            (state.base_nonce + state.submitted.len() as u64, state.nonce_delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(nonce)
    }

    async fn suggested_gas_price(&self) -> Result<u128, LedgerError> {
        Ok(self.state.lock().gas_price)
    }

    async fn receipt(&self, tx_hash: B256) -> Result<Option<Receipt>, LedgerError> {
        let mut state = self.state.lock();
        let lookups = state.receipt_lookups;
        state.receipt_lookups += 1;

        match state.receipt_after_lookups {
            Some(after) if lookups >= after => Ok(Some(Receipt {
                tx_hash,
                success: state.receipt_success,
                gas_used: state.gas_used,
                block_number: Some(state.block_number),
            })),
            _ => Ok(None),
        }
    }

    async fn balance(&self, _account: Address) -> Result<U256, LedgerError> {
        Ok(self.state.lock().balance)
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        Ok(self.state.lock().block_number)
    }
}
