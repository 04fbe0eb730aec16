use std::sync::Arc;

use alloy::{
    primitives::{Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use tracing::debug;

use crate::error::GatewayError;
use crate::ledger::LedgerClient;

sol! {
    interface IMiniAmm {
        function getReserves() external view returns (uint256 reserveA, uint256 reserveB);
        function getFees() external view returns (uint256 feeA, uint256 feeB);
        function compoundFees() external;
        function rebalance(uint256 amountIn, bool AtoB) external returns (uint256 amountOut);
    }
}

/// Snapshot of the pool, re-read every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolState {
    pub reserve_a: U256,
    pub reserve_b: U256,
    pub fee_a: U256,
    pub fee_b: U256,
}

/// Typed access to the pool contract over a [`LedgerClient`]
#[derive(Clone)]
pub struct ContractGateway {
    ledger: Arc<dyn LedgerClient>,
    address: Address,
}

impl ContractGateway {
    pub fn new(ledger: Arc<dyn LedgerClient>, address: Address) -> Self {
        Self { ledger, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub async fn read_reserves(&self) -> Result<(U256, U256), GatewayError> {
        let data = IMiniAmm::getReservesCall {}.abi_encode();
        let output = self.ledger.read_call(self.address, data.into()).await?;
        ensure_word_pair("getReserves", &output)?;
        let decoded = IMiniAmm::getReservesCall::abi_decode_returns(&output)
            .map_err(|e| decode_failure("getReserves", e))?;
        let reserves = (decoded.reserveA, decoded.reserveB);
        debug!("Reserves: A={}, B={}", reserves.0, reserves.1);
        Ok(reserves)
    }

    pub async fn read_fees(&self) -> Result<(U256, U256), GatewayError> {
        let data = IMiniAmm::getFeesCall {}.abi_encode();
        let output = self.ledger.read_call(self.address, data.into()).await?;
        ensure_word_pair("getFees", &output)?;
        let decoded = IMiniAmm::getFeesCall::abi_decode_returns(&output)
            .map_err(|e| decode_failure("getFees", e))?;
        let fees = (decoded.feeA, decoded.feeB);
        debug!("Accrued fees: A={}, B={}", fees.0, fees.1);
        Ok(fees)
    }

    pub async fn read_pool_state(&self) -> Result<PoolState, GatewayError> {
        let (reserve_a, reserve_b) = self.read_reserves().await?;
        let (fee_a, fee_b) = self.read_fees().await?;
        Ok(PoolState {
            reserve_a,
            reserve_b,
            fee_a,
            fee_b,
        })
    }

    pub fn build_compound_call(&self) -> Bytes {
        IMiniAmm::compoundFeesCall {}.abi_encode().into()
    }

    pub fn build_rebalance_call(&self, amount: U256, a_to_b: bool) -> Result<Bytes, GatewayError> {
        if amount.is_zero() {
            return Err(GatewayError::EncodeFailure {
                method: "rebalance",
                message: "amount must be positive".to_string(),
            });
        }

        let call = IMiniAmm::rebalanceCall {
            amountIn: amount,
            AtoB: a_to_b,
        };
        Ok(call.abi_encode().into())
    }
}

/// A `(uint256, uint256)` return is exactly two ABI words, no trailing data
fn ensure_word_pair(method: &'static str, output: &[u8]) -> Result<(), GatewayError> {
    if output.len() != 64 {
        return Err(GatewayError::DecodeFailure {
            method,
            message: format!("expected 64 bytes, got {}", output.len()),
        });
    }
    Ok(())
}

fn decode_failure(method: &'static str, error: alloy::sol_types::Error) -> GatewayError {
    GatewayError::DecodeFailure {
        method,
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::ledger::mock::MockLedger;

    fn gateway(ledger: Arc<MockLedger>) -> ContractGateway {
        ContractGateway::new(ledger, Address::repeat_byte(0x11))
    }

    #[tokio::test]
    async fn test_read_pool_state() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_reserves(U256::from(1_000u64), U256::from(2_000u64));
        ledger.set_fees(U256::from(7u64), U256::from(9u64));

        let state = gateway(ledger).read_pool_state().await.unwrap();
        assert_eq!(state.reserve_a, U256::from(1_000u64));
        assert_eq!(state.reserve_b, U256::from(2_000u64));
        assert_eq!(state.fee_a, U256::from(7u64));
        assert_eq!(state.fee_b, U256::from(9u64));
    }

    #[tokio::test]
    async fn test_short_payload_is_decode_failure() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_raw_read_response(Bytes::from(vec![0u8; 32]));

        let result = gateway(ledger).read_reserves().await;
        assert!(matches!(
            result,
            Err(GatewayError::DecodeFailure { method: "getReserves", .. })
        ));
    }

    #[tokio::test]
    async fn test_word_pair_decoded_in_order() {
        let ledger = Arc::new(MockLedger::new());
        let mut payload = vec![0u8; 64];
        payload[31] = 3;
        payload[63] = 4;
        ledger.set_raw_read_response(Bytes::from(payload));

        let fees = gateway(ledger).read_fees().await.unwrap();
        assert_eq!(fees, (U256::from(3u64), U256::from(4u64)));
    }

    #[tokio::test]
    async fn test_trailing_bytes_are_decode_failure() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_raw_read_response(Bytes::from(vec![0u8; 96]));

        let result = gateway(ledger).read_fees().await;
        assert!(matches!(
            result,
            Err(GatewayError::DecodeFailure { method: "getFees", .. })
        ));
    }

    #[tokio::test]
    async fn test_node_error_is_call_failure() {
        let ledger = Arc::new(MockLedger::new());
        ledger.fail_reads(LedgerError::Rpc("execution reverted".to_string()));

        let result = gateway(ledger).read_fees().await;
        assert!(matches!(result, Err(GatewayError::CallFailure(_))));
    }

    #[test]
    fn test_rebalance_call_encoding() {
        let gateway = gateway(Arc::new(MockLedger::new()));

        let data = gateway.build_rebalance_call(U256::from(5u64), true).unwrap();
        assert_eq!(&data[..4], IMiniAmm::rebalanceCall::SELECTOR.as_slice());

        let decoded = IMiniAmm::rebalanceCall::abi_decode(&data).unwrap();
        assert_eq!(decoded.amountIn, U256::from(5u64));
        assert!(decoded.AtoB);

        assert!(matches!(
            gateway.build_rebalance_call(U256::ZERO, false),
            Err(GatewayError::EncodeFailure { .. })
        ));
    }

    #[test]
    fn test_compound_call_is_selector_only() {
        let data = gateway(Arc::new(MockLedger::new())).build_compound_call();
        assert_eq!(data.as_ref(), IMiniAmm::compoundFeesCall::SELECTOR.as_slice());
    }
}
