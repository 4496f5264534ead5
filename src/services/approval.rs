use alloy::primitives::{Address, U256};
use log::warn;

use super::allowance::AllowanceTracker;
use super::lifecycle::{InFlight, TxLifecycle, TxObserver};
use crate::errors::Result;
use crate::providers::WriteCall;

/// Grants the distributor permission to pull the distribution token.
pub struct ApprovalStep {
    observer: TxObserver,
    token: Address,
    in_flight: InFlight,
}

impl ApprovalStep {
    pub fn new(observer: TxObserver, token: Address) -> Self {
        Self {
            observer,
            token,
            in_flight: InFlight::new(),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_active()
    }

    /// Approves `amount` whole tokens, converted with the tracker's decimals.
    pub async fn approve(
        &self,
        spender: Address,
        amount: &str,
        tracker: &mut AllowanceTracker,
    ) -> Result<TxLifecycle> {
        if tracker.state().is_none() {
            tracker.refetch().await?;
        }
        let raw = tracker.required_amount(amount)?;
        self.approve_raw(spender, raw, tracker).await
    }

    /// Approves exactly `amount` smallest units. Replaces any earlier allowance.
    pub async fn approve_raw(
        &self,
        spender: Address,
        amount: U256,
        tracker: &mut AllowanceTracker,
    ) -> Result<TxLifecycle> {
        let _guard = self.in_flight.acquire()?;
        let lifecycle = self
            .observer
            .execute(WriteCall::Approve {
                token: self.token,
                spender,
                amount,
            })
            .await?;

        if lifecycle.is_confirmed() {
            if let Err(e) = tracker.refetch().await {
                warn!("Failed to refresh allowance after approval: {}", e);
                tracker.invalidate();
            }
        }
        Ok(lifecycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{test_context, SPENDER, TOKEN};

    fn ether(value: u64) -> U256 {
        U256::from(value) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[tokio::test]
    async fn test_confirmed_approval_refreshes_allowance() {
        let ctx = test_context();
        let step = ApprovalStep::new(ctx.observer(), TOKEN);
        let mut tracker = ctx.tracker();
        tracker.refetch().await.unwrap();
        assert!(!tracker.has_sufficient_allowance("50"));

        let lifecycle = step.approve(SPENDER, "50", &mut tracker).await.unwrap();

        assert!(lifecycle.is_confirmed());
        assert_eq!(
            ctx.wallet.sent_calls(),
            vec![WriteCall::Approve {
                token: TOKEN,
                spender: SPENDER,
                amount: ether(50),
            }]
        );
        assert!(tracker.has_sufficient_allowance("50"));
    }

    #[tokio::test]
    async fn test_rejected_approval_keeps_allowance() {
        let ctx = test_context();
        ctx.wallet.reject_next("User rejected the request");
        let step = ApprovalStep::new(ctx.observer(), TOKEN);
        let mut tracker = ctx.tracker();
        tracker.refetch().await.unwrap();
        let reads = ctx.reader.allowance_reads();

        let lifecycle = step.approve(SPENDER, "50", &mut tracker).await.unwrap();

        assert!(lifecycle.is_failed());
        assert_eq!(ctx.reader.allowance_reads(), reads);
        assert!(!tracker.has_sufficient_allowance("50"));
    }

    #[tokio::test]
    async fn test_invalid_amount_is_not_submitted() {
        let ctx = test_context();
        let step = ApprovalStep::new(ctx.observer(), TOKEN);
        let mut tracker = ctx.tracker();

        assert!(step.approve(SPENDER, "-3", &mut tracker).await.is_err());
        assert!(ctx.wallet.sent_calls().is_empty());
    }
}
