//! Transaction lifecycle tracking shared by every write operation.
//!
//! A [`TxLifecycle`] is created per write and moves through
//! `idle → submitting → awaiting-signature-result → pending-confirmation`
//! before settling in `confirmed` or `failed`. [`TxObserver`] drives that
//! record against a [`Wallet`] and raises the matching notifications.

use alloy::primitives::TxHash;
use derive_more::Display;
use log::{debug, error, info};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::{FundingError, Result, TxFailure};
use crate::providers::{TxReceiptInfo, Wallet, WriteCall};
use crate::services::notification_handler::{Notification, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
pub enum TxState {
    #[display(fmt = "idle")]
    Idle,
    #[display(fmt = "submitting")]
    Submitting,
    #[display(fmt = "awaiting-signature-result")]
    AwaitingSignature,
    #[display(fmt = "pending-confirmation")]
    PendingConfirmation,
    #[display(fmt = "confirmed")]
    Confirmed,
    #[display(fmt = "failed")]
    Failed,
}

impl TxState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TxState::Confirmed | TxState::Failed)
    }

    /// Submitted to the wallet but not settled yet.
    pub fn is_in_flight(self) -> bool {
        matches!(
            self,
            TxState::Submitting | TxState::AwaitingSignature | TxState::PendingConfirmation
        )
    }

    fn can_transition_to(self, next: TxState) -> bool {
        match (self, next) {
            (TxState::Idle, TxState::Submitting) => true,
            (TxState::Submitting, TxState::AwaitingSignature) => true,
            (TxState::AwaitingSignature, TxState::PendingConfirmation) => true,
            (TxState::PendingConfirmation, TxState::Confirmed) => true,
            (from, TxState::Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// State of one write operation. Never reused across operations.
#[derive(Debug, Clone, Serialize)]
pub struct TxLifecycle {
    action: String,
    state: TxState,
    hash: Option<TxHash>,
    receipt: Option<TxReceiptInfo>,
    #[serde(skip)]
    failure: Option<TxFailure>,
    history: Vec<TxState>,
}

impl TxLifecycle {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            state: TxState::Idle,
            hash: None,
            receipt: None,
            failure: None,
            history: vec![TxState::Idle],
        }
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn hash(&self) -> Option<TxHash> {
        self.hash
    }

    pub fn receipt(&self) -> Option<&TxReceiptInfo> {
        self.receipt.as_ref()
    }

    pub fn failure(&self) -> Option<&TxFailure> {
        self.failure.as_ref()
    }

    /// Every state visited, in order, starting with `idle`.
    pub fn history(&self) -> &[TxState] {
        &self.history
    }

    pub fn is_confirmed(&self) -> bool {
        self.state == TxState::Confirmed
    }

    pub fn is_failed(&self) -> bool {
        self.state == TxState::Failed
    }

    fn transition(&mut self, next: TxState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(FundingError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!("{}: {} -> {}", self.action, self.state, next);
        self.state = next;
        self.history.push(next);
        Ok(())
    }

    pub fn begin(&mut self) -> Result<()> {
        self.transition(TxState::Submitting)
    }

    pub fn await_signature(&mut self) -> Result<()> {
        self.transition(TxState::AwaitingSignature)
    }

    pub fn submitted(&mut self, hash: TxHash) -> Result<()> {
        self.transition(TxState::PendingConfirmation)?;
        self.hash = Some(hash);
        Ok(())
    }

    pub fn confirm(&mut self, receipt: TxReceiptInfo) -> Result<()> {
        self.transition(TxState::Confirmed)?;
        self.receipt = Some(receipt);
        Ok(())
    }

    pub fn fail(&mut self, failure: TxFailure) -> Result<()> {
        self.transition(TxState::Failed)?;
        self.failure = Some(failure);
        Ok(())
    }

    /// Converts a settled record into the receipt or the failure cause.
    pub fn into_result(self) -> Result<TxReceiptInfo> {
        match (self.state, self.receipt, self.failure) {
            (TxState::Confirmed, Some(receipt), _) => Ok(receipt),
            (_, _, Some(failure)) => Err(FundingError::Transaction(failure)),
            (state, _, _) => Err(FundingError::InvalidTransition {
                from: state,
                to: TxState::Confirmed,
            }),
        }
    }
}

/// Rejects a second submission while one is outstanding.
#[derive(Debug, Default)]
pub struct InFlight(AtomicBool);

impl InFlight {
    pub fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub fn acquire(&self) -> Result<InFlightGuard<'_>> {
        if self.0.swap(true, Ordering::AcqRel) {
            return Err(FundingError::AlreadyPending);
        }
        Ok(InFlightGuard(&self.0))
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Releases the slot on drop, including when the owning future is dropped.
pub struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs write calls through the wallet and reports their lifecycle.
#[derive(Clone)]
pub struct TxObserver {
    wallet: Arc<dyn Wallet>,
    notifier: Arc<dyn Notifier>,
}

impl TxObserver {
    pub fn new(wallet: Arc<dyn Wallet>, notifier: Arc<dyn Notifier>) -> Self {
        Self { wallet, notifier }
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Submits `call` and waits for it to settle.
    ///
    /// Returns the settled record; wallet and chain failures are recorded in
    /// it rather than returned as `Err`. `Err` means nothing was submitted.
    pub async fn execute(&self, call: WriteCall) -> Result<TxLifecycle> {
        if !self.wallet.is_connected() {
            return Err(FundingError::WalletNotConnected);
        }

        let mut lifecycle = TxLifecycle::new(call.summary());
        lifecycle.begin()?;
        info!("{}: submitting {}", lifecycle.action(), call.function_name());

        lifecycle.await_signature()?;
        let hash = match self.wallet.sign_and_send(call).await {
            Ok(hash) => hash,
            Err(failure) => {
                lifecycle.fail(failure)?;
                self.report_failure(&lifecycle).await;
                return Ok(lifecycle);
            }
        };

        lifecycle.submitted(hash)?;
        self.notifier
            .notify(Notification::info(
                lifecycle.action(),
                format!("Transaction {:?} is being processed.", hash),
            ))
            .await;

        match self.wallet.wait_for_receipt(hash).await {
            Ok(receipt) if receipt.success => {
                let block = receipt
                    .block_number
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "pending".to_string());
                lifecycle.confirm(receipt)?;
                info!("{}: confirmed in block {}", lifecycle.action(), block);
                self.notifier
                    .notify(Notification::success(
                        lifecycle.action(),
                        format!("Transaction {:?} confirmed in block {}.", hash, block),
                    ))
                    .await;
            }
            Ok(_) => {
                lifecycle.fail(TxFailure::Reverted {
                    hash: Some(hash),
                    reason: None,
                })?;
                self.report_failure(&lifecycle).await;
            }
            Err(failure) => {
                lifecycle.fail(failure)?;
                self.report_failure(&lifecycle).await;
            }
        }

        Ok(lifecycle)
    }

    async fn report_failure(&self, lifecycle: &TxLifecycle) {
        let message = lifecycle
            .failure()
            .map(|f| f.to_string())
            .unwrap_or_else(|| "Something went wrong. Please try again.".to_string());
        error!("{}: {}", lifecycle.action(), message);
        self.notifier
            .notify(Notification::error(lifecycle.action(), message))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::notification_handler::NotificationLevel;
    use crate::testing::{MockWallet, RecordingNotifier};
    use alloy::primitives::U256;

    fn collect_call() -> WriteCall {
        WriteCall::IncreasePoolUnits {
            pool_id: U256::from(1u64),
        }
    }

    #[test]
    fn test_valid_path() {
        let mut lifecycle = TxLifecycle::new("test");
        lifecycle.begin().unwrap();
        lifecycle.await_signature().unwrap();
        lifecycle.submitted(TxHash::repeat_byte(1)).unwrap();
        lifecycle
            .confirm(TxReceiptInfo {
                hash: TxHash::repeat_byte(1),
                success: true,
                block_number: Some(10),
                gas_used: 21_000,
            })
            .unwrap();
        assert!(lifecycle.is_confirmed());
        assert_eq!(
            lifecycle.history(),
            &[
                TxState::Idle,
                TxState::Submitting,
                TxState::AwaitingSignature,
                TxState::PendingConfirmation,
                TxState::Confirmed
            ]
        );
    }

    #[test]
    fn test_cannot_confirm_without_pending_confirmation() {
        let mut lifecycle = TxLifecycle::new("test");
        lifecycle.begin().unwrap();
        let receipt = TxReceiptInfo {
            hash: TxHash::ZERO,
            success: true,
            block_number: None,
            gas_used: 0,
        };
        let err = lifecycle.confirm(receipt).unwrap_err();
        assert!(matches!(
            err,
            FundingError::InvalidTransition {
                from: TxState::Submitting,
                to: TxState::Confirmed
            }
        ));
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut lifecycle = TxLifecycle::new("test");
        lifecycle.begin().unwrap();
        lifecycle
            .fail(TxFailure::Rejected("user denied".into()))
            .unwrap();
        assert!(lifecycle.fail(TxFailure::Submission("again".into())).is_err());
        assert!(lifecycle.begin().is_err());
        assert!(lifecycle.is_failed());
        assert!(!lifecycle.is_confirmed());
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let in_flight = InFlight::new();
        let guard = in_flight.acquire().unwrap();
        assert!(in_flight.is_active());
        assert!(matches!(
            in_flight.acquire(),
            Err(FundingError::AlreadyPending)
        ));
        drop(guard);
        assert!(!in_flight.is_active());
        assert!(in_flight.acquire().is_ok());
    }

    #[tokio::test]
    async fn test_execute_confirms_and_notifies() {
        let wallet = Arc::new(MockWallet::connected());
        let notifier = Arc::new(RecordingNotifier::default());
        let observer = TxObserver::new(wallet.clone(), notifier.clone());

        let lifecycle = observer.execute(collect_call()).await.unwrap();

        assert!(lifecycle.is_confirmed());
        assert!(lifecycle.hash().is_some());
        assert!(lifecycle.history().contains(&TxState::PendingConfirmation));
        assert_eq!(wallet.sent_calls(), vec![collect_call()]);
        assert_eq!(
            notifier.levels(),
            vec![NotificationLevel::Info, NotificationLevel::Success]
        );
    }

    #[tokio::test]
    async fn test_execute_rejected_signature_fails_without_hash() {
        let wallet = Arc::new(MockWallet::connected());
        wallet.reject_next("User denied transaction signature");
        let notifier = Arc::new(RecordingNotifier::default());
        let observer = TxObserver::new(wallet.clone(), notifier.clone());

        let lifecycle = observer.execute(collect_call()).await.unwrap();

        assert!(lifecycle.is_failed());
        assert_eq!(lifecycle.hash(), None);
        assert!(lifecycle.failure().unwrap().is_rejection());
        assert!(!lifecycle.history().contains(&TxState::Confirmed));
        assert_eq!(notifier.levels(), vec![NotificationLevel::Error]);
    }

    #[tokio::test]
    async fn test_execute_reverted_receipt_fails() {
        let wallet = Arc::new(MockWallet::connected());
        wallet.revert_next_receipt();
        let notifier = Arc::new(RecordingNotifier::default());
        let observer = TxObserver::new(wallet.clone(), notifier.clone());

        let lifecycle = observer.execute(collect_call()).await.unwrap();

        assert!(lifecycle.is_failed());
        assert!(lifecycle.hash().is_some());
        assert!(matches!(
            lifecycle.failure(),
            Some(TxFailure::Reverted { reason: None, .. })
        ));
        assert_eq!(
            notifier.levels(),
            vec![NotificationLevel::Info, NotificationLevel::Error]
        );
        assert!(lifecycle.into_result().is_err());
    }

    #[tokio::test]
    async fn test_execute_requires_connected_wallet() {
        let wallet = Arc::new(MockWallet::disconnected());
        let notifier = Arc::new(RecordingNotifier::default());
        let observer = TxObserver::new(wallet.clone(), notifier.clone());

        let err = observer.execute(collect_call()).await.unwrap_err();
        assert!(matches!(err, FundingError::WalletNotConnected));
        assert!(wallet.sent_calls().is_empty());
    }
}
