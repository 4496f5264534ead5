//! In-memory wallet, chain and notifier used by the unit tests.

use alloy::primitives::{address, Address, TxHash, B256, I256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use crate::errors::{FundingError, Result, TxFailure};
use crate::models::Token;
use crate::providers::{ChainReader, PoolSnapshot, TxReceiptInfo, Wallet, WriteCall};
use crate::services::allowance::AllowanceTracker;
use crate::services::lifecycle::TxObserver;
use crate::services::notification_handler::{Notification, NotificationLevel, Notifier};
use crate::services::pools::PoolService;

pub const OWNER: Address = address!("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
pub const SPENDER: Address = address!("0x29754F3d807EC91066cF2693c92922E036E27E08");
pub const TOKEN: Address = address!("0x30a6933ca9230361972e413a15dc8114c952414e");

#[derive(Debug, Clone)]
struct MockPool {
    address: Address,
    name: String,
    symbol: String,
    total_units: u128,
    member_units: u128,
    flow_rate: I256,
}

#[derive(Debug)]
struct ChainState {
    allowance: U256,
    balance: U256,
    pools: Vec<MockPool>,
    failing_allowance_from: Option<usize>,
}

/// Chain double holding one token, its allowance and a list of pools.
pub struct MockChainReader {
    state: Mutex<ChainState>,
    token: Token,
    allowance_reads: AtomicUsize,
    pool_count_reads: AtomicUsize,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ChainState {
                allowance: U256::ZERO,
                balance: U256::from(1_000_000u64) * U256::from(10u64).pow(U256::from(18u64)),
                pools: Vec::new(),
                failing_allowance_from: None,
            }),
            token: Token::new(TOKEN, "Super DAI".to_string(), "DAIx".to_string(), 18),
            allowance_reads: AtomicUsize::new(0),
            pool_count_reads: AtomicUsize::new(0),
        }
    }

    pub fn set_allowance(&self, allowance: U256) {
        self.state.lock().unwrap().allowance = allowance;
    }

    pub fn set_balance(&self, balance: U256) {
        self.state.lock().unwrap().balance = balance;
    }

    pub fn add_pool(&self, name: &str, symbol: &str, total_units: u128, member_units: u128) -> Address {
        let mut state = self.state.lock().unwrap();
        let address = Address::with_last_byte(0xa0 + state.pools.len() as u8);
        state.pools.push(MockPool {
            address,
            name: name.to_string(),
            symbol: symbol.to_string(),
            total_units,
            member_units,
            flow_rate: I256::ZERO,
        });
        address
    }

    pub fn set_flow_rate(&self, pool: Address, flow_rate: I256) {
        let mut state = self.state.lock().unwrap();
        if let Some(found) = state.pools.iter_mut().find(|p| p.address == pool) {
            found.flow_rate = flow_rate;
        }
    }

    /// Allowance reads from the `n`th one on (zero based) fail.
    pub fn fail_allowance_reads_from(&self, n: usize) {
        self.state.lock().unwrap().failing_allowance_from = Some(n);
    }

    pub fn allowance_reads(&self) -> usize {
        self.allowance_reads.load(Ordering::SeqCst)
    }

    pub fn pool_count_reads(&self) -> usize {
        self.pool_count_reads.load(Ordering::SeqCst)
    }

    /// Mirrors the effect a mined call would have on chain.
    fn apply(&self, call: &WriteCall) {
        let mut state = self.state.lock().unwrap();
        match call {
            WriteCall::Approve { amount, .. } => state.allowance = *amount,
            WriteCall::CreatePool { name, symbol, .. } => {
                let address = Address::with_last_byte(0xa0 + state.pools.len() as u8);
                state.pools.push(MockPool {
                    address,
                    name: name.clone(),
                    symbol: symbol.clone(),
                    total_units: 0,
                    member_units: 0,
                    flow_rate: I256::ZERO,
                });
            }
            WriteCall::AirdropDistribution { amount, .. }
            | WriteCall::StreamDistribution { amount, .. } => {
                state.allowance = state.allowance.saturating_sub(*amount);
                state.balance = state.balance.saturating_sub(*amount);
            }
            WriteCall::IncreasePoolUnits { pool_id } => {
                if let Some(pool) = state.pools.get_mut(pool_id.to::<usize>()) {
                    pool.member_units += 1;
                    pool.total_units += 1;
                }
            }
            WriteCall::DecreasePoolUnits { pool_id } => {
                if let Some(pool) = state.pools.get_mut(pool_id.to::<usize>()) {
                    pool.member_units = pool.member_units.saturating_sub(1);
                    pool.total_units = pool.total_units.saturating_sub(1);
                }
            }
        }
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn pool_count(&self) -> Result<U256> {
        self.pool_count_reads.fetch_add(1, Ordering::SeqCst);
        Ok(U256::from(self.state.lock().unwrap().pools.len()))
    }

    async fn pool_address(&self, pool_id: U256) -> Result<Address> {
        let state = self.state.lock().unwrap();
        Ok(usize::try_from(pool_id)
            .ok()
            .and_then(|i| state.pools.get(i))
            .map(|p| p.address)
            .unwrap_or(Address::ZERO))
    }

    async fn pool_snapshot(&self, pool: Address, member: Option<Address>) -> Result<PoolSnapshot> {
        let state = self.state.lock().unwrap();
        let found = state
            .pools
            .iter()
            .find(|p| p.address == pool)
            .ok_or_else(|| FundingError::rpc(format!("no pool at {:?}", pool)))?;
        Ok(PoolSnapshot {
            address: found.address,
            name: found.name.clone(),
            symbol: found.symbol.clone(),
            admin: SPENDER,
            super_token: TOKEN,
            total_units: found.total_units,
            member_units: member.map(|_| found.member_units).unwrap_or(0),
            total_flow_rate: found.flow_rate,
        })
    }

    async fn super_token(&self) -> Result<Address> {
        Ok(TOKEN)
    }

    async fn token(&self, _token: Address) -> Result<Token> {
        Ok(self.token.clone())
    }

    async fn allowance(&self, _token: Address, _owner: Address, _spender: Address) -> Result<U256> {
        let read = self.allowance_reads.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        if state.failing_allowance_from.is_some_and(|n| read >= n) {
            return Err(FundingError::rpc("allowance read timed out"));
        }
        Ok(state.allowance)
    }

    async fn balance_of(&self, _token: Address, _owner: Address) -> Result<U256> {
        Ok(self.state.lock().unwrap().balance)
    }
}

/// Wallet double. Mined calls are applied to the linked chain.
pub struct MockWallet {
    account: Option<Address>,
    chain: Option<Arc<MockChainReader>>,
    sent: Mutex<Vec<WriteCall>>,
    send_failures: Mutex<VecDeque<TxFailure>>,
    reverts: Mutex<VecDeque<bool>>,
    pending: Mutex<HashMap<TxHash, WriteCall>>,
    gate: Mutex<Option<Arc<Notify>>>,
    nonce: AtomicU64,
}

impl MockWallet {
    pub fn connected() -> Self {
        Self::new(Some(OWNER), None)
    }

    pub fn disconnected() -> Self {
        Self::new(None, None)
    }

    pub fn linked(chain: Arc<MockChainReader>) -> Self {
        Self::new(Some(OWNER), Some(chain))
    }

    fn new(account: Option<Address>, chain: Option<Arc<MockChainReader>>) -> Self {
        Self {
            account,
            chain,
            sent: Mutex::new(Vec::new()),
            send_failures: Mutex::new(VecDeque::new()),
            reverts: Mutex::new(VecDeque::new()),
            pending: Mutex::new(HashMap::new()),
            gate: Mutex::new(None),
            nonce: AtomicU64::new(1),
        }
    }

    /// The next signature request is declined.
    pub fn reject_next(&self, message: &str) {
        self.send_failures
            .lock()
            .unwrap()
            .push_back(TxFailure::Rejected(message.to_string()));
    }

    /// The next mined transaction has a failed status.
    pub fn revert_next_receipt(&self) {
        self.reverts.lock().unwrap().push_back(true);
    }

    /// Receipts are withheld until the returned handle is notified.
    pub fn hold_receipts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Every call handed to the wallet, including declined ones.
    pub fn sent_calls(&self) -> Vec<WriteCall> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Wallet for MockWallet {
    fn account(&self) -> Option<Address> {
        self.account
    }

    async fn sign_and_send(&self, call: WriteCall) -> std::result::Result<TxHash, TxFailure> {
        self.sent.lock().unwrap().push(call.clone());
        if let Some(failure) = self.send_failures.lock().unwrap().pop_front() {
            return Err(failure);
        }
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let hash = B256::from(U256::from(nonce));
        self.pending.lock().unwrap().insert(hash, call);
        Ok(hash)
    }

    async fn wait_for_receipt(&self, hash: TxHash) -> std::result::Result<TxReceiptInfo, TxFailure> {
        let gate = self.gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let reverted = self.reverts.lock().unwrap().pop_front().unwrap_or(false);
        let call = self.pending.lock().unwrap().remove(&hash);
        if !reverted {
            if let (Some(chain), Some(call)) = (&self.chain, &call) {
                chain.apply(call);
            }
        }
        Ok(TxReceiptInfo {
            hash,
            success: !reverted,
            block_number: Some(100 + hash.as_slice()[31] as u64),
            gas_used: 50_000,
        })
    }
}

/// Notifier double that keeps everything it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notifications(&self) -> Vec<Notification> {
        self.received.lock().unwrap().clone()
    }

    pub fn levels(&self) -> Vec<NotificationLevel> {
        self.notifications().iter().map(|n| n.level).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: Notification) {
        self.received.lock().unwrap().push(notification);
    }
}

/// Wallet, chain and notifier wired together.
pub struct TestContext {
    pub wallet: Arc<MockWallet>,
    pub reader: Arc<MockChainReader>,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestContext {
    pub fn observer(&self) -> TxObserver {
        TxObserver::new(self.wallet.clone(), self.notifier.clone())
    }

    pub fn tracker(&self) -> AllowanceTracker {
        AllowanceTracker::new(self.reader.clone(), TOKEN, Some(OWNER), SPENDER)
    }

    pub fn pool_service(&self) -> PoolService {
        PoolService::new(self.reader.clone(), Some(OWNER))
    }
}

pub fn test_context() -> TestContext {
    let reader = Arc::new(MockChainReader::new());
    TestContext {
        wallet: Arc::new(MockWallet::linked(reader.clone())),
        reader,
        notifier: Arc::new(RecordingNotifier::default()),
    }
}
