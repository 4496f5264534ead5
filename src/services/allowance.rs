use alloy::primitives::{Address, U256};
use log::debug;
use std::sync::Arc;

use crate::errors::{FundingError, InputField, Result};
use crate::models::token::{to_human_amount, to_raw_amount};
use crate::providers::ChainReader;

/// Last known allowance and balance of the connected account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowanceState {
    pub allowance: U256,
    pub balance: U256,
    pub decimals: u8,
    pub symbol: String,
}

/// Tracks how much of the distribution token the spender may pull.
///
/// Values are only as fresh as the last [`refetch`](Self::refetch); callers
/// refetch after a confirmed approval or funding transaction.
pub struct AllowanceTracker {
    reader: Arc<dyn ChainReader>,
    token: Address,
    owner: Option<Address>,
    spender: Address,
    state: Option<AllowanceState>,
}

impl AllowanceTracker {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        token: Address,
        owner: Option<Address>,
        spender: Address,
    ) -> Self {
        Self {
            reader,
            token,
            owner,
            spender,
            state: None,
        }
    }

    pub fn token(&self) -> Address {
        self.token
    }

    pub fn spender(&self) -> Address {
        self.spender
    }

    pub async fn refetch(&mut self) -> Result<&AllowanceState> {
        let owner = self.owner.ok_or(FundingError::WalletNotConnected)?;
        let (allowance, balance, token) = futures::try_join!(
            self.reader.allowance(self.token, owner, self.spender),
            self.reader.balance_of(self.token, owner),
            self.reader.token(self.token),
        )?;
        debug!(
            "Allowance of {:?} for {:?}: {} (balance {})",
            owner, self.spender, allowance, balance
        );

        Ok(self.state.insert(AllowanceState {
            allowance,
            balance,
            decimals: token.decimals,
            symbol: token.symbol,
        }))
    }

    /// Drops the cached values so the next check reports them as unknown.
    pub fn invalidate(&mut self) {
        self.state = None;
    }

    pub fn state(&self) -> Option<&AllowanceState> {
        self.state.as_ref()
    }

    pub fn decimals(&self) -> Option<u8> {
        self.state.as_ref().map(|s| s.decimals)
    }

    /// Whether the loaded allowance covers `raw`. Unknown counts as no.
    pub fn covers(&self, raw: U256) -> bool {
        self.state.as_ref().is_some_and(|s| s.allowance >= raw)
    }

    /// `false` when the allowance is unknown or `amount` does not parse.
    pub fn has_sufficient_allowance(&self, amount: &str) -> bool {
        self.parse_loaded(amount)
            .is_some_and(|(raw, state)| state.allowance >= raw)
    }

    pub fn has_sufficient_balance(&self, amount: &str) -> bool {
        self.parse_loaded(amount)
            .is_some_and(|(raw, _)| self.balance_covers(raw))
    }

    /// Whether the loaded balance covers `raw`. Unknown counts as no.
    pub fn balance_covers(&self, raw: U256) -> bool {
        self.state.as_ref().is_some_and(|s| s.balance >= raw)
    }

    /// `amount` in smallest units, using the token's decimals.
    pub fn required_amount(&self, amount: &str) -> Result<U256> {
        let decimals = self.decimals().ok_or(FundingError::AllowanceNotLoaded)?;
        to_raw_amount(InputField::Amount, amount, decimals)
    }

    /// Balance as `<int>.<6 digits> <SYMBOL>`.
    pub fn formatted_balance(&self) -> Option<String> {
        self.state
            .as_ref()
            .map(|s| format_fixed(s.balance, s.decimals, &s.symbol))
    }

    pub fn formatted_allowance(&self) -> Option<String> {
        self.state
            .as_ref()
            .map(|s| format_fixed(s.allowance, s.decimals, &s.symbol))
    }

    /// Fails with `ApprovalRequired` unless the allowance covers `raw`.
    pub fn check(&self, raw: U256) -> Result<()> {
        let state = self.state.as_ref().ok_or(FundingError::AllowanceNotLoaded)?;
        if state.allowance >= raw {
            return Ok(());
        }
        Err(FundingError::ApprovalRequired {
            required: format!("{} {}", to_human_amount(raw, state.decimals), state.symbol),
            allowance: format!(
                "{} {}",
                to_human_amount(state.allowance, state.decimals),
                state.symbol
            ),
        })
    }

    fn parse_loaded(&self, amount: &str) -> Option<(U256, &AllowanceState)> {
        let state = self.state.as_ref()?;
        let raw = to_raw_amount(InputField::Amount, amount, state.decimals).ok()?;
        Some((raw, state))
    }
}

fn format_fixed(raw: U256, decimals: u8, symbol: &str) -> String {
    let scale = U256::from(10u64).pow(U256::from(decimals));
    let whole = raw / scale;
    let fraction = raw % scale;
    // six digits, truncated
    let fraction = if decimals >= 6 {
        fraction / U256::from(10u64).pow(U256::from(decimals - 6))
    } else {
        fraction * U256::from(10u64).pow(U256::from(6 - decimals))
    };
    format!("{}.{:0>6} {}", whole, fraction.to_string(), symbol)
}
