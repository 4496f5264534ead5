mod registry;

pub use registry::TokenRegistry;

use alloy::primitives::utils::{format_units, parse_units};
use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{FundingError, InputField, Result};

/// ERC20 metadata for the distribution token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Token {
    pub fn new(address: Address, name: String, symbol: String, decimals: u8) -> Self {
        Self {
            address,
            name,
            symbol,
            decimals,
        }
    }

    pub fn to_raw_amount(&self, field: InputField, amount: &str) -> Result<U256> {
        to_raw_amount(field, amount, self.decimals)
    }

    pub fn to_human_amount(&self, amount: U256) -> String {
        to_human_amount(amount, self.decimals)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) {:?} decimals={}",
            self.symbol, self.name, self.address, self.decimals
        )
    }
}

/// Converts a whole-token decimal string into smallest units.
///
/// Fractional digits beyond `decimals` are truncated. Empty, negative, zero
/// and non-numeric inputs are rejected with a message for `field`.
pub fn to_raw_amount(field: InputField, amount: &str, decimals: u8) -> Result<U256> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(FundingError::validation(field, "is required"));
    }
    if amount.starts_with('-') {
        return Err(FundingError::validation(field, "must be a positive number"));
    }

    let raw = parse_units(amount, decimals)
        .map_err(|_| FundingError::validation(field, "must be a positive number"))?
        .get_absolute();

    if raw.is_zero() {
        return Err(FundingError::validation(field, "must be a positive number"));
    }
    Ok(raw)
}

/// Formats smallest units as a whole-token decimal string without trailing zeros.
pub fn to_human_amount(amount: U256, decimals: u8) -> String {
    match format_units(amount, decimals) {
        Ok(formatted) => trim_decimal(&formatted),
        Err(_) => amount.to_string(),
    }
}

fn trim_decimal(value: &str) -> String {
    if !value.contains('.') {
        return value.to_string();
    }
    value.trim_end_matches('0').trim_end_matches('.').to_string()
}
