use super::Token;
use alloy::primitives::Address;
use log::debug;
use std::collections::HashMap;

/// Session cache of token metadata keyed by token address.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: HashMap<Address, Token>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    pub fn add_token(&mut self, token: Token) {
        debug!("Caching token {}", token);
        self.tokens.insert(token.address, token);
    }

    pub fn get_token(&self, address: Address) -> Option<&Token> {
        self.tokens.get(&address)
    }

}
