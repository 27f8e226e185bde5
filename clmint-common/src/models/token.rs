use std::{collections::HashMap, str::FromStr};

use alloy_primitives::{
    utils::{parse_units, ParseUnits},
    Address, U256,
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

use super::error::RegistryError;

/// Decimal exponent applied to every token in scope.
pub const DEFAULT_DECIMALS: u8 = 18;

/// The fixed set of tokens the router is used with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumString,
    EnumIter,
    Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(ascii_case_insensitive)]
pub enum TokenSymbol {
    /// Wrapped native currency. Deposits on this leg are paid with attached native value.
    #[strum(to_string = "PHRS", serialize = "WPHRS")]
    Phrs,
    #[strum(to_string = "USDC")]
    Usdc,
    #[strum(to_string = "USDT")]
    Usdt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub symbol: TokenSymbol,
    pub address: Address,
    pub decimals: u8,
}

impl TokenDescriptor {
    pub fn new(symbol: TokenSymbol, address: Address) -> Self {
        Self { symbol, address, decimals: DEFAULT_DECIMALS }
    }

    /// Converts a human readable decimal amount, e.g. `"1.5"`, into base units.
    pub fn parse_amount(&self, amount: &str) -> Result<U256, RegistryError> {
        parse_amount(amount, self.decimals)
    }
}

/// Converts a decimal string into an integer amount scaled by `10^decimals`.
///
/// Negative amounts are rejected. So is input without digits or with more fractional digits
/// than `decimals`.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, RegistryError> {
    let invalid = |reason: String| RegistryError::InvalidAmount { amount: amount.to_string(), reason };
    let trimmed = amount.trim();
    if !trimmed.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid("amount has no digits".to_string()));
    }
    // `parse_units` truncates excess precision instead of failing.
    if let Some((_, fraction)) = trimmed.split_once('.') {
        if fraction.len() > usize::from(decimals) {
            return Err(invalid(format!("more than {decimals} fractional digits")));
        }
    }
    match parse_units(trimmed, decimals) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => Err(invalid("amount must not be negative".to_string())),
        Err(e) => Err(invalid(e.to_string())),
    }
}

/// Canonical addresses of the router and of every [`TokenSymbol`] on one chain.
///
/// Immutable once built, meant to be shared by reference across concurrent submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRegistry {
    router: Address,
    tokens: HashMap<TokenSymbol, TokenDescriptor>,
}

impl TokenRegistry {
    /// Builds a registry. Every symbol must be present and map to a distinct address.
    pub fn new(
        router: Address,
        tokens: impl IntoIterator<Item = (TokenSymbol, Address)>,
    ) -> Result<Self, RegistryError> {
        let tokens: HashMap<TokenSymbol, TokenDescriptor> = tokens
            .into_iter()
            .map(|(symbol, address)| (symbol, TokenDescriptor::new(symbol, address)))
            .collect();

        if let Some(missing) = TokenSymbol::iter().find(|symbol| !tokens.contains_key(symbol)) {
            return Err(RegistryError::MissingToken(missing));
        }

        let mut seen = HashMap::with_capacity(tokens.len());
        for descriptor in tokens.values() {
            if seen
                .insert(descriptor.address, descriptor.symbol)
                .is_some()
            {
                return Err(RegistryError::DuplicateAddress(descriptor.address));
            }
        }

        Ok(Self { router, tokens })
    }

    /// The router contract, used as spender for approvals and as target of the mint call.
    pub fn router(&self) -> Address {
        self.router
    }

    /// Resolves a user supplied symbol, case-insensitively.
    pub fn resolve(&self, symbol: &str) -> Result<&TokenDescriptor, RegistryError> {
        let parsed = TokenSymbol::from_str(symbol.trim())
            .map_err(|_| RegistryError::UnknownSymbol(symbol.to_string()))?;
        self.get(parsed)
    }

    pub fn get(&self, symbol: TokenSymbol) -> Result<&TokenDescriptor, RegistryError> {
        self.tokens
            .get(&symbol)
            .ok_or(RegistryError::MissingToken(symbol))
    }

    pub fn wrapped_native(&self) -> Address {
        // `new` guarantees every symbol is present.
        self.tokens[&TokenSymbol::Phrs].address
    }
}
