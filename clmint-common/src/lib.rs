#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod models;
pub mod retry;
pub mod traits;

pub use alloy_primitives::{Address, Bytes, TxHash, U256};
