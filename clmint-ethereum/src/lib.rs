#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod erc20;
pub mod position_manager;
pub mod rpc;

pub use rpc::EthereumGateway;
