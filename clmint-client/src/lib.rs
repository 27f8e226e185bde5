#[cfg(test)]
#[macro_use]
extern crate pretty_assertions;

pub mod approval;
pub mod cli;
pub mod config;
pub mod confirmation;
pub mod errors;
pub mod provisioner;

pub use approval::ApprovalManager;
pub use confirmation::ConfirmationTracker;
pub use errors::ProvisionError;
pub use provisioner::LiquidityProvisioner;
