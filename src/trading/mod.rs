//! Trading module - balance lookup, transaction submission, and the
//! randomized trading loop

pub mod balance;
pub mod driver;
pub mod submitter;

pub use driver::{TradeDirection, Trader};
pub use submitter::{sign_swap_transaction, Submitter};
