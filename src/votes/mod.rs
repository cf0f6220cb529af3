//! Per-file vote ledger and its backing stores.

pub mod ledger;
pub mod store;

pub use ledger::{VoteDirection, VoteLedger, VoteOp, VoteRecord};
pub use store::{MemoryVoteStore, SledVoteStore, VoteStore};
