//! A local two-ledger network for the staking bridge: an L1 with the
//! custody bridge, an L2 with the staking rewards contract, and an
//! in-memory postman between them. Driven over JSON-RPC or directly.

pub mod chain;
pub mod config;
pub mod devnet;
pub mod node;
pub mod rpc;

pub use crate::config::DevnetConfig;
pub use crate::devnet::{Block, Devnet, DevnetState, FlushReport, PendingMessages, RelayReport};
pub use crate::node::{Node, SharedDevnet};
