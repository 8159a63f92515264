//! Chain-facing types and collaborator interfaces.
//!
//! - `types`: account names, symbols and assets
//! - `traits`: ledger, identity, scheduler and clock interfaces
//! - `mock`: in-memory collaborators used by the CLI and tests
//! - `client`: HTTP client for live balances

mod client;
pub mod mock;
mod traits;
mod types;

pub use client::ChainRpcClient;
pub use mock::{snapshot_ledger, DeferredQueue, InMemoryLedger, ManualClock, SystemClock};
pub use traits::*;
pub use types::{AccountName, Asset, Symbol};
