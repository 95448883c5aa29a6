//! In-memory world and scripted engine
//!
//! Stand-ins for the ledger and the bytecode engine, used by the test suites
//! and by the demo runner.

mod contracts;
mod instance;
mod world;

pub use contracts::{counter_contract, COUNTER_CODE};
pub use instance::{ContractMethod, ContractMock, MockExecutor};
pub use world::{MockBlock, MockWorld};
