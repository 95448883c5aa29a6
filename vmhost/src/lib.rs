//! VM Host
//!
//! Gas-metered execution host for smart contracts. The host sits between a
//! ledger and a bytecode engine: the ledger hands it an invocation, the host
//! runs the contract through the engine, exposes the host API to it, meters
//! every operation, and returns the account changes as a [`VmOutput`] for the
//! ledger to apply.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │                 Ledger                  │
//! │  (implements BlockchainHook, applies    │
//! │   VmOutput deltas)                      │
//! └────────────────┬────────────────────────┘
//!                  │ run_smart_contract_create / call
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │          VmHost (this crate)            │
//! │  ┌─────────────────────────────────┐    │
//! │  │  HostCore: six stacked contexts │    │
//! │  │  bigint blockchain metering     │    │
//! │  │  output runtime storage         │    │
//! │  └─────────────────────────────────┘    │
//! │  ┌─────────────────────────────────┐    │
//! │  │  vmhooks: host API for contracts│    │
//! │  └─────────────────────────────────┘    │
//! └────────────────┬────────────────────────┘
//!                  │ Executor / Instance
//!                  ▼
//! ┌─────────────────────────────────────────┐
//! │          Bytecode engine                │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use num_bigint::BigInt;
//! use vmhost::config::VmHostParameters;
//! use vmhost::hook::Account;
//! use vmhost::mock::{counter_contract, MockExecutor, MockWorld, COUNTER_CODE};
//! use vmhost::types::{ContractCreateInput, ReturnCode, VmInput};
//! use vmhost::{VmExecutionHandler, VmHost};
//!
//! let world = Arc::new(MockWorld::new());
//! world.add_account(Account {
//!     address: [1u8; 32],
//!     balance: BigInt::from(1_000),
//!     ..Account::default()
//! });
//! let executor = Arc::new(MockExecutor::new());
//! executor.register(COUNTER_CODE.to_vec(), counter_contract());
//!
//! let host = VmHost::new(world.clone(), executor, VmHostParameters::for_tests()).unwrap();
//! let output = host
//!     .run_smart_contract_create(&ContractCreateInput {
//!         vm_input: VmInput {
//!             caller: [1u8; 32],
//!             gas_provided: 100_000,
//!             ..VmInput::default()
//!         },
//!         contract_code: COUNTER_CODE.to_vec(),
//!         ..ContractCreateInput::default()
//!     })
//!     .unwrap();
//! assert_eq!(output.return_code, ReturnCode::Ok);
//! ```

#![warn(missing_docs)]
#![deny(clippy::arithmetic_side_effects)]

pub mod breakpoint;
pub mod config;
pub mod contexts;
pub mod engine;
pub mod error;
pub mod hook;
pub mod host;
pub mod mock;
pub mod types;
pub mod vmhooks;

// Re-export main types
pub use config::{GasScheduleMap, VmHostParameters};
pub use engine::{EngineFault, Executor, FaultKind, Instance};
pub use error::{ConfigError, HostError, Result};
pub use hook::{Account, BlockchainHook};
pub use host::{parse_call_data, VmExecutionHandler, VmHost};
pub use types::{
    Address, CallType, CodeMetadata, ContractCallInput, ContractCreateInput, ReturnCode, VmInput,
    VmOutput,
};
pub use vmhooks::VmHooks;
