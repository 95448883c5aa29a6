//! Host API exposed to contracts
//!
//! The engine hands every running contract a `&mut dyn VmHooks`. The API is
//! split by concern, one trait per file, all implemented for the host core.
//!
//! # Conventions
//!
//! Every hook charges its cost from the active schedule before doing any
//! work. A hook that cannot complete records a breakpoint on the runtime
//! context and returns [`EngineFault::breakpoint`]; the engine must hand that
//! fault back unchanged so the host can read the breakpoint once the call
//! returns.
//!
//! ## Runtime
//! - `use_gas`, `get_gas_left`, `get_num_arguments`, `get_argument`,
//!   `get_function`, `get_caller`, `get_sc_address`, `get_call_value`
//!
//! ## Return data and outcome
//! - `finish`, `signal_error`, `fail_execution`, `get_num_return_data`,
//!   `get_return_data`
//!
//! ## Logging
//! - `write_log`
//!
//! ## Storage
//! - `storage_store`, `storage_load`, `storage_load_from_address`
//!
//! ## Balance
//! - `get_external_balance`, `transfer_value`
//!
//! ## Blockchain
//! - `get_owner_address`, `get_shard_of_address`, `is_smart_contract`,
//!   `get_block_nonce`, `get_block_round`, `get_block_epoch`,
//!   `get_block_timestamp`
//!
//! ## Big numbers
//! - `big_int_*`
//!
//! ## Async calls
//! - `async_call`, `create_async_call`
//!
//! ## Nested execution
//! - `execute_on_dest_context`, `create_contract`

pub mod async_call;
pub mod balance;
pub mod bigint;
pub mod blockchain;
pub mod contracts;
pub mod logging;
pub mod return_data;
pub mod runtime;
pub mod storage;

pub use async_call::AsyncCallHooks;
pub use balance::BalanceHooks;
pub use bigint::BigIntHooks;
pub use blockchain::BlockchainHooks;
pub use contracts::ContractHooks;
pub use logging::LoggingHooks;
pub use return_data::ReturnDataHooks;
pub use runtime::RuntimeHooks;
pub use storage::StorageHooks;

use crate::breakpoint::BreakpointValue;
use crate::engine::EngineFault;
use crate::error::HostError;
use crate::host::HostCore;

/// Result of a hook as seen by the engine
pub type HookResult<T> = std::result::Result<T, EngineFault>;

/// Full host API
pub trait VmHooks:
    RuntimeHooks
    + ReturnDataHooks
    + LoggingHooks
    + StorageHooks
    + BalanceHooks
    + BlockchainHooks
    + BigIntHooks
    + AsyncCallHooks
    + ContractHooks
{
}

impl<T> VmHooks for T where
    T: RuntimeHooks
        + ReturnDataHooks
        + LoggingHooks
        + StorageHooks
        + BalanceHooks
        + BlockchainHooks
        + BigIntHooks
        + AsyncCallHooks
        + ContractHooks
{
}

impl HostCore {
    /// Turn a host error into the breakpoint the engine reports back
    pub(crate) fn breakpoint_from(&mut self, err: HostError) -> EngineFault {
        let value = match err {
            HostError::NotEnoughGas => BreakpointValue::OutOfGas,
            HostError::SignalError(message) => {
                self.output.set_return_message(message);
                BreakpointValue::SignalError
            }
            err if err.is_fatal() => {
                self.fatal = Some(err);
                BreakpointValue::ExecutionFailed
            }
            err => {
                self.output.set_return_message(err.to_string());
                BreakpointValue::ExecutionFailed
            }
        };
        self.runtime.set_runtime_breakpoint(value);
        EngineFault::breakpoint()
    }

    /// Charge `cost`; exhaustion becomes the out-of-gas breakpoint
    pub(crate) fn charge(&mut self, cost: u64) -> HookResult<()> {
        self.metering
            .use_gas(cost)
            .map_err(|err| self.breakpoint_from(err))
    }

    /// Charge `base` plus `per_byte` for each of `len` bytes
    pub(crate) fn charge_with_data(&mut self, base: u64, per_byte: u64, len: usize) -> HookResult<()> {
        let cost = base.saturating_add(per_byte.saturating_mul(len as u64));
        self.charge(cost)
    }
}
