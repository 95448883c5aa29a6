//! State provider boundary
//!
//! The ledger implements [`BlockchainHook`] to give the host read access to
//! world state. The host never writes through it: all changes leave the host
//! as `OutputAccount` deltas for the ledger to apply.

use crate::types::{Address, CodeMetadata};
use num_bigint::BigInt;
use thiserror::Error;

/// Failure reported by the state provider
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HookError {
    /// Provider cannot serve the request
    #[error("blockchain hook: {0}")]
    Unavailable(String),

    /// Provider cannot derive a new address
    #[error("cannot generate new address: {0}")]
    NewAddress(String),
}

/// Account as stored by the ledger
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Account {
    /// Address
    pub address: Address,
    /// Current nonce
    pub nonce: u64,
    /// Current balance
    pub balance: BigInt,
    /// Deployed code, empty for user accounts
    pub code: Vec<u8>,
    /// Flags of `code`
    pub code_metadata: CodeMetadata,
    /// Owner allowed to upgrade `code`
    pub owner: Address,
}

impl Account {
    /// Whether the account holds code
    pub fn is_smart_contract(&self) -> bool {
        !self.code.is_empty()
    }
}

/// Read access to world state
///
/// # Example Implementation
///
/// ```rust,ignore
/// use vmhost::hook::{Account, BlockchainHook, HookError};
///
/// struct LedgerState { /* handle to the ledger */ }
///
/// impl BlockchainHook for LedgerState {
///     fn get_user_account(&self, address: &Address) -> Result<Option<Account>, HookError> {
///         // Read the account trie
///         todo!()
///     }
///     // ...
/// }
/// ```
pub trait BlockchainHook: Send + Sync {
    /// Look up an account
    ///
    /// # Returns
    /// * `Some(account)` if the address is known
    /// * `None` otherwise
    fn get_user_account(&self, address: &Address) -> Result<Option<Account>, HookError>;

    /// Read one storage value of `address`; empty when absent
    fn get_storage_data(&self, address: &Address, key: &[u8]) -> Result<Vec<u8>, HookError>;

    /// Derive the address of a contract deployed by `creator` at `creator_nonce`
    fn new_address(
        &self,
        creator: &Address,
        creator_nonce: u64,
        vm_type: &[u8],
    ) -> Result<Address, HookError>;

    /// Shard that owns `address`
    fn get_shard_of_address(&self, address: &Address) -> u32;

    /// Drop any compiled code the provider caches
    fn clear_compiled_codes(&self);

    /// Current block nonce
    fn current_nonce(&self) -> u64;

    /// Current block round
    fn current_round(&self) -> u64;

    /// Current epoch
    fn current_epoch(&self) -> u32;

    /// Current block timestamp
    fn current_timestamp(&self) -> u64;

    /// Snapshot identifier of provider-side caches
    fn get_snapshot(&self) -> u64 {
        0
    }

    /// Roll provider-side caches back to `snapshot`
    fn revert_to_snapshot(&self, _snapshot: u64) -> Result<(), HookError> {
        Ok(())
    }
}

/// Provider with no accounts, for tests and benchmarking
pub struct NoOpBlockchainHook;

impl BlockchainHook for NoOpBlockchainHook {
    fn get_user_account(&self, _address: &Address) -> Result<Option<Account>, HookError> {
        Ok(None)
    }

    fn get_storage_data(&self, _address: &Address, _key: &[u8]) -> Result<Vec<u8>, HookError> {
        Ok(Vec::new())
    }

    fn new_address(
        &self,
        _creator: &Address,
        _creator_nonce: u64,
        _vm_type: &[u8],
    ) -> Result<Address, HookError> {
        Err(HookError::NewAddress("no-op provider".into()))
    }

    fn get_shard_of_address(&self, _address: &Address) -> u32 {
        0
    }

    fn clear_compiled_codes(&self) {}

    fn current_nonce(&self) -> u64 {
        0
    }

    fn current_round(&self) -> u64 {
        0
    }

    fn current_epoch(&self) -> u32 {
        0
    }

    fn current_timestamp(&self) -> u64 {
        0
    }
}
