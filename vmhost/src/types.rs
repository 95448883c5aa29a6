//! Invocation inputs and outputs exchanged with the ledger

use crate::error::{HostError, Result};
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Length of an account address in bytes
pub const ADDRESS_LEN: usize = 32;

/// Account address
pub type Address = [u8; ADDRESS_LEN];

/// Convert raw bytes coming from a contract into an address
pub fn address_from_slice(bytes: &[u8]) -> Result<Address> {
    Address::try_from(bytes).map_err(|_| HostError::InvalidAddressLength(bytes.len()))
}

/// How a frame was entered
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallType {
    /// Ordinary call issued by a transaction or a synchronous parent
    #[default]
    DirectCall,
    /// Destination side of an async call
    AsynchronousCall,
    /// Callback following an async call
    AsynchronousCallBack,
    /// Call triggered by a token transfer built-in function
    EsdtTransferAndExecute,
}

/// Fields shared by create and call inputs
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmInput {
    /// Sender of the call
    pub caller: Address,
    /// Function arguments
    pub arguments: Vec<Vec<u8>>,
    /// Value transferred with the call
    pub call_value: BigInt,
    /// Entry kind
    pub call_type: CallType,
    /// Gas price paid by the transaction
    pub gas_price: u64,
    /// Gas available to the frame
    pub gas_provided: u64,
    /// Gas reserved for a pending callback
    pub gas_locked: u64,
}

/// Request to deploy a new contract
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCreateInput {
    /// Common input fields
    pub vm_input: VmInput,
    /// Bytecode to deploy
    pub contract_code: Vec<u8>,
    /// Payable/upgradeable/readable flags
    pub code_metadata: CodeMetadata,
}

/// Request to call a function of an existing contract
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCallInput {
    /// Common input fields
    pub vm_input: VmInput,
    /// Contract being called
    pub recipient: Address,
    /// Function name
    pub function: String,
}

/// Flags stored next to the contract code
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeMetadata {
    /// Accepts value transfers
    pub payable: bool,
    /// Code may be replaced by the owner
    pub upgradeable: bool,
    /// Storage may be read by other contracts
    pub readable: bool,
}

impl CodeMetadata {
    const UPGRADEABLE: u8 = 1;
    const READABLE: u8 = 4;
    const PAYABLE: u8 = 2;

    /// Two-byte wire form
    pub fn to_bytes(self) -> [u8; 2] {
        let mut bytes = [0u8; 2];
        if self.upgradeable {
            bytes[0] |= Self::UPGRADEABLE;
        }
        if self.readable {
            bytes[0] |= Self::READABLE;
        }
        if self.payable {
            bytes[1] |= Self::PAYABLE;
        }
        bytes
    }

    /// Parse the two-byte wire form; missing bytes read as zero
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let first = bytes.first().copied().unwrap_or(0);
        let second = bytes.get(1).copied().unwrap_or(0);
        Self {
            upgradeable: first & Self::UPGRADEABLE != 0,
            readable: first & Self::READABLE != 0,
            payable: second & Self::PAYABLE != 0,
        }
    }
}

/// Outcome category of an invocation
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnCode {
    /// Success
    #[default]
    Ok,
    /// Requested function does not exist
    FunctionNotFound,
    /// Arguments do not match the function
    FunctionWrongSignature,
    /// Recipient is not a contract
    ContractNotFound,
    /// Contract rejected the call
    UserError,
    /// Gas exhausted
    OutOfGas,
    /// Deploy address already holds a contract
    AccountCollision,
    /// Insufficient balance for a transfer
    OutOfFunds,
    /// Call depth or instance ceiling exceeded
    CallStackOverFlow,
    /// Code cannot be instantiated
    ContractInvalid,
    /// Execution failed
    ExecutionFailed,
    /// Upgrade rejected
    UpgradeFailed,
}

impl ReturnCode {
    /// Numeric form, as passed to callbacks
    pub fn as_u64(self) -> u64 {
        self as u64
    }
}

impl std::fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            ReturnCode::Ok => "ok",
            ReturnCode::FunctionNotFound => "function not found",
            ReturnCode::FunctionWrongSignature => "wrong signature for function",
            ReturnCode::ContractNotFound => "contract not found",
            ReturnCode::UserError => "user error",
            ReturnCode::OutOfGas => "out of gas",
            ReturnCode::AccountCollision => "account collision",
            ReturnCode::OutOfFunds => "out of funds",
            ReturnCode::CallStackOverFlow => "call stack overflow",
            ReturnCode::ContractInvalid => "contract invalid",
            ReturnCode::ExecutionFailed => "execution failed",
            ReturnCode::UpgradeFailed => "upgrade failed",
        };
        f.write_str(text)
    }
}

/// Event emitted by a contract
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Event identifier
    pub identifier: Vec<u8>,
    /// Emitting contract
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<Vec<u8>>,
    /// Payload
    pub data: Vec<u8>,
}

/// One storage write recorded for an account
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageUpdate {
    /// Storage key
    pub offset: Vec<u8>,
    /// New value, empty for a deletion
    pub data: Vec<u8>,
}

/// Value and data leaving an account towards another shard or account
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTransfer {
    /// Transferred value
    pub value: BigInt,
    /// Gas forwarded with the transfer
    pub gas_limit: u64,
    /// Gas reserved for the callback
    pub gas_locked: u64,
    /// Call data
    pub data: Vec<u8>,
    /// How the destination will be entered
    pub call_type: CallType,
    /// Sender of the transfer
    pub sender: Address,
}

/// Accumulated state delta of one account
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputAccount {
    /// Account address
    pub address: Address,
    /// Nonce after the invocation, when it changed
    pub nonce: Option<u64>,
    /// Net balance change
    pub balance_delta: BigInt,
    /// Storage writes keyed by storage key
    pub storage_updates: BTreeMap<Vec<u8>, StorageUpdate>,
    /// Newly deployed or upgraded code
    pub code: Option<Vec<u8>>,
    /// Metadata for `code`
    pub code_metadata: Option<CodeMetadata>,
    /// Deployer of `code`
    pub code_deployer: Option<Address>,
    /// Transfers to be delivered after the invocation
    pub output_transfers: Vec<OutputTransfer>,
    /// Gas consumed by this account's own frames
    pub gas_used: u64,
}

impl OutputAccount {
    /// Empty delta for `address`
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Self::default()
        }
    }
}

/// Result of an invocation, as seen by the ledger
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmOutput {
    /// Data returned through `finish`
    pub return_data: Vec<Vec<u8>>,
    /// Outcome category
    pub return_code: ReturnCode,
    /// Human-readable outcome
    pub return_message: String,
    /// Unspent gas
    pub gas_remaining: u64,
    /// Per-account deltas
    pub output_accounts: BTreeMap<Address, OutputAccount>,
    /// Ordered events
    pub logs: Vec<LogEntry>,
}
