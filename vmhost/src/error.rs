//! Error types for the VM host

use crate::engine::EngineFault;
use crate::hook::HookError;
use crate::types::ReturnCode;
use thiserror::Error;

/// Result type for VM host operations
pub type Result<T> = std::result::Result<T, HostError>;

/// Errors that can occur while running a contract invocation
///
/// Every variant maps onto a [`ReturnCode`] through [`HostError::return_code`];
/// the façade turns them into a structured `VmOutput` instead of letting them
/// cross the public entry points.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// Generic execution failure (native fault without a breakpoint)
    #[error("execution failed")]
    ExecutionFailed,

    /// The contract explicitly failed its own execution
    #[error("{0}")]
    ContractFailed(String),

    /// The contract signaled a user error
    #[error("{0}")]
    SignalError(String),

    /// Gas exhausted
    #[error("not enough gas")]
    NotEnoughGas,

    /// The breakpoint field held a value the host does not know
    #[error("unhandled runtime breakpoint {0}")]
    UnhandledRuntimeBreakpoint(u64),

    /// Function missing from the loaded instance
    #[error("function not found: {0}")]
    FunctionNotFound(String),

    /// Recipient has no code
    #[error("contract not found")]
    ContractNotFound,

    /// Code could not be instantiated
    #[error("invalid contract code")]
    ContractInvalid,

    /// Deploy would overwrite an existing contract
    #[error("account collision")]
    AccountCollision,

    /// Sender balance too small for a value transfer
    #[error("not enough funds")]
    NotEnoughFunds,

    /// Upgrade rejected
    #[error("upgrade failed: {0}")]
    UpgradeFailed(String),

    /// `init` is reserved for deployment
    #[error("it is not allowed to call init in run")]
    InitFuncCalledInRun,

    /// `callBack` is reserved for async callbacks
    #[error("it is not allowed to call callBack in run")]
    CallBackFuncCalledInRun,

    /// Value sent to a contract whose metadata is not payable
    #[error("sending value to non payable contract")]
    AccountNotPayable,

    /// Write to a key under the protected prefix
    #[error("cannot write to storage under reserved key")]
    StoreReservedKey,

    /// Write attempted during a read-only execution
    #[error("cannot write on read only mode")]
    CannotWriteOnReadOnly,

    /// Storage of another account is not readable
    #[error("storage of address is not readable")]
    StorageNotReadable,

    /// Argument index outside the provided arguments
    #[error("argument index out of range")]
    ArgIndexOutOfRange,

    /// Address of the wrong size
    #[error("invalid address length {0}")]
    InvalidAddressLength(usize),

    /// Async call data is not `function@hexarg@...`
    #[error("invalid call data")]
    InvalidCallData,

    /// Every handle above the highest live register is taken
    #[error("no big integer handle left")]
    BigIntHandlesExhausted,

    /// Live instance ceiling exceeded
    #[error("max instances reached")]
    MaxInstancesReached,

    /// No instance loaded for the current frame
    #[error("no instance loaded")]
    NoInstance,

    /// A context was popped more times than pushed
    #[error("state stack underflow")]
    StateStackUnderflow,

    /// Context stacks diverged in depth
    #[error("state stacks out of lock-step: {0:?}")]
    StateStackMismatch([usize; 6]),

    /// Fault reported by the embedded execution engine
    #[error("engine fault: {0}")]
    Engine(EngineFault),

    /// Failure reported by the state provider
    #[error(transparent)]
    Hook(#[from] HookError),

    /// Construction-time configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Last-resort wrapper for faults caught at the public entry points
    #[error("{context}, fault: {message}")]
    Fallback {
        /// Entry point that caught the fault
        context: &'static str,
        /// Description of the fault
        message: String,
    },
}

impl HostError {
    /// Return code reported to the caller for this error
    pub fn return_code(&self) -> ReturnCode {
        match self {
            HostError::NotEnoughGas => ReturnCode::OutOfGas,
            HostError::SignalError(_)
            | HostError::InitFuncCalledInRun
            | HostError::CallBackFuncCalledInRun
            | HostError::AccountNotPayable => ReturnCode::UserError,
            HostError::FunctionNotFound(_) => ReturnCode::FunctionNotFound,
            HostError::ContractNotFound => ReturnCode::ContractNotFound,
            HostError::ContractInvalid => ReturnCode::ContractInvalid,
            HostError::AccountCollision => ReturnCode::AccountCollision,
            HostError::NotEnoughFunds => ReturnCode::OutOfFunds,
            HostError::UpgradeFailed(_) => ReturnCode::UpgradeFailed,
            _ => ReturnCode::ExecutionFailed,
        }
    }

    /// Whether the error aborts the whole invocation instead of one frame
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostError::UnhandledRuntimeBreakpoint(_)
                | HostError::StateStackUnderflow
                | HostError::StateStackMismatch(_)
        )
    }
}

/// Configuration errors, fatal at construction time
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A required gas schedule section is absent
    #[error("gas schedule section missing: {0}")]
    MissingSection(&'static str),

    /// A required gas schedule key is absent
    #[error("gas schedule key missing: {section}.{key}")]
    MissingCost {
        /// Section name
        section: &'static str,
        /// Cost key
        key: &'static str,
    },

    /// A mandatory dependency or parameter was not supplied
    #[error("invalid host parameter: {0}")]
    InvalidParameter(&'static str),
}
