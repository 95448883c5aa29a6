//! Host parameters and gas schedule
//!
//! The gas schedule travels as a two-level map (`section -> key -> cost`) so
//! that the ledger can ship new schedules at epoch boundaries without a code
//! change. [`create_gas_config`] validates such a map into [`GasCost`], the
//! typed table used by the metering context.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Version reported by `get_version`
pub const VM_HOST_VERSION: &str = concat!("vmhost v", env!("CARGO_PKG_VERSION"));

/// Function run once on deployment
pub const INIT_FUNCTION_NAME: &str = "init";

/// Default callback name used by the legacy async call hook
pub const CALLBACK_FUNCTION_NAME: &str = "callBack";

/// Function name routed to the upgrade path
pub const UPGRADE_FUNCTION_NAME: &str = "upgradeContract";

/// Maximum number of live bytecode instances
pub const MAX_INSTANCE_COUNT: u64 = 10;

/// Raw gas schedule: section -> operation -> cost
pub type GasScheduleMap = BTreeMap<String, BTreeMap<String, u64>>;

/// Opcode cost table handed to the execution engine
pub type OpcodeCosts = BTreeMap<String, u64>;

/// Parameters supplied when building a host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmHostParameters {
    /// VM type tag mixed into new contract addresses
    pub vm_type: Vec<u8>,
    /// Upper bound for the gas of any single instance
    pub block_gas_limit: u64,
    /// Initial gas schedule
    pub gas_schedule: GasScheduleMap,
    /// Storage keys under this prefix are reserved for the host
    pub protected_key_prefix: Vec<u8>,
    /// Reuse the top-level instance across invocations
    pub use_warm_instance: bool,
    /// Live instance ceiling
    pub max_instance_count: u64,
    /// Echo contract logs through the `log` facade
    #[serde(default)]
    pub debug_mode: bool,
}

impl VmHostParameters {
    /// Parameters with the all-ones test schedule
    pub fn for_tests() -> Self {
        Self {
            vm_type: vec![5, 0],
            block_gas_limit: 10_000_000,
            gas_schedule: make_gas_map_for_tests(),
            protected_key_prefix: b"VMHOST".to_vec(),
            use_warm_instance: false,
            max_instance_count: MAX_INSTANCE_COUNT,
            debug_mode: false,
        }
    }

    /// Reject parameters the host cannot start with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vm_type.is_empty() {
            return Err(ConfigError::InvalidParameter("vm_type"));
        }
        if self.protected_key_prefix.is_empty() {
            return Err(ConfigError::InvalidParameter("protected_key_prefix"));
        }
        if self.max_instance_count == 0 {
            return Err(ConfigError::InvalidParameter("max_instance_count"));
        }
        create_gas_config(&self.gas_schedule)?;
        Ok(())
    }
}

/// Costs of basic data movement
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BaseOperationCost {
    /// Storing one new byte
    pub store_per_byte: u64,
    /// Copying one byte between host and contract
    pub data_copy_per_byte: u64,
    /// Refund per byte freed from storage
    pub release_per_byte: u64,
    /// Rewriting one existing byte
    pub persist_per_byte: u64,
    /// Compiling one byte of code at deployment
    pub compile_per_byte: u64,
    /// Preparing one byte of code for execution
    pub aot_prepare_per_byte: u64,
}

/// Costs of host API calls
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApiCost {
    pub get_sc_address: u64,
    pub get_owner_address: u64,
    pub get_shard_of_address: u64,
    pub is_smart_contract: u64,
    pub get_external_balance: u64,
    pub get_block_info: u64,
    pub get_caller: u64,
    pub get_call_value: u64,
    pub get_gas_left: u64,
    pub get_argument: u64,
    pub get_function: u64,
    pub get_num_arguments: u64,
    pub transfer_value: u64,
    pub storage_store: u64,
    pub storage_load: u64,
    pub signal_error: u64,
    pub finish: u64,
    pub log: u64,
    pub async_call_step: u64,
    pub async_callback_gas_lock: u64,
    pub create_async_call: u64,
    pub execute_on_dest_context: u64,
    pub create_contract: u64,
}

/// Costs of big-number register operations
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BigIntApiCost {
    pub big_int_new: u64,
    pub big_int_get_unsigned_bytes: u64,
    pub big_int_set_unsigned_bytes: u64,
    pub big_int_get_signed_bytes: u64,
    pub big_int_add: u64,
    pub big_int_sub: u64,
    pub big_int_mul: u64,
    pub big_int_cmp: u64,
    pub big_int_finish: u64,
    pub big_int_storage_load: u64,
    pub big_int_storage_store: u64,
    pub big_int_get_call_value: u64,
    pub big_int_get_external_balance: u64,
}

/// Typed gas schedule used for metering decisions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GasCost {
    /// Data movement
    pub base_operation_cost: BaseOperationCost,
    /// Host API calls
    pub api_cost: ApiCost,
    /// Big-number operations
    pub big_int_api_cost: BigIntApiCost,
    /// Instruction costs, forwarded to the engine untouched
    pub opcode_costs: OpcodeCosts,
}

const BASE_OPERATION_COST: &str = "BaseOperationCost";
const API_COST: &str = "ElrondAPICost";
const BIG_INT_API_COST: &str = "BigIntAPICost";
const OPCODE_COST: &str = "WASMOpcodeCost";

fn section<'a>(
    schedule: &'a GasScheduleMap,
    name: &'static str,
) -> Result<&'a BTreeMap<String, u64>, ConfigError> {
    schedule.get(name).ok_or(ConfigError::MissingSection(name))
}

fn cost(
    costs: &BTreeMap<String, u64>,
    section: &'static str,
    key: &'static str,
) -> Result<u64, ConfigError> {
    costs
        .get(key)
        .copied()
        .ok_or(ConfigError::MissingCost { section, key })
}

/// Validate a raw schedule into a typed cost table
pub fn create_gas_config(schedule: &GasScheduleMap) -> Result<GasCost, ConfigError> {
    let base = section(schedule, BASE_OPERATION_COST)?;
    let api = section(schedule, API_COST)?;
    let big = section(schedule, BIG_INT_API_COST)?;
    let opcodes = section(schedule, OPCODE_COST)?;

    let b = |key| cost(base, BASE_OPERATION_COST, key);
    let a = |key| cost(api, API_COST, key);
    let n = |key| cost(big, BIG_INT_API_COST, key);

    Ok(GasCost {
        base_operation_cost: BaseOperationCost {
            store_per_byte: b("StorePerByte")?,
            data_copy_per_byte: b("DataCopyPerByte")?,
            release_per_byte: b("ReleasePerByte")?,
            persist_per_byte: b("PersistPerByte")?,
            compile_per_byte: b("CompilePerByte")?,
            aot_prepare_per_byte: b("AoTPreparePerByte")?,
        },
        api_cost: ApiCost {
            get_sc_address: a("GetSCAddress")?,
            get_owner_address: a("GetOwnerAddress")?,
            get_shard_of_address: a("GetShardOfAddress")?,
            is_smart_contract: a("IsSmartContract")?,
            get_external_balance: a("GetExternalBalance")?,
            get_block_info: a("GetBlockInfo")?,
            get_caller: a("GetCaller")?,
            get_call_value: a("GetCallValue")?,
            get_gas_left: a("GetGasLeft")?,
            get_argument: a("GetArgument")?,
            get_function: a("GetFunction")?,
            get_num_arguments: a("GetNumArguments")?,
            transfer_value: a("TransferValue")?,
            storage_store: a("StorageStore")?,
            storage_load: a("StorageLoad")?,
            signal_error: a("SignalError")?,
            finish: a("Finish")?,
            log: a("Log")?,
            async_call_step: a("AsyncCallStep")?,
            async_callback_gas_lock: a("AsyncCallbackGasLock")?,
            create_async_call: a("CreateAsyncCall")?,
            execute_on_dest_context: a("ExecuteOnDestContext")?,
            create_contract: a("CreateContract")?,
        },
        big_int_api_cost: BigIntApiCost {
            big_int_new: n("BigIntNew")?,
            big_int_get_unsigned_bytes: n("BigIntGetUnsignedBytes")?,
            big_int_set_unsigned_bytes: n("BigIntSetUnsignedBytes")?,
            big_int_get_signed_bytes: n("BigIntGetSignedBytes")?,
            big_int_add: n("BigIntAdd")?,
            big_int_sub: n("BigIntSub")?,
            big_int_mul: n("BigIntMul")?,
            big_int_cmp: n("BigIntCmp")?,
            big_int_finish: n("BigIntFinishUnsigned")?,
            big_int_storage_load: n("BigIntStorageLoadUnsigned")?,
            big_int_storage_store: n("BigIntStorageStoreUnsigned")?,
            big_int_get_call_value: n("BigIntGetCallValue")?,
            big_int_get_external_balance: n("BigIntGetExternalBalance")?,
        },
        opcode_costs: opcodes.clone(),
    })
}

const BASE_OPERATION_KEYS: &[&str] = &[
    "StorePerByte",
    "DataCopyPerByte",
    "ReleasePerByte",
    "PersistPerByte",
    "CompilePerByte",
    "AoTPreparePerByte",
];

const API_KEYS: &[&str] = &[
    "GetSCAddress",
    "GetOwnerAddress",
    "GetShardOfAddress",
    "IsSmartContract",
    "GetExternalBalance",
    "GetBlockInfo",
    "GetCaller",
    "GetCallValue",
    "GetGasLeft",
    "GetArgument",
    "GetFunction",
    "GetNumArguments",
    "TransferValue",
    "StorageStore",
    "StorageLoad",
    "SignalError",
    "Finish",
    "Log",
    "AsyncCallStep",
    "AsyncCallbackGasLock",
    "CreateAsyncCall",
    "ExecuteOnDestContext",
    "CreateContract",
];

const BIG_INT_KEYS: &[&str] = &[
    "BigIntNew",
    "BigIntGetUnsignedBytes",
    "BigIntSetUnsignedBytes",
    "BigIntGetSignedBytes",
    "BigIntAdd",
    "BigIntSub",
    "BigIntMul",
    "BigIntCmp",
    "BigIntFinishUnsigned",
    "BigIntStorageLoadUnsigned",
    "BigIntStorageStoreUnsigned",
    "BigIntGetCallValue",
    "BigIntGetExternalBalance",
];

const OPCODE_KEYS: &[&str] = &["Call", "Unreachable", "MemoryGrow"];

fn fill(keys: &[&str], value: u64) -> BTreeMap<String, u64> {
    keys.iter().map(|key| (key.to_string(), value)).collect()
}

/// Schedule where every operation costs `value`
pub fn make_gas_map(value: u64) -> GasScheduleMap {
    let mut schedule = GasScheduleMap::new();
    schedule.insert(BASE_OPERATION_COST.to_string(), fill(BASE_OPERATION_KEYS, value));
    schedule.insert(API_COST.to_string(), fill(API_KEYS, value));
    schedule.insert(BIG_INT_API_COST.to_string(), fill(BIG_INT_KEYS, value));
    schedule.insert(OPCODE_COST.to_string(), fill(OPCODE_KEYS, value));
    schedule
}

/// All-ones schedule used throughout the tests
pub fn make_gas_map_for_tests() -> GasScheduleMap {
    make_gas_map(1)
}
