//! Scripted execution engine
//!
//! A [`ContractMock`] is a table of Rust closures standing in for exported
//! functions. [`MockExecutor`] maps code bytes to such tables, so deploying
//! `b"counter"` instantiates whatever was registered under that code. Each
//! call is charged the `Call` opcode cost before the closure runs, which
//! keeps opcode schedule changes observable.

use crate::config::OpcodeCosts;
use crate::engine::{EngineFault, Executor, FaultKind, Instance};
use crate::vmhooks::VmHooks;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Body of one exported function
pub type ContractMethod = Arc<dyn Fn(&mut dyn VmHooks) -> Result<(), EngineFault> + Send + Sync>;

const CALL_OPCODE: &str = "Call";

/// Exported functions of a scripted contract
#[derive(Clone, Default)]
pub struct ContractMock {
    methods: BTreeMap<String, ContractMethod>,
}

impl ContractMock {
    /// Contract without exports
    pub fn new() -> Self {
        Self::default()
    }

    /// Export `name`
    pub fn with_method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(&mut dyn VmHooks) -> Result<(), EngineFault> + Send + Sync + 'static,
    {
        self.methods.insert(name.to_string(), Arc::new(method));
        self
    }
}

struct MockInstance {
    code: Vec<u8>,
    contract: ContractMock,
    call_cost: u64,
    cleaned: bool,
}

impl Instance for MockInstance {
    fn has_function(&self, name: &str) -> bool {
        self.contract.methods.contains_key(name)
    }

    fn call(&mut self, name: &str, hooks: &mut dyn VmHooks) -> Result<(), EngineFault> {
        if self.cleaned {
            return Err(EngineFault::new(FaultKind::Trap, "instance already cleaned"));
        }
        let method = self
            .contract
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| EngineFault::new(FaultKind::FunctionNotFound, name))?;

        hooks.use_gas(self.call_cost)?;
        method(hooks)
    }

    fn code(&self) -> &[u8] {
        &self.code
    }

    fn clean(&mut self) {
        self.cleaned = true;
    }
}

/// Engine instantiating registered [`ContractMock`]s
#[derive(Default)]
pub struct MockExecutor {
    contracts: RwLock<BTreeMap<Vec<u8>, ContractMock>>,
    opcode_costs: RwLock<OpcodeCosts>,
    instances_created: AtomicU64,
}

impl MockExecutor {
    /// Engine with no registered code
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `code` instantiate `contract`
    pub fn register(&self, code: Vec<u8>, contract: ContractMock) {
        self.contracts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code, contract);
    }

    /// Number of instances built so far
    pub fn instances_created(&self) -> u64 {
        self.instances_created.load(Ordering::Relaxed)
    }

    /// Cost currently charged per call
    pub fn call_cost(&self) -> u64 {
        self.opcode_costs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(CALL_OPCODE)
            .copied()
            .unwrap_or_default()
    }
}

impl Executor for MockExecutor {
    fn new_instance(&self, code: &[u8]) -> Result<Box<dyn Instance>, EngineFault> {
        let contract = self
            .contracts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(code)
            .cloned()
            .ok_or_else(|| EngineFault::new(FaultKind::InvalidCode, "unknown code"))?;

        self.instances_created.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(MockInstance {
            code: code.to_vec(),
            contract,
            call_cost: self.call_cost(),
            cleaned: false,
        }))
    }

    fn set_opcode_costs(&self, costs: &OpcodeCosts) {
        *self.opcode_costs.write().unwrap_or_else(PoisonError::into_inner) = costs.clone();
    }
}
