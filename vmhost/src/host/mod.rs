//! Host engine
//!
//! [`VmHost`] is the entry point used by the ledger. It serializes
//! invocations behind an execution gate and a core mutex, runs them on the
//! [`HostCore`], and always answers with a structured [`VmOutput`].
//!
//! ```text
//! VmHost
//!   ├─ gate: RwLock<()>      (read: create/call, write: schedule change)
//!   └─ core: Mutex<HostCore>
//!        ├─ bigint      ┐
//!        ├─ blockchain  │ pushed in this order,
//!        ├─ metering    │ popped in reverse
//!        ├─ output      │
//!        ├─ runtime     │
//!        └─ storage     ┘
//! ```

mod async_call;
mod breakpoints;
mod execution;

pub use async_call::parse_call_data;
pub(crate) use execution::FrameOutcome;

use crate::config::{GasScheduleMap, VmHostParameters, VM_HOST_VERSION};
use crate::contexts::{
    BigIntContext, BlockchainContext, MeteringContext, OutputContext, RuntimeContext, StateStack,
    StorageContext,
};
use crate::engine::Executor;
use crate::error::{HostError, Result};
use crate::hook::BlockchainHook;
use crate::types::{Address, ContractCallInput, ContractCreateInput, VmOutput};
use log::{debug, error, info};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Invocation API consumed by the ledger
///
/// Implemented by the in-process [`VmHost`] and by the out-of-process driver.
pub trait VmExecutionHandler {
    /// Error returned when no structured output can be produced
    type Error: std::error::Error;

    /// Version string of the host
    fn get_version(&self) -> std::result::Result<String, Self::Error>;

    /// Replace the gas schedule used by later invocations
    fn gas_schedule_change(&self, schedule: &GasScheduleMap) -> std::result::Result<(), Self::Error>;

    /// Deploy a contract
    fn run_smart_contract_create(
        &self,
        input: &ContractCreateInput,
    ) -> std::result::Result<VmOutput, Self::Error>;

    /// Call a contract function
    fn run_smart_contract_call(
        &self,
        input: &ContractCallInput,
    ) -> std::result::Result<VmOutput, Self::Error>;
}

/// State shared by every frame of an invocation
pub struct HostCore {
    pub(crate) bigint: BigIntContext,
    pub(crate) blockchain: BlockchainContext,
    pub(crate) metering: MeteringContext,
    pub(crate) output: OutputContext,
    pub(crate) runtime: RuntimeContext,
    pub(crate) storage: StorageContext,
    pub(crate) executor: Arc<dyn Executor>,
    pub(crate) use_warm_instance: bool,
    pub(crate) debug_mode: bool,
    /// Error that must abort the whole invocation, raised inside a hook
    pub(crate) fatal: Option<HostError>,
}

impl HostCore {
    /// Build the six contexts from validated parameters
    pub(crate) fn new(
        hook: Arc<dyn BlockchainHook>,
        executor: Arc<dyn Executor>,
        params: &VmHostParameters,
    ) -> Result<Self> {
        let metering = MeteringContext::new(&params.gas_schedule, params.block_gas_limit)?;
        executor.set_opcode_costs(&metering.gas_cost().opcode_costs);

        Ok(Self {
            bigint: BigIntContext::new(),
            blockchain: BlockchainContext::new(Arc::clone(&hook), params.vm_type.clone()),
            metering,
            output: OutputContext::new(),
            runtime: RuntimeContext::new(params.max_instance_count),
            storage: StorageContext::new(hook, params.protected_key_prefix.clone()),
            executor,
            use_warm_instance: params.use_warm_instance,
            debug_mode: params.debug_mode,
            fatal: None,
        })
    }

    /// Reset every context for a new top-level invocation
    pub(crate) fn init_state(&mut self) {
        self.clear_state_stacks();
        self.bigint.init_state();
        self.blockchain.init_state();
        self.metering.init_state();
        self.output.init_state();
        self.runtime.init_state();
        self.storage.init_state();
        self.fatal = None;
    }

    /// Save every context for a child frame
    pub(crate) fn push_state(&mut self) {
        self.bigint.push_state();
        self.blockchain.push_state();
        self.metering.push_state();
        self.output.push_state();
        self.runtime.push_state();
        self.storage.push_state();
        debug!("frame pushed, depth {}", self.bigint.state_stack_depth());
    }

    /// Leave a child frame
    ///
    /// With `commit` the child's output and provider changes are kept;
    /// otherwise every context returns to its state before the push.
    ///
    /// # Returns
    /// Gas the child did not spend when committing, zero otherwise
    pub(crate) fn pop_frame(&mut self, commit: bool) -> Result<u64> {
        let child_gas_left = self.metering.gas_left();

        self.storage.pop_set_active_state()?;
        self.runtime.pop_set_active_state()?;
        if commit {
            self.output.pop_discard()?;
        } else {
            self.output.pop_set_active_state()?;
        }
        self.metering.pop_set_active_state()?;
        if commit {
            self.blockchain.pop_discard()?;
        } else {
            self.blockchain.pop_set_active_state()?;
        }
        self.bigint.pop_set_active_state()?;

        self.check_lock_step()?;
        debug!(
            "frame popped ({}), depth {}",
            if commit { "commit" } else { "rollback" },
            self.bigint.state_stack_depth()
        );
        Ok(if commit { child_gas_left } else { 0 })
    }

    /// Tear down whatever an aborted invocation left behind
    pub(crate) fn recover(&mut self) {
        self.runtime.abandon_instances();
        self.init_state();
    }

    /// Drop every saved frame
    pub(crate) fn clear_state_stacks(&mut self) {
        self.bigint.clear_state_stack();
        self.blockchain.clear_state_stack();
        self.metering.clear_state_stack();
        self.output.clear_state_stack();
        self.runtime.clear_state_stack();
        self.storage.clear_state_stack();
    }

    /// Stack depth of every context, in push order
    pub fn stack_depths(&self) -> [usize; 6] {
        [
            self.bigint.state_stack_depth(),
            self.blockchain.state_stack_depth(),
            self.metering.state_stack_depth(),
            self.output.state_stack_depth(),
            self.runtime.state_stack_depth(),
            self.storage.state_stack_depth(),
        ]
    }

    /// Reject diverging stack depths
    pub(crate) fn check_lock_step(&self) -> Result<()> {
        let depths = self.stack_depths();
        if depths.iter().all(|depth| *depth == depths[0]) {
            Ok(())
        } else {
            Err(HostError::StateStackMismatch(depths))
        }
    }
}

/// Contract execution host
pub struct VmHost {
    gate: RwLock<()>,
    core: Mutex<HostCore>,
    hook: Arc<dyn BlockchainHook>,
}

impl VmHost {
    /// Build a host
    ///
    /// # Errors
    /// `Config` when the parameters or the gas schedule are invalid
    pub fn new(
        hook: Arc<dyn BlockchainHook>,
        executor: Arc<dyn Executor>,
        params: VmHostParameters,
    ) -> Result<Self> {
        params.validate()?;
        let core = HostCore::new(Arc::clone(&hook), executor, &params)?;
        info!("{} ready, warm instance {}", VM_HOST_VERSION, params.use_warm_instance);

        Ok(Self {
            gate: RwLock::new(()),
            core: Mutex::new(core),
            hook,
        })
    }

    /// Lock the core, recovering it when an earlier invocation unwound
    fn lock_core(&self) -> MutexGuard<'_, HostCore> {
        self.core.lock().unwrap_or_else(|poisoned| {
            error!("host core poisoned, resetting state");
            let mut core = poisoned.into_inner();
            core.recover();
            self.core.clear_poison();
            core
        })
    }

    /// Whether both addresses live in the same shard
    pub fn are_in_same_shard(&self, left: &Address, right: &Address) -> bool {
        self.hook.get_shard_of_address(left) == self.hook.get_shard_of_address(right)
    }

    /// Failures recorded during the last invocation that did not abort it
    pub fn runtime_errors(&self) -> Result<Vec<HostError>> {
        let core = self.lock_core();
        Ok(core.runtime.runtime_errors().to_vec())
    }

    /// Raw form of the active gas schedule
    pub fn gas_schedule(&self) -> Result<GasScheduleMap> {
        let core = self.lock_core();
        Ok(core.metering.gas_schedule().clone())
    }

    /// Run one invocation on the core
    ///
    /// A panic raised by the engine or a contract is turned into an
    /// `ExecutionFailed` output and the core is reset for the next call.
    fn run<T>(
        &self,
        context: &'static str,
        input: &T,
        execute: fn(&mut HostCore, &T) -> VmOutput,
    ) -> Result<VmOutput> {
        let _gate = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        let mut core = self.lock_core();
        match panic::catch_unwind(AssertUnwindSafe(|| execute(&mut *core, input))) {
            Ok(vm_output) => Ok(vm_output),
            Err(payload) => {
                let err = HostError::Fallback {
                    context,
                    message: panic_message(payload.as_ref()),
                };
                error!("{}", err);
                core.recover();
                Ok(core.output.create_vm_output_in_case_of_error(&err))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl VmExecutionHandler for VmHost {
    type Error = HostError;

    fn get_version(&self) -> Result<String> {
        Ok(VM_HOST_VERSION.to_string())
    }

    fn gas_schedule_change(&self, schedule: &GasScheduleMap) -> Result<()> {
        let _gate = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        let mut core = self.lock_core();

        match core.metering.set_gas_schedule(schedule) {
            Ok(()) => {
                let costs = core.metering.gas_cost().opcode_costs.clone();
                core.executor.set_opcode_costs(&costs);
                core.runtime.reset_warm_instance();
                core.blockchain.clear_compiled_codes();
                info!("gas schedule changed");
            }
            Err(err) => error!("gas schedule change failed, keeping previous schedule: {}", err),
        }
        Ok(())
    }

    fn run_smart_contract_create(&self, input: &ContractCreateInput) -> Result<VmOutput> {
        self.run("run_smart_contract_create", input, HostCore::run_create)
    }

    fn run_smart_contract_call(&self, input: &ContractCallInput) -> Result<VmOutput> {
        self.run("run_smart_contract_call", input, HostCore::run_call)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::make_gas_map;
    use crate::mock::{MockExecutor, MockWorld};

    pub(crate) fn test_core() -> HostCore {
        HostCore::new(
            Arc::new(MockWorld::new()),
            Arc::new(MockExecutor::new()),
            &VmHostParameters::for_tests(),
        )
        .unwrap()
    }

    #[test]
    fn test_poisoned_core_recovered_once() {
        let host = VmHost::new(
            Arc::new(MockWorld::new()),
            Arc::new(MockExecutor::new()),
            VmHostParameters::for_tests(),
        )
        .unwrap();
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut core = host.core.lock().unwrap();
            core.push_state();
            panic!("poisoning the core");
        }));
        assert!(host.core.is_poisoned());

        assert_eq!(host.lock_core().stack_depths(), [0; 6]);
        assert!(!host.core.is_poisoned());
        assert!(host.runtime_errors().unwrap().is_empty());
    }

    #[test]
    fn test_lock_step_push_and_pop() {
        let mut core = test_core();
        core.push_state();
        core.push_state();
        assert_eq!(core.stack_depths(), [2; 6]);

        core.pop_frame(true).unwrap();
        assert_eq!(core.stack_depths(), [1; 6]);
        core.pop_frame(false).unwrap();
        assert_eq!(core.stack_depths(), [0; 6]);
    }

    #[test]
    fn test_pop_without_push_rejected() {
        let mut core = test_core();
        assert_eq!(core.pop_frame(true), Err(HostError::StateStackUnderflow));
        assert_eq!(core.pop_frame(false), Err(HostError::StateStackUnderflow));
    }

    #[test]
    fn test_diverging_stacks_detected() {
        let mut core = test_core();
        core.push_state();
        core.output.push_state();
        assert!(matches!(core.check_lock_step(), Err(HostError::StateStackMismatch(_))));

        core.clear_state_stacks();
        assert_eq!(core.stack_depths(), [0; 6]);
    }

    #[test]
    fn test_failed_child_output_discarded_exactly() {
        let mut core = test_core();
        core.output.finish(b"parent".to_vec());
        core.output.write_log([1u8; 32], b"parent-event".to_vec(), vec![], vec![]);
        let before = core.output.state().clone();

        core.push_state();
        core.output.finish(b"child".to_vec());
        core.output.set_storage_update(&[2u8; 32], b"key", b"value");
        core.pop_frame(false).unwrap();

        assert_eq!(core.output.state(), &before);
    }

    #[test]
    fn test_committed_child_returns_gas() {
        let mut core = test_core();
        core.metering.init_state_from_input(&crate::types::VmInput {
            gas_provided: 100,
            ..Default::default()
        });
        core.metering.use_gas(40).unwrap();

        core.push_state();
        core.metering.init_state_from_input(&crate::types::VmInput {
            gas_provided: 40,
            ..Default::default()
        });
        core.metering.use_gas(15).unwrap();
        assert_eq!(core.pop_frame(true).unwrap(), 25);
        assert_eq!(core.metering.gas_left(), 60);
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut params = VmHostParameters::for_tests();
        params.gas_schedule = make_gas_map(1);
        params.gas_schedule.remove("ElrondAPICost");

        let result = VmHost::new(Arc::new(MockWorld::new()), Arc::new(MockExecutor::new()), params);
        assert!(matches!(result, Err(HostError::Config(_))));
    }

    #[test]
    fn test_version_and_shard_are_stable() {
        let world = MockWorld::new().with_shards(2);
        let host = VmHost::new(
            Arc::new(world),
            Arc::new(MockExecutor::new()),
            VmHostParameters::for_tests(),
        )
        .unwrap();

        let left = [0u8; 32];
        let mut right = [0u8; 32];
        right[31] = 1;

        assert_eq!(host.get_version().unwrap(), host.get_version().unwrap());
        assert!(host.get_version().unwrap().starts_with("vmhost v"));
        assert!(!host.are_in_same_shard(&left, &right));
        assert_eq!(host.are_in_same_shard(&left, &right), host.are_in_same_shard(&left, &right));
        assert!(host.are_in_same_shard(&left, &left));
    }
}
