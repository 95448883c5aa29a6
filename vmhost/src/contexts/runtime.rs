//! Runtime context
//!
//! Holds the call frame (input, executing address), the instance running it,
//! the breakpoint slot the hooks write to, and the async calls the frame
//! registered. Instances live outside the snapshot: pushing a frame parks the
//! caller's instance on a stack and popping a frame cleans the child's
//! instance and brings the caller's back.

use super::{StateStack, Stacked};
use crate::breakpoint::BreakpointValue;
use crate::engine::{EngineFault, Executor, FaultKind, Instance};
use crate::error::{HostError, Result};
use crate::types::{Address, ContractCallInput};
use log::{debug, error};
use num_bigint::BigInt;

/// Async call registered by a frame, drained once the frame returns
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AsyncCallInfo {
    /// Contract being called
    pub destination: Address,
    /// Call data in `function@hexarg@...` form
    pub data: Vec<u8>,
    /// Value transferred with the call
    pub value: BigInt,
    /// Gas forwarded to the destination
    pub gas_limit: u64,
    /// Gas reserved for the callback
    pub gas_locked: u64,
    /// Function called back on the caller
    pub callback: Option<String>,
}

/// Snapshot part of the runtime context
#[derive(Debug, Default, Clone)]
pub struct RuntimeState {
    /// Input of the running frame
    pub input: ContractCallInput,
    /// Address whose code runs
    pub sc_address: Address,
    /// Writes are rejected
    pub read_only: bool,
    /// Raw breakpoint value written by the hooks
    pub breakpoint: u64,
    /// Async calls registered by the frame
    pub async_calls: Vec<AsyncCallInfo>,
    /// Kind of the last fault reported by the engine
    pub last_fault: Option<FaultKind>,
}

/// Runtime context
pub struct RuntimeContext {
    state: Stacked<RuntimeState>,
    instance: Option<Box<dyn Instance>>,
    instance_stack: Vec<Option<Box<dyn Instance>>>,
    warm_instance: Option<Box<dyn Instance>>,
    instance_count: u64,
    max_instance_count: u64,
    runtime_errors: Vec<HostError>,
}

impl RuntimeContext {
    /// Context allowing at most `max_instance_count` live instances
    pub fn new(max_instance_count: u64) -> Self {
        Self {
            state: Stacked::default(),
            instance: None,
            instance_stack: Vec::new(),
            warm_instance: None,
            instance_count: 0,
            max_instance_count,
            runtime_errors: Vec::new(),
        }
    }

    /// Snapshot of the running frame
    pub fn state(&self) -> &RuntimeState {
        self.state.current()
    }

    /// Make `input` the running frame
    pub fn init_state_from_input(&mut self, input: ContractCallInput) {
        let state = self.state.current_mut();
        state.sc_address = input.recipient;
        state.input = input;
        state.breakpoint = BreakpointValue::None.into();
        state.async_calls.clear();
        state.last_fault = None;
    }

    /// Address whose code runs
    pub fn sc_address(&self) -> Address {
        self.state.current().sc_address
    }

    /// Input of the running frame
    pub fn input(&self) -> &ContractCallInput {
        &self.state.current().input
    }

    /// Function being executed
    pub fn function(&self) -> &str {
        &self.state.current().input.function
    }

    /// Arguments of the running frame
    pub fn arguments(&self) -> &[Vec<u8>] {
        &self.state.current().input.vm_input.arguments
    }

    /// Argument at `index`
    pub fn argument(&self, index: usize) -> Result<&[u8]> {
        self.arguments()
            .get(index)
            .map(Vec::as_slice)
            .ok_or(HostError::ArgIndexOutOfRange)
    }

    /// Whether writes are rejected
    pub fn read_only(&self) -> bool {
        self.state.current().read_only
    }

    /// Toggle read-only mode for the running frame
    pub fn set_read_only(&mut self, read_only: bool) {
        self.state.current_mut().read_only = read_only;
    }

    /// Record a breakpoint for the host to read after the engine returns
    pub fn set_runtime_breakpoint(&mut self, value: BreakpointValue) {
        self.state.current_mut().breakpoint = value.into();
    }

    /// Record a raw breakpoint value as written by the engine side
    pub fn set_raw_breakpoint(&mut self, raw: u64) {
        self.state.current_mut().breakpoint = raw;
    }

    /// Read the breakpoint and reset it
    ///
    /// # Errors
    /// `UnhandledRuntimeBreakpoint` when the raw value is unknown
    pub fn take_runtime_breakpoint(&mut self) -> Result<BreakpointValue> {
        let raw = std::mem::take(&mut self.state.current_mut().breakpoint);
        BreakpointValue::try_from(raw)
    }

    /// Register an async call
    pub fn add_async_call(&mut self, call: AsyncCallInfo) {
        self.state.current_mut().async_calls.push(call);
    }

    /// Async calls registered by the running frame, in registration order
    pub fn take_async_calls(&mut self) -> Vec<AsyncCallInfo> {
        std::mem::take(&mut self.state.current_mut().async_calls)
    }

    /// Record an engine fault of the running frame
    pub fn record_fault(&mut self, fault: &EngineFault) {
        self.state.current_mut().last_fault = Some(fault.kind);
    }

    /// Kind of the last engine fault of the running frame
    pub fn last_fault(&self) -> Option<FaultKind> {
        self.state.current().last_fault
    }

    /// Instantiate `code` for the running frame
    ///
    /// With `use_warm` set, a warm instance built from the same code is
    /// reused instead.
    ///
    /// # Errors
    /// * `MaxInstancesReached` - when the live instance ceiling is hit
    /// * `ContractInvalid` - when the engine rejects the code
    pub fn start_instance(&mut self, executor: &dyn Executor, code: &[u8], use_warm: bool) -> Result<()> {
        if use_warm {
            match self.warm_instance.take() {
                Some(warm) if warm.code() == code => {
                    debug!("reusing warm instance");
                    self.instance = Some(warm);
                    return Ok(());
                }
                Some(mut stale) => {
                    stale.clean();
                    self.instance_count = self.instance_count.saturating_sub(1);
                }
                None => {}
            }
        }

        if self.instance_count >= self.max_instance_count {
            return Err(HostError::MaxInstancesReached);
        }

        let instance = executor.new_instance(code).map_err(|fault| match fault.kind {
            FaultKind::InvalidCode => HostError::ContractInvalid,
            _ => HostError::Engine(fault),
        })?;
        self.instance_count = self.instance_count.saturating_add(1);
        self.instance = Some(instance);
        Ok(())
    }

    /// Whether the running instance exports `name`
    pub fn has_function(&self, name: &str) -> bool {
        self.instance
            .as_ref()
            .map(|instance| instance.has_function(name))
            .unwrap_or(false)
    }

    /// Move the running instance out so the engine can borrow the host
    pub fn take_instance(&mut self) -> Result<Box<dyn Instance>> {
        self.instance.take().ok_or(HostError::NoInstance)
    }

    /// Put the running instance back after a call
    pub fn restore_instance(&mut self, instance: Box<dyn Instance>) {
        self.instance = Some(instance);
    }

    /// Dispose of the running instance, or keep it warm
    pub fn finish_instance(&mut self, keep_warm: bool) {
        let Some(mut instance) = self.instance.take() else {
            return;
        };
        if keep_warm {
            if let Some(mut stale) = self.warm_instance.replace(instance) {
                stale.clean();
                self.instance_count = self.instance_count.saturating_sub(1);
            }
            return;
        }
        instance.clean();
        self.instance_count = self.instance_count.saturating_sub(1);
    }

    /// Drop the warm instance; the next top-level frame builds a fresh one
    pub fn reset_warm_instance(&mut self) {
        if let Some(mut warm) = self.warm_instance.take() {
            error!("resetting warm instance");
            warm.clean();
            self.instance_count = self.instance_count.saturating_sub(1);
        }
    }

    /// Drop every instance after an invocation was torn down mid-frame
    ///
    /// An instance unwound out of a call is already gone, so the live count
    /// restarts from zero instead of being decremented per instance.
    pub fn abandon_instances(&mut self) {
        let parked = self.instance_stack.drain(..).flatten();
        for mut instance in parked.chain(self.instance.take()).chain(self.warm_instance.take()) {
            instance.clean();
        }
        self.instance_count = 0;
    }

    /// Whether a warm instance is kept
    pub fn has_warm_instance(&self) -> bool {
        self.warm_instance.is_some()
    }

    /// Number of live instances, the warm one included
    pub fn instance_count(&self) -> u64 {
        self.instance_count
    }

    /// Record a failure that did not abort the invocation
    pub fn add_runtime_error(&mut self, err: HostError) {
        self.runtime_errors.push(err);
    }

    /// Failures recorded during the last invocation
    pub fn runtime_errors(&self) -> &[HostError] {
        &self.runtime_errors
    }
}

impl StateStack for RuntimeContext {
    fn init_state(&mut self) {
        self.state.reset();
        self.runtime_errors.clear();
    }

    fn push_state(&mut self) {
        self.state.push();
        self.state.reset();
        self.instance_stack.push(self.instance.take());
    }

    fn pop_set_active_state(&mut self) -> Result<()> {
        self.state.pop_restore()?;
        self.finish_instance(false);
        self.instance = self.instance_stack.pop().flatten();
        Ok(())
    }

    fn pop_discard(&mut self) -> Result<()> {
        self.state.pop_discard()?;
        if let Some(mut parked) = self.instance_stack.pop().flatten() {
            parked.clean();
            self.instance_count = self.instance_count.saturating_sub(1);
        }
        Ok(())
    }

    fn clear_state_stack(&mut self) {
        self.state.clear();
        for mut parked in self.instance_stack.drain(..).flatten() {
            parked.clean();
            self.instance_count = self.instance_count.saturating_sub(1);
        }
    }

    fn state_stack_depth(&self) -> usize {
        self.state.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ContractMock, MockExecutor};

    fn executor() -> MockExecutor {
        let executor = MockExecutor::new();
        executor.register(b"alpha".to_vec(), ContractMock::new().with_method("run", |_| Ok(())));
        executor.register(b"beta".to_vec(), ContractMock::new());
        executor
    }

    fn input(recipient: Address) -> ContractCallInput {
        ContractCallInput {
            recipient,
            function: "run".into(),
            ..ContractCallInput::default()
        }
    }

    #[test]
    fn test_breakpoint_read_once() {
        let mut runtime = RuntimeContext::new(10);
        runtime.set_runtime_breakpoint(BreakpointValue::SignalError);
        assert_eq!(runtime.take_runtime_breakpoint().unwrap(), BreakpointValue::SignalError);
        assert_eq!(runtime.take_runtime_breakpoint().unwrap(), BreakpointValue::None);
    }

    #[test]
    fn test_unknown_breakpoint_rejected() {
        let mut runtime = RuntimeContext::new(10);
        runtime.set_raw_breakpoint(42);
        assert_eq!(
            runtime.take_runtime_breakpoint(),
            Err(HostError::UnhandledRuntimeBreakpoint(42))
        );
    }

    #[test]
    fn test_argument_out_of_range() {
        let mut runtime = RuntimeContext::new(10);
        let mut call = input([1u8; 32]);
        call.vm_input.arguments = vec![b"a".to_vec()];
        runtime.init_state_from_input(call);

        assert_eq!(runtime.argument(0).unwrap(), b"a");
        assert_eq!(runtime.argument(1), Err(HostError::ArgIndexOutOfRange));
    }

    #[test]
    fn test_instance_ceiling() {
        let executor = executor();
        let mut runtime = RuntimeContext::new(2);

        runtime.start_instance(&executor, b"alpha", false).unwrap();
        runtime.push_state();
        runtime.start_instance(&executor, b"beta", false).unwrap();
        runtime.push_state();
        assert_eq!(
            runtime.start_instance(&executor, b"alpha", false),
            Err(HostError::MaxInstancesReached)
        );

        runtime.pop_set_active_state().unwrap();
        runtime.pop_set_active_state().unwrap();
        assert_eq!(runtime.instance_count(), 1);
        assert!(runtime.has_function("run"));
    }

    #[test]
    fn test_warm_instance_reuse_and_reset() {
        let executor = executor();
        let mut runtime = RuntimeContext::new(10);

        runtime.start_instance(&executor, b"alpha", true).unwrap();
        runtime.finish_instance(true);
        assert!(runtime.has_warm_instance());
        assert_eq!(runtime.instance_count(), 1);

        runtime.start_instance(&executor, b"alpha", true).unwrap();
        assert_eq!(runtime.instance_count(), 1);
        runtime.finish_instance(true);

        runtime.reset_warm_instance();
        assert!(!runtime.has_warm_instance());
        assert_eq!(runtime.instance_count(), 0);
    }

    #[test]
    fn test_abandon_instances_resets_count() {
        let executor = executor();
        let mut runtime = RuntimeContext::new(3);

        runtime.start_instance(&executor, b"alpha", true).unwrap();
        runtime.finish_instance(true);
        runtime.start_instance(&executor, b"beta", false).unwrap();
        runtime.push_state();
        runtime.start_instance(&executor, b"alpha", false).unwrap();
        // the running instance unwound away without being finished
        drop(runtime.take_instance().unwrap());
        assert_eq!(runtime.instance_count(), 3);

        runtime.abandon_instances();
        assert_eq!(runtime.instance_count(), 0);
        assert!(!runtime.has_warm_instance());
        assert!(matches!(runtime.take_instance(), Err(HostError::NoInstance)));
    }

    #[test]
    fn test_async_calls_drained_in_order() {
        let mut runtime = RuntimeContext::new(10);
        for byte in 1..=3u8 {
            runtime.add_async_call(AsyncCallInfo {
                destination: [byte; 32],
                ..AsyncCallInfo::default()
            });
        }
        let calls = runtime.take_async_calls();
        let order: Vec<u8> = calls.iter().map(|call| call.destination[0]).collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(runtime.take_async_calls().is_empty());
    }
}
