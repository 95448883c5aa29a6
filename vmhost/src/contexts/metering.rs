//! Gas meter
//!
//! Per frame the meter tracks the gas provided to the frame, the gas left,
//! and the gas locked for pending callbacks. Gas locked is carved out of gas
//! left, so `gas_left + gas_locked <= gas_provided` holds at every point
//! except after a refund of gas handed to a child frame, which only returns
//! what was taken.
//!
//! All arithmetic saturates; identical inputs always charge identical gas.

use super::{StateStack, Stacked};
use crate::config::{create_gas_config, GasCost, GasScheduleMap};
use crate::error::{ConfigError, HostError, Result};
use crate::types::VmInput;

/// Gas accounting of one frame
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MeteringState {
    /// Gas the frame started with
    pub gas_provided: u64,
    /// Gas still available
    pub gas_left: u64,
    /// Gas reserved for pending callbacks
    pub gas_locked: u64,
}

/// Metering context
#[derive(Debug)]
pub struct MeteringContext {
    state: Stacked<MeteringState>,
    gas_cost: GasCost,
    gas_schedule: GasScheduleMap,
    block_gas_limit: u64,
}

impl MeteringContext {
    /// Meter using `schedule`
    ///
    /// # Errors
    /// Any [`ConfigError`] raised while validating the schedule
    pub fn new(
        schedule: &GasScheduleMap,
        block_gas_limit: u64,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            state: Stacked::default(),
            gas_cost: create_gas_config(schedule)?,
            gas_schedule: schedule.clone(),
            block_gas_limit,
        })
    }

    /// Active cost table
    pub fn gas_cost(&self) -> &GasCost {
        &self.gas_cost
    }

    /// Raw form of the active schedule
    pub fn gas_schedule(&self) -> &GasScheduleMap {
        &self.gas_schedule
    }

    /// Replace the cost table for later charges
    ///
    /// The new schedule is validated first; on error the previous one stays
    /// in force. Gas already charged is never touched.
    pub fn set_gas_schedule(
        &mut self,
        schedule: &GasScheduleMap,
    ) -> std::result::Result<(), ConfigError> {
        let gas_cost = create_gas_config(schedule)?;
        self.gas_cost = gas_cost;
        self.gas_schedule = schedule.clone();
        Ok(())
    }

    /// Accounting of the active frame
    pub fn state(&self) -> MeteringState {
        *self.state.current()
    }

    /// Start the active frame from an invocation input
    pub fn init_state_from_input(&mut self, input: &VmInput) {
        let gas_provided = input.gas_provided;
        *self.state.current_mut() = MeteringState {
            gas_provided,
            gas_left: self.bound_gas_limit(gas_provided),
            gas_locked: input.gas_locked,
        };
    }

    /// Gas still available to the active frame
    pub fn gas_left(&self) -> u64 {
        self.state.current().gas_left
    }

    /// Gas the active frame started with
    pub fn gas_provided(&self) -> u64 {
        self.state.current().gas_provided
    }

    /// Gas reserved for callbacks in the active frame
    pub fn gas_locked(&self) -> u64 {
        self.state.current().gas_locked
    }

    /// Gas the active frame consumed so far
    pub fn gas_used(&self) -> u64 {
        let state = self.state.current();
        state
            .gas_provided
            .saturating_sub(state.gas_left)
            .saturating_sub(state.gas_locked)
    }

    /// Gas returned to the caller of the active frame
    ///
    /// Includes whatever the block gas limit kept out of the frame.
    pub fn gas_remaining(&self) -> u64 {
        let state = self.state.current();
        let excess = state
            .gas_provided
            .saturating_sub(self.bound_gas_limit(state.gas_provided));
        state.gas_left.saturating_add(excess)
    }

    /// Charge `amount`
    ///
    /// # Errors
    /// `NotEnoughGas` when `amount` exceeds the gas left; the frame is then
    /// left with zero gas.
    pub fn use_gas(&mut self, amount: u64) -> Result<()> {
        let state = self.state.current_mut();
        match state.gas_left.checked_sub(amount) {
            Some(left) => {
                state.gas_left = left;
                Ok(())
            }
            None => {
                state.gas_left = 0;
                Err(HostError::NotEnoughGas)
            }
        }
    }

    /// Refund `amount`, never above what the frame was given
    pub fn free_gas(&mut self, amount: u64) {
        let state = self.state.current_mut();
        let ceiling = state.gas_provided.saturating_sub(state.gas_locked);
        state.gas_left = state.gas_left.saturating_add(amount).min(ceiling);
    }

    /// Give back gas a successful child frame did not spend
    pub fn restore_gas(&mut self, amount: u64) {
        let state = self.state.current_mut();
        state.gas_left = state.gas_left.saturating_add(amount);
    }

    /// Move `amount` from gas left into the callback reserve
    pub fn lock_gas_for_async(&mut self, amount: u64) -> Result<()> {
        let state = self.state.current_mut();
        let left = state
            .gas_left
            .checked_sub(amount)
            .ok_or(HostError::NotEnoughGas)?;
        state.gas_left = left;
        state.gas_locked = state.gas_locked.saturating_add(amount);
        Ok(())
    }

    /// Take up to `amount` out of the callback reserve
    ///
    /// # Returns
    /// The gas actually taken
    pub fn consume_locked_gas(&mut self, amount: u64) -> u64 {
        let state = self.state.current_mut();
        let taken = amount.min(state.gas_locked);
        state.gas_locked = state.gas_locked.saturating_sub(taken);
        taken
    }

    /// Return the whole callback reserve to gas left
    ///
    /// # Returns
    /// The gas unlocked
    pub fn unlock_gas(&mut self) -> u64 {
        let state = self.state.current_mut();
        let unlocked = state.gas_locked;
        state.gas_left = state.gas_left.saturating_add(unlocked);
        state.gas_locked = 0;
        unlocked
    }

    /// Charge for preparing `code` for execution
    pub fn deduct_initial_gas_for_execution(&mut self, code: &[u8]) -> Result<()> {
        let per_byte = self.gas_cost.base_operation_cost.aot_prepare_per_byte;
        let cost = per_byte.saturating_mul(code.len() as u64);
        self.use_gas(cost)
    }

    /// Charge for compiling and deploying `code`
    pub fn deduct_initial_gas_for_deployment(&mut self, code: &[u8]) -> Result<()> {
        let per_byte = self.gas_cost.base_operation_cost.compile_per_byte;
        let cost = self
            .gas_cost
            .api_cost
            .create_contract
            .saturating_add(per_byte.saturating_mul(code.len() as u64));
        self.use_gas(cost)
    }

    /// Cap an instance's gas by the block gas limit
    pub fn bound_gas_limit(&self, gas: u64) -> u64 {
        gas.min(self.block_gas_limit)
    }
}

impl StateStack for MeteringContext {
    fn init_state(&mut self) {
        self.state.reset();
    }

    fn push_state(&mut self) {
        self.state.push();
    }

    fn pop_set_active_state(&mut self) -> Result<()> {
        self.state.pop_restore().map(|_| ())
    }

    fn pop_discard(&mut self) -> Result<()> {
        self.state.pop_discard().map(|_| ())
    }

    fn clear_state_stack(&mut self) {
        self.state.clear();
    }

    fn state_stack_depth(&self) -> usize {
        self.state.depth()
    }
}
