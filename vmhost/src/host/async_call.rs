//! Async call dispatch
//!
//! Once a frame returns, the calls it registered are dispatched in
//! registration order. Each entry is isolated: its failure is recorded and
//! logged, never propagated to the frame or to its siblings. For one entry:
//!
//! 1. the forwarded gas leaves the caller's frame;
//! 2. the destination runs in a child frame, or becomes an outgoing transfer
//!    when it lives in another shard, or a plain value transfer when it has
//!    no code or no function was named;
//! 3. on destination success the callback, if any, runs in a child frame on
//!    the caller's address with the locked gas plus the destination's unspent
//!    gas, and receives `[return code, return data...]`;
//! 4. on destination failure no callback runs and the locked gas returns to
//!    the caller.

use super::{FrameOutcome, HostCore};
use crate::contexts::bigint::unsigned_bytes;
use crate::contexts::runtime::AsyncCallInfo;
use crate::error::{HostError, Result};
use crate::types::{Address, CallType, ContractCallInput, OutputTransfer, ReturnCode, VmInput};
use log::{debug, warn};
use num_bigint::BigInt;

/// Split `function@hexarg@hexarg...` into its function name and arguments
///
/// Empty data yields an empty function name and no arguments.
///
/// # Errors
/// `InvalidCallData` when the function name is not UTF-8 or an argument is
/// not hex
pub fn parse_call_data(data: &[u8]) -> Result<(String, Vec<Vec<u8>>)> {
    if data.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    let mut parts = data.split(|byte| *byte == b'@');
    let function = parts
        .next()
        .map(|name| String::from_utf8(name.to_vec()))
        .transpose()
        .map_err(|_| HostError::InvalidCallData)?
        .unwrap_or_default();
    let arguments = parts
        .map(|argument| hex::decode(argument).map_err(|_| HostError::InvalidCallData))
        .collect::<Result<Vec<_>>>()?;
    Ok((function, arguments))
}

impl HostCore {
    /// Dispatch every async call registered by the running frame
    ///
    /// # Errors
    /// Only errors that abort the whole invocation
    pub(crate) fn process_async_calls(&mut self) -> Result<()> {
        let calls = self.runtime.take_async_calls();
        if calls.is_empty() {
            return Ok(());
        }

        let sender = self.runtime.sc_address();
        debug!("dispatching {} async calls from {}", calls.len(), hex::encode(sender));
        for call in calls {
            self.process_async_call(&sender, call)?;
        }
        Ok(())
    }

    fn process_async_call(&mut self, sender: &Address, call: AsyncCallInfo) -> Result<()> {
        debug!(
            "async call to {} gas {} locked {}",
            hex::encode(call.destination),
            call.gas_limit,
            call.gas_locked
        );

        if call.gas_limit > self.metering.gas_left() {
            self.fail_async_call(&call, HostError::NotEnoughGas);
            return Ok(());
        }

        if !self.blockchain.are_in_same_shard(sender, &call.destination) {
            return self.send_cross_shard(sender, call);
        }

        let (function, arguments) = match parse_call_data(&call.data) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.fail_async_call(&call, err);
                return Ok(());
            }
        };

        self.metering.use_gas(call.gas_limit)?;
        let is_contract = self.blockchain.is_smart_contract(&call.destination, &self.output)?;
        let destination_result = if function.is_empty() || !is_contract {
            self.async_value_transfer(sender, &call)
        } else {
            let input = ContractCallInput {
                vm_input: self.async_input(*sender, arguments, call.value.clone(), CallType::AsynchronousCall, call.gas_limit),
                recipient: call.destination,
                function,
            };
            self.execute_on_dest_context_frame(input)
        };

        let outcome = match destination_result {
            Ok(outcome) => outcome,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                self.fail_async_call(&call, err);
                return Ok(());
            }
        };

        match call.callback.clone() {
            Some(callback) => self.run_callback(sender, &call, callback, outcome),
            None => {
                self.metering.restore_gas(outcome.gas_left);
                Ok(())
            }
        }
    }

    fn run_callback(
        &mut self,
        sender: &Address,
        call: &AsyncCallInfo,
        callback: String,
        outcome: FrameOutcome,
    ) -> Result<()> {
        let locked = self.metering.consume_locked_gas(call.gas_locked);
        let gas = locked.saturating_add(outcome.gas_left);

        let mut arguments = vec![unsigned_bytes(&BigInt::from(ReturnCode::Ok.as_u64()))];
        arguments.extend(outcome.return_data);

        let input = ContractCallInput {
            vm_input: self.async_input(call.destination, arguments, BigInt::default(), CallType::AsynchronousCallBack, gas),
            recipient: *sender,
            function: callback,
        };
        match self.execute_on_dest_context_frame(input) {
            Ok(callback_outcome) => {
                self.metering.restore_gas(callback_outcome.gas_left);
                Ok(())
            }
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!("callback on {} failed: {}", hex::encode(sender), err);
                self.runtime.add_runtime_error(err);
                Ok(())
            }
        }
    }

    fn async_input(
        &self,
        caller: Address,
        arguments: Vec<Vec<u8>>,
        call_value: BigInt,
        call_type: CallType,
        gas_provided: u64,
    ) -> VmInput {
        VmInput {
            caller,
            arguments,
            call_value,
            call_type,
            gas_price: self.runtime.input().vm_input.gas_price,
            gas_provided,
            gas_locked: 0,
        }
    }

    /// Destination without code: move the value, hand back all forwarded gas
    fn async_value_transfer(&mut self, sender: &Address, call: &AsyncCallInfo) -> Result<FrameOutcome> {
        let balance = self.blockchain.get_balance(sender, &self.output)?;
        self.output
            .transfer(&call.destination, sender, &balance, &call.value)?;
        Ok(FrameOutcome {
            return_data: Vec::new(),
            gas_left: call.gas_limit,
        })
    }

    /// Destination in another shard: queue the call as an outgoing transfer
    fn send_cross_shard(&mut self, sender: &Address, call: AsyncCallInfo) -> Result<()> {
        let balance = self.blockchain.get_balance(sender, &self.output)?;
        if let Err(err) = self
            .output
            .transfer(&call.destination, sender, &balance, &call.value)
        {
            self.fail_async_call(&call, err);
            return Ok(());
        }

        self.metering.use_gas(call.gas_limit)?;
        let gas_locked = self.metering.consume_locked_gas(call.gas_locked);
        debug!("async call to {} leaves the shard", hex::encode(call.destination));
        self.output.add_output_transfer(
            &call.destination,
            OutputTransfer {
                value: call.value,
                gas_limit: call.gas_limit,
                gas_locked,
                data: call.data,
                call_type: CallType::AsynchronousCall,
                sender: *sender,
            },
        );
        Ok(())
    }

    /// Record a failed entry and give its callback gas back to the caller
    fn fail_async_call(&mut self, call: &AsyncCallInfo, err: HostError) {
        warn!("async call to {} failed: {}", hex::encode(call.destination), err);
        let reserved = self.metering.consume_locked_gas(call.gas_locked);
        self.metering.restore_gas(reserved);
        self.runtime.add_runtime_error(err);
    }
}
