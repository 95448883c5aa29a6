//! Create, call and upgrade paths
//!
//! Top-level invocations run on the bottom frame and finish with a
//! [`VmOutput`]. Child frames (nested calls, nested deployments, async
//! destinations and callbacks) run between a push and a pop and report a
//! [`FrameOutcome`] back to their caller.

use super::HostCore;
use crate::config::{CALLBACK_FUNCTION_NAME, INIT_FUNCTION_NAME, UPGRADE_FUNCTION_NAME};
use crate::engine::FaultKind;
use crate::error::{HostError, Result};
use crate::types::{
    Address, CallType, CodeMetadata, ContractCallInput, ContractCreateInput, ReturnCode, VmInput,
    VmOutput,
};
use log::{error, trace};
use num_bigint::{BigInt, Sign};

/// Result of a child frame that completed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub(crate) struct FrameOutcome {
    /// Return data produced by the child
    pub return_data: Vec<Vec<u8>>,
    /// Gas the child did not spend
    pub gas_left: u64,
}

impl HostCore {
    // === Top-level invocations ===

    /// Deploy a contract and produce the ledger-facing output
    pub(crate) fn run_create(&mut self, input: &ContractCreateInput) -> VmOutput {
        trace!(
            "create begin: caller {} code {} bytes gas {}",
            hex::encode(input.vm_input.caller),
            input.contract_code.len(),
            input.vm_input.gas_provided
        );
        self.init_state();

        let result = self.do_create(input);
        let vm_output = self.finish_top_level(result.map(|_| ()));

        trace!("create end: {}", vm_output.return_code);
        vm_output
    }

    /// Call a contract and produce the ledger-facing output
    pub(crate) fn run_call(&mut self, input: &ContractCallInput) -> VmOutput {
        trace!(
            "call begin: {} -> {}::{} gas {}",
            hex::encode(input.vm_input.caller),
            hex::encode(input.recipient),
            input.function,
            input.vm_input.gas_provided
        );
        self.init_state();

        let result = if input.function == UPGRADE_FUNCTION_NAME {
            self.do_upgrade(input)
        } else {
            self.do_call(input)
        };
        let vm_output = self.finish_top_level(result);

        trace!("call end: {}", vm_output.return_code);
        vm_output
    }

    fn finish_top_level(&mut self, result: Result<()>) -> VmOutput {
        let poisoned = self.runtime.last_fault() == Some(FaultKind::Allocation);
        let keep_warm = self.use_warm_instance && result.is_ok() && !poisoned;
        self.runtime.finish_instance(keep_warm);
        if poisoned && self.use_warm_instance {
            error!("allocation fault, warm instance discarded");
        }

        let vm_output = match result {
            Ok(()) => {
                self.metering.unlock_gas();
                let address = self.runtime.sc_address();
                let gas_used = self.metering.gas_used();
                self.output.add_gas_used(&address, gas_used);
                self.output.set_return_code(ReturnCode::Ok);
                self.output.get_vm_output(self.metering.gas_remaining())
            }
            Err(err) => {
                if err.is_fatal() {
                    error!("invocation aborted: {}", err);
                }
                self.output.create_vm_output_in_case_of_error(&err)
            }
        };
        self.clear_state_stacks();
        vm_output
    }

    fn do_create(&mut self, input: &ContractCreateInput) -> Result<Address> {
        let vm_input = &input.vm_input;
        self.metering.init_state_from_input(vm_input);

        let address = self.blockchain.new_address(&vm_input.caller, &self.output)?;
        if self.blockchain.is_smart_contract(&address, &self.output)? {
            return Err(HostError::AccountCollision);
        }

        self.output.add_tx_value_to_account(&address, &vm_input.call_value);
        self.deploy(address, &input.contract_code, input.code_metadata, vm_input)?;
        Ok(address)
    }

    fn do_call(&mut self, input: &ContractCallInput) -> Result<()> {
        self.metering.init_state_from_input(&input.vm_input);
        self.runtime.init_state_from_input(input.clone());
        self.storage.set_address(input.recipient);

        let code = self.blockchain.get_code(&input.recipient, &self.output)?;
        self.check_callable(input)?;
        self.output
            .add_tx_value_to_account(&input.recipient, &input.vm_input.call_value);

        self.metering.deduct_initial_gas_for_execution(&code)?;
        let executor = std::sync::Arc::clone(&self.executor);
        self.runtime
            .start_instance(executor.as_ref(), &code, self.use_warm_instance)?;
        self.run_function(&input.function)
    }

    fn do_upgrade(&mut self, input: &ContractCallInput) -> Result<()> {
        let vm_input = &input.vm_input;
        self.metering.init_state_from_input(vm_input);
        self.runtime.init_state_from_input(input.clone());
        self.storage.set_address(input.recipient);

        let metadata = self.blockchain.get_code_metadata(&input.recipient, &self.output)?;
        if !metadata.upgradeable {
            return Err(HostError::UpgradeFailed("contract is not upgradeable".into()));
        }
        let owner = self.blockchain.get_owner(&input.recipient, &self.output)?;
        if owner != vm_input.caller {
            return Err(HostError::UpgradeFailed("caller is not the owner".into()));
        }
        let (code, new_metadata, init_arguments) = match vm_input.arguments.as_slice() {
            [code, metadata, rest @ ..] => (code.clone(), CodeMetadata::from_bytes(metadata), rest.to_vec()),
            _ => return Err(HostError::UpgradeFailed("expected code and code metadata".into())),
        };

        let init_input = VmInput {
            arguments: init_arguments,
            ..vm_input.clone()
        };
        self.output
            .add_tx_value_to_account(&input.recipient, &vm_input.call_value);
        self.deploy(input.recipient, &code, new_metadata, &init_input)
    }

    // === Shared frame logic ===

    /// Instantiate `code` at `address`, run `init` if exported, record the code
    ///
    /// The metering context must already hold the frame's gas.
    fn deploy(
        &mut self,
        address: Address,
        code: &[u8],
        metadata: CodeMetadata,
        vm_input: &VmInput,
    ) -> Result<()> {
        self.runtime.init_state_from_input(ContractCallInput {
            vm_input: vm_input.clone(),
            recipient: address,
            function: INIT_FUNCTION_NAME.to_string(),
        });
        self.storage.set_address(address);

        if code.is_empty() {
            return Err(HostError::ContractInvalid);
        }
        self.metering.deduct_initial_gas_for_deployment(code)?;

        let executor = std::sync::Arc::clone(&self.executor);
        self.runtime.start_instance(executor.as_ref(), code, false)?;
        if self.runtime.has_function(INIT_FUNCTION_NAME) {
            self.call_function(INIT_FUNCTION_NAME)?;
            self.process_async_calls()?;
        }

        self.output
            .deploy_code(&address, code.to_vec(), metadata, &vm_input.caller);
        Ok(())
    }

    /// Guards applied before a contract function may run
    fn check_callable(&self, input: &ContractCallInput) -> Result<()> {
        if input.function == INIT_FUNCTION_NAME {
            return Err(HostError::InitFuncCalledInRun);
        }
        if input.function == CALLBACK_FUNCTION_NAME
            && input.vm_input.call_type != CallType::AsynchronousCallBack
        {
            return Err(HostError::CallBackFuncCalledInRun);
        }

        let sends_value = input.vm_input.call_value.sign() == Sign::Plus;
        if sends_value && input.vm_input.caller != input.recipient {
            let metadata = self.blockchain.get_code_metadata(&input.recipient, &self.output)?;
            if !metadata.payable {
                return Err(HostError::AccountNotPayable);
            }
        }
        Ok(())
    }

    /// Run an exported function of the loaded instance, then its async calls
    fn run_function(&mut self, function: &str) -> Result<()> {
        if !self.runtime.has_function(function) {
            return Err(HostError::FunctionNotFound(function.to_string()));
        }
        self.call_function(function)?;
        self.process_async_calls()
    }

    /// Hand the host to the engine for one call and resolve the outcome
    pub(crate) fn call_function(&mut self, function: &str) -> Result<()> {
        let mut instance = self.runtime.take_instance()?;
        let engine_result = instance.call(function, self);
        self.runtime.restore_instance(instance);

        self.handle_breakpoint_if_any(function, engine_result)
    }

    /// Move `value` from `sender` to `recipient` inside the running frame
    fn transfer_in_frame(&mut self, sender: &Address, recipient: &Address, value: &BigInt) -> Result<()> {
        if value.sign() != Sign::Plus {
            return Ok(());
        }
        let balance = self.blockchain.get_balance(sender, &self.output)?;
        self.output.transfer(recipient, sender, &balance, value)
    }

    // === Child frames ===

    /// Run a call in a child frame
    ///
    /// The caller must already have taken `input.vm_input.gas_provided` out
    /// of its own gas.
    pub(crate) fn execute_on_dest_context_frame(&mut self, input: ContractCallInput) -> Result<FrameOutcome> {
        trace!(
            "child call: {} -> {}::{}",
            hex::encode(input.vm_input.caller),
            hex::encode(input.recipient),
            input.function
        );
        let mark = self.output.return_data().len();
        self.push_state();

        let result = self.run_child_call(&input);
        let gas_left = self.pop_frame(result.is_ok())?;
        result?;

        Ok(FrameOutcome {
            return_data: self.output.return_data()[mark..].to_vec(),
            gas_left,
        })
    }

    fn run_child_call(&mut self, input: &ContractCallInput) -> Result<()> {
        self.metering.init_state_from_input(&input.vm_input);
        self.runtime.init_state_from_input(input.clone());
        self.storage.set_address(input.recipient);

        let code = self.blockchain.get_code(&input.recipient, &self.output)?;
        self.check_callable(input)?;
        self.transfer_in_frame(&input.vm_input.caller, &input.recipient, &input.vm_input.call_value)?;

        self.metering.deduct_initial_gas_for_execution(&code)?;
        let executor = std::sync::Arc::clone(&self.executor);
        self.runtime.start_instance(executor.as_ref(), &code, false)?;
        self.run_function(&input.function)
    }

    /// Deploy a contract from the running contract in a child frame
    ///
    /// The creator's nonce is bumped in the caller's frame, so it stays
    /// bumped even when the deployment fails.
    pub(crate) fn create_contract_frame(&mut self, input: ContractCreateInput) -> Result<(Address, FrameOutcome)> {
        let creator = input.vm_input.caller;
        let address = self.blockchain.new_address(&creator, &self.output)?;
        if self.blockchain.is_smart_contract(&address, &self.output)? {
            return Err(HostError::AccountCollision);
        }
        self.blockchain.increase_nonce(&creator, &mut self.output)?;
        trace!("child create: {} -> {}", hex::encode(creator), hex::encode(address));

        let mark = self.output.return_data().len();
        self.push_state();

        let result = self.run_child_create(address, &input);
        let gas_left = self.pop_frame(result.is_ok())?;
        result?;

        let outcome = FrameOutcome {
            return_data: self.output.return_data()[mark..].to_vec(),
            gas_left,
        };
        Ok((address, outcome))
    }

    fn run_child_create(&mut self, address: Address, input: &ContractCreateInput) -> Result<()> {
        let vm_input = &input.vm_input;
        self.metering.init_state_from_input(vm_input);
        self.transfer_in_frame(&vm_input.caller, &address, &vm_input.call_value)?;
        self.deploy(address, &input.contract_code, input.code_metadata, vm_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::test_core;

    fn call_input(function: &str, call_type: CallType) -> ContractCallInput {
        ContractCallInput {
            vm_input: VmInput {
                call_type,
                ..VmInput::default()
            },
            recipient: [7u8; 32],
            function: function.into(),
        }
    }

    #[test]
    fn test_reserved_functions_rejected() {
        let core = test_core();
        assert_eq!(
            core.check_callable(&call_input("init", CallType::DirectCall)),
            Err(HostError::InitFuncCalledInRun)
        );
        assert_eq!(
            core.check_callable(&call_input("callBack", CallType::DirectCall)),
            Err(HostError::CallBackFuncCalledInRun)
        );
        assert_eq!(
            core.check_callable(&call_input("callBack", CallType::AsynchronousCallBack)),
            Ok(())
        );
    }

    #[test]
    fn test_missing_recipient_is_contract_not_found() {
        let mut core = test_core();
        let output = core.run_call(&ContractCallInput {
            vm_input: VmInput {
                gas_provided: 1000,
                ..VmInput::default()
            },
            recipient: [9u8; 32],
            function: "run".into(),
        });

        assert_eq!(output.return_code, ReturnCode::ContractNotFound);
        assert_eq!(output.gas_remaining, 0);
        assert_eq!(core.stack_depths(), [0; 6]);
    }
}
