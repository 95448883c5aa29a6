//! Output accumulator
//!
//! Collects everything an invocation produces: return data, logs, and the
//! per-account deltas the ledger applies afterwards. A nested frame works on
//! a copy of its caller's output; committing keeps that copy, rolling back
//! restores the caller's output exactly as it was before the push.

use super::{StateStack, Stacked};
use crate::error::{HostError, Result};
use crate::types::{
    Address, CodeMetadata, LogEntry, OutputAccount, OutputTransfer, ReturnCode, StorageUpdate,
    VmOutput,
};
use num_bigint::BigInt;
use std::collections::BTreeMap;

/// Accumulated output of the current frame and everything it committed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OutputState {
    /// Deltas per account
    pub output_accounts: BTreeMap<Address, OutputAccount>,
    /// Data produced by `finish`
    pub return_data: Vec<Vec<u8>>,
    /// Outcome category
    pub return_code: ReturnCode,
    /// Outcome message
    pub return_message: String,
    /// Ordered events
    pub logs: Vec<LogEntry>,
}

/// Output accumulator context
#[derive(Debug, Default)]
pub struct OutputContext {
    state: Stacked<OutputState>,
}

impl OutputContext {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> &OutputState {
        self.state.current()
    }

    /// Delta of `address`, created when missing
    ///
    /// # Returns
    /// The account and whether it was created by this call
    pub fn get_output_account(&mut self, address: &Address) -> (&mut OutputAccount, bool) {
        let accounts = &mut self.state.current_mut().output_accounts;
        let is_new = !accounts.contains_key(address);
        let account = accounts
            .entry(*address)
            .or_insert_with(|| OutputAccount::new(*address));
        (account, is_new)
    }

    /// Delta of `address`, if any
    pub fn output_account(&self, address: &Address) -> Option<&OutputAccount> {
        self.state.current().output_accounts.get(address)
    }

    /// Append one piece of return data
    pub fn finish(&mut self, data: Vec<u8>) {
        self.state.current_mut().return_data.push(data);
    }

    /// Return data accumulated so far
    pub fn return_data(&self) -> &[Vec<u8>] {
        &self.state.current().return_data
    }

    /// Current outcome message
    pub fn return_message(&self) -> &str {
        &self.state.current().return_message
    }

    /// Set the outcome message
    pub fn set_return_message(&mut self, message: impl Into<String>) {
        self.state.current_mut().return_message = message.into();
    }

    /// Set the outcome category
    pub fn set_return_code(&mut self, code: ReturnCode) {
        self.state.current_mut().return_code = code;
    }

    /// Append an event
    pub fn write_log(&mut self, address: Address, identifier: Vec<u8>, topics: Vec<Vec<u8>>, data: Vec<u8>) {
        self.state.current_mut().logs.push(LogEntry {
            identifier,
            address,
            topics,
            data,
        });
    }

    /// Number of events recorded
    pub fn log_count(&self) -> usize {
        self.state.current().logs.len()
    }

    /// Storage value written in this invocation, if any
    pub fn storage_update(&self, address: &Address, key: &[u8]) -> Option<&StorageUpdate> {
        self.output_account(address)
            .and_then(|account| account.storage_updates.get(key))
    }

    /// Record a storage write
    pub fn set_storage_update(&mut self, address: &Address, key: &[u8], value: &[u8]) {
        let (account, _) = self.get_output_account(address);
        account.storage_updates.insert(
            key.to_vec(),
            StorageUpdate {
                offset: key.to_vec(),
                data: value.to_vec(),
            },
        );
    }

    /// Credit the recipient of a transaction with its value
    pub fn add_tx_value_to_account(&mut self, address: &Address, value: &BigInt) {
        let (account, _) = self.get_output_account(address);
        account.balance_delta += value;
    }

    /// Balance change accumulated for `address`
    pub fn balance_delta(&self, address: &Address) -> BigInt {
        self.output_account(address)
            .map(|account| account.balance_delta.clone())
            .unwrap_or_default()
    }

    /// Move `value` from `sender` to `destination`
    ///
    /// `sender_balance` is the sender's effective balance (provider balance
    /// plus the delta accumulated so far).
    pub fn transfer(
        &mut self,
        destination: &Address,
        sender: &Address,
        sender_balance: &BigInt,
        value: &BigInt,
    ) -> Result<()> {
        if value.sign() == num_bigint::Sign::Minus {
            return Err(HostError::NotEnoughFunds);
        }
        if sender_balance < value {
            return Err(HostError::NotEnoughFunds);
        }

        let (sender_account, _) = self.get_output_account(sender);
        sender_account.balance_delta -= value;
        let (destination_account, _) = self.get_output_account(destination);
        destination_account.balance_delta += value;
        Ok(())
    }

    /// Queue a transfer to be delivered outside this invocation
    pub fn add_output_transfer(&mut self, destination: &Address, transfer: OutputTransfer) {
        let (account, _) = self.get_output_account(destination);
        account.output_transfers.push(transfer);
    }

    /// Record newly deployed code
    pub fn deploy_code(
        &mut self,
        address: &Address,
        code: Vec<u8>,
        metadata: CodeMetadata,
        deployer: &Address,
    ) {
        let (account, _) = self.get_output_account(address);
        account.code = Some(code);
        account.code_metadata = Some(metadata);
        account.code_deployer = Some(*deployer);
    }

    /// Record a nonce change
    pub fn set_nonce(&mut self, address: &Address, nonce: u64) {
        let (account, _) = self.get_output_account(address);
        account.nonce = Some(nonce);
    }

    /// Charge `gas` to the account whose frame consumed it
    pub fn add_gas_used(&mut self, address: &Address, gas: u64) {
        let (account, _) = self.get_output_account(address);
        account.gas_used = account.gas_used.saturating_add(gas);
    }

    /// Final output of a successful top-level invocation
    pub fn get_vm_output(&self, gas_remaining: u64) -> VmOutput {
        let state = self.state.current();
        VmOutput {
            return_data: state.return_data.clone(),
            return_code: state.return_code,
            return_message: state.return_message.clone(),
            gas_remaining,
            output_accounts: state.output_accounts.clone(),
            logs: state.logs.clone(),
        }
    }

    /// Output of a failed top-level invocation: no deltas, no gas left
    pub fn create_vm_output_in_case_of_error(&self, err: &HostError) -> VmOutput {
        let return_message = match err {
            HostError::SignalError(message) | HostError::ContractFailed(message) => message.clone(),
            fallback @ HostError::Fallback { .. } => fallback.to_string(),
            other => other.return_code().to_string(),
        };
        VmOutput {
            return_code: err.return_code(),
            return_message,
            ..VmOutput::default()
        }
    }
}

impl StateStack for OutputContext {
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

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = [1u8; 32];
    const BOB: Address = [2u8; 32];

    #[test]
    fn test_transfer_moves_balance() {
        let mut output = OutputContext::new();
        output
            .transfer(&BOB, &ALICE, &BigInt::from(100), &BigInt::from(40))
            .unwrap();

        assert_eq!(output.balance_delta(&ALICE), BigInt::from(-40));
        assert_eq!(output.balance_delta(&BOB), BigInt::from(40));
    }

    #[test]
    fn test_transfer_insufficient_funds() {
        let mut output = OutputContext::new();
        let result = output.transfer(&BOB, &ALICE, &BigInt::from(10), &BigInt::from(40));

        assert_eq!(result, Err(HostError::NotEnoughFunds));
        assert!(output.state().output_accounts.is_empty());
    }

    #[test]
    fn test_discard_restores_exact_state() {
        let mut output = OutputContext::new();
        output.finish(b"parent".to_vec());
        output.set_storage_update(&ALICE, b"key", b"one");
        let before = output.state().clone();

        output.push_state();
        output.finish(b"child".to_vec());
        output.set_storage_update(&ALICE, b"key", b"two");
        output.write_log(BOB, b"event".to_vec(), vec![], vec![]);
        output.pop_set_active_state().unwrap();

        assert_eq!(output.state(), &before);
    }

    #[test]
    fn test_commit_keeps_child_output() {
        let mut output = OutputContext::new();
        output.push_state();
        output.finish(b"child".to_vec());
        output.pop_discard().unwrap();

        assert_eq!(output.return_data(), &[b"child".to_vec()]);
    }

    #[test]
    fn test_error_output_has_no_accounts() {
        let mut output = OutputContext::new();
        output.add_tx_value_to_account(&ALICE, &BigInt::from(5));

        let vm_output = output.create_vm_output_in_case_of_error(&HostError::NotEnoughGas);
        assert_eq!(vm_output.return_code, ReturnCode::OutOfGas);
        assert_eq!(vm_output.return_message, "out of gas");
        assert!(vm_output.output_accounts.is_empty());
        assert_eq!(vm_output.gas_remaining, 0);
    }

    #[test]
    fn test_user_error_message_preserved() {
        let output = OutputContext::new();
        let vm_output =
            output.create_vm_output_in_case_of_error(&HostError::SignalError("bad input".into()));
        assert_eq!(vm_output.return_code, ReturnCode::UserError);
        assert_eq!(vm_output.return_message, "bad input");
    }
}
