//! Big-number hooks
//!
//! Contracts keep arbitrary-precision integers in the register bank and refer
//! to them by handle. Arithmetic writes its result into a destination handle,
//! which may alias an operand.

use super::HookResult;
use crate::contexts::bigint::{from_unsigned_bytes, unsigned_bytes, Handle};
use crate::contexts::storage::StorageStatus;
use crate::host::HostCore;
use crate::types::Address;
use crate::vmhooks::{BalanceHooks, StorageHooks};
use num_bigint::BigInt;
use std::cmp::Ordering;

/// Big-number register operations
pub trait BigIntHooks {
    /// New register holding `value`
    fn big_int_new(&mut self, value: i64) -> HookResult<Handle>;

    /// Load unsigned big-endian `bytes` into `handle`
    fn big_int_set_unsigned_bytes(&mut self, handle: Handle, bytes: &[u8]) -> HookResult<()>;

    /// Unsigned big-endian form of `handle`
    fn big_int_get_unsigned_bytes(&mut self, handle: Handle) -> HookResult<Vec<u8>>;

    /// Two's complement big-endian form of `handle`
    fn big_int_get_signed_bytes(&mut self, handle: Handle) -> HookResult<Vec<u8>>;

    /// `destination = left + right`
    fn big_int_add(&mut self, destination: Handle, left: Handle, right: Handle) -> HookResult<()>;

    /// `destination = left - right`
    fn big_int_sub(&mut self, destination: Handle, left: Handle, right: Handle) -> HookResult<()>;

    /// `destination = left * right`
    fn big_int_mul(&mut self, destination: Handle, left: Handle, right: Handle) -> HookResult<()>;

    /// -1, 0 or 1 as `left` is less than, equal to or greater than `right`
    fn big_int_cmp(&mut self, left: Handle, right: Handle) -> HookResult<i32>;

    /// Append the unsigned form of `handle` to the return data
    fn big_int_finish_unsigned(&mut self, handle: Handle) -> HookResult<()>;

    /// Store the unsigned form of `handle` under `key`
    fn big_int_storage_store_unsigned(&mut self, key: &[u8], handle: Handle) -> HookResult<StorageStatus>;

    /// Load `key` into `handle`; returns the stored length
    fn big_int_storage_load_unsigned(&mut self, key: &[u8], handle: Handle) -> HookResult<usize>;

    /// Load the call value into `handle`
    fn big_int_get_call_value(&mut self, handle: Handle) -> HookResult<()>;

    /// Load the balance of `address` into `handle`
    fn big_int_get_external_balance(&mut self, address: &Address, handle: Handle) -> HookResult<()>;
}

impl HostCore {
    fn big_int_binary(
        &mut self,
        cost: u64,
        destination: Handle,
        left: Handle,
        right: Handle,
        operation: fn(BigInt, BigInt) -> BigInt,
    ) -> HookResult<()> {
        self.charge(cost)?;
        let (left, right) = self.bigint.get_two(left, right);
        self.bigint.set(destination, operation(left, right));
        Ok(())
    }
}

impl BigIntHooks for HostCore {
    fn big_int_new(&mut self, value: i64) -> HookResult<Handle> {
        self.charge(self.metering.gas_cost().big_int_api_cost.big_int_new)?;
        self.bigint
            .put(BigInt::from(value))
            .map_err(|err| self.breakpoint_from(err))
    }

    fn big_int_set_unsigned_bytes(&mut self, handle: Handle, bytes: &[u8]) -> HookResult<()> {
        let cost = self.metering.gas_cost().big_int_api_cost.big_int_set_unsigned_bytes;
        let per_byte = self.metering.gas_cost().base_operation_cost.data_copy_per_byte;
        self.charge_with_data(cost, per_byte, bytes.len())?;
        self.bigint.set(handle, from_unsigned_bytes(bytes));
        Ok(())
    }

    fn big_int_get_unsigned_bytes(&mut self, handle: Handle) -> HookResult<Vec<u8>> {
        let bytes = unsigned_bytes(self.bigint.get_one(handle));
        let cost = self.metering.gas_cost().big_int_api_cost.big_int_get_unsigned_bytes;
        let per_byte = self.metering.gas_cost().base_operation_cost.data_copy_per_byte;
        self.charge_with_data(cost, per_byte, bytes.len())?;
        Ok(bytes)
    }

    fn big_int_get_signed_bytes(&mut self, handle: Handle) -> HookResult<Vec<u8>> {
        let bytes = self.bigint.get_one(handle).to_signed_bytes_be();
        let cost = self.metering.gas_cost().big_int_api_cost.big_int_get_signed_bytes;
        let per_byte = self.metering.gas_cost().base_operation_cost.data_copy_per_byte;
        self.charge_with_data(cost, per_byte, bytes.len())?;
        Ok(bytes)
    }

    fn big_int_add(&mut self, destination: Handle, left: Handle, right: Handle) -> HookResult<()> {
        let cost = self.metering.gas_cost().big_int_api_cost.big_int_add;
        self.big_int_binary(cost, destination, left, right, |a, b| a + b)
    }

    fn big_int_sub(&mut self, destination: Handle, left: Handle, right: Handle) -> HookResult<()> {
        let cost = self.metering.gas_cost().big_int_api_cost.big_int_sub;
        self.big_int_binary(cost, destination, left, right, |a, b| a - b)
    }

    fn big_int_mul(&mut self, destination: Handle, left: Handle, right: Handle) -> HookResult<()> {
        let cost = self.metering.gas_cost().big_int_api_cost.big_int_mul;
        self.big_int_binary(cost, destination, left, right, |a, b| a * b)
    }

    fn big_int_cmp(&mut self, left: Handle, right: Handle) -> HookResult<i32> {
        self.charge(self.metering.gas_cost().big_int_api_cost.big_int_cmp)?;
        let (left, right) = self.bigint.get_two(left, right);
        Ok(match left.cmp(&right) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        })
    }

    fn big_int_finish_unsigned(&mut self, handle: Handle) -> HookResult<()> {
        let bytes = unsigned_bytes(self.bigint.get_one(handle));
        let cost = self.metering.gas_cost().big_int_api_cost.big_int_finish;
        let per_byte = self.metering.gas_cost().base_operation_cost.data_copy_per_byte;
        self.charge_with_data(cost, per_byte, bytes.len())?;
        self.output.finish(bytes);
        Ok(())
    }

    fn big_int_storage_store_unsigned(&mut self, key: &[u8], handle: Handle) -> HookResult<StorageStatus> {
        self.charge(self.metering.gas_cost().big_int_api_cost.big_int_storage_store)?;
        let bytes = unsigned_bytes(self.bigint.get_one(handle));
        self.storage_store(key, &bytes)
    }

    fn big_int_storage_load_unsigned(&mut self, key: &[u8], handle: Handle) -> HookResult<usize> {
        self.charge(self.metering.gas_cost().big_int_api_cost.big_int_storage_load)?;
        let bytes = self.storage_load(key)?;
        self.bigint.set(handle, from_unsigned_bytes(&bytes));
        Ok(bytes.len())
    }

    fn big_int_get_call_value(&mut self, handle: Handle) -> HookResult<()> {
        self.charge(self.metering.gas_cost().big_int_api_cost.big_int_get_call_value)?;
        let value = self.runtime.input().vm_input.call_value.clone();
        self.bigint.set(handle, value);
        Ok(())
    }

    fn big_int_get_external_balance(&mut self, address: &Address, handle: Handle) -> HookResult<()> {
        self.charge(self.metering.gas_cost().big_int_api_cost.big_int_get_external_balance)?;
        let balance = self.get_external_balance(address)?;
        self.bigint.set(handle, balance);
        Ok(())
    }
}
