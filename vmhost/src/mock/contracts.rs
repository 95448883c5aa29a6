//! Ready-made scripted contracts

use super::ContractMock;
use crate::contexts::bigint::Handle;
use crate::engine::EngineFault;
use crate::vmhooks::VmHooks;

/// Code bytes the counter is usually registered under
pub const COUNTER_CODE: &[u8] = b"counter";

const COUNTER_KEY: &[u8] = b"counter";

fn load_counter(hooks: &mut dyn VmHooks) -> Result<Handle, EngineFault> {
    let counter = hooks.big_int_new(0)?;
    hooks.big_int_storage_load_unsigned(COUNTER_KEY, counter)?;
    Ok(counter)
}

/// Counter kept in storage as an unsigned big number
///
/// * `init` - starts from the optional first argument
/// * `increment` - adds one and returns the new value
/// * `get` - returns the current value
/// * `fail` - signals an error after touching storage
pub fn counter_contract() -> ContractMock {
    ContractMock::new()
        .with_method("init", |hooks| {
            let counter = hooks.big_int_new(0)?;
            if hooks.get_num_arguments()? > 0 {
                let start = hooks.get_argument(0)?;
                hooks.big_int_set_unsigned_bytes(counter, &start)?;
            }
            hooks.big_int_storage_store_unsigned(COUNTER_KEY, counter)?;
            Ok(())
        })
        .with_method("increment", |hooks| {
            let counter = load_counter(hooks)?;
            let one = hooks.big_int_new(1)?;
            hooks.big_int_add(counter, counter, one)?;
            hooks.big_int_storage_store_unsigned(COUNTER_KEY, counter)?;
            hooks.big_int_finish_unsigned(counter)
        })
        .with_method("get", |hooks| {
            let counter = load_counter(hooks)?;
            hooks.big_int_finish_unsigned(counter)
        })
        .with_method("fail", |hooks| {
            hooks.storage_store(b"touched", b"yes")?;
            hooks.signal_error("counter failure")
        })
}
