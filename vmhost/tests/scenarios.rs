//! End-to-end invocations against the in-memory world

use num_bigint::BigInt;
use std::sync::Arc;
use vmhost::engine::{EngineFault, FaultKind};
use vmhost::hook::Account;
use vmhost::mock::{counter_contract, ContractMock, MockExecutor, MockWorld, COUNTER_CODE};
use vmhost::types::{address_from_slice, Address, CodeMetadata, OutputAccount, VmOutput};
use vmhost::vmhooks::VmHooks;
use vmhost::{
    ContractCallInput, ContractCreateInput, HostError, ReturnCode, VmExecutionHandler, VmHost,
    VmHostParameters, VmInput,
};

const OWNER: Address = [1u8; 32];
const STRANGER: Address = [9u8; 32];
const CALLER_CODE: &[u8] = b"caller";
const GAS: u64 = 100_000;

struct TestEnv {
    world: Arc<MockWorld>,
    executor: Arc<MockExecutor>,
    host: VmHost,
}

fn setup() -> TestEnv {
    setup_with(MockWorld::new(), VmHostParameters::for_tests())
}

fn setup_with(world: MockWorld, params: VmHostParameters) -> TestEnv {
    let _ = env_logger::builder().is_test(true).try_init();

    let world = Arc::new(world);
    for address in [OWNER, STRANGER] {
        world.add_account(Account {
            address,
            balance: BigInt::from(1_000_000),
            ..Account::default()
        });
    }
    let executor = Arc::new(MockExecutor::new());
    executor.register(COUNTER_CODE.to_vec(), counter_contract());
    executor.register(b"counter2".to_vec(), counter_contract());
    executor.register(CALLER_CODE.to_vec(), caller_contract());

    let host = VmHost::new(world.clone(), executor.clone(), params).unwrap();
    TestEnv { world, executor, host }
}

fn trap(message: &str) -> EngineFault {
    EngineFault::new(FaultKind::Trap, message)
}

fn destination(hooks: &mut dyn VmHooks) -> Result<Address, EngineFault> {
    let argument = hooks.get_argument(0)?;
    address_from_slice(&argument).map_err(|_| trap("bad address"))
}

/// Contract exercising nested and async calls into a counter
fn caller_contract() -> ContractMock {
    ContractMock::new()
        .with_method("asyncIncrement", |hooks| {
            let counter = destination(hooks)?;
            hooks.create_async_call(&counter, &BigInt::default(), b"increment", 5_000, Some("onDone"), 0)
        })
        .with_method("asyncFail", |hooks| {
            let counter = destination(hooks)?;
            hooks.create_async_call(&counter, &BigInt::default(), b"fail", 5_000, Some("onDone"), 0)
        })
        .with_method("asyncRejected", |hooks| {
            let counter = destination(hooks)?;
            hooks.create_async_call(&counter, &BigInt::default(), b"increment", 5_000, Some("onReject"), 0)
        })
        .with_method("onDone", |hooks| {
            let result = hooks.get_argument(1)?;
            hooks.storage_store(b"result", &result)?;
            hooks.storage_store(b"callback", b"ran")?;
            Ok(())
        })
        .with_method("onReject", |hooks| {
            hooks.storage_store(b"callback", b"ran")?;
            hooks.signal_error("callback rejects")
        })
        .with_method("nested", |hooks| {
            let counter = destination(hooks)?;
            let failed = hooks.execute_on_dest_context(5_000, &counter, &BigInt::default(), "fail", &[])?;
            hooks.finish(failed.to_string().as_bytes())?;
            let passed = hooks.execute_on_dest_context(5_000, &counter, &BigInt::default(), "increment", &[])?;
            hooks.finish(passed.to_string().as_bytes())
        })
        .with_method("legacyIncrement", |hooks| {
            let counter = destination(hooks)?;
            hooks.async_call(&counter, &BigInt::default(), b"increment")?;
            hooks.storage_store(b"after", b"unreachable")?;
            Ok(())
        })
        .with_method("callBack", |hooks| {
            let caller = hooks.get_caller()?;
            let result = hooks.get_argument(1)?;
            hooks.storage_store(b"legacy", &result)?;
            hooks.storage_store(b"answered by", &caller)?;
            Ok(())
        })
        .with_method("deployTwice", |hooks| {
            let no_value = BigInt::default();
            let first = hooks.create_contract(20_000, &no_value, COUNTER_CODE, CodeMetadata::default(), &[vec![9]])?;
            let second = hooks.create_contract(20_000, &no_value, COUNTER_CODE, CodeMetadata::default(), &[])?;
            hooks.finish(&first)?;
            hooks.finish(&second)
        })
        .with_method("deployBroken", |hooks| {
            hooks.create_contract(20_000, &BigInt::default(), b"unknown", CodeMetadata::default(), &[])?;
            hooks.storage_store(b"after", b"unreachable")?;
            Ok(())
        })
        .with_method("pay", |hooks| {
            let receiver = destination(hooks)?;
            hooks.transfer_value(&receiver, &BigInt::from(5), b"memo")
        })
        .with_method("peek", |hooks| {
            let counter = destination(hooks)?;
            let value = hooks.storage_load_from_address(&counter, b"counter")?;
            hooks.finish(&value)
        })
        .with_method("recurse", |hooks| {
            let own = hooks.get_sc_address()?;
            let gas = hooks.get_gas_left()? / 2;
            let code = hooks.execute_on_dest_context(gas, &own, &BigInt::default(), "recurse", &[])?;
            hooks.finish(code.to_string().as_bytes())
        })
        .with_method("exhaustHandles", |hooks| {
            hooks.big_int_set_unsigned_bytes(i32::MAX, &[42])?;
            hooks.big_int_new(7)?;
            hooks.storage_store(b"after", b"unreachable")?;
            Ok(())
        })
}

impl TestEnv {
    /// Deploy `code` from the owner and apply the result like a ledger would
    fn deploy(&self, code: &[u8], metadata: CodeMetadata, arguments: Vec<Vec<u8>>) -> Address {
        let output = self
            .host
            .run_smart_contract_create(&ContractCreateInput {
                vm_input: VmInput {
                    caller: OWNER,
                    arguments,
                    gas_provided: GAS,
                    ..VmInput::default()
                },
                contract_code: code.to_vec(),
                code_metadata: metadata,
            })
            .unwrap();
        assert_eq!(output.return_code, ReturnCode::Ok, "{}", output.return_message);
        self.world.update_accounts(&output);

        let mut owner = self.world.account(&OWNER).unwrap();
        owner.nonce += 1;
        self.world.add_account(owner);

        output
            .output_accounts
            .values()
            .find(|account| account.code.is_some())
            .map(|account| account.address)
            .unwrap()
    }

    fn call_from(&self, caller: Address, recipient: Address, function: &str, arguments: Vec<Vec<u8>>, gas: u64) -> VmOutput {
        let output = self
            .host
            .run_smart_contract_call(&ContractCallInput {
                vm_input: VmInput {
                    caller,
                    arguments,
                    gas_provided: gas,
                    ..VmInput::default()
                },
                recipient,
                function: function.to_string(),
            })
            .unwrap();
        assert!(output.gas_remaining <= gas);
        if output.return_code == ReturnCode::Ok {
            self.world.update_accounts(&output);
        }
        output
    }

    fn call(&self, recipient: Address, function: &str, arguments: Vec<Vec<u8>>) -> VmOutput {
        self.call_from(OWNER, recipient, function, arguments, GAS)
    }
}

fn storage_value<'a>(account: Option<&'a OutputAccount>, key: &[u8]) -> Option<&'a [u8]> {
    account
        .and_then(|account| account.storage_updates.get(key))
        .map(|update| update.data.as_slice())
}

#[test]
fn test_counter_increments() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);

    for expected in 1u8..=5 {
        let output = env.call(counter, "increment", vec![]);
        assert_eq!(output.return_code, ReturnCode::Ok);
        assert_eq!(output.return_data, vec![vec![expected]]);
    }

    let output = env.call(counter, "get", vec![]);
    assert_eq!(output.return_data, vec![vec![5]]);
    assert!(output.output_accounts[&counter].gas_used > 0);
}

#[test]
fn test_init_arguments() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![vec![41]]);
    assert_eq!(env.call(counter, "increment", vec![]).return_data, vec![vec![42]]);
}

#[test]
fn test_out_of_gas_leaves_no_trace() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call_from(OWNER, counter, "increment", vec![], 10);
    assert_eq!(output.return_code, ReturnCode::OutOfGas);
    assert!(output.output_accounts.is_empty());
    assert!(output.return_data.is_empty());
    assert_eq!(output.gas_remaining, 0);

    assert_eq!(env.call(counter, "get", vec![]).return_data, vec![Vec::<u8>::new()]);
}

#[test]
fn test_reserved_and_missing_functions() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);

    assert_eq!(env.call(counter, "init", vec![]).return_code, ReturnCode::UserError);
    assert_eq!(env.call(counter, "callBack", vec![]).return_code, ReturnCode::UserError);
    assert_eq!(env.call(counter, "missing", vec![]).return_code, ReturnCode::FunctionNotFound);
    assert_eq!(env.call(STRANGER, "get", vec![]).return_code, ReturnCode::ContractNotFound);
}

#[test]
fn test_signal_error_reaches_caller() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(counter, "fail", vec![]);
    assert_eq!(output.return_code, ReturnCode::UserError);
    assert_eq!(output.return_message, "counter failure");
    assert!(output.output_accounts.is_empty());
}

#[test]
fn test_schedule_change_reprices_calls() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);
    let before = env.call(counter, "get", vec![]);

    let mut schedule = env.host.gas_schedule().unwrap();
    schedule.get_mut("WASMOpcodeCost").unwrap().insert("Call".into(), 100);
    env.host.gas_schedule_change(&schedule).unwrap();
    assert_eq!(env.executor.call_cost(), 100);

    let after = env.call(counter, "get", vec![]);
    assert_eq!(before.gas_remaining - after.gas_remaining, 99);
    assert_eq!(before.return_data, after.return_data);

    let mut broken = schedule.clone();
    broken.remove("ElrondAPICost");
    env.host.gas_schedule_change(&broken).unwrap();
    assert_eq!(env.host.gas_schedule().unwrap(), schedule);
    assert_eq!(env.call(counter, "get", vec![]).gas_remaining, after.gas_remaining);
}

#[test]
fn test_async_callback_receives_result() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(caller, "asyncIncrement", vec![counter.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::Ok, "{}", output.return_message);
    assert_eq!(storage_value(output.output_accounts.get(&counter), b"counter"), Some(&[1u8][..]));
    assert_eq!(storage_value(output.output_accounts.get(&caller), b"result"), Some(&[1u8][..]));
    assert!(env.host.runtime_errors().unwrap().is_empty());
}

#[test]
fn test_async_callback_failure_keeps_destination_changes() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(caller, "asyncRejected", vec![counter.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::Ok);
    assert_eq!(storage_value(output.output_accounts.get(&counter), b"counter"), Some(&[1u8][..]));
    assert_eq!(storage_value(output.output_accounts.get(&caller), b"callback"), None);
    assert_eq!(
        env.host.runtime_errors().unwrap(),
        vec![HostError::SignalError("callback rejects".into())]
    );
}

#[test]
fn test_failed_destination_skips_callback() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(caller, "asyncFail", vec![counter.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::Ok);
    assert_eq!(storage_value(output.output_accounts.get(&counter), b"touched"), None);
    assert_eq!(storage_value(output.output_accounts.get(&caller), b"callback"), None);
    assert_eq!(
        env.host.runtime_errors().unwrap(),
        vec![HostError::SignalError("counter failure".into())]
    );
}

#[test]
fn test_cross_shard_async_becomes_transfer() {
    let env = setup_with(MockWorld::new().with_shards(2), VmHostParameters::for_tests());
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);
    let remote: Address = [2u8; 32];

    let output = env.call(caller, "asyncIncrement", vec![remote.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::Ok);

    let transfers = &output.output_accounts[&remote].output_transfers;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].gas_limit, 5_000);
    assert_eq!(transfers[0].data, b"increment".to_vec());
    assert_eq!(transfers[0].sender, caller);
    assert!(output.gas_remaining <= GAS - 5_000);
}

#[test]
fn test_nested_failure_discarded() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(caller, "nested", vec![counter.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::Ok);
    assert_eq!(
        output.return_data,
        vec![b"user error".to_vec(), vec![1], b"ok".to_vec()]
    );
    assert_eq!(storage_value(output.output_accounts.get(&counter), b"touched"), None);
    assert_eq!(storage_value(output.output_accounts.get(&counter), b"counter"), Some(&[1u8][..]));
}

#[test]
fn test_gas_used_within_provided() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    for (recipient, function) in [(counter, "increment"), (caller, "nested"), (caller, "asyncIncrement")] {
        let output = env.call(recipient, function, vec![counter.to_vec()]);
        let used: u64 = output.output_accounts.values().map(|account| account.gas_used).sum();
        assert!(used + output.gas_remaining <= GAS, "{function}");
    }
}

#[test]
fn test_repeated_call_is_deterministic() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);

    let input = ContractCallInput {
        vm_input: VmInput {
            caller: OWNER,
            gas_provided: GAS,
            ..VmInput::default()
        },
        recipient: counter,
        function: "increment".into(),
    };
    let first = env.host.run_smart_contract_call(&input).unwrap();
    let second = env.host.run_smart_contract_call(&input).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_allocation_fault_discards_warm_instance() {
    let params = VmHostParameters {
        use_warm_instance: true,
        ..VmHostParameters::for_tests()
    };
    let env = setup_with(MockWorld::new(), params);
    env.executor.register(
        b"fragile".to_vec(),
        ContractMock::new()
            .with_method("ping", |hooks| hooks.finish(b"pong"))
            .with_method("alloc", |_| Err(EngineFault::new(FaultKind::Allocation, "out of memory"))),
    );
    let fragile = env.deploy(b"fragile", CodeMetadata::default(), vec![]);
    assert_eq!(env.executor.instances_created(), 1);

    assert_eq!(env.call(fragile, "ping", vec![]).return_code, ReturnCode::Ok);
    assert_eq!(env.executor.instances_created(), 1);

    assert_eq!(env.call(fragile, "alloc", vec![]).return_code, ReturnCode::ExecutionFailed);
    assert_eq!(env.call(fragile, "ping", vec![]).return_data, vec![b"pong".to_vec()]);
    assert_eq!(env.executor.instances_created(), 2);
}

#[test]
fn test_upgrade_rules() {
    let env = setup();
    let upgradeable = CodeMetadata {
        upgradeable: true,
        ..CodeMetadata::default()
    };
    let counter = env.deploy(COUNTER_CODE, upgradeable, vec![vec![7]]);
    let fixed = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);
    let upgrade_args = vec![b"counter2".to_vec(), upgradeable.to_bytes().to_vec()];

    let output = env.call_from(STRANGER, counter, "upgradeContract", upgrade_args.clone(), GAS);
    assert_eq!(output.return_code, ReturnCode::UpgradeFailed);

    let output = env.call(fixed, "upgradeContract", upgrade_args.clone());
    assert_eq!(output.return_code, ReturnCode::UpgradeFailed);

    let output = env.call(counter, "upgradeContract", upgrade_args);
    assert_eq!(output.return_code, ReturnCode::Ok);
    assert_eq!(output.output_accounts[&counter].code, Some(b"counter2".to_vec()));
    assert_eq!(env.world.account(&counter).unwrap().code, b"counter2".to_vec());
    assert_eq!(env.call(counter, "get", vec![]).return_data, vec![Vec::<u8>::new()]);
}

#[test]
fn test_panicking_engine_leaves_host_usable() {
    let params = VmHostParameters {
        use_warm_instance: true,
        ..VmHostParameters::for_tests()
    };
    let env = setup_with(MockWorld::new(), params);
    env.executor.register(
        b"exploding".to_vec(),
        ContractMock::new().with_method("boom", |_| panic!("engine exploded")),
    );
    let exploding = env.deploy(b"exploding", CodeMetadata::default(), vec![]);
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(exploding, "boom", vec![]);
    assert_eq!(output.return_code, ReturnCode::ExecutionFailed);
    assert!(output.return_message.contains("engine exploded"), "{}", output.return_message);
    assert!(output.output_accounts.is_empty());
    assert_eq!(output.gas_remaining, 0);

    assert_eq!(env.call(counter, "increment", vec![]).return_data, vec![vec![1]]);
    assert_eq!(env.call(exploding, "boom", vec![]).return_code, ReturnCode::ExecutionFailed);
    assert_eq!(env.call(counter, "increment", vec![]).return_data, vec![vec![2]]);
    assert!(env.host.gas_schedule().is_ok());
}

#[test]
fn test_legacy_async_call_forwards_gas_and_calls_back() {
    let env = setup();
    let counter = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![]);
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(caller, "legacyIncrement", vec![counter.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::Ok, "{}", output.return_message);
    assert_eq!(storage_value(output.output_accounts.get(&counter), b"counter"), Some(&[1u8][..]));
    assert_eq!(storage_value(output.output_accounts.get(&caller), b"legacy"), Some(&[1u8][..]));
    assert_eq!(
        storage_value(output.output_accounts.get(&caller), b"answered by"),
        Some(&counter[..])
    );
    assert_eq!(storage_value(output.output_accounts.get(&caller), b"after"), None);
    assert!(output.gas_remaining > 0);
    assert!(env.host.runtime_errors().unwrap().is_empty());
}

#[test]
fn test_contract_deploys_contracts() {
    let env = setup();
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);
    let mut account = env.world.account(&caller).unwrap();
    account.nonce = 5;
    env.world.add_account(account);

    let output = env.call(caller, "deployTwice", vec![]);
    assert_eq!(output.return_code, ReturnCode::Ok, "{}", output.return_message);
    assert_eq!(output.return_data.len(), 2);
    let first = address_from_slice(&output.return_data[0]).unwrap();
    let second = address_from_slice(&output.return_data[1]).unwrap();
    assert_ne!(first, second);
    assert_eq!(output.output_accounts[&caller].nonce, Some(7));
    assert_eq!(output.output_accounts[&first].code, Some(COUNTER_CODE.to_vec()));
    assert_eq!(output.output_accounts[&first].code_deployer, Some(caller));

    assert_eq!(env.call(first, "get", vec![]).return_data, vec![vec![9]]);
    assert_eq!(env.call(second, "get", vec![]).return_data, vec![Vec::<u8>::new()]);
}

#[test]
fn test_failed_nested_deploy_stops_caller() {
    let env = setup();
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);
    let mut account = env.world.account(&caller).unwrap();
    account.nonce = 5;
    env.world.add_account(account);

    let output = env.call(caller, "deployBroken", vec![]);
    assert_eq!(output.return_code, ReturnCode::ExecutionFailed);
    assert_eq!(output.return_message, "invalid contract code");
    assert!(output.output_accounts.is_empty());
    assert_eq!(env.world.account(&caller).unwrap().nonce, 5);
}

#[test]
fn test_transfer_value_needs_funds() {
    let env = setup();
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(caller, "pay", vec![STRANGER.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::ExecutionFailed);
    assert_eq!(output.return_message, "not enough funds");

    let mut account = env.world.account(&caller).unwrap();
    account.balance = BigInt::from(100);
    env.world.add_account(account);

    let output = env.call(caller, "pay", vec![STRANGER.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::Ok, "{}", output.return_message);
    assert_eq!(output.output_accounts[&caller].balance_delta, BigInt::from(-5));
    assert_eq!(output.output_accounts[&STRANGER].balance_delta, BigInt::from(5));

    let transfers = &output.output_accounts[&STRANGER].output_transfers;
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].value, BigInt::from(5));
    assert_eq!(transfers[0].data, b"memo".to_vec());
    assert_eq!(transfers[0].sender, caller);
    assert_eq!(env.world.account(&STRANGER).unwrap().balance, BigInt::from(1_000_005));
}

#[test]
fn test_storage_of_other_contracts_needs_readable_flag() {
    let env = setup();
    let readable = CodeMetadata {
        readable: true,
        ..CodeMetadata::default()
    };
    let open = env.deploy(COUNTER_CODE, readable, vec![vec![3]]);
    let closed = env.deploy(COUNTER_CODE, CodeMetadata::default(), vec![vec![4]]);
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    assert_eq!(env.call(caller, "peek", vec![open.to_vec()]).return_data, vec![vec![3]]);

    let output = env.call(caller, "peek", vec![closed.to_vec()]);
    assert_eq!(output.return_code, ReturnCode::ExecutionFailed);
    assert_eq!(output.return_message, "storage of address is not readable");

    let output = env.call(caller, "peek", vec![caller.to_vec()]);
    assert_eq!(output.return_data, vec![Vec::<u8>::new()]);
}

#[test]
fn test_instance_ceiling_stops_recursion() {
    let params = VmHostParameters {
        max_instance_count: 3,
        ..VmHostParameters::for_tests()
    };
    let env = setup_with(MockWorld::new(), params);
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(caller, "recurse", vec![]);
    assert_eq!(output.return_code, ReturnCode::Ok, "{}", output.return_message);
    assert_eq!(
        output.return_data,
        vec![b"execution failed".to_vec(), b"ok".to_vec(), b"ok".to_vec()]
    );
    assert_eq!(env.host.runtime_errors().unwrap(), vec![HostError::MaxInstancesReached]);
}

#[test]
fn test_big_int_handles_never_alias() {
    let env = setup();
    let caller = env.deploy(CALLER_CODE, CodeMetadata::default(), vec![]);

    let output = env.call(caller, "exhaustHandles", vec![]);
    assert_eq!(output.return_code, ReturnCode::ExecutionFailed);
    assert_eq!(output.return_message, "no big integer handle left");
    assert!(output.output_accounts.is_empty());
}
