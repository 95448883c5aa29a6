//! Demo runner for the VM host
//!
//! * no argument: deploy a counter in-process and increment it
//! * `serve`: run a VM part on stdin/stdout
//! * `isolated`: spawn this binary with `serve` and deploy through the pipe

use anyhow::{bail, Context};
use log::info;
use num_bigint::BigInt;
use std::sync::Arc;
use vmhost::config::VmHostParameters;
use vmhost::hook::Account;
use vmhost::mock::{counter_contract, MockExecutor, MockWorld, COUNTER_CODE};
use vmhost::types::{Address, ContractCallInput, ContractCreateInput, ReturnCode, VmInput, VmOutput};
use vmhost::{VmExecutionHandler, VmHost};
use vmhost_ipc::{ProcessConnector, VmDriver, VmPart};

const OWNER: Address = [1u8; 32];
const GAS: u64 = 1_000_000;

fn mock_world() -> (Arc<MockWorld>, Arc<MockExecutor>) {
    let world = Arc::new(MockWorld::new());
    world.add_account(Account {
        address: OWNER,
        balance: BigInt::from(1_000_000),
        ..Account::default()
    });
    let executor = Arc::new(MockExecutor::new());
    executor.register(COUNTER_CODE.to_vec(), counter_contract());
    (world, executor)
}

fn deploy_counter<H>(host: &H) -> anyhow::Result<VmOutput>
where
    H: VmExecutionHandler,
    H::Error: Send + Sync + 'static,
{
    let output = host.run_smart_contract_create(&ContractCreateInput {
        vm_input: VmInput {
            caller: OWNER,
            gas_provided: GAS,
            ..VmInput::default()
        },
        contract_code: COUNTER_CODE.to_vec(),
        ..ContractCreateInput::default()
    })?;
    if output.return_code != ReturnCode::Ok {
        bail!("deploy failed: {}", output.return_message);
    }
    Ok(output)
}

fn deployed_address(output: &VmOutput) -> anyhow::Result<Address> {
    output
        .output_accounts
        .values()
        .find(|account| account.code.is_some())
        .map(|account| account.address)
        .context("deploy output holds no code")
}

fn run_in_process() -> anyhow::Result<()> {
    println!("=== VM Host - Counter Demo ===\n");

    println!("1. Building host...");
    let (world, executor) = mock_world();
    let host = VmHost::new(world.clone(), executor, VmHostParameters::for_tests())?;
    println!("   ✓ {}\n", host.get_version()?);

    println!("2. Deploying counter...");
    let output = deploy_counter(&host)?;
    world.update_accounts(&output);
    let counter = deployed_address(&output)?;
    println!("   ✓ Deployed at {}\n", hex::encode(counter));

    println!("3. Incrementing...");
    for _ in 0..3 {
        let output = host.run_smart_contract_call(&ContractCallInput {
            vm_input: VmInput {
                caller: OWNER,
                gas_provided: GAS,
                ..VmInput::default()
            },
            recipient: counter,
            function: "increment".into(),
        })?;
        if output.return_code != ReturnCode::Ok {
            bail!("increment failed: {}", output.return_message);
        }
        world.update_accounts(&output);
        let value = output.return_data.first().map(|data| BigInt::from_bytes_be(num_bigint::Sign::Plus, data));
        println!(
            "   ✓ counter = {}, gas remaining {}",
            value.unwrap_or_default(),
            output.gas_remaining
        );
    }
    Ok(())
}

fn serve() -> anyhow::Result<()> {
    let (world, executor) = mock_world();
    let mut part = VmPart::new(std::io::stdin().lock(), std::io::stdout().lock(), world, executor);
    part.start_loop().context("vm part loop")?;
    info!("vm part finished");
    Ok(())
}

fn run_isolated() -> anyhow::Result<()> {
    println!("=== VM Host - Isolated Demo ===\n");

    let program = std::env::current_exe().context("locating test-runner binary")?;
    let driver = VmDriver::new(
        ProcessConnector::new(program, vec!["serve".to_string()]),
        VmHostParameters::for_tests(),
    );

    println!("1. Querying version...");
    println!("   ✓ {}\n", driver.get_version()?);

    println!("2. Deploying counter...");
    let output = deploy_counter(&driver)?;
    println!("   ✓ Deployed at {}\n", hex::encode(deployed_address(&output)?));

    println!("3. Probing liveness...");
    driver.diagnose_wait(10)?;
    println!("   ✓ VM part answered\n");

    driver.stop()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    match std::env::args().nth(1).as_deref() {
        None => run_in_process(),
        Some("serve") => serve(),
        Some("isolated") => run_isolated(),
        Some(other) => bail!("unknown mode {other}, expected serve or isolated"),
    }
}
