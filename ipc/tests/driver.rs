//! Driver and VM part connected through in-memory pipes

use num_bigint::BigInt;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use vmhost::config::{OpcodeCosts, VmHostParameters};
use vmhost::engine::Executor;
use vmhost::hook::Account;
use vmhost::mock::{counter_contract, MockExecutor, MockWorld, COUNTER_CODE};
use vmhost::types::{ContractCallInput, ContractCreateInput, ReturnCode, VmInput};
use vmhost::VmExecutionHandler;
use vmhost_ipc::{read_message, Connector, IpcError, Result, VmDriver, VmPart};

const OWNER: [u8; 32] = [1u8; 32];

struct PipeWriter(Sender<Vec<u8>>);

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .send(buf.to_vec())
            .map_err(|_| io::Error::from(io::ErrorKind::BrokenPipe))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct PipeReader {
    receiver: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    position: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.position == self.chunk.len() {
            match self.receiver.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.position = 0;
                }
                Err(_) => return Ok(0),
            }
        }
        let len = buf.len().min(self.chunk.len() - self.position);
        buf[..len].copy_from_slice(&self.chunk[self.position..self.position + len]);
        self.position += len;
        Ok(len)
    }
}

fn pipe() -> (PipeWriter, PipeReader) {
    let (sender, receiver) = channel();
    (
        PipeWriter(sender),
        PipeReader {
            receiver,
            chunk: Vec::new(),
            position: 0,
        },
    )
}

/// Runs the VM part on a thread; can be told to crash on the next connection
struct ThreadConnector {
    world: Arc<MockWorld>,
    executor: Arc<MockExecutor>,
    connections: Arc<AtomicUsize>,
    crash_next: Arc<AtomicBool>,
    crashed_requests: Arc<AtomicUsize>,
    handle: Option<JoinHandle<()>>,
}

impl Connector for ThreadConnector {
    type Reader = PipeReader;
    type Writer = PipeWriter;

    fn connect(&mut self) -> Result<(PipeReader, PipeWriter)> {
        let (to_vm, vm_in) = pipe();
        let (vm_out, from_vm) = pipe();
        self.connections.fetch_add(1, Ordering::SeqCst);

        let handle = if self.crash_next.swap(false, Ordering::SeqCst) {
            let crashed_requests = Arc::clone(&self.crashed_requests);
            std::thread::spawn(move || {
                let mut vm_in = vm_in;
                let _initialize = read_message(&mut vm_in);
                if let Ok(Some(_)) = read_message(&mut vm_in) {
                    crashed_requests.fetch_add(1, Ordering::SeqCst);
                }
                drop(vm_out);
            })
        } else {
            let world = Arc::clone(&self.world);
            let executor = Arc::clone(&self.executor);
            std::thread::spawn(move || {
                let mut part = VmPart::new(vm_in, vm_out, world, executor);
                if let Err(err) = part.start_loop() {
                    log::error!("vm part failed: {}", err);
                }
            })
        };
        self.handle = Some(handle);
        Ok((from_vm, to_vm))
    }

    fn is_alive(&mut self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }
}

struct TestEnv {
    world: Arc<MockWorld>,
    executor: Arc<MockExecutor>,
    connections: Arc<AtomicUsize>,
    crash_next: Arc<AtomicBool>,
    crashed_requests: Arc<AtomicUsize>,
    driver: VmDriver<ThreadConnector>,
}

fn setup(params: VmHostParameters) -> TestEnv {
    let _ = env_logger::builder().is_test(true).try_init();

    let world = Arc::new(MockWorld::new());
    world.add_account(Account {
        address: OWNER,
        balance: BigInt::from(1_000),
        ..Account::default()
    });
    let executor = Arc::new(MockExecutor::new());
    executor.register(COUNTER_CODE.to_vec(), counter_contract());

    let connections = Arc::new(AtomicUsize::new(0));
    let crash_next = Arc::new(AtomicBool::new(false));
    let crashed_requests = Arc::new(AtomicUsize::new(0));
    let connector = ThreadConnector {
        world: Arc::clone(&world),
        executor: Arc::clone(&executor),
        connections: Arc::clone(&connections),
        crash_next: Arc::clone(&crash_next),
        crashed_requests: Arc::clone(&crashed_requests),
        handle: None,
    };

    TestEnv {
        world,
        executor,
        connections,
        crash_next,
        crashed_requests,
        driver: VmDriver::new(connector, params),
    }
}

#[test]
fn test_version_over_one_connection() {
    let env = setup(VmHostParameters::for_tests());

    assert!(env.driver.get_version().unwrap().starts_with("vmhost v"));
    assert!(env.driver.get_version().is_ok());
    assert_eq!(env.connections.load(Ordering::SeqCst), 1);
    assert_eq!(env.driver.restarts().unwrap(), 0);
}

#[test]
fn test_contract_invocations() {
    let env = setup(VmHostParameters::for_tests());

    let output = env
        .driver
        .run_smart_contract_create(&ContractCreateInput {
            vm_input: VmInput {
                caller: OWNER,
                gas_provided: 100_000,
                ..VmInput::default()
            },
            contract_code: COUNTER_CODE.to_vec(),
            ..ContractCreateInput::default()
        })
        .unwrap();
    assert_eq!(output.return_code, ReturnCode::Ok);
    env.world.update_accounts(&output);
    let counter = output
        .output_accounts
        .values()
        .find(|account| account.code.is_some())
        .map(|account| account.address)
        .unwrap();

    let output = env
        .driver
        .run_smart_contract_call(&ContractCallInput {
            vm_input: VmInput {
                caller: OWNER,
                gas_provided: 100_000,
                ..VmInput::default()
            },
            recipient: counter,
            function: "increment".into(),
        })
        .unwrap();
    assert_eq!(output.return_code, ReturnCode::Ok);
    assert_eq!(output.return_data, vec![vec![1]]);
}

#[test]
fn test_transport_failure_is_critical_and_not_replayed() {
    let env = setup(VmHostParameters::for_tests());
    env.crash_next.store(true, Ordering::SeqCst);

    assert!(matches!(env.driver.get_version(), Err(IpcError::Critical(_))));
    assert_eq!(env.crashed_requests.load(Ordering::SeqCst), 1);

    assert!(env.driver.get_version().is_ok());
    assert_eq!(env.connections.load(Ordering::SeqCst), 2);
    assert_eq!(env.crashed_requests.load(Ordering::SeqCst), 1);
}

#[test]
fn test_schedule_survives_reconnect() {
    let env = setup(VmHostParameters::for_tests());

    let mut schedule = VmHostParameters::for_tests().gas_schedule;
    schedule.get_mut("WASMOpcodeCost").unwrap().insert("Call".into(), 100);
    env.driver.gas_schedule_change(&schedule).unwrap();
    assert_eq!(env.executor.call_cost(), 100);

    env.driver.stop().unwrap();
    let mut costs = OpcodeCosts::new();
    costs.insert("Call".into(), 1);
    env.executor.set_opcode_costs(&costs);

    assert!(env.driver.get_version().is_ok());
    assert_eq!(env.connections.load(Ordering::SeqCst), 2);
    assert_eq!(env.executor.call_cost(), 100);
}

#[test]
fn test_remote_errors_are_reported() {
    let params = VmHostParameters {
        vm_type: Vec::new(),
        ..VmHostParameters::for_tests()
    };
    let env = setup(params);

    assert!(matches!(env.driver.get_version(), Err(IpcError::Remote(_))));
    assert!(matches!(env.driver.diagnose_wait(1), Ok(())));
}

#[test]
fn test_rejected_schedule_not_used_on_restart() {
    let env = setup(VmHostParameters::for_tests());

    let mut broken = VmHostParameters::for_tests().gas_schedule;
    broken.remove("ElrondAPICost");
    env.driver.gas_schedule_change(&broken).unwrap();
    assert!(env.driver.get_version().is_ok());

    env.driver.stop().unwrap();
    assert!(env.driver.get_version().unwrap().starts_with("vmhost v"));
    assert_eq!(env.connections.load(Ordering::SeqCst), 2);
}
