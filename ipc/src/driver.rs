//! Node side of the pipe
//!
//! [`VmDriver`] implements [`VmExecutionHandler`] by forwarding every request
//! to a VM host behind a [`Connector`]. One request is in flight at a time.
//! Before each request a closed connection is reopened and initialized; when
//! the transport fails mid-request the connection is closed and the request
//! fails with [`IpcError::Critical`]. Requests are never replayed.

use crate::codec::{read_message, write_message};
use crate::error::{IpcError, Result};
use crate::message::Message;
use log::{debug, error, info, warn};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use vmhost::config::{create_gas_config, GasScheduleMap, VmHostParameters};
use vmhost::types::{ContractCallInput, ContractCreateInput, VmOutput};
use vmhost::VmExecutionHandler;

/// Opens pipes to a VM side
pub trait Connector: Send {
    /// Stream the responses are read from
    type Reader: Read + Send;
    /// Stream the requests are written to
    type Writer: Write + Send;

    /// Open a fresh connection, replacing any previous one
    fn connect(&mut self) -> Result<(Self::Reader, Self::Writer)>;

    /// Whether the VM side of the last connection is still running
    fn is_alive(&mut self) -> bool {
        true
    }

    /// Tear the VM side down
    fn shutdown(&mut self) {}
}

struct Connection<R, W> {
    reader: R,
    writer: W,
}

struct DriverState<C: Connector> {
    connector: C,
    connection: Option<Connection<C::Reader, C::Writer>>,
    params: VmHostParameters,
    restarts: u64,
}

impl<C: Connector> DriverState<C> {
    fn ensure_connected(&mut self) -> Result<()> {
        if self.connection.is_some() && self.connector.is_alive() {
            return Ok(());
        }
        if self.connection.take().is_some() {
            warn!("vm part is gone, restarting");
            self.restarts = self.restarts.saturating_add(1);
        }

        let (reader, mut writer) = self.connector.connect()?;
        write_message(
            &mut writer,
            &Message::Initialize {
                params: self.params.clone(),
            },
        )?;
        self.connection = Some(Connection { reader, writer });
        info!("vm part connected");
        Ok(())
    }

    fn exchange(&mut self, request: &Message) -> Result<Message> {
        let connection = self.connection.as_mut().ok_or(IpcError::Closed)?;
        write_message(&mut connection.writer, request)?;
        read_message(&mut connection.reader)?.ok_or(IpcError::Closed)
    }
}

/// Invocation API served by an isolated VM host
pub struct VmDriver<C: Connector> {
    state: Mutex<DriverState<C>>,
}

impl<C: Connector> VmDriver<C> {
    /// Driver that builds remote hosts from `params`
    ///
    /// No connection is opened until the first request.
    pub fn new(connector: C, params: VmHostParameters) -> Self {
        Self {
            state: Mutex::new(DriverState {
                connector,
                connection: None,
                params,
                restarts: 0,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DriverState<C>>> {
        self.state
            .lock()
            .map_err(|err| IpcError::Critical(format!("driver state poisoned: {}", err)))
    }

    fn send_request(&self, request: Message) -> Result<Message> {
        let mut state = self.lock()?;
        state.ensure_connected()?;
        debug!("driver: {}", request.kind());

        match state.exchange(&request) {
            Ok(response) => Ok(response),
            Err(err) => {
                error!("driver: {} lost: {}", request.kind(), err);
                state.connection = None;
                state.connector.shutdown();
                Err(IpcError::Critical(format!("{}: {}", request.kind(), err)))
            }
        }
    }

    /// Ask the VM side to sleep for `milliseconds` before answering
    pub fn diagnose_wait(&self, milliseconds: u64) -> Result<()> {
        match self.send_request(Message::DiagnoseWaitRequest { milliseconds })? {
            Message::DiagnoseWaitResponse { error: None } => Ok(()),
            Message::DiagnoseWaitResponse { error: Some(error) } => Err(IpcError::Remote(error)),
            other => Err(IpcError::UnexpectedMessage(other.kind().to_string())),
        }
    }

    /// Number of times a lost VM side was replaced
    pub fn restarts(&self) -> Result<u64> {
        Ok(self.lock()?.restarts)
    }

    /// Stop the VM side and close the connection
    pub fn stop(&self) -> Result<()> {
        let mut state = self.lock()?;
        if let Some(mut connection) = state.connection.take() {
            if let Err(err) = write_message(&mut connection.writer, &Message::Stop) {
                warn!("driver: stop not delivered: {}", err);
            }
        }
        state.connector.shutdown();
        Ok(())
    }

    fn contract_request(&self, request: Message) -> Result<VmOutput> {
        match self.send_request(request)? {
            Message::ContractResponse { output: Some(output), .. } => Ok(output),
            Message::ContractResponse { error, .. } => {
                Err(IpcError::Remote(error.unwrap_or_else(|| "missing output".to_string())))
            }
            other => Err(IpcError::UnexpectedMessage(other.kind().to_string())),
        }
    }
}

impl<C: Connector> VmExecutionHandler for VmDriver<C> {
    type Error = IpcError;

    fn get_version(&self) -> Result<String> {
        match self.send_request(Message::VersionRequest)? {
            Message::VersionResponse { version, error: None } => Ok(version),
            Message::VersionResponse { error: Some(error), .. } => Err(IpcError::Remote(error)),
            other => Err(IpcError::UnexpectedMessage(other.kind().to_string())),
        }
    }

    /// Forward the schedule; a valid one also seeds restarted hosts
    ///
    /// The VM side keeps its previous schedule when the new one is invalid,
    /// so an invalid schedule is never remembered for restarts either.
    fn gas_schedule_change(&self, schedule: &GasScheduleMap) -> Result<()> {
        let request = Message::GasScheduleChangeRequest {
            schedule: schedule.clone(),
        };
        match self.send_request(request)? {
            Message::GasScheduleChangeResponse { error: None } => {
                match create_gas_config(schedule) {
                    Ok(_) => self.lock()?.params.gas_schedule = schedule.clone(),
                    Err(err) => warn!("schedule rejected, restarts keep the previous one: {}", err),
                }
                Ok(())
            }
            Message::GasScheduleChangeResponse { error: Some(error) } => Err(IpcError::Remote(error)),
            other => Err(IpcError::UnexpectedMessage(other.kind().to_string())),
        }
    }

    fn run_smart_contract_create(&self, input: &ContractCreateInput) -> Result<VmOutput> {
        self.contract_request(Message::ContractDeployRequest { input: input.clone() })
    }

    fn run_smart_contract_call(&self, input: &ContractCallInput) -> Result<VmOutput> {
        self.contract_request(Message::ContractCallRequest { input: input.clone() })
    }
}

/// Runs the VM side as a child process talking over stdin/stdout
pub struct ProcessConnector {
    program: PathBuf,
    args: Vec<String>,
    child: Option<Child>,
}

impl ProcessConnector {
    /// Spawn `program` with `args` on each connection
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            child: None,
        }
    }
}

impl Connector for ProcessConnector {
    type Reader = ChildStdout;
    type Writer = ChildStdin;

    fn connect(&mut self) -> Result<(ChildStdout, ChildStdin)> {
        self.shutdown();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdin = child.stdin.take().ok_or(IpcError::Closed)?;
        let stdout = child.stdout.take().ok_or(IpcError::Closed)?;
        info!("spawned vm part {} (pid {})", self.program.display(), child.id());

        self.child = Some(child);
        Ok((stdout, stdin))
    }

    fn is_alive(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill() {
                debug!("vm part already exited: {}", err);
            }
            if let Err(err) = child.wait() {
                warn!("cannot reap vm part: {}", err);
            }
        }
    }
}

impl Drop for ProcessConnector {
    fn drop(&mut self) {
        self.shutdown();
    }
}
