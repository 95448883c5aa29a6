//! VM side of the pipe
//!
//! [`VmPart`] owns a [`VmHost`] and serves requests read from one stream,
//! writing responses to another, until `Stop` or the end of the stream.

use crate::codec::{read_message, write_message};
use crate::error::{IpcError, Result};
use crate::message::Message;
use log::{debug, error, info};
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;
use vmhost::engine::Executor;
use vmhost::hook::BlockchainHook;
use vmhost::{VmExecutionHandler, VmHost};

/// Serving loop around a host
pub struct VmPart<R, W> {
    reader: R,
    writer: W,
    hook: Arc<dyn BlockchainHook>,
    executor: Arc<dyn Executor>,
    host: std::result::Result<VmHost, String>,
}

impl<R: Read, W: Write> VmPart<R, W> {
    /// Serve on `reader`/`writer`; the host is built on `Initialize`
    pub fn new(reader: R, writer: W, hook: Arc<dyn BlockchainHook>, executor: Arc<dyn Executor>) -> Self {
        Self {
            reader,
            writer,
            hook,
            executor,
            host: Err("host not initialized".to_string()),
        }
    }

    /// Read and answer requests until `Stop` or end of stream
    ///
    /// # Errors
    /// Transport failures and messages that are not requests
    pub fn start_loop(&mut self) -> Result<()> {
        loop {
            let Some(request) = read_message(&mut self.reader)? else {
                info!("vm part: end of stream");
                return Ok(());
            };
            debug!("vm part: {}", request.kind());

            let response = match request {
                Message::Stop => {
                    info!("vm part: stop requested");
                    return Ok(());
                }
                Message::Initialize { params } => {
                    self.host = VmHost::new(Arc::clone(&self.hook), Arc::clone(&self.executor), params)
                        .map_err(|err| {
                            error!("vm part: cannot build host: {}", err);
                            err.to_string()
                        });
                    continue;
                }
                request => self.handle(request)?,
            };
            write_message(&mut self.writer, &response)?;
        }
    }

    fn handle(&self, request: Message) -> Result<Message> {
        let host = self.host.as_ref();
        let response = match request {
            Message::VersionRequest => match host.map(|host| host.get_version()) {
                Ok(Ok(version)) => Message::VersionResponse { version, error: None },
                Ok(Err(err)) => Message::VersionResponse {
                    version: String::new(),
                    error: Some(err.to_string()),
                },
                Err(err) => Message::VersionResponse {
                    version: String::new(),
                    error: Some(err.clone()),
                },
            },
            Message::GasScheduleChangeRequest { schedule } => {
                let error = match host {
                    Ok(host) => host.gas_schedule_change(&schedule).err().map(|err| err.to_string()),
                    Err(err) => Some(err.clone()),
                };
                Message::GasScheduleChangeResponse { error }
            }
            Message::ContractDeployRequest { input } => {
                contract_response(host.map(|host| host.run_smart_contract_create(&input)))
            }
            Message::ContractCallRequest { input } => {
                contract_response(host.map(|host| host.run_smart_contract_call(&input)))
            }
            Message::DiagnoseWaitRequest { milliseconds } => {
                std::thread::sleep(Duration::from_millis(milliseconds));
                Message::DiagnoseWaitResponse { error: None }
            }
            other => return Err(IpcError::UnexpectedMessage(other.kind().to_string())),
        };
        Ok(response)
    }
}

fn contract_response(
    result: std::result::Result<vmhost::Result<vmhost::VmOutput>, &String>,
) -> Message {
    match result {
        Ok(Ok(output)) => Message::ContractResponse {
            output: Some(output),
            error: None,
        },
        Ok(Err(err)) => Message::ContractResponse {
            output: None,
            error: Some(err.to_string()),
        },
        Err(err) => Message::ContractResponse {
            output: None,
            error: Some(err.clone()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use vmhost::config::VmHostParameters;
    use vmhost::mock::{MockExecutor, MockWorld};

    fn serve(requests: &[Message]) -> (Result<()>, Vec<Message>) {
        let mut input = Vec::new();
        for request in requests {
            write_message(&mut input, request).unwrap();
        }

        let mut output = Vec::new();
        let result = {
            let mut part = VmPart::new(
                Cursor::new(input),
                &mut output,
                Arc::new(MockWorld::new()),
                Arc::new(MockExecutor::new()),
            );
            part.start_loop()
        };

        let mut reader = Cursor::new(output);
        let mut responses = Vec::new();
        while let Some(message) = read_message(&mut reader).unwrap() {
            responses.push(message);
        }
        (result, responses)
    }

    #[test]
    fn test_requests_before_initialize_fail() {
        let (result, responses) = serve(&[Message::VersionRequest]);
        assert!(result.is_ok());
        assert!(matches!(
            &responses[..],
            [Message::VersionResponse { error: Some(_), .. }]
        ));
    }

    #[test]
    fn test_serves_until_stop() {
        let (result, responses) = serve(&[
            Message::Initialize {
                params: VmHostParameters::for_tests(),
            },
            Message::VersionRequest,
            Message::DiagnoseWaitRequest { milliseconds: 1 },
            Message::Stop,
            Message::VersionRequest,
        ]);

        assert!(result.is_ok());
        assert_eq!(responses.len(), 2);
        assert!(matches!(
            &responses[0],
            Message::VersionResponse { version, error: None } if version.starts_with("vmhost v")
        ));
        assert_eq!(responses[1], Message::DiagnoseWaitResponse { error: None });
    }

    #[test]
    fn test_response_as_request_rejected() {
        let (result, responses) = serve(&[Message::DiagnoseWaitResponse { error: None }]);
        assert!(matches!(result, Err(IpcError::UnexpectedMessage(_))));
        assert!(responses.is_empty());
    }
}
