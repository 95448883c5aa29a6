//! Messages exchanged with the VM side
//!
//! The node sends requests and reads exactly one response per request,
//! except for `Initialize` and `Stop` which are not answered. Responses carry
//! an error string instead of their payload when the request failed.

use serde::{Deserialize, Serialize};
use vmhost::config::{GasScheduleMap, VmHostParameters};
use vmhost::types::{ContractCallInput, ContractCreateInput, VmOutput};

/// Protocol message
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    /// Build the host; sent first on every new connection
    Initialize { params: VmHostParameters },
    VersionRequest,
    VersionResponse { version: String, error: Option<String> },
    GasScheduleChangeRequest { schedule: GasScheduleMap },
    GasScheduleChangeResponse { error: Option<String> },
    ContractDeployRequest { input: ContractCreateInput },
    ContractCallRequest { input: ContractCallInput },
    /// Answer to both deploy and call requests
    ContractResponse { output: Option<VmOutput>, error: Option<String> },
    /// Make the VM side sleep before answering, to probe liveness
    DiagnoseWaitRequest { milliseconds: u64 },
    DiagnoseWaitResponse { error: Option<String> },
    /// End the serving loop
    Stop,
}

impl Message {
    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Initialize { .. } => "Initialize",
            Message::VersionRequest => "VersionRequest",
            Message::VersionResponse { .. } => "VersionResponse",
            Message::GasScheduleChangeRequest { .. } => "GasScheduleChangeRequest",
            Message::GasScheduleChangeResponse { .. } => "GasScheduleChangeResponse",
            Message::ContractDeployRequest { .. } => "ContractDeployRequest",
            Message::ContractCallRequest { .. } => "ContractCallRequest",
            Message::ContractResponse { .. } => "ContractResponse",
            Message::DiagnoseWaitRequest { .. } => "DiagnoseWaitRequest",
            Message::DiagnoseWaitResponse { .. } => "DiagnoseWaitResponse",
            Message::Stop => "Stop",
        }
    }
}
