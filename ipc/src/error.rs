//! Error types for the IPC layer

use thiserror::Error;

/// Result type for IPC operations
pub type Result<T> = std::result::Result<T, IpcError>;

/// Errors raised while talking to an isolated VM host
#[derive(Debug, Error)]
pub enum IpcError {
    /// Pipe read or write failed
    #[error("pipe i/o: {0}")]
    Io(#[from] std::io::Error),

    /// Payload could not be encoded or decoded
    #[error("codec: {0}")]
    Codec(#[from] bincode::Error),

    /// Frame length above the accepted maximum
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    /// The other side closed the pipe
    #[error("connection closed")]
    Closed,

    /// A message arrived that the protocol does not allow at this point
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// The VM side answered with an error
    #[error("vm host: {0}")]
    Remote(String),

    /// The in-flight request was lost with the connection
    #[error("critical: {0}")]
    Critical(String),
}
