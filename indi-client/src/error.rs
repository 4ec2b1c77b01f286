use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] indi_protocol::ProtocolError),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("client is shut down")]
    Disconnected,

    #[error("timed out waiting for {device}.{vector} to settle")]
    WaitTimeout { device: String, vector: String },
}

pub type ClientResult<T> = Result<T, ClientError>;
