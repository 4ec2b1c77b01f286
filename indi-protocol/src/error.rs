use thiserror::Error;

/// Errors surfaced by the protocol layer.
///
/// Parse failures on inbound wire data are deliberately *not* represented
/// here: malformed or unrecognized tags are skipped by the codec so that a
/// misbehaving device can never stall the stream. Errors only arise from
/// explicit payload decoding and serialization.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("zlib stream error: {0}")]
    Zlib(#[from] std::io::Error),

    #[error("XML serialization failed: {0}")]
    Serialize(String),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;
