use libp2p::PeerId;

/// Errors from encoding, decoding or authenticating wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// Stream I/O failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A message could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] postcard::Error),

    /// A message exceeds the size limit.
    #[error("message of {size} bytes exceeds limit of {max}")]
    TooLarge {
        /// Observed size.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// A frame length prefix is not a valid varint.
    #[error("invalid length prefix: {0}")]
    LengthPrefix(unsigned_varint::decode::Error),

    /// The stream ended before a complete message arrived.
    #[error("stream closed before a message was received")]
    UnexpectedEof,

    /// The signer's public key could not be decoded.
    #[error("invalid public key: {0}")]
    PublicKey(#[from] libp2p::identity::DecodingError),

    /// Signing the request failed.
    #[error("signing failed: {0}")]
    Signing(#[from] libp2p::identity::SigningError),

    /// The signature does not match the payload.
    #[error("request signature does not verify")]
    BadSignature,

    /// The request was signed by a key other than the stream's remote peer.
    #[error("request signed by {signer}, stream opened by {remote}")]
    SignerMismatch {
        /// Peer id derived from the signing key.
        signer: PeerId,
        /// Authenticated remote peer of the stream.
        remote: PeerId,
    },
}
