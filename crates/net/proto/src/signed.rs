//! Requests authenticated with the sender's identity key.

use libp2p::{
    PeerId,
    identity::{Keypair, PublicKey},
};
use serde::{Deserialize, Serialize};

use crate::{P2PRequest, ProtoError};

/// A [`P2PRequest`] with the sender's public key and a signature over the
/// encoded request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedRequest {
    payload: Vec<u8>,
    public_key: Vec<u8>,
    signature: Vec<u8>,
}

impl SignedRequest {
    /// Encode and sign `request` with `keypair`.
    pub fn sign(request: &P2PRequest, keypair: &Keypair) -> Result<Self, ProtoError> {
        let payload = postcard::to_allocvec(request)?;
        let signature = keypair.sign(&payload)?;
        Ok(Self {
            payload,
            public_key: keypair.public().encode_protobuf(),
            signature,
        })
    }

    /// Check the signature and that the signer is `remote`, then decode the
    /// request.
    pub fn verify(&self, remote: &PeerId) -> Result<P2PRequest, ProtoError> {
        let public_key = PublicKey::try_decode_protobuf(&self.public_key)?;
        let signer = public_key.to_peer_id();
        if signer != *remote {
            return Err(ProtoError::SignerMismatch {
                signer,
                remote: *remote,
            });
        }
        if !public_key.verify(&self.payload, &self.signature) {
            return Err(ProtoError::BadSignature);
        }
        Ok(postcard::from_bytes(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shardline_primitives::ChunkKey;

    #[test]
    fn test_verify_accepts_signer() {
        let keypair = Keypair::generate_ed25519();
        let request = P2PRequest::FetchChunk(ChunkKey::new(b"h1".to_vec(), 10, 19));
        let signed = SignedRequest::sign(&request, &keypair).unwrap();

        let peer = keypair.public().to_peer_id();
        assert_eq!(signed.verify(&peer).unwrap(), request);
    }

    #[test]
    fn test_verify_rejects_other_peer() {
        let keypair = Keypair::generate_ed25519();
        let signed = SignedRequest::sign(&P2PRequest::IsSync, &keypair).unwrap();

        let other = Keypair::generate_ed25519().public().to_peer_id();
        assert_matches!(
            signed.verify(&other),
            Err(ProtoError::SignerMismatch { remote, .. }) if remote == other
        );
    }

    #[test]
    fn test_verify_rejects_tampered_payload() {
        let keypair = Keypair::generate_ed25519();
        let mut signed = SignedRequest::sign(&P2PRequest::GetLastHeader, &keypair).unwrap();
        signed.payload = postcard::to_allocvec(&P2PRequest::IsSync).unwrap();

        let peer = keypair.public().to_peer_id();
        assert_matches!(signed.verify(&peer), Err(ProtoError::BadSignature));
    }
}
