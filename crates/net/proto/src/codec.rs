//! Stream framing.
//!
//! Requests are sent as a single postcard frame prefixed with its unsigned
//! varint length.
//! Responses carry no prefix: the responder writes the encoded response and
//! closes the stream, and the requester reads until end of stream.

use std::marker::PhantomData;

use asynchronous_codec::{FramedRead, FramedWrite};
use bytes::{Buf, BytesMut};
use futures::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, SinkExt, TryStreamExt};
use serde::{Serialize, de::DeserializeOwned};

use unsigned_varint::{decode, encode};

use crate::{P2PResponse, ProtoError, SignedRequest};

/// Largest accepted request frame.
pub const MAX_REQUEST_SIZE: usize = 64 * 1024;

/// Largest accepted response.
pub const MAX_RESPONSE_SIZE: usize = 128 * 1024 * 1024;

/// Length-prefixed postcard codec for `T`.
#[derive(Debug)]
pub struct MessageCodec<T> {
    max_size: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T> MessageCodec<T> {
    /// Codec rejecting frames larger than `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize> asynchronous_codec::Encoder for MessageCodec<T> {
    type Item<'a> = T;
    type Error = ProtoError;

    fn encode(&mut self, item: Self::Item<'_>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = postcard::to_allocvec(&item)?;
        if body.len() > self.max_size {
            return Err(ProtoError::TooLarge {
                size: body.len(),
                max: self.max_size,
            });
        }
        let mut prefix = encode::usize_buffer();
        let prefix = encode::usize(body.len(), &mut prefix);
        dst.reserve(prefix.len() + body.len());
        dst.extend_from_slice(prefix);
        dst.extend_from_slice(&body);
        Ok(())
    }
}

impl<T: DeserializeOwned> asynchronous_codec::Decoder for MessageCodec<T> {
    type Item = T;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let (len, prefix) = match decode::usize(src) {
            Ok((len, rest)) => (len, src.len() - rest.len()),
            Err(decode::Error::Insufficient) => return Ok(None),
            Err(err) => return Err(ProtoError::LengthPrefix(err)),
        };
        if len > self.max_size {
            return Err(ProtoError::TooLarge {
                size: len,
                max: self.max_size,
            });
        }
        if src.len() < prefix + len {
            src.reserve(prefix + len - src.len());
            return Ok(None);
        }
        src.advance(prefix);
        let frame = src.split_to(len);
        Ok(Some(postcard::from_bytes(&frame)?))
    }
}

/// Write one signed request frame.
pub async fn write_request<S>(stream: &mut S, request: SignedRequest) -> Result<(), ProtoError>
where
    S: AsyncWrite + Unpin,
{
    let mut framed = FramedWrite::new(stream, MessageCodec::<SignedRequest>::new(MAX_REQUEST_SIZE));
    framed.send(request).await?;
    Ok(())
}

/// Read one signed request frame.
pub async fn read_request<S>(stream: &mut S) -> Result<SignedRequest, ProtoError>
where
    S: AsyncRead + Unpin,
{
    let mut framed = FramedRead::new(stream, MessageCodec::<SignedRequest>::new(MAX_REQUEST_SIZE));
    framed.try_next().await?.ok_or(ProtoError::UnexpectedEof)
}

/// Write a response and close the stream.
pub async fn write_response<S>(stream: &mut S, response: &P2PResponse) -> Result<(), ProtoError>
where
    S: AsyncWrite + Unpin,
{
    let bytes = postcard::to_allocvec(response)?;
    stream.write_all(&bytes).await?;
    stream.close().await?;
    Ok(())
}

/// Read a response until end of stream.
pub async fn read_response<S>(stream: &mut S) -> Result<P2PResponse, ProtoError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    stream
        .take(MAX_RESPONSE_SIZE as u64 + 1)
        .read_to_end(&mut buf)
        .await?;
    if buf.len() > MAX_RESPONSE_SIZE {
        return Err(ProtoError::TooLarge {
            size: buf.len(),
            max: MAX_RESPONSE_SIZE,
        });
    }
    if buf.is_empty() {
        return Err(ProtoError::UnexpectedEof);
    }
    Ok(postcard::from_bytes(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AddrInfo, P2PRequest, ResponsePayload};
    use asynchronous_codec::{Decoder, Encoder};
    use assert_matches::assert_matches;
    use futures::io::Cursor;
    use libp2p::identity::Keypair;
    use shardline_primitives::HeightRange;

    #[test]
    fn test_decode_waits_for_full_frame() {
        let mut codec = MessageCodec::<P2PRequest>::new(MAX_REQUEST_SIZE);
        let mut buf = BytesMut::new();
        codec
            .encode(P2PRequest::GetHeader(HeightRange::new(1, 300)), &mut buf)
            .unwrap();

        let mut partial = buf.split_to(buf.len() - 1);
        assert!(codec.decode(&mut partial).unwrap().is_none());
        partial.unsplit(buf);
        assert_eq!(
            codec.decode(&mut partial).unwrap(),
            Some(P2PRequest::GetHeader(HeightRange::new(1, 300)))
        );
        assert!(partial.is_empty());
    }

    #[test]
    fn test_decode_rejects_oversized_frame() {
        let mut codec = MessageCodec::<P2PRequest>::new(4);
        let mut oversized = BytesMut::from(&[0x80, 0x01][..]);
        assert_matches!(
            codec.decode(&mut oversized),
            Err(ProtoError::TooLarge { size: 128, max: 4 })
        );
    }

    #[test]
    fn test_decode_rejects_malformed_prefix() {
        let mut codec = MessageCodec::<P2PRequest>::new(MAX_REQUEST_SIZE);
        assert!(codec.decode(&mut BytesMut::from(&[0x80][..])).unwrap().is_none());
        assert_matches!(
            codec.decode(&mut BytesMut::from(&[0xFF; 11][..])),
            Err(ProtoError::LengthPrefix(_))
        );
        assert_matches!(
            codec.decode(&mut BytesMut::from(&[0x80, 0x00][..])),
            Err(ProtoError::LengthPrefix(decode::Error::NotMinimal))
        );
    }

    #[test]
    fn test_addresses_survive_encoding() {
        let info = AddrInfo {
            peer_id: libp2p::PeerId::random(),
            addrs: vec![
                "/ip4/10.0.0.1/tcp/13803".parse().unwrap(),
                "/dns4/node.example/tcp/13803".parse().unwrap(),
            ],
        };
        let response = P2PResponse::from(ResponsePayload::AddrInfos(vec![info]));
        let bytes = postcard::to_allocvec(&response).unwrap();
        assert_eq!(postcard::from_bytes::<P2PResponse>(&bytes).unwrap(), response);
    }

    #[tokio::test]
    async fn test_request_and_response_over_stream() {
        let keypair = Keypair::generate_ed25519();
        let signed = SignedRequest::sign(&P2PRequest::IsSync, &keypair).unwrap();

        let mut wire = Cursor::new(Vec::new());
        write_request(&mut wire, signed.clone()).await.unwrap();
        wire.set_position(0);
        assert_eq!(read_request(&mut wire).await.unwrap(), signed);

        let response = P2PResponse::from(ResponsePayload::Reply { is_ok: true });
        let mut wire = Cursor::new(Vec::new());
        write_response(&mut wire, &response).await.unwrap();
        wire.set_position(0);
        assert_eq!(read_response(&mut wire).await.unwrap(), response);
    }

    #[tokio::test]
    async fn test_empty_response_is_eof() {
        let mut wire = Cursor::new(Vec::new());
        assert_matches!(read_response(&mut wire).await, Err(ProtoError::UnexpectedEof));
    }
}
