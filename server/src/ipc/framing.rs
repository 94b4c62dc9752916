use std::io;

use ableton_proto::{Call, DEFAULT_MAX_FRAME_BYTES, LENGTH_PREFIX_BYTES};
use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Decoder, Encoder, Framed, LengthDelimitedCodec};

use super::codec::{self, InboundFrame};

pub type FramedIo<T> = Framed<T, FrameCodec>;

pub fn length_codec(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(LENGTH_PREFIX_BYTES)
        .big_endian()
        .max_frame_length(max_frame_length)
        .new_codec()
}

/// Length-prefixed JSON frames: `Call`s go out, classified [`InboundFrame`]s come in.
///
/// Partial frames stay buffered until complete; a read holding several frames
/// yields them one by one. Only an oversized length prefix is an error, since
/// the stream cannot be resynchronized after it.
#[derive(Debug)]
pub struct FrameCodec {
    inner: LengthDelimitedCodec,
}

impl FrameCodec {
    pub fn new(max_frame_length: usize) -> Self {
        Self {
            inner: length_codec(max_frame_length),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_BYTES)
    }
}

impl Decoder for FrameCodec {
    type Item = InboundFrame;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self
            .inner
            .decode(src)?
            .map(|body| codec::decode_frame(body.freeze())))
    }
}

impl Encoder<Call> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, call: Call, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let body = codec::encode_call(&call)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        self.inner.encode(body, dst)
    }
}

pub fn into_framed<T>(io: T, max_frame_length: usize) -> FramedIo<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    Framed::new(io, FrameCodec::new(max_frame_length))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ableton_proto::{Notification, Reply, encode_frame};
    use serde_json::json;

    #[test]
    fn partial_frame_waits_for_the_rest() {
        let wire = encode_frame(&Reply::ok("1", json!(true))).unwrap();
        let mut codec = FrameCodec::default();
        let mut buf = BytesMut::new();

        for (i, byte) in wire.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let decoded = codec.decode(&mut buf).unwrap();
            if i + 1 < wire.len() {
                assert!(decoded.is_none(), "frame yielded early at byte {i}");
            } else {
                assert!(matches!(decoded, Some(InboundFrame::Response(r)) if r.id == "1"));
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn concatenated_frames_come_out_in_order() {
        let mut buf = BytesMut::new();
        buf.extend(encode_frame(&Reply::ok("1", json!(1))).unwrap());
        buf.extend(encode_frame(&Notification::new("/status", vec![]).to_wire()).unwrap());
        buf.extend(encode_frame(&Reply::err("2", 4, "bad index")).unwrap());
        // trailing half of a fourth frame
        let fourth = encode_frame(&Reply::ok("3", json!(3))).unwrap();
        buf.extend_from_slice(&fourth[..6]);

        let mut codec = FrameCodec::default();
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(InboundFrame::Response(r)) if r.id == "1"));
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(InboundFrame::Notification(n)) if n.topic == "/status"));
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(InboundFrame::Response(r)) if r.id == "2"));
        assert!(codec.decode(&mut buf).unwrap().is_none());

        buf.extend_from_slice(&fourth[6..]);
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(InboundFrame::Response(r)) if r.id == "3"));
    }

    #[test]
    fn malformed_body_does_not_poison_the_codec() {
        let mut buf = BytesMut::new();
        let garbage = b"{oops";
        buf.extend_from_slice(&(garbage.len() as u32).to_be_bytes());
        buf.extend_from_slice(garbage);
        buf.extend(encode_frame(&Reply::ok("1", json!(null))).unwrap());

        let mut codec = FrameCodec::default();
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(InboundFrame::Malformed { .. })));
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(InboundFrame::Response(_))));
    }

    #[test]
    fn oversized_frame_is_an_error() {
        let mut buf = BytesMut::new();
        buf.extend(encode_frame(&json!({"id": "1", "result": "x".repeat(64)})).unwrap());
        let mut codec = FrameCodec::new(16);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn encoded_call_matches_proto_framing() {
        let call = Call::new("1", "get_track_names", json!({}));
        let mut dst = BytesMut::new();
        FrameCodec::default().encode(call.clone(), &mut dst).unwrap();

        let (decoded, used): (Call, usize) = ableton_proto::decode_frame(&dst).unwrap();
        assert_eq!(decoded, call);
        assert_eq!(used, dst.len());
    }
}
