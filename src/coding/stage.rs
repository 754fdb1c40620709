//! Streaming decode/encode stages.
//!
//! Each stage wraps an `async-compression` writer over an in-memory buffer.
//! Input is pushed chunk by chunk; whatever output the codec has produced is
//! drained from the buffer and handed back to the caller, so output order
//! always follows input order.

use async_compression::tokio::write::{GzipDecoder, GzipEncoder, ZlibDecoder, ZlibEncoder};
#[cfg(feature = "brotli")]
use async_compression::tokio::write::{BrotliDecoder, BrotliEncoder};
use bytes::Bytes;
use std::fmt;
use std::io;
use tokio::io::AsyncWriteExt;

use crate::coding::selector::ContentCoding;

/// Write a whole chunk into a decoder and take what it produced.
macro_rules! flushed_push {
    ($codec:expr, $chunk:expr) => {{
        $codec.write_all($chunk).await?;
        $codec.flush().await?;
        Ok(drain($codec.get_mut()))
    }};
}

/// Run the same expression against whichever codec variant is active.
macro_rules! with_codec {
    ($stage:expr, $kind:ident, $codec:ident => $body:expr) => {
        match $stage {
            $kind::Gzip($codec) => $body,
            $kind::Deflate($codec) => $body,
            #[cfg(feature = "brotli")]
            $kind::Brotli($codec) => $body,
        }
    };
}

/// Reverses a content-coding.
pub enum Decoder {
    Gzip(GzipMembers),
    Deflate(ZlibDecoder<Vec<u8>>),
    #[cfg(feature = "brotli")]
    Brotli(BrotliDecoder<Vec<u8>>),
}

impl Decoder {
    /// Create a decoder, or `None` if the coding needs no stage or is
    /// compiled out.
    pub fn new(coding: ContentCoding) -> Option<Self> {
        match coding {
            ContentCoding::Gzip => Some(Decoder::Gzip(GzipMembers::new())),
            ContentCoding::Deflate => Some(Decoder::Deflate(ZlibDecoder::new(Vec::new()))),
            #[cfg(feature = "brotli")]
            ContentCoding::Brotli => Some(Decoder::Brotli(BrotliDecoder::new(Vec::new()))),
            _ => None,
        }
    }

    pub fn coding(&self) -> ContentCoding {
        match self {
            Decoder::Gzip(_) => ContentCoding::Gzip,
            Decoder::Deflate(_) => ContentCoding::Deflate,
            #[cfg(feature = "brotli")]
            Decoder::Brotli(_) => ContentCoding::Brotli,
        }
    }

    /// Feed coded bytes, returning the decoded bytes produced so far.
    ///
    /// Malformed input surfaces as an `io::Error`.
    pub async fn push(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        match self {
            Decoder::Gzip(members) => members.push(chunk).await,
            Decoder::Deflate(codec) => flushed_push!(codec, chunk),
            #[cfg(feature = "brotli")]
            Decoder::Brotli(codec) => flushed_push!(codec, chunk),
        }
    }

    /// Signal end of input. Fails if the coded stream was truncated.
    pub async fn finish(self) -> io::Result<Bytes> {
        match self {
            Decoder::Gzip(members) => members.finish().await,
            Decoder::Deflate(mut codec) => {
                codec.shutdown().await?;
                Ok(drain(codec.get_mut()))
            }
            #[cfg(feature = "brotli")]
            Decoder::Brotli(mut codec) => {
                codec.shutdown().await?;
                Ok(drain(codec.get_mut()))
            }
        }
    }
}

/// Gzip decoder accepting a body of several concatenated members.
///
/// An `async-compression` write decoder stops consuming input once its member
/// trailer has been read, so each new member gets a fresh decoder.
pub struct GzipMembers {
    member: GzipDecoder<Vec<u8>>,
    /// Whether `member` has consumed any input yet.
    started: bool,
    /// Output of members already closed, not yet handed back.
    closed: Vec<u8>,
}

impl GzipMembers {
    fn new() -> Self {
        Self {
            member: GzipDecoder::new(Vec::new()),
            started: false,
            closed: Vec::new(),
        }
    }

    // No flush here: flushing a member whose trailer ended exactly on the
    // chunk boundary finishes it, and the next write would then be rejected
    // instead of reporting zero bytes taken.
    async fn push(&mut self, mut chunk: &[u8]) -> io::Result<Bytes> {
        while !chunk.is_empty() {
            let taken = self.member.write(chunk).await?;
            if taken > 0 {
                self.started = true;
            }
            if taken < chunk.len() {
                if !self.started {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "gzip member ended before its header",
                    ));
                }
                self.next_member().await?;
            }
            chunk = &chunk[taken..];
        }

        let mut out = std::mem::take(&mut self.closed);
        out.append(self.member.get_mut());
        Ok(Bytes::from(out))
    }

    async fn next_member(&mut self) -> io::Result<()> {
        let mut ended = std::mem::replace(&mut self.member, GzipDecoder::new(Vec::new()));
        ended.shutdown().await?;
        self.closed.append(ended.get_mut());
        self.started = false;
        Ok(())
    }

    async fn finish(mut self) -> io::Result<Bytes> {
        self.member.shutdown().await?;
        self.closed.append(self.member.get_mut());
        Ok(Bytes::from(self.closed))
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Decoder").field(&self.coding()).finish()
    }
}

/// Reapplies a content-coding.
pub enum Encoder {
    Gzip(GzipEncoder<Vec<u8>>),
    Deflate(ZlibEncoder<Vec<u8>>),
    #[cfg(feature = "brotli")]
    Brotli(BrotliEncoder<Vec<u8>>),
}

impl Encoder {
    pub fn new(coding: ContentCoding) -> Option<Self> {
        match coding {
            ContentCoding::Gzip => Some(Encoder::Gzip(GzipEncoder::new(Vec::new()))),
            ContentCoding::Deflate => Some(Encoder::Deflate(ZlibEncoder::new(Vec::new()))),
            #[cfg(feature = "brotli")]
            ContentCoding::Brotli => Some(Encoder::Brotli(BrotliEncoder::new(Vec::new()))),
            _ => None,
        }
    }

    pub fn coding(&self) -> ContentCoding {
        match self {
            Encoder::Gzip(_) => ContentCoding::Gzip,
            Encoder::Deflate(_) => ContentCoding::Deflate,
            #[cfg(feature = "brotli")]
            Encoder::Brotli(_) => ContentCoding::Brotli,
        }
    }

    /// Feed plain bytes, returning any coded output already emitted.
    ///
    /// No flush is forced here; the codec decides when to emit a block.
    pub async fn push(&mut self, chunk: &[u8]) -> io::Result<Bytes> {
        with_codec!(self, Encoder, codec => {
            codec.write_all(chunk).await?;
            Ok(drain(codec.get_mut()))
        })
    }

    /// Close the coded stream and return its trailing bytes.
    pub async fn finish(mut self) -> io::Result<Bytes> {
        with_codec!(&mut self, Encoder, codec => {
            codec.shutdown().await?;
            Ok(drain(codec.get_mut()))
        })
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Encoder").field(&self.coding()).finish()
    }
}

fn drain(buffer: &mut Vec<u8>) -> Bytes {
    Bytes::from(std::mem::take(buffer))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn encode(coding: ContentCoding, input: &[u8]) -> Vec<u8> {
        let mut encoder = Encoder::new(coding).unwrap();
        let mut out = encoder.push(input).await.unwrap().to_vec();
        out.extend_from_slice(&encoder.finish().await.unwrap());
        out
    }

    async fn decode_in_chunks(coding: ContentCoding, input: &[u8], size: usize) -> io::Result<Vec<u8>> {
        let mut decoder = Decoder::new(coding).unwrap();
        let mut out = Vec::new();
        for chunk in input.chunks(size) {
            out.extend_from_slice(&decoder.push(chunk).await?);
        }
        out.extend_from_slice(&decoder.finish().await?);
        Ok(out)
    }

    #[tokio::test]
    async fn test_gzip_stage_pair() {
        let body = br#"{"name":"x","age":1,"version":"1.0.0"}"#;
        let coded = encode(ContentCoding::Gzip, body).await;
        assert_eq!(&coded[..2], &[0x1f, 0x8b]);

        let decoded = decode_in_chunks(ContentCoding::Gzip, &coded, 3).await.unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn test_gzip_concatenated_members() {
        let mut coded = encode(ContentCoding::Gzip, br#"{"a":"#).await;
        coded.extend_from_slice(&encode(ContentCoding::Gzip, b"1}").await);

        // Whole, split on every byte, and split on the member boundary.
        for size in [coded.len(), 1, coded.len() / 2] {
            let decoded = decode_in_chunks(ContentCoding::Gzip, &coded, size).await.unwrap();
            assert_eq!(decoded, br#"{"a":1}"#);
        }
    }

    #[tokio::test]
    async fn test_gzip_garbage_after_member_errors() {
        let mut coded = encode(ContentCoding::Gzip, b"{}").await;
        coded.extend_from_slice(b"trailing junk");
        let result = decode_in_chunks(ContentCoding::Gzip, &coded, 64).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_deflate_is_zlib_wrapped() {
        let body = b"hello hello hello hello";
        let coded = encode(ContentCoding::Deflate, body).await;
        // zlib header: CMF 0x78
        assert_eq!(coded[0], 0x78);

        let decoded = decode_in_chunks(ContentCoding::Deflate, &coded, 1).await.unwrap();
        assert_eq!(decoded, body);
    }

    #[cfg(feature = "brotli")]
    #[tokio::test]
    async fn test_brotli_stage_pair() {
        let body = br#"[1,2,3,{"a":"b"}]"#;
        let coded = encode(ContentCoding::Brotli, body).await;
        let decoded = decode_in_chunks(ContentCoding::Brotli, &coded, 4).await.unwrap();
        assert_eq!(decoded, body);
    }

    #[tokio::test]
    async fn test_malformed_input_errors() {
        let result = decode_in_chunks(ContentCoding::Gzip, b"definitely not gzip", 64).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_truncated_input_errors() {
        let coded = encode(ContentCoding::Gzip, b"some body that gets cut short").await;
        let truncated = &coded[..coded.len() / 2];
        let result = decode_in_chunks(ContentCoding::Gzip, truncated, 64).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_identity_has_no_stage() {
        assert!(Decoder::new(ContentCoding::Identity).is_none());
        assert!(Encoder::new(ContentCoding::Identity).is_none());
    }
}
