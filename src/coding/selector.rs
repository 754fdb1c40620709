//! Content-coding token dispatch.
//!
//! # Responsibilities
//! - Normalize a `content-encoding` token (trim, lowercase)
//! - Map it to a matched decoder/encoder pair
//! - Report unknown or multi-coding tokens as unsupported

use axum::http::{header, HeaderMap};
use std::fmt;

use crate::coding::stage::{Decoder, Encoder};

/// Placeholder token for a `content-encoding` value that is not valid text.
const INVALID_TOKEN: &str = "<non-ascii>";

/// A content-coding this crate can reverse and reapply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentCoding {
    /// No coding applied.
    Identity,
    /// RFC 1952 gzip.
    Gzip,
    /// Zlib-wrapped deflate (HTTP `deflate`).
    Deflate,
    /// RFC 7932 brotli (`br`).
    Brotli,
}

impl ContentCoding {
    /// Header token for this coding.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentCoding::Identity => "identity",
            ContentCoding::Gzip => "gzip",
            ContentCoding::Deflate => "deflate",
            ContentCoding::Brotli => "br",
        }
    }

    /// Whether this build carries a codec for the coding.
    pub fn is_available(&self) -> bool {
        match self {
            ContentCoding::Brotli => cfg!(feature = "brotli"),
            _ => true,
        }
    }

    /// Parse a normalized token. Empty means identity.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "" | "identity" => Some(ContentCoding::Identity),
            "gzip" | "x-gzip" => Some(ContentCoding::Gzip),
            "deflate" => Some(ContentCoding::Deflate),
            "br" => Some(ContentCoding::Brotli),
            _ => None,
        }
    }
}

impl fmt::Display for ContentCoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of resolving a coding tag.
pub enum Selection {
    /// Body is not coded; no stages needed.
    Identity,
    /// Body is coded with a coding we can reverse.
    Coded {
        coding: ContentCoding,
        decoder: Decoder,
        encoder: Encoder,
    },
    /// Token cannot be reversed; carries the normalized token.
    Unsupported(String),
}

impl Selection {
    /// The resolved coding, if supported.
    pub fn coding(&self) -> Option<ContentCoding> {
        match self {
            Selection::Identity => Some(ContentCoding::Identity),
            Selection::Coded { coding, .. } => Some(*coding),
            Selection::Unsupported(_) => None,
        }
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Identity => f.write_str("Identity"),
            Selection::Coded { coding, .. } => f.debug_tuple("Coded").field(coding).finish(),
            Selection::Unsupported(token) => f.debug_tuple("Unsupported").field(token).finish(),
        }
    }
}

/// Resolve a coding tag into a decoder/encoder pair.
///
/// `None` (header absent) is treated the same as an empty token.
pub fn select(tag: Option<&str>) -> Selection {
    let token = tag.map(|t| t.trim().to_ascii_lowercase()).unwrap_or_default();

    let coding = match ContentCoding::from_token(&token) {
        Some(coding) => coding,
        None => return Selection::Unsupported(token),
    };

    if coding == ContentCoding::Identity {
        return Selection::Identity;
    }
    if !coding.is_available() {
        return Selection::Unsupported(token);
    }

    match (Decoder::new(coding), Encoder::new(coding)) {
        (Some(decoder), Some(encoder)) => Selection::Coded {
            coding,
            decoder,
            encoder,
        },
        _ => Selection::Unsupported(token),
    }
}

/// Extract the `content-encoding` token from response headers.
pub fn coding_from_headers(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_ENCODING)
        .map(|value| value.to_str().unwrap_or(INVALID_TOKEN))
}
