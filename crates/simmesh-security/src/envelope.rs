//! Authenticated envelope layout.
//!
//! Layout on the wire:
//! `[payload: N bytes][timestamp: 4 bytes][nonce: 4 bytes][MAC: 32 bytes]`
//!
//! Timestamp and nonce are little-endian. The MAC covers everything before
//! it (`payload || timestamp || nonce`). Overhead is a constant 40 bytes.
//!
//! Parsing here is structural only. It does NOT check freshness or the MAC;
//! see [`crate::MessageAuthenticator::verify_and_extract`].

use crate::error::FormatError;

/// HMAC-SHA256 output size.
pub const MAC_SIZE: usize = 32;

/// Encoded timestamp size.
pub const TIMESTAMP_SIZE: usize = 4;

/// Encoded nonce size.
pub const NONCE_SIZE: usize = 4;

/// Fixed bytes added to every payload.
pub const ENVELOPE_OVERHEAD: usize = TIMESTAMP_SIZE + NONCE_SIZE + MAC_SIZE;

/// Borrowed view of a structurally valid envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a> {
    /// Leading payload bytes
    pub payload: &'a [u8],
    /// Bytes covered by the MAC (`payload || timestamp || nonce`)
    pub signed: &'a [u8],
    /// Sender's monotonic ms at signing
    pub timestamp: u32,
    /// Sender's random nonce
    pub nonce: u32,
    /// Trailing MAC
    pub tag: &'a [u8; MAC_SIZE],
}

impl<'a> Envelope<'a> {
    /// Split `bytes` into its fields.
    ///
    /// # Errors
    ///
    /// - `FormatError::EnvelopeTooShort` if fewer than 40 bytes
    pub fn parse(bytes: &'a [u8]) -> Result<Self, FormatError> {
        if bytes.len() < ENVELOPE_OVERHEAD {
            return Err(FormatError::EnvelopeTooShort { len: bytes.len() });
        }

        let (signed, tag) = bytes.split_at(bytes.len() - MAC_SIZE);
        let (payload, trailer) = signed.split_at(signed.len() - TIMESTAMP_SIZE - NONCE_SIZE);
        let (timestamp, nonce) = trailer.split_at(TIMESTAMP_SIZE);

        let (Ok(tag), Ok(timestamp), Ok(nonce)) = (
            <&[u8; MAC_SIZE]>::try_from(tag),
            <[u8; TIMESTAMP_SIZE]>::try_from(timestamp),
            <[u8; NONCE_SIZE]>::try_from(nonce),
        ) else {
            unreachable!("split points are fixed offsets from a length-checked slice");
        };

        Ok(Self {
            payload,
            signed,
            timestamp: u32::from_le_bytes(timestamp),
            nonce: u32::from_le_bytes(nonce),
            tag,
        })
    }
}

/// Bytes covered by the MAC for a payload and freshness pair.
pub fn signed_region(payload: &[u8], timestamp: u32, nonce: u32) -> Vec<u8> {
    let mut signed = Vec::with_capacity(payload.len() + ENVELOPE_OVERHEAD);
    signed.extend_from_slice(payload);
    signed.extend_from_slice(&timestamp.to_le_bytes());
    signed.extend_from_slice(&nonce.to_le_bytes());
    signed
}

/// Complete envelope: the signed region followed by `tag`.
pub fn seal_parts(payload: &[u8], timestamp: u32, nonce: u32, tag: &[u8; MAC_SIZE]) -> Vec<u8> {
    let mut envelope = signed_region(payload, timestamp, nonce);
    envelope.extend_from_slice(tag);
    envelope
}
