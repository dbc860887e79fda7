//! ASCII armor encoding and decoding.
//!
//! Implements the RFC 4880 armor format: binary payloads wrapped in
//! `-----BEGIN PGP ...-----` / `-----END PGP ...-----` markers with a
//! base64 body and a CRC-24 checksum line. Also provides the two-part
//! clear-signed framing (literal message followed by a SIGNATURE block).
//!
//! Headers are kept as an ordered list so that Version/Comment lines
//! re-encode in the order they were written.

use crate::error::{QpgError, Result};

const CRC24_POLY: u32 = 0x186_4CFB;
const CRC24_INIT: u32 = 0xB7_04CE;

/// Width of base64 body lines.
const ARMOR_LINE_WIDTH: usize = 64;

const BASE64_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

/// The kinds of armored block QPG produces and consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmorKind {
    /// Public key block
    PublicKey,
    /// Private key block
    PrivateKey,
    /// Encrypted message
    Message,
    /// Detached signature
    Signature,
}

impl ArmorKind {
    /// The marker text between `-----BEGIN ` and `-----`.
    pub fn marker(&self) -> &'static str {
        match self {
            ArmorKind::PublicKey => "PGP PUBLIC KEY BLOCK",
            ArmorKind::PrivateKey => "PGP PRIVATE KEY BLOCK",
            ArmorKind::Message => "PGP MESSAGE",
            ArmorKind::Signature => "PGP SIGNATURE",
        }
    }

    /// Parses a marker string back into a kind.
    ///
    /// The kind set is closed; anything else is a format error.
    pub fn from_marker(marker: &str) -> Result<Self> {
        match marker {
            "PGP PUBLIC KEY BLOCK" => Ok(ArmorKind::PublicKey),
            "PGP PRIVATE KEY BLOCK" => Ok(ArmorKind::PrivateKey),
            "PGP MESSAGE" => Ok(ArmorKind::Message),
            "PGP SIGNATURE" => Ok(ArmorKind::Signature),
            other => Err(QpgError::format(format!(
                "Unknown armor kind: '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ArmorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.marker())
    }
}

/// A decoded armor block: kind, ordered headers and the binary body.
#[derive(Debug, Clone)]
pub struct ArmoredBlock {
    /// The kind of armored data
    pub kind: ArmorKind,
    /// Ordered header lines (key, value)
    pub headers: Vec<(String, String)>,
    /// The decoded binary body
    pub body: Vec<u8>,
}

impl ArmoredBlock {
    /// Returns the first header value with the given key, if any.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for the given header key, in order.
    pub fn header_values(&self, key: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

/// CRC-24 checksum as used in PGP armor.
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= (byte as u32) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0xFF_FFFF
}

/// Encodes a binary body as an armored block.
///
/// Deterministic for a given input and never fails: any byte sequence can
/// be armored.
pub fn encode(kind: ArmorKind, headers: &[(String, String)], body: &[u8]) -> String {
    let mut out = String::new();
    out.push_str("-----BEGIN ");
    out.push_str(kind.marker());
    out.push_str("-----\n");

    for (key, value) in headers {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
    out.push('\n');

    let encoded = base64_encode(body);
    for chunk in encoded.as_bytes().chunks(ARMOR_LINE_WIDTH) {
        // chunks of an ASCII string are valid UTF-8
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }

    let crc = crc24(body);
    let crc_bytes = [(crc >> 16) as u8, (crc >> 8) as u8, crc as u8];
    out.push('=');
    out.push_str(&base64_encode(&crc_bytes));
    out.push('\n');

    out.push_str("-----END ");
    out.push_str(kind.marker());
    out.push_str("-----\n");
    out
}

/// Decodes an armored block.
///
/// Fails with a format error when the begin/end markers are missing or
/// name different kinds, when the base64 body does not decode, when the
/// checksum line is absent, or when the checksum does not match the body.
pub fn decode(armored: &str) -> Result<ArmoredBlock> {
    let mut lines = armored.lines();

    // Skip any leading junk before the begin marker.
    let kind = loop {
        let line = lines
            .next()
            .ok_or_else(|| QpgError::format("No armor begin marker found"))?;
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("-----BEGIN ") {
            let marker = rest
                .strip_suffix("-----")
                .ok_or_else(|| QpgError::format("Malformed begin marker line"))?;
            break ArmorKind::from_marker(marker)?;
        }
    };

    // Headers run until the first blank line.
    let mut headers = Vec::new();
    let mut first_body_line: Option<&str> = None;
    for line in lines.by_ref() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break;
        }
        match trimmed.split_once(':') {
            Some((key, value)) => headers.push((key.trim().to_string(), value.trim().to_string())),
            None => {
                // No blank separator: this is already body data.
                first_body_line = Some(trimmed);
                break;
            }
        }
    }

    let mut base64_body = String::new();
    if let Some(line) = first_body_line {
        base64_body.push_str(line);
    }

    let mut checksum: Option<String> = None;
    let mut end_marker: Option<&str> = None;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("-----END ") {
            end_marker = Some(
                rest.strip_suffix("-----")
                    .ok_or_else(|| QpgError::format("Malformed end marker line"))?,
            );
            break;
        }
        if let Some(crc_part) = trimmed.strip_prefix('=') {
            // A lone '=' prefix only marks the checksum when the remainder
            // is exactly a 4-character base64 group.
            if crc_part.len() == 4 {
                checksum = Some(crc_part.to_string());
                continue;
            }
        }
        base64_body.push_str(trimmed);
    }

    let end_marker =
        end_marker.ok_or_else(|| QpgError::format("No armor end marker found"))?;
    let end_kind = ArmorKind::from_marker(end_marker)?;
    if end_kind != kind {
        return Err(QpgError::format(format!(
            "Begin marker '{}' does not match end marker '{}'",
            kind, end_kind
        )));
    }

    let body = base64_decode(&base64_body)?;

    let checksum =
        checksum.ok_or_else(|| QpgError::format("Missing armor checksum line"))?;
    let crc_bytes = base64_decode(&checksum)?;
    if crc_bytes.len() != 3 {
        return Err(QpgError::format("Invalid armor checksum length"));
    }
    let expected =
        ((crc_bytes[0] as u32) << 16) | ((crc_bytes[1] as u32) << 8) | crc_bytes[2] as u32;
    let actual = crc24(&body);
    if expected != actual {
        return Err(QpgError::format(format!(
            "Armor checksum mismatch: expected {:06X}, got {:06X}",
            expected, actual
        )));
    }

    Ok(ArmoredBlock {
        kind,
        headers,
        body,
    })
}

const SIGNED_MESSAGE_MARKER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const SIGNATURE_BEGIN_MARKER: &str = "-----BEGIN PGP SIGNATURE-----";

/// Composes a clear-signed message: literal text followed by an armored
/// signature block.
///
/// The framing is injective: the message text is carried byte-exact,
/// trailing newlines included, and exactly one separator newline is
/// inserted before the signature block. The declared hash algorithm
/// states how the message bytes were digested before signing; no
/// line-ending normalization is applied.
pub fn compose_clear_signed(
    message: &str,
    hash_name: &str,
    signature_headers: &[(String, String)],
    signature_body: &[u8],
) -> String {
    let mut out = String::new();
    out.push_str(SIGNED_MESSAGE_MARKER);
    out.push('\n');
    out.push_str("Hash: ");
    out.push_str(hash_name);
    out.push('\n');
    out.push('\n');
    out.push_str(message);
    // Separator newline, removed again when the framing is split.
    out.push('\n');
    out.push_str(&encode(ArmorKind::Signature, signature_headers, signature_body));
    out
}

/// Splits a clear-signed message into the literal text and the decoded
/// signature block.
///
/// Recovers the message byte-exact: only the single separator newline
/// added by [`compose_clear_signed`] is removed. The signature block is
/// located from the end of the input, so a message line that looks like
/// a signature begin marker does not truncate the text.
pub fn split_clear_signed(signed: &str) -> Result<(String, ArmoredBlock)> {
    let rest = signed
        .trim_start()
        .strip_prefix(SIGNED_MESSAGE_MARKER)
        .and_then(|r| r.strip_prefix('\n'))
        .ok_or_else(|| QpgError::format("Not a clear-signed message"))?;

    // Hash header block, terminated by a blank line.
    let (header_block, remainder) = rest.split_once("\n\n").ok_or_else(|| {
        QpgError::format("Clear-signed message has no header separator")
    })?;
    for line in header_block.lines() {
        if !line.contains(':') {
            return Err(QpgError::format("Malformed clear-signed header block"));
        }
    }

    let sig_start = remainder.rfind(SIGNATURE_BEGIN_MARKER).ok_or_else(|| {
        QpgError::format("Clear-signed message has no signature block")
    })?;
    if sig_start > 0 && remainder.as_bytes()[sig_start - 1] != b'\n' {
        return Err(QpgError::format(
            "Signature marker is not at a line start",
        ));
    }

    let message = remainder[..sig_start].strip_suffix('\n').ok_or_else(|| {
        QpgError::format("Missing separator before signature block")
    })?;
    let signature = decode(&remainder[sig_start..])?;

    Ok((message.to_string(), signature))
}

fn base64_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len().div_ceil(3) * 4);
    for chunk in data.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        out.push(BASE64_CHARS[(triple >> 18 & 0x3F) as usize] as char);
        out.push(BASE64_CHARS[(triple >> 12 & 0x3F) as usize] as char);
        out.push(if chunk.len() > 1 {
            BASE64_CHARS[(triple >> 6 & 0x3F) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            BASE64_CHARS[(triple & 0x3F) as usize] as char
        } else {
            '='
        });
    }
    out
}

fn base64_decode(data: &str) -> Result<Vec<u8>> {
    let bytes = data.as_bytes();
    if bytes.len() % 4 != 0 {
        return Err(QpgError::format(format!(
            "Base64 length {} is not a multiple of 4",
            bytes.len()
        )));
    }

    let mut out = Vec::with_capacity(bytes.len() / 4 * 3);
    for group in bytes.chunks(4) {
        let mut acc = 0u32;
        let mut chars = 0usize;
        for &c in group {
            if c == b'=' {
                break;
            }
            let value = match c {
                b'A'..=b'Z' => c - b'A',
                b'a'..=b'z' => c - b'a' + 26,
                b'0'..=b'9' => c - b'0' + 52,
                b'+' => 62,
                b'/' => 63,
                _ => {
                    return Err(QpgError::format(format!(
                        "Invalid base64 character: '{}'",
                        c as char
                    )))
                }
            };
            acc = (acc << 6) | value as u32;
            chars += 1;
        }

        match chars {
            4 => {
                out.push((acc >> 16) as u8);
                out.push((acc >> 8) as u8);
                out.push(acc as u8);
            }
            3 => {
                acc <<= 6;
                out.push((acc >> 16) as u8);
                out.push((acc >> 8) as u8);
            }
            2 => {
                acc <<= 12;
                out.push((acc >> 16) as u8);
            }
            _ => return Err(QpgError::format("Truncated base64 group")),
        }
    }
    Ok(out)
}
