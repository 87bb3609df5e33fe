// src/metadata.rs
//
// The sign-in form's anti-automation challenge expects a `metadata1` field:
// a JSON device fingerprint, checksummed, XXTEA-encrypted and base64-framed.
// The wire format is fixed by the remote side; everything here has to match
// it byte for byte.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::EnhanceError;

/// Fixed 128-bit key shared by both directions of the protocol.
pub const METADATA_KEY: [u8; 16] = *b"a\x03\x8fp4\x18\x97\x99:\xeb\xe7\x8b\x85\x97$4";

/// Literal tag prepended to every encrypted blob.
const BLOB_TAG: &str = "ECdITeCs:";

const DELTA: u32 = 0x9E37_79B9;

/// XXTEA over little-endian 32-bit words. Value-level: the key is given at
/// construction, there is no shared instance anywhere.
pub struct Xxtea {
    key: [u32; 4],
}

impl Xxtea {
    /// The key must be exactly 128 bits; anything else is a caller bug
    /// surfaced as `CipherError` at construction time.
    pub fn new(key: &[u8]) -> Result<Self, EnhanceError> {
        if key.len() != 16 {
            return Err(EnhanceError::Cipher(format!(
                "key must be 16 bytes, got {}",
                key.len()
            )));
        }
        let mut k = [0u32; 4];
        for (i, word) in k.iter_mut().enumerate() {
            *word = u32::from_le_bytes([
                key[4 * i],
                key[4 * i + 1],
                key[4 * i + 2],
                key[4 * i + 3],
            ]);
        }
        Ok(Self { key: k })
    }

    /// Encrypt a block of data. Input is zero-padded up to a whole number of
    /// words, so the output length is a multiple of 4.
    pub fn encrypt(&self, data: &[u8]) -> Vec<u8> {
        let mut v = bytes_to_words(data);
        encrypt_words(&mut v, &self.key);
        words_to_bytes(&v)
    }

    /// Decrypt a block of data and strip the trailing zero padding.
    /// Plaintexts ending in NUL bytes are therefore not representable.
    pub fn decrypt(&self, data: &[u8]) -> Vec<u8> {
        let mut v = bytes_to_words(data);
        decrypt_words(&mut v, &self.key);
        let mut out = words_to_bytes(&v);
        while out.last() == Some(&0) {
            out.pop();
        }
        out
    }
}

fn bytes_to_words(data: &[u8]) -> Vec<u32> {
    data.chunks(4)
        .map(|chunk| {
            let mut b = [0u8; 4];
            b[..chunk.len()].copy_from_slice(chunk);
            u32::from_le_bytes(b)
        })
        .collect()
}

fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn mx(y: u32, z: u32, sum: u32, p: usize, e: u32, key: &[u32; 4]) -> u32 {
    let a = ((z >> 5) ^ (y << 2)).wrapping_add((y >> 3) ^ (z << 4));
    let b = (sum ^ y).wrapping_add(key[(p & 3) ^ e as usize] ^ z);
    a ^ b
}

// Messages shorter than two words are not transformed; the round structure
// needs at least a pair of neighbours.
fn encrypt_words(v: &mut [u32], key: &[u32; 4]) {
    let n = v.len();
    if n < 2 {
        return;
    }
    let rounds = 6 + 52 / n;
    let mut sum: u32 = 0;
    let mut z = v[n - 1];
    for _ in 0..rounds {
        sum = sum.wrapping_add(DELTA);
        let e = (sum >> 2) & 3;
        for p in 0..n - 1 {
            let y = v[p + 1];
            v[p] = v[p].wrapping_add(mx(y, z, sum, p, e, key));
            z = v[p];
        }
        let y = v[0];
        v[n - 1] = v[n - 1].wrapping_add(mx(y, z, sum, n - 1, e, key));
        z = v[n - 1];
    }
}

fn decrypt_words(v: &mut [u32], key: &[u32; 4]) {
    let n = v.len();
    if n < 2 {
        return;
    }
    let rounds = 6 + 52 / n;
    let mut sum = (rounds as u32).wrapping_mul(DELTA);
    let mut y = v[0];
    while sum != 0 {
        let e = (sum >> 2) & 3;
        for p in (1..n).rev() {
            let z = v[p - 1];
            v[p] = v[p].wrapping_sub(mx(y, z, sum, p, e, key));
            y = v[p];
        }
        let z = v[n - 1];
        v[0] = v[0].wrapping_sub(mx(y, z, sum, 0, e, key));
        y = v[0];
        sum = sum.wrapping_sub(DELTA);
    }
}

/// CRC32 of the UTF-8 bytes, as 8 uppercase hex digits, zero-padded.
fn hex_checksum(data: &str) -> String {
    format!("{:08X}", crc32fast::hash(data.as_bytes()))
}

/// Produce the `metadata1` form value for a plaintext fingerprint.
pub fn encrypt_metadata(metadata: &str) -> Result<String, EnhanceError> {
    let cipher = Xxtea::new(&METADATA_KEY)?;
    let composite = format!("{}#{}", hex_checksum(metadata), metadata);
    let encrypted = cipher.encrypt(composite.as_bytes());
    Ok(format!("{BLOB_TAG}{}", BASE64.encode(encrypted)))
}

/// Inverse of [`encrypt_metadata`]; verifies the embedded checksum.
pub fn decrypt_metadata(blob: &str) -> Result<String, EnhanceError> {
    let b64 = blob
        .strip_prefix(BLOB_TAG)
        .ok_or_else(|| EnhanceError::Cipher("blob is missing its tag".into()))?;
    let raw = BASE64
        .decode(b64)
        .map_err(|e| EnhanceError::Cipher(format!("blob is not valid base64: {e}")))?;
    let cipher = Xxtea::new(&METADATA_KEY)?;
    let text = String::from_utf8(cipher.decrypt(&raw))
        .map_err(|_| EnhanceError::Cipher("decrypted blob is not UTF-8".into()))?;
    let (checksum, metadata) = text
        .split_once('#')
        .ok_or_else(|| EnhanceError::Cipher("decrypted blob has no checksum".into()))?;
    if hex_checksum(metadata) != checksum {
        return Err(EnhanceError::Cipher("checksum mismatch".into()));
    }
    Ok(metadata.to_string())
}

const METADATA_TEMPLATE: &str = include_str!("device_metadata.json");

/// Render the device fingerprint JSON for a desktop sign-in: the embedded
/// template with user agent, current time and form location substituted,
/// re-serialized compactly.
pub fn device_metadata(user_agent: &str, oauth_url: &str) -> Result<String, EnhanceError> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let filled = METADATA_TEMPLATE
        .replace("{{USER_AGENT}}", user_agent)
        .replace("{{TIME_NOW}}", &now_ms.to_string())
        .replace("{{LOCATION}}", oauth_url);
    let value: serde_json::Value = serde_json::from_str(&filled)
        .map_err(|e| EnhanceError::Cipher(format!("metadata template is not valid JSON: {e}")))?;
    serde_json::to_string(&value)
        .map_err(|e| EnhanceError::Cipher(format!("cannot serialize metadata: {e}")))
}
