//! Check-summed base32 for human-copyable strings (public keys, invitations).
//!
//! Payloads get a 4-byte double-SHA-256 checksum appended, then the whole is
//! packed MSB-first into 5-bit groups over a fixed 32-character alphabet. The
//! alphabet omits the easily-confused I, L, O and U and is arranged so that
//! well-known prefix bytes render as readable prefixes (ed25519 public keys
//! carry `[238, 78]` and encode to `EPK…`).

use crate::*;
use sha2::{Digest, Sha256};

const ALPHABET: &[u8; 32] = b"0123456K89ABCDXFGHJ7MNSQRPTVWEYZ";

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(&Sha256::digest(payload));
    [digest[0], digest[1], digest[2], digest[3]]
}

fn decode_value(c: char) -> Result<u32> {
    ALPHABET
        .iter()
        .position(|&a| a as char == c)
        .map(|i| i as u32)
        .ok_or(Error::InvalidCharacter(c))
}

fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity((data.len() * 8 + 4) / 5);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for &b in data {
        acc = acc << 8 | b as u32;
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[(acc >> bits) as usize & 0x1f] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[(acc << (5 - bits)) as usize & 0x1f] as char);
    }
    out
}

fn decode(s: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(s.len() * 5 / 8);
    let mut acc: u32 = 0;
    let mut bits = 0;
    for c in s.chars() {
        acc = acc << 5 | decode_value(c)?;
        bits += 5;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
        }
    }
    // Trailing bits are encoder padding and must be zero.
    if acc & ((1 << bits) - 1) != 0 {
        return Err(Error::InvalidChecksum);
    }
    Ok(out)
}

pub fn check_encode(payload: &[u8]) -> String {
    let mut data = payload.to_vec();
    data.extend_from_slice(&checksum(payload));
    encode(&data)
}

pub fn check_decode(s: &str) -> Result<Vec<u8>> {
    let data = decode(s)?;
    if data.len() < 4 {
        return Err(Error::InvalidChecksum);
    }
    let (payload, check) = data.split_at(data.len() - 4);
    if checksum(payload) != check {
        return Err(Error::InvalidChecksum);
    }
    Ok(payload.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        for len in &[0usize, 1, 4, 31, 32, 33, 64] {
            let payload: Vec<u8> = (0..*len as u8).collect();
            let s = check_encode(&payload);
            assert_eq!(check_decode(&s).unwrap(), payload);
        }
    }

    #[test]
    fn epk_prefix() {
        let mut payload = vec![238u8, 78];
        payload.extend_from_slice(&[0x5a; 32]);
        let s = check_encode(&payload);
        assert!(s.starts_with("EPK"), "got {}", s);

        let mut payload = vec![238u8, 78];
        payload.extend_from_slice(&[0x07; 32]);
        assert!(check_encode(&payload).starts_with("EPK"));
    }

    #[test]
    fn corruption_detected() {
        let s = check_encode(b"invitation payload");
        let mut chars: Vec<char> = s.chars().collect();
        let replacement = if chars[2] == 'A' { 'B' } else { 'A' };
        chars[2] = replacement;
        let corrupted: String = chars.into_iter().collect();
        assert!(check_decode(&corrupted).is_err());
    }

    #[test]
    fn rejects_foreign_characters() {
        assert!(matches!(
            check_decode("ab!cd"),
            Err(Error::InvalidCharacter('!'))
        ));
        // 'L' is not in the alphabet
        assert!(check_decode("LLLL").is_err());
    }
}
