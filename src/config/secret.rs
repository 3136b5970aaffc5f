//! Secret masking for values at rest.
//!
//! Secrets are keyed against a per-user random pad so they are not readable
//! in a casual `cat` of the config file. Values without the prefix are
//! legacy plaintext and are migrated by the store on load.

const MASK_PREFIX: &str = "masked:";

pub fn is_masked(value: &str) -> bool {
    value.starts_with(MASK_PREFIX)
}

pub fn mask(plain: &str, key: &[u8]) -> String {
    let mixed: Vec<u8> = plain
        .bytes()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect();
    format!("{}{}", MASK_PREFIX, encode_hex(&mixed))
}

/// Reverse [`mask`]. A value that does not carry the prefix, or whose
/// payload fails to decode, is returned unchanged as legacy plaintext.
pub fn unmask(value: &str, key: &[u8]) -> String {
    let Some(payload) = value.strip_prefix(MASK_PREFIX) else {
        return value.to_string();
    };
    let Some(mixed) = decode_hex(payload) else {
        return value.to_string();
    };
    let plain: Vec<u8> = mixed
        .iter()
        .enumerate()
        .map(|(i, b)| b ^ key[i % key.len()])
        .collect();
    String::from_utf8(plain).unwrap_or_else(|_| value.to_string())
}

pub fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    if hex.len() % 2 != 0 || !hex.is_ascii() {
        return None;
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).ok())
        .collect()
}
