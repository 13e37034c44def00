//! Mojibake recovery — spec.md section 4.4.
//!
//! Grounded on `original_source/geo_server/utils/encoding.py`'s
//! `ensure_utf8_string`: strings are checked for the "UTF-8 bytes decoded
//! as Latin-1" pattern and repaired by re-encoding as Latin-1 and
//! re-decoding as UTF-8; a one-level double-encoding undo is attempted the
//! same way. Both repairs are idempotent by construction — a string with
//! no code points above 127 is returned unchanged.

/// Repairs a string already in Rust's `String` type (i.e. already valid
/// UTF-8, but possibly mojibake from an upstream double-decode).
#[must_use]
pub fn repair_encoding(text: &str) -> String {
    if !text.chars().any(|c| c as u32 > 127) {
        return text.to_string();
    }

    if let Some(fixed) = try_latin1_reencode(text) {
        return fixed;
    }

    text.to_string()
}

/// Repairs raw bytes of unknown encoding: tries UTF-8, then GBK, GB2312,
/// then Latin-1, then falls back to lossy UTF-8 replacement — the same
/// encoding ladder as the Python original.
#[must_use]
pub fn repair_encoding_bytes(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return repair_encoding(s);
    }

    for encoding in [encoding_rs::GBK, encoding_rs::GB18030] {
        let (decoded, _, had_errors) = encoding.decode(bytes);
        if !had_errors {
            return repair_encoding(&decoded);
        }
    }

    let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    repair_encoding(&decoded)
}

/// Re-encodes `text` as Latin-1 and decodes the bytes as UTF-8. Returns
/// `Some` only when the result plausibly fixes mojibake: it contains a CJK
/// Unified Ideograph, or the input no longer shows the contiguous C1
/// control-range byte pattern (0x80-0x9F) typical of raw mis-decoded bytes.
fn try_latin1_reencode(text: &str) -> Option<String> {
    let latin1_bytes: Vec<u8> = text
        .chars()
        .map(|c| u8::try_from(c as u32).ok())
        .collect::<Option<Vec<u8>>>()?;

    let fixed = String::from_utf8(latin1_bytes).ok()?;
    if fixed.is_empty() {
        return None;
    }

    let has_chinese = fixed.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c));
    let has_garbled_pattern = text
        .chars()
        .take(100)
        .any(|c| (c as u32) > 127 && (c as u32) < 160);

    if has_chinese || !has_garbled_pattern {
        Some(fixed)
    } else {
        None
    }
}
