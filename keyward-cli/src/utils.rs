//! Common utility functions shared across CLI commands.

use std::io::Read;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ciborium::value::Value;
use keyward_core::ByteSequence;
use tracing::debug;

/// Decode a hex or base64url argument. Hex is tried first since every hex
/// string is also valid base64url.
pub fn decode_text(text: &str) -> Result<Vec<u8>> {
    let text = text.trim();
    if text.is_empty() {
        bail!("Failed to decode input: empty");
    }
    if let Ok(bytes) = ByteSequence::from_hex(text) {
        debug!(encoding = "hex", bytes = bytes.len(), "Decoded input");
        return Ok(bytes.as_bytes().to_vec());
    }
    let bytes = ByteSequence::from_base64url(text)
        .context("Failed to decode input (expected hex or base64url)")?;
    debug!(encoding = "base64url", bytes = bytes.len(), "Decoded input");
    Ok(bytes.as_bytes().to_vec())
}

/// Load binary input from an argument that is either `-` (stdin), a path
/// to a file, or inline hex/base64url text.
///
/// File contents that look like text are decoded as hex/base64url; anything
/// else is taken as raw bytes.
pub fn load_input(arg: &str) -> Result<Vec<u8>> {
    let raw = if arg == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else if Path::new(arg).is_file() {
        std::fs::read(arg).with_context(|| format!("Failed to read input file: {}", arg))?
    } else if looks_like_path(arg) {
        bail!("Failed to read input file: {} (not found)", arg);
    } else {
        return decode_text(arg);
    };

    match std::str::from_utf8(&raw) {
        Ok(text) if is_encoded_text(text) => decode_text(text),
        _ => Ok(raw),
    }
}

/// Neither hex nor base64url ever contains these.
fn looks_like_path(arg: &str) -> bool {
    arg.contains(['/', '\\', '.'])
}

fn is_encoded_text(text: &str) -> bool {
    let text = text.trim();
    !text.is_empty()
        && text
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'=')
}

/// Render a CBOR value compactly for terminal output.
pub fn describe_cbor(value: &Value) -> String {
    match value {
        Value::Integer(i) => i128::from(*i).to_string(),
        Value::Bytes(b) => format!("h'{}' ({} bytes)", abbreviate(&hex::encode(b)), b.len()),
        Value::Text(s) => format!("{:?}", s),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => format!("[{} items]", items.len()),
        Value::Map(entries) => format!("{{{} entries}}", entries.len()),
        other => format!("{:?}", other),
    }
}

/// Shorten long hex strings to `head…tail`.
pub fn abbreviate(hex: &str) -> String {
    if hex.len() <= 40 {
        hex.to_string()
    } else {
        format!("{}…{}", &hex[..16], &hex[hex.len() - 16..])
    }
}
