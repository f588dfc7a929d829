//! Storage keys for calls.
//!
//! The key is the base64 SHA-256 of
//! `"{interface} - {signature} - {arguments}[ - {salt}]"`, where the
//! argument list renders canonically as one bracketed sequence. Changing the
//! salt moves every key of a provider at once.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hoard_core::{Invocation, Value};
use sha2::{Digest, Sha256};

/// Derive the storage key for `call`
pub fn fingerprint(call: &Invocation, salt: Option<&str>) -> String {
    let mut text = String::with_capacity(128);
    text.push_str(&call.method.interface);
    text.push_str(" - ");
    text.push_str(&call.method.signature());
    text.push_str(" - ");
    write_arguments(&call.args, &mut text);
    if let Some(salt) = salt.filter(|s| !s.is_empty()) {
        text.push_str(" - ");
        text.push_str(salt);
    }

    let digest = Sha256::digest(text.as_bytes());
    STANDARD.encode(digest)
}

fn write_arguments(args: &[Value], out: &mut String) {
    out.push('[');
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        arg.write_canonical(out);
    }
    out.push(']');
}
