//! Fixed-width, NUL-padded ASCII name fields.
//!
//! Lump and patch names are 8 bytes on the wire; ANIMATED/SWITCHES texture
//! names are 9.  In memory every name is a trimmed `String`.

use std::io::{self, Read, Write};

/// Read an `N`-byte NUL-padded name and trim it at the first NUL.
pub fn read_name<const N: usize>(r: &mut impl Read) -> io::Result<String> {
    let mut raw = [0u8; N];
    r.read_exact(&mut raw)?;
    Ok(unpack_name(&raw))
}

/// Write `name` into an `N`-byte field: truncated if longer, NUL-padded
/// if shorter.
pub fn write_name<const N: usize>(w: &mut impl Write, name: &str) -> io::Result<()> {
    let mut raw = [0u8; N];
    let bytes = name.as_bytes();
    let len = bytes.len().min(N);
    raw[..len].copy_from_slice(&bytes[..len]);
    w.write_all(&raw)
}

/// Trim a padded field at the first NUL.
pub fn unpack_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
