// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Small helpers shared by the per-version codecs.

use crate::Error;

pub(crate) fn u16_at(d: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([d[off], d[off + 1]])
}

pub(crate) fn u32_at(d: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([d[off], d[off + 1], d[off + 2], d[off + 3]])
}

pub(crate) fn u64_at(d: &[u8], off: usize) -> u64 {
    u64::from_be_bytes([
        d[off],
        d[off + 1],
        d[off + 2],
        d[off + 3],
        d[off + 4],
        d[off + 5],
        d[off + 6],
        d[off + 7],
    ])
}

pub(crate) fn mac_at(d: &[u8], off: usize) -> [u8; 6] {
    let mut m = [0u8; 6];
    m.copy_from_slice(&d[off..off + 6]);
    m
}

pub(crate) fn need(
    what: &'static str,
    d: &[u8],
    len: usize,
) -> Result<(), Error> {
    if d.len() < len {
        return Err(Error::TooShort(what, d.len()));
    }
    Ok(())
}

/// Emit `s` as a NUL-padded fixed-width field, truncating oversize input.
pub(crate) fn put_fixed_str(v: &mut Vec<u8>, s: &str, width: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(width);
    v.extend_from_slice(&bytes[..n]);
    v.resize(v.len() + (width - n), 0);
}

pub(crate) fn get_fixed_str(d: &[u8]) -> String {
    let end = d.iter().position(|&b| b == 0).unwrap_or(d.len());
    String::from_utf8_lossy(&d[..end]).into_owned()
}
