//! String blob codec and offset-addressed string table.
//!
//! All names in a .wld container live in one shared blob directly after the
//! 28-byte header.  The blob is scrambled with a fixed 8-byte XOR key and
//! holds NUL-delimited Latin-1 strings; fragments refer to them by byte
//! offset (negative reference values — see `container.rs`).
//!
//! The XOR transform is an involution: applying it twice yields the input,
//! for any byte sequence.  It is a scramble, not cryptography — there is no
//! key material outside the format specification.

// ── XOR codec ─────────────────────────────────────────────────────────────────

/// The fixed 8-byte key every .wld string blob is XOR-scrambled with.
pub const XOR_KEY: [u8; 8] = [0x95, 0x3A, 0xC5, 0x2A, 0x95, 0x7A, 0x95, 0x6A];

/// XOR `data` with [`XOR_KEY`], cycling the key every 8 bytes.
///
/// Self-inverse: `decode_in_place` applied twice restores the input.
pub fn decode_in_place(data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= XOR_KEY[i % XOR_KEY.len()];
    }
}

/// Copying variant of [`decode_in_place`].
pub fn decode(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    decode_in_place(&mut out);
    out
}

/// Decode bytes as Latin-1: every byte maps to the code point of the same
/// value.  Total — cannot fail, for any input.
pub fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

// ── StringTable ───────────────────────────────────────────────────────────────

/// The decoded string blob of one container.
///
/// Lookups address the blob by byte offset and return the NUL-terminated
/// span starting there.  Offsets need not land on a string start: the
/// format is free to point mid-string (suffix sharing), so any in-range
/// offset is valid.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    data: Vec<u8>,
}

impl StringTable {
    /// Build a table from the raw (still XOR-scrambled) blob bytes.
    pub fn from_encoded(raw: &[u8]) -> Self {
        Self { data: decode(raw) }
    }

    /// Build a table from already-decoded bytes.
    pub fn from_decoded(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The string starting at `offset`, up to (not including) the first NUL.
    ///
    /// `None` if `offset` is at or past the end of the blob.  A span with no
    /// terminating NUL runs to the end of the blob.  Never panics.
    pub fn lookup(&self, offset: usize) -> Option<String> {
        self.lookup_raw(offset).map(latin1)
    }

    /// Raw-byte variant of [`lookup`](Self::lookup).
    pub fn lookup_raw(&self, offset: usize) -> Option<&[u8]> {
        if offset >= self.data.len() {
            return None;
        }
        let tail = &self.data[offset..];
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        Some(&tail[..end])
    }

    /// Iterate all NUL-delimited entries with their starting offsets.
    pub fn iter(&self) -> impl Iterator<Item = (usize, String)> + '_ {
        let mut offset = 0usize;
        std::iter::from_fn(move || {
            while offset < self.data.len() && self.data[offset] == 0 {
                offset += 1;
            }
            if offset >= self.data.len() {
                return None;
            }
            let start = offset;
            let raw = self.lookup_raw(start)?;
            offset = start + raw.len();
            Some((start, latin1(raw)))
        })
    }
}
