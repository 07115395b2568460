//! Container decode engine — header, string table, and the three-pass
//! fragment pipeline.
//!
//! # Decode passes
//!
//! The fragment stream is walked three times:
//!
//! 1. **Count** — headers only, payloads skipped, per-kind tallies.  The
//!    stream must contain exactly the declared number of fragments; any
//!    shortfall, overrun, or trailing bytes is fatal.
//! 2. **Allocate** — one dense index array per known kind is pre-sized
//!    from the tallies, so later fragments can reference earlier ones by
//!    stable position without relocation.
//! 3. **Decode** — headers and payloads in file order; every record lands
//!    in its kind's array and on the single global file-order list (the
//!    positional-reference index space).
//!
//! The container is the arena: it exclusively owns every decoded fragment
//! and the string table, and all derived views (skeletons, meshes,
//! manifests) hold integer handles into the global list.  The fragment
//! graph can form cycles across kinds, so views never borrow individual
//! fragments.
//!
//! # Reference encoding
//!
//! References are `i32`: `0` is null, a negative value is a byte offset
//! into the string table (negated), a positive value is a 1-based index
//! into the global list.  Resolution never fails hard — dangling values
//! come back [`Ref::Unresolved`] and the domain layer decides severity.
//!
//! # Endianness
//!
//! All binary I/O is strictly little-endian.  No runtime negotiation is
//! ever performed.

use std::collections::HashMap;

use log::{debug, trace};

use crate::error::{Result, WldError};
use crate::field::FieldReader;
use crate::fragment::{
    decode_body, FragmentBody, FragmentHeader, FragmentKind, FragmentVariant,
    MaterialDefFragment, MaterialPaletteFragment, MaterialRange, MeshDefFragment,
};
use crate::strings::StringTable;

// ── Header ────────────────────────────────────────────────────────────────────

pub const MAGIC: u32 = 0x54503D02;
/// The classic container revision.
pub const VERSION_OLD: u32 = 0x0001_5500;
/// The late-era revision; identical at this layer.
pub const VERSION_NEW: u32 = 0x1000_C800;
/// On-disk size of the container header: 7 × u32.
pub const HEADER_SIZE: usize = 28;

#[derive(Debug, Clone, Copy)]
pub struct ContainerHeader {
    pub magic: u32,
    pub version: u32,
    pub fragment_count: u32,
    pub unknown1: u32,
    pub unknown2: u32,
    pub string_data_size: u32,
    pub unknown3: u32,
}

impl ContainerHeader {
    pub fn read(reader: &mut FieldReader<'_>) -> Result<Self> {
        let header = Self {
            magic: reader.read_u32()?,
            version: reader.read_u32()?,
            fragment_count: reader.read_u32()?,
            unknown1: reader.read_u32()?,
            unknown2: reader.read_u32()?,
            string_data_size: reader.read_u32()?,
            unknown3: reader.read_u32()?,
        };
        if header.magic != MAGIC {
            return Err(WldError::InvalidMagic {
                found: header.magic,
            });
        }
        if header.version != VERSION_OLD && header.version != VERSION_NEW {
            return Err(WldError::UnsupportedVersion(header.version));
        }
        Ok(header)
    }
}

// ── Fragment entries ──────────────────────────────────────────────────────────

/// One record on the global file-order list.
#[derive(Debug, Clone)]
pub struct FragmentEntry {
    /// Raw on-disk kind tag (kept even for unknown kinds).
    pub kind_tag: u32,
    pub name: Option<String>,
    pub body: FragmentBody,
}

impl FragmentEntry {
    pub fn kind(&self) -> Option<FragmentKind> {
        self.body.kind()
    }
}

/// A decoded reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ref {
    Null,
    /// Negative encoding: the referenced name.
    Named(String),
    /// Positive encoding: 0-based index into the global fragment list.
    ByIndex(usize),
    /// Dangling string offset or out-of-range index.
    Unresolved,
}

// ── Container ─────────────────────────────────────────────────────────────────

/// A fully decoded .wld container.
///
/// Construction is all-or-nothing: every fragment is decoded before the
/// value exists, so no partial or streaming state is ever observable.
#[derive(Debug)]
pub struct WldContainer {
    header: ContainerHeader,
    strings: StringTable,
    fragments: Vec<FragmentEntry>,
    by_kind: HashMap<FragmentKind, Vec<usize>>,
    by_name: HashMap<String, usize>,
}

impl WldContainer {
    /// Decode a container from raw file bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = FieldReader::new(data);
        let header = ContainerHeader::read(&mut reader)?;
        debug!(
            "container: version {:#010x}, {} fragment(s) declared, {} string byte(s)",
            header.version, header.fragment_count, header.string_data_size
        );

        let strings = StringTable::from_encoded(reader.read_bytes(header.string_data_size as usize)?);
        let stream = reader.read_bytes(reader.remaining())?;

        // Pass 1: count.
        let counts = Self::count_pass(stream, header.fragment_count)?;

        // Pass 2: allocate.
        let mut by_kind: HashMap<FragmentKind, Vec<usize>> = HashMap::new();
        for kind in FragmentKind::ALL {
            let n = counts.get(&kind.tag()).copied().unwrap_or(0) as usize;
            if n > 0 {
                by_kind.insert(kind, Vec::with_capacity(n));
            }
        }

        // Pass 3: decode.
        let mut fragments: Vec<FragmentEntry> = Vec::with_capacity(header.fragment_count as usize);
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut reader = FieldReader::new(stream);
        for index in 0..header.fragment_count as usize {
            let frag_header = FragmentHeader::read(&mut reader)?;
            let payload = reader.read_bytes(frag_header.payload_len()?)?;

            let name = if frag_header.name_ref < 0 {
                strings.lookup(-(frag_header.name_ref as i64) as usize)
            } else {
                None
            };

            let body =
                decode_body(frag_header.kind, payload).map_err(|e| WldError::FragmentDecode {
                    index,
                    kind: frag_header.kind,
                    source: Box::new(e),
                })?;

            match body.kind() {
                Some(kind) => {
                    by_kind.entry(kind).or_default().push(index);
                    trace!(
                        "fragment {index}: {} ({:?})",
                        kind.name(),
                        name.as_deref().unwrap_or("<anonymous>")
                    );
                }
                None => {
                    debug!(
                        "fragment {index}: unknown kind {:#04x}, stored as generic",
                        frag_header.kind
                    );
                }
            }
            if let Some(n) = &name {
                // First fragment wins on duplicate names.
                by_name.entry(n.clone()).or_insert(index);
            }
            fragments.push(FragmentEntry {
                kind_tag: frag_header.kind,
                name,
                body,
            });
        }

        if fragments.len() != header.fragment_count as usize {
            return Err(WldError::FragmentCountMismatch {
                declared: header.fragment_count,
                found: fragments.len() as u32,
            });
        }

        Ok(Self {
            header,
            strings,
            fragments,
            by_kind,
            by_name,
        })
    }

    /// Header-only scan: tally fragments per kind tag and verify the
    /// stream holds exactly the declared count.
    fn count_pass(stream: &[u8], declared: u32) -> Result<HashMap<u32, u32>> {
        let mut reader = FieldReader::new(stream);
        let mut counts: HashMap<u32, u32> = HashMap::new();
        let mut total: u32 = 0;
        while !reader.at_end() {
            let offset = reader.position();
            let header = FragmentHeader::read(&mut reader)?;
            reader.skip(header.payload_len()?).map_err(|_| {
                WldError::StructuralCorruption(format!(
                    "fragment at stream offset {offset} declares {} payload byte(s) past the end",
                    header.size
                ))
            })?;
            *counts.entry(header.kind).or_insert(0) += 1;
            total += 1;
        }
        if total != declared {
            return Err(WldError::FragmentCountMismatch {
                declared,
                found: total,
            });
        }
        Ok(counts)
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn strings(&self) -> &StringTable {
        &self.strings
    }

    /// The global file-order fragment list.
    pub fn fragments(&self) -> &[FragmentEntry] {
        &self.fragments
    }

    pub fn fragment(&self, index: usize) -> Option<&FragmentEntry> {
        self.fragments.get(index)
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// File-order indices of every fragment of `kind`.
    pub fn indices_of_kind(&self, kind: FragmentKind) -> &[usize] {
        self.by_kind.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn kind_count(&self, kind: FragmentKind) -> usize {
        self.indices_of_kind(kind).len()
    }

    /// Iterate `(file_order_index, entry)` over every fragment of `kind`.
    pub fn of_kind(
        &self,
        kind: FragmentKind,
    ) -> impl Iterator<Item = (usize, &FragmentEntry)> + '_ {
        self.indices_of_kind(kind)
            .iter()
            .map(move |&i| (i, &self.fragments[i]))
    }

    /// File-order index of the first fragment carrying `name`.
    pub fn index_of_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Resolve a fragment header's name reference (negative values only).
    pub fn name_of(&self, name_ref: i32) -> Option<String> {
        if name_ref < 0 {
            self.strings.lookup(-(name_ref as i64) as usize)
        } else {
            None
        }
    }

    // ── Reference resolution ─────────────────────────────────────────────────

    /// Decode an encoded reference value.  Total — dangling values resolve
    /// to [`Ref::Unresolved`], never an error.
    pub fn resolve(&self, encoded: i32) -> Ref {
        match encoded {
            0 => Ref::Null,
            n if n < 0 => match self.strings.lookup(-(n as i64) as usize) {
                Some(name) => Ref::Named(name),
                None => Ref::Unresolved,
            },
            n => {
                let index = n as usize - 1;
                if index < self.fragments.len() {
                    Ref::ByIndex(index)
                } else {
                    Ref::Unresolved
                }
            }
        }
    }

    /// Resolve a reference all the way to a file-order index, following
    /// name references through the name map.
    pub fn resolve_index(&self, encoded: i32) -> Option<usize> {
        match self.resolve(encoded) {
            Ref::ByIndex(index) => Some(index),
            Ref::Named(name) => self.index_of_name(&name),
            Ref::Null | Ref::Unresolved => None,
        }
    }

    /// Resolve a reference and narrow the target to fragment type `K`.
    ///
    /// `None` on null, dangling, or kind-mismatched references — the
    /// closed-enum substitute for a virtual downcast.
    pub fn fetch<K: FragmentVariant>(&self, encoded: i32) -> Option<&K> {
        self.fetch_at(self.resolve_index(encoded)?)
    }

    /// Typed access to the fragment at a file-order index.
    pub fn fetch_at<K: FragmentVariant>(&self, index: usize) -> Option<&K> {
        K::from_body(&self.fragments.get(index)?.body)
    }

    /// Typed access by fragment name.
    pub fn fetch_named<K: FragmentVariant>(&self, name: &str) -> Option<&K> {
        self.fetch_at(self.index_of_name(name)?)
    }

    /// Iterate every fragment of `K`'s kind, typed, with file-order
    /// indices.
    pub fn iter_kind<'a, K: FragmentVariant + 'a>(&'a self) -> impl Iterator<Item = (usize, &'a K)> + 'a {
        self.indices_of_kind(K::KIND)
            .iter()
            .filter_map(move |&i| Some((i, K::from_body(&self.fragments[i].body)?)))
    }

    // ── Domain helpers ───────────────────────────────────────────────────────

    /// Material draw ranges for a mesh, with palette-level visibility
    /// applied: a range whose material has render mode 0 is cleared to
    /// invisible on top of the mesh-level id-0 rule.  Unresolvable
    /// materials stay visible — a mesh with no material is legal.
    pub fn draw_ranges(&self, mesh: &MeshDefFragment) -> Vec<MaterialRange> {
        let palette: Option<&MaterialPaletteFragment> = self.fetch(mesh.material_palette_ref);
        let mut ranges = mesh.material_ranges();
        let Some(palette) = palette else {
            return ranges;
        };
        for range in &mut ranges {
            if !range.visible {
                continue;
            }
            let material: Option<&MaterialDefFragment> = range
                .palette_slot()
                .and_then(|slot| palette.material_refs.get(slot))
                .and_then(|&r| self.fetch(r));
            if material.is_some_and(MaterialDefFragment::is_invisible) {
                range.visible = false;
            }
        }
        ranges
    }
}
