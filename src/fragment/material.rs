//! Material, palette, sprite, and bitmap-name fragments.
//!
//! The texture chain is four kinds deep: a mesh's material groups index
//! into a palette (0x31), whose entries reference material definitions
//! (0x30), which reference a sprite (0x05 → 0x04) that finally names its
//! bitmaps (0x03).  Each layer is decoded independently; the container
//! stitches them together through reference resolution.

use crate::error::Result;
use crate::field::FieldReader;

// ── 0x03 bitmap names ─────────────────────────────────────────────────────────

/// 0x03 — list of bitmap filenames.
///
/// Filenames are stored XOR-scrambled outside the shared string table;
/// each entry is a u16 length (NUL included) followed by the scrambled
/// bytes.
#[derive(Debug, Clone)]
pub struct BitmapNameFragment {
    pub filenames: Vec<String>,
}

impl BitmapNameFragment {
    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let count = reader.read_u32()? as usize;
        let mut filenames = Vec::with_capacity(count.min(reader.remaining() / 2));
        for _ in 0..count {
            let len = reader.read_u16()? as usize;
            filenames.push(reader.read_encoded_string(len)?);
        }
        Ok(Self { filenames })
    }
}

// ── 0x04 / 0x05 sprites ───────────────────────────────────────────────────────

/// 0x04 — an animated texture: an ordered set of bitmap references with
/// optional frame-cycling state.
#[derive(Debug, Clone)]
pub struct SpriteDefFragment {
    pub flags: u32,
    /// Starting frame index (flag bit 2).
    pub current_frame: Option<u32>,
    /// Frame delay in milliseconds (flag bit 3).
    pub sleep: Option<u32>,
    pub bitmap_refs: Vec<i32>,
}

impl SpriteDefFragment {
    const HAS_CURRENT_FRAME: u32 = 0x04;
    const HAS_SLEEP: u32 = 0x08;

    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let flags = reader.read_u32()?;
        let count = reader.read_u32()? as usize;
        let current_frame = if flags & Self::HAS_CURRENT_FRAME != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let sleep = if flags & Self::HAS_SLEEP != 0 {
            Some(reader.read_u32()?)
        } else {
            None
        };
        let mut bitmap_refs = Vec::with_capacity(count.min(reader.remaining() / 4));
        for _ in 0..count {
            bitmap_refs.push(reader.read_reference()?);
        }
        Ok(Self {
            flags,
            current_frame,
            sleep,
            bitmap_refs,
        })
    }
}

/// 0x05 — sprite instance.
#[derive(Debug, Clone)]
pub struct SpriteFragment {
    pub def_ref: i32,
    pub flags: u32,
}

impl SpriteFragment {
    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        Ok(Self {
            def_ref: reader.read_reference()?,
            flags: reader.read_u32()?,
        })
    }
}

// ── 0x30 material definition ──────────────────────────────────────────────────

/// How a material's texels combine with what is already in the frame
/// buffer.  Derived from the low byte of the render-mode field; values
/// observed in shipped world files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransparencyMode {
    Opaque,
    /// Color-key masked: texel 0 is a hole.
    Masked,
    SemiTransparent,
    Additive,
    Unknown(u8),
}

/// 0x30 — material definition.
#[derive(Debug, Clone)]
pub struct MaterialDefFragment {
    pub flags: u32,
    /// Primary render-mode field; 0 means the material is never drawn.
    pub render_mode: u32,
    /// Packed RGBA pen color used when no texture is bound.
    pub rgb_pen: u32,
    pub brightness: f32,
    pub scaled_ambient: f32,
    pub sprite_ref: i32,
    /// Extra UV-shift pair (flag bit 1).
    pub params: Option<[f32; 2]>,
}

impl MaterialDefFragment {
    const HAS_PARAMS: u32 = 0x02;

    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let flags = reader.read_u32()?;
        let render_mode = reader.read_u32()?;
        let rgb_pen = reader.read_u32()?;
        let brightness = reader.read_f32()?;
        let scaled_ambient = reader.read_f32()?;
        let sprite_ref = reader.read_reference()?;
        let params = if flags & Self::HAS_PARAMS != 0 {
            Some([reader.read_f32()?, reader.read_f32()?])
        } else {
            None
        };
        Ok(Self {
            flags,
            render_mode,
            rgb_pen,
            brightness,
            scaled_ambient,
            sprite_ref,
            params,
        })
    }

    /// A render mode of 0 marks a material that is never drawn; its mesh
    /// ranges still occupy cursor space (see `mesh.rs`).
    pub fn is_invisible(&self) -> bool {
        self.render_mode == 0
    }

    pub fn transparency(&self) -> TransparencyMode {
        match (self.render_mode & 0xFF) as u8 {
            0x01 => TransparencyMode::Opaque,
            0x13 => TransparencyMode::Masked,
            0x05 => TransparencyMode::SemiTransparent,
            0x0B => TransparencyMode::Additive,
            other => TransparencyMode::Unknown(other),
        }
    }
}

// ── 0x31 material palette ─────────────────────────────────────────────────────

/// 0x31 — the ordered material list a mesh's material-group ids index into.
#[derive(Debug, Clone)]
pub struct MaterialPaletteFragment {
    pub flags: u32,
    pub material_refs: Vec<i32>,
}

impl MaterialPaletteFragment {
    pub(crate) fn decode(reader: &mut FieldReader<'_>) -> Result<Self> {
        let flags = reader.read_u32()?;
        let count = reader.read_u32()? as usize;
        let mut material_refs = Vec::with_capacity(count.min(reader.remaining() / 4));
        for _ in 0..count {
            material_refs.push(reader.read_reference()?);
        }
        Ok(Self {
            flags,
            material_refs,
        })
    }

    pub fn len(&self) -> usize {
        self.material_refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.material_refs.is_empty()
    }
}
