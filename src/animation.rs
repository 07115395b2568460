//! Rigid bone transforms and named animations.
//!
//! A [`BoneTransform`] is a rotation + translation pair (no scale — the
//! format has none at the bone level).  Composition is rotate-then-
//! translate, the convention the container's track fragments are quantized
//! against.  [`Animation`] bundles one [`Channel`] per skeleton node,
//! aligned by position; sampling interpolates between adjacent keyframes
//! with quaternion slerp and translation lerp.

use glam::{Quat, Vec3};

// ── Timing ────────────────────────────────────────────────────────────────────

/// Fixed playback rate of every animation in the format.
pub const FPS: f32 = 10.0;

/// Map wall-clock seconds onto the cyclic frame axis of an animation with
/// `frame_count` frames: `frame = (t mod (frame_count / fps)) * fps`.
///
/// Pure in `t`; periodic with period `frame_count / fps`.  Negative times
/// wrap backwards onto the same cycle.
pub fn time_to_frame(t: f32, frame_count: usize) -> f32 {
    if frame_count == 0 {
        return 0.0;
    }
    let period = frame_count as f32 / FPS;
    t.rem_euclid(period) * FPS
}

// ── BoneTransform ─────────────────────────────────────────────────────────────

/// One rigid transform: unit-quaternion rotation plus translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl BoneTransform {
    pub const IDENTITY: BoneTransform = BoneTransform {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Decode one quantized keyframe.
    ///
    /// Rotation is signed-16 `(w, x, y, z)` divided by its Euclidean norm;
    /// `w == 0` is the "not recorded" sentinel and decodes to the identity.
    /// Translation is signed-16 `(x, y, z)` divided by `scale`; `scale == 0`
    /// is the sentinel for zero translation.
    pub fn from_quantized(rot: [i16; 4], shift: [i16; 3], scale: i16) -> Self {
        let rotation = if rot[0] == 0 {
            Quat::IDENTITY
        } else {
            let (w, x, y, z) = (
                rot[0] as f32,
                rot[1] as f32,
                rot[2] as f32,
                rot[3] as f32,
            );
            let norm = (w * w + x * x + y * y + z * z).sqrt();
            Quat::from_xyzw(x / norm, y / norm, z / norm, w / norm)
        };
        let translation = if scale == 0 {
            Vec3::ZERO
        } else {
            Vec3::new(shift[0] as f32, shift[1] as f32, shift[2] as f32) / scale as f32
        };
        Self {
            rotation,
            translation,
        }
    }

    /// Parent ∘ child composition: the child translation is rotated by the
    /// parent rotation and offset by the parent translation; rotations
    /// multiply parent-first.
    pub fn compose(&self, child: &BoneTransform) -> BoneTransform {
        BoneTransform {
            rotation: self.rotation * child.rotation,
            translation: self.rotation * child.translation + self.translation,
        }
    }

    /// Slerp the rotation and lerp the translation toward `other` by `t`.
    pub fn interpolate(&self, other: &BoneTransform, t: f32) -> BoneTransform {
        BoneTransform {
            rotation: self.rotation.slerp(other.rotation, t),
            translation: self.translation.lerp(other.translation, t),
        }
    }

    /// Apply the transform to a point.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Convert to the dual-quaternion representation used for GPU skinning:
    /// `real` is the rotation, `dual` is ½ × (translation as a pure
    /// quaternion) × rotation.
    pub fn to_dual_quaternion(&self) -> DualQuat {
        let t = Quat::from_xyzw(self.translation.x, self.translation.y, self.translation.z, 0.0);
        let d = t * self.rotation;
        DualQuat {
            real: self.rotation,
            dual: Quat::from_xyzw(0.5 * d.x, 0.5 * d.y, 0.5 * d.z, 0.5 * d.w),
        }
    }
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Eight-component rigid-transform representation (rotation + translation).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualQuat {
    pub real: Quat,
    pub dual: Quat,
}

impl DualQuat {
    /// Flatten to `[real.xyzw, dual.xyzw]` for vertex-shader upload.
    pub fn to_array(&self) -> [f32; 8] {
        [
            self.real.x, self.real.y, self.real.z, self.real.w,
            self.dual.x, self.dual.y, self.dual.z, self.dual.w,
        ]
    }
}

// ── Channels & animations ─────────────────────────────────────────────────────

/// One bone's keyframe sequence within a named animation.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Full track name as stored in the container (prefix included).
    pub name: String,
    /// Stable bone suffix used for replace-by-name matching.  Survives
    /// channel replacement unchanged (the name does not).
    pub suffix: String,
    pub frames: Vec<BoneTransform>,
}

impl Channel {
    pub fn new(name: impl Into<String>, frames: Vec<BoneTransform>) -> Self {
        let name = name.into();
        Self {
            suffix: name.clone(),
            name,
            frames,
        }
    }

    pub fn with_suffix(
        name: impl Into<String>,
        suffix: impl Into<String>,
        frames: Vec<BoneTransform>,
    ) -> Self {
        Self {
            name: name.into(),
            suffix: suffix.into(),
            frames,
        }
    }

    /// Interpolated transform at a fractional frame position.
    ///
    /// Frames wrap: the frame after the last interpolates back toward the
    /// first, so sampling at `frames.len()` equals sampling at 0.  Empty
    /// channels yield the identity; single-frame channels are constant.
    pub fn sample(&self, frame: f32) -> BoneTransform {
        match self.frames.len() {
            0 => BoneTransform::IDENTITY,
            1 => self.frames[0],
            n => {
                let frame = frame.max(0.0);
                let i0 = (frame.floor() as usize) % n;
                let i1 = (i0 + 1) % n;
                self.frames[i0].interpolate(&self.frames[i1], frame.fract())
            }
        }
    }
}

/// A named bundle of per-node channels.
///
/// Channels align with skeleton nodes by position: `channels[i]` drives
/// node `i`.  The bind pose always has one channel per node; animations
/// cloned from it keep that shape and get channels swapped in by name
/// suffix (see `skeleton.rs`).
#[derive(Debug, Clone)]
pub struct Animation {
    pub name: String,
    pub channels: Vec<Channel>,
    /// Longest channel length; the cycle length used for time wrapping.
    pub frame_count: usize,
    /// Per-frame delay in milliseconds, when the container recorded one.
    pub sleep: Option<u32>,
}

impl Animation {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let frame_count = channels.iter().map(|c| c.frames.len()).max().unwrap_or(0);
        Self {
            name: name.into(),
            channels,
            frame_count,
            sleep: None,
        }
    }

    /// Recompute `frame_count` after channel replacement.
    pub fn refresh_frame_count(&mut self) {
        self.frame_count = self
            .channels
            .iter()
            .map(|c| c.frames.len())
            .max()
            .unwrap_or(0);
    }

    /// Cycle length in seconds at the format's fixed playback rate.
    pub fn duration(&self) -> f32 {
        self.frame_count as f32 / FPS
    }

    /// Sample the channel aligned with `node`; identity if out of range.
    pub fn sample_node(&self, node: usize, frame: f32) -> BoneTransform {
        self.channels
            .get(node)
            .map(|c| c.sample(frame))
            .unwrap_or(BoneTransform::IDENTITY)
    }
}
