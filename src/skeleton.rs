//! Skeleton view: node tree, bind pose, and the named animation map.
//!
//! # Track naming
//!
//! Track names follow the container's fixed prefix convention: a
//! bind-pose track is `<MODEL><BONE>` (3-char model code), an animation
//! track is `<ANIM><MODEL><BONE>` (3-char animation code, then the model
//! code).  Stripping either prefix yields the same bone suffix, and that
//! suffix is how a generically named track finds its node slot: the bind
//! pose fixes one channel per node, and every animation cloned from it
//! gets channels swapped in by suffix match.  The prefix lengths are
//! fixed by the format.
//!
//! A [`Skeleton`] holds integer handles into the container it was built
//! from, never borrows; rebuilding after the container is gone is not
//! supported.

use std::collections::{BTreeMap, HashSet};

use glam::Vec3;
use log::{debug, warn};

use crate::animation::{time_to_frame, Animation, BoneTransform, Channel};
use crate::container::WldContainer;
use crate::error::{Result, WldError};
use crate::fragment::{FragmentKind, SkeletonDefFragment, TrackDefFragment, TrackFragment};

/// Name of the bind-pose animation every skeleton carries.
pub const BIND_POSE: &str = "POS";
/// Chars of animation code prefixing an animation track name.
pub const ANIM_CODE_LEN: usize = 3;
/// Chars of model code prefixing a bind-pose track name.
pub const MODEL_CODE_LEN: usize = 3;

// ── Name slicing ──────────────────────────────────────────────────────────────

/// Drop the first `n` chars; names shorter than `n` pass through whole.
fn strip_chars(name: &str, n: usize) -> &str {
    match name.char_indices().nth(n) {
        Some((i, _)) => &name[i..],
        None => name,
    }
}

/// Bone suffix of an animation track name (`<ANIM><MODEL><BONE>`).
pub fn track_suffix(name: &str) -> &str {
    strip_chars(name, ANIM_CODE_LEN + MODEL_CODE_LEN)
}

/// Bone suffix of a bind-pose track name (`<MODEL><BONE>`).
pub fn pose_suffix(name: &str) -> &str {
    strip_chars(name, MODEL_CODE_LEN)
}

/// Animation code of an animation track name, when it is long enough to
/// carry one.
fn anim_code(name: &str) -> Option<&str> {
    let cut = name.char_indices().nth(ANIM_CODE_LEN)?.0;
    (name.char_indices().count() > ANIM_CODE_LEN + MODEL_CODE_LEN).then_some(&name[..cut])
}

/// Model code of an animation track name (chars 3..6).
fn track_model_code(name: &str) -> Option<&str> {
    let start = name.char_indices().nth(ANIM_CODE_LEN)?.0;
    let end = name.char_indices().nth(ANIM_CODE_LEN + MODEL_CODE_LEN)?.0;
    Some(&name[start..end])
}

// ── Nodes ─────────────────────────────────────────────────────────────────────

/// One bone of the rig.
#[derive(Debug, Clone)]
pub struct SkeletonNode {
    pub name: Option<String>,
    pub flags: u32,
    /// Handle of the node's bind-pose track definition fragment.
    pub track_def: Option<usize>,
    /// Handle of the sprite/mesh fragment attached to this bone, if any.
    pub attachment: Option<usize>,
    /// Child node indices.
    pub children: Vec<usize>,
}

// ── Skeleton ──────────────────────────────────────────────────────────────────

/// A posed rig: the node tree of one skeleton-definition fragment plus
/// its named animations.
#[derive(Debug, Clone)]
pub struct Skeleton {
    pub nodes: Vec<SkeletonNode>,
    /// Named animations; always contains [`BIND_POSE`].
    pub animations: BTreeMap<String, Animation>,
    /// Model code of the rig, from its definition fragment's name.
    pub model_code: Option<String>,
    pub center_offset: Option<Vec3>,
    pub bounding_radius: Option<f32>,
    /// Handles of the skin meshes driven by this rig.
    pub mesh_handles: Vec<usize>,
    /// Track-instance handles consumed by the bind pose; animation
    /// attachment skips these.
    pose_track_instances: HashSet<usize>,
}

impl Skeleton {
    /// Build the rig from the skeleton-definition fragment at
    /// `def_index` in the container's global list.
    ///
    /// The node tree is validated here: a root must exist, child indices
    /// must be in range, and no node may be reached twice (the walk in
    /// [`pose_at_frame`](Self::pose_at_frame) recurses on this
    /// guarantee).  Dangling track references are tolerated — the node's
    /// channel decodes as an empty (identity) channel.
    pub fn from_container(container: &WldContainer, def_index: usize) -> Result<Self> {
        let entry = container.fragment(def_index).ok_or_else(|| {
            WldError::StructuralCorruption(format!("no fragment at index {def_index}"))
        })?;
        let def: &SkeletonDefFragment = container.fetch_at(def_index).ok_or_else(|| {
            WldError::StructuralCorruption(format!(
                "fragment {def_index} is not a skeleton definition"
            ))
        })?;
        if def.nodes.is_empty() {
            return Err(WldError::StructuralCorruption(
                "skeleton definition has no root node".into(),
            ));
        }
        Self::validate_tree(def)?;

        let model_code = entry.name.as_deref().map(|n| {
            let cut = n
                .char_indices()
                .nth(MODEL_CODE_LEN)
                .map(|(i, _)| i)
                .unwrap_or(n.len());
            n[..cut].to_string()
        });

        let mut nodes = Vec::with_capacity(def.nodes.len());
        let mut channels = Vec::with_capacity(def.nodes.len());
        let mut pose_track_instances = HashSet::new();

        for node_def in &def.nodes {
            let instance_index = container.resolve_index(node_def.track_ref);
            let instance: Option<&TrackFragment> =
                instance_index.and_then(|i| container.fetch_at(i));
            let track_def_index =
                instance.and_then(|t| container.resolve_index(t.track_def_ref));
            let track_def: Option<&TrackDefFragment> =
                track_def_index.and_then(|i| container.fetch_at(i));

            if let Some(i) = instance_index {
                pose_track_instances.insert(i);
            }

            let node_name = container.name_of(node_def.name_ref);
            // The track definition's own name carries the canonical
            // <MODEL><BONE> spelling; the node name is the fallback.
            let channel_name = track_def_index
                .and_then(|i| container.fragment(i))
                .and_then(|e| e.name.clone())
                .or_else(|| node_name.clone())
                .unwrap_or_default();
            let frames = track_def.map(|t| t.frames.clone()).unwrap_or_default();
            if track_def.is_none() {
                warn!(
                    "skeleton node {:?}: bind-pose track unresolved, using identity",
                    node_name.as_deref().unwrap_or("<anonymous>")
                );
            }
            channels.push(Channel::with_suffix(
                channel_name.clone(),
                pose_suffix(&channel_name).to_string(),
                frames,
            ));

            nodes.push(SkeletonNode {
                name: node_name,
                flags: node_def.flags,
                track_def: track_def_index,
                attachment: container.resolve_index(node_def.sprite_ref),
                children: node_def.children.iter().map(|&c| c as usize).collect(),
            });
        }

        let mut animations = BTreeMap::new();
        animations.insert(BIND_POSE.to_string(), Animation::new(BIND_POSE, channels));

        let mesh_handles = def
            .mesh_refs
            .iter()
            .filter_map(|&r| container.resolve_index(r))
            .collect();

        Ok(Self {
            nodes,
            animations,
            model_code,
            center_offset: def.center_offset,
            bounding_radius: def.bounding_radius,
            mesh_handles,
            pose_track_instances,
        })
    }

    /// Reject out-of-range children and any node reachable twice from the
    /// root.
    fn validate_tree(def: &SkeletonDefFragment) -> Result<()> {
        let len = def.nodes.len();
        let mut seen = vec![false; len];
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            if seen[index] {
                return Err(WldError::StructuralCorruption(format!(
                    "skeleton node {index} is reached twice — the tree is cyclic"
                )));
            }
            seen[index] = true;
            for &child in &def.nodes[index].children {
                let child = child as usize;
                if child >= len {
                    return Err(WldError::StructuralCorruption(format!(
                        "skeleton node {index} names child {child}, but only {len} node(s) exist"
                    )));
                }
                stack.push(child);
            }
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ── Animation map mutation ───────────────────────────────────────────────

    /// Place a track onto its node slot in the named animation.
    ///
    /// If `anim_name` is new, the animation is created by cloning the
    /// bind pose's channel shape (same count and order).  The channel
    /// whose stable suffix matches the track's stripped name gets its
    /// frames and name replaced.  Returns whether a channel matched; a
    /// zero-match replace is a warning and leaves the animation's
    /// channels untouched.
    pub fn add_track(
        &mut self,
        anim_name: &str,
        track_name: &str,
        frames: Vec<BoneTransform>,
        sleep: Option<u32>,
    ) -> bool {
        if !self.ensure_animation(anim_name, sleep) {
            return false;
        }
        let suffix = track_suffix(track_name).to_string();
        let matched = self.replace_channel(anim_name, &suffix, track_name, frames);
        if !matched {
            warn!("add_track({anim_name}): no channel matches suffix {suffix:?} of {track_name:?}");
        }
        matched
    }

    /// Borrow every animation `other` has that this rig lacks.
    ///
    /// Each one is deep-copied through the same clone-then-replace-by-
    /// suffix procedure as [`add_track`], so the copy works between any
    /// two rigs whose bone suffixes line up (topologically identical
    /// rigs with different model codes).
    pub fn copy_animations_from(&mut self, other: &Skeleton) {
        for (name, anim) in &other.animations {
            if name == BIND_POSE || self.animations.contains_key(name) {
                continue;
            }
            if !self.ensure_animation(name, anim.sleep) {
                continue;
            }
            let mut any = false;
            for channel in &anim.channels {
                any |= self.replace_channel(
                    name,
                    &channel.suffix,
                    &channel.name,
                    channel.frames.clone(),
                );
            }
            if !any {
                debug!("copy_animations_from: no channel of {name:?} matched this rig");
            }
        }
    }

    /// Create `anim_name` as a clone of the bind pose's channel shape if
    /// it does not exist yet.
    fn ensure_animation(&mut self, anim_name: &str, sleep: Option<u32>) -> bool {
        if self.animations.contains_key(anim_name) {
            if sleep.is_some() {
                if let Some(anim) = self.animations.get_mut(anim_name) {
                    anim.sleep = sleep;
                }
            }
            return true;
        }
        let Some(pose) = self.animations.get(BIND_POSE) else {
            warn!("animation {anim_name:?}: skeleton has no bind pose to clone");
            return false;
        };
        let mut fresh = pose.clone();
        fresh.name = anim_name.to_string();
        fresh.sleep = sleep;
        self.animations.insert(anim_name.to_string(), fresh);
        true
    }

    /// Swap frames into the channel whose stable suffix matches.
    fn replace_channel(
        &mut self,
        anim_name: &str,
        suffix: &str,
        track_name: &str,
        frames: Vec<BoneTransform>,
    ) -> bool {
        let Some(anim) = self.animations.get_mut(anim_name) else {
            return false;
        };
        let Some(channel) = anim.channels.iter_mut().find(|c| c.suffix == suffix) else {
            return false;
        };
        channel.name = track_name.to_string();
        channel.frames = frames;
        anim.refresh_frame_count();
        true
    }

    /// Scan the container for animation track instances belonging to
    /// this rig and place them all.
    ///
    /// Bind-pose instances (the ones the tree consumed) are skipped; so
    /// are tracks whose embedded model code names a different rig.
    /// Returns the number of tracks placed.
    pub fn attach_container_tracks(&mut self, container: &WldContainer) -> usize {
        let mut placed = 0usize;
        let track_indices: Vec<usize> = container
            .indices_of_kind(FragmentKind::Track)
            .to_vec();
        for index in track_indices {
            if self.pose_track_instances.contains(&index) {
                continue;
            }
            let Some(entry) = container.fragment(index) else {
                continue;
            };
            let Some(name) = entry.name.clone() else {
                continue;
            };
            let Some(code) = anim_code(&name) else {
                continue;
            };
            if let (Some(model), Some(track_model)) =
                (self.model_code.as_deref(), track_model_code(&name))
            {
                if model != track_model {
                    continue;
                }
            }
            let Some(instance) = container.fetch_at::<TrackFragment>(index) else {
                continue;
            };
            let Some(def) = container.fetch::<TrackDefFragment>(instance.track_def_ref) else {
                warn!("track {name:?}: definition reference is dangling");
                continue;
            };
            let code = code.to_string();
            if self.add_track(&code, &name, def.frames.clone(), instance.sleep) {
                placed += 1;
            }
        }
        placed
    }

    // ── Sampling ─────────────────────────────────────────────────────────────

    /// Effective (model-space) transforms of every node at a fractional
    /// frame of the named animation.  `None` for an unknown animation.
    ///
    /// Pre-order walk from the root with the identity parent: each node's
    /// local sample composes onto its parent's effective transform and
    /// recurses into the children.
    pub fn pose_at_frame(&self, anim_name: &str, frame: f32) -> Option<Vec<BoneTransform>> {
        let anim = self.animations.get(anim_name)?;
        let mut out = vec![BoneTransform::IDENTITY; self.nodes.len()];
        if !self.nodes.is_empty() {
            self.walk(0, &BoneTransform::IDENTITY, anim, frame, &mut out);
        }
        Some(out)
    }

    /// Time-driven variant of [`pose_at_frame`](Self::pose_at_frame):
    /// seconds map onto the cyclic frame axis at the format's fixed rate.
    pub fn pose_at_time(&self, anim_name: &str, t: f32) -> Option<Vec<BoneTransform>> {
        let frame_count = self.animations.get(anim_name)?.frame_count;
        self.pose_at_frame(anim_name, time_to_frame(t, frame_count))
    }

    fn walk(
        &self,
        node: usize,
        parent: &BoneTransform,
        anim: &Animation,
        frame: f32,
        out: &mut [BoneTransform],
    ) {
        let local = anim.sample_node(node, frame);
        let effective = parent.compose(&local);
        out[node] = effective;
        for &child in &self.nodes[node].children {
            if child < self.nodes.len() {
                self.walk(child, &effective, anim, frame, out);
            }
        }
    }

    /// Dual-quaternion export of [`pose_at_frame`](Self::pose_at_frame)
    /// for GPU skinning.
    pub fn dual_quaternions_at_frame(
        &self,
        anim_name: &str,
        frame: f32,
    ) -> Option<Vec<crate::animation::DualQuat>> {
        Some(
            self.pose_at_frame(anim_name, frame)?
                .iter()
                .map(BoneTransform::to_dual_quaternion)
                .collect(),
        )
    }
}
