//! Decoder for the legacy .wld world container format.
//!
//! A container is one header, one XOR-scrambled string blob, and a flat
//! stream of tagged binary records ("fragments") describing meshes,
//! materials, skeletons and animation tracks, densely cross-referenced
//! by file-order index or by name.
//!
//! ```no_run
//! use wld::{Skeleton, WldContainer};
//! use wld::fragment::FragmentKind;
//!
//! let bytes = std::fs::read("global_chr.wld")?;
//! let container = WldContainer::parse(&bytes)?;
//!
//! let &rig_index = container
//!     .indices_of_kind(FragmentKind::SkeletonDef)
//!     .first()
//!     .expect("no rig in this file");
//! let mut skeleton = Skeleton::from_container(&container, rig_index)?;
//! skeleton.attach_container_tracks(&container);
//! let pose = skeleton.pose_at_time("POS", 0.0);
//! # let _ = pose;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod animation;
pub mod container;
pub mod error;
pub mod field;
pub mod fragment;
pub mod manifest;
pub mod skeleton;
pub mod strings;

pub use animation::{Animation, BoneTransform, Channel, DualQuat};
pub use container::{ContainerHeader, FragmentEntry, Ref, WldContainer};
pub use error::{Result, WldError};
pub use field::{FieldReader, FieldValue};
pub use fragment::{FragmentBody, FragmentKind};
pub use manifest::Manifest;
pub use skeleton::Skeleton;
pub use strings::StringTable;
