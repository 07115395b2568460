//! JSON inventory of a decoded container.
//!
//! Asset-pipeline tooling wants a cheap answer to "what is in this world
//! file" without holding the decoded container itself.  The manifest is
//! that answer: per-kind counts, the named-fragment index, and summary
//! rows for the heavyweight kinds.  It round-trips through JSON like the
//! rest of the sidecar metadata in this family of tools.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::container::WldContainer;
use crate::fragment::{FragmentKind, MeshDefFragment, SkeletonDefFragment};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct NamedFragment {
    pub index: usize,
    pub kind: u32,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MeshSummary {
    pub index: usize,
    pub name: Option<String>,
    pub vertices: usize,
    pub polygons: usize,
    pub material_groups: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SkeletonSummary {
    pub index: usize,
    pub name: Option<String>,
    pub nodes: usize,
    pub skin_meshes: usize,
}

/// Summary of one decoded container.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Manifest {
    pub version: u32,
    pub fragment_count: usize,
    /// Counts keyed by kind name; unknown kinds pool under `"generic"`.
    pub kind_counts: BTreeMap<String, usize>,
    pub named_fragments: Vec<NamedFragment>,
    pub meshes: Vec<MeshSummary>,
    pub skeletons: Vec<SkeletonSummary>,
}

impl Manifest {
    pub fn from_container(container: &WldContainer) -> Self {
        let mut kind_counts = BTreeMap::new();
        for kind in FragmentKind::ALL {
            let n = container.kind_count(kind);
            if n > 0 {
                kind_counts.insert(kind.name().to_string(), n);
            }
        }
        let generic = container
            .fragments()
            .iter()
            .filter(|f| f.kind().is_none())
            .count();
        if generic > 0 {
            kind_counts.insert("generic".to_string(), generic);
        }

        let named_fragments = container
            .fragments()
            .iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                entry.name.as_ref().map(|name| NamedFragment {
                    index,
                    kind: entry.kind_tag,
                    name: name.clone(),
                })
            })
            .collect();

        let meshes = container
            .of_kind(FragmentKind::MeshDef)
            .filter_map(|(index, entry)| {
                let mesh: &MeshDefFragment = container.fetch_at(index)?;
                Some(MeshSummary {
                    index,
                    name: entry.name.clone(),
                    vertices: mesh.vertex_count(),
                    polygons: mesh.polygon_count(),
                    material_groups: mesh.material_groups.len(),
                })
            })
            .collect();

        let skeletons = container
            .of_kind(FragmentKind::SkeletonDef)
            .filter_map(|(index, entry)| {
                let def: &SkeletonDefFragment = container.fetch_at(index)?;
                Some(SkeletonSummary {
                    index,
                    name: entry.name.clone(),
                    nodes: def.node_count(),
                    skin_meshes: def.mesh_refs.len(),
                })
            })
            .collect();

        Self {
            version: container.header().version,
            fragment_count: container.len(),
            kind_counts,
            named_fragments,
            meshes,
            skeletons,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
