//! GLB/VRM scene loader using the `gltf` crate.
//!
//! Extracts the node hierarchy, rest-pose transforms, skins, meshes and the
//! raw top-level `extensions` object (where the VRM humanoid lives) from a
//! glTF document or GLB binary.

use glam::{Mat4, Quat, Vec3};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use super::source::ByteSource;
use crate::error::LoadError;

const GLB_MAGIC: &[u8; 4] = b"glTF";
const GLB_CHUNK_JSON: u32 = 0x4E4F_534A;

/// Generic scene graph produced by the loader.
pub struct SceneGraph {
    /// Name of the file it came from
    pub name: String,
    /// Node names (None for unnamed nodes)
    pub node_names: Vec<Option<String>>,
    /// Skeleton: node index → rest-pose local transform
    pub rest_translations: Vec<Vec3>,
    pub rest_rotations: Vec<Quat>,
    pub rest_scales: Vec<Vec3>,
    /// Parent map: child node → parent node (None if root)
    pub parents: Vec<Option<usize>>,
    /// Total number of nodes
    pub node_count: usize,
    /// Per-mesh geometry
    pub meshes: Vec<MeshData>,
    /// Skin data (joint lists + inverse bind matrices)
    pub skins: Vec<SkinData>,
    /// Which skin each mesh uses: mesh_index → skin_index
    pub mesh_skin: HashMap<usize, usize>,
    /// Which node instances each mesh: mesh_index → node_index
    pub mesh_node: HashMap<usize, usize>,
    /// Top-level glTF `extensions` object (Null when absent)
    pub extensions: Value,
}

pub struct SkinData {
    pub joints: Vec<usize>,
    pub inverse_bind_matrices: Vec<Mat4>,
}

/// All geometry data for one mesh (potentially multiple primitives).
pub struct MeshData {
    pub primitives: Vec<PrimitiveData>,
}

/// Geometry for a single primitive.
pub struct PrimitiveData {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Per-vertex joint indices (4 per vertex)
    pub joints: Vec<[u16; 4]>,
    /// Per-vertex joint weights (4 per vertex)
    pub weights: Vec<[f32; 4]>,
    /// Base color factor from material (RGBA)
    pub base_color: [f32; 4],
}

impl std::fmt::Debug for SceneGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneGraph")
            .field("name", &self.name)
            .field("node_count", &self.node_count)
            .field("meshes", &self.meshes.len())
            .field("skins", &self.skins.len())
            .finish_non_exhaustive()
    }
}

impl SceneGraph {
    pub fn vertex_count(&self) -> usize {
        self.meshes
            .iter()
            .flat_map(|m| m.primitives.iter())
            .map(|p| p.positions.len())
            .sum()
    }
}

/// Read and parse a byte source.
pub fn load(source: &ByteSource) -> Result<SceneGraph, LoadError> {
    let name = source.name();
    let bytes = source.read()?;
    let base = match source {
        ByteSource::Path(path) => path.parent(),
        ByteSource::Memory { .. } => None,
    };
    parse(&name, &bytes, base)
}

/// [`load`] on the blocking pool.
pub async fn load_async(source: ByteSource) -> Result<SceneGraph, LoadError> {
    tokio::task::spawn_blocking(move || load(&source))
        .await
        .map_err(join_error)?
}

/// Parse glTF JSON or GLB bytes into a scene graph.
///
/// `base` resolves relative buffer URIs; in-memory sources have none, so
/// only embedded (GLB or data URI) buffers load.
pub fn parse(name: &str, bytes: &[u8], base: Option<&Path>) -> Result<SceneGraph, LoadError> {
    let parse_error = |message: String| LoadError::Parse {
        name: name.to_string(),
        message,
    };

    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(bytes).map_err(|e| parse_error(e.to_string()))?;
    let buffers = gltf::import_buffers(&document, base, blob)
        .map_err(|e| parse_error(format!("buffers: {}", e)))?;
    let buf = &buffers;

    let extensions = parse_extensions(bytes).map_err(parse_error)?;

    // Build parent map
    let node_count = document.nodes().count();
    let mut parents = vec![None; node_count];
    for node in document.nodes() {
        for child in node.children() {
            parents[child.index()] = Some(node.index());
        }
    }

    // Parse rest-pose transforms
    let mut node_names = Vec::with_capacity(node_count);
    let mut rest_translations = Vec::with_capacity(node_count);
    let mut rest_rotations = Vec::with_capacity(node_count);
    let mut rest_scales = Vec::with_capacity(node_count);
    for node in document.nodes() {
        let (t, r, s) = node.transform().decomposed();
        node_names.push(node.name().map(str::to_owned));
        rest_translations.push(Vec3::from(t));
        rest_rotations.push(Quat::from_array(r));
        rest_scales.push(Vec3::from(s));
    }

    // Parse skins
    let mut skins = Vec::new();
    for skin in document.skins() {
        let joints: Vec<usize> = skin.joints().map(|j| j.index()).collect();
        let reader = skin.reader(|buffer| Some(&buf[buffer.index()]));
        let ibms: Vec<Mat4> = reader
            .read_inverse_bind_matrices()
            .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
            .unwrap_or_else(|| vec![Mat4::IDENTITY; joints.len()]);

        skins.push(SkinData {
            joints,
            inverse_bind_matrices: ibms,
        });
    }

    // Map mesh → skin and mesh → node
    let mut mesh_skin = HashMap::new();
    let mut mesh_node = HashMap::new();
    for node in document.nodes() {
        if let Some(mesh) = node.mesh() {
            mesh_node.entry(mesh.index()).or_insert(node.index());
            if let Some(skin) = node.skin() {
                mesh_skin.insert(mesh.index(), skin.index());
            }
        }
    }

    // Parse meshes
    let mut meshes = Vec::new();
    for mesh in document.meshes() {
        let mut primitives = Vec::new();

        for prim in mesh.primitives() {
            let reader = prim.reader(|buffer| Some(&buf[buffer.index()]));

            let positions: Vec<Vec3> = reader
                .read_positions()
                .map(|iter| iter.map(Vec3::from).collect())
                .unwrap_or_default();

            let normals: Vec<Vec3> = reader
                .read_normals()
                .map(|iter| iter.map(Vec3::from).collect())
                .unwrap_or_else(|| vec![Vec3::Y; positions.len()]);

            // Non-indexed primitives draw their vertices in order
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|iter| iter.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());

            let joints: Vec<[u16; 4]> = reader
                .read_joints(0)
                .map(|iter| iter.into_u16().collect())
                .unwrap_or_else(|| vec![[0; 4]; positions.len()]);

            let weights: Vec<[f32; 4]> = reader
                .read_weights(0)
                .map(|iter| iter.into_f32().collect())
                .unwrap_or_else(|| vec![[1.0, 0.0, 0.0, 0.0]; positions.len()]);

            check_primitive(
                mesh.index(),
                prim.index(),
                &positions,
                &normals,
                &joints,
                &weights,
                &indices,
            )
            .map_err(parse_error)?;

            let base_color = prim.material().pbr_metallic_roughness().base_color_factor();

            primitives.push(PrimitiveData {
                positions,
                normals,
                indices,
                joints,
                weights,
                base_color,
            });
        }

        meshes.push(MeshData { primitives });
    }

    Ok(SceneGraph {
        name: name.to_string(),
        node_names,
        rest_translations,
        rest_rotations,
        rest_scales,
        parents,
        node_count,
        meshes,
        skins,
        mesh_skin,
        mesh_node,
        extensions,
    })
}

/// Every vertex attribute must have one entry per position, and every
/// index must point at a vertex.
fn check_primitive(
    mesh: usize,
    primitive: usize,
    positions: &[Vec3],
    normals: &[Vec3],
    joints: &[[u16; 4]],
    weights: &[[f32; 4]],
    indices: &[u32],
) -> Result<(), String> {
    let count = positions.len();
    for (attribute, len) in [
        ("NORMAL", normals.len()),
        ("JOINTS_0", joints.len()),
        ("WEIGHTS_0", weights.len()),
    ] {
        if len != count {
            return Err(format!(
                "mesh {} primitive {}: {} has {} entries but POSITION has {}",
                mesh, primitive, attribute, len, count
            ));
        }
    }

    if let Some(&index) = indices.iter().find(|&&i| i as usize >= count) {
        return Err(format!(
            "mesh {} primitive {}: index {} out of range for {} vertices",
            mesh, primitive, index, count
        ));
    }

    Ok(())
}

/// Read the top-level `extensions` object from the raw JSON.
///
/// The `gltf` crate does not expose unknown extensions, so the JSON is
/// read again: the first chunk of a GLB, or the whole input otherwise.
fn parse_extensions(bytes: &[u8]) -> Result<Value, String> {
    let json = json_chunk(bytes).ok_or_else(|| "truncated GLB JSON chunk".to_string())?;
    let root: Value =
        serde_json::from_slice(json).map_err(|e| format!("JSON parse error: {}", e))?;
    Ok(root.get("extensions").cloned().unwrap_or(Value::Null))
}

fn json_chunk(bytes: &[u8]) -> Option<&[u8]> {
    if !bytes.starts_with(GLB_MAGIC) {
        return Some(bytes);
    }

    // GLB format: 12-byte header + chunks
    // Header: magic(4) + version(4) + length(4)
    // Chunk: length(4) + type(4) + data(length)
    if bytes.len() < 20 {
        return None;
    }
    let json_length = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;
    let chunk_type = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    if chunk_type != GLB_CHUNK_JSON {
        return None;
    }
    bytes.get(20..20 + json_length)
}

/// Map a blocking-task join failure onto the load error space.
pub(crate) fn join_error(e: tokio::task::JoinError) -> LoadError {
    if e.is_cancelled() {
        LoadError::Cancelled
    } else {
        LoadError::Task(e.to_string())
    }
}
