//! In-memory test models.

use glam::{Mat4, Quat, Vec3};
use serde_json::{json, Value};
use std::collections::HashMap;

use super::loader::{MeshData, PrimitiveData, SceneGraph, SkinData};

/// Wrap a glTF JSON document into a GLB container (JSON chunk only).
pub fn glb(document: &Value) -> Vec<u8> {
    glb_with_bin(document, &[])
}

/// Wrap a glTF JSON document and an optional binary buffer into a GLB.
pub fn glb_with_bin(document: &Value, bin: &[u8]) -> Vec<u8> {
    let mut json = serde_json::to_vec(document).unwrap();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let mut total = 12 + 8 + json.len();
    if !bin.is_empty() {
        total += 8 + bin.len();
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(&0x4E4F_534Au32.to_le_bytes());
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(&0x004E_4942u32.to_le_bytes());
        out.extend_from_slice(&bin);
    }
    out
}

/// A skinned triangle: three positions, but only `skin_count` entries in
/// JOINTS_0 and WEIGHTS_0. Node 0 carries the mesh, node 1 is the bone.
pub fn skinned_glb(skin_count: usize) -> Vec<u8> {
    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];

    let mut bin = Vec::new();
    for p in positions.iter().flatten() {
        bin.extend_from_slice(&p.to_le_bytes());
    }
    let joints_offset = bin.len();
    for _ in 0..skin_count {
        for j in [0u16; 4] {
            bin.extend_from_slice(&j.to_le_bytes());
        }
    }
    let weights_offset = bin.len();
    for _ in 0..skin_count {
        for w in [1.0f32, 0.0, 0.0, 0.0] {
            bin.extend_from_slice(&w.to_le_bytes());
        }
    }

    let document = json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 1] }],
        "nodes": [
            { "name": "Body", "mesh": 0, "skin": 0 },
            { "name": "Bone" }
        ],
        "skins": [{ "joints": [1] }],
        "meshes": [{
            "primitives": [{
                "attributes": { "POSITION": 0, "JOINTS_0": 1, "WEIGHTS_0": 2 }
            }]
        }],
        "buffers": [{ "byteLength": bin.len() }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": joints_offset },
            { "buffer": 0, "byteOffset": joints_offset, "byteLength": weights_offset - joints_offset },
            { "buffer": 0, "byteOffset": weights_offset, "byteLength": bin.len() - weights_offset }
        ],
        "accessors": [
            {
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0]
            },
            { "bufferView": 1, "componentType": 5123, "count": skin_count, "type": "VEC4" },
            { "bufferView": 2, "componentType": 5126, "count": skin_count, "type": "VEC4" }
        ]
    });

    glb_with_bin(&document, &bin)
}

/// A minimal VRM 1.0 rig: Root → Hips (y=1.0) → Spine (y=0.3) → Head (y=0.4).
///
/// The Head node (and its humanoid entry) exists only when `with_head`;
/// the Hips humanoid entry only when `with_hips`.
pub fn rig_json(with_hips: bool, with_head: bool) -> Value {
    let mut nodes = vec![
        json!({ "name": "Root", "children": [1] }),
        json!({ "name": "Hips", "translation": [0.0, 1.0, 0.0], "children": [2] }),
        json!({ "name": "Spine", "translation": [0.0, 0.3, 0.0] }),
    ];
    let mut bones = serde_json::Map::new();
    bones.insert("spine".into(), json!({ "node": 2 }));
    if with_hips {
        bones.insert("hips".into(), json!({ "node": 1 }));
    }
    if with_head {
        nodes[2]["children"] = json!([3]);
        nodes.push(json!({ "name": "Head", "translation": [0.0, 0.4, 0.0] }));
        bones.insert("head".into(), json!({ "node": 3 }));
    }

    json!({
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0] }],
        "nodes": nodes,
        "extensions": {
            "VRMC_vrm": {
                "specVersion": "1.0",
                "humanoid": { "humanBones": bones }
            }
        }
    })
}

/// The same rig as [`rig_json`] with both bones, in VRM 0.x form: a
/// `VRM` extension whose `humanBones` is an array of `{ bone, node }`.
pub fn rig_json_0x() -> Value {
    let mut document = rig_json(true, true);
    document["extensions"] = json!({
        "VRM": {
            "specVersion": "0.0",
            "humanoid": {
                "humanBones": [
                    { "bone": "hips", "node": 1 },
                    { "bone": "spine", "node": 2 },
                    { "bone": "head", "node": 3 }
                ]
            }
        }
    });
    document
}

/// A plain glTF with no VRM extension at all.
pub fn plain_json() -> Value {
    json!({
        "asset": { "version": "2.0" },
        "nodes": [
            { "name": "Root", "children": [1] },
            { "name": "Body", "translation": [0.0, 1.0, 0.0] }
        ]
    })
}

/// A two-bone skinned strip built directly, bypassing the parser.
///
/// Node 0 is the root bone at the origin, node 1 a child bone at y=1.
/// Vertex 0 is bound fully to node 0, vertex 1 fully to node 1, vertex 2
/// half to each.
pub fn skinned_scene() -> SceneGraph {
    let positions = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(1.0, 1.0, 0.0),
        Vec3::new(0.5, 0.5, 0.0),
    ];
    let primitive = PrimitiveData {
        normals: vec![Vec3::Z; positions.len()],
        indices: vec![0, 1, 2],
        joints: vec![[0, 0, 0, 0], [1, 0, 0, 0], [0, 1, 0, 0]],
        weights: vec![
            [1.0, 0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0, 0.0],
            [0.5, 0.5, 0.0, 0.0],
        ],
        base_color: [1.0, 1.0, 1.0, 1.0],
        positions,
    };

    let mut mesh_skin = HashMap::new();
    mesh_skin.insert(0, 0);
    let mut mesh_node = HashMap::new();
    mesh_node.insert(0, 2);

    SceneGraph {
        name: "strip.glb".to_string(),
        node_names: vec![Some("Root".into()), Some("Tip".into()), Some("Mesh".into())],
        rest_translations: vec![Vec3::ZERO, Vec3::new(0.0, 1.0, 0.0), Vec3::ZERO],
        rest_rotations: vec![Quat::IDENTITY; 3],
        rest_scales: vec![Vec3::ONE; 3],
        parents: vec![None, Some(0), None],
        node_count: 3,
        meshes: vec![MeshData {
            primitives: vec![primitive],
        }],
        skins: vec![SkinData {
            joints: vec![0, 1],
            inverse_bind_matrices: vec![
                Mat4::IDENTITY,
                Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)),
            ],
        }],
        mesh_skin,
        mesh_node,
        extensions: json!({
            "VRMC_vrm": { "humanoid": { "humanBones": {
                "hips": { "node": 0 },
                "head": { "node": 1 }
            } } }
        }),
    }
}
