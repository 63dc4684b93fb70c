//! CPU skinning: forward kinematics and linear blend skinning (LBS).

use glam::{Mat4, Quat, Vec3, Vec4};
use std::collections::HashMap;

use super::loader::SceneGraph;

/// Compute world transforms for all nodes using forward kinematics.
///
/// `local_rotations`: optional rotation overrides (node_index → quaternion).
/// Nodes without overrides use their rest-pose rotation.
pub fn compute_world_transforms(
    scene: &SceneGraph,
    local_rotations: &HashMap<usize, Quat>,
) -> Vec<Mat4> {
    let mut world = vec![Mat4::IDENTITY; scene.node_count];
    let mut visit = vec![Visit::Pending; scene.node_count];
    let mut chain = Vec::new();

    for start in 0..scene.node_count {
        // Walk up to the first resolved ancestor, nearest node first
        let mut idx = start;
        while visit[idx] == Visit::Pending {
            visit[idx] = Visit::InProgress;
            chain.push(idx);
            match scene.parents[idx] {
                Some(parent) => idx = parent,
                None => break,
            }
        }

        // Resolve from the top of the chain down. A parent still in
        // progress means a cycle; the node is treated as a root.
        while let Some(node) = chain.pop() {
            let local = local_transform(scene, local_rotations, node);
            world[node] = match scene.parents[node] {
                Some(parent) if visit[parent] == Visit::Done => world[parent] * local,
                _ => local,
            };
            visit[node] = Visit::Done;
        }
    }

    world
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Pending,
    InProgress,
    Done,
}

fn local_transform(
    scene: &SceneGraph,
    local_rotations: &HashMap<usize, Quat>,
    idx: usize,
) -> Mat4 {
    let r = local_rotations
        .get(&idx)
        .copied()
        .unwrap_or(scene.rest_rotations[idx]);
    Mat4::from_scale_rotation_translation(scene.rest_scales[idx], r, scene.rest_translations[idx])
}

/// Skin every primitive of a mesh.
///
/// Skinned meshes use linear blend skinning against `world_transforms`;
/// unskinned meshes are moved by the world transform of the node that
/// instances them. Returns positions per primitive.
pub fn skin_vertices(
    scene: &SceneGraph,
    mesh_idx: usize,
    world_transforms: &[Mat4],
) -> Vec<Vec<Vec3>> {
    let mesh = &scene.meshes[mesh_idx];

    let skin_idx = match scene.mesh_skin.get(&mesh_idx) {
        Some(&s) => s,
        None => {
            let node_world = scene
                .mesh_node
                .get(&mesh_idx)
                .map(|&node| world_transforms[node])
                .unwrap_or(Mat4::IDENTITY);
            return mesh
                .primitives
                .iter()
                .map(|p| {
                    p.positions
                        .iter()
                        .map(|&v| node_world.transform_point3(v))
                        .collect()
                })
                .collect();
        }
    };

    let skin = &scene.skins[skin_idx];

    // Precompute joint matrices: world[joint_node] * inverse_bind_matrix
    let joint_matrices: Vec<Mat4> = skin
        .joints
        .iter()
        .zip(skin.inverse_bind_matrices.iter())
        .map(|(&node_idx, ibm)| world_transforms[node_idx] * *ibm)
        .collect();

    let mut result = Vec::with_capacity(mesh.primitives.len());

    for prim in &mesh.primitives {
        let mut skinned = vec![Vec3::ZERO; prim.positions.len()];

        for (v_idx, pos) in prim.positions.iter().enumerate() {
            let j = prim.joints[v_idx];
            let w = prim.weights[v_idx];
            let p = Vec4::new(pos.x, pos.y, pos.z, 1.0);

            let mut result_pos = Vec4::ZERO;
            for k in 0..4 {
                if w[k] < 0.0001 {
                    continue;
                }
                let Some(jm) = joint_matrices.get(j[k] as usize) else {
                    continue;
                };
                result_pos += w[k] * (*jm * p);
            }

            skinned[v_idx] = result_pos.truncate();
        }

        result.push(skinned);
    }

    result
}

/// Skin all meshes of a scene.
pub fn skin_all(scene: &SceneGraph, world_transforms: &[Mat4]) -> Vec<Vec<Vec<Vec3>>> {
    (0..scene.meshes.len())
        .map(|mesh_idx| skin_vertices(scene, mesh_idx, world_transforms))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::fixtures;
    use std::f32::consts::FRAC_PI_2;

    fn assert_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{a:?} != {b:?}");
    }

    #[test]
    fn test_rest_pose_world_transforms() {
        let scene = fixtures::skinned_scene();
        let world = compute_world_transforms(&scene, &HashMap::new());

        assert_eq!(world.len(), scene.node_count);
        assert_close(world[1].w_axis.truncate(), Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_identity_skinning() {
        // At rest, joint matrices cancel against the inverse bind matrices
        let scene = fixtures::skinned_scene();
        let world = compute_world_transforms(&scene, &HashMap::new());
        let skinned = skin_vertices(&scene, 0, &world);

        for (a, b) in skinned[0].iter().zip(scene.meshes[0].primitives[0].positions.iter()) {
            assert_close(*a, *b);
        }
    }

    #[test]
    fn test_rotated_root_moves_children() {
        let scene = fixtures::skinned_scene();
        let mut rotations = HashMap::new();
        rotations.insert(0, Quat::from_rotation_z(FRAC_PI_2));

        let world = compute_world_transforms(&scene, &rotations);
        assert_close(world[1].w_axis.truncate(), Vec3::new(-1.0, 0.0, 0.0));

        let skinned = skin_vertices(&scene, 0, &world);
        assert_close(skinned[0][0], Vec3::ZERO);
        assert_close(skinned[0][1], Vec3::new(-1.0, 1.0, 0.0));
        assert_close(skinned[0][2], Vec3::new(-0.5, 0.5, 0.0));
    }

    #[test]
    fn test_unskinned_mesh_follows_its_node() {
        let mut scene = fixtures::skinned_scene();
        scene.mesh_skin.clear();
        scene.mesh_node.insert(0, 1);

        let world = compute_world_transforms(&scene, &HashMap::new());
        let moved = skin_all(&scene, &world);
        assert_close(moved[0][0][0], Vec3::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        const DEPTH: usize = 200_000;
        let mut scene = fixtures::skinned_scene();
        scene.meshes.clear();
        scene.mesh_skin.clear();
        scene.mesh_node.clear();
        scene.node_count = DEPTH;
        scene.node_names = vec![None; DEPTH];
        scene.rest_translations = vec![Vec3::Y; DEPTH];
        scene.rest_rotations = vec![Quat::IDENTITY; DEPTH];
        scene.rest_scales = vec![Vec3::ONE; DEPTH];
        // Children listed before parents to force the longest walk
        scene.parents = (0..DEPTH).map(|i| (i + 1 < DEPTH).then_some(i + 1)).collect();

        let world = compute_world_transforms(&scene, &HashMap::new());
        assert_eq!(world[DEPTH - 1].w_axis.y, 1.0);
        assert_eq!(world[0].w_axis.y, DEPTH as f32);
    }

    #[test]
    fn test_parent_cycle_terminates() {
        let mut scene = fixtures::skinned_scene();
        scene.parents = vec![Some(1), Some(0), None];

        let world = compute_world_transforms(&scene, &HashMap::new());
        assert_eq!(world.len(), 3);
    }
}
