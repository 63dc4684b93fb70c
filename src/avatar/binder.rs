//! Avatar binding: turns a generic scene graph into an avatar with a
//! humanoid rig, a mutable pose and a per-frame skinning update.

use glam::{EulerRot, Mat4, Quat, Vec3};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::humanoid::{HumanBone, Humanoid};
use super::loader::{join_error, SceneGraph};
use super::skinning;
use crate::error::{BindError, LoadError};

static NEXT_AVATAR_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a bound avatar, used to track its GPU resources.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AvatarId(u64);

impl AvatarId {
    fn next() -> Self {
        Self(NEXT_AVATAR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for AvatarId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "avatar#{}", self.0)
    }
}

/// The two bones the viewer needs, resolved to node indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rig {
    pub hips: usize,
    pub head: usize,
}

/// A bound humanoid model.
pub struct Avatar {
    id: AvatarId,
    scene: SceneGraph,
    humanoid: Option<Humanoid>,
    /// Euler XYZ rotation overrides (node → radians), on top of the rest pose
    pose: HashMap<usize, Vec3>,
    world: Vec<Mat4>,
    skinned: Vec<Vec<Vec<Vec3>>>,
    elapsed: f32,
}

/// Bind a scene graph.
///
/// A missing humanoid is not an error here; [`Avatar::rig`] reports it.
/// A humanoid that points outside the node table is.
pub fn bind(scene: SceneGraph) -> Result<Avatar, LoadError> {
    let humanoid = Humanoid::from_extensions(&scene.extensions);

    if let Some(ref humanoid) = humanoid {
        if let Some((bone, node)) = humanoid.bones().find(|&(_, node)| node >= scene.node_count) {
            return Err(LoadError::InvalidBoneNode {
                bone,
                node,
                node_count: scene.node_count,
            });
        }
    }

    let world = skinning::compute_world_transforms(&scene, &HashMap::new());
    let skinned = skinning::skin_all(&scene, &world);

    let avatar = Avatar {
        id: AvatarId::next(),
        scene,
        humanoid,
        pose: HashMap::new(),
        world,
        skinned,
        elapsed: 0.0,
    };

    tracing::info!(
        "Avatar bound: {} ({}), {} nodes, {} meshes, {} vertices, {} humanoid bones",
        avatar.scene.name,
        avatar.id,
        avatar.scene.node_count,
        avatar.scene.meshes.len(),
        avatar.scene.vertex_count(),
        avatar.humanoid.as_ref().map(Humanoid::len).unwrap_or(0),
    );

    Ok(avatar)
}

/// [`bind`] on the blocking pool.
pub async fn bind_async(scene: SceneGraph) -> Result<Avatar, LoadError> {
    tokio::task::spawn_blocking(move || bind(scene))
        .await
        .map_err(join_error)?
}

impl std::fmt::Debug for Avatar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Avatar")
            .field("id", &self.id)
            .field("name", &self.scene.name)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

impl Avatar {
    pub fn id(&self) -> AvatarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.scene.name
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn humanoid(&self) -> Option<&Humanoid> {
        self.humanoid.as_ref()
    }

    /// Node bound to a canonical bone, if the avatar has a humanoid.
    pub fn bone_node(&self, bone: HumanBone) -> Option<usize> {
        self.humanoid.as_ref()?.bone_node(bone)
    }

    /// Check the rig in order: humanoid, hips, head.
    pub fn rig(&self) -> Result<Rig, BindError> {
        let humanoid = self.humanoid.as_ref().ok_or(BindError::NoHumanoid)?;
        let hips = humanoid
            .bone_node(HumanBone::Hips)
            .ok_or(BindError::MissingBone(HumanBone::Hips))?;
        let head = humanoid
            .bone_node(HumanBone::Head)
            .ok_or(BindError::MissingBone(HumanBone::Head))?;
        Ok(Rig { hips, head })
    }

    /// Local Euler XYZ rotation of a bone, in radians.
    pub fn bone_rotation(&self, bone: HumanBone) -> Option<Vec3> {
        self.bone_node(bone).map(|node| self.node_rotation(node))
    }

    fn node_rotation(&self, node: usize) -> Vec3 {
        self.pose.get(&node).copied().unwrap_or_else(|| {
            let (x, y, z) = self.scene.rest_rotations[node].to_euler(EulerRot::XYZ);
            Vec3::new(x, y, z)
        })
    }

    /// Add `angle` radians to a bone's rotation about the vertical axis.
    ///
    /// Returns false when the avatar has no such bone. The angle is not
    /// wrapped. Takes effect on the next [`update`](Self::update).
    pub fn rotate_bone_y(&mut self, bone: HumanBone, angle: f32) -> bool {
        let Some(node) = self.bone_node(bone) else {
            return false;
        };
        let mut rotation = self.node_rotation(node);
        rotation.y += angle;
        self.pose.insert(node, rotation);
        true
    }

    /// World-space position of a bone as of the last update.
    pub fn bone_world_position(&self, bone: HumanBone) -> Option<Vec3> {
        self.bone_node(bone)
            .map(|node| self.world[node].w_axis.truncate())
    }

    /// Advance the avatar by `delta` seconds: forward kinematics and skinning.
    pub fn update(&mut self, delta: f32) {
        self.elapsed += delta;

        let local_rotations: HashMap<usize, Quat> = self
            .pose
            .iter()
            .map(|(&node, e)| (node, Quat::from_euler(EulerRot::XYZ, e.x, e.y, e.z)))
            .collect();

        self.world = skinning::compute_world_transforms(&self.scene, &local_rotations);
        self.skinned = skinning::skin_all(&self.scene, &self.world);
    }

    /// Seconds accumulated through [`update`](Self::update) since binding.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn world_transforms(&self) -> &[Mat4] {
        &self.world
    }

    /// Skinned positions per mesh, per primitive.
    pub fn skinned_meshes(&self) -> &[Vec<Vec<Vec3>>] {
        &self.skinned
    }
}
