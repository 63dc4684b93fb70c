//! VRM humanoid rig: canonical bone names mapped to scene nodes.
//!
//! Both encodings are understood:
//! - VRM 1.0: `extensions.VRMC_vrm.humanoid.humanBones` is an object keyed by
//!   bone name, each value `{ "node": n }`.
//! - VRM 0.x: `extensions.VRM.humanoid.humanBones` is an array of
//!   `{ "bone": name, "node": n }`.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

macro_rules! human_bones {
    ($($variant:ident => $name:literal,)*) => {
        /// Canonical skeletal role of a humanoid bone.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        pub enum HumanBone {
            $($variant,)*
        }

        impl HumanBone {
            /// Every bone, in VRM 1.0 declaration order.
            pub const ALL: &'static [HumanBone] = &[$(HumanBone::$variant,)*];

            /// VRM 1.0 name (camelCase)
            pub fn name(self) -> &'static str {
                match self {
                    $(HumanBone::$variant => $name,)*
                }
            }

            /// Look up a bone by its VRM 1.0 name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(HumanBone::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

human_bones! {
    Hips => "hips",
    Spine => "spine",
    Chest => "chest",
    UpperChest => "upperChest",
    Neck => "neck",
    Head => "head",
    LeftEye => "leftEye",
    RightEye => "rightEye",
    Jaw => "jaw",
    LeftUpperLeg => "leftUpperLeg",
    LeftLowerLeg => "leftLowerLeg",
    LeftFoot => "leftFoot",
    LeftToes => "leftToes",
    RightUpperLeg => "rightUpperLeg",
    RightLowerLeg => "rightLowerLeg",
    RightFoot => "rightFoot",
    RightToes => "rightToes",
    LeftShoulder => "leftShoulder",
    LeftUpperArm => "leftUpperArm",
    LeftLowerArm => "leftLowerArm",
    LeftHand => "leftHand",
    RightShoulder => "rightShoulder",
    RightUpperArm => "rightUpperArm",
    RightLowerArm => "rightLowerArm",
    RightHand => "rightHand",
    LeftThumbMetacarpal => "leftThumbMetacarpal",
    LeftThumbProximal => "leftThumbProximal",
    LeftThumbDistal => "leftThumbDistal",
    LeftIndexProximal => "leftIndexProximal",
    LeftIndexIntermediate => "leftIndexIntermediate",
    LeftIndexDistal => "leftIndexDistal",
    LeftMiddleProximal => "leftMiddleProximal",
    LeftMiddleIntermediate => "leftMiddleIntermediate",
    LeftMiddleDistal => "leftMiddleDistal",
    LeftRingProximal => "leftRingProximal",
    LeftRingIntermediate => "leftRingIntermediate",
    LeftRingDistal => "leftRingDistal",
    LeftLittleProximal => "leftLittleProximal",
    LeftLittleIntermediate => "leftLittleIntermediate",
    LeftLittleDistal => "leftLittleDistal",
    RightThumbMetacarpal => "rightThumbMetacarpal",
    RightThumbProximal => "rightThumbProximal",
    RightThumbDistal => "rightThumbDistal",
    RightIndexProximal => "rightIndexProximal",
    RightIndexIntermediate => "rightIndexIntermediate",
    RightIndexDistal => "rightIndexDistal",
    RightMiddleProximal => "rightMiddleProximal",
    RightMiddleIntermediate => "rightMiddleIntermediate",
    RightMiddleDistal => "rightMiddleDistal",
    RightRingProximal => "rightRingProximal",
    RightRingIntermediate => "rightRingIntermediate",
    RightRingDistal => "rightRingDistal",
    RightLittleProximal => "rightLittleProximal",
    RightLittleIntermediate => "rightLittleIntermediate",
    RightLittleDistal => "rightLittleDistal",
}

impl fmt::Display for HumanBone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bone table extracted from a VRM file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Humanoid {
    bones: HashMap<HumanBone, usize>,
}

impl Humanoid {
    /// Parse the humanoid from a glTF top-level `extensions` object.
    ///
    /// Returns `None` when neither VRM extension carries a `humanoid` object.
    /// VRM 1.0 wins when a file carries both.
    pub fn from_extensions(extensions: &Value) -> Option<Self> {
        if let Some(humanoid) = extensions
            .get("VRMC_vrm")
            .and_then(|vrmc| vrmc.get("humanoid"))
        {
            return Some(Self::parse_1_0(humanoid));
        }

        extensions
            .get("VRM")
            .and_then(|vrm| vrm.get("humanoid"))
            .map(Self::parse_0x)
    }

    fn parse_1_0(humanoid: &Value) -> Self {
        let mut bones = HashMap::new();

        if let Some(entries) = humanoid.get("humanBones").and_then(|b| b.as_object()) {
            for (bone_name, data) in entries {
                let Some(node) = data.get("node").and_then(|n| n.as_u64()) else {
                    continue;
                };
                match HumanBone::from_name(bone_name) {
                    Some(bone) => {
                        bones.insert(bone, node as usize);
                    }
                    None => tracing::debug!("Ignoring unknown humanoid bone '{}'", bone_name),
                }
            }
        }

        Self { bones }
    }

    fn parse_0x(humanoid: &Value) -> Self {
        let mut bones = HashMap::new();

        if let Some(entries) = humanoid.get("humanBones").and_then(|b| b.as_array()) {
            for entry in entries {
                let (Some(name), Some(node)) = (
                    entry.get("bone").and_then(|b| b.as_str()),
                    entry.get("node").and_then(|n| n.as_u64()),
                ) else {
                    continue;
                };
                match bone_from_0x_name(name) {
                    Some(bone) => {
                        bones.insert(bone, node as usize);
                    }
                    None => tracing::debug!("Ignoring unknown humanoid bone '{}'", name),
                }
            }
        }

        Self { bones }
    }

    /// Node index bound to a bone
    pub fn bone_node(&self, bone: HumanBone) -> Option<usize> {
        self.bones.get(&bone).copied()
    }

    pub fn bones(&self) -> impl Iterator<Item = (HumanBone, usize)> + '_ {
        self.bones.iter().map(|(&bone, &node)| (bone, node))
    }

    pub fn len(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

/// Map a VRM 0.x bone name onto the VRM 1.0 vocabulary.
///
/// 0.x names are the same camelCase words except that the thumb chain is
/// shifted by one joint (`Proximal/Intermediate/Distal` became
/// `Metacarpal/Proximal/Distal`). Some exporters write the first letter in
/// upper case.
fn bone_from_0x_name(name: &str) -> Option<HumanBone> {
    let name = lower_first(name);
    match name.as_str() {
        "leftThumbProximal" => Some(HumanBone::LeftThumbMetacarpal),
        "leftThumbIntermediate" => Some(HumanBone::LeftThumbProximal),
        "rightThumbProximal" => Some(HumanBone::RightThumbMetacarpal),
        "rightThumbIntermediate" => Some(HumanBone::RightThumbProximal),
        other => HumanBone::from_name(other),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
