//! Avatar loading and binding
//!
//! Reads dropped files into a scene graph, binds the VRM humanoid rig and
//! keeps the per-frame pose and skinning state.

pub mod binder;
pub mod humanoid;
pub mod loader;
pub mod skinning;
pub mod source;

#[cfg(test)]
pub(crate) mod fixtures;

pub use binder::{bind, bind_async, Avatar, AvatarId, Rig};
pub use humanoid::{HumanBone, Humanoid};
pub use loader::{load, load_async, SceneGraph};
pub use source::{ByteSource, DroppedFile};
