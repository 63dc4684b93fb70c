//! Error types for vrmdrop

use thiserror::Error;

use crate::avatar::HumanBone;

/// Main error type for vrmdrop
#[derive(Error, Debug)]
pub enum VrmDropError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Bind error: {0}")]
    Bind(#[from] BindError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadFile(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid configuration value: {field} - {message}")]
    InvalidValue { field: String, message: String },
}

/// Hard failures of the load/bind pipeline.
///
/// The current avatar is never touched when one of these occurs.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read {name}: {message}")]
    Read { name: String, message: String },

    #[error("Failed to parse {name}: {message}")]
    Parse { name: String, message: String },

    #[error("Humanoid bone {bone} points at node {node}, but the scene has {node_count} nodes")]
    InvalidBoneNode {
        bone: HumanBone,
        node: usize,
        node_count: usize,
    },

    #[error("Load task cancelled")]
    Cancelled,

    #[error("Load task failed: {0}")]
    Task(String),
}

/// Soft validation failures.
///
/// Logged and short-circuit the remaining initialization; already-applied
/// side effects (scene insertion, current avatar) are kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Given VRM has no humanoid")]
    NoHumanoid,

    #[error("Given VRM has no {0} bone")]
    MissingBone(HumanBone),
}

/// Result type alias for vrmdrop operations
pub type Result<T> = std::result::Result<T, VrmDropError>;
