use thiserror::Error;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid voxel data: {0}")]
    Data(String),

    #[error("face capacity exceeded: {0}")]
    CapacityExceeded(String),

    #[error("gpu resource unavailable: {0}")]
    Resource(String),

    #[error("invalid renderer state: {0}")]
    State(String),
}
