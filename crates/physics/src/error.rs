#[derive(Debug, thiserror::Error)]
pub enum PhysicsError {
    #[error("dynamic body mass must be positive and finite, got {0}")]
    InvalidMass(f32),
    #[error("invalid triangle mesh: {0}")]
    InvalidTriMesh(String),
    #[error("invalid collider dimensions: {0}")]
    InvalidShape(String),
}
