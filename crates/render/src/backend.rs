use std::fmt;

/// Which GPU backend family ended up driving the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Modern native API (Vulkan, Metal, DX12, WebGPU).
    Preferred,
    /// Compatibility path (OpenGL / WebGL2).
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Preferred => f.write_str("preferred"),
            Self::Fallback => f.write_str("fallback"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no suitable GPU adapter for {0} backend")]
    NoAdapter(BackendKind),
    #[error("failed to create surface: {0}")]
    Surface(String),
    #[error("failed to acquire device: {0}")]
    Device(String),
}

/// Build the preferred backend when it is supported, falling back once.
///
/// When `preferred_supported` is false the preferred builder is never called.
/// A failing preferred builder is logged and replaced by the fallback; a
/// failing fallback is returned as the error.
pub fn select_backend<T, E: fmt::Display>(
    preferred_supported: bool,
    build_preferred: impl FnOnce() -> Result<T, E>,
    build_fallback: impl FnOnce() -> Result<T, E>,
) -> Result<(BackendKind, T), E> {
    if preferred_supported {
        match build_preferred() {
            Ok(backend) => {
                tracing::info!("preferred GPU backend enabled");
                return Ok((BackendKind::Preferred, backend));
            }
            Err(err) => {
                tracing::warn!(error = %err, "preferred backend initialization failed, falling back");
            }
        }
    }
    let backend = build_fallback()?;
    tracing::info!("fallback GPU backend enabled");
    Ok((BackendKind::Fallback, backend))
}
