use enigma_common::FetchError;

/// Errors from loading or decoding an asset.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("glTF parse error: {0}")]
    Gltf(#[from] gltf::Error),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("invalid data URI: {0}")]
    DataUri(#[from] base64::DecodeError),
    #[error("unsupported glTF extension: {0}")]
    UnsupportedExtension(String),
    #[error("glTF buffer {0} has no data")]
    MissingBuffer(usize),
    #[error("model {0} contains no triangle geometry")]
    NoGeometry(String),
}
