//! The network as seen by the worker.

use crate::http::{Request, Response, ResponseKind};
use enigma_common::FetchError;
use std::path::{Component, Path, PathBuf};

/// Performs requests the cache could not answer.
///
/// HTTP error statuses are `Ok` responses; `Err` means the request never
/// produced a response at all.
pub trait Network {
    fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

impl<T: Network + ?Sized> Network for &T {
    fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        (**self).fetch(request)
    }
}

/// Serves a single origin out of a directory.
///
/// URLs are either origin-relative paths (`/models/a.glb`) or absolute URLs
/// on `origin`. Anything on another origin is refused.
#[derive(Debug, Clone)]
pub struct FileNetwork {
    root: PathBuf,
    origin: String,
}

impl FileNetwork {
    pub fn new(root: impl Into<PathBuf>, origin: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            origin: origin.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Origin-relative path of `url`, or `None` for foreign origins.
    fn same_origin_path<'a>(&self, url: &'a str) -> Option<&'a str> {
        if url.contains("://") {
            url.strip_prefix(self.origin.as_str())
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
        } else {
            Some(url)
        }
    }

    fn file_for(&self, path: &str) -> Option<PathBuf> {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let relative = path.trim_start_matches('/');
        let relative = if relative.is_empty() || relative.ends_with('/') {
            format!("{relative}index.html")
        } else {
            relative.to_string()
        };
        let mut file = self.root.clone();
        for component in Path::new(&relative).components() {
            match component {
                Component::Normal(part) => file.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(file)
    }
}

impl Network for FileNetwork {
    fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let path = self
            .same_origin_path(&request.url)
            .ok_or_else(|| FetchError::CrossOrigin(request.url.clone()))?;
        let Some(file) = self.file_for(path) else {
            return Ok(Response::new(404, ResponseKind::Basic, Vec::new()));
        };

        match std::fs::read(&file) {
            Ok(body) => {
                let body = if request.method == "HEAD" { Vec::new() } else { body };
                Ok(Response::new(200, ResponseKind::Basic, body)
                    .with_header("content-type", content_type(&file)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(url = %request.url, "not found");
                Ok(Response::new(404, ResponseKind::Basic, Vec::new()))
            }
            Err(e) => Err(FetchError::Network(e.to_string())),
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("json") | Some("webmanifest") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("hdr") => "image/vnd.radiance",
        Some("gltf") => "model/gltf+json",
        Some("glb") => "model/gltf-binary",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> (tempfile::TempDir, FileNetwork) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        std::fs::create_dir(dir.path().join("models")).unwrap();
        std::fs::write(dir.path().join("models/a.glb"), [1u8, 2, 3]).unwrap();
        let net = FileNetwork::new(dir.path(), "https://enigma.local");
        (dir, net)
    }

    #[test]
    fn root_serves_index() {
        let (_dir, net) = site();
        let r = net.fetch(&Request::get("/")).unwrap();
        assert_eq!(r.status, 200);
        assert_eq!(r.kind, ResponseKind::Basic);
        assert_eq!(r.header("content-type"), Some("text/html"));
        assert_eq!(r.body, b"<html></html>");
    }

    #[test]
    fn absolute_same_origin_url_is_served() {
        let (_dir, net) = site();
        let r = net
            .fetch(&Request::get("https://enigma.local/models/a.glb?v=2"))
            .unwrap();
        assert_eq!(r.body, vec![1, 2, 3]);
        assert_eq!(r.header("content-type"), Some("model/gltf-binary"));
    }

    #[test]
    fn missing_file_is_404() {
        let (_dir, net) = site();
        let r = net.fetch(&Request::get("/nope.js")).unwrap();
        assert_eq!(r.status, 404);
        assert!(!r.is_ok());
    }

    #[test]
    fn foreign_origin_is_refused() {
        let (_dir, net) = site();
        assert!(matches!(
            net.fetch(&Request::get("https://cdn.example.com/lib.js")),
            Err(FetchError::CrossOrigin(_))
        ));
        assert!(matches!(
            net.fetch(&Request::get("https://enigma.local.evil.com/x")),
            Err(FetchError::CrossOrigin(_))
        ));
    }

    #[test]
    fn traversal_is_404() {
        let (_dir, net) = site();
        assert_eq!(net.fetch(&Request::get("/../secret")).unwrap().status, 404);
    }
}
