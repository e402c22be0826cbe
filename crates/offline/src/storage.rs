//! Named, versioned response stores on disk.
//!
//! Layout inside the storage directory:
//! ```text
//! caches.json                    - schema version and store names, oldest first
//! <store-dir>/                   - first 16 hex digits of sha256(store name)
//!   <key>.meta.cbor              - request, status, kind, headers, body hash
//!   <key>.body.zst               - zstd-compressed body
//! ```
//! `<key>` is the sha256 of `"<METHOD> <url>"`.

use crate::error::CacheError;
use crate::http::{Request, Response, ResponseKind};
use crate::network::Network;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const STORAGE_SCHEMA_VERSION: u32 = 1;
const INDEX_FILE: &str = "caches.json";
const META_EXT: &str = "meta.cbor";
const BODY_EXT: &str = "body.zst";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StorageIndex {
    schema_version: u32,
    caches: Vec<String>,
}

/// What gets written next to each cached body.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EntryMeta {
    request: Request,
    status: u16,
    kind: ResponseKind,
    headers: BTreeMap<String, String>,
    body_sha256: String,
}

/// The set of named stores under one directory.
#[derive(Debug)]
pub struct CacheStorage {
    root: PathBuf,
    index: StorageIndex,
}

impl CacheStorage {
    /// Open (or create) the storage rooted at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let index_path = root.join(INDEX_FILE);

        let index = if index_path.exists() {
            let index: StorageIndex = serde_json::from_reader(std::fs::File::open(&index_path)?)?;
            if index.schema_version != STORAGE_SCHEMA_VERSION {
                return Err(CacheError::SchemaMismatch {
                    file_version: index.schema_version,
                    expected_version: STORAGE_SCHEMA_VERSION,
                });
            }
            index
        } else {
            let index = StorageIndex {
                schema_version: STORAGE_SCHEMA_VERSION,
                caches: Vec::new(),
            };
            serde_json::to_writer_pretty(std::fs::File::create(&index_path)?, &index)?;
            index
        };

        Ok(Self { root, index })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open the store called `name`, creating it if needed.
    pub fn open(&mut self, name: &str) -> Result<Cache, CacheError> {
        let cache = Cache {
            name: name.to_string(),
            dir: self.root.join(store_dir(name)),
        };
        std::fs::create_dir_all(&cache.dir)?;
        if !self.has(name) {
            self.index.caches.push(name.to_string());
            self.save_index()?;
            tracing::info!(cache = name, "cache opened");
        }
        Ok(cache)
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.caches.iter().any(|c| c == name)
    }

    /// Store names in creation order.
    pub fn keys(&self) -> Vec<String> {
        self.index.caches.clone()
    }

    /// Remove a store and everything in it. Returns whether it existed.
    pub fn delete(&mut self, name: &str) -> Result<bool, CacheError> {
        if !self.has(name) {
            return Ok(false);
        }
        let dir = self.root.join(store_dir(name));
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
        self.index.caches.retain(|c| c != name);
        self.save_index()?;
        Ok(true)
    }

    /// Look `request` up in every store, oldest first.
    pub fn match_request(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        for name in &self.index.caches {
            let cache = Cache {
                name: name.clone(),
                dir: self.root.join(store_dir(name)),
            };
            if let Some(response) = cache.match_request(request)? {
                return Ok(Some(response));
            }
        }
        Ok(None)
    }

    fn save_index(&self) -> Result<(), CacheError> {
        let path = self.root.join(INDEX_FILE);
        serde_json::to_writer_pretty(std::fs::File::create(path)?, &self.index)?;
        Ok(())
    }
}

/// One named store of request/response pairs.
#[derive(Debug, Clone)]
pub struct Cache {
    name: String,
    dir: PathBuf,
}

impl Cache {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stored response for `request`, if any. A body whose hash no
    /// longer matches its metadata is an error, not a miss.
    pub fn match_request(&self, request: &Request) -> Result<Option<Response>, CacheError> {
        let key = entry_key(request);
        let meta_path = self.entry_path(&key, META_EXT);
        if !meta_path.exists() {
            return Ok(None);
        }
        let meta: EntryMeta = cbor_deserialize(&std::fs::read(&meta_path)?)?;
        let compressed = std::fs::read(self.entry_path(&key, BODY_EXT))?;
        let actual = sha256_hex(&compressed);
        if actual != meta.body_sha256 {
            return Err(CacheError::IntegrityMismatch {
                expected: meta.body_sha256,
                actual,
            });
        }
        Ok(Some(Response {
            status: meta.status,
            kind: meta.kind,
            headers: meta.headers,
            body: zstd_decompress(&compressed)?,
        }))
    }

    /// Store `response` for `request`, replacing any previous entry.
    pub fn put(&self, request: &Request, response: &Response) -> Result<(), CacheError> {
        let key = entry_key(request);
        let compressed = zstd_compress(&response.body)?;
        let meta = EntryMeta {
            request: request.clone(),
            status: response.status,
            kind: response.kind,
            headers: response.headers.clone(),
            body_sha256: sha256_hex(&compressed),
        };
        // Body first: the metadata file marks the entry as complete.
        std::fs::write(self.entry_path(&key, BODY_EXT), &compressed)?;
        std::fs::write(self.entry_path(&key, META_EXT), cbor_serialize(&meta)?)?;
        Ok(())
    }

    /// Fetch every request and store the results. Nothing is written unless
    /// every fetch succeeds with a 2xx status.
    pub fn add_all<N: Network + ?Sized>(
        &self,
        requests: &[Request],
        network: &N,
    ) -> Result<(), CacheError> {
        let mut fetched = Vec::with_capacity(requests.len());
        for request in requests {
            let response = network.fetch(request)?;
            if !response.is_ok() {
                return Err(CacheError::BadStatus {
                    url: request.url.clone(),
                    status: response.status,
                });
            }
            fetched.push((request, response));
        }
        for (request, response) in &fetched {
            self.put(request, response)?;
        }
        tracing::debug!(cache = %self.name, count = fetched.len(), "precached");
        Ok(())
    }

    /// Remove the entry for `request`. Returns whether one existed.
    pub fn delete(&self, request: &Request) -> Result<bool, CacheError> {
        let key = entry_key(request);
        let meta_path = self.entry_path(&key, META_EXT);
        if !meta_path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(meta_path)?;
        let body_path = self.entry_path(&key, BODY_EXT);
        if body_path.exists() {
            std::fs::remove_file(body_path)?;
        }
        Ok(true)
    }

    /// Every stored request, sorted by URL.
    pub fn keys(&self) -> Result<Vec<Request>, CacheError> {
        let mut requests = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_meta = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(META_EXT));
            if is_meta {
                let meta: EntryMeta = cbor_deserialize(&std::fs::read(&path)?)?;
                requests.push(meta.request);
            }
        }
        requests.sort_by(|a, b| a.url.cmp(&b.url).then_with(|| a.method.cmp(&b.method)));
        Ok(requests)
    }

    fn entry_path(&self, key: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{key}.{ext}"))
    }
}

fn store_dir(name: &str) -> String {
    sha256_hex(name.as_bytes())[..16].to_string()
}

fn entry_key(request: &Request) -> String {
    sha256_hex(format!("{} {}", request.method, request.url).as_bytes())
}

fn cbor_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| CacheError::CborEncode(e.to_string()))?;
    Ok(buf)
}

fn cbor_deserialize<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, CacheError> {
    ciborium::from_reader(data).map_err(|e| CacheError::CborDecode(e.to_string()))
}

fn zstd_compress(data: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), 3)?;
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zstd_decompress(data: &[u8]) -> Result<Vec<u8>, CacheError> {
    let mut decoder = zstd::Decoder::new(data)?;
    let mut buf = Vec::new();
    decoder.read_to_end(&mut buf)?;
    Ok(buf)
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use enigma_common::FetchError;
    use std::collections::HashMap;

    /// In-memory network: URL to response.
    struct StaticNetwork(HashMap<String, Response>);

    impl Network for StaticNetwork {
        fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
            self.0
                .get(&request.url)
                .cloned()
                .ok_or_else(|| FetchError::Network(request.url.clone()))
        }
    }

    fn ok(body: &str) -> Response {
        Response::new(200, ResponseKind::Basic, body.as_bytes().to_vec())
    }

    #[test]
    fn storage_open_creates_index() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(tmp.path().join("caches")).unwrap();
        assert!(storage.root().join(INDEX_FILE).is_file());
        assert!(storage.keys().is_empty());
    }

    #[test]
    fn put_then_match() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = CacheStorage::new(tmp.path()).unwrap();
        let cache = storage.open("v1").unwrap();
        let req = Request::get("/index.html");
        let resp = ok("<html>").with_header("content-type", "text/html");

        cache.put(&req, &resp).unwrap();
        assert_eq!(cache.match_request(&req).unwrap(), Some(resp.clone()));
        assert_eq!(storage.match_request(&req).unwrap(), Some(resp));
        assert_eq!(cache.match_request(&Request::get("/other")).unwrap(), None);
        // Method is part of the key.
        assert_eq!(cache.match_request(&Request::new("HEAD", "/index.html")).unwrap(), None);
    }

    #[test]
    fn stores_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        {
            let mut storage = CacheStorage::new(tmp.path()).unwrap();
            storage.open("v1").unwrap().put(&Request::get("/a"), &ok("a")).unwrap();
            storage.open("v2").unwrap();
        }
        let storage = CacheStorage::new(tmp.path()).unwrap();
        assert_eq!(storage.keys(), vec!["v1".to_string(), "v2".to_string()]);
        assert_eq!(storage.match_request(&Request::get("/a")).unwrap().unwrap().body, b"a");
    }

    #[test]
    fn delete_store_and_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = CacheStorage::new(tmp.path()).unwrap();
        let cache = storage.open("old").unwrap();
        cache.put(&Request::get("/a"), &ok("a")).unwrap();
        cache.put(&Request::get("/b"), &ok("b")).unwrap();

        assert!(cache.delete(&Request::get("/a")).unwrap());
        assert!(!cache.delete(&Request::get("/a")).unwrap());
        assert_eq!(cache.keys().unwrap(), vec![Request::get("/b")]);

        assert!(storage.delete("old").unwrap());
        assert!(!storage.delete("old").unwrap());
        assert!(!storage.has("old"));
        assert_eq!(storage.match_request(&Request::get("/b")).unwrap(), None);
    }

    #[test]
    fn add_all_is_all_or_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = CacheStorage::new(tmp.path()).unwrap();
        let cache = storage.open("v1").unwrap();
        let mut served = HashMap::new();
        served.insert("/".to_string(), ok("root"));
        served.insert("/main.js".to_string(), ok("js"));
        served.insert(
            "/gone.js".to_string(),
            Response::new(404, ResponseKind::Basic, Vec::new()),
        );
        let net = StaticNetwork(served);

        let err = cache
            .add_all(&[Request::get("/"), Request::get("/gone.js")], &net)
            .unwrap_err();
        assert!(matches!(err, CacheError::BadStatus { status: 404, .. }));
        assert!(cache.keys().unwrap().is_empty());

        assert!(cache.add_all(&[Request::get("/"), Request::get("/offline.js")], &net).is_err());
        assert!(cache.keys().unwrap().is_empty());

        cache
            .add_all(&[Request::get("/"), Request::get("/main.js")], &net)
            .unwrap();
        assert_eq!(cache.keys().unwrap().len(), 2);
    }

    #[test]
    fn corrupted_body_fails_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let mut storage = CacheStorage::new(tmp.path()).unwrap();
        let cache = storage.open("v1").unwrap();
        let req = Request::get("/a");
        cache.put(&req, &ok("payload")).unwrap();

        let body = cache.entry_path(&entry_key(&req), BODY_EXT);
        let mut data = std::fs::read(&body).unwrap();
        if let Some(byte) = data.last_mut() {
            *byte ^= 0xff;
        }
        std::fs::write(&body, &data).unwrap();

        assert!(matches!(
            cache.match_request(&req),
            Err(CacheError::IntegrityMismatch { .. })
        ));
    }

    #[test]
    fn schema_mismatch_fail_closed() {
        let tmp = tempfile::tempdir().unwrap();
        let _storage = CacheStorage::new(tmp.path()).unwrap();
        std::fs::write(
            tmp.path().join(INDEX_FILE),
            r#"{"schema_version": 999, "caches": []}"#,
        )
        .unwrap();
        match CacheStorage::new(tmp.path()) {
            Err(CacheError::SchemaMismatch { file_version, .. }) => assert_eq!(file_version, 999),
            other => panic!("expected SchemaMismatch, got {other:?}"),
        }
    }
}
