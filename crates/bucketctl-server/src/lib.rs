//! Reference HTTP server library for the bucketctl bucket protocol v1.
//!
//! Buckets and their tags are kept in memory and mirrored to
//! `{data_dir}/buckets.json` after every change, so a restarted server sees
//! the same account. Requests are handled one at a time.
//!
//! The [`TestServer`] helper starts a server on a random port for integration testing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tiny_http::{Header, Method, Response, Server, StatusCode};
use tracing::{debug, error, info, warn};

pub const PROTOCOL_VERSION: &str = "1";

const REGISTRY_FILE: &str = "buckets.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket already exists: {0}")]
    AlreadyExists(String),
    #[error("bucket not found: {0}")]
    NotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("registry lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BucketRecord {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// One entry of the `GET /buckets/` listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// File-backed bucket registry.
pub struct Store {
    data_dir: PathBuf,
    buckets: RwLock<BTreeMap<String, BucketRecord>>,
}

impl Store {
    /// Open the registry under `data_dir`, loading any saved buckets.
    pub fn open(data_dir: PathBuf) -> Result<Self, StoreError> {
        let reg_path = data_dir.join(REGISTRY_FILE);
        let buckets = if reg_path.exists() {
            serde_json::from_slice(&fs::read(&reg_path)?)?
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            data_dir,
            buckets: RwLock::new(buckets),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, BucketRecord>>, StoreError> {
        self.buckets.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, BucketRecord>>, StoreError> {
        self.buckets.write().map_err(|_| StoreError::Poisoned)
    }

    fn persist(&self, buckets: &BTreeMap<String, BucketRecord>) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir)?;
        let data = serde_json::to_vec_pretty(buckets)?;
        fs::write(self.data_dir.join(REGISTRY_FILE), data)?;
        Ok(())
    }

    pub fn create(&self, name: &str) -> Result<(), StoreError> {
        let mut buckets = self.write()?;
        if buckets.contains_key(name) {
            return Err(StoreError::AlreadyExists(name.to_owned()));
        }
        buckets.insert(
            name.to_owned(),
            BucketRecord {
                created_at: Utc::now(),
                tags: BTreeMap::new(),
            },
        );
        self.persist(&buckets)
    }

    pub fn exists(&self, name: &str) -> Result<bool, StoreError> {
        Ok(self.read()?.contains_key(name))
    }

    /// Replace the whole tag set of a bucket.
    pub fn put_tags(&self, name: &str, tags: BTreeMap<String, String>) -> Result<(), StoreError> {
        let mut buckets = self.write()?;
        let record = buckets
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))?;
        record.tags = tags;
        self.persist(&buckets)
    }

    pub fn get_tags(&self, name: &str) -> Result<BTreeMap<String, String>, StoreError> {
        self.read()?
            .get(name)
            .map(|r| r.tags.clone())
            .ok_or_else(|| StoreError::NotFound(name.to_owned()))
    }

    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        let mut buckets = self.write()?;
        if buckets.remove(name).is_none() {
            return Err(StoreError::NotFound(name.to_owned()));
        }
        self.persist(&buckets)
    }

    /// All buckets, sorted by name.
    pub fn list(&self) -> Result<Vec<ListEntry>, StoreError> {
        Ok(self
            .read()?
            .iter()
            .map(|(name, r)| ListEntry {
                name: name.clone(),
                created_at: r.created_at,
            })
            .collect())
    }
}

/// The single access/secret pair a server accepts when auth is enabled.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKeyPair {
    pub access_key: String,
    pub secret_key: String,
}

impl AccessKeyPair {
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    fn matches_header(&self, value: &str) -> bool {
        value
            .strip_prefix("Bearer ")
            .and_then(|token| token.split_once(':'))
            .is_some_and(|(ak, sk)| ak == self.access_key && sk == self.secret_key)
    }
}

impl std::fmt::Debug for AccessKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeyPair")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Store plus request policy.
pub struct BucketService {
    store: Store,
    auth: Option<AccessKeyPair>,
}

impl BucketService {
    pub fn new(store: Store, auth: Option<AccessKeyPair>) -> Self {
        Self { store, auth }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }
}

/// S3 bucket naming: 3 to 63 characters of lowercase letters, digits, `.`
/// and `-`, starting and ending with a letter or digit.
pub fn is_valid_bucket_name(name: &str) -> bool {
    let bytes = name.as_bytes();
    if !(3..=63).contains(&bytes.len()) {
        return false;
    }
    let edge_ok = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    bytes
        .iter()
        .all(|&b| edge_ok(b) || b == b'.' || b == b'-')
        && edge_ok(bytes[0])
        && edge_ok(bytes[bytes.len() - 1])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketRoute<'a> {
    /// `/buckets/`
    Collection,
    /// `/buckets/{name}`
    Bucket(&'a str),
    /// `/buckets/{name}/tags`
    Tags(&'a str),
}

/// Parse a request path into a bucket route. Query strings are ignored.
pub fn parse_bucket_route(url: &str) -> Option<BucketRoute<'_>> {
    let path = url.split('?').next().unwrap_or(url);
    let rest = path.strip_prefix("/buckets")?;
    if rest.is_empty() || rest == "/" {
        return Some(BucketRoute::Collection);
    }
    let rest = rest.strip_prefix('/')?;
    match rest.split_once('/') {
        None => Some(BucketRoute::Bucket(rest)),
        Some((name, "tags")) if !name.is_empty() => Some(BucketRoute::Tags(name)),
        Some(_) => None,
    }
}

fn header_value<'r>(req: &'r tiny_http::Request, name: &'static str) -> Option<&'r str> {
    req.headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str())
}

fn respond_err(req: tiny_http::Request, code: u16, msg: &str) {
    let _ = req.respond(Response::from_string(msg).with_status_code(StatusCode(code)));
}

fn respond_json(req: tiny_http::Request, json: impl Into<Vec<u8>>) {
    let header = Header::from_bytes("Content-Type", "application/json").expect("valid header");
    let _ = req.respond(Response::from_data(json.into()).with_header(header));
}

fn respond_store_err(req: tiny_http::Request, what: &str, err: &StoreError) {
    match err {
        StoreError::AlreadyExists(_) => respond_err(req, 409, &err.to_string()),
        StoreError::NotFound(_) => respond_err(req, 404, &err.to_string()),
        _ => {
            error!("{what}: {err}");
            respond_err(req, 500, &err.to_string());
        }
    }
}

fn read_body(req: &mut tiny_http::Request) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    if req.as_reader().read_to_end(&mut body).is_ok() {
        Some(body)
    } else {
        None
    }
}

fn handle_bucket(store: &Store, req: tiny_http::Request, method: &Method, name: &str) {
    match *method {
        Method::Put => {
            if !is_valid_bucket_name(name) {
                respond_err(req, 400, &format!("invalid bucket name: {name}"));
                return;
            }
            match store.create(name) {
                Ok(()) => {
                    info!("created bucket {name}");
                    let _ = req.respond(Response::from_string("ok"));
                }
                Err(e) => respond_store_err(req, &format!("PUT /buckets/{name}"), &e),
            }
        }
        Method::Head => match store.exists(name) {
            Ok(found) => {
                let code = if found { 200 } else { 404 };
                let _ = req.respond(Response::empty(StatusCode(code)));
            }
            Err(e) => respond_store_err(req, &format!("HEAD /buckets/{name}"), &e),
        },
        Method::Delete => match store.delete(name) {
            Ok(()) => {
                info!("deleted bucket {name}");
                let _ = req.respond(Response::from_string("ok"));
            }
            Err(e) => respond_store_err(req, &format!("DELETE /buckets/{name}"), &e),
        },
        _ => respond_err(req, 405, "method not allowed"),
    }
}

fn handle_tags(store: &Store, mut req: tiny_http::Request, method: &Method, name: &str) {
    match *method {
        Method::Put => {
            let Some(body) = read_body(&mut req) else {
                respond_err(req, 500, "read error");
                return;
            };
            let tags: BTreeMap<String, String> = match serde_json::from_slice(&body) {
                Ok(t) => t,
                Err(e) => {
                    respond_err(req, 400, &format!("invalid tag set: {e}"));
                    return;
                }
            };
            let count = tags.len();
            match store.put_tags(name, tags) {
                Ok(()) => {
                    info!("tagged bucket {name}: {count} tags");
                    let _ = req.respond(Response::from_string("ok"));
                }
                Err(e) => respond_store_err(req, &format!("PUT /buckets/{name}/tags"), &e),
            }
        }
        Method::Get => match store.get_tags(name) {
            Ok(tags) => {
                let json = serde_json::to_string(&tags).unwrap_or_else(|_| "{}".to_owned());
                respond_json(req, json);
            }
            Err(e) => respond_store_err(req, &format!("GET /buckets/{name}/tags"), &e),
        },
        _ => respond_err(req, 405, "method not allowed"),
    }
}

/// Reject requests that speak another protocol version or carry the wrong
/// credentials. Returns the request back when it may proceed.
fn admit(service: &BucketService, req: tiny_http::Request) -> Option<tiny_http::Request> {
    if let Some(version) = header_value(&req, "X-Bucketctl-Protocol") {
        if version != PROTOCOL_VERSION {
            let msg = format!("unsupported protocol version: {version}");
            respond_err(req, 400, &msg);
            return None;
        }
    }
    if let Some(pair) = &service.auth {
        let ok = header_value(&req, "Authorization").is_some_and(|v| pair.matches_header(v));
        if !ok {
            warn!("rejected {} {}: bad credentials", req.method(), req.url());
            respond_err(req, 403, "forbidden");
            return None;
        }
    }
    Some(req)
}

/// Handle a single HTTP request, dispatching to the appropriate route handler.
pub fn handle_request(service: &BucketService, req: tiny_http::Request) {
    let method = req.method().clone();
    let url = req.url().to_owned();
    debug!("{method} {url}");

    if url == "/health" && method == Method::Get {
        let _ = req.respond(Response::from_string(r#"{"status":"ok"}"#));
        return;
    }

    let Some(route) = parse_bucket_route(&url) else {
        respond_err(req, 404, "not found");
        return;
    };
    let Some(req) = admit(service, req) else {
        return;
    };

    let store = &service.store;
    match route {
        BucketRoute::Collection if method == Method::Get => match store.list() {
            Ok(entries) => {
                let json = serde_json::to_string(&entries).unwrap_or_else(|_| "[]".to_owned());
                respond_json(req, json);
            }
            Err(e) => respond_store_err(req, "GET /buckets/", &e),
        },
        BucketRoute::Collection => respond_err(req, 405, "method not allowed"),
        BucketRoute::Bucket(name) => handle_bucket(store, req, &method, name),
        BucketRoute::Tags(name) => handle_tags(store, req, &method, name),
    }
}

/// Start the server loop, blocking the current thread.
pub fn run_server(
    service: &Arc<BucketService>,
    addr: &str,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let server = Server::http(addr)?;
    for request in server.incoming_requests() {
        handle_request(service, request);
    }
    Ok(())
}

/// A test helper that starts a bucketctl-server on a random port in a background thread.
///
/// The server listens on `127.0.0.1:{port}` and stores data in the provided `data_dir`.
/// Dropping the `TestServer` stops the server.
pub struct TestServer {
    pub url: String,
    pub port: u16,
    pub data_dir: PathBuf,
    service: Arc<BucketService>,
    server: Arc<Server>,
    _handle: std::thread::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with no credential check.
    /// Binds to `127.0.0.1:0` (random port).
    pub fn start(data_dir: PathBuf) -> Self {
        Self::start_with_auth(data_dir, None)
    }

    /// Start a test server that only accepts `auth`, when given.
    pub fn start_with_auth(data_dir: PathBuf, auth: Option<AccessKeyPair>) -> Self {
        fs::create_dir_all(&data_dir).expect("failed to create test data dir");
        let server =
            Arc::new(Server::http("127.0.0.1:0").expect("failed to bind test HTTP server"));
        let port = server.server_addr().to_ip().expect("not an IP addr").port();
        let url = format!("http://127.0.0.1:{port}");

        let store = Store::open(data_dir.clone()).expect("failed to open test store");
        let service = Arc::new(BucketService::new(store, auth));
        let srv = Arc::clone(&server);
        let svc = Arc::clone(&service);
        let handle = std::thread::spawn(move || {
            for request in srv.incoming_requests() {
                handle_request(&svc, request);
            }
        });

        Self {
            url,
            port,
            data_dir,
            service,
            server,
            _handle: handle,
        }
    }

    /// Direct access to the server's registry, bypassing HTTP.
    pub fn store(&self) -> &Store {
        self.service.store()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.unblock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_name_rules() {
        assert!(is_valid_bucket_name("logs-bucket"));
        assert!(is_valid_bucket_name("a.b-c1"));
        assert!(is_valid_bucket_name("abc"));
        assert!(!is_valid_bucket_name("ab"));
        assert!(!is_valid_bucket_name(&"a".repeat(64)));
        assert!(is_valid_bucket_name(&"a".repeat(63)));
        assert!(!is_valid_bucket_name("Logs"));
        assert!(!is_valid_bucket_name("-logs"));
        assert!(!is_valid_bucket_name("logs."));
        assert!(!is_valid_bucket_name("logs_bucket"));
        assert!(!is_valid_bucket_name("\"logs\""));
    }

    #[test]
    fn parse_bucket_routes() {
        assert_eq!(
            parse_bucket_route("/buckets/"),
            Some(BucketRoute::Collection)
        );
        assert_eq!(parse_bucket_route("/buckets"), Some(BucketRoute::Collection));
        assert_eq!(
            parse_bucket_route("/buckets/logs"),
            Some(BucketRoute::Bucket("logs"))
        );
        assert_eq!(
            parse_bucket_route("/buckets/logs/tags"),
            Some(BucketRoute::Tags("logs"))
        );
        assert_eq!(
            parse_bucket_route("/buckets/logs?x=1"),
            Some(BucketRoute::Bucket("logs"))
        );
        assert!(parse_bucket_route("/buckets/logs/other").is_none());
        assert!(parse_bucket_route("/objects/logs").is_none());
        assert!(parse_bucket_route("/bucketsx").is_none());
    }

    #[test]
    fn access_key_pair_matches_bearer_header() {
        let pair = AccessKeyPair::new("AK", "SK");
        assert!(pair.matches_header("Bearer AK:SK"));
        assert!(!pair.matches_header("Bearer AK:other"));
        assert!(!pair.matches_header("AK:SK"));
        assert!(!format!("{pair:?}").contains("SK\""));
    }

    #[test]
    fn store_create_conflicts_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().to_path_buf()).unwrap();

        store.create("logs").unwrap();
        assert!(store.exists("logs").unwrap());
        assert!(matches!(
            store.create("logs"),
            Err(StoreError::AlreadyExists(_))
        ));
        store.delete("logs").unwrap();
        assert!(!store.exists("logs").unwrap());
        assert!(matches!(store.delete("logs"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn store_tags_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().to_path_buf()).unwrap();
        store.create("logs").unwrap();

        let mut first = BTreeMap::new();
        first.insert("a".to_owned(), "1".to_owned());
        store.put_tags("logs", first).unwrap();
        let mut second = BTreeMap::new();
        second.insert("b".to_owned(), "2".to_owned());
        store.put_tags("logs", second.clone()).unwrap();

        assert_eq!(store.get_tags("logs").unwrap(), second);
        assert!(matches!(
            store.put_tags("ghost", BTreeMap::new()),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn store_list_is_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().to_path_buf()).unwrap();
        store.create("zeta").unwrap();
        store.create("alpha").unwrap();
        let names: Vec<String> = store.list().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn store_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = Store::open(dir.path().to_path_buf()).unwrap();
            store.create("logs").unwrap();
        }
        let reopened = Store::open(dir.path().to_path_buf()).unwrap();
        assert!(reopened.exists("logs").unwrap());
    }
}
