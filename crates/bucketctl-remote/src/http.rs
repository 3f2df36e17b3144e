use crate::{Credentials, ProviderConfig, RemoteBucket, RemoteError, RemoteStore};
use bucketctl_schema::is_path_safe_name;
use std::collections::BTreeMap;
use std::io::Read;

/// HTTP-based bucket store backend.
///
/// Speaks bucket protocol v1:
/// - `PUT    /buckets/<name>`       create bucket (409 if it exists)
/// - `HEAD   /buckets/<name>`       check existence
/// - `PUT    /buckets/<name>/tags`  replace tag set (JSON object)
/// - `DELETE /buckets/<name>`       delete bucket
/// - `GET    /buckets/`             list buckets (JSON array of `{name, created_at}`)
pub struct HttpBackend {
    config: ProviderConfig,
    credentials: Credentials,
    agent: ureq::Agent,
}

impl HttpBackend {
    pub fn new(config: ProviderConfig, credentials: Credentials) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self {
            config,
            credentials,
            agent,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    /// URL of one bucket. Names that would not survive as a single path
    /// segment are refused before any request is sent.
    fn bucket_url(&self, name: &str) -> Result<String, RemoteError> {
        if !is_path_safe_name(name) {
            return Err(RemoteError::InvalidName(name.to_owned()));
        }
        Ok(format!("{}/buckets/{}", self.config.endpoint, name))
    }

    fn authorize<B>(&self, req: ureq::RequestBuilder<B>) -> ureq::RequestBuilder<B> {
        req.header("X-Bucketctl-Protocol", &crate::PROTOCOL_VERSION.to_string())
            .header("X-Bucketctl-Region", &self.credentials.region)
            .header(
                "Authorization",
                &format!(
                    "Bearer {}:{}",
                    self.credentials.access_key, self.credentials.secret_key
                ),
            )
    }

    fn status_error(code: u16, what: &str) -> RemoteError {
        match code {
            404 => RemoteError::NotFound(what.to_owned()),
            409 => RemoteError::AlreadyExists(what.to_owned()),
            401 | 403 => RemoteError::Forbidden(format!("HTTP {code} for {what}")),
            _ => RemoteError::Http(format!("HTTP {code} for {what}")),
        }
    }

    fn do_put(
        &self,
        url: &str,
        what: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<(), RemoteError> {
        let req = self
            .authorize(self.agent.put(url))
            .header("Content-Type", content_type);
        match req.send(data) {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(code)) => Err(Self::status_error(code, what)),
            Err(e) => Err(RemoteError::Http(e.to_string())),
        }
    }

    fn do_get(&self, url: &str, what: &str) -> Result<Vec<u8>, RemoteError> {
        let resp = match self.authorize(self.agent.get(url)).call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => return Err(Self::status_error(code, what)),
            Err(e) => return Err(RemoteError::Http(e.to_string())),
        };

        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(body)
    }

    fn do_head(&self, url: &str) -> Result<u16, RemoteError> {
        match self.authorize(self.agent.head(url)).call() {
            Ok(resp) => Ok(resp.status().into()),
            Err(ureq::Error::StatusCode(code)) => Ok(code),
            Err(e) => Err(RemoteError::Http(e.to_string())),
        }
    }

    fn do_delete(&self, url: &str, what: &str) -> Result<(), RemoteError> {
        match self.authorize(self.agent.delete(url)).call() {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(code)) => Err(Self::status_error(code, what)),
            Err(e) => Err(RemoteError::Http(e.to_string())),
        }
    }
}

impl RemoteStore for HttpBackend {
    fn create(&self, name: &str) -> Result<(), RemoteError> {
        let url = self.bucket_url(name)?;
        tracing::debug!("PUT {url}");
        self.do_put(&url, name, "application/octet-stream", &[])
    }

    fn exists(&self, name: &str) -> Result<bool, RemoteError> {
        let url = self.bucket_url(name)?;
        tracing::debug!("HEAD {url}");
        match self.do_head(&url)? {
            200 => Ok(true),
            404 => Ok(false),
            code => Err(Self::status_error(code, &format!("HEAD {url}"))),
        }
    }

    fn tag(&self, name: &str, tags: &BTreeMap<String, String>) -> Result<(), RemoteError> {
        let url = format!("{}/tags", self.bucket_url(name)?);
        let body =
            serde_json::to_vec(tags).map_err(|e| RemoteError::Serialization(e.to_string()))?;
        tracing::debug!("PUT {url} ({} tags)", tags.len());
        self.do_put(&url, name, "application/json", &body)
    }

    fn delete(&self, name: &str) -> Result<(), RemoteError> {
        let url = self.bucket_url(name)?;
        tracing::debug!("DELETE {url}");
        self.do_delete(&url, name)
    }

    fn list(&self) -> Result<Vec<RemoteBucket>, RemoteError> {
        let url = format!("{}/buckets/", self.config.endpoint);
        tracing::debug!("GET {url}");
        let body = self.do_get(&url, "bucket listing")?;
        serde_json::from_slice(&body).map_err(|e| RemoteError::Serialization(e.to_string()))
    }
}
