//! Credential resolution.
//!
//! Declared configuration wins; anything left unset falls back to the
//! process environment. Every field still missing after both sources is
//! reported at once, before any remote call is attempted.

use crate::ProviderConfig;
use std::fmt;
use thiserror::Error;

pub const REGION_ENV: &str = "BUCKETCTL_REGION";
pub const ACCESS_KEY_ENV: &str = "BUCKETCTL_ACCESS_KEY_ID";
pub const SECRET_KEY_ENV: &str = "BUCKETCTL_SECRET_ACCESS_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialField {
    Region,
    AccessKey,
    SecretKey,
}

impl CredentialField {
    pub fn env_var(self) -> &'static str {
        match self {
            CredentialField::Region => REGION_ENV,
            CredentialField::AccessKey => ACCESS_KEY_ENV,
            CredentialField::SecretKey => SECRET_KEY_ENV,
        }
    }
}

impl fmt::Display for CredentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialField::Region => write!(f, "region"),
            CredentialField::AccessKey => write!(f, "access_key"),
            CredentialField::SecretKey => write!(f, "secret_key"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("missing credentials: {}", describe_missing(.0))]
    Missing(Vec<CredentialField>),
}

impl CredentialError {
    pub fn missing_fields(&self) -> &[CredentialField] {
        match self {
            CredentialError::Missing(fields) => fields,
        }
    }
}

fn describe_missing(fields: &[CredentialField]) -> String {
    fields
        .iter()
        .map(|f| format!("{f} (set it in the provider config or {})", f.env_var()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Fully resolved credentials for one configuration pass.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub region: String,
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("region", &self.region)
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Declared credential values, resolved against the environment on demand.
#[derive(Debug, Clone, Default)]
pub struct CredentialContext {
    region: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
}

impl CredentialContext {
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            region: config.region.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
        }
    }

    /// Resolve against the process environment.
    pub fn resolve(&self) -> Result<Credentials, CredentialError> {
        self.resolve_with(|var| std::env::var(var).ok())
    }

    /// Resolve using `lookup` in place of the process environment.
    pub fn resolve_with(
        &self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Credentials, CredentialError> {
        let mut missing = Vec::new();
        let mut pick = |declared: &Option<String>, field: CredentialField| {
            let value = declared
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_owned)
                .or_else(|| {
                    lookup(field.env_var())
                        .map(|v| v.trim().to_owned())
                        .filter(|v| !v.is_empty())
                });
            if value.is_none() {
                missing.push(field);
            }
            value.unwrap_or_default()
        };

        let region = pick(&self.region, CredentialField::Region);
        let access_key = pick(&self.access_key, CredentialField::AccessKey);
        let secret_key = pick(&self.secret_key, CredentialField::SecretKey);

        if !missing.is_empty() {
            return Err(CredentialError::Missing(missing));
        }
        Ok(Credentials {
            region,
            access_key,
            secret_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn declared_values_win_over_environment() {
        let config = ProviderConfig::new("http://x")
            .with_region("eu-west-1")
            .with_keys("declared-ak", "declared-sk");
        let creds = CredentialContext::from_config(&config)
            .resolve_with(env(&[
                (REGION_ENV, "us-east-1"),
                (ACCESS_KEY_ENV, "env-ak"),
                (SECRET_KEY_ENV, "env-sk"),
            ]))
            .unwrap();
        assert_eq!(creds.region, "eu-west-1");
        assert_eq!(creds.access_key, "declared-ak");
        assert_eq!(creds.secret_key, "declared-sk");
    }

    #[test]
    fn environment_fills_unset_fields() {
        let config = ProviderConfig::new("http://x").with_region("eu-west-1");
        let creds = CredentialContext::from_config(&config)
            .resolve_with(env(&[(ACCESS_KEY_ENV, "env-ak"), (SECRET_KEY_ENV, "env-sk")]))
            .unwrap();
        assert_eq!(creds.region, "eu-west-1");
        assert_eq!(creds.access_key, "env-ak");
    }

    #[test]
    fn empty_declared_value_falls_back_to_environment() {
        let mut config = ProviderConfig::new("http://x");
        config.region = Some("   ".to_owned());
        let creds = CredentialContext::from_config(&config)
            .resolve_with(env(&[
                (REGION_ENV, "ap-south-1"),
                (ACCESS_KEY_ENV, "a"),
                (SECRET_KEY_ENV, "s"),
            ]))
            .unwrap();
        assert_eq!(creds.region, "ap-south-1");
    }

    #[test]
    fn reports_every_missing_field() {
        let err = CredentialContext::default()
            .resolve_with(env(&[(ACCESS_KEY_ENV, "only-this")]))
            .unwrap_err();
        assert_eq!(
            err.missing_fields(),
            &[CredentialField::Region, CredentialField::SecretKey]
        );
        let msg = err.to_string();
        assert!(msg.contains("region"));
        assert!(msg.contains(SECRET_KEY_ENV));
    }

    #[test]
    fn debug_never_prints_secret() {
        let creds = Credentials {
            region: "r".to_owned(),
            access_key: "a".to_owned(),
            secret_key: "hunter2".to_owned(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
