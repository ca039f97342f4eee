//! Header-based credentials for query-endpoint providers.
//!
//! Token acquisition is out of scope: the caller hands over a ready bearer
//! token or API key, optionally verified with one verification request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use altair_common::{CatalogError, CatalogResult, Credentials, FetchPort, FetchRequest};

/// How credentials are turned into a request header.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum AuthScheme {
    #[default]
    None,
    /// `Authorization: Bearer <credentials[credential_key]>`
    Bearer {
        #[serde(default = "default_token_key")]
        credential_key: String,
    },
    /// `<header>: <prefix><credentials[credential_key]>`
    ApiKey {
        #[serde(default = "default_auth_header")]
        header: String,
        #[serde(default)]
        prefix: String,
        #[serde(default = "default_api_key_key")]
        credential_key: String,
    },
}

fn default_token_key() -> String {
    "token".to_string()
}

fn default_api_key_key() -> String {
    "api_key".to_string()
}

fn default_auth_header() -> String {
    "Authorization".to_string()
}

impl AuthScheme {
    pub fn is_required(&self) -> bool {
        !matches!(self, AuthScheme::None)
    }

    /// Header produced from the credential bag, `None` when the key is absent or empty.
    pub fn header_for(&self, credentials: &Credentials) -> Option<(String, String)> {
        match self {
            AuthScheme::None => None,
            AuthScheme::Bearer { credential_key } => credentials
                .get(credential_key)
                .filter(|v| !v.is_empty())
                .map(|token| ("Authorization".to_string(), format!("Bearer {}", token))),
            AuthScheme::ApiKey {
                header,
                prefix,
                credential_key,
            } => credentials
                .get(credential_key)
                .filter(|v| !v.is_empty())
                .map(|key| (header.clone(), format!("{}{}", prefix, key))),
        }
    }
}

/// Holds the active auth header of one adapter.
#[derive(Debug)]
pub struct HeaderAuth {
    scheme: AuthScheme,
    verify_url: Option<String>,
    timeout: Duration,
    header: RwLock<Option<(String, String)>>,
}

impl HeaderAuth {
    pub fn new(scheme: AuthScheme, verify_url: Option<String>, timeout: Duration) -> Self {
        Self {
            scheme,
            verify_url,
            timeout,
            header: RwLock::new(None),
        }
    }

    pub fn scheme(&self) -> &AuthScheme {
        &self.scheme
    }

    pub async fn header(&self) -> Option<(String, String)> {
        self.header.read().await.clone()
    }

    /// Attach the auth header, or fail with `AuthRequired` when the scheme
    /// needs one and none is held.
    pub async fn apply(&self, request: FetchRequest) -> CatalogResult<FetchRequest> {
        match self.header().await {
            Some((name, value)) => Ok(request.with_header(name, value)),
            None if self.scheme.is_required() => Err(CatalogError::AuthRequired(
                "no credentials have been supplied".to_string(),
            )),
            None => Ok(request),
        }
    }

    /// `Ok(false)` for missing or rejected (401/403) credentials.
    pub async fn authenticate(
        &self,
        fetch: &dyn FetchPort,
        credentials: &Credentials,
    ) -> CatalogResult<bool> {
        if !self.scheme.is_required() {
            return Ok(true);
        }
        let Some((name, value)) = self.scheme.header_for(credentials) else {
            warn!("Credentials missing the configured key");
            return Ok(false);
        };

        if let Some(url) = &self.verify_url {
            let request = FetchRequest::get(url, self.timeout).with_header(&name, &value);
            let response = fetch.fetch(request).await?;
            match response.status {
                200..=299 => info!(url = %url, "Credentials verified"),
                401 | 403 => {
                    warn!(url = %url, status = response.status, "Credentials rejected");
                    return Ok(false);
                }
                status => {
                    return Err(CatalogError::network(
                        url,
                        format!("verification returned HTTP {}", status),
                    ))
                }
            }
        }

        *self.header.write().await = Some((name, value));
        Ok(true)
    }

    pub async fn clear(&self) {
        *self.header.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds(key: &str, value: &str) -> Credentials {
        Credentials::from([(key.to_string(), value.to_string())])
    }

    #[test]
    fn test_header_for_schemes() {
        let bearer = AuthScheme::Bearer {
            credential_key: "token".into(),
        };
        assert_eq!(
            bearer.header_for(&creds("token", "abc")),
            Some(("Authorization".into(), "Bearer abc".into()))
        );
        assert_eq!(bearer.header_for(&creds("token", "")), None);
        assert_eq!(bearer.header_for(&creds("other", "abc")), None);

        let api_key = AuthScheme::ApiKey {
            header: "Authorization".into(),
            prefix: "api-key ".into(),
            credential_key: "api_key".into(),
        };
        assert_eq!(
            api_key.header_for(&creds("api_key", "PLAK123")),
            Some(("Authorization".into(), "api-key PLAK123".into()))
        );
    }

    #[test]
    fn test_scheme_deserialize_defaults() {
        let scheme: AuthScheme = serde_yaml::from_str("scheme: bearer").unwrap();
        assert_eq!(
            scheme,
            AuthScheme::Bearer {
                credential_key: "token".into()
            }
        );

        let scheme: AuthScheme =
            serde_yaml::from_str("scheme: api_key\nprefix: 'api-key '").unwrap();
        assert!(matches!(scheme, AuthScheme::ApiKey { ref credential_key, .. } if credential_key == "api_key"));
    }
}
