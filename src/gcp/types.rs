use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// Generic GCP types shared across services (service-agnostic).

/// A service account key file, as downloaded from the console.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccount {
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

/// User credentials written by `gcloud auth application-default login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizedUser {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

/// The two credential file shapes accepted for application default credentials.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialsFile {
    ServiceAccount(ServiceAccount),
    AuthorizedUser(AuthorizedUser),
}

/// Token endpoint response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Tokens within this window of their expiry are treated as already expired.
const EXPIRY_DELTA_SECS: i64 = 10;

/// An OAuth2 access token plus optional refresh material.
///
/// This is also the on-disk format of the `token.dat` cache files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    #[serde(default)]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Builds a credential from a token endpoint response received at `now`.
    pub fn from_response(resp: AccessToken, now: DateTime<Utc>) -> Self {
        let expiry = (resp.expires_in > 0)
            .then(|| now + Duration::seconds(resp.expires_in as i64));
        Credential {
            access_token: resp.access_token,
            token_type: if resp.token_type.is_empty() {
                "Bearer".to_string()
            } else {
                resp.token_type
            },
            refresh_token: resp.refresh_token,
            expiry,
        }
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            None => true,
            Some(exp) => exp > now + Duration::seconds(EXPIRY_DELTA_SECS),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}
