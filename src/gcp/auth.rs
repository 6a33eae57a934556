//! # GCP Authentication
//!
//! Obtains an OAuth 2.0 access token for the compute and storage APIs. Tokens
//! come from a chain of [`CredentialSource`]s tried in order:
//!
//! 1. [`EnvironmentDefault`]: application default credentials
//!    (`GOOGLE_APPLICATION_CREDENTIALS` or the gcloud well-known file).
//! 2. [`CachedFile`]: a token previously stored in `<prefix>token.dat`.
//! 3. [`InteractiveExchange`]: prints an authorization URL, reads the code the
//!    operator pastes back and exchanges it for a token, caching the result.
//!
//! The cache file is only ever touched by a single process; no locking is done.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cached::proc_macro::once;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::client::CLIENT;
use crate::gcp::types::{AccessToken, Credential, CredentialsFile, ServiceAccount};

/// The Google OAuth2 token endpoint.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
/// The Google OAuth2 authorization endpoint for installed applications.
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
/// Out-of-band redirect: the provider shows the code for the operator to copy.
pub const OOB_REDIRECT_URL: &str = "urn:ietf:wg:oauth:2.0:oob";

pub const DEVSTORAGE_FULL_CONTROL_SCOPE: &str =
    "https://www.googleapis.com/auth/devstorage.full_control";
pub const DEVSTORAGE_READ_WRITE_SCOPE: &str =
    "https://www.googleapis.com/auth/devstorage.read_write";
pub const COMPUTE_SCOPE: &str = "https://www.googleapis.com/auth/compute";
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
pub const SQL_SERVICE_SCOPE: &str = "https://www.googleapis.com/auth/sqlservice";
pub const SQL_SERVICE_ADMIN_SCOPE: &str = "https://www.googleapis.com/auth/sqlservice.admin";

/// Scopes requested from application default credentials.
pub const PROVISION_SCOPES: &[&str] = &[
    DEVSTORAGE_FULL_CONTROL_SCOPE,
    COMPUTE_SCOPE,
    CLOUD_PLATFORM_SCOPE,
];

/// Scopes requested by the installed-application (interactive) flow.
pub const INSTALLED_APP_SCOPES: &[&str] = &[
    DEVSTORAGE_FULL_CONTROL_SCOPE,
    COMPUTE_SCOPE,
    CLOUD_PLATFORM_SCOPE,
    SQL_SERVICE_SCOPE,
    SQL_SERVICE_ADMIN_SCOPE,
];

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("error reading {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("error writing to {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("invalid credentials in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to sign JWT assertion: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("token endpoint returned {status}: {body}")]
    TokenEndpoint {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("error reading auth code: {0}")]
    Prompt(io::Error),

    #[error("no credential source produced a token")]
    Unavailable,
}

/// Represents the claims in the JSON Web Token (JWT) used for authentication.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    /// The issuer of the token (the service account's email address).
    iss: String,
    /// Space-separated scopes being requested.
    scope: String,
    /// The audience for the token (the token endpoint URL).
    aud: String,
    /// The expiration time of the token (Unix timestamp).
    exp: u64,
    /// The time the token was issued (Unix timestamp).
    iat: u64,
}

/// Exchanges a signed service-account assertion for an access token.
///
/// This is the server-to-server OAuth 2.0 flow: build claims asserting the
/// service account's identity and the requested scopes, sign them with the
/// account's private key (RS256), and post the JWT to the token endpoint.
pub async fn service_account_token(
    service_account: &ServiceAccount,
    scopes: &[&str],
) -> Result<Credential, CredentialError> {
    let token_url = service_account.token_uri.as_deref().unwrap_or(TOKEN_URL);
    let now = Utc::now().timestamp().max(0) as u64;

    let claims = Claims {
        iss: service_account.client_email.clone(),
        scope: scopes.join(" "),
        aud: token_url.to_string(),
        exp: now + 3600, // Token is valid for 1 hour.
        iat: now,
    };

    let header = Header::new(Algorithm::RS256);
    let encoding_key = EncodingKey::from_rsa_pem(service_account.private_key.as_bytes())?;
    let jwt = encode(&header, &claims, &encoding_key)?;

    request_token(
        token_url,
        &[("grant_type", JWT_BEARER_GRANT), ("assertion", jwt.as_str())],
    )
    .await
}

/// Performs a refresh-token grant.
pub async fn refresh_grant(
    token_url: &str,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<Credential, CredentialError> {
    request_token(
        token_url,
        &[
            ("grant_type", "refresh_token"),
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
        ],
    )
    .await
}

async fn request_token(url: &str, params: &[(&str, &str)]) -> Result<Credential, CredentialError> {
    let response = CLIENT.post(url).form(params).send().await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError::TokenEndpoint { status, body });
    }

    let token: AccessToken = response.json().await?;
    Ok(Credential::from_response(token, Utc::now()))
}

/// Reads and parses a service account or authorized-user JSON file.
pub fn read_credentials_file(path: &Path) -> Result<CredentialsFile, CredentialError> {
    let text = fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CredentialError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a service account key file.
pub fn read_service_account(path: &Path) -> Result<ServiceAccount, CredentialError> {
    let text = fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CredentialError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn read_trimmed(path: &Path) -> Result<String, CredentialError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// OAuth client registered as an "Installed Application".
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub scopes: Vec<String>,
    pub auth_url: String,
    pub token_url: String,
    pub redirect_url: String,
}

impl OAuthClient {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        OAuthClient {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scopes: INSTALLED_APP_SCOPES.iter().map(|s| s.to_string()).collect(),
            auth_url: AUTH_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            redirect_url: OOB_REDIRECT_URL.to_string(),
        }
    }

    /// URL the operator visits to obtain an authorization code.
    pub fn auth_code_url(&self, state: &str) -> Result<String, CredentialError> {
        let scope = self.scopes.join(" ");
        let request = CLIENT
            .get(&self.auth_url)
            .query(&[
                ("response_type", "code"),
                ("client_id", self.client_id.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
                ("scope", scope.as_str()),
                ("state", state),
            ])
            .build()?;
        Ok(request.url().to_string())
    }

    /// Exchanges an authorization code for a token.
    pub async fn exchange(&self, code: &str) -> Result<Credential, CredentialError> {
        request_token(
            &self.token_url,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_url.as_str()),
            ],
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<Credential, CredentialError> {
        refresh_grant(
            &self.token_url,
            &self.client_id,
            &self.client_secret,
            refresh_token,
        )
        .await
    }
}

/// Local files backing the installed-application flow, namespaced by a
/// prefix (`""` for production, `"staging-"` for the dev cluster).
#[derive(Debug, Clone)]
pub struct InstalledAppFiles {
    dir: PathBuf,
    prefix: String,
    token_url: String,
}

impl InstalledAppFiles {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        InstalledAppFiles {
            dir: dir.into(),
            prefix: prefix.into(),
            token_url: TOKEN_URL.to_string(),
        }
    }

    /// Sends code exchanges and refreshes to `token_url` instead of Google's endpoint.
    pub fn with_token_url(mut self, token_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self
    }

    fn file(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.prefix, name))
    }

    pub fn token_cache(&self) -> TokenCacheFile {
        TokenCacheFile::new(self.file("token.dat"))
    }

    /// Loads the client from `<prefix>client-id.dat` and `<prefix>client-secret.dat`.
    pub fn client(&self) -> Result<OAuthClient, CredentialError> {
        let id = read_trimmed(&self.file("client-id.dat"))?;
        let secret = read_trimmed(&self.file("client-secret.dat"))?;
        Ok(OAuthClient {
            token_url: self.token_url.clone(),
            ..OAuthClient::new(id, secret)
        })
    }
}

/// JSON-serialized [`Credential`] stored on disk.
#[derive(Debug, Clone)]
pub struct TokenCacheFile {
    path: PathBuf,
}

impl TokenCacheFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        TokenCacheFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `Ok(None)` when the file does not exist.
    pub fn load(&self) -> Result<Option<Credential>, CredentialError> {
        let slurp = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CredentialError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        serde_json::from_slice(&slurp)
            .map(Some)
            .map_err(|source| CredentialError::Parse {
                path: self.path.clone(),
                source,
            })
    }

    pub fn store(&self, credential: &Credential) -> Result<(), CredentialError> {
        let write_err = |source| CredentialError::Write {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_vec(credential).map_err(|e| write_err(io::Error::other(e)))?;

        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut f = opts.open(&self.path).map_err(write_err)?;
        f.write_all(&json).map_err(write_err)?;
        Ok(())
    }
}

/// One way of obtaining a credential.
///
/// `Ok(None)` means the source has nothing to offer and the next one should be
/// tried; `Err` aborts acquisition.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn token(&self) -> Result<Option<Credential>, CredentialError>;
}

/// Application default credentials from the environment.
pub struct EnvironmentDefault;

#[async_trait]
impl CredentialSource for EnvironmentDefault {
    fn name(&self) -> &'static str {
        "environment default"
    }

    async fn token(&self) -> Result<Option<Credential>, CredentialError> {
        environment_default_token().await
    }
}

fn application_default_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS")
        && !p.is_empty()
    {
        return Some(PathBuf::from(p));
    }
    let well_known = dirs::config_dir()?
        .join("gcloud")
        .join("application_default_credentials.json");
    well_known.exists().then_some(well_known)
}

// Computed at most once per process.
#[once(result = true)]
async fn environment_default_token() -> Result<Option<Credential>, CredentialError> {
    let Some(path) = application_default_path() else {
        debug!("no application default credentials found");
        return Ok(None);
    };

    let result = match read_credentials_file(&path) {
        Ok(file) => credentials_file_token(file, TOKEN_URL).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(cred) => Ok(Some(cred)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "application default credentials unusable");
            Ok(None)
        }
    }
}

/// Exchanges an application default credentials file for a token.
///
/// Service accounts post to their own `token_uri` when the key file names one;
/// authorized users always refresh against `token_url`.
pub async fn credentials_file_token(
    file: CredentialsFile,
    token_url: &str,
) -> Result<Credential, CredentialError> {
    match file {
        CredentialsFile::ServiceAccount(sa) => service_account_token(&sa, PROVISION_SCOPES).await,
        CredentialsFile::AuthorizedUser(user) => {
            refresh_grant(
                token_url,
                &user.client_id,
                &user.client_secret,
                &user.refresh_token,
            )
            .await
        }
    }
}

/// A token cached by an earlier interactive exchange, refreshed if expired.
pub struct CachedFile {
    files: InstalledAppFiles,
}

impl CachedFile {
    pub fn new(files: InstalledAppFiles) -> Self {
        CachedFile { files }
    }
}

#[async_trait]
impl CredentialSource for CachedFile {
    fn name(&self) -> &'static str {
        "cached token file"
    }

    async fn token(&self) -> Result<Option<Credential>, CredentialError> {
        let cache = self.files.token_cache();
        let cached = match cache.load() {
            Ok(Some(c)) => c,
            Ok(None) => {
                debug!(path = %cache.path().display(), "no cached token");
                return Ok(None);
            }
            Err(e) => {
                warn!(error = %e, "error getting token from cache");
                return Ok(None);
            }
        };

        if cached.is_valid() {
            return Ok(Some(cached));
        }

        let Some(refresh_token) = cached.refresh_token else {
            info!(path = %cache.path().display(), "cached token expired");
            return Ok(None);
        };

        let client = self.files.client()?;
        match client.refresh(&refresh_token).await {
            Ok(mut fresh) => {
                if fresh.refresh_token.is_none() {
                    fresh.refresh_token = Some(refresh_token);
                }
                cache.store(&fresh)?;
                Ok(Some(fresh))
            }
            Err(e) => {
                warn!(error = %e, "refreshing cached token failed");
                Ok(None)
            }
        }
    }
}

/// Supplies the authorization code for the interactive exchange.
#[async_trait]
pub trait AuthCodePrompt: Send + Sync {
    async fn auth_code(&self, auth_url: &str) -> io::Result<String>;
}

/// Prints the authorization URL and reads one line from stdin.
pub struct StdinPrompt;

#[async_trait]
impl AuthCodePrompt for StdinPrompt {
    async fn auth_code(&self, auth_url: &str) -> io::Result<String> {
        info!("Get auth code from {}", auth_url);
        print!("\nEnter auth code: ");
        io::stdout().flush()?;
        // The stdin read blocks, so it runs on the blocking pool.
        tokio::task::spawn_blocking(|| -> io::Result<String> {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            Ok(line.trim().to_string())
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// Authorization-code exchange with the operator in the loop.
pub struct InteractiveExchange<P = StdinPrompt> {
    files: InstalledAppFiles,
    prompt: P,
}

impl<P: AuthCodePrompt> InteractiveExchange<P> {
    pub fn new(files: InstalledAppFiles, prompt: P) -> Self {
        InteractiveExchange { files, prompt }
    }
}

#[async_trait]
impl<P: AuthCodePrompt> CredentialSource for InteractiveExchange<P> {
    fn name(&self) -> &'static str {
        "interactive exchange"
    }

    async fn token(&self) -> Result<Option<Credential>, CredentialError> {
        let client = self.files.client()?;
        let url = client.auth_code_url("my-state")?;
        let code = self
            .prompt
            .auth_code(&url)
            .await
            .map_err(CredentialError::Prompt)?;
        let cred = client.exchange(code.trim()).await?;
        self.files.token_cache().store(&cred)?;
        Ok(Some(cred))
    }
}

/// Ordered list of credential sources; the first to produce a token wins.
pub struct CredentialChain {
    sources: Vec<Box<dyn CredentialSource>>,
}

impl CredentialChain {
    pub fn new(sources: Vec<Box<dyn CredentialSource>>) -> Self {
        CredentialChain { sources }
    }

    /// Environment default, then `<prefix>token.dat`, then the interactive flow.
    pub fn standard(dir: &Path, prefix: &str) -> Self {
        let files = InstalledAppFiles::new(dir, prefix);
        CredentialChain::new(vec![
            Box::new(EnvironmentDefault),
            Box::new(CachedFile::new(files.clone())),
            Box::new(InteractiveExchange::new(files, StdinPrompt)),
        ])
    }

    pub async fn acquire(&self) -> Result<Credential, CredentialError> {
        for source in &self.sources {
            match source.token().await? {
                Some(cred) => {
                    info!(source = source.name(), "using credential");
                    return Ok(cred);
                }
                None => debug!(source = source.name(), "credential source yielded nothing"),
            }
        }
        Err(CredentialError::Unavailable)
    }
}
