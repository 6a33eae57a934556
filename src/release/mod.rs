//! Publishes release artifacts: stores each file in the downloads bucket and
//! registers it with the downloads page.

pub mod file;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::client::CLIENT;
use crate::gcp::auth::{
    CredentialError, DEVSTORAGE_READ_WRITE_SCOPE, read_service_account, service_account_token,
};
use crate::gcp::gcs::{PredefinedAcl, StorageError, upload_object};
use crate::gcp::types::Credential;

pub use file::{Build, File, Kind, checksum, classify};

pub const DEFAULT_BUCKET: &str = "golang";
pub const DEFAULT_REGISTER_URL: &str = "https://golang.org/dl/upload";

#[derive(Debug, thiserror::Error)]
pub enum ReleaseError {
    #[error("unrecognized file: {0:?}")]
    Unrecognized(String),

    #[error("error reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("no home directory to find {0} in")]
    NoHome(&'static str),

    #[error("storage credential: {0}")]
    Credential(#[from] CredentialError),

    #[error("uploading file: {0}")]
    Storage(#[from] StorageError),

    #[error("registering file: {0}")]
    Request(#[from] reqwest::Error),

    #[error("upload failed: {status}\n{body}")]
    Register {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Where artifacts go and who registers them.
#[derive(Debug, Clone)]
pub struct ReleaseConfig {
    pub user: String,
    /// Registration key file; `None` means `~/.gobuildkey-<user>`.
    pub key_file: Option<PathBuf>,
    pub bucket: String,
    /// Service account key; `None` means `~/keys/golang-org.service.json`.
    pub service_key: Option<PathBuf>,
    pub register_url: String,
}

impl ReleaseConfig {
    pub fn new(user: impl Into<String>) -> Self {
        ReleaseConfig {
            user: user.into(),
            key_file: None,
            bucket: DEFAULT_BUCKET.to_string(),
            service_key: None,
            register_url: DEFAULT_REGISTER_URL.to_string(),
        }
    }

    pub fn key_file_path(&self) -> Result<PathBuf, ReleaseError> {
        match &self.key_file {
            Some(p) => Ok(p.clone()),
            None => Ok(home("registration key")?.join(format!(".gobuildkey-{}", self.user))),
        }
    }

    pub fn service_key_path(&self) -> Result<PathBuf, ReleaseError> {
        match &self.service_key {
            Some(p) => Ok(p.clone()),
            None => Ok(home("service account key")?
                .join("keys")
                .join("golang-org.service.json")),
        }
    }

    /// The registration key, trimmed.
    pub fn registration_key(&self) -> Result<String, ReleaseError> {
        let path = self.key_file_path()?;
        read(&path).map(|b| String::from_utf8_lossy(&b).trim().to_string())
    }
}

fn home(what: &'static str) -> Result<PathBuf, ReleaseError> {
    dirs::home_dir().ok_or(ReleaseError::NoHome(what))
}

fn read(path: &Path) -> Result<Vec<u8>, ReleaseError> {
    fs::read(path).map_err(|source| ReleaseError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Builds the registration POST for `file`.
pub fn register_request(
    register_url: &str,
    user: &str,
    key: &str,
    file: &File,
) -> reqwest::RequestBuilder {
    CLIENT
        .post(register_url)
        .query(&[("user", user), ("key", key)])
        .json(file)
}

/// Posts `file` to the downloads page. Anything but 200 is a failure.
pub async fn register_file(
    register_url: &str,
    user: &str,
    key: &str,
    file: &File,
) -> Result<(), ReleaseError> {
    let resp = register_request(register_url, user, key, file).send().await?;
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(ReleaseError::Register { status, body });
    }
    Ok(())
}

/// Stores one artifact publicly and registers it.
pub async fn upload_file(
    cfg: &ReleaseConfig,
    credential: &Credential,
    key: &str,
    path: &Path,
) -> Result<File, ReleaseError> {
    let base = base_name(path);
    let build = classify(&base).ok_or_else(|| ReleaseError::Unrecognized(base.clone()))?;
    let data = read(path)?;
    let record = File::new(&base, &build, &data);

    let object = upload_object(
        credential,
        &cfg.bucket,
        &base,
        data,
        "application/octet-stream",
        PredefinedAcl::PublicRead,
    )
    .await?;
    info!(bucket = %cfg.bucket, object = %object.name, "stored");

    register_file(&cfg.register_url, &cfg.user, key, &record).await?;
    info!(file = %record.filename, kind = record.kind.as_str(), "registered");
    Ok(record)
}

/// Uploads `files` in order, stopping at the first failure.
pub async fn upload(cfg: &ReleaseConfig, files: &[PathBuf]) -> Result<Vec<File>, ReleaseError> {
    // Reject bad names before fetching any credential.
    for path in files {
        let base = base_name(path);
        if classify(&base).is_none() {
            return Err(ReleaseError::Unrecognized(base));
        }
    }

    let key = cfg.registration_key()?;
    let account = read_service_account(&cfg.service_key_path()?)?;
    let credential = service_account_token(&account, &[DEVSTORAGE_READ_WRITE_SCOPE]).await?;

    let mut done = Vec::with_capacity(files.len());
    for path in files {
        info!(file = %base_name(path), "uploading");
        done.push(upload_file(cfg, &credential, &key, path).await?);
    }
    Ok(done)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn explicit_paths_override_home_defaults() {
        let mut cfg = ReleaseConfig::new("adg");
        cfg.key_file = Some(PathBuf::from("/tmp/k"));
        cfg.service_key = Some(PathBuf::from("/tmp/sa.json"));
        assert_eq!(cfg.key_file_path().unwrap(), PathBuf::from("/tmp/k"));
        assert_eq!(cfg.service_key_path().unwrap(), PathBuf::from("/tmp/sa.json"));
    }

    #[test]
    fn default_key_file_is_per_user() {
        let cfg = ReleaseConfig::new("adg");
        if let Ok(p) = cfg.key_file_path() {
            assert!(p.ends_with(".gobuildkey-adg"));
        }
        if let Ok(p) = cfg.service_key_path() {
            assert!(p.ends_with("keys/golang-org.service.json"));
        }
    }

    #[test]
    fn registration_key_is_trimmed() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "  s3cret  ").unwrap();
        let mut cfg = ReleaseConfig::new("adg");
        cfg.key_file = Some(f.path().to_path_buf());
        assert_eq!(cfg.registration_key().unwrap(), "s3cret");
    }

    #[test]
    fn register_request_carries_user_key_and_record() {
        let build = classify("go1.5.windows-amd64.msi").unwrap();
        let file = File::new("go1.5.windows-amd64.msi", &build, b"abc");
        let req = register_request(DEFAULT_REGISTER_URL, "adg", "k&y", &file)
            .build()
            .unwrap();
        assert_eq!(req.url().path(), "/dl/upload");
        assert_eq!(req.url().query(), Some("user=adg&key=k%26y"));
        let body: serde_json::Value =
            serde_json::from_slice(req.body().and_then(|b| b.as_bytes()).unwrap()).unwrap();
        assert_eq!(body["Kind"], "installer");
        assert_eq!(body["Size"], 3);
    }

    #[tokio::test]
    async fn unrecognized_name_fails_before_any_io() {
        let cfg = ReleaseConfig::new("adg");
        let files = vec![
            PathBuf::from("/nonexistent/go1.5.linux-amd64.tar.gz"),
            PathBuf::from("/nonexistent/notes.txt"),
        ];
        match upload(&cfg, &files).await {
            Err(ReleaseError::Unrecognized(name)) => assert_eq!(name, "notes.txt"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_key_file_is_a_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = ReleaseConfig::new("adg");
        cfg.key_file = Some(dir.path().join("missing"));
        let files = vec![PathBuf::from("go1.5.src.tar.gz")];
        assert!(matches!(
            upload(&cfg, &files).await,
            Err(ReleaseError::Read { .. })
        ));
    }
}
