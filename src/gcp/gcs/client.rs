//! # GCS API Client Logic
//!
//! One-shot media uploads to Google Cloud Storage.

use crate::client::CLIENT;
use crate::gcp::gcs::types::{ObjectItem, PredefinedAcl};
use crate::gcp::types::Credential;

const GCS_UPLOAD_BASE: &str = "https://storage.googleapis.com/upload/storage/v1";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("GCS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("GCS upload failed ({status}): {body}")]
    Upload {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Builds the media upload request for `name` in `bucket`.
pub fn upload_request(
    credential: &Credential,
    bucket: &str,
    name: &str,
    data: Vec<u8>,
    content_type: &str,
    acl: PredefinedAcl,
) -> reqwest::RequestBuilder {
    CLIENT
        .post(format!("{}/b/{}/o", GCS_UPLOAD_BASE, bucket))
        // Use the "media" upload type for simple, one-shot uploads.
        .query(&[
            ("uploadType", "media"),
            ("name", name),
            ("predefinedAcl", acl.as_str()),
        ])
        .header("Authorization", credential.authorization())
        .header("Content-Type", content_type)
        .body(data)
}

/// Uploads data as a new object to a GCS bucket.
///
/// # Arguments
/// * `credential` - Token with a storage read-write scope.
/// * `bucket` - The destination bucket name.
/// * `name` - The full path and name for the new object.
/// * `data` - The raw byte data to upload.
/// * `content_type` - The MIME type of the data (e.g., "application/gzip").
/// * `acl` - Canned ACL applied to the new object.
///
/// # Returns
/// An `ObjectItem` containing the metadata of the newly created object.
pub async fn upload_object(
    credential: &Credential,
    bucket: &str,
    name: &str,
    data: Vec<u8>,
    content_type: &str,
    acl: PredefinedAcl,
) -> Result<ObjectItem, StorageError> {
    let res = upload_request(credential, bucket, name, data, content_type, acl)
        .send()
        .await?;

    let status = res.status();
    if !status.is_success() {
        let body = res.text().await.unwrap_or_default();
        return Err(StorageError::Upload { status, body });
    }

    Ok(res.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_request_encodes_name_and_acl() {
        let credential = Credential {
            access_token: "tok".to_string(),
            token_type: "Bearer".to_string(),
            refresh_token: None,
            expiry: None,
        };
        let req = upload_request(
            &credential,
            "golang",
            "go1.5.linux-amd64.tar.gz",
            b"data".to_vec(),
            "application/octet-stream",
            PredefinedAcl::PublicRead,
        )
        .build()
        .unwrap();

        let url = req.url();
        assert_eq!(url.path(), "/upload/storage/v1/b/golang/o");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("uploadType".to_string(), "media".to_string())));
        assert!(pairs.contains(&("name".to_string(), "go1.5.linux-amd64.tar.gz".to_string())));
        assert!(pairs.contains(&("predefinedAcl".to_string(), "publicRead".to_string())));
        assert_eq!(req.headers()["Authorization"], "Bearer tok");
    }
}
