use serde::Deserialize;

/// Object metadata returned by the upload API.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ObjectItem {
    pub name: String,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(rename = "mediaLink")]
    #[serde(default)]
    pub media_link: Option<String>,
    #[serde(rename = "md5Hash")]
    #[serde(default)]
    pub md5_hash: Option<String>,
    #[serde(default)]
    pub generation: Option<String>,
}

/// Canned ACLs applied at upload time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedAcl {
    /// Owner gets full control; everyone gets read.
    PublicRead,
}

impl PredefinedAcl {
    pub fn as_str(&self) -> &'static str {
        match self {
            PredefinedAcl::PublicRead => "publicRead",
        }
    }
}
