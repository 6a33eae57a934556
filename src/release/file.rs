//! Naming rules and download-page records for release artifacts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

// Matches files such as go1.5beta2.src.tar.gz, go1.5.1.linux-386.tar.gz and
// go1.5.darwin-amd64-osx10.8.pkg.
static FILE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(go[a-z0-9-.]+)\.(src|([a-z0-9]+)-([a-z0-9]+)(?:-([a-z0-9.]+))?)\.(tar\.gz|zip|pkg|msi)$",
    )
    .expect("valid regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Archive,
    Installer,
    Source,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Archive => "archive",
            Kind::Installer => "installer",
            Kind::Source => "source",
        }
    }
}

/// What a release file name says about its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Build {
    pub version: String,
    /// Empty for source builds.
    pub os: String,
    pub arch: String,
    pub kind: Kind,
}

impl Build {
    pub fn is_source(&self) -> bool {
        self.kind == Kind::Source
    }
}

/// Classifies a base file name, or returns `None` if it is not a release file.
pub fn classify(base: &str) -> Option<Build> {
    let caps = FILE_RE.captures(base)?;
    let version = caps[1].to_string();
    if &caps[2] == "src" {
        return Some(Build {
            version,
            os: String::new(),
            arch: String::new(),
            kind: Kind::Source,
        });
    }
    let kind = match &caps[6] {
        "msi" | "pkg" => Kind::Installer,
        _ => Kind::Archive,
    };
    Some(Build {
        version,
        os: caps[3].to_string(),
        arch: caps[4].to_string(),
        kind,
    })
}

/// Hex SHA-1 of `data`.
pub fn checksum(data: &[u8]) -> String {
    hex::encode(Sha1::digest(data))
}

/// A file on the downloads page, as posted to the registration endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct File {
    #[serde(rename = "Filename")]
    pub filename: String,
    #[serde(rename = "OS")]
    pub os: String,
    #[serde(rename = "Arch")]
    pub arch: String,
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Checksum")]
    pub checksum: String,
    #[serde(rename = "Size")]
    pub size: u64,
    #[serde(rename = "Kind")]
    pub kind: Kind,
}

impl File {
    pub fn new(base: &str, build: &Build, data: &[u8]) -> Self {
        File {
            filename: base.to_string(),
            os: build.os.clone(),
            arch: build.arch.clone(),
            version: build.version.clone(),
            checksum: checksum(data),
            size: data.len() as u64,
            kind: build.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_source_archive_and_installer() {
        let src = classify("go1.5beta2.src.tar.gz").unwrap();
        assert_eq!(src.version, "go1.5beta2");
        assert!(src.is_source());
        assert_eq!(src.os, "");

        let linux = classify("go1.5.1.linux-386.tar.gz").unwrap();
        assert_eq!(linux.version, "go1.5.1");
        assert_eq!((linux.os.as_str(), linux.arch.as_str()), ("linux", "386"));
        assert_eq!(linux.kind, Kind::Archive);

        let windows_zip = classify("go1.5.windows-amd64.zip").unwrap();
        assert_eq!(windows_zip.kind, Kind::Archive);

        let msi = classify("go1.5.windows-amd64.msi").unwrap();
        assert_eq!(msi.kind, Kind::Installer);
        assert_eq!(msi.os, "windows");
    }

    #[test]
    fn os_version_suffix_is_not_part_of_arch() {
        let pkg = classify("go1.5.darwin-amd64-osx10.8.pkg").unwrap();
        assert_eq!(pkg.os, "darwin");
        assert_eq!(pkg.arch, "amd64");
        assert_eq!(pkg.kind, Kind::Installer);
    }

    #[test]
    fn rejects_other_names() {
        assert!(classify("README.md").is_none());
        assert!(classify("go1.5.linux-amd64.tar.bz2").is_none());
        assert!(classify("Go1.5.src.tar.gz").is_none());
    }

    #[test]
    fn checksum_is_hex_sha1() {
        assert_eq!(checksum(b""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(checksum(b"abc"), "a9993e364706816aba3e25717850c26c9cd0d89d");
    }

    #[test]
    fn record_uses_download_page_field_names() {
        let build = classify("go1.5.1.linux-386.tar.gz").unwrap();
        let file = File::new("go1.5.1.linux-386.tar.gz", &build, b"abc");
        let v = serde_json::to_value(&file).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "Filename": "go1.5.1.linux-386.tar.gz",
                "OS": "linux",
                "Arch": "386",
                "Version": "go1.5.1",
                "Checksum": "a9993e364706816aba3e25717850c26c9cd0d89d",
                "Size": 3,
                "Kind": "archive",
            })
        );
    }
}
