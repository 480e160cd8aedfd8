use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: String,
    #[serde(rename = "supportedProtocols", skip_serializing_if = "Option::is_none")]
    pub supported_protocols: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionList {
    pub versions: Vec<VersionInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SigningKey {
    #[serde(rename = "keyId")]
    pub key_id: String,
    #[serde(rename = "asciiArmor")]
    pub ascii_armor: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PackageMetadata {
    pub filename: String,
    #[serde(rename = "downloadUrl")]
    pub download_url: String,
    pub os: String,
    pub arch: String,
    pub shasum: String,
    #[serde(rename = "shasumsUrl", skip_serializing_if = "Option::is_none")]
    pub shasums_url: Option<String>,
    #[serde(rename = "shasumsSignatureUrl", skip_serializing_if = "Option::is_none")]
    pub shasums_signature_url: Option<String>,
    #[serde(rename = "signingKeys", skip_serializing_if = "Option::is_none")]
    pub signing_keys: Option<Vec<SigningKey>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<String>>,
}
