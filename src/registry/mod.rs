//! Authenticated client for the registry's plugin endpoints: listing
//! versions, fetching package metadata, and streaming package downloads.

mod client;
mod models;

pub use client::{ProgressFn, RegistryClient};
pub use models::{PackageMetadata, SigningKey, VersionInfo, VersionList};
