use crate::download::DirectoryErrorPolicy;
use crate::manifest::DownloadEntry;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    /// Replaces the builtin asset list when present.
    #[serde(default)]
    pub assets: Option<Vec<AssetDef>>,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AssetDef {
    pub path: String,
    pub url: String,
}

impl From<AssetDef> for DownloadEntry {
    fn from(asset: AssetDef) -> Self {
        DownloadEntry::new(asset.path, asset.url)
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    #[serde(default)]
    pub parallelism: Option<usize>,
    #[serde(default)]
    pub max_concurrency_per_host: Option<usize>,
    #[serde(default)]
    pub on_directory_error: Option<DirectoryErrorPolicy>,
}
