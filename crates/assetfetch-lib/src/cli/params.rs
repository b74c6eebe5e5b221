use crate::download::DownloadOptions;
use crate::manifest::Manifest;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct FetchParams {
    pub manifest: Manifest,
    pub output_dir: PathBuf,
    pub options: DownloadOptions,
    pub strict: bool,
}

#[derive(Debug, Clone)]
pub struct ListParams {
    pub manifest: Manifest,
}
