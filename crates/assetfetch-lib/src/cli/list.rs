use crate::cli::ListParams;
use crate::error::AssetFetchError;
use crate::manifest::Manifest;

pub fn format_manifest(manifest: &Manifest) -> String {
    manifest
        .iter()
        .map(|entry| format!("{} <- {}\n", entry.destination_path, entry.source_url))
        .collect()
}

pub fn run_list(params: ListParams) -> Result<(), AssetFetchError> {
    print!("{}", format_manifest(&params.manifest));
    Ok(())
}
