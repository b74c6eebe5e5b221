use crate::cli::args::Command;
use crate::cli::params::{FetchParams, ListParams};
use crate::config::{Config, load_config};
use crate::download::DownloadOptions;
use crate::error::AssetFetchError;
use crate::manifest::Manifest;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum ResolvedCommand {
    Fetch(FetchParams),
    List(ListParams),
}

fn load_optional_config(config_path: Option<&str>) -> Result<Config, AssetFetchError> {
    match config_path {
        Some(config_path) => {
            tracing::info!("Loading configuration from {}", config_path);
            load_config(config_path)
        }
        None => Ok(Config::default()),
    }
}

fn resolve_manifest(app_config: &Config) -> Result<Manifest, AssetFetchError> {
    match &app_config.assets {
        Some(assets) => {
            let manifest = Manifest::new(assets.iter().cloned().map(Into::into).collect())?;
            if manifest.is_empty() {
                return Err(AssetFetchError::InvalidManifest {
                    details: "The configured asset list is empty".to_string(),
                });
            }
            Ok(manifest)
        }
        None => Ok(Manifest::builtin()),
    }
}

pub fn resolve_command(command: Command) -> Result<ResolvedCommand, AssetFetchError> {
    match command {
        Command::Fetch {
            config_path,
            output_dir,
            parallelism,
            max_concurrency_per_host,
            on_directory_error,
            strict,
        } => {
            let app_config = load_optional_config(config_path.as_deref())?;
            let manifest = resolve_manifest(&app_config)?;
            let defaults = DownloadOptions::default();

            let parallelism = parallelism
                .or(app_config.fetch.parallelism)
                .unwrap_or(defaults.parallelism);
            let max_concurrency_per_host = max_concurrency_per_host
                .or(app_config.fetch.max_concurrency_per_host)
                .unwrap_or(defaults.max_concurrency_per_host);

            for (name, value) in [
                ("parallelism", parallelism),
                ("max-concurrency-per-host", max_concurrency_per_host),
            ] {
                if value == 0 {
                    return Err(AssetFetchError::CliArgumentValidation {
                        details: format!("{name} must be greater than 0."),
                    });
                }
            }

            let output_dir = output_dir
                .map(PathBuf::from)
                .or(app_config.output.path)
                .unwrap_or_else(|| PathBuf::from("."));

            Ok(ResolvedCommand::Fetch(FetchParams {
                manifest,
                output_dir,
                options: DownloadOptions {
                    parallelism,
                    max_concurrency_per_host,
                    on_directory_error: on_directory_error
                        .or(app_config.fetch.on_directory_error)
                        .unwrap_or(defaults.on_directory_error),
                },
                strict,
            }))
        }
        Command::List { config_path } => {
            let app_config = load_optional_config(config_path.as_deref())?;
            Ok(ResolvedCommand::List(ListParams {
                manifest: resolve_manifest(&app_config)?,
            }))
        }
    }
}
