use crate::error::AssetFetchError;
use itertools::Itertools;
use std::path::{Component, Path, PathBuf};

const THREE_BASE_URL: &str = "https://unpkg.com/three@0.129.0";

/// Assets shipped with the web frontend: three.js and the example modules it imports.
const BUILTIN_ASSETS: &[(&str, &str)] = &[
    ("libs/three.module.js", "build/three.module.js"),
    (
        "libs/jsm/loaders/GLTFLoader.js",
        "examples/jsm/loaders/GLTFLoader.js",
    ),
    (
        "libs/jsm/controls/OrbitControls.js",
        "examples/jsm/controls/OrbitControls.js",
    ),
    (
        "libs/jsm/renderers/CSS3DRenderer.js",
        "examples/jsm/renderers/CSS3DRenderer.js",
    ),
    (
        "libs/jsm/postprocessing/EffectComposer.js",
        "examples/jsm/postprocessing/EffectComposer.js",
    ),
    (
        "libs/jsm/postprocessing/RenderPass.js",
        "examples/jsm/postprocessing/RenderPass.js",
    ),
    (
        "libs/jsm/postprocessing/UnrealBloomPass.js",
        "examples/jsm/postprocessing/UnrealBloomPass.js",
    ),
    (
        "libs/jsm/postprocessing/Pass.js",
        "examples/jsm/postprocessing/Pass.js",
    ),
    (
        "libs/jsm/postprocessing/ShaderPass.js",
        "examples/jsm/postprocessing/ShaderPass.js",
    ),
    (
        "libs/jsm/postprocessing/MaskPass.js",
        "examples/jsm/postprocessing/MaskPass.js",
    ),
    (
        "libs/jsm/shaders/CopyShader.js",
        "examples/jsm/shaders/CopyShader.js",
    ),
    (
        "libs/jsm/shaders/LuminosityHighPassShader.js",
        "examples/jsm/shaders/LuminosityHighPassShader.js",
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    /// Path the content is written to, relative to the output directory
    pub destination_path: String,
    /// Remote location of the content. Only parsed when it is fetched.
    pub source_url: String,
}

impl DownloadEntry {
    pub fn new(destination_path: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            destination_path: destination_path.into(),
            source_url: source_url.into(),
        }
    }
}

/// Ordered set of entries with unique destination paths.
///
/// Order is significant: entries are attempted and reported in the order they
/// were supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<DownloadEntry>,
}

impl Manifest {
    pub fn new(entries: Vec<DownloadEntry>) -> Result<Self, AssetFetchError> {
        for entry in &entries {
            validate_entry(entry)?;
        }

        // `out/a.txt`, `./out/a.txt` and `out//a.txt` all name the same file.
        if let Some(duplicate) = entries
            .iter()
            .map(|entry| normalized_destination(&entry.destination_path))
            .duplicates()
            .next()
        {
            return Err(AssetFetchError::InvalidManifest {
                details: format!(
                    "Destination path {} is listed more than once",
                    duplicate.display()
                ),
            });
        }

        Ok(Self { entries })
    }

    pub fn from_pairs<I, P, U>(pairs: I) -> Result<Self, AssetFetchError>
    where
        I: IntoIterator<Item = (P, U)>,
        P: Into<String>,
        U: Into<String>,
    {
        Self::new(
            pairs
                .into_iter()
                .map(|(path, url)| DownloadEntry::new(path, url))
                .collect(),
        )
    }

    /// The three.js build and example modules used by the frontend.
    pub fn builtin() -> Self {
        let entries = BUILTIN_ASSETS
            .iter()
            .map(|(path, upstream)| {
                DownloadEntry::new(*path, format!("{THREE_BASE_URL}/{upstream}"))
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DownloadEntry> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a DownloadEntry;
    type IntoIter = std::slice::Iter<'a, DownloadEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

fn normalized_destination(destination_path: &str) -> PathBuf {
    Path::new(destination_path)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

fn validate_entry(entry: &DownloadEntry) -> Result<(), AssetFetchError> {
    if entry.destination_path.is_empty() {
        return Err(AssetFetchError::InvalidManifest {
            details: format!("Empty destination path for {}", entry.source_url),
        });
    }
    if entry.source_url.is_empty() {
        return Err(AssetFetchError::InvalidManifest {
            details: format!("Empty source URL for {}", entry.destination_path),
        });
    }

    // Destinations must stay inside the output directory.
    let escapes = Path::new(&entry.destination_path)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(AssetFetchError::InvalidManifest {
            details: format!(
                "Destination path {} must be relative and must not contain '..'",
                entry.destination_path
            ),
        });
    }

    // `Path::components` folds a trailing `.` away, so look at the raw text.
    let last_segment = entry.destination_path.rsplit(['/', '\\']).next();
    if matches!(last_segment, None | Some("" | "." | "..")) {
        return Err(AssetFetchError::InvalidManifest {
            details: format!(
                "Destination path {} does not name a file",
                entry.destination_path
            ),
        });
    }

    Ok(())
}
