use assetfetch_lib::config::{AssetDef, Config, FetchConfig, OutputConfig};
use eyre::Result;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;
use wiremock::matchers::path;
use wiremock::{Mock, MockServer, ResponseTemplate};

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("assetfetch_lib=debug,assetfetch_e2e_tests=debug")
        .with_test_writer()
        .try_init()
        .ok();
}

/// Log sink shared between a test and the subscriber it installs.
#[derive(Clone, Default)]
pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    pub fn lines(&self) -> Vec<String> {
        let buffer = self.0.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Routes the library's INFO+ events into a buffer for the lifetime of the guard.
///
/// Only valid in single-threaded tests, since the subscriber is thread-local.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter("assetfetch_lib=info")
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (logs, guard)
}

pub async fn mount_asset(server: &MockServer, asset_path: &str, body: impl Into<Vec<u8>>) {
    Mock::given(path(asset_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.into()))
        .mount(server)
        .await;
}

/// Path and query of the GET requests the server received, in arrival order.
pub async fn requested_paths(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.method.as_str() == "GET")
        .map(|request| match request.url.query() {
            Some(query) => format!("{}?{}", request.url.path(), query),
            None => request.url.path().to_string(),
        })
        .collect()
}

pub fn create_test_config(server_uri: &str, output_dir: &Path) -> Config {
    Config {
        output: OutputConfig {
            path: Some(output_dir.to_path_buf()),
        },
        assets: Some(vec![
            AssetDef {
                path: "libs/three.module.js".to_string(),
                url: format!("{server_uri}/three/build/three.module.js"),
            },
            AssetDef {
                path: "libs/jsm/controls/OrbitControls.js".to_string(),
                url: format!("{server_uri}/three/examples/jsm/controls/OrbitControls.js"),
            },
        ]),
        fetch: FetchConfig::default(),
    }
}

pub fn setup_test_environment(server_uri: &str) -> Result<TempDir> {
    let temp_dir = tempfile::tempdir()?;

    let config = create_test_config(server_uri, &temp_dir.path().join("public"));
    let config_path = temp_dir.path().join("config.json");
    std::fs::write(&config_path, serde_json::to_string_pretty(&config)?)?;

    Ok(temp_dir)
}
