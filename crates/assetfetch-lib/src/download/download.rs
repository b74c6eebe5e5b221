use super::transport::{ByteStream, Transport};
use super::types::{DirectoryErrorPolicy, DownloadOptions, EntryOutcome, Outcome, RunReport};
use crate::error::AssetFetchError;
use crate::manifest::{DownloadEntry, Manifest};
use eyre::{Result, WrapErr, eyre};
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};

/// Downloads every entry of the manifest below `output_dir`.
///
/// Entries are attempted in manifest order, at most `options.parallelism` at a
/// time, and their outcomes are reported in that same order. A failed fetch
/// never stops the run. A directory that cannot be created stops it only under
/// [`DirectoryErrorPolicy::Abort`], in which case no report is produced.
pub async fn download_all<T: Transport>(
    manifest: &Manifest,
    output_dir: impl AsRef<Path>,
    transport: &T,
    options: DownloadOptions,
) -> Result<RunReport, AssetFetchError> {
    let output_dir = output_dir.as_ref();
    info!(
        entries = manifest.len(),
        output = %output_dir.display(),
        "Starting downloads..."
    );

    let mut outcomes = stream::iter(manifest.iter())
        .map(|entry| download_entry(transport, entry, output_dir, options.on_directory_error))
        .buffered(options.parallelism.max(1));

    let mut report = RunReport::default();
    while let Some(res) = outcomes.next().await {
        match res {
            Ok(outcome) => report.outcomes.push(outcome),
            Err(err) => {
                tracing::error!("Aborting run: {}", err);
                return Err(err);
            }
        }
    }

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Done."
    );
    Ok(report)
}

async fn download_entry<T: Transport>(
    transport: &T,
    entry: &DownloadEntry,
    output_dir: &Path,
    on_directory_error: DirectoryErrorPolicy,
) -> Result<EntryOutcome, AssetFetchError> {
    let output_path = output_dir.join(&entry.destination_path);

    info!(
        url = %entry.source_url,
        output = %output_path.display(),
        "Downloading {}...",
        entry.destination_path
    );

    // The parent must exist before anything is fetched.
    if let Some(parent) = output_path.parent() {
        if let Err(err) = tokio::fs::create_dir_all(parent).await {
            match on_directory_error {
                DirectoryErrorPolicy::Abort => {
                    return Err(AssetFetchError::DownloadDirectoryCreation {
                        path: parent.to_path_buf(),
                        reason: err.to_string(),
                    });
                }
                DirectoryErrorPolicy::Continue => {
                    let err = eyre::Report::new(err)
                        .wrap_err(format!("Failed to create directory: {}", parent.display()));
                    return Ok(failed(entry, err));
                }
            }
        }
    }

    match fetch_to_file(transport, &entry.source_url, &output_path).await {
        Ok(bytes_written) => {
            info!(bytes = bytes_written, "Downloaded {}", entry.destination_path);
            Ok(EntryOutcome {
                entry: entry.clone(),
                outcome: Outcome::Success { bytes_written },
            })
        }
        Err(err) => Ok(failed(entry, err)),
    }
}

fn failed(entry: &DownloadEntry, err: eyre::Report) -> EntryOutcome {
    warn!("Failed to download {}: {:#}", entry.destination_path, err);
    EntryOutcome {
        entry: entry.clone(),
        outcome: Outcome::Failure {
            reason: format!("{err:#}"),
        },
    }
}

/// Sibling file the body is streamed into before it replaces the destination.
fn part_path(output_path: &Path) -> Result<PathBuf> {
    let file_name = output_path
        .file_name()
        .ok_or_else(|| eyre!("Destination has no file name: {}", output_path.display()))?;
    let mut part_name = file_name.to_os_string();
    part_name.push(".part");
    Ok(output_path.with_file_name(part_name))
}

async fn fetch_to_file<T: Transport>(
    transport: &T,
    url: &str,
    output_path: &Path,
) -> Result<u64> {
    let part_path = part_path(output_path)?;
    let stream = transport.fetch(url).await?;

    let written = match write_stream(stream, &part_path).await {
        Ok(written) => written,
        Err(err) => {
            remove_part_file(&part_path).await;
            return Err(err);
        }
    };

    if let Err(err) = tokio::fs::rename(&part_path, output_path).await {
        remove_part_file(&part_path).await;
        return Err(err).wrap_err_with(|| format!("Failed to replace {}", output_path.display()));
    }

    Ok(written)
}

async fn write_stream(mut stream: ByteStream, part_path: &Path) -> Result<u64> {
    let file = tokio::fs::File::create(part_path)
        .await
        .wrap_err_with(|| format!("Failed to create output file: {}", part_path.display()))?;
    let mut writer = tokio::io::BufWriter::new(file);

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .wrap_err_with(|| format!("Failed to write to {}", part_path.display()))?;
        written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .wrap_err_with(|| format!("Failed to flush {}", part_path.display()))?;
    Ok(written)
}

async fn remove_part_file(part_path: &Path) {
    if let Err(err) = tokio::fs::remove_file(part_path).await {
        if err.kind() != std::io::ErrorKind::NotFound {
            tracing::debug!(path = %part_path.display(), "Failed to remove partial file: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Response {
        Body(&'static [u8]),
        Status(u16),
        BrokenAfter(&'static [u8]),
    }

    /// In-memory transport that records the order URLs are requested in.
    struct MockTransport {
        responses: HashMap<&'static str, Response>,
        requested: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(responses: impl IntoIterator<Item = (&'static str, Response)>) -> Self {
            Self {
                responses: responses.into_iter().collect(),
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        async fn fetch(&self, url: &str) -> Result<ByteStream> {
            self.requested.lock().unwrap().push(url.to_string());
            match self.responses.get(url) {
                Some(Response::Body(body)) => Ok(stream::iter(vec![Ok(body.to_vec())]).boxed()),
                Some(Response::Status(status)) => Err(eyre!("HTTP status {status} for {url}")),
                Some(Response::BrokenAfter(body)) => Ok(stream::iter(vec![
                    Ok(body.to_vec()),
                    Err(eyre!("connection reset")),
                ])
                .boxed()),
                None => Err(eyre!("Failed to connect to {url}")),
            }
        }
    }

    fn sequential() -> DownloadOptions {
        DownloadOptions::default()
    }

    #[tokio::test]
    async fn test_successful_entry_written_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::from_pairs([("out/a.txt", "http://ok.test/a")]).unwrap();
        let transport = MockTransport::new([("http://ok.test/a", Response::Body(b"hello"))]);

        let report = download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(
            report.outcomes[0].outcome,
            Outcome::Success { bytes_written: 5 }
        );
        assert_eq!(
            std::fs::read(dir.path().join("out/a.txt")).unwrap(),
            b"hello"
        );
        assert!(!dir.path().join("out/a.txt.part").exists());
    }

    #[tokio::test]
    async fn test_failed_entry_does_not_create_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::from_pairs([
            ("out/b.txt", "http://ok.test/missing"),
            ("out/c.txt", "http://ok.test/c"),
        ])
        .unwrap();
        let transport = MockTransport::new([
            ("http://ok.test/missing", Response::Status(404)),
            ("http://ok.test/c", Response::Body(b"c")),
        ]);

        let report = download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        let failure = report.failures().next().unwrap();
        assert_eq!(failure.entry.destination_path, "out/b.txt");
        assert!(matches!(&failure.outcome, Outcome::Failure { reason } if reason.contains("404")));
        assert!(!dir.path().join("out/b.txt").exists());
        assert_eq!(std::fs::read(dir.path().join("out/c.txt")).unwrap(), b"c");
    }

    #[tokio::test]
    async fn test_interrupted_body_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        std::fs::write(dir.path().join("out/a.txt"), b"previous").unwrap();

        let manifest = Manifest::from_pairs([("out/a.txt", "http://ok.test/a")]).unwrap();
        let transport =
            MockTransport::new([("http://ok.test/a", Response::BrokenAfter(b"partial"))]);

        let report = download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(
            std::fs::read(dir.path().join("out/a.txt")).unwrap(),
            b"previous"
        );
        assert!(!dir.path().join("out/a.txt.part").exists());
    }

    #[tokio::test]
    async fn test_existing_file_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("out")).unwrap();
        std::fs::write(dir.path().join("out/a.txt"), b"a much longer previous body").unwrap();

        let manifest = Manifest::from_pairs([("out/a.txt", "http://ok.test/a")]).unwrap();
        let transport = MockTransport::new([("http://ok.test/a", Response::Body(b"hello"))]);

        download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();
        download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read(dir.path().join("out/a.txt")).unwrap(),
            b"hello"
        );
    }

    #[tokio::test]
    async fn test_entries_attempted_in_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::from_pairs([
            ("z/1.txt", "http://ok.test/3"),
            ("a/2.txt", "http://ok.test/1"),
            ("m/3.txt", "http://ok.test/2"),
        ])
        .unwrap();
        let transport = MockTransport::new([
            ("http://ok.test/1", Response::Body(b"1")),
            ("http://ok.test/2", Response::Body(b"2")),
            ("http://ok.test/3", Response::Body(b"3")),
        ]);

        let report = download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();

        assert_eq!(
            transport.requested(),
            vec!["http://ok.test/3", "http://ok.test/1", "http://ok.test/2"]
        );
        let reported: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.entry.destination_path.as_str())
            .collect();
        assert_eq!(reported, vec!["z/1.txt", "a/2.txt", "m/3.txt"]);
    }

    #[tokio::test]
    async fn test_parallel_run_reports_in_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        let pairs: Vec<_> = (0..6)
            .map(|i| (format!("out/{i}.txt"), format!("http://ok.test/{i}")))
            .collect();
        let manifest = Manifest::from_pairs(pairs).unwrap();
        let transport = MockTransport::new([
            ("http://ok.test/0", Response::Body(b"0")),
            ("http://ok.test/1", Response::Status(500)),
            ("http://ok.test/2", Response::Body(b"2")),
            ("http://ok.test/3", Response::Body(b"3")),
            ("http://ok.test/4", Response::Status(404)),
            ("http://ok.test/5", Response::Body(b"5")),
        ]);
        let options = DownloadOptions {
            parallelism: 4,
            ..DownloadOptions::default()
        };

        let report = download_all(&manifest, dir.path(), &transport, options)
            .await
            .unwrap();

        let reported: Vec<_> = report
            .outcomes
            .iter()
            .map(|o| o.entry.destination_path.clone())
            .collect();
        let expected: Vec<_> = (0..6).map(|i| format!("out/{i}.txt")).collect();
        assert_eq!(reported, expected);
        assert_eq!(report.succeeded(), 4);
        assert_eq!(transport.requested().len(), 6);
    }

    #[tokio::test]
    async fn test_precreated_directories_are_fine() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("libs/jsm/loaders")).unwrap();
        let manifest =
            Manifest::from_pairs([("libs/jsm/loaders/x.js", "http://ok.test/x")]).unwrap();
        let transport = MockTransport::new([("http://ok.test/x", Response::Body(b"x"))]);

        let report = download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_blocked_directory_aborts_under_abort_policy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocked"), b"not a directory").unwrap();
        let manifest = Manifest::from_pairs([
            ("blocked/a.txt", "http://ok.test/a"),
            ("ok/b.txt", "http://ok.test/b"),
        ])
        .unwrap();
        let transport = MockTransport::new([
            ("http://ok.test/a", Response::Body(b"a")),
            ("http://ok.test/b", Response::Body(b"b")),
        ]);
        let options = DownloadOptions {
            on_directory_error: DirectoryErrorPolicy::Abort,
            ..DownloadOptions::default()
        };

        let result = download_all(&manifest, dir.path(), &transport, options).await;

        assert!(matches!(
            result,
            Err(AssetFetchError::DownloadDirectoryCreation { .. })
        ));
        assert!(transport.requested().is_empty());
        assert!(!dir.path().join("ok/b.txt").exists());
    }

    #[tokio::test]
    async fn test_blocked_directory_skipped_under_continue_policy() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocked"), b"not a directory").unwrap();
        let manifest = Manifest::from_pairs([
            ("blocked/a.txt", "http://ok.test/a"),
            ("ok/b.txt", "http://ok.test/b"),
        ])
        .unwrap();
        let transport = MockTransport::new([
            ("http://ok.test/a", Response::Body(b"a")),
            ("http://ok.test/b", Response::Body(b"b")),
        ]);

        let report = download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();

        assert_eq!(transport.requested(), vec!["http://ok.test/b"]);
        assert!(!report.outcomes[0].is_success());
        assert!(report.outcomes[1].is_success());
        assert_eq!(std::fs::read(dir.path().join("ok/b.txt")).unwrap(), b"b");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = Manifest::from_pairs([("out/a.txt", "http://down.test/a")]).unwrap();
        let transport = MockTransport::new([]);

        let report = download_all(&manifest, dir.path(), &transport, sequential())
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert!(!dir.path().join("out/a.txt").exists());
    }

    #[test]
    fn test_part_path_is_a_sibling() {
        let part = part_path(Path::new("libs/jsm/Pass.js")).unwrap();
        assert_eq!(part, PathBuf::from("libs/jsm/Pass.js.part"));
    }
}
