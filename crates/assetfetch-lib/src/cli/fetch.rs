use crate::cli::FetchParams;
use crate::download::{HttpTransport, Outcome, RunReport, download_all};
use crate::error::AssetFetchError;

pub async fn run_fetch(params: FetchParams) -> Result<RunReport, AssetFetchError> {
    let FetchParams {
        manifest,
        output_dir,
        options,
        strict,
    } = params;

    let transport = HttpTransport::new(options.max_concurrency_per_host)?;
    let report = download_all(&manifest, &output_dir, &transport, options).await?;

    for failure in report.failures() {
        if let Outcome::Failure { reason } = &failure.outcome {
            tracing::debug!(
                url = %failure.entry.source_url,
                "{} failed: {}",
                failure.entry.destination_path,
                reason
            );
        }
    }
    tracing::info!(
        "{} succeeded, {} failed",
        report.succeeded(),
        report.failed()
    );

    if strict && !report.is_success() {
        return Err(AssetFetchError::IncompleteRun {
            failed: report.failed(),
            total: report.outcomes.len(),
        });
    }
    Ok(report)
}
