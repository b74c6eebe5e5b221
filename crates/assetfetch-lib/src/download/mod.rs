#[allow(clippy::module_inception)]
mod download;
mod transport;
mod types;

pub use download::download_all;
pub use transport::{ByteStream, HttpTransport, Transport};
pub use types::{DirectoryErrorPolicy, DownloadOptions, EntryOutcome, Outcome, RunReport};
