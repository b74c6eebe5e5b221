use crate::download::DirectoryErrorPolicy;
use clap::{ArgAction, Args as ClapArgs, Parser, Subcommand};
use tracing::Level;

#[derive(Debug, Clone)]
pub enum Command {
    Fetch {
        config_path: Option<String>,
        output_dir: Option<String>,
        parallelism: Option<usize>,
        max_concurrency_per_host: Option<usize>,
        on_directory_error: Option<DirectoryErrorPolicy>,
        strict: bool,
    },
    List {
        config_path: Option<String>,
    },
}

impl Default for Command {
    fn default() -> Self {
        Command::Fetch {
            config_path: None,
            output_dir: None,
            parallelism: None,
            max_concurrency_per_host: None,
            on_directory_error: None,
            strict: false,
        }
    }
}

pub struct Args {
    pub command: Command,
    pub log_level: Level,
}

#[derive(Debug, Parser)]
#[command(
    name = "assetfetch",
    version,
    about = "Download the three.js build and example modules used by the web frontend"
)]
struct Cli {
    #[arg(
        short = 'v',
        long = "verbose",
        help = "Sets the level of verbosity",
        action = ArgAction::Count,
        global = true
    )]
    verbose: u8,

    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Download every asset (the default when no command is given)
    Fetch(FetchArgs),

    /// Print the assets that would be downloaded, in order
    List {
        #[arg(
            short = 'c',
            long = "config",
            value_name = "FILE",
            help = "Optional config file overriding the builtin asset list"
        )]
        config: Option<String>,
    },
}

#[derive(Debug, ClapArgs)]
struct FetchArgs {
    #[arg(
        short = 'c',
        long = "config",
        value_name = "FILE",
        help = "Optional config file with output path, asset list and fetch settings"
    )]
    config: Option<String>,

    #[arg(
        short = 'o',
        long = "output-dir",
        value_name = "DIR",
        help = "Directory asset paths are resolved against (default: current directory)"
    )]
    output_dir: Option<String>,

    #[arg(
        long = "parallelism",
        value_name = "N",
        help = "Maximum number of simultaneous downloads (default: 1)"
    )]
    parallelism: Option<usize>,

    #[arg(
        long = "max-concurrency-per-host",
        value_name = "N",
        help = "Maximum concurrent HTTP requests per host (default: 8)"
    )]
    max_concurrency_per_host: Option<usize>,

    #[arg(
        long = "on-directory-error",
        value_name = "POLICY",
        help = "Whether a directory that cannot be created skips the asset or aborts the run",
        value_enum
    )]
    on_directory_error: Option<DirectoryErrorPolicy>,

    #[arg(
        long = "strict",
        help = "Exit with a failure status when any asset failed to download"
    )]
    strict: bool,
}

pub fn parse_args() -> Args {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(log_level.into())
                .from_env_lossy()
                .add_directive("hyper_util=warn".parse().unwrap()),
        )
        .init();

    let command = match cli.command {
        None => Command::default(),
        Some(CliCommand::Fetch(FetchArgs {
            config,
            output_dir,
            parallelism,
            max_concurrency_per_host,
            on_directory_error,
            strict,
        })) => Command::Fetch {
            config_path: config,
            output_dir,
            parallelism,
            max_concurrency_per_host,
            on_directory_error,
            strict,
        },
        Some(CliCommand::List { config }) => Command::List {
            config_path: config,
        },
    };

    Args { command, log_level }
}
