//! nimbusio CLI - command line access to a nimbus.io collection
//!
//! Credentials come from `--credentials`, `$NIMBUS_IO_CREDENTIALS` or
//! `~/.nimbus.io`; the service location from `NIMBUS_IO_SERVICE_*`.

use clap::{Parser, Subcommand};
use nimbusio::{
    abort_conjoined, archive, archive_bytes, delete_key, delete_version, finish_conjoined,
    retrieve, retrieve_bytes, start_conjoined, ConjoinedParams, Credentials, HttpRequester,
    RetrieveParams,
};
use std::fs::File;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const TEST_KEY: &str = "test key";
const TEST_BODY: &str = "test body";

#[derive(Parser)]
#[command(name = "nimbusio")]
#[command(about = "Archive, retrieve and delete keys in nimbus.io collections")]
#[command(version)]
struct Cli {
    /// Path to the credentials file
    #[arg(short, long)]
    credentials: Option<PathBuf>,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file to a key
    Archive {
        collection: String,
        key: String,
        /// File to upload
        file: PathBuf,
        /// Conjoined archive this upload belongs to
        #[arg(long, requires = "conjoined_part")]
        conjoined_identifier: Option<String>,
        /// Part number within the conjoined archive
        #[arg(long, requires = "conjoined_identifier")]
        conjoined_part: Option<u32>,
    },

    /// Download a key
    Retrieve {
        collection: String,
        key: String,
        /// Version to retrieve (default: latest)
        #[arg(long)]
        version: Option<String>,
        /// Byte offset to start from
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Number of bytes to retrieve (default: to the end)
        #[arg(long, default_value = "0")]
        size: u64,
        /// Write the content here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a key, or one version of it
    Delete {
        collection: String,
        key: String,
        #[arg(long)]
        version: Option<String>,
    },

    /// Start a conjoined archive
    StartConjoined { collection: String, key: String },

    /// Abort a conjoined archive
    AbortConjoined {
        collection: String,
        key: String,
        conjoined_identifier: String,
    },

    /// Finish a conjoined archive
    FinishConjoined {
        collection: String,
        key: String,
        conjoined_identifier: String,
    },

    /// Archive, retrieve and delete a test key
    Demo { collection: String },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let credentials = match &cli.credentials {
        Some(path) => Credentials::load_from_path(path)?,
        None => Credentials::load_default()?,
    };
    let requester = HttpRequester::from_env(credentials)?;

    match cli.command {
        Commands::Archive {
            collection,
            key,
            file,
            conjoined_identifier,
            conjoined_part,
        } => {
            let params = conjoined_params(conjoined_identifier, conjoined_part);
            let handle = File::open(&file)?;
            let content_length = handle.metadata()?.len();

            let version = archive(
                &requester,
                &collection,
                &key,
                params.as_ref(),
                content_length,
                handle,
            )?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "version_identifier": version,
                    "size_bytes": content_length
                }),
            );
        }

        Commands::Retrieve {
            collection,
            key,
            version,
            offset,
            size,
            output: destination,
        } => {
            let params = RetrieveParams {
                version_identifier: version,
                slice_offset: offset,
                slice_size: size,
                ..Default::default()
            };
            let mut body = retrieve(&requester, &collection, &key, &params)?;
            match destination {
                Some(path) => {
                    let mut file = File::create(&path)?;
                    let written = std::io::copy(&mut body, &mut file)?;
                    output(
                        &cli.format,
                        &serde_json::json!({
                            "status": "ok",
                            "key": key,
                            "path": path.display().to_string(),
                            "size_bytes": written
                        }),
                    );
                }
                None => {
                    std::io::copy(&mut body, &mut std::io::stdout().lock())?;
                }
            }
        }

        Commands::Delete {
            collection,
            key,
            version,
        } => {
            match &version {
                Some(version) => delete_version(&requester, &collection, &key, version)?,
                None => delete_key(&requester, &collection, &key)?,
            }
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "version_identifier": version
                }),
            );
        }

        Commands::StartConjoined { collection, key } => {
            let id = start_conjoined(&requester, &collection, &key)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "conjoined_identifier": id
                }),
            );
        }

        Commands::AbortConjoined {
            collection,
            key,
            conjoined_identifier,
        } => {
            abort_conjoined(&requester, &collection, &key, &conjoined_identifier)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "action": "abort"
                }),
            );
        }

        Commands::FinishConjoined {
            collection,
            key,
            conjoined_identifier,
        } => {
            finish_conjoined(&requester, &collection, &key, &conjoined_identifier)?;
            output(
                &cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "key": key,
                    "action": "finish"
                }),
            );
        }

        Commands::Demo { collection } => {
            let version = archive_bytes(&requester, &collection, TEST_KEY, None, TEST_BODY)?;
            let retrieved =
                retrieve_bytes(&requester, &collection, TEST_KEY, &RetrieveParams::default())?;
            let matches = &retrieved[..] == TEST_BODY.as_bytes();
            delete_key(&requester, &collection, TEST_KEY)?;

            let status = if matches { "ok" } else { "error" };
            output(
                &cli.format,
                &serde_json::json!({
                    "status": status,
                    "key": TEST_KEY,
                    "version_identifier": version,
                    "matches": matches
                }),
            );
            if !matches {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

/// Clap only accepts the two conjoined options together
fn conjoined_params(identifier: Option<String>, part: Option<u32>) -> Option<ConjoinedParams> {
    match (identifier, part) {
        (Some(identifier), Some(part)) => Some(ConjoinedParams::new(identifier, part)),
        _ => None,
    }
}

fn output(format: &OutputFormat, value: &serde_json::Value) {
    match format {
        OutputFormat::Json => {
            println!("{}", value);
        }
        OutputFormat::Text => {
            println!("{:#}", value);
        }
    }
}
