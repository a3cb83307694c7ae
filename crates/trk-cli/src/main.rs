use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::fs;
use trk_consumers::VerifyResult;
use trk_trace::{normalize_batch, NormalizeOptions};

#[derive(Parser)]
#[command(name = "trk")]
#[command(about = "Telemetry collector operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> env -> overrides...)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail if the merged document has keys the collector never reads
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Normalize a JSON file of statements (array or single object) and print the traces
    Normalize {
        file: String,

        /// Key under object.definition.extensions holding the tracking tag
        #[arg(long, default_value = "tracking")]
        tracking_extension: String,
    },

    /// Trace log utilities
    Log {
        #[command(subcommand)]
        cmd: LogCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Apply ledger migrations to TRK_DATABASE_URL
    Migrate,
}

#[derive(Subcommand)]
enum LogCmd {
    /// Verify the hash chain of a trace log (JSONL)
    Verify { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Db { cmd } => match cmd {
            DbCmd::Migrate => {
                let pool = trk_ledger::pg::connect_from_env().await?;
                trk_ledger::pg::migrate(&pool).await?;
                println!("migrations_applied=true");
            }
        },

        Commands::ConfigHash { paths, strict } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = trk_config::load_layered_yaml(&path_refs)?;
            let policy = if strict {
                trk_config::UnusedKeyPolicy::Fail
            } else {
                trk_config::UnusedKeyPolicy::Warn
            };
            let report = trk_config::report_unused_keys(&loaded.config_json, policy)?;
            // Typed extraction also validates the document.
            loaded.collector()?;

            println!("config_hash={}", loaded.config_hash);
            for ptr in &report.unused_leaf_pointers {
                eprintln!("unused_key={}", ptr);
            }
            println!("{}", loaded.canonical_json);
        }

        Commands::Normalize {
            file,
            tracking_extension,
        } => {
            let s = fs::read_to_string(&file).with_context(|| format!("read {file}"))?;
            let doc: Value = serde_json::from_str(&s).context("statements file is not JSON")?;
            let statements = match doc {
                Value::Array(items) => items,
                obj @ Value::Object(_) => vec![obj],
                _ => bail!("statements file must hold an array or an object"),
            };

            let opts = NormalizeOptions { tracking_extension };
            match normalize_batch(&statements, &opts) {
                Ok(traces) => {
                    for t in &traces {
                        println!("{}", serde_json::to_string(t)?);
                    }
                }
                Err(e) => bail!("{e}"),
            }
        }

        Commands::Log { cmd } => match cmd {
            LogCmd::Verify { path } => match trk_consumers::verify_hash_chain(&path)? {
                VerifyResult::Valid { lines } => {
                    println!("chain_valid=true lines={}", lines);
                }
                VerifyResult::Broken { line, reason } => {
                    println!("chain_valid=false line={}", line);
                    bail!("hash chain broken at line {line}: {reason}");
                }
            },
        },
    }

    Ok(())
}
