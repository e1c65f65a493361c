//! smt CLI - Command line interface for sparse_merkle
//!
//! Each invocation opens the database file, runs one command and syncs.
//! Results go to stdout as JSON, logs go to stderr.

use clap::{Parser, Subcommand};
use sparse_merkle::{Database, Error, Hash, SparseCompactMerkleProof, SparseMerkleProof};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "smt")]
#[command(about = "A persistent sparse merkle tree")]
#[command(version)]
struct Cli {
    /// Path to the database file
    #[arg(short, long, default_value = "tree.smt")]
    database: PathBuf,

    /// Output format (json or text)
    #[arg(short, long, default_value = "json")]
    format: OutputFormat,

    /// Keys and values are given and printed as hex
    #[arg(long)]
    hex: bool,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

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
    /// Initialize a new database
    Init,

    // === Key Commands ===
    /// Get the value of a key
    Get {
        /// The key
        key: String,
    },

    /// Set a key to a value
    Set {
        /// The key
        key: String,
        /// The value
        value: String,
    },

    /// Delete a key
    Delete {
        /// The key
        key: String,
    },

    /// Check whether a key is present
    Has {
        /// The key
        key: String,
    },

    // === Tree Commands ===
    /// Show the current root
    Root,

    /// Produce a proof for a key against the current root
    Prove {
        /// The key
        key: String,
        /// Emit the compact form
        #[arg(long)]
        compact: bool,
    },

    /// Name the current root
    Tag {
        /// Tag name
        name: String,
    },

    /// Remove a tag
    Untag {
        /// Tag name
        name: String,
    },

    /// Switch to a tagged root or a root hash
    Checkout {
        /// Tag name or root hash
        reference: String,
    },

    /// List all tags
    Tags,

    /// Show database status
    Status,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init => {
            let db = Database::create(&cli.database)?;
            db.sync()?;
            output(
                cli.format,
                &serde_json::json!({
                    "status": "ok",
                    "message": format!("Created database at {}", cli.database.display())
                }),
            )?;
        }

        Commands::Get { key } => {
            let db = open_db(&cli.database)?;
            let value = db.get(&parse_bytes(&key, cli.hex)?)?;
            if value.is_empty() {
                not_found(cli.format, &format!("Key not found: {}", key))?;
            }
            output(
                cli.format,
                &serde_json::json!({
                    "key": key,
                    "value": render_bytes(&value, cli.hex)
                }),
            )?;
        }

        Commands::Set { key, value } => {
            let mut db = open_db(&cli.database)?;
            // An empty value deletes the key
            match db.update(&parse_bytes(&key, cli.hex)?, &parse_bytes(&value, cli.hex)?) {
                Ok(root) => {
                    db.sync()?;
                    output(
                        cli.format,
                        &serde_json::json!({
                            "status": "ok",
                            "key": key,
                            "root": root.to_hex()
                        }),
                    )?;
                }
                Err(e) if e.is_absent_key() => {
                    not_found(cli.format, &format!("Key not found: {}", key))?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Delete { key } => {
            let mut db = open_db(&cli.database)?;
            match db.delete(&parse_bytes(&key, cli.hex)?) {
                Ok(root) => {
                    db.sync()?;
                    output(
                        cli.format,
                        &serde_json::json!({
                            "status": "ok",
                            "key": key,
                            "root": root.to_hex()
                        }),
                    )?;
                }
                Err(e) if e.is_absent_key() => {
                    not_found(cli.format, &format!("Key not found: {}", key))?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Has { key } => {
            let db = open_db(&cli.database)?;
            let present = db.has(&parse_bytes(&key, cli.hex)?)?;
            output(
                cli.format,
                &serde_json::json!({
                    "key": key,
                    "present": present
                }),
            )?;
        }

        Commands::Root => {
            let db = open_db(&cli.database)?;
            output(
                cli.format,
                &serde_json::json!({
                    "root": db.root().to_hex(),
                    "empty": db.root().is_zero()
                }),
            )?;
        }

        Commands::Prove { key, compact } => {
            let db = open_db(&cli.database)?;
            let key_bytes = parse_bytes(&key, cli.hex)?;
            let present = db.has(&key_bytes)?;
            let proof = if compact {
                compact_proof_json(&db.prove_compact(&key_bytes)?)?
            } else {
                proof_json(&db.prove(&key_bytes)?)?
            };
            output(
                cli.format,
                &serde_json::json!({
                    "key": key,
                    "root": db.root().to_hex(),
                    "membership": present,
                    "proof": proof
                }),
            )?;
        }

        Commands::Tag { name } => {
            let db = open_db(&cli.database)?;
            match db.tag(&name) {
                Ok(root) => {
                    db.sync()?;
                    output(
                        cli.format,
                        &serde_json::json!({
                            "status": "ok",
                            "tag": name,
                            "root": root.to_hex()
                        }),
                    )?;
                }
                Err(e @ Error::InvalidRefName(_)) => {
                    not_found(cli.format, &e.to_string())?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Untag { name } => {
            let db = open_db(&cli.database)?;
            match db.untag(&name) {
                Ok(()) => {
                    db.sync()?;
                    output(
                        cli.format,
                        &serde_json::json!({
                            "status": "ok",
                            "tag": name
                        }),
                    )?;
                }
                Err(Error::RefNotFound(_)) => {
                    not_found(cli.format, &format!("Tag not found: {}", name))?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Checkout { reference } => {
            let mut db = open_db(&cli.database)?;
            match db.checkout(&reference) {
                Ok(root) => {
                    db.sync()?;
                    output(
                        cli.format,
                        &serde_json::json!({
                            "status": "ok",
                            "reference": reference,
                            "root": root.to_hex()
                        }),
                    )?;
                }
                Err(Error::RefNotFound(_)) => {
                    not_found(cli.format, &format!("Reference not found: {}", reference))?;
                }
                Err(e @ Error::MissingNode(_)) => {
                    not_found(cli.format, &e.to_string())?;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Tags => {
            let db = open_db(&cli.database)?;
            let current = db.root();
            let items: Vec<_> = db
                .tags()
                .iter()
                .map(|(name, root)| {
                    serde_json::json!({
                        "name": name,
                        "root": root.to_hex(),
                        "current": *root == current
                    })
                })
                .collect();
            output(
                cli.format,
                &serde_json::json!({
                    "count": items.len(),
                    "tags": items
                }),
            )?;
        }

        Commands::Status => {
            let db = open_db(&cli.database)?;
            output(
                cli.format,
                &serde_json::json!({
                    "database": cli.database.display().to_string(),
                    "root": db.root().to_hex(),
                    "entries": db.entry_count(),
                    "tags": db.tags().len(),
                    "prune_orphans": db.config().prune_orphans
                }),
            )?;
        }
    }

    Ok(())
}

/// Logs go to stderr; `RUST_LOG` wins over `-v`
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn open_db(path: &Path) -> anyhow::Result<Database> {
    Ok(Database::open_or_create(path)?)
}

fn parse_bytes(arg: &str, is_hex: bool) -> anyhow::Result<Vec<u8>> {
    if is_hex {
        hex::decode(arg).map_err(|e| anyhow::anyhow!("Invalid hex {:?}: {}", arg, e))
    } else {
        Ok(arg.as_bytes().to_vec())
    }
}

fn render_bytes(bytes: &[u8], is_hex: bool) -> String {
    if is_hex {
        hex::encode(bytes)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

fn hex_list(hashes: &[Hash]) -> Vec<String> {
    hashes.iter().map(Hash::to_hex).collect()
}

fn proof_json(proof: &SparseMerkleProof) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::json!({
        "side_nodes": hex_list(&proof.side_nodes),
        "non_membership_leaf_data": proof.non_membership_leaf_data.as_deref().map(hex::encode),
        "encoded": hex::encode(proof.to_bytes()?)
    }))
}

fn compact_proof_json(proof: &SparseCompactMerkleProof) -> anyhow::Result<serde_json::Value> {
    Ok(serde_json::json!({
        "side_nodes": hex_list(&proof.side_nodes),
        "non_membership_leaf_data": proof.non_membership_leaf_data.as_deref().map(hex::encode),
        "bit_mask": hex::encode(&proof.bit_mask),
        "num_side_nodes": proof.num_side_nodes,
        "encoded": hex::encode(proof.to_bytes()?)
    }))
}

fn not_found(format: OutputFormat, message: &str) -> anyhow::Result<()> {
    output(
        format,
        &serde_json::json!({
            "status": "error",
            "message": message
        }),
    )?;
    std::process::exit(1);
}

fn output(format: OutputFormat, value: &serde_json::Value) -> anyhow::Result<()> {
    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::Text => serde_json::to_string_pretty(value)?,
    };
    println!("{}", rendered);
    Ok(())
}
