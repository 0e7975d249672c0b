//! # Docstore CLI (`docstore`)
//!
//! Serves the document API and talks to a running instance of it.
//!
//! ## Usage
//!
//! ```bash
//! docstore --config ./config/docstore.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docstore serve remote` | Serve the API backed by the hosted repository |
//! | `docstore serve local` | Serve the API backed by the local mirrored directories |
//! | `docstore check` | Verify credentials and layout against the repository |
//! | `docstore client <action>` | Read or write documents through a running API |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

use repo_docstore::client::ApiClient;
use repo_docstore::config::{self, Config};
use repo_docstore::models::Collection;
use repo_docstore::remote::{GitDataApi, RemoteTreeClient};
use repo_docstore::server;

/// Docstore: a JSON document API persisted as commits to a Git repository.
#[derive(Parser)]
#[command(name = "docstore", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docstore.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API.
    Serve {
        #[command(subcommand)]
        backend: ServeBackend,
    },

    /// Resolve the branch head and read the settings file.
    ///
    /// Useful for verifying the token, repository and layout before serving.
    Check,

    /// Call a running API.
    Client {
        /// API root.
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        api_url: String,

        /// Where static `{name}.json` copies are served; reads fall back
        /// to it when the API does not answer.
        #[arg(long)]
        static_url: Option<String>,

        /// Shared secret sent with writes.
        #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
        secret: Option<String>,

        #[command(subcommand)]
        action: ClientAction,
    },
}

#[derive(Subcommand)]
enum ServeBackend {
    /// Backed by the hosted repository; binds to `[server].bind`.
    Remote,
    /// Backed by the local `db/` and `public/data/` directories; binds to `[local].bind`.
    Local,
}

#[derive(Subcommand)]
enum ClientAction {
    /// List a collection.
    List { collection: Collection },
    /// Get one document.
    Get { collection: Collection, id: String },
    /// Print the settings object.
    Settings,
    /// Append a document (JSON object).
    Create { collection: Collection, json: String },
    /// Replace a document (JSON object).
    Update {
        collection: Collection,
        id: String,
        json: String,
    },
    /// Remove a document.
    Delete { collection: Collection, id: String },
    /// Replace the settings object.
    PutSettings { json: String },
}

fn parse_json(text: &str) -> anyhow::Result<serde_json::Value> {
    serde_json::from_str(text).context("argument is not valid JSON")
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_client(client: &ApiClient, action: ClientAction) -> anyhow::Result<()> {
    match action {
        ClientAction::List { collection } => {
            let items = client.list(collection).await?;
            print_json(&serde_json::Value::Array(items))?;
        }
        ClientAction::Get { collection, id } => {
            print_json(&client.get(collection, &id).await?)?;
        }
        ClientAction::Settings => {
            print_json(&client.settings().await?)?;
        }
        ClientAction::Create { collection, json } => {
            print_json(&client.create(collection, &parse_json(&json)?).await?)?;
        }
        ClientAction::Update {
            collection,
            id,
            json,
        } => {
            print_json(&client.update(collection, &id, &parse_json(&json)?).await?)?;
        }
        ClientAction::Delete { collection, id } => {
            client.delete(collection, &id).await?;
            println!("Deleted {}/{}", collection, id);
        }
        ClientAction::PutSettings { json } => {
            print_json(&client.put_settings(&parse_json(&json)?).await?)?;
        }
    }
    Ok(())
}

async fn run_check(cfg: &Config) -> anyhow::Result<()> {
    cfg.validate_remote()?;
    let remote = RemoteTreeClient::new(&cfg.remote)?;
    let head = remote.get_branch_head().await?;
    let tree = remote.get_commit_tree(&head).await?;
    println!(
        "{}/{}@{}: commit {} tree {}",
        cfg.remote.owner,
        cfg.remote.repo,
        remote.branch(),
        head,
        tree
    );
    let settings_path = cfg.layout.public_settings_path();
    let settings = remote.read_file(&settings_path).await?;
    println!("{}: blob {}", settings_path, settings.revision);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        // The client never needs the config file.
        Commands::Client {
            api_url,
            static_url,
            secret,
            action,
        } => {
            let client = ApiClient::new(&api_url, static_url.as_deref(), secret);
            run_client(&client, action).await?;
        }
        Commands::Serve {
            backend: ServeBackend::Local,
        } => {
            // The local variant never talks to the remote and runs without a config file.
            let cfg = config::load_config_or_default(&cli.config)?;
            server::run_local_server(&cfg).await?;
        }
        Commands::Serve {
            backend: ServeBackend::Remote,
        } => {
            let cfg = config::load_config(&cli.config)?;
            server::run_server(&cfg).await?;
        }
        Commands::Check => {
            let cfg = config::load_config(&cli.config)?;
            run_check(&cfg).await?;
        }
    }

    Ok(())
}
