//! plaudit server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`) layered with
//! `PLAUDIT_*` environment variables, opens the SQLite store, builds the Dify
//! client and serves the JSON API over HTTP.
//!
//! # Provisioning a company
//!
//! ```
//! cargo run -p plaudit-server -- --create-company "Acme Dental" --slug acme
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use plaudit_api::AppState;
use plaudit_core::{company::NewCompany, schema::slugify_label, store::TestimonialStore};
use plaudit_dify::DifyClient;
use plaudit_server::ServerConfig;
use plaudit_store_sqlite::SqliteStore;
use rand_core::{OsRng, RngCore};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Plaudit testimonial server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create a company with its public form, print its identifiers and exit.
  #[arg(long, value_name = "NAME")]
  create_company: Option<String>,

  /// Slug for `--create-company`; derived from the name when omitted.
  #[arg(long, requires = "create_company")]
  slug: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config).context("failed to load configuration")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Helper mode: provision a company and exit.
  if let Some(name) = cli.create_company {
    let summary = create_company(&store, name, cli.slug).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    return Ok(());
  }

  if server_cfg.dify_api_key.is_empty() {
    tracing::warn!("dify_api_key is not set; testimonial generation will fail");
  }
  let dify = DifyClient::new(server_cfg.dify()).context("failed to build Dify client")?;
  let mut state = AppState::new(Arc::new(store), Arc::new(dify));
  if let Some(form_cfg) = server_cfg.dify_form() {
    let designer = DifyClient::new(form_cfg).context("failed to build Dify form client")?;
    state = state.with_schema_workflow(Arc::new(designer));
    tracing::info!("form schemas are designed by the Dify form workflow");
  }

  let app = plaudit_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// `bytes` random bytes from the OS, hex-encoded.
fn random_hex(bytes: usize) -> String {
  let mut buf = vec![0u8; bytes];
  OsRng.fill_bytes(&mut buf);
  hex::encode(buf)
}

/// Create a company and its form; returns the identifiers an operator needs.
async fn create_company(
  store: &SqliteStore,
  name: String,
  slug: Option<String>,
) -> anyhow::Result<serde_json::Value> {
  let slug = slug.unwrap_or_else(|| {
    format!("{}-{}", slugify_label(&name).replace('_', "-"), random_hex(3))
  });
  let iframe_token = random_hex(16);

  let (company, form) = store
    .create_company(NewCompany {
      name,
      slug: slug.clone(),
      iframe_token: Some(iframe_token.clone()),
      form_slug: random_hex(6),
    })
    .await
    .with_context(|| format!("failed to create company {slug:?}"))?;

  tracing::info!(company_id = %company.company_id, %slug, "created company");

  Ok(serde_json::json!({
    "company_id":   company.company_id,
    "slug":         company.slug,
    "form_slug":    form.slug,
    "iframe_token": iframe_token,
    "submit_path":  format!("/api/submit/{}", form.slug),
    "embed_path":   format!("/api/embed/{}?token={iframe_token}", company.slug),
  }))
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
