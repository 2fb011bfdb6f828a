mod catalog;
mod categories;
mod config;
mod defaults;
mod error;
mod export;
mod model;
mod probe;
mod render;
mod resolver;
mod server;
mod store;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use catalog::Catalog;
use catalog_common::medium::{FileMedium, MemoryMedium, StorageMedium};
use catalog_common::redis::RedisMedium;
use config::{Config, MediumKind};
use probe::{AssetProbe, RoutedProbe, TimeoutProbe};
use server::PortfolioServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing to stderr (stdout is reserved for MCP JSON-RPC)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting portfolio-catalog MCP server");

    let config = Config::from_env()?;
    info!(
        medium = ?config.medium,
        key_prefix = %config.key_prefix,
        public_dir = %config.public_dir.display(),
        asset_base_url = config.asset_base_url.as_deref().unwrap_or("-"),
        "configuration loaded"
    );

    let medium = open_medium(&config.medium)?;
    let catalog = Catalog::init(medium, &config.key_prefix, config.delete_policy);
    info!(
        key = catalog.store().key(),
        entries = catalog.store().load().len(),
        categories = catalog.categories().load().len(),
        delete_policy = ?catalog.policy(),
        "catalog ready"
    );

    let mut probe: Arc<dyn AssetProbe> = Arc::new(RoutedProbe::new(
        config.public_dir.clone(),
        config.asset_base_url.as_deref(),
    )?);
    if let Some(timeout) = config.probe_timeout {
        probe = Arc::new(TimeoutProbe::new(probe, timeout));
    }

    let server = PortfolioServer::new(catalog, probe);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}

fn open_medium(kind: &MediumKind) -> anyhow::Result<Arc<dyn StorageMedium>> {
    let medium: Arc<dyn StorageMedium> = match kind {
        MediumKind::Memory => {
            info!("using in-memory medium, edits will not survive restart");
            Arc::new(MemoryMedium::new())
        }
        MediumKind::File { dir } => {
            let medium = FileMedium::open(dir)?;
            info!(dir = %medium.dir().display(), "file medium opened");
            Arc::new(medium)
        }
        MediumKind::Redis { url } => {
            let medium = RedisMedium::new(url)?;
            if medium.is_available() {
                info!("redis connected");
            } else {
                tracing::warn!("redis unavailable, serving defaults until it returns");
            }
            Arc::new(medium)
        }
    };
    Ok(medium)
}
