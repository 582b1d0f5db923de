//! patchbay - plays a demo patch on the default output device
//!
//! Run with: cargo run -- [config.toml]

mod app;

use color_eyre::eyre::{Result, WrapErr};
use patchbay::EngineConfig;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("patchbay=info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            let source =
                std::fs::read_to_string(&path).wrap_err_with(|| format!("failed to read {path}"))?;
            EngineConfig::from_toml_str(&source).wrap_err_with(|| format!("invalid config {path}"))?
        }
        None => EngineConfig::default(),
    };

    app::Patchbay::new(config).run()
}
