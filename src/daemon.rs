use std::fs;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::Config;
use crate::ssh;

/// Top-level orchestration: load config, load or generate the host key,
/// bind the listening socket, and run the rate-limited accept loop until a
/// shutdown signal arrives.
pub async fn run(config_file: Option<String>) -> anyhow::Result<()> {
    info!("starting parlor");

    let config = match config_file {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("reading config file {path}"))?;
            toml::from_str(&raw).context("parsing config file")?
        }
        None => Config::default(),
    };
    let config = Arc::new(config);

    let ssh_config = ssh::load_ssh_config(&config)?;
    let listener = ssh::bind(&config).await?;
    info!(port = config.port(), "listening for ssh connections");

    let daemon = Arc::new(ssh::Daemon::new(config));

    tokio::select! {
        result = ssh::serve(daemon, listener, ssh_config) => result,
        _ = crate::signals::wait_for_shutdown() => Ok(()),
    }
}
