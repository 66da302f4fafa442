use std::path::Path;

use anyhow::Context;
use russh_keys::key::KeyPair;

/// Loads the persisted host key at `path`, generating and persisting a
/// fresh one if it is missing. Mirrors the original implementation's
/// "generate once, then always load" lifecycle — there is no in-place
/// rotation.
pub fn load_or_generate(path: impl AsRef<Path>) -> anyhow::Result<KeyPair> {
    let path = path.as_ref();

    if path.exists() {
        let key = russh_keys::load_secret_key(path, None)
            .with_context(|| format!("loading host key from {}", path.display()))?;
        tracing::info!(path = %path.display(), "loaded existing ssh host key");
        return Ok(key);
    }

    tracing::info!(path = %path.display(), "generating new ssh host key");
    let key = KeyPair::generate_ed25519().context("generating ed25519 host key")?;
    russh_keys::encode_pkcs8_pem(&key, path)
        .with_context(|| format!("persisting host key to {}", path.display()))?;
    tracing::info!(path = %path.display(), "saved new ssh host key");
    Ok(key)
}
