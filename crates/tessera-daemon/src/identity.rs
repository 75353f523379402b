// crates/tessera-daemon/src/identity.rs
//
// Resolution of the local node identity used in trust reports.
//
// Precedence: --local-key flag, `local_key` in the config file, public key
// derived from the hotkey secret file, and finally a freshly generated
// ephemeral key.

use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use tessera_core::{PeerId, TesseraError, PEER_ID_LEN};

use crate::config::DaemonConfig;

/// Where the local identity came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    CommandLine,
    Config,
    HotkeyFile,
    Ephemeral,
}

/// Determine this node's identity.
///
/// An explicitly configured key that does not parse is an error. A missing
/// or invalid hotkey file only falls through to the next option.
pub fn load_local_key(
    cli_key: Option<&str>,
    config: &DaemonConfig,
) -> Result<(PeerId, KeyOrigin), TesseraError> {
    if let Some(key) = cli_key {
        return parse_key(key, "--local-key").map(|k| (k, KeyOrigin::CommandLine));
    }
    if let Some(key) = config.local_key.as_deref() {
        return parse_key(key, "local_key").map(|k| (k, KeyOrigin::Config));
    }

    let hotkey_path = expand_tilde(&config.hotkey_path);
    if let Some(key) = load_hotkey_public(&hotkey_path) {
        return Ok((key, KeyOrigin::HotkeyFile));
    }

    let signing_key = SigningKey::generate(&mut OsRng);
    let key = PeerId::from_bytes(signing_key.verifying_key().to_bytes());
    Ok((key, KeyOrigin::Ephemeral))
}

fn parse_key(key: &str, field: &str) -> Result<PeerId, TesseraError> {
    key.parse()
        .map_err(|e| TesseraError::Config(format!("invalid {}: {}", field, e)))
}

/// Read a hex-encoded ed25519 secret and derive its public key.
fn load_hotkey_public(path: &str) -> Option<PeerId> {
    let hex_str = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(_) => {
            tracing::debug!("Hotkey secret not found at {}", path);
            return None;
        }
    };

    let secret: [u8; PEER_ID_LEN] = match hex::decode(hex_str.trim()) {
        Ok(bytes) => match bytes.try_into() {
            Ok(arr) => arr,
            Err(_) => {
                tracing::warn!("Invalid hotkey secret length at {}", path);
                return None;
            }
        },
        Err(e) => {
            tracing::warn!("Invalid hotkey secret at {}: {}", path, e);
            return None;
        }
    };

    let signing_key = SigningKey::from_bytes(&secret);
    Some(PeerId::from_bytes(signing_key.verifying_key().to_bytes()))
}

/// Expand `~` at the start of a path to the user's home directory.
pub fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}
