//! Configuration loading and resolution.

use icare_portal::PortalConfig;

/// Listen address used when neither the CLI nor the environment sets one.
pub const DEFAULT_ADDR: &str = "127.0.0.1:8000";

/// Resolve the REST listen address: explicit flag, then `ICARE_ADDR`.
pub fn resolve_listen_addr(explicit: Option<&str>) -> String {
    if let Some(addr) = explicit {
        return addr.to_string();
    }

    if let Ok(env_addr) = std::env::var("ICARE_ADDR") {
        if !env_addr.trim().is_empty() {
            return env_addr.trim().to_string();
        }
    }

    DEFAULT_ADDR.to_string()
}

/// Resolve the portal configuration: environment overrides, then an
/// explicit base URL on top.
pub fn resolve_portal_config(base_url: Option<&str>) -> PortalConfig {
    let mut config = PortalConfig::from_env();
    if let Some(base_url) = base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    config
}
