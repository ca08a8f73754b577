//! CLI configuration: thin wrapper around `isapi_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--host, --login, --password, ...).

use secrecy::SecretString;

use isapi_api::{Client, ClientBuilder, Credentials, DEFAULT_PREFIX, TlsMode};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use isapi_config::{Config, Profile, config_path, load_config_or_default};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Comma-separated profile names, for help text.
pub fn available_profiles(config: &Config) -> String {
    if config.profiles.is_empty() {
        "(none)".into()
    } else {
        config.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Build a client from the config file, the active profile and CLI flags.
pub fn build_client(global: &GlobalOpts) -> Result<Client, CliError> {
    let cfg = load_config_or_default();
    Ok(client_builder(global, &cfg)?.build()?)
}

/// Translate the active profile plus flag overrides into a `ClientBuilder`.
///
/// Flags take priority over profile values. Without a matching profile the
/// flags alone must name a host.
pub fn client_builder(global: &GlobalOpts, cfg: &Config) -> Result<ClientBuilder, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let profile = match cfg.profiles.get(&profile_name) {
        Some(profile) => profile.clone(),
        None if global.host.is_some() => Profile::new(String::new()),
        None if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(cfg),
            });
        }
        None => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    // 1. Host (flag > profile)
    let host = global.host.clone().unwrap_or_else(|| profile.host.clone());
    if host.trim().is_empty() {
        return Err(CliError::Validation {
            field: "host".into(),
            reason: format!("profile '{profile_name}' has no host"),
        });
    }

    // 2. Credentials
    let login = global.login.clone().unwrap_or_else(|| profile.login.clone());
    let password = match global.password {
        Some(ref pw) => SecretString::from(pw.clone()),
        None => isapi_config::resolve_password(&profile, &profile_name)?,
    };

    // 3. Timeout
    let secs = global.timeout.or(profile.timeout).unwrap_or(cfg.defaults.timeout);
    let timeout = isapi_config::timeout_from_secs(secs)?;

    // 4. TLS
    let tls = if global.insecure {
        TlsMode::DangerAcceptInvalid
    } else {
        isapi_config::tls_mode(&profile, &cfg.defaults)
    };

    let prefix = global
        .prefix
        .as_deref()
        .or(profile.isapi_prefix.as_deref())
        .unwrap_or(DEFAULT_PREFIX);

    Ok(ClientBuilder::new(host)
        .with_credentials(Credentials { login, password })
        .prefix(prefix)
        .timeout(timeout)
        .tls(tls))
}
