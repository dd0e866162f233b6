use std::fmt;

use secrecy::SecretString;

use crate::config::RegistryConfig;

pub const USERNAME_VAR: &str = "REGISTRY_USERNAME";
pub const PASSWORD_VAR: &str = "REGISTRY_PASSWORD";

/// Credentials for `docker login` before a push.
///
/// The password is only ever read from the environment (or `.env`) and is
/// wrapped in [`SecretString`] so it never shows up in logs.
#[derive(Clone)]
pub struct RegistryAuth {
    pub username: String,
    pub password: SecretString,
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl RegistryAuth {
    /// Resolve credentials from the process environment.
    ///
    /// Returns `Ok(None)` when nothing is configured, in which case the push
    /// relies on whatever login the Docker CLI already holds.
    pub fn load(config: &RegistryConfig) -> crate::Result<Option<Self>> {
        // Attempt to load .env file (silently ignore if not found)
        let dotenv_loaded = dotenvy::dotenv().is_ok();
        tracing::debug!(dotenv = dotenv_loaded, "loading registry credentials");

        // arch-lint: allow(no-silent-result-drop) reason="an unset or non-unicode variable means no credential was provided"
        Self::from_lookup(config, |key| std::env::var(key).ok())
    }

    /// Resolve credentials through an arbitrary variable lookup.
    pub fn from_lookup<F>(config: &RegistryConfig, lookup: F) -> crate::Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let username = non_empty(USERNAME_VAR).or_else(|| config.username.clone());
        let password = non_empty(PASSWORD_VAR);

        match (username, password) {
            (None, None) => Ok(None),
            (Some(username), Some(password)) => {
                tracing::debug!(%username, "registry credentials configured");
                Ok(Some(Self {
                    username,
                    password: SecretString::from(password),
                }))
            }
            (Some(_), None) => Err(crate::Error::MissingEnvVar(PASSWORD_VAR.to_owned())),
            (None, Some(_)) => Err(crate::Error::MissingEnvVar(USERNAME_VAR.to_owned())),
        }
    }
}
