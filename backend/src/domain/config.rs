//! Environment abstraction shared by configuration loaders.

/// Environment source for configuration lookups.
///
/// This trait allows testing with mock environments without unsafe env var
/// mutations.
pub trait ConfigEnv {
    /// Fetch a string value by name.
    fn string(&self, name: &str) -> Option<String>;
}

/// Environment access backed by the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultConfigEnv;

impl DefaultConfigEnv {
    /// Create a new environment reader.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConfigEnv for DefaultConfigEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// Parse an environment value, falling back to `default` when the variable
/// is unset or unparseable.
pub(crate) fn parsed_or<T: std::str::FromStr>(env: &impl ConfigEnv, name: &str, default: T) -> T {
    env.string(name)
        .and_then(|raw| raw.parse::<T>().ok())
        .unwrap_or(default)
}
