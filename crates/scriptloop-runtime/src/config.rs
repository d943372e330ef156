#![forbid(unsafe_code)]

//! Runner configuration.
//!
//! | Field          | Default             | Env override              |
//! |----------------|---------------------|---------------------------|
//! | `idle`         | `Shutdown`          | `SCRIPTLOOP_IDLE`         |
//! | `catch_panics` | `true`              | `SCRIPTLOOP_CATCH_PANICS` |
//! | `thread_name`  | `scriptloop-runner` | none                      |

/// What the runner thread does when its request queue runs dry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdleBehavior {
    /// Exit the loop and emit the shutdown event.
    #[default]
    Shutdown,
    /// Block until the next request arrives.
    Wait,
}

impl IdleBehavior {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "shutdown" | "exit" => Some(Self::Shutdown),
            "wait" | "block" => Some(Self::Wait),
            _ => None,
        }
    }
}

/// Configuration for a [`ScriptRunner`](crate::ScriptRunner).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Behavior when no request is pending between runs.
    pub idle: IdleBehavior,
    /// Name given to the runner thread.
    pub thread_name: String,
    /// Turn panics in script bodies into rendered exceptions.
    pub catch_panics: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            idle: IdleBehavior::Shutdown,
            thread_name: "scriptloop-runner".to_owned(),
            catch_panics: true,
        }
    }
}

impl RunnerConfig {
    /// Defaults overridden by `SCRIPTLOOP_IDLE` and `SCRIPTLOOP_CATCH_PANICS`.
    ///
    /// Unrecognized values are logged and ignored.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup("SCRIPTLOOP_IDLE") {
            match IdleBehavior::parse(&raw) {
                Some(idle) => self.idle = idle,
                None => tracing::warn!(value = %raw, "ignoring unknown SCRIPTLOOP_IDLE"),
            }
        }
        if let Some(raw) = lookup("SCRIPTLOOP_CATCH_PANICS") {
            match parse_flag(&raw) {
                Some(flag) => self.catch_panics = flag,
                None => tracing::warn!(value = %raw, "ignoring unknown SCRIPTLOOP_CATCH_PANICS"),
            }
        }
        self
    }

    #[must_use]
    pub fn with_idle(mut self, idle: IdleBehavior) -> Self {
        self.idle = idle;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn with_catch_panics(mut self, enabled: bool) -> Self {
        self.catch_panics = enabled;
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env<'a>(pairs: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v).to_owned())
        }
    }

    #[test]
    fn defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.idle, IdleBehavior::Shutdown);
        assert!(config.catch_panics);
        assert_eq!(config.thread_name, "scriptloop-runner");
    }

    #[test]
    fn builders_override_fields() {
        let config = RunnerConfig::default()
            .with_idle(IdleBehavior::Wait)
            .with_thread_name("worker")
            .with_catch_panics(false);
        assert_eq!(config.idle, IdleBehavior::Wait);
        assert_eq!(config.thread_name, "worker");
        assert!(!config.catch_panics);
    }

    #[test]
    fn env_overrides_apply() {
        let config = RunnerConfig::default().with_env_overrides(env(&[
            ("SCRIPTLOOP_IDLE", "Wait"),
            ("SCRIPTLOOP_CATCH_PANICS", "off"),
        ]));
        assert_eq!(config.idle, IdleBehavior::Wait);
        assert!(!config.catch_panics);
    }

    #[test]
    fn unknown_env_values_keep_defaults() {
        let config = RunnerConfig::default().with_env_overrides(env(&[
            ("SCRIPTLOOP_IDLE", "sometimes"),
            ("SCRIPTLOOP_CATCH_PANICS", "maybe"),
        ]));
        assert_eq!(config, RunnerConfig::default());
    }
}
