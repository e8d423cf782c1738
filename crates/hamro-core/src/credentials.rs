use crate::config::Config;

/// Environment variables checked for an API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

/// Host-provided key selection, e.g. the TUI's key prompt.
pub trait KeyBridge {
    fn has_selected_key(&self) -> bool;
    fn open_key_selection(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Config,
}

impl KeySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeySource::Env => "env",
            KeySource::Config => "config",
        }
    }
}

/// Whether a key is available. Without a bridge, only the environment counts.
pub fn key_available(bridge: Option<&dyn KeyBridge>) -> bool {
    match bridge {
        Some(bridge) => bridge.has_selected_key(),
        None => env_api_key().is_some(),
    }
}

pub fn env_api_key() -> Option<String> {
    env_api_key_with(|name| std::env::var(name).ok())
}

/// Environment first, then the config file.
pub fn resolve_api_key(config: &Config) -> Option<(String, KeySource)> {
    resolve_api_key_with(config, |name| std::env::var(name).ok())
}

fn env_api_key_with(lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    API_KEY_ENV_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|key| key.trim().to_string())
        .find(|key| !key.is_empty())
}

fn resolve_api_key_with(
    config: &Config,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<(String, KeySource)> {
    if let Some(key) = env_api_key_with(lookup) {
        return Some((key, KeySource::Env));
    }

    config
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| (key.to_string(), KeySource::Config))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBridge(bool);

    impl KeyBridge for FixedBridge {
        fn has_selected_key(&self) -> bool {
            self.0
        }

        fn open_key_selection(&mut self) {
            self.0 = true;
        }
    }

    #[test]
    fn test_bridge_answers_when_present() {
        let mut bridge = FixedBridge(false);
        assert!(!key_available(Some(&bridge)));

        bridge.open_key_selection();
        assert!(key_available(Some(&bridge)));
    }

    #[test]
    fn test_env_wins_over_config() {
        let config = Config {
            api_key: Some("from-config".to_string()),
            ..Config::new()
        };
        let resolved = resolve_api_key_with(&config, |name| {
            (name == "API_KEY").then(|| "from-env".to_string())
        });

        assert_eq!(resolved, Some(("from-env".to_string(), KeySource::Env)));
    }

    #[test]
    fn test_gemini_var_checked_before_generic_var() {
        let key = env_api_key_with(|name| match name {
            "GEMINI_API_KEY" => Some("gemini".to_string()),
            "API_KEY" => Some("generic".to_string()),
            _ => None,
        });
        assert_eq!(key.as_deref(), Some("gemini"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let config = Config {
            api_key: Some("   ".to_string()),
            ..Config::new()
        };
        assert_eq!(resolve_api_key_with(&config, |_| Some(String::new())), None);
    }
}
