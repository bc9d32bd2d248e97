use std::fmt::Display;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which agent runtime backs live sessions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuntimeKind {
    /// The Gemini Live API, with tools served by the toolbox.
    Gemini,
    /// Mirrors every request back; no model involved.
    Echo,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub app_name: String,
    pub runtime: RuntimeKind,
    pub gemini_api_key: Option<String>,
    pub live_model: String,
    pub toolbox_url: String,
    pub toolset: String,
    pub log_level: Level,
    pub prompts_path: PathBuf,
}

impl Config {
    /// Loads configuration from environment variables, applying defaults for
    /// everything except the Gemini API key.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Tests set the environment explicitly; a developer's .env must not leak in.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let runtime = match var_or("AGENT_RUNTIME", "gemini").to_lowercase().as_str() {
            "gemini" => RuntimeKind::Gemini,
            "echo" => RuntimeKind::Echo,
            other => {
                return Err(ConfigError::InvalidValue(
                    "AGENT_RUNTIME".to_string(),
                    format!("'{other}' is not one of 'gemini', 'echo'"),
                ));
            }
        };

        let gemini_api_key = std::env::var("GEMINI_API_KEY").ok();
        if runtime == RuntimeKind::Gemini && gemini_api_key.is_none() {
            return Err(ConfigError::MissingVar(
                "GEMINI_API_KEY must be set for the 'gemini' runtime".to_string(),
            ));
        }

        Ok(Self {
            bind_address: parse_var("BIND_ADDRESS", "0.0.0.0:8000")?,
            app_name: var_or("APP_NAME", "frontdesk-agent"),
            runtime,
            gemini_api_key,
            live_model: var_or("LIVE_MODEL", "gemini-2.0-flash-live-001"),
            toolbox_url: var_or("TOOLBOX_URL", "http://localhost:5000"),
            toolset: var_or("TOOLSET", "frontdesk"),
            log_level: parse_var("RUST_LOG", "INFO")?,
            prompts_path: PathBuf::from(var_or("PROMPTS_PATH", "./prompts")),
        })
    }
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T>(name: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = var_or(name, default);
    raw.parse::<T>().map_err(|e| {
        ConfigError::InvalidValue(name.to_string(), format!("'{raw}' could not be parsed: {e}"))
    })
}

/// Reads `system.md` from the prompts directory.
///
/// A missing file is not an error: the agent then runs without a system instruction.
pub fn load_system_instruction(prompts_path: &Path) -> std::io::Result<String> {
    match std::fs::read_to_string(prompts_path.join("system.md")) {
        Ok(text) => Ok(text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use tracing::Level;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("BIND_ADDRESS");
            env::remove_var("APP_NAME");
            env::remove_var("AGENT_RUNTIME");
            env::remove_var("GEMINI_API_KEY");
            env::remove_var("LIVE_MODEL");
            env::remove_var("TOOLBOX_URL");
            env::remove_var("TOOLSET");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPTS_PATH");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing_var = ConfigError::MissingVar("TEST_VAR".to_string());
        assert_eq!(
            format!("{}", missing_var),
            "Missing environment variable: TEST_VAR"
        );

        let invalid_value =
            ConfigError::InvalidValue("TEST_VAR".to_string(), "bad_value".to_string());
        assert_eq!(
            format!("{}", invalid_value),
            "Invalid value for environment variable TEST_VAR: bad_value"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal_gemini() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "0.0.0.0:8000");
        assert_eq!(config.app_name, "frontdesk-agent");
        assert_eq!(config.runtime, RuntimeKind::Gemini);
        assert_eq!(config.gemini_api_key, Some("test-gemini-key".to_string()));
        assert_eq!(config.live_model, "gemini-2.0-flash-live-001");
        assert_eq!(config.toolbox_url, "http://localhost:5000");
        assert_eq!(config.toolset, "frontdesk");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.prompts_path, PathBuf::from("./prompts"));
    }

    #[test]
    #[serial]
    fn test_config_echo_runtime_needs_no_key() {
        clear_env_vars();
        unsafe {
            env::set_var("AGENT_RUNTIME", "Echo");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.runtime, RuntimeKind::Echo);
        assert_eq!(config.gemini_api_key, None);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "127.0.0.1:8080");
            env::set_var("APP_NAME", "lobby");
            env::set_var("AGENT_RUNTIME", "gemini");
            env::set_var("GEMINI_API_KEY", "custom-gemini-key");
            env::set_var("LIVE_MODEL", "gemini-live-2.5-flash");
            env::set_var("TOOLBOX_URL", "http://toolbox:5000");
            env::set_var("TOOLSET", "lobby");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPTS_PATH", "/custom/prompts");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:8080");
        assert_eq!(config.app_name, "lobby");
        assert_eq!(config.gemini_api_key, Some("custom-gemini-key".to_string()));
        assert_eq!(config.live_model, "gemini-live-2.5-flash");
        assert_eq!(config.toolbox_url, "http://toolbox:5000");
        assert_eq!(config.toolset, "lobby");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.prompts_path, PathBuf::from("/custom/prompts"));
    }

    #[test]
    #[serial]
    fn test_config_invalid_bind_address() {
        clear_env_vars();
        unsafe {
            env::set_var("BIND_ADDRESS", "not-a-valid-address");
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "BIND_ADDRESS"),
            _ => panic!("Expected InvalidValue for BIND_ADDRESS"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_runtime() {
        clear_env_vars();
        unsafe {
            env::set_var("AGENT_RUNTIME", "openai");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, msg) => {
                assert_eq!(var, "AGENT_RUNTIME");
                assert!(msg.contains("openai"));
            }
            _ => panic!("Expected InvalidValue for AGENT_RUNTIME"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("GEMINI_API_KEY", "test-gemini-key");
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_missing_gemini_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(msg) => {
                assert!(msg.contains("GEMINI_API_KEY"));
            }
            _ => panic!("Expected MissingVar for GEMINI_API_KEY"),
        }
    }

    #[test]
    fn test_load_system_instruction() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_system_instruction(dir.path()).unwrap(), "");

        std::fs::write(dir.path().join("system.md"), "Greet every visitor.").unwrap();
        assert_eq!(
            load_system_instruction(dir.path()).unwrap(),
            "Greet every visitor."
        );
    }
}
