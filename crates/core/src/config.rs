use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_CODE_LENGTH: usize = 4;
pub const MAX_CODE_LENGTH: usize = 10;
const MAX_EXPIRY_SECS: u64 = 86_400;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub verification: VerificationConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationConfig {
    pub code_length: usize,
    pub expiry_secs: u64,
    pub max_attempts: u32,
    pub cleanup_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub code_length: Option<usize>,
    pub expiry_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub cleanup_interval_secs: Option<u64>,
    pub health_check_port: Option<u16>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            verification: VerificationConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                health_check_port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self { code_length: 6, expiry_secs: 600, max_attempts: 3, cleanup_interval_secs: 60 }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("staffbridge.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(verification) = patch.verification {
            if let Some(code_length) = verification.code_length {
                self.verification.code_length = code_length;
            }
            if let Some(expiry_secs) = verification.expiry_secs {
                self.verification.expiry_secs = expiry_secs;
            }
            if let Some(max_attempts) = verification.max_attempts {
                self.verification.max_attempts = max_attempts;
            }
            if let Some(cleanup_interval_secs) = verification.cleanup_interval_secs {
                self.verification.cleanup_interval_secs = cleanup_interval_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("STAFFBRIDGE_VERIFICATION_CODE_LENGTH") {
            self.verification.code_length =
                parse_usize("STAFFBRIDGE_VERIFICATION_CODE_LENGTH", &value)?;
        }
        if let Some(value) = read_env("STAFFBRIDGE_VERIFICATION_EXPIRY_SECS") {
            self.verification.expiry_secs =
                parse_u64("STAFFBRIDGE_VERIFICATION_EXPIRY_SECS", &value)?;
        }
        if let Some(value) = read_env("STAFFBRIDGE_VERIFICATION_MAX_ATTEMPTS") {
            self.verification.max_attempts =
                parse_u32("STAFFBRIDGE_VERIFICATION_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = read_env("STAFFBRIDGE_VERIFICATION_CLEANUP_INTERVAL_SECS") {
            self.verification.cleanup_interval_secs =
                parse_u64("STAFFBRIDGE_VERIFICATION_CLEANUP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("STAFFBRIDGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("STAFFBRIDGE_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port =
                parse_u16("STAFFBRIDGE_SERVER_HEALTH_CHECK_PORT", &value)?;
        }
        if let Some(value) = read_env("STAFFBRIDGE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("STAFFBRIDGE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("STAFFBRIDGE_LOGGING_LEVEL").or_else(|| read_env("STAFFBRIDGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("STAFFBRIDGE_LOGGING_FORMAT").or_else(|| read_env("STAFFBRIDGE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(code_length) = overrides.code_length {
            self.verification.code_length = code_length;
        }
        if let Some(expiry_secs) = overrides.expiry_secs {
            self.verification.expiry_secs = expiry_secs;
        }
        if let Some(max_attempts) = overrides.max_attempts {
            self.verification.max_attempts = max_attempts;
        }
        if let Some(cleanup_interval_secs) = overrides.cleanup_interval_secs {
            self.verification.cleanup_interval_secs = cleanup_interval_secs;
        }
        if let Some(health_check_port) = overrides.health_check_port {
            self.server.health_check_port = health_check_port;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_verification(&self.verification)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("staffbridge.toml"), PathBuf::from("config/staffbridge.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_verification(verification: &VerificationConfig) -> Result<(), ConfigError> {
    if !(MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&verification.code_length) {
        return Err(ConfigError::Validation(format!(
            "verification.code_length must be in range {MIN_CODE_LENGTH}..={MAX_CODE_LENGTH}"
        )));
    }

    if verification.expiry_secs == 0 || verification.expiry_secs > MAX_EXPIRY_SECS {
        return Err(ConfigError::Validation(format!(
            "verification.expiry_secs must be in range 1..={MAX_EXPIRY_SECS}"
        )));
    }

    if verification.max_attempts == 0 {
        return Err(ConfigError::Validation(
            "verification.max_attempts must be greater than zero".to_string(),
        ));
    }

    if verification.cleanup_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "verification.cleanup_interval_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    verification: Option<VerificationPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct VerificationPatch {
    code_length: Option<usize>,
    expiry_secs: Option<u64>,
    max_attempts: Option<u32>,
    cleanup_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_match_documented_verification_policy() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.verification.code_length == 6, "default code length should be 6")?;
        ensure(config.verification.expiry_secs == 600, "default expiry should be ten minutes")?;
        ensure(config.verification.max_attempts == 3, "default attempt limit should be 3")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_VERIFICATION_EXPIRY", "120");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("staffbridge.toml");
            fs::write(
                &path,
                r#"
[verification]
expiry_secs = ${TEST_VERIFICATION_EXPIRY}
code_length = 8
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.verification.expiry_secs == 120,
                "expiry should be interpolated from environment",
            )?;
            ensure(config.verification.code_length == 8, "code length should come from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_VERIFICATION_EXPIRY"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("staffbridge.toml");
        fs::write(&path, "[verification]\nexpiry_secs = ${STAFFBRIDGE_TEST_UNSET_VAR}\n")
            .map_err(|err| err.to_string())?;

        let result = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(
                result,
                Err(ConfigError::MissingEnvInterpolation { ref var })
                    if var == "STAFFBRIDGE_TEST_UNSET_VAR"
            ),
            "missing interpolation variable should be named in the error",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("STAFFBRIDGE_LOG_LEVEL", "warn");
        env::set_var("STAFFBRIDGE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["STAFFBRIDGE_LOG_LEVEL", "STAFFBRIDGE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("STAFFBRIDGE_VERIFICATION_MAX_ATTEMPTS", "5");
        env::set_var("STAFFBRIDGE_VERIFICATION_EXPIRY_SECS", "300");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("staffbridge.toml");
            fs::write(
                &path,
                r#"
[verification]
max_attempts = 4
expiry_secs = 900
cleanup_interval_secs = 30

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    expiry_secs: Some(60),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.verification.expiry_secs == 60, "override expiry should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.verification.max_attempts == 5,
                "env attempt limit should win over file and defaults",
            )?;
            ensure(
                config.verification.cleanup_interval_secs == 30,
                "file cleanup interval should win over defaults",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "STAFFBRIDGE_VERIFICATION_MAX_ATTEMPTS",
            "STAFFBRIDGE_VERIFICATION_EXPIRY_SECS",
        ]);
        result
    }

    #[test]
    fn invalid_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("STAFFBRIDGE_VERIFICATION_MAX_ATTEMPTS", "three");

        let result = AppConfig::load(LoadOptions::default());
        clear_vars(&["STAFFBRIDGE_VERIFICATION_MAX_ATTEMPTS"]);

        ensure(
            matches!(
                result,
                Err(ConfigError::InvalidEnvOverride { ref key, .. })
                    if key == "STAFFBRIDGE_VERIFICATION_MAX_ATTEMPTS"
            ),
            "non-numeric attempt limit should be rejected",
        )
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let cases = [
            (ConfigOverrides { code_length: Some(3), ..ConfigOverrides::default() }, "code_length"),
            (ConfigOverrides { code_length: Some(11), ..ConfigOverrides::default() }, "code_length"),
            (ConfigOverrides { expiry_secs: Some(0), ..ConfigOverrides::default() }, "expiry_secs"),
            (ConfigOverrides { max_attempts: Some(0), ..ConfigOverrides::default() }, "max_attempts"),
            (
                ConfigOverrides { cleanup_interval_secs: Some(0), ..ConfigOverrides::default() },
                "cleanup_interval_secs",
            ),
            (
                ConfigOverrides { log_level: Some("loud".to_string()), ..ConfigOverrides::default() },
                "logging.level",
            ),
        ];

        for (overrides, field) in cases {
            let error = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
                Ok(_) => return Err(format!("expected validation failure for {field}")),
                Err(error) => error,
            };
            let has_message =
                matches!(error, ConfigError::Validation(ref message) if message.contains(field));
            if !has_message {
                return Err(format!("validation failure should mention {field}, got {error}"));
            }
        }
        Ok(())
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let result = AppConfig::load(LoadOptions {
            config_path: Some(PathBuf::from("does/not/exist/staffbridge.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "missing required file should be reported",
        )
    }
}
