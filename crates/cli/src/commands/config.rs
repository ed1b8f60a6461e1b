use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use groupware_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

struct Entry {
    key: &'static str,
    env_key: &'static str,
    value: String,
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries = [
        Entry {
            key: "database.url",
            env_key: "GROUPWARE_DATABASE_URL",
            value: config.database.url.clone(),
        },
        Entry {
            key: "database.max_connections",
            env_key: "GROUPWARE_DATABASE_MAX_CONNECTIONS",
            value: config.database.max_connections.to_string(),
        },
        Entry {
            key: "database.timeout_secs",
            env_key: "GROUPWARE_DATABASE_TIMEOUT_SECS",
            value: config.database.timeout_secs.to_string(),
        },
        Entry {
            key: "server.bind_address",
            env_key: "GROUPWARE_SERVER_BIND_ADDRESS",
            value: config.server.bind_address.clone(),
        },
        Entry {
            key: "server.port",
            env_key: "GROUPWARE_SERVER_PORT",
            value: config.server.port.to_string(),
        },
        Entry {
            key: "server.graceful_shutdown_secs",
            env_key: "GROUPWARE_SERVER_GRACEFUL_SHUTDOWN_SECS",
            value: config.server.graceful_shutdown_secs.to_string(),
        },
        Entry {
            key: "auth.jwt_secret",
            env_key: "GROUPWARE_AUTH_JWT_SECRET",
            value: redact_secret(config.auth.jwt_secret.expose_secret()),
        },
        Entry {
            key: "auth.token_ttl_minutes",
            env_key: "GROUPWARE_AUTH_TOKEN_TTL_MINUTES",
            value: config.auth.token_ttl_minutes.to_string(),
        },
        Entry {
            key: "storage.upload_dir",
            env_key: "GROUPWARE_STORAGE_UPLOAD_DIR",
            value: config.storage.upload_dir.display().to_string(),
        },
        Entry {
            key: "storage.template_dir",
            env_key: "GROUPWARE_STORAGE_TEMPLATE_DIR",
            value: config
                .storage
                .template_dir
                .as_ref()
                .map(|dir| dir.display().to_string())
                .unwrap_or_else(|| "<embedded>".to_string()),
        },
        Entry {
            key: "logging.level",
            env_key: "GROUPWARE_LOGGING_LEVEL",
            value: config.logging.level.clone(),
        },
        Entry {
            key: "logging.format",
            env_key: "GROUPWARE_LOGGING_FORMAT",
            value: format!("{:?}", config.logging.format),
        },
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries {
        let source = field_source(
            entry.key,
            entry.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }
    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["groupware.toml", "config/groupware.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Shows the length only, never any characters of the secret.
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }
    format!("<redacted, {} chars>", trimmed.chars().count())
}

#[cfg(test)]
mod tests {
    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_never_leak_characters() {
        assert_eq!(redact_secret("  "), "<empty>");
        let shown = redact_secret("super-secret-signing-key");
        assert!(!shown.contains("super"));
        assert!(shown.contains("24 chars"));
    }

    #[test]
    fn nested_keys_are_found_in_toml() {
        let doc: toml::Value = "[storage]\nupload_dir = \"uploads\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "storage.upload_dir"));
        assert!(!contains_path(&doc, "storage.template_dir"));
    }
}
