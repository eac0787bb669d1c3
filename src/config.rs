//! Fleet manifest loading.
//!
//! The manifest is a TOML file declaring the provider folder, how to
//! authenticate, and one `[[vms]]` table per desired VM. VM tables are
//! kept as raw JSON maps; the reconcile engine validates them against
//! its field schema, so the manifest layer stays schema-agnostic.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FleetConfig {
    /// Provider folder holding the fleet
    pub folder_id: String,
    pub auth: AuthConfig,
    #[serde(default)]
    pub vms: Vec<toml::Table>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// IAM token, inline
    #[serde(default)]
    pub token: Option<String>,
    /// Path to a file containing the IAM token
    #[serde(default)]
    pub token_file: Option<String>,
}

impl FleetConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config: FleetConfig = toml::from_str(&content)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        if config.folder_id.is_empty() {
            bail!("folder_id must not be empty");
        }
        Ok(config)
    }

    /// Desired VM specs as JSON maps, in manifest order.
    pub fn vm_specs(&self) -> Vec<Map<String, Value>> {
        self.vms.iter().map(|table| table_to_map(table)).collect()
    }

    /// Resolve the IAM token: inline value wins, otherwise read the
    /// token file (with `~` expansion).
    pub fn resolve_token(&self) -> Result<String> {
        if let Some(token) = &self.auth.token {
            return Ok(token.trim().to_string());
        }
        let Some(token_file) = &self.auth.token_file else {
            bail!("auth requires either token or token_file");
        };
        let path = expand_path(token_file);
        let token = fs::read_to_string(&path)
            .with_context(|| format!("Could not read token file {}", path.display()))?;
        let token = token.trim();
        if token.is_empty() {
            bail!("token file {} is empty", path.display());
        }
        Ok(token.to_string())
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn table_to_map(table: &toml::Table) -> Map<String, Value> {
    table
        .iter()
        .map(|(key, value)| (key.clone(), toml_to_json(value)))
        .collect()
}

fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(table_to_map(table)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const MANIFEST: &str = r#"
folder_id = "b1gexample"

[auth]
token_file = "/tmp/nonexistent-token"

[[vms]]
name = "web-1"
zone = "ru-central1-a"

[vms.resources_spec]
cores = 2
memory = 4

[[vms]]
name = "web-2"
zone = "ru-central1-a"
"#;

    #[test]
    fn test_load_manifest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let config = FleetConfig::load(file.path()).unwrap();
        assert_eq!(config.folder_id, "b1gexample");

        let specs = config.vm_specs();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0]["name"], json!("web-1"));
        assert_eq!(specs[0]["resources_spec"]["cores"], json!(2));
        assert_eq!(specs[1]["name"], json!("web-2"));
    }

    #[test]
    fn test_inline_token_wins_over_file() {
        let config = FleetConfig {
            folder_id: "f".to_string(),
            auth: AuthConfig {
                token: Some("  t1.inline  ".to_string()),
                token_file: Some("/tmp/nonexistent-token".to_string()),
            },
            vms: vec![],
        };
        assert_eq!(config.resolve_token().unwrap(), "t1.inline");
    }

    #[test]
    fn test_token_file_is_read_and_trimmed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"t1.from-file\n").unwrap();

        let config = FleetConfig {
            folder_id: "f".to_string(),
            auth: AuthConfig {
                token: None,
                token_file: Some(file.path().to_string_lossy().into_owned()),
            },
            vms: vec![],
        };
        assert_eq!(config.resolve_token().unwrap(), "t1.from-file");
    }

    #[test]
    fn test_missing_auth_is_rejected() {
        let config = FleetConfig {
            folder_id: "f".to_string(),
            auth: AuthConfig::default(),
            vms: vec![],
        };
        assert!(config.resolve_token().is_err());
    }

    #[test]
    fn test_unknown_top_level_key_is_rejected() {
        let err = toml::from_str::<FleetConfig>(
            r#"
folder_id = "f"
cloud_id = "c"

[auth]
token = "t"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cloud_id"));
    }
}
