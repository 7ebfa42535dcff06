use crate::core::layer::{ConfigLayer, Patch};
use crate::utils::{Logger, Result, StrataError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Environment-variable file loader. The values it collects are injected at
/// merge time as a named overlay layer; substituting them into application
/// code is the transform pipeline's job, not ours.
pub struct EnvVars {
    variables: BTreeMap<String, String>,
}

impl EnvVars {
    pub fn new() -> Self {
        Self {
            variables: BTreeMap::new(),
        }
    }

    /// Load environment variables for a mode from the conventional .env
    /// file set under `root`.
    pub fn load_for(root: &Path, mode: &str) -> Result<Self> {
        let mut vars = Self::new();

        // Priority order (lowest to highest):
        // .env < .env.local < .env.{mode} < .env.{mode}.local
        let env_files = vec![
            root.join(".env"),
            root.join(".env.local"),
            root.join(format!(".env.{}", mode)),
            root.join(format!(".env.{}.local", mode)),
        ];

        for env_file in env_files {
            if env_file.exists() {
                vars.load_env_file(&env_file)?;
            }
        }

        vars.variables
            .insert("NODE_ENV".to_string(), mode.to_string());
        vars.variables.insert("MODE".to_string(), mode.to_string());
        vars.variables.insert(
            "DEV".to_string(),
            if mode == "development" { "true" } else { "false" }.to_string(),
        );
        vars.variables.insert(
            "PROD".to_string(),
            if mode == "production" { "true" } else { "false" }.to_string(),
        );

        Ok(vars)
    }

    fn load_env_file(&mut self, path: &PathBuf) -> Result<()> {
        let content = std::fs::read_to_string(path).map_err(StrataError::Io)?;
        let mut loaded = 0usize;

        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = parse_env_line(line) {
                self.variables.insert(key, value);
                loaded += 1;
            } else {
                Logger::warn(&format!(
                    "Invalid env line in {} at line {}: {}",
                    path.display(),
                    line_num + 1,
                    line
                ));
            }
        }

        Logger::env_file_loaded(&path.display().to_string(), loaded);
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.variables.get(key)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Convert into a configuration layer contributing `env.*` entries.
    pub fn into_layer(self, mode: &str) -> ConfigLayer {
        let entries = self
            .variables
            .into_iter()
            .map(|(key, value)| (key, Patch::Value(serde_json::Value::String(value))))
            .collect();

        ConfigLayer::new(format!("env:{}", mode)).with_patch("env", Patch::Merge(entries))
    }
}

impl Default for EnvVars {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a single KEY=VALUE line. Keys must start with a letter or
/// underscore; surrounding single or double quotes are stripped.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let eq_pos = line.find('=')?;

    let key = line[..eq_pos].trim();
    let value = line[eq_pos + 1..].trim();

    if !key.chars().next()?.is_alphabetic() && key.chars().next()? != '_' {
        return None;
    }

    if !key.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return None;
    }

    let value = if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
        || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
    {
        &value[1..value.len() - 1]
    } else {
        value
    };

    Some((key.to_string(), value.to_string()))
}
