use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use trailstack_provisioner::manifest::{DEFAULT_LOG_RETENTION_DAYS, DEFAULT_STACK_NAME};
use trailstack_provisioner::{FoundationSettings, PollPolicy, ProvisionerError};

/// Current config version. Bump this when adding fields or changing shape.
/// Each bump requires a corresponding entry in [`migrate`].
const CURRENT_VERSION: u32 = 1;

/// CloudFormation stack names: a letter, then letters, digits, and hyphens.
const MAX_STACK_NAME_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailstackConfig {
    /// Schema version. Missing or 0 = pre-versioned config.
    #[serde(default)]
    pub config_version: u32,
    #[serde(default)]
    pub region: String,
    #[serde(default = "default_stack_name")]
    pub stack_name: String,
    #[serde(default)]
    pub environment: String,
    /// 12-digit AWS account id. When unset it is taken from STS, and
    /// credentials are not checked against a pinned account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default = "default_log_retention_days")]
    pub log_retention_days: u32,
    /// Where stack outputs are published. Defaults to
    /// `/<environment>/<stack_name>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_prefix: Option<String>,
    #[serde(default)]
    pub credentials: CredentialSource,
    #[serde(default)]
    pub poll: PollPolicy,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CredentialSource {
    Inline {
        access_key_id: String,
        secret_access_key: String,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        session_token: Option<String>,
    },
    Profile {
        profile_name: String,
    },
    #[default]
    DefaultChain,
}

/// Redacted view for `config show`.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigInfo {
    pub region: String,
    pub stack_name: String,
    pub environment: String,
    pub account_id: Option<String>,
    pub log_retention_days: u32,
    pub parameter_prefix: String,
    pub credential_type: String,
    pub profile_name: Option<String>,
    pub access_key_hint: Option<String>,
    pub poll: PollPolicy,
}

fn default_stack_name() -> String {
    DEFAULT_STACK_NAME.to_string()
}

fn default_log_retention_days() -> u32 {
    DEFAULT_LOG_RETENTION_DAYS
}

impl Default for TrailstackConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_VERSION,
            region: String::new(),
            stack_name: default_stack_name(),
            environment: String::new(),
            account_id: None,
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            parameter_prefix: None,
            credentials: CredentialSource::default(),
            poll: PollPolicy::default(),
        }
    }
}

impl TrailstackConfig {
    /// Layer environment overrides on top of the file. `lookup` is
    /// `std::env::var` in the binary.
    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(region) = non_empty("AWS_REGION") {
            self.region = region;
        }
        if let Some(profile_name) = non_empty("AWS_PROFILE") {
            self.credentials = CredentialSource::Profile { profile_name };
        }
        if let Some(stack_name) = non_empty("TRAILSTACK_STACK_NAME") {
            self.stack_name = stack_name;
        }
        if let Some(environment) = non_empty("TRAILSTACK_ENVIRONMENT") {
            self.environment = environment;
        }
        if let Some(prefix) = non_empty("TRAILSTACK_PARAMETER_PREFIX") {
            self.parameter_prefix = Some(prefix);
        }
        self
    }

    /// Every missing or malformed input, reported at once.
    pub fn validate(&self) -> Result<(), ProvisionerError> {
        let mut problems = Vec::new();

        if self.region.trim().is_empty() {
            problems.push("region is not set (config `region` or AWS_REGION)".to_string());
        }
        if self.environment.trim().is_empty() {
            problems.push(
                "environment is not set (config `environment` or TRAILSTACK_ENVIRONMENT)"
                    .to_string(),
            );
        }
        if !is_valid_stack_name(&self.stack_name) {
            problems.push(format!(
                "stack name {:?} must start with a letter and contain only letters, digits, and hyphens",
                self.stack_name
            ));
        }
        if let Some(account) = &self.account_id
            && (account.len() != 12 || !account.chars().all(|c| c.is_ascii_digit()))
        {
            problems.push(format!("account_id {account:?} is not a 12-digit AWS account id"));
        }
        if self.log_retention_days == 0 {
            problems.push("log_retention_days must be greater than zero".to_string());
        }
        match &self.credentials {
            CredentialSource::Inline {
                access_key_id,
                secret_access_key,
                ..
            } if access_key_id.is_empty() || secret_access_key.is_empty() => {
                problems.push("inline credentials need both access key id and secret".to_string());
            }
            CredentialSource::Profile { profile_name } if profile_name.trim().is_empty() => {
                problems.push("profile credentials need a profile name".to_string());
            }
            _ => {}
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ProvisionerError::Configuration(problems.join("; ")))
        }
    }

    pub fn effective_parameter_prefix(&self) -> String {
        match &self.parameter_prefix {
            Some(prefix) => trailstack_core::param_keys::normalize_prefix(prefix),
            None => trailstack_core::param_keys::default_prefix(&self.environment, &self.stack_name),
        }
    }

    pub fn foundation_settings(&self, account_id: &str) -> FoundationSettings {
        FoundationSettings {
            stack_name: self.stack_name.clone(),
            environment: self.environment.clone(),
            account_id: account_id.to_string(),
            log_retention_days: self.log_retention_days,
        }
    }

    pub fn info(&self) -> ConfigInfo {
        let (credential_type, profile_name, access_key_hint) = match &self.credentials {
            CredentialSource::Inline {
                access_key_id,
                session_token,
                ..
            } => {
                let cred_type = if session_token.is_some() {
                    "temporary"
                } else {
                    "inline"
                };
                (
                    cred_type.to_string(),
                    None,
                    Some(redact_access_key(access_key_id)),
                )
            }
            CredentialSource::Profile { profile_name } => {
                ("profile".to_string(), Some(profile_name.clone()), None)
            }
            CredentialSource::DefaultChain => ("default_chain".to_string(), None, None),
        };

        ConfigInfo {
            region: self.region.clone(),
            stack_name: self.stack_name.clone(),
            environment: self.environment.clone(),
            account_id: self.account_id.clone(),
            log_retention_days: self.log_retention_days,
            parameter_prefix: self.effective_parameter_prefix(),
            credential_type,
            profile_name,
            access_key_hint,
            poll: self.poll.clone(),
        }
    }
}

fn is_valid_stack_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
        && name.len() <= MAX_STACK_NAME_LEN
}

pub fn default_config_path() -> eyre::Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| eyre::eyre!("no config directory found"))?;
    Ok(base.join("trailstack").join("config.json"))
}

/// Load the config at `path`. A missing file yields defaults, so a
/// fully environment-driven run works without one.
pub fn load_config(path: &Path) -> eyre::Result<TrailstackConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(TrailstackConfig::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read config at {}: {e}", path.display()))?;

    // Parse as raw JSON so we can run migrations before deserializing.
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let on_disk_version = json
        .get("config_version")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    let migrated = migrate(json, on_disk_version)?;
    let config: TrailstackConfig = serde_json::from_value(migrated)?;
    Ok(config)
}

/// Run sequential migrations from `from_version` up to [`CURRENT_VERSION`].
fn migrate(mut json: serde_json::Value, from_version: u32) -> eyre::Result<serde_json::Value> {
    if from_version > CURRENT_VERSION {
        return Err(eyre::eyre!(
            "config_version {from_version} is newer than this build supports ({CURRENT_VERSION}). \
             Please update trailstack."
        ));
    }

    // v0 → v1: `ssm_prefix` renamed to `parameter_prefix`
    if from_version < 1 {
        let obj = json
            .as_object_mut()
            .ok_or_else(|| eyre::eyre!("config is not a JSON object"))?;
        if let Some(prefix) = obj.remove("ssm_prefix") {
            obj.entry("parameter_prefix").or_insert(prefix);
        }
        obj.insert(
            "config_version".to_string(),
            serde_json::Value::Number(1.into()),
        );
        tracing::info!("migrated config v0 → v1 (ssm_prefix → parameter_prefix)");
    }

    Ok(json)
}

pub fn save_config(path: &Path, config: &TrailstackConfig) -> eyre::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| eyre::eyre!("config path {} has no parent", path.display()))?;
    std::fs::create_dir_all(dir)?;

    // Always write the current version, regardless of what was loaded.
    let mut stamped = config.clone();
    stamped.config_version = CURRENT_VERSION;
    let json = serde_json::to_string_pretty(&stamped)?;

    let tmp_path = path.with_extension("json.tmp");
    std::fs::write(&tmp_path, json.as_bytes())?;

    // May hold inline credentials.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))?;
    }

    std::fs::rename(&tmp_path, path)?;

    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}

fn redact_access_key(key: &str) -> String {
    if key.len() <= 8 {
        return "****".to_string();
    }
    let prefix = &key[..4];
    let suffix = &key[key.len() - 4..];
    format!("{prefix}...{suffix}")
}
