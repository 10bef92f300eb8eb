use std::collections::HashSet;
use std::path::{Path, PathBuf};

use cirrus_core::ResourceSpec;
use serde::{Deserialize, Serialize};

/// Current stack file version. Bump this when changing the file's shape;
/// files written for a newer version are rejected rather than misread.
const CURRENT_VERSION: u32 = 1;

const DEFAULT_REGION: &str = "us-east-1";

fn current_version() -> u32 {
    CURRENT_VERSION
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackConfig {
    /// Schema version. Missing means [`CURRENT_VERSION`].
    #[serde(default = "current_version")]
    pub config_version: u32,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub credentials: CredentialSource,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
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

/// Where the state document lives. The local copy is always written; the
/// S3 copy only when `bucket` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_local_path")]
    pub local_path: PathBuf,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default = "default_state_key")]
    pub key: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            local_path: default_local_path(),
            bucket: None,
            key: default_state_key(),
        }
    }
}

fn default_local_path() -> PathBuf {
    PathBuf::from(".cirrus/state.json")
}

fn default_state_key() -> String {
    "_state/cirrus.json".to_string()
}

/// One resource instance in the stack, in deploy order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "empty_inputs")]
    pub inputs: serde_json::Value,
}

fn empty_inputs() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

impl StackConfig {
    /// Explicit region, else `env_region`, else `us-east-1`.
    pub fn region_or(&self, env_region: Option<String>) -> String {
        self.region
            .clone()
            .or(env_region)
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string())
    }

    /// Resolve every entry's type name and parse its inputs, in stack order.
    pub fn specs(&self) -> eyre::Result<Vec<(String, ResourceSpec)>> {
        let mut seen = HashSet::new();
        self.resources
            .iter()
            .map(|entry| {
                if !seen.insert(entry.id.as_str()) {
                    return Err(eyre::eyre!("duplicate resource id '{}'", entry.id));
                }
                let spec = ResourceSpec::from_inputs(&entry.type_name, entry.inputs.clone())
                    .map_err(|e| eyre::eyre!("resource '{}': {e}", entry.id))?;
                Ok((entry.id.clone(), spec))
            })
            .collect()
    }
}

pub fn load_config(path: &Path) -> eyre::Result<StackConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("failed to read stack file at {}: {e}", path.display()))?;
    parse_config(&contents)
}

fn parse_config(contents: &str) -> eyre::Result<StackConfig> {
    // Check the version on raw JSON so a newer file fails with a clear
    // message instead of a field-level deserialize error.
    let json: serde_json::Value = serde_json::from_str(contents)?;
    let on_disk_version = match json.get("config_version") {
        None => CURRENT_VERSION,
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| eyre::eyre!("config_version {v} is not a valid version number"))?,
    };
    check_version(on_disk_version)?;

    let config: StackConfig = serde_json::from_value(json)?;
    Ok(config)
}

fn check_version(version: u32) -> eyre::Result<()> {
    if version > CURRENT_VERSION {
        return Err(eyre::eyre!(
            "config_version {version} is newer than this build supports ({CURRENT_VERSION}). \
             Please update cirrus."
        ));
    }
    Ok(())
}
