use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Desired configuration of a serverless function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionSpec {
    /// Identity. Absent means "this function should not exist".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub handler: String,
    pub runtime: String,
    /// Execution role ARN.
    pub role: String,
    #[serde(default, alias = "memorySize", skip_serializing_if = "Option::is_none")]
    pub memory: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    pub code: CodeSource,
    /// `rate(...)` or `cron(...)` expression. When set, the function owns a
    /// scheduling rule that invokes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,
}

/// Where a function's code comes from.
///
/// Either a directory, or an ordered list whose first element is the
/// directory and whose remaining elements are extra files to place at the
/// archive root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CodeSource {
    Directory(PathBuf),
    Bundle(Vec<PathBuf>),
}

impl CodeSource {
    pub fn directory(&self) -> Option<&Path> {
        match self {
            Self::Directory(dir) => Some(dir),
            Self::Bundle(paths) => paths.first().map(PathBuf::as_path),
        }
    }

    pub fn extra_files(&self) -> &[PathBuf] {
        match self {
            Self::Directory(_) => &[],
            Self::Bundle(paths) => paths.get(1..).unwrap_or(&[]),
        }
    }
}
