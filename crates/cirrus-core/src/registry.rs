//! Type resolver: symbolic resource-type names → resource kinds.
//!
//! Only the orchestrator consults this. Drivers never resolve types.

use std::fmt;

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    EcsService,
    EcsTaskDefinition,
    Function,
}

impl ResourceKind {
    /// Canonical type name, used as the `resource_type` of state addresses.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::EcsService => "AwsEcsService",
            Self::EcsTaskDefinition => "AwsEcsTaskDefinition",
            Self::Function => "AwsFargateFunction",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

const NATIVE_TYPES: &[(&str, ResourceKind)] = &[
    ("AwsEcsService", ResourceKind::EcsService),
    ("AwsEcsTaskDefinition", ResourceKind::EcsTaskDefinition),
    ("AwsFargateFunction", ResourceKind::Function),
    ("AwsLambdaFunction", ResourceKind::Function),
];

/// Resolve a type name to its resource kind.
pub fn resolve(type_name: &str) -> Result<ResourceKind, CoreError> {
    NATIVE_TYPES
        .iter()
        .find(|(name, _)| *name == type_name)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| CoreError::UnknownTypeName(type_name.to_string()))
}

/// Every type name `resolve` accepts, aliases included.
pub fn known_type_names() -> impl Iterator<Item = &'static str> {
    NATIVE_TYPES.iter().map(|(name, _)| *name)
}
