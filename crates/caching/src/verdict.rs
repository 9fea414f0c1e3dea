//! Caching verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Why output caching is disabled for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisabledReason {
    /// Output caching is switched off globally
    BuildCacheDisabled,
    /// No cache-enabling predicate was registered
    NotEnabledForTask,
    /// The unit declares no outputs
    NoOutputsDeclared,
    /// Another actor wrote into a declared output
    OverlappingOutputs,
    /// An output property declares several paths under one name
    NonCacheableOutputProperty,
    /// A cache-enabling predicate does not hold
    CacheIfNotSatisfied,
    /// A cache-disabling predicate holds
    DoNotCacheIfSatisfied,
}

impl DisabledReason {
    /// Stable identifier for reporting.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BuildCacheDisabled => "build-cache-disabled",
            Self::NotEnabledForTask => "not-enabled-for-task",
            Self::NoOutputsDeclared => "no-outputs-declared",
            Self::OverlappingOutputs => "overlapping-outputs",
            Self::NonCacheableOutputProperty => "non-cacheable-output-property",
            Self::CacheIfNotSatisfied => "cache-if-not-satisfied",
            Self::DoNotCacheIfSatisfied => "do-not-cache-if-satisfied",
        }
    }
}

impl fmt::Display for DisabledReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a unit's outputs may be stored in and restored from a cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CachingVerdict {
    /// Caching is allowed
    Enabled,
    /// Caching is not allowed
    Disabled {
        /// Reason category
        reason: DisabledReason,
        /// Human-readable explanation
        message: String,
    },
}

impl CachingVerdict {
    /// A disabled verdict.
    pub fn disabled(reason: DisabledReason, message: impl Into<String>) -> Self {
        Self::Disabled {
            reason,
            message: message.into(),
        }
    }

    /// Whether caching is allowed.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    /// The reason category of a disabled verdict.
    #[must_use]
    pub const fn reason(&self) -> Option<DisabledReason> {
        match self {
            Self::Enabled => None,
            Self::Disabled { reason, .. } => Some(*reason),
        }
    }

    /// The explanation of a disabled verdict.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Enabled => None,
            Self::Disabled { message, .. } => Some(message),
        }
    }
}

impl fmt::Display for CachingVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enabled => f.write_str("Caching enabled"),
            Self::Disabled { reason, message } => {
                write!(f, "Caching disabled ({reason}): {message}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_reason_and_message() {
        let verdict = CachingVerdict::disabled(DisabledReason::NoOutputsDeclared, "No outputs declared");
        assert_eq!(
            verdict.to_string(),
            "Caching disabled (no-outputs-declared): No outputs declared"
        );
        assert_eq!(verdict.reason(), Some(DisabledReason::NoOutputsDeclared));
        assert!(!verdict.is_enabled());
    }

    #[test]
    fn verdict_serializes_with_state_tag() {
        let json = serde_json::to_value(CachingVerdict::Enabled).unwrap();
        assert_eq!(json, serde_json::json!({"state": "enabled"}));
        let disabled = serde_json::to_value(CachingVerdict::disabled(
            DisabledReason::OverlappingOutputs,
            "x",
        ))
        .unwrap();
        assert_eq!(disabled["reason"], "overlapping-outputs");
    }
}
