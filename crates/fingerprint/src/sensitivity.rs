//! Path sensitivity policies.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How much of a file's location counts toward its fingerprint identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathSensitivity {
    /// The full absolute path
    #[default]
    Absolute,
    /// The path below the declared root
    Relative,
    /// The base name only
    NameOnly,
    /// Content only; the path is ignored
    None,
}

impl PathSensitivity {
    /// Whether keys produced under this policy are absolute paths.
    #[must_use]
    pub fn is_path_absolute(self) -> bool {
        matches!(self, Self::Absolute)
    }
}

impl fmt::Display for PathSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Absolute => "absolute",
            Self::Relative => "relative",
            Self::NameOnly => "name-only",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

impl FromStr for PathSensitivity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "absolute" => Ok(Self::Absolute),
            "relative" => Ok(Self::Relative),
            "name-only" | "nameonly" => Ok(Self::NameOnly),
            "none" => Ok(Self::None),
            _ => Err(Error::InvalidSensitivity {
                value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_names() {
        assert_eq!("relative".parse::<PathSensitivity>().unwrap(), PathSensitivity::Relative);
        assert_eq!("NAME_ONLY".parse::<PathSensitivity>().unwrap(), PathSensitivity::NameOnly);
        assert_eq!(" none ".parse::<PathSensitivity>().unwrap(), PathSensitivity::None);
    }

    #[test]
    fn rejects_unknown_names() {
        let err = "sideways".parse::<PathSensitivity>().unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("sideways"));
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for s in [
            PathSensitivity::Absolute,
            PathSensitivity::Relative,
            PathSensitivity::NameOnly,
            PathSensitivity::None,
        ] {
            assert_eq!(s.to_string().parse::<PathSensitivity>().unwrap(), s);
        }
    }

    #[test]
    fn serde_uses_kebab_case() {
        let json = serde_json::to_string(&PathSensitivity::NameOnly).unwrap();
        assert_eq!(json, "\"name-only\"");
    }
}
