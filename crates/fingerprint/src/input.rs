//! Declared input properties of a unit of work.

use crate::PathSensitivity;
use serde_json::Value;
use std::path::PathBuf;

/// One declared input. The variant fixes how the property is fingerprinted.
#[derive(Debug, Clone, PartialEq)]
pub enum InputProperty {
    /// A scalar or structured value
    Scalar {
        /// Property name
        name: String,
        /// Current value
        value: Value,
    },
    /// A single file
    File {
        /// Property name
        name: String,
        /// Declared path
        path: PathBuf,
        /// Path policy; falls back to the fingerprinter default
        sensitivity: Option<PathSensitivity>,
    },
    /// A single directory tree
    Directory {
        /// Property name
        name: String,
        /// Declared root
        path: PathBuf,
        /// Path policy; falls back to the fingerprinter default
        sensitivity: Option<PathSensitivity>,
    },
    /// Several files
    FileSet {
        /// Property name
        name: String,
        /// Declared paths
        paths: Vec<PathBuf>,
        /// Path policy; falls back to the fingerprinter default
        sensitivity: Option<PathSensitivity>,
    },
    /// Several directory trees
    DirectorySet {
        /// Property name
        name: String,
        /// Declared roots
        paths: Vec<PathBuf>,
        /// Path policy; falls back to the fingerprinter default
        sensitivity: Option<PathSensitivity>,
    },
}

impl InputProperty {
    /// A scalar input.
    pub fn scalar(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Scalar {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A single-file input.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::File {
            name: name.into(),
            path: path.into(),
            sensitivity: None,
        }
    }

    /// A single-directory input.
    pub fn directory(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::Directory {
            name: name.into(),
            path: path.into(),
            sensitivity: None,
        }
    }

    /// A multi-file input.
    pub fn files<P: Into<PathBuf>>(name: impl Into<String>, paths: impl IntoIterator<Item = P>) -> Self {
        Self::FileSet {
            name: name.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            sensitivity: None,
        }
    }

    /// A multi-directory input.
    pub fn directories<P: Into<PathBuf>>(
        name: impl Into<String>,
        paths: impl IntoIterator<Item = P>,
    ) -> Self {
        Self::DirectorySet {
            name: name.into(),
            paths: paths.into_iter().map(Into::into).collect(),
            sensitivity: None,
        }
    }

    /// Set the path policy of a file-valued input. Scalars are unchanged.
    #[must_use]
    pub fn with_sensitivity(mut self, policy: PathSensitivity) -> Self {
        match &mut self {
            Self::Scalar { .. } => {}
            Self::File { sensitivity, .. }
            | Self::Directory { sensitivity, .. }
            | Self::FileSet { sensitivity, .. }
            | Self::DirectorySet { sensitivity, .. } => *sensitivity = Some(policy),
        }
        self
    }

    /// The property name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar { name, .. }
            | Self::File { name, .. }
            | Self::Directory { name, .. }
            | Self::FileSet { name, .. }
            | Self::DirectorySet { name, .. } => name,
        }
    }

    /// The declared policy, `None` for scalars or when left to the default.
    #[must_use]
    pub fn sensitivity(&self) -> Option<PathSensitivity> {
        match self {
            Self::Scalar { .. } => None,
            Self::File { sensitivity, .. }
            | Self::Directory { sensitivity, .. }
            | Self::FileSet { sensitivity, .. }
            | Self::DirectorySet { sensitivity, .. } => *sensitivity,
        }
    }

    /// Declared roots to walk; empty for scalars.
    #[must_use]
    pub fn roots(&self) -> Vec<PathBuf> {
        match self {
            Self::Scalar { .. } => Vec::new(),
            Self::File { path, .. } | Self::Directory { path, .. } => vec![path.clone()],
            Self::FileSet { paths, .. } | Self::DirectorySet { paths, .. } => paths.clone(),
        }
    }

    /// Whether the property is fingerprinted from the file system.
    #[must_use]
    pub fn is_file_valued(&self) -> bool {
        !matches!(self, Self::Scalar { .. })
    }
}

/// Anything that can enumerate a unit's declared inputs.
pub trait InputSource {
    /// Call `visitor` once per declared input.
    fn visit_inputs(&self, visitor: &mut dyn FnMut(&InputProperty));
}

impl InputSource for [InputProperty] {
    fn visit_inputs(&self, visitor: &mut dyn FnMut(&InputProperty)) {
        for property in self {
            visitor(property);
        }
    }
}

impl InputSource for Vec<InputProperty> {
    fn visit_inputs(&self, visitor: &mut dyn FnMut(&InputProperty)) {
        self.as_slice().visit_inputs(visitor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_set_names_and_roots() {
        let property = InputProperty::files("sources", ["a.txt", "b.txt"])
            .with_sensitivity(PathSensitivity::NameOnly);
        assert_eq!(property.name(), "sources");
        assert_eq!(property.roots().len(), 2);
        assert_eq!(property.sensitivity(), Some(PathSensitivity::NameOnly));
        assert!(property.is_file_valued());
    }

    #[test]
    fn scalars_ignore_sensitivity() {
        let property = InputProperty::scalar("level", 3).with_sensitivity(PathSensitivity::None);
        assert_eq!(property.sensitivity(), None);
        assert!(property.roots().is_empty());
        assert!(!property.is_file_valued());
    }

    #[test]
    fn vec_source_visits_in_declaration_order() {
        let inputs = vec![
            InputProperty::scalar("b", "x"),
            InputProperty::directory("a", "/src"),
        ];
        let mut names = Vec::new();
        inputs.visit_inputs(&mut |property| names.push(property.name().to_string()));
        assert_eq!(names, vec!["b", "a"]);
    }
}
