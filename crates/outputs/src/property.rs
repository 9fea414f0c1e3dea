//! Declared and resolved output properties.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Shape of an output property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputKind {
    /// Exactly one file
    SingleFile,
    /// Exactly one directory tree
    SingleDirectory,
    /// Any number of files
    FileSet,
    /// Any number of directory trees
    DirectorySet,
}

impl OutputKind {
    /// Whether the kind admits several paths.
    #[must_use]
    pub const fn is_plural(self) -> bool {
        matches!(self, Self::FileSet | Self::DirectorySet)
    }

    /// Whether paths of this kind are directory trees.
    #[must_use]
    pub const fn is_directory(self) -> bool {
        matches!(self, Self::SingleDirectory | Self::DirectorySet)
    }

    /// The singular counterpart of a plural kind.
    #[must_use]
    pub const fn singular(self) -> Self {
        if self.is_directory() {
            Self::SingleDirectory
        } else {
            Self::SingleFile
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SingleFile => "file",
            Self::SingleDirectory => "directory",
            Self::FileSet => "files",
            Self::DirectorySet => "directories",
        };
        f.write_str(label)
    }
}

/// Paths as they were declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPaths {
    /// A single path, possibly not configured
    Single(Option<PathBuf>),
    /// An unkeyed collection
    Many(Vec<PathBuf>),
    /// A collection keyed by stable names
    Keyed(BTreeMap<String, PathBuf>),
}

/// An output property as declared, before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFileProperty {
    name: Option<String>,
    kind: OutputKind,
    paths: OutputPaths,
}

impl OutputFileProperty {
    pub(crate) fn unnamed(kind: OutputKind, paths: OutputPaths) -> Self {
        Self {
            name: None,
            kind,
            paths,
        }
    }

    fn declared(name: impl Into<String>, kind: OutputKind, paths: OutputPaths) -> Self {
        Self {
            name: Some(name.into()),
            kind,
            paths,
        }
    }

    /// A single output file.
    pub fn file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::declared(name, OutputKind::SingleFile, OutputPaths::Single(Some(path.into())))
    }

    /// A single output file whose path may not be configured.
    pub fn optional_file(name: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::declared(name, OutputKind::SingleFile, OutputPaths::Single(path))
    }

    /// A single output directory.
    pub fn dir(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::declared(
            name,
            OutputKind::SingleDirectory,
            OutputPaths::Single(Some(path.into())),
        )
    }

    /// A single output directory whose path may not be configured.
    pub fn optional_dir(name: impl Into<String>, path: Option<PathBuf>) -> Self {
        Self::declared(name, OutputKind::SingleDirectory, OutputPaths::Single(path))
    }

    /// Several output files.
    pub fn files<P: Into<PathBuf>>(name: impl Into<String>, paths: impl IntoIterator<Item = P>) -> Self {
        Self::declared(
            name,
            OutputKind::FileSet,
            OutputPaths::Many(paths.into_iter().map(Into::into).collect()),
        )
    }

    /// Several output directories.
    pub fn dirs<P: Into<PathBuf>>(name: impl Into<String>, paths: impl IntoIterator<Item = P>) -> Self {
        Self::declared(
            name,
            OutputKind::DirectorySet,
            OutputPaths::Many(paths.into_iter().map(Into::into).collect()),
        )
    }

    /// Output files keyed by name; each key becomes its own property.
    pub fn keyed_files<K, P>(name: impl Into<String>, paths: impl IntoIterator<Item = (K, P)>) -> Self
    where
        K: Into<String>,
        P: Into<PathBuf>,
    {
        Self::declared(
            name,
            OutputKind::FileSet,
            OutputPaths::Keyed(paths.into_iter().map(|(k, p)| (k.into(), p.into())).collect()),
        )
    }

    /// Output directories keyed by name; each key becomes its own property.
    pub fn keyed_dirs<K, P>(name: impl Into<String>, paths: impl IntoIterator<Item = (K, P)>) -> Self
    where
        K: Into<String>,
        P: Into<PathBuf>,
    {
        Self::declared(
            name,
            OutputKind::DirectorySet,
            OutputPaths::Keyed(paths.into_iter().map(|(k, p)| (k.into(), p.into())).collect()),
        )
    }

    /// Give the property a name. Replaces any earlier name.
    pub fn named(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// The declared name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The declared kind.
    #[must_use]
    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    /// The declared paths.
    #[must_use]
    pub fn paths(&self) -> &OutputPaths {
        &self.paths
    }

    /// Resolve into zero or more output property specs under `name`.
    ///
    /// - a single property without a path resolves to nothing
    /// - a keyed collection resolves to one single property per key,
    ///   named `<name>.<key>`
    /// - an unkeyed collection with more than one distinct path is not
    ///   cacheable
    pub(crate) fn resolve(&self, name: &str) -> Vec<OutputPropertySpec> {
        match &self.paths {
            OutputPaths::Single(None) => {
                tracing::trace!(property = name, "Skipping output property without a path");
                Vec::new()
            }
            OutputPaths::Single(Some(path)) => vec![OutputPropertySpec {
                name: name.to_string(),
                kind: self.kind,
                paths: vec![path.clone()],
                cacheable: true,
            }],
            OutputPaths::Many(paths) => {
                let mut distinct: Vec<PathBuf> = Vec::with_capacity(paths.len());
                for path in paths {
                    if !distinct.contains(path) {
                        distinct.push(path.clone());
                    }
                }
                let cacheable = distinct.len() <= 1;
                vec![OutputPropertySpec {
                    name: name.to_string(),
                    kind: self.kind,
                    paths: distinct,
                    cacheable,
                }]
            }
            OutputPaths::Keyed(paths) => paths
                .iter()
                .map(|(key, path)| OutputPropertySpec {
                    name: format!("{name}.{key}"),
                    kind: self.kind.singular(),
                    paths: vec![path.clone()],
                    cacheable: true,
                })
                .collect(),
        }
    }
}

/// A resolved output property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputPropertySpec {
    /// Unique property name
    pub name: String,
    /// Property shape
    pub kind: OutputKind,
    /// Resolved paths, in declaration order
    pub paths: Vec<PathBuf>,
    /// Whether the outputs can be safely stored and restored
    pub cacheable: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_single_output_resolves_to_nothing() {
        let property = OutputFileProperty::optional_file("report", None);
        assert!(property.resolve("report").is_empty());
    }

    #[test]
    fn plural_with_two_paths_is_not_cacheable() {
        let property = OutputFileProperty::files("classes", ["out/a.class", "out/b.class"]);
        let specs = property.resolve("classes");
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].cacheable);
        assert_eq!(specs[0].kind, OutputKind::FileSet);
    }

    #[test]
    fn plural_with_one_distinct_path_stays_cacheable() {
        let property = OutputFileProperty::dirs("gen", ["out/gen", "out/gen"]);
        let specs = property.resolve("gen");
        assert!(specs[0].cacheable);
        assert_eq!(specs[0].paths, vec![PathBuf::from("out/gen")]);
    }

    #[test]
    fn keyed_plural_resolves_per_key() {
        let property =
            OutputFileProperty::keyed_dirs("reports", [("html", "out/html"), ("xml", "out/xml")]);
        let specs = property.resolve("reports");
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["reports.html", "reports.xml"]);
        assert!(specs.iter().all(|s| s.cacheable));
        assert!(specs.iter().all(|s| s.kind == OutputKind::SingleDirectory));
    }

    #[test]
    fn named_replaces_the_name() {
        let mut property = OutputFileProperty::unnamed(
            OutputKind::SingleFile,
            OutputPaths::Single(Some(PathBuf::from("a.txt"))),
        );
        assert_eq!(property.name(), None);
        property.named("first").named("second");
        assert_eq!(property.name(), Some("second"));
    }
}
