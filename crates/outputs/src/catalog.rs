//! The output catalog of one unit of work.

use crate::property::{OutputFileProperty, OutputKind, OutputPaths, OutputPropertySpec};
use crate::{Error, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// Every output a unit of work declares.
///
/// Static properties come from the unit's configuration; runtime properties
/// are added through [`file`](Self::file), [`dir`](Self::dir),
/// [`files`](Self::files) and [`dirs`](Self::dirs) while the unit is being
/// prepared. Both lists are kept in declaration order and merged whenever
/// the catalog is queried.
///
/// A runtime property is given the synthetic name `$N`, its position among
/// runtime declarations, when it is declared. Naming it later with
/// [`OutputFileProperty::named`] replaces that name without renumbering
/// the others.
#[derive(Debug, Clone, Default)]
pub struct OutputCatalog {
    unit: String,
    declared: Vec<OutputFileProperty>,
    runtime: Vec<(String, OutputFileProperty)>,
}

impl OutputCatalog {
    /// An empty catalog for the unit called `unit`.
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            declared: Vec::new(),
            runtime: Vec::new(),
        }
    }

    /// Add statically declared properties.
    #[must_use]
    pub fn with_properties(mut self, properties: impl IntoIterator<Item = OutputFileProperty>) -> Self {
        self.declared.extend(properties);
        self
    }

    /// The producing unit's name.
    #[must_use]
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Add one statically declared property.
    pub fn declare(&mut self, property: OutputFileProperty) {
        self.declared.push(property);
    }

    fn declare_runtime(&mut self, property: OutputFileProperty) -> &mut OutputFileProperty {
        let synthetic = format!("${}", self.runtime.len() + 1);
        self.runtime.push((synthetic, property));
        let last = self.runtime.len() - 1;
        &mut self.runtime[last].1
    }

    /// Declare a single output file at runtime.
    pub fn file(&mut self, path: impl Into<PathBuf>) -> &mut OutputFileProperty {
        self.declare_runtime(OutputFileProperty::unnamed(
            OutputKind::SingleFile,
            OutputPaths::Single(Some(path.into())),
        ))
    }

    /// Declare a single output directory at runtime.
    pub fn dir(&mut self, path: impl Into<PathBuf>) -> &mut OutputFileProperty {
        self.declare_runtime(OutputFileProperty::unnamed(
            OutputKind::SingleDirectory,
            OutputPaths::Single(Some(path.into())),
        ))
    }

    /// Declare several output files at runtime.
    pub fn files<P: Into<PathBuf>>(
        &mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> &mut OutputFileProperty {
        self.declare_runtime(OutputFileProperty::unnamed(
            OutputKind::FileSet,
            OutputPaths::Many(paths.into_iter().map(Into::into).collect()),
        ))
    }

    /// Declare several output directories at runtime.
    pub fn dirs<P: Into<PathBuf>>(
        &mut self,
        paths: impl IntoIterator<Item = P>,
    ) -> &mut OutputFileProperty {
        self.declare_runtime(OutputFileProperty::unnamed(
            OutputKind::DirectorySet,
            OutputPaths::Many(paths.into_iter().map(Into::into).collect()),
        ))
    }

    /// Whether any output property is declared, static or runtime, even
    /// one that resolves to no path.
    #[must_use]
    pub fn has_declared_outputs(&self) -> bool {
        !self.declared.is_empty() || !self.runtime.is_empty()
    }

    /// Declared properties paired with their effective names.
    fn named_properties(&self) -> impl Iterator<Item = (&str, &OutputFileProperty)> {
        let runtime = self
            .runtime
            .iter()
            .map(|(synthetic, property)| (property.name().unwrap_or(synthetic), property));
        self.declared
            .iter()
            .map(|property| (property.name().unwrap_or_default(), property))
            .chain(runtime)
    }

    /// Resolved output properties, sorted by name.
    ///
    /// Identical resolutions under one name collapse into one entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConflictingProperty`] when two properties resolve to
    /// the same name with different shapes or paths.
    pub fn file_properties(&self) -> Result<Vec<OutputPropertySpec>> {
        let mut specs: Vec<OutputPropertySpec> = self
            .named_properties()
            .flat_map(|(name, property)| property.resolve(name))
            .collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut resolved: Vec<OutputPropertySpec> = Vec::with_capacity(specs.len());
        for spec in specs {
            match resolved.last() {
                Some(previous) if previous.name == spec.name => {
                    if *previous != spec {
                        return Err(Error::ConflictingProperty { name: spec.name });
                    }
                }
                _ => resolved.push(spec),
            }
        }
        Ok(resolved)
    }

    /// The union of all output paths, tagged with the producing unit.
    ///
    /// # Errors
    ///
    /// See [`file_properties`](Self::file_properties).
    pub fn all_files(&self) -> Result<OutputFiles> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for spec in self.file_properties()? {
            for path in spec.paths {
                if !paths.contains(&path) {
                    paths.push(path);
                }
            }
        }
        Ok(OutputFiles {
            producer: self.unit.clone(),
            paths,
        })
    }
}

/// The output paths of one unit, as a single collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFiles {
    producer: String,
    paths: Vec<PathBuf>,
}

impl OutputFiles {
    /// The unit that produces these paths.
    #[must_use]
    pub fn producer(&self) -> &str {
        &self.producer
    }

    /// Paths ordered by property name, then declaration order.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Whether `path` is one of the declared output roots.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.iter().any(|candidate| candidate == path)
    }

    /// Number of distinct paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the unit declares no output path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl fmt::Display for OutputFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unit '{}' output files", self.producer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(specs: &[OutputPropertySpec]) -> Vec<&str> {
        specs.iter().map(|spec| spec.name.as_str()).collect()
    }

    // ==========================================================================
    // Declaration and naming
    // ==========================================================================

    #[test]
    fn empty_catalog_declares_nothing() {
        let catalog = OutputCatalog::new("compile");
        assert!(!catalog.has_declared_outputs());
        assert!(catalog.file_properties().unwrap().is_empty());
        assert!(catalog.all_files().unwrap().is_empty());
    }

    #[test]
    fn absent_output_still_counts_as_declared() {
        let catalog = OutputCatalog::new("compile")
            .with_properties([OutputFileProperty::optional_file("log", None)]);
        assert!(catalog.has_declared_outputs());
        assert!(catalog.file_properties().unwrap().is_empty());
    }

    #[test]
    fn unnamed_runtime_properties_get_positional_names() {
        let mut catalog = OutputCatalog::new("compile");
        catalog.file("out/a.txt");
        catalog.dir("out/gen").named("generated");
        catalog.files(["out/b.txt"]);
        let specs = catalog.file_properties().unwrap();
        assert_eq!(names(&specs), vec!["$1", "$3", "generated"]);
    }

    #[test]
    fn naming_a_runtime_property_keeps_later_names() {
        let mut catalog = OutputCatalog::new("compile");
        catalog.file("out/a.txt");
        catalog.file("out/b.txt");
        assert_eq!(names(&catalog.file_properties().unwrap()), vec!["$1", "$2"]);

        catalog.runtime[0].1.named("first");
        assert_eq!(
            names(&catalog.file_properties().unwrap()),
            vec!["$2", "first"]
        );
    }

    #[test]
    fn static_and_runtime_properties_merge_sorted() {
        let mut catalog = OutputCatalog::new("compile")
            .with_properties([OutputFileProperty::dir("classes", "build/classes")]);
        catalog.file("build/extra.txt").named("aaa");
        catalog.declare(OutputFileProperty::file("zzz", "build/z.txt"));
        let specs = catalog.file_properties().unwrap();
        assert_eq!(names(&specs), vec!["aaa", "classes", "zzz"]);
    }

    // ==========================================================================
    // Deduplication and conflicts
    // ==========================================================================

    #[test]
    fn identical_declarations_collapse() {
        let catalog = OutputCatalog::new("compile").with_properties([
            OutputFileProperty::file("jar", "build/app.jar"),
            OutputFileProperty::file("jar", "build/app.jar"),
        ]);
        assert_eq!(catalog.file_properties().unwrap().len(), 1);
    }

    #[test]
    fn conflicting_declarations_are_rejected() {
        let catalog = OutputCatalog::new("compile").with_properties([
            OutputFileProperty::file("jar", "build/app.jar"),
            OutputFileProperty::file("jar", "build/other.jar"),
        ]);
        let err = catalog.file_properties().unwrap_err();
        assert!(matches!(err, Error::ConflictingProperty { ref name } if name == "jar"));
    }

    // ==========================================================================
    // Union of paths
    // ==========================================================================

    #[test]
    fn all_files_unions_every_property() {
        let mut catalog = OutputCatalog::new("compile").with_properties([
            OutputFileProperty::keyed_files("reports", [("a", "out/a.html"), ("b", "out/b.html")]),
            OutputFileProperty::file("log", "out/a.html"),
        ]);
        catalog.dirs(["out/gen"]);
        let files = catalog.all_files().unwrap();
        assert_eq!(files.producer(), "compile");
        assert_eq!(files.len(), 3);
        assert!(files.contains(Path::new("out/gen")));
        assert_eq!(files.to_string(), "unit 'compile' output files");
    }

    #[test]
    fn non_cacheable_shape_survives_resolution() {
        let catalog = OutputCatalog::new("compile")
            .with_properties([OutputFileProperty::files("objs", ["a.o", "b.o"])]);
        let specs = catalog.file_properties().unwrap();
        assert_eq!(specs.len(), 1);
        assert!(!specs[0].cacheable);
    }
}
