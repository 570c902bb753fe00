//! Explicit working context replacing the process-wide current directory.

use camino::{Utf8Path, Utf8PathBuf};

/// Default source subdirectory holding driver or script sources.
pub const DEFAULT_SOURCE_SUBPATH: &str = "src";

/// Default distribution subdirectory receiving archives.
pub const DEFAULT_DIST_SUBPATH: &str = "dist";

/// Package manifest location relative to the base directory.
pub const MANIFEST_RELATIVE_PATH: &str = "TOSCA-Metadata/TOSCA.meta";

/// Driver descriptor file name inside the source directory.
pub const DRIVER_DESCRIPTOR_FILE: &str = "drivermetadata.xml";

/// Canonical script entry-point file name inside the source directory.
pub const ENTRY_POINT_FILE: &str = "__main__.py";

const DEFINITION_SUFFIX: &str = ".yaml";

/// Directory layout every operation resolves its paths against.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkingContext {
    base_dir: Utf8PathBuf,
    source_subpath: Utf8PathBuf,
    dist_subpath: Utf8PathBuf,
}

impl WorkingContext {
    /// Creates a context rooted at `base_dir` using the default `src/` and
    /// `dist/` subdirectories.
    #[must_use]
    pub fn new(base_dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            source_subpath: Utf8PathBuf::from(DEFAULT_SOURCE_SUBPATH),
            dist_subpath: Utf8PathBuf::from(DEFAULT_DIST_SUBPATH),
        }
    }

    /// Overrides the source subdirectory.
    #[must_use]
    pub fn with_source_subpath(mut self, subpath: impl Into<Utf8PathBuf>) -> Self {
        self.source_subpath = subpath.into();
        self
    }

    /// Overrides the distribution subdirectory.
    #[must_use]
    pub fn with_dist_subpath(mut self, subpath: impl Into<Utf8PathBuf>) -> Self {
        self.dist_subpath = subpath.into();
        self
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base_dir(&self) -> &Utf8Path {
        &self.base_dir
    }

    /// Returns the absolute source directory.
    #[must_use]
    pub fn source_dir(&self) -> Utf8PathBuf {
        self.base_dir.join(&self.source_subpath)
    }

    /// Returns the absolute distribution directory.
    #[must_use]
    pub fn dist_dir(&self) -> Utf8PathBuf {
        self.base_dir.join(&self.dist_subpath)
    }

    /// Returns the path of the definition document named `definition`.
    ///
    /// The name may be given with or without its `.yaml` suffix.
    #[must_use]
    pub fn definition_path(&self, definition: &str) -> Utf8PathBuf {
        self.base_dir
            .join(format!("{}{DEFINITION_SUFFIX}", definition_stem(definition)))
    }

    /// Returns the package manifest path.
    #[must_use]
    pub fn manifest_path(&self) -> Utf8PathBuf {
        self.base_dir.join(MANIFEST_RELATIVE_PATH)
    }

    /// Returns the driver descriptor path.
    #[must_use]
    pub fn driver_descriptor_path(&self) -> Utf8PathBuf {
        self.source_dir().join(DRIVER_DESCRIPTOR_FILE)
    }

    /// Returns the script entry-point path.
    #[must_use]
    pub fn entry_point_path(&self) -> Utf8PathBuf {
        self.source_dir().join(ENTRY_POINT_FILE)
    }

    /// Returns the archive path for the unit named `name`.
    #[must_use]
    pub fn archive_path(&self, name: &str) -> Utf8PathBuf {
        self.dist_dir().join(format!("{name}.zip"))
    }
}

/// Strips a trailing `.yaml` from a definition name.
#[must_use]
pub fn definition_stem(definition: &str) -> &str {
    definition
        .strip_suffix(DEFINITION_SUFFIX)
        .unwrap_or(definition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("shell-definition", "/work/shell-definition.yaml")]
    #[case("script-definition.yaml", "/work/script-definition.yaml")]
    fn definition_path_accepts_either_form(#[case] name: &str, #[case] expected: &str) {
        let ctx = WorkingContext::new("/work");
        assert_eq!(ctx.definition_path(name), Utf8PathBuf::from(expected));
    }

    #[test]
    fn derived_paths_follow_subpaths() {
        let ctx = WorkingContext::new("/work")
            .with_source_subpath("driver")
            .with_dist_subpath("out");
        assert_eq!(ctx.driver_descriptor_path(), "/work/driver/drivermetadata.xml");
        assert_eq!(ctx.entry_point_path(), "/work/driver/__main__.py");
        assert_eq!(ctx.archive_path("demo"), "/work/out/demo.zip");
        assert_eq!(ctx.manifest_path(), "/work/TOSCA-Metadata/TOSCA.meta");
    }
}
