//! Patch configuration.

use crate::{Error, Result};

/// Default root of the package store.
pub const DEFAULT_STORE_DIR: &str = "/nix/store";

/// Default file name of the dynamic loader inside the glibc package.
pub const DEFAULT_LOADER_NAME: &str = "ld-linux-aarch64.so.1";

/// Immutable configuration for one patch run.
///
/// Every patch rule receives the context by reference; nothing is read from
/// process-wide state. Build one with [`PatchContext::builder`].
///
/// # Example
///
/// ```rust
/// use narpatch::PatchContext;
///
/// let ctx = PatchContext::builder(
///     "/data/data/com.example/files/usr",
///     "/nix/store/aaaa-glibc-android-2.40",
///     "/nix/store/bbbb-gcc-14-lib",
/// )
/// .old_glibc("/nix/store/cccc-glibc-2.40")
/// .build()?;
///
/// assert_eq!(
///     ctx.interpreter_path(),
///     "/data/data/com.example/files/usr/nix/store/aaaa-glibc-android-2.40/lib/ld-linux-aarch64.so.1"
/// );
/// # Ok::<(), narpatch::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchContext {
    prefix: String,
    glibc: String,
    gcc_lib: String,
    old_glibc: Option<String>,
    old_gcc_lib: Option<String>,
    store_dir: String,
    loader_name: String,
}

impl PatchContext {
    /// Starts building a context from the three required settings.
    ///
    /// * `prefix` - the alternate installation root, e.g. `/data/x`
    /// * `glibc` - store path of the glibc that provides the loader
    /// * `gcc_lib` - store path of the gcc runtime libraries
    pub fn builder(
        prefix: impl Into<String>,
        glibc: impl Into<String>,
        gcc_lib: impl Into<String>,
    ) -> PatchContextBuilder {
        PatchContextBuilder {
            prefix: prefix.into(),
            glibc: glibc.into(),
            gcc_lib: gcc_lib.into(),
            old_glibc: None,
            old_gcc_lib: None,
            store_dir: DEFAULT_STORE_DIR.to_string(),
            loader_name: DEFAULT_LOADER_NAME.to_string(),
        }
    }

    /// The alternate installation root.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Store path of the replacement glibc.
    pub fn glibc(&self) -> &str {
        &self.glibc
    }

    /// Store path of the replacement gcc runtime libraries.
    pub fn gcc_lib(&self) -> &str {
        &self.gcc_lib
    }

    /// Store path of the glibc to substitute in RPATHs, if any.
    pub fn old_glibc(&self) -> Option<&str> {
        self.old_glibc.as_deref()
    }

    /// Store path of the gcc runtime to substitute in RPATHs, if any.
    pub fn old_gcc_lib(&self) -> Option<&str> {
        self.old_gcc_lib.as_deref()
    }

    /// Root of the package store, `/nix/store` unless overridden.
    pub fn store_dir(&self) -> &str {
        &self.store_dir
    }

    /// File name of the dynamic loader.
    pub fn loader_name(&self) -> &str {
        &self.loader_name
    }

    /// Store root as seen from inside the prefix.
    pub fn prefixed_store_dir(&self) -> String {
        format!("{}{}", self.prefix, self.store_dir)
    }

    /// Full path of the loader that patched executables should use.
    pub fn interpreter_path(&self) -> String {
        format!("{}{}/lib/{}", self.prefix, self.glibc, self.loader_name)
    }
}

/// Builder for [`PatchContext`].
#[derive(Debug, Clone)]
#[must_use]
pub struct PatchContextBuilder {
    prefix: String,
    glibc: String,
    gcc_lib: String,
    old_glibc: Option<String>,
    old_gcc_lib: Option<String>,
    store_dir: String,
    loader_name: String,
}

impl PatchContextBuilder {
    /// Sets the glibc store path that RPATHs should stop referring to.
    ///
    /// An empty string means no substitution.
    pub fn old_glibc(mut self, path: impl Into<String>) -> Self {
        self.old_glibc = non_empty(path.into());
        self
    }

    /// Sets the gcc runtime store path that RPATHs should stop referring to.
    ///
    /// An empty string means no substitution.
    pub fn old_gcc_lib(mut self, path: impl Into<String>) -> Self {
        self.old_gcc_lib = non_empty(path.into());
        self
    }

    /// Overrides the store root.
    pub fn store_dir(mut self, dir: impl Into<String>) -> Self {
        self.store_dir = dir.into();
        self
    }

    /// Overrides the loader file name.
    pub fn loader_name(mut self, name: impl Into<String>) -> Self {
        self.loader_name = name.into();
        self
    }

    /// Validates the settings and produces the context.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the prefix is empty, relative or
    /// ends with `/`, if glibc or gcc-lib is empty, if the store root is not
    /// absolute, or if the loader name is empty or contains `/`.
    pub fn build(self) -> Result<PatchContext> {
        if self.prefix.is_empty() {
            return Err(Error::InvalidConfig("prefix must not be empty".into()));
        }
        if !self.prefix.starts_with('/') {
            return Err(Error::InvalidConfig(format!(
                "prefix must be an absolute path: {}",
                self.prefix
            )));
        }
        if self.prefix.ends_with('/') {
            return Err(Error::InvalidConfig(format!(
                "prefix must not end with '/': {}",
                self.prefix
            )));
        }
        if self.glibc.is_empty() {
            return Err(Error::InvalidConfig("glibc path must not be empty".into()));
        }
        if self.gcc_lib.is_empty() {
            return Err(Error::InvalidConfig("gcc-lib path must not be empty".into()));
        }
        if !self.store_dir.starts_with('/') || self.store_dir.len() < 2 {
            return Err(Error::InvalidConfig(format!(
                "store directory must be an absolute path: {:?}",
                self.store_dir
            )));
        }
        if self.loader_name.is_empty() || self.loader_name.contains('/') {
            return Err(Error::InvalidConfig(format!(
                "loader name must be a bare file name: {:?}",
                self.loader_name
            )));
        }

        Ok(PatchContext {
            prefix: self.prefix,
            glibc: self.glibc,
            gcc_lib: self.gcc_lib,
            old_glibc: self.old_glibc,
            old_gcc_lib: self.old_gcc_lib,
            store_dir: self.store_dir,
            loader_name: self.loader_name,
        })
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
