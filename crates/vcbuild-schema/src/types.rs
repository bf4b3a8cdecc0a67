//! Package names and build types.

use std::borrow::Borrow;

/// Feature list appended to names that do not carry one.
pub const CORE_FEATURE_SUFFIX: &str = "[core]";

/// Canonicalize a package identifier.
///
/// vcpkg reports the same package either as `zlib` or as `zlib[core]`
/// depending on the command. A name without a bracketed feature list gets
/// `[core]` appended; anything that already has one is returned unchanged.
///
/// ```
/// use vcbuild_schema::normalize;
///
/// assert_eq!(normalize("zlib"), "zlib[core]");
/// assert_eq!(normalize("curl[ssl,http2]"), "curl[ssl,http2]");
/// assert_eq!(normalize(&normalize("fmt")), "fmt[core]");
/// ```
pub fn normalize(name: &str) -> String {
    if name.is_empty() || name.contains('[') {
        name.to_string()
    } else {
        format!("{name}{CORE_FEATURE_SUFFIX}")
    }
}

/// Strip any bracketed feature list, leaving the bare port name.
///
/// ```
/// use vcbuild_schema::denormalize;
///
/// assert_eq!(denormalize("zlib[core]"), "zlib");
/// assert_eq!(denormalize("zlib"), "zlib");
/// ```
pub fn denormalize(name: &str) -> &str {
    match name.find('[') {
        Some(0) | None => name,
        Some(idx) => &name[..idx],
    }
}

/// A package identifier in canonical (`name[features]`) form.
///
/// Two spellings of the same package always compare equal once wrapped, so
/// this is the key type for dependency graphs and installed-set arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageName(String);

impl PackageName {
    /// Create a package name, normalizing the input.
    pub fn new(name: &str) -> Self {
        Self(normalize(name.trim()))
    }

    /// Return the canonical name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The port name without its feature list (what `depend-info` and the
    /// `buildtrees/` directory are keyed by).
    pub fn base(&self) -> &str {
        denormalize(&self.0)
    }
}

impl std::fmt::Display for PackageName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Deref for PackageName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for PackageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl AsRef<std::ffi::OsStr> for PackageName {
    fn as_ref(&self) -> &std::ffi::OsStr {
        self.0.as_ref()
    }
}

impl PartialEq<str> for PackageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == normalize(other)
    }
}

impl PartialEq<&str> for PackageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == normalize(other)
    }
}

impl PartialEq<String> for PackageName {
    fn eq(&self, other: &String) -> bool {
        self.0 == normalize(other)
    }
}

/// Borrows the canonical form. Hashed lookups by `&str` must pass the
/// normalized name (`"zlib[core]"`, not `"zlib"`); see [`normalize`].
impl Borrow<str> for PackageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for PackageName {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

/// CMake build configuration selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildType {
    /// Unoptimized build with debug info.
    Debug,
    /// Optimized for size.
    Size,
    /// Optimized with debug info.
    DebugRelease,
    /// Fully optimized (default).
    #[default]
    Release,
}

impl BuildType {
    /// The `CMAKE_BUILD_TYPE` / `--config` value.
    pub fn cmake_name(self) -> &'static str {
        match self {
            Self::Debug => "Debug",
            Self::Size => "MinSizeRel",
            Self::DebugRelease => "RelWithDebInfo",
            Self::Release => "Release",
        }
    }

    /// The command-line spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Size => "size",
            Self::DebugRelease => "debug_release",
            Self::Release => "release",
        }
    }
}

impl std::fmt::Display for BuildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "size" => Ok(Self::Size),
            "debug_release" => Ok(Self::DebugRelease),
            "release" => Ok(Self::Release),
            _ => Err(format!(
                "Unknown build type: {s} (expected debug, size, debug_release or release)"
            )),
        }
    }
}
