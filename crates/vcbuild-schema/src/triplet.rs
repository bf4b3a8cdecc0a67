//! vcpkg target triplets.

/// A vcpkg target triplet (platform + architecture), e.g. `x64-linux`.
///
/// Every tool invocation carries one. The host default is derived from the
/// compile-time target so a plain `vcbuild` run installs libraries that match
/// the machine it is running on.
///
/// # Example
///
/// ```
/// use vcbuild_schema::Triplet;
///
/// let host = Triplet::host();
/// println!("Installing for: {host}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triplet(String);

impl Triplet {
    /// The triplet matching the platform this binary was built for.
    pub fn host() -> Self {
        let arch = if cfg!(target_arch = "aarch64") {
            "arm64"
        } else {
            "x64"
        };
        let os = if cfg!(target_os = "windows") {
            "windows"
        } else if cfg!(target_os = "macos") {
            "osx"
        } else {
            "linux"
        };
        Self(format!("{arch}-{os}"))
    }

    /// Convert to string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Triplet {
    fn default() -> Self {
        Self::host()
    }
}

impl std::fmt::Display for Triplet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Triplet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let valid = !s.is_empty()
            && s.contains('-')
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(s.to_lowercase()))
        } else {
            Err(format!("Invalid triplet: {s}"))
        }
    }
}
