//! Install, upgrade and prune orchestration.
//!
//! [`Installer`] sequences tool queries and the resolver into the three
//! workflows a sync needs:
//!
//! 1. **Upgrade**: remove every outdated package together with everything that
//!    depends on it, dependents first.
//! 2. **Install**: install the requested packages and their dependencies,
//!    dependencies first.
//! 3. **Prune**: remove installed packages the requested set no longer needs.
//!
//! Each tool call is announced as one phase on the [`Reporter`].

use std::collections::HashSet;
use std::path::Path;

use vcbuild_schema::PackageName;

use crate::error::BuildLog;
use crate::paths::buildtree_dir;
use crate::process::PackageTool;
use crate::reporter::{Reporter, plural, run_phase};
use crate::resolver::{Resolution, discover};
use crate::scrape::{self, InstallOutcome, RemoveOutcome};
use crate::EngineError;

/// What a full [`Installer::sync`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Removed so they can be rebuilt at their new port version.
    pub removed_for_upgrade: Vec<PackageName>,
    /// Newly built and installed.
    pub installed: Vec<PackageName>,
    /// Removed because nothing requested needs them any more.
    pub pruned: Vec<PackageName>,
}

/// Drives a [`PackageTool`] through install, upgrade and prune.
pub struct Installer<'a, T: PackageTool + ?Sized> {
    tool: &'a T,
    reporter: &'a dyn Reporter,
}

impl<T: PackageTool + ?Sized> std::fmt::Debug for Installer<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("root", &self.tool.root())
            .finish_non_exhaustive()
    }
}

impl<'a, T: PackageTool + ?Sized> Installer<'a, T> {
    /// Create an installer over `tool`, reporting progress to `reporter`.
    pub fn new(tool: &'a T, reporter: &'a dyn Reporter) -> Self {
        Self { tool, reporter }
    }

    /// Packages whose installed version differs from their port.
    ///
    /// # Errors
    ///
    /// Fails if the tool cannot be launched or its output is unrecognized.
    pub fn list_upgradeable(&self) -> Result<Vec<PackageName>, EngineError> {
        run_phase(self.reporter, "Enumerating upgradable packages", || {
            let output = self.tool.invoke(&["update"])?;
            let packages = scrape::list_upgradeable(&output)?;
            let status = if packages.is_empty() {
                "0 packages".to_string()
            } else {
                format!(
                    "Found {}",
                    plural(packages.len(), "upgradable package", "upgradable packages")
                )
            };
            Ok((packages, status))
        })
    }

    /// Dependencies an install of `package` would build, or `None` if it is
    /// already installed.
    ///
    /// # Errors
    ///
    /// Fails if the tool cannot be launched or its output is unrecognized.
    pub fn install_dependencies(
        &self,
        package: &PackageName,
    ) -> Result<Option<Vec<PackageName>>, EngineError> {
        let title = format!("Enumerating dependencies of {package}");
        run_phase(self.reporter, &title, || {
            let output = self
                .tool
                .invoke(&["install", "--dry-run", package.as_str()])?;
            let deps = scrape::dependencies_for(&output)?;
            let status = match &deps {
                None => "Installed".to_string(),
                Some(list) => format!("Found {}", plural(list.len(), "dependency", "dependencies")),
            };
            Ok((deps, status))
        })
    }

    /// Installed packages a recursive removal of `package` would take with
    /// it, or `None` if it is not installed.
    ///
    /// # Errors
    ///
    /// Fails if the tool cannot be launched or its output is unrecognized.
    pub fn removal_dependents(
        &self,
        package: &PackageName,
    ) -> Result<Option<Vec<PackageName>>, EngineError> {
        let title = format!("Enumerating dependants of {package}");
        run_phase(self.reporter, &title, || {
            let output = self
                .tool
                .invoke(&["remove", "--recurse", "--dry-run", package.as_str()])?;
            let dependents = scrape::removal_dependents_for(&output)?;
            let status = match &dependents {
                None => "Not Installed".to_string(),
                Some(list) => format!("Found {}", plural(list.len(), "dependant", "dependants")),
            };
            Ok((dependents, status))
        })
    }

    /// Every installed package.
    ///
    /// # Errors
    ///
    /// Fails if the tool cannot be launched or `list` exits non-zero.
    pub fn list_installed(&self) -> Result<Vec<PackageName>, EngineError> {
        run_phase(self.reporter, "Enumerating installed packages", || {
            let output = self.tool.invoke(&["list"])?;
            let packages = scrape::list_installed(&output)?;
            let status = format!(
                "Found {}",
                plural(packages.len(), "installed package", "installed packages")
            );
            Ok((packages, status))
        })
    }

    /// The full set of packages `roots` need, according to the tool.
    ///
    /// An empty root set needs nothing and is answered without a tool call.
    ///
    /// # Errors
    ///
    /// Fails if the tool cannot be launched or `depend-info` exits non-zero.
    pub fn list_needed_for(&self, roots: &[PackageName]) -> Result<Vec<PackageName>, EngineError> {
        run_phase(self.reporter, "Enumerating all needed packages", || {
            let packages = if roots.is_empty() {
                Vec::new()
            } else {
                let mut args = vec!["depend-info"];
                args.extend(roots.iter().map(PackageName::base));
                let output = self.tool.invoke(&args)?;
                scrape::list_needed(&output)?
            };
            let status = format!(
                "Found {}",
                plural(packages.len(), "needed package", "needed packages")
            );
            Ok((packages, status))
        })
    }

    /// Install a single package.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InstallFailed`], carrying the package's build
    /// logs, if the tool does not report a clean install.
    pub fn install_package(&self, package: &PackageName) -> Result<InstallOutcome, EngineError> {
        let title = format!("Installing package {package}");
        run_phase(self.reporter, &title, || {
            let output = self.tool.invoke(&["install", package.as_str()])?;
            match scrape::install_outcome(&output) {
                InstallOutcome::AlreadyInstalled => Ok((
                    InstallOutcome::AlreadyInstalled,
                    "Previously Installed".to_string(),
                )),
                InstallOutcome::Installed => {
                    Ok((InstallOutcome::Installed, "Installed".to_string()))
                }
                InstallOutcome::Failed => Err(EngineError::InstallFailed {
                    package: package.clone(),
                    command: output.command,
                    stdout: output.stdout,
                    stderr: output.stderr,
                    logs: collect_build_logs(self.tool.root(), package.base()),
                }),
            }
        })
    }

    /// Remove a single package. Removing one that is not installed is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Fails if the tool cannot be launched or its output is unrecognized.
    pub fn remove_package(&self, package: &PackageName) -> Result<RemoveOutcome, EngineError> {
        let title = format!("Removing package {package}");
        run_phase(self.reporter, &title, || {
            let output = self.tool.invoke(&["remove", package.as_str()])?;
            let outcome = scrape::remove_outcome(&output)?;
            let status = match outcome {
                RemoveOutcome::NotInstalled => "Not Installed",
                RemoveOutcome::Removed => "Removed",
            };
            Ok((outcome, status.to_string()))
        })
    }

    fn order<F>(&self, roots: &[PackageName], query: F) -> Result<Resolution, EngineError>
    where
        F: FnMut(&PackageName) -> Result<Option<Vec<PackageName>>, EngineError>,
    {
        let graph = discover(roots, query)?;
        run_phase(self.reporter, "Resolving dependency tree", || {
            let resolution = Resolution::from_graph(graph)?;
            let status = format!(
                "Resolved {}",
                plural(resolution.len(), "dependency", "dependencies")
            );
            Ok((resolution, status))
        })
    }

    /// Remove every outdated package along with its dependents, dependents
    /// first. Returns the packages actually removed.
    ///
    /// # Errors
    ///
    /// Propagates query, ordering and removal failures.
    pub fn upgrade(&self) -> Result<Vec<PackageName>, EngineError> {
        let upgradeable = self.list_upgradeable()?;
        if upgradeable.is_empty() {
            return Ok(Vec::new());
        }

        let resolution = self.order(&upgradeable, |p| self.removal_dependents(p))?;
        let mut removed = Vec::new();
        for package in resolution.actionable() {
            if self.remove_package(package)? == RemoveOutcome::Removed {
                removed.push(package.clone());
            }
        }
        tracing::info!(count = removed.len(), "removed outdated packages");
        Ok(removed)
    }

    /// Install `roots` and everything they depend on, dependencies first.
    /// Packages already present are left alone. Returns the packages
    /// actually installed.
    ///
    /// # Errors
    ///
    /// Propagates query, ordering and install failures.
    pub fn install(&self, roots: &[PackageName]) -> Result<Vec<PackageName>, EngineError> {
        let resolution = self.order(roots, |p| self.install_dependencies(p))?;
        let mut installed = Vec::new();
        for package in resolution.actionable() {
            if self.install_package(package)? == InstallOutcome::Installed {
                installed.push(package.clone());
            }
        }
        tracing::info!(count = installed.len(), "installed packages");
        Ok(installed)
    }

    /// Remove installed packages that `roots` do not need. Returns the
    /// packages removed.
    ///
    /// An empty root set means no packages were requested, usually because
    /// the settings file is missing or has no `packages` key. Nothing is
    /// removed in that case.
    ///
    /// # Errors
    ///
    /// Propagates listing and removal failures.
    pub fn prune(&self, roots: &[PackageName]) -> Result<Vec<PackageName>, EngineError> {
        if roots.is_empty() {
            self.reporter.live_phase("Determining unneeded packages");
            self.reporter.live_phase_update("Skipped", false);
            self.reporter
                .warning("No packages requested, leaving installed packages in place");
            tracing::warn!("prune skipped: empty package list");
            return Ok(Vec::new());
        }

        let installed = self.list_installed()?;
        let needed = self.list_needed_for(roots)?;

        let surplus = run_phase(self.reporter, "Determining unneeded packages", || {
            let surplus = unneeded(&installed, &needed);
            let status = format!(
                "Found {}",
                plural(surplus.len(), "unneeded package", "unneeded packages")
            );
            Ok((surplus, status))
        })?;

        let mut removed = Vec::new();
        for package in surplus {
            if self.remove_package(&package)? == RemoveOutcome::Removed {
                removed.push(package);
            }
        }
        tracing::info!(count = removed.len(), "pruned packages");
        Ok(removed)
    }

    /// Upgrade, install, then prune.
    ///
    /// # Errors
    ///
    /// Stops at the first failing step.
    pub fn sync(&self, roots: &[PackageName]) -> Result<SyncReport, EngineError> {
        let removed_for_upgrade = self.upgrade()?;
        let installed = self.install(roots)?;
        let pruned = self.prune(roots)?;
        Ok(SyncReport {
            removed_for_upgrade,
            installed,
            pruned,
        })
    }
}

/// `installed − needed`, keeping the order of `installed` and dropping
/// repeats.
pub fn unneeded(installed: &[PackageName], needed: &[PackageName]) -> Vec<PackageName> {
    let needed: HashSet<&PackageName> = needed.iter().collect();
    let mut seen = HashSet::new();
    installed
        .iter()
        .filter(|p| !needed.contains(p) && seen.insert(*p))
        .cloned()
        .collect()
}

/// Every `*.log` under `<root>/buildtrees/<base>/`, sorted by path.
fn collect_build_logs(root: &Path, base: &str) -> Vec<BuildLog> {
    let dir = buildtree_dir(root, base);
    let pattern = format!(
        "{}/*.log",
        glob::Pattern::escape(&dir.to_string_lossy())
    );

    let mut paths: Vec<_> = match glob::glob(&pattern) {
        Ok(paths) => paths.filter_map(Result::ok).collect(),
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "bad build log pattern");
            Vec::new()
        }
    };
    paths.sort();

    paths
        .into_iter()
        .filter_map(|path| match std::fs::read(&path) {
            Ok(bytes) => Some(BuildLog {
                contents: String::from_utf8_lossy(&bytes).into_owned(),
                path,
            }),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "unreadable build log");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::ToolOutput;
    use crate::reporter::NullReporter;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::path::PathBuf;

    const ALREADY: &str = "The following packages are already installed:\n    y[core]:x64-linux\n";
    const NOT_INSTALLED: &str =
        "The following packages are not installed, so not removed:\n    q:x64-linux\n";

    /// Scripted stand-in for vcpkg keyed by the joined argument list.
    struct FakeTool {
        root: PathBuf,
        responses: HashMap<String, (i32, String)>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeTool {
        fn new() -> Self {
            Self {
                root: PathBuf::from("/nonexistent/vcpkg"),
                responses: HashMap::new(),
                calls: RefCell::new(Vec::new()),
            }
        }

        fn with_root(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                ..Self::new()
            }
        }

        fn on(mut self, args: &str, code: i32, stdout: &str) -> Self {
            self.responses
                .insert(args.to_string(), (code, stdout.to_string()));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        /// Real (non dry-run) install/remove calls, in order.
        fn mutations(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| {
                    (c.starts_with("install ") || c.starts_with("remove "))
                        && !c.contains("--dry-run")
                })
                .collect()
        }
    }

    impl PackageTool for FakeTool {
        fn invoke(&self, args: &[&str]) -> Result<ToolOutput, EngineError> {
            let key = args.join(" ");
            self.calls.borrow_mut().push(key.clone());
            let (code, stdout) = self
                .responses
                .get(&key)
                .cloned()
                .unwrap_or((1, format!("unscripted: {key}\n")));
            Ok(ToolOutput {
                command: format!("vcpkg {key}"),
                status: Some(code),
                stdout,
                stderr: String::new(),
            })
        }

        fn root(&self) -> &Path {
            &self.root
        }
    }

    fn will_install(pkgs: &[&str]) -> String {
        let mut out = String::from("The following packages will be built and installed:\n");
        for p in pkgs {
            out.push_str(&format!("  * {p}:x64-linux\n"));
        }
        out
    }

    fn will_remove(pkgs: &[&str]) -> String {
        let mut out = String::from("The following packages will be removed:\n");
        for p in pkgs {
            out.push_str(&format!("  * {p}:x64-linux\n"));
        }
        out
    }

    fn names(list: &[&str]) -> Vec<PackageName> {
        list.iter().map(|n| PackageName::new(n)).collect()
    }

    #[test]
    fn test_unneeded_is_set_difference() {
        let installed = names(&["a", "b", "c"]);
        let needed = names(&["a[core]", "c"]);
        assert_eq!(unneeded(&installed, &needed), vec!["b"]);
    }

    #[test]
    fn test_unneeded_keeps_order_and_dedupes() {
        let installed = names(&["z", "b", "z", "a"]);
        assert_eq!(unneeded(&installed, &[]), vec!["z", "b", "a"]);
    }

    #[test]
    fn test_prune_removes_only_surplus() {
        let tool = FakeTool::new()
            .on("list", 0, "a:x64-linux  1.0  A\nb:x64-linux  2.0  B\nc:x64-linux  3.0  C\n")
            .on("depend-info a c", 0, "a: c\nc: \n")
            .on("remove b[core]", 0, &will_remove(&[]));
        let installer = Installer::new(&tool, &NullReporter);

        let removed = installer.prune(&names(&["a", "c"])).unwrap();
        assert_eq!(removed, vec!["b"]);
        assert_eq!(tool.mutations(), vec!["remove b[core]"]);
    }

    #[test]
    fn test_prune_with_no_roots_removes_nothing() {
        let tool = FakeTool::new()
            .on("list", 0, "boost:x64-linux 1.0\nqt5:x64-linux 5.15\n")
            .on("remove boost[core]", 0, &will_remove(&[]))
            .on("remove qt5[core]", 0, &will_remove(&[]));
        let installer = Installer::new(&tool, &NullReporter);

        assert!(installer.prune(&[]).unwrap().is_empty());
        assert!(tool.mutations().is_empty());
        assert!(!tool.calls().iter().any(|c| c.starts_with("depend-info")));
    }

    #[test]
    fn test_install_skips_already_installed_dependency() {
        let tool = FakeTool::new()
            .on("install --dry-run x[core]", 0, &will_install(&["y"]))
            .on("install --dry-run y[core]", 0, ALREADY)
            .on("install x[core]", 0, &will_install(&[]));
        let installer = Installer::new(&tool, &NullReporter);

        let installed = installer.install(&names(&["x"])).unwrap();
        assert_eq!(installed, vec!["x"]);
        assert_eq!(tool.mutations(), vec!["install x[core]"]);
    }

    #[test]
    fn test_previously_installed_is_not_reported_as_installed() {
        let tool = FakeTool::new()
            .on("install --dry-run x[core]", 0, &will_install(&[]))
            .on("install x[core]", 0, ALREADY);
        let installer = Installer::new(&tool, &NullReporter);

        assert!(installer.install(&names(&["x"])).unwrap().is_empty());
        assert_eq!(tool.mutations(), vec!["install x[core]"]);
    }

    #[test]
    fn test_upgrade_removes_dependents_first_then_reinstalls() {
        // u is outdated and d depends on it; d is the requested root.
        let tool = FakeTool::new()
            .on(
                "update",
                0,
                "The following packages differ from their port versions:\n    u:x64-linux    1.0 -> 1.1\n",
            )
            .on("remove --recurse --dry-run u[core]", 0, &will_remove(&["d"]))
            .on("remove --recurse --dry-run d[core]", 0, &will_remove(&[]))
            .on("remove d[core]", 0, &will_remove(&[]))
            .on("remove u[core]", 0, &will_remove(&[]))
            .on("install --dry-run d[core]", 0, &will_install(&["u"]))
            .on("install --dry-run u[core]", 0, &will_install(&[]))
            .on("install u[core]", 0, &will_install(&[]))
            .on("install d[core]", 0, &will_install(&[]))
            .on("list", 0, "d:x64-linux 1.0\nu:x64-linux 1.1\n")
            .on("depend-info d", 0, "d: u\nu: \n");
        let installer = Installer::new(&tool, &NullReporter);

        let report = installer.sync(&names(&["d"])).unwrap();
        assert_eq!(
            tool.mutations(),
            vec![
                "remove d[core]",
                "remove u[core]",
                "install u[core]",
                "install d[core]"
            ]
        );
        assert_eq!(report.removed_for_upgrade, vec!["d", "u"]);
        assert_eq!(report.installed, vec!["u", "d"]);
        assert!(report.pruned.is_empty());
    }

    #[test]
    fn test_upgrade_skips_dependents_that_are_gone() {
        let tool = FakeTool::new()
            .on(
                "update",
                0,
                "The following packages differ from their port versions:\n    u:x64-linux    1.0 -> 1.1\n",
            )
            .on("remove --recurse --dry-run u[core]", 0, NOT_INSTALLED);
        let installer = Installer::new(&tool, &NullReporter);

        assert!(installer.upgrade().unwrap().is_empty());
        assert!(tool.mutations().is_empty());
    }

    #[test]
    fn test_nothing_to_upgrade_skips_resolution() {
        let tool = FakeTool::new().on("update", 0, "No packages need updating.\n");
        let installer = Installer::new(&tool, &NullReporter);

        assert!(installer.upgrade().unwrap().is_empty());
        assert_eq!(tool.calls(), vec!["update"]);
    }

    #[test]
    fn test_unrecognized_dry_run_is_fatal() {
        let tool = FakeTool::new().on("install --dry-run x[core]", 0, "Error: something odd\n");
        let installer = Installer::new(&tool, &NullReporter);

        let err = installer.install(&names(&["x"])).unwrap_err();
        assert!(matches!(err, EngineError::UnrecognizedOutput { .. }));
        assert!(tool.mutations().is_empty());
    }

    #[test]
    fn test_remove_not_installed_is_noop() {
        let tool = FakeTool::new().on("remove q[core]", 0, NOT_INSTALLED);
        let installer = Installer::new(&tool, &NullReporter);

        let outcome = installer.remove_package(&PackageName::new("q")).unwrap();
        assert_eq!(outcome, RemoveOutcome::NotInstalled);
    }

    #[test]
    fn test_install_failure_carries_build_logs() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("buildtrees").join("zlib");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("config-x64-linux-out.log"), "cc: not found").unwrap();
        std::fs::write(logs.join("notes.txt"), "ignored").unwrap();

        let tool = FakeTool::with_root(dir.path()).on(
            "install zlib[core]",
            1,
            &will_install(&[]),
        );
        let installer = Installer::new(&tool, &NullReporter);

        let err = installer
            .install_package(&PackageName::new("zlib"))
            .unwrap_err();
        match err {
            EngineError::InstallFailed { package, logs, .. } => {
                assert_eq!(package, "zlib");
                assert_eq!(logs.len(), 1);
                assert_eq!(logs[0].contents, "cc: not found");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_list_installed_failure_is_fatal() {
        let tool = FakeTool::new().on("list", 2, "");
        let installer = Installer::new(&tool, &NullReporter);
        assert!(matches!(
            installer.list_installed(),
            Err(EngineError::UnrecognizedOutput { .. })
        ));
    }
}
