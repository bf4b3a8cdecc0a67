//! Runs the selected stages in order.

use anyhow::Result;

use vcbuild_core::bootstrap::prepare_tool;
use vcbuild_core::cmake::Cmake;
use vcbuild_core::ports::mirror_ports;
use vcbuild_core::reporter::run_phase;
use vcbuild_core::{Installer, Reporter, RunConfig, SyncReport};
use vcbuild_schema::{PackageName, ProjectSettings};

use crate::Tasks;

/// Read the settings file, reporting it as a phase. A missing file is not an
/// error and yields empty settings.
///
/// # Errors
///
/// Returns the [`vcbuild_schema::SettingsError`] for an unreadable or
/// malformed file.
pub fn load_settings(config: &RunConfig, reporter: &dyn Reporter) -> Result<ProjectSettings> {
    reporter.live_phase(&format!(
        "Parsing config file {}",
        config.settings_file.display()
    ));
    match ProjectSettings::load(&config.settings_file) {
        Ok(Some(settings)) => {
            reporter.live_phase_update("Ok", true);
            Ok(settings)
        }
        Ok(None) => {
            reporter.live_phase_update("Not Found", false);
            Ok(ProjectSettings::default())
        }
        Err(e) => {
            reporter.live_phase_update("Failed", false);
            Err(e.into())
        }
    }
}

/// Execute `tasks` for `config`.
///
/// # Errors
///
/// Stops at the first failing stage and returns its error.
pub fn execute(config: &RunConfig, tasks: Tasks, reporter: &dyn Reporter) -> Result<()> {
    let settings = load_settings(config, reporter)?;
    if let Some(banner) = settings.banner() {
        reporter.section(&banner);
    }
    tracing::debug!(?tasks, packages = ?settings.packages, "starting run");

    if tasks.fetch_tool {
        reporter.section("vcpkg");
        prepare_tool(&config.tool_dir, &config.tool_url, reporter)?;
    }

    if tasks.copy_ports {
        reporter.section("Custom ports");
        mirror_ports(&config.custom_port_dir, &config.tool_dir, reporter)?;
    }

    if tasks.packages {
        reporter.section("Packages");
        let report = sync_packages(config, &settings, reporter)?;
        reporter.info(&summary(&report));
    }

    if tasks.configure || tasks.build {
        reporter.section("CMake");
        let cmake = run_phase(reporter, "Locating cmake", || {
            let cmake = Cmake::locate(config.cmake_binary.as_deref())?;
            let found = cmake.binary().display().to_string();
            Ok((cmake, found))
        })?;

        if tasks.configure {
            cmake.configure(
                &config.source_dir,
                &config.build_dir,
                &config.tool_dir,
                config.build_type,
                &config.triplet,
                reporter,
            )?;
        }
        if tasks.build {
            cmake.build(&config.build_dir, config.build_type, reporter)?;
        }
    }

    Ok(())
}

fn sync_packages(
    config: &RunConfig,
    settings: &ProjectSettings,
    reporter: &dyn Reporter,
) -> Result<SyncReport> {
    let roots: Vec<PackageName> = settings
        .packages
        .iter()
        .map(|p| PackageName::new(p))
        .collect();
    let tool = config.vcpkg();
    Ok(Installer::new(&tool, reporter).sync(&roots)?)
}

fn summary(report: &SyncReport) -> String {
    format!(
        "{} rebuilt for upgrade, {} installed, {} pruned",
        report.removed_for_upgrade.len(),
        report.installed.len(),
        report.pruned.len()
    )
}
