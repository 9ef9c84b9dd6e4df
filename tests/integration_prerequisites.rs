//! Integration tests for prerequisite checks.
//!
//! Every installer runs against an isolated environment rooted in a
//! temporary directory, so results do not depend on what the host has
//! installed.

mod common;

use common::{touch_executable, windows_env, Harness, ScriptedExecutor};
use hubble_install::platform::{installer_for, Platform};
use hubble_install::{Dependency, DependencyStatus, ProvisionError};

#[tokio::test]
async fn test_missing_set_is_independent_of_request_order() {
    let root = tempfile::tempdir().unwrap();
    let harness = Harness::new(ScriptedExecutor::new(), windows_env(root.path()));
    let installer = installer_for(Platform::Windows, harness.ctx.clone());

    let forward = installer
        .check_prerequisites(&[Dependency::Uv, Dependency::Nrfutil, Dependency::SeggerJlink])
        .await
        .unwrap();
    let shuffled = installer
        .check_prerequisites(&[
            Dependency::SeggerJlink,
            Dependency::Nrfutil,
            Dependency::Uv,
            Dependency::Nrfutil,
        ])
        .await
        .unwrap();

    assert_eq!(forward, shuffled);
    let names: Vec<&str> = forward.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Chocolatey", "uv", "nrfutil", "segger-jlink"]);
    assert!(forward
        .iter()
        .all(|m| m.status == DependencyStatus::NotInstalled));
}

#[tokio::test]
async fn test_check_performs_no_installs_and_keeps_search_path() {
    let root = tempfile::tempdir().unwrap();
    let choco_bin = root.path().join("choco").join("bin");
    touch_executable(&choco_bin.join("choco.exe"));
    touch_executable(&choco_bin.join("uv.exe"));

    let harness = Harness::new(ScriptedExecutor::new(), windows_env(root.path()));
    let installer = installer_for(Platform::Windows, harness.ctx.clone());

    let missing = installer
        .check_prerequisites(&[Dependency::Uv, Dependency::Nrfutil])
        .await
        .unwrap();

    let names: Vec<&str> = missing.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["nrfutil"]);
    assert!(harness.ctx.env.search_path().is_empty());
    assert!(!harness.exec.ran("choco.exe install"));
    assert!(!harness.exec.ran("install.ps1"));
    assert!(harness.fetcher.urls().is_empty());
}

#[tokio::test]
async fn test_empty_request_only_checks_manager() {
    let root = tempfile::tempdir().unwrap();
    touch_executable(&root.path().join("choco").join("bin").join("choco.exe"));
    let harness = Harness::new(ScriptedExecutor::new(), windows_env(root.path()));
    let installer = installer_for(Platform::Windows, harness.ctx.clone());

    let missing = installer.check_prerequisites(&[]).await.unwrap();
    assert!(missing.is_empty());
}

#[cfg(unix)]
mod linux {
    use super::*;
    use hubble_install::ProcessEnv;
    use std::path::{Path, PathBuf};

    const JLINK_SYSTEM_PATH: &str = "/opt/SEGGER/JLink/JLinkExe";

    /// A search path holding only a fake `apt-get`, with `HOME` under `root`.
    fn apt_env(root: &Path) -> ProcessEnv {
        let bin = root.join("bin");
        touch_executable(&bin.join("apt-get"));
        ProcessEnv::isolated([bin]).with_var("HOME", root.join("home").to_string_lossy())
    }

    #[tokio::test]
    async fn test_missing_jlink_is_blocked_with_manual_steps() {
        if Path::new(JLINK_SYSTEM_PATH).exists() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let harness = Harness::new(ScriptedExecutor::new(), apt_env(root.path()));
        let installer = installer_for(Platform::Linux, harness.ctx.clone());

        let err = installer
            .check_prerequisites(&[Dependency::Uv, Dependency::SeggerJlink])
            .await
            .unwrap_err();

        match &err {
            ProvisionError::LicenseRestrictedDependency {
                dependency,
                download_url,
                install_commands,
                ..
            } => {
                assert_eq!(*dependency, Dependency::SeggerJlink);
                assert_eq!(download_url, "https://www.segger.com/downloads/jlink/");
                assert_eq!(install_commands.len(), 3);
            }
            other => panic!("expected license restriction, got {other:?}"),
        }
        let fix = err.fix_suggestion();
        assert!(fix.contains("sudo dpkg -i JLink_Linux_*.deb"));
        assert!(fix.contains("sudo dnf install JLink_Linux_*.rpm"));
        assert!(fix.contains("sudo yum install JLink_Linux_*.rpm"));
    }

    #[tokio::test]
    async fn test_install_refuses_jlink_before_running_anything() {
        if Path::new(JLINK_SYSTEM_PATH).exists() {
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let harness = Harness::new(ScriptedExecutor::new(), apt_env(root.path()));
        let installer = installer_for(Platform::Linux, harness.ctx.clone());

        let err = installer
            .install_dependencies(&[Dependency::Uv, Dependency::SeggerJlink])
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::LicenseRestrictedDependency { .. }));
        assert!(harness.exec.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_package_manager_is_rejected() {
        let root = tempfile::tempdir().unwrap();
        let env = ProcessEnv::isolated(Vec::<PathBuf>::new())
            .with_var("HOME", root.path().to_string_lossy());
        let harness = Harness::new(ScriptedExecutor::new(), env);
        let installer = installer_for(Platform::Linux, harness.ctx.clone());

        let err = installer
            .check_prerequisites(&[Dependency::Uv])
            .await
            .unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedPackageManager { .. }));
        assert!(err.fix_suggestion().contains("apt, dnf, yum"));

        let err = installer.install_package_manager().await.unwrap_err();
        assert!(matches!(err, ProvisionError::UnsupportedPackageManager { .. }));
    }

    #[tokio::test]
    async fn test_user_install_of_uv_clears_missing_set() {
        let root = tempfile::tempdir().unwrap();
        let home = root.path().join("home");
        let uv_target = home.join(".local").join("bin").join("uv");
        let script_target = uv_target.clone();
        let exec = ScriptedExecutor::new().on_with(
            "astral.sh/uv/install.sh",
            hubble_install::ExecOutput::ok(""),
            move || touch_executable(&script_target),
        );
        let harness = Harness::new(exec, apt_env(root.path()));
        let installer = installer_for(Platform::Linux, harness.ctx.clone());

        let before = installer.check_prerequisites(&[Dependency::Uv]).await.unwrap();
        let names: Vec<&str> = before.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["uv"]);

        installer.install_package_manager().await.unwrap();
        installer.install_dependencies(&[Dependency::Uv]).await.unwrap();

        let after = installer.check_prerequisites(&[Dependency::Uv]).await.unwrap();
        assert!(after.is_empty());
        assert_eq!(harness.ctx.env.lookup("uv"), Some(uv_target));
        assert!(harness.exec.ran("sh -c curl -LsSf https://astral.sh/uv/install.sh | sh"));
    }
}
