//! Integration tests for dependency installation.

mod common;

use common::{home_env, touch_executable, Harness, ScriptedExecutor};
use hubble_install::install::silent::SilentInstall;
use hubble_install::install::{install_all, Concurrency, InstallRecipe, InstallStep};
use hubble_install::{
    CommandSpec, Dependency, ExecOutput, ExecutableLocator, LocateStrategy, ProvisionError,
    ProvisionEvent,
};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A recipe whose probe only looks at `bin/<executable>` and whose step
/// runs `fake-installer <dependency>`.
fn recipe(dependency: Dependency, bin: &Path) -> InstallRecipe {
    let name = dependency.executable_name();
    let probe = ExecutableLocator::new(name)
        .then(LocateStrategy::Candidates(vec![bin.join(name)]));
    let step = CommandSpec::new("fake-installer").arg(dependency.to_string());
    InstallRecipe::new(dependency, probe, InstallStep::Command(step))
}

fn installs(bin: &Path, dependency: Dependency) -> impl Fn() + Send + Sync + 'static {
    let target = bin.join(dependency.executable_name());
    move || touch_executable(&target)
}

#[tokio::test]
async fn test_parallel_wave_runs_every_task_and_reports_failure() {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    let exec = ScriptedExecutor::new()
        .on("fake-installer uv", ExecOutput::failed(1, "formula not found"))
        .on_with(
            "fake-installer segger-jlink",
            ExecOutput::ok(""),
            installs(&bin, Dependency::SeggerJlink),
        );
    let harness = Harness::new(exec, home_env(root.path()));

    let recipes = vec![
        recipe(Dependency::SeggerJlink, &bin),
        recipe(Dependency::Nrfutil, &bin),
        recipe(Dependency::Uv, &bin),
    ];
    let err = install_all(&harness.ctx, recipes, Concurrency::Parallel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::DependencyInstallFailed {
            dependency: Dependency::Uv,
            exit_code: Some(1),
            ..
        }
    ));
    assert!(err.fix_suggestion().contains("fake-installer uv"));

    // The sibling in the same wave still ran to completion.
    assert!(harness.exec.ran("fake-installer segger-jlink"));
    assert!(harness.events().contains(&ProvisionEvent::Installed {
        dependency: Dependency::SeggerJlink
    }));
    // nrfutil needs uv, so its wave never started.
    assert!(!harness.exec.ran("fake-installer nrfutil"));
}

#[tokio::test]
async fn test_parallel_installs_requirement_before_dependent() {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    let exec = ScriptedExecutor::new()
        .on_with("fake-installer uv", ExecOutput::ok(""), installs(&bin, Dependency::Uv))
        .on_with(
            "fake-installer nrfutil",
            ExecOutput::ok(""),
            installs(&bin, Dependency::Nrfutil),
        );
    let harness = Harness::new(exec, home_env(root.path()));

    let recipes = vec![recipe(Dependency::Nrfutil, &bin), recipe(Dependency::Uv, &bin)];
    install_all(&harness.ctx, recipes, Concurrency::Parallel)
        .await
        .unwrap();

    assert_eq!(
        harness.exec.calls(),
        vec!["fake-installer uv", "fake-installer nrfutil"]
    );
}

#[tokio::test]
async fn test_sequential_stops_at_first_failure() {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    let exec = ScriptedExecutor::new().on("fake-installer uv", ExecOutput::failed(2, ""));
    let harness = Harness::new(exec, home_env(root.path()));

    let recipes = vec![recipe(Dependency::Nrfutil, &bin), recipe(Dependency::Uv, &bin)];
    let err = install_all(&harness.ctx, recipes, Concurrency::Sequential)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::DependencyInstallFailed {
            dependency: Dependency::Uv,
            ..
        }
    ));
    assert_eq!(harness.exec.calls(), vec!["fake-installer uv"]);
}

#[tokio::test]
async fn test_present_dependency_is_not_reinstalled() {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    touch_executable(&bin.join("uv"));
    let harness = Harness::new(ScriptedExecutor::new(), home_env(root.path()));

    install_all(
        &harness.ctx,
        vec![recipe(Dependency::Uv, &bin)],
        Concurrency::Sequential,
    )
    .await
    .unwrap();

    assert!(harness.exec.calls().is_empty());
    assert_eq!(
        harness.events(),
        vec![ProvisionEvent::AlreadyInstalled {
            dependency: Dependency::Uv
        }]
    );
    // Found outside the search path, so its directory is exposed.
    assert_eq!(harness.ctx.env.search_path(), vec![bin]);
}

#[tokio::test]
async fn test_reboot_exit_code_is_reboot_required() {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    let exec = ScriptedExecutor::new().on("fake-installer uv", ExecOutput::failed(3010, ""));
    let harness = Harness::new(exec, home_env(root.path()));

    let err = install_all(
        &harness.ctx,
        vec![recipe(Dependency::Uv, &bin).reboot_aware()],
        Concurrency::Sequential,
    )
    .await
    .unwrap_err();

    assert!(err.is_reboot_required());
    assert!(err.fix_suggestion().contains("Reboot"));
}

#[tokio::test]
async fn test_reboot_exit_code_without_reboot_awareness_is_failure() {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    let exec = ScriptedExecutor::new().on("fake-installer uv", ExecOutput::failed(3010, ""));
    let harness = Harness::new(exec, home_env(root.path()));

    let err = install_all(
        &harness.ctx,
        vec![recipe(Dependency::Uv, &bin)],
        Concurrency::Sequential,
    )
    .await
    .unwrap_err();

    assert!(!err.is_reboot_required());
    assert!(matches!(
        err,
        ProvisionError::DependencyInstallFailed {
            exit_code: Some(3010),
            ..
        }
    ));
}

#[tokio::test]
async fn test_successful_command_without_executable_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    let harness = Harness::new(ScriptedExecutor::new(), home_env(root.path()));

    let err = install_all(
        &harness.ctx,
        vec![recipe(Dependency::Uv, &bin)],
        Concurrency::Sequential,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, ProvisionError::ExecutableNotFound { ref name, .. } if name == "uv"));
}

#[tokio::test]
async fn test_binary_download_is_checked_and_exposed() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("tools").join("nrfutil");
    let dest = dir.join("nrfutil");
    let probe = ExecutableLocator::new("nrfutil")
        .then(LocateStrategy::Directory(dir.clone()));
    let step = InstallStep::Binary {
        url: "https://downloads.example/nrfutil".to_string(),
        dest: dest.clone(),
    };
    let harness = Harness::new(ScriptedExecutor::new(), home_env(root.path()));

    install_all(
        &harness.ctx,
        vec![InstallRecipe::new(Dependency::Nrfutil, probe, step)],
        Concurrency::Sequential,
    )
    .await
    .unwrap();

    assert!(dest.is_file());
    assert_eq!(harness.fetcher.urls(), vec!["https://downloads.example/nrfutil"]);
    assert_eq!(
        harness.exec.calls(),
        vec![format!("{} --version", dest.display())]
    );
    assert_eq!(harness.ctx.env.search_path(), vec![dir]);
}

#[tokio::test]
async fn test_binary_that_fails_to_run_is_install_failure() {
    let root = tempfile::tempdir().unwrap();
    let dir = root.path().join("tools");
    let probe = ExecutableLocator::new("nrfutil")
        .then(LocateStrategy::Directory(dir.clone()));
    let step = InstallStep::Binary {
        url: "https://downloads.example/nrfutil".to_string(),
        dest: dir.join("nrfutil"),
    };
    let exec = ScriptedExecutor::new().on("--version", ExecOutput::failed(126, "bad binary"));
    let harness = Harness::new(exec, home_env(root.path()));

    let err = install_all(
        &harness.ctx,
        vec![InstallRecipe::new(Dependency::Nrfutil, probe, step)],
        Concurrency::Sequential,
    )
    .await
    .unwrap_err();

    assert!(matches!(
        err,
        ProvisionError::DependencyInstallFailed {
            dependency: Dependency::Nrfutil,
            ..
        }
    ));
    assert!(err.fix_suggestion().contains("https://downloads.example/nrfutil"));
}

/// The installer was downloaded into a scratch directory that is gone now.
fn assert_scratch_removed(harness: &Harness) {
    let dests = harness.fetcher.dests();
    assert_eq!(dests.len(), 1);
    let scratch = dests[0].parent().unwrap();
    assert!(!scratch.exists(), "{} was left behind", scratch.display());
}

fn vendor_installer(expected: PathBuf) -> SilentInstall {
    SilentInstall {
        url: "https://vendor.example/Setup.exe".to_string(),
        installer_file: "Setup.exe".to_string(),
        primary_flags: vec!["/S".to_string(), "/ACCEPTLICENSE=yes".to_string()],
        fallback_flags: vec!["/q".to_string(), "ACCEPTLICENSE=yes".to_string()],
        expected_paths: vec![expected],
        manual_url: "https://vendor.example/downloads/".to_string(),
    }
}

#[tokio::test]
async fn test_silent_install_falls_back_to_alternate_flags() {
    let root = tempfile::tempdir().unwrap();
    let expected = root.path().join("Vendor").join("JLink.exe");
    let target = expected.clone();
    let exec = ScriptedExecutor::new()
        .on("Setup.exe /S", ExecOutput::failed(1, ""))
        .on_with("Setup.exe /q", ExecOutput::ok(""), move || {
            touch_executable(&target)
        });
    let harness = Harness::new(exec, home_env(root.path()));

    let found = vendor_installer(expected.clone())
        .run(&harness.ctx, Dependency::SeggerJlink)
        .await
        .unwrap();

    assert_eq!(found, expected);
    assert!(harness.events().contains(&ProvisionEvent::RetryingSilentInstall));
    assert_eq!(harness.exec.calls().len(), 2);
    assert_eq!(
        harness.ctx.env.search_path(),
        vec![root.path().join("Vendor")]
    );
    assert_scratch_removed(&harness);
}

#[tokio::test]
async fn test_silent_install_failing_both_ways() {
    let root = tempfile::tempdir().unwrap();
    let exec = ScriptedExecutor::new().on("Setup.exe", ExecOutput::failed(1603, ""));
    let harness = Harness::new(exec, home_env(root.path()));

    let err = vendor_installer(root.path().join("JLink.exe"))
        .run(&harness.ctx, Dependency::SeggerJlink)
        .await
        .unwrap_err();

    match &err {
        ProvisionError::DependencyInstallFailed { message, .. } => {
            assert!(message.contains("both methods"));
        }
        other => panic!("expected install failure, got {other:?}"),
    }
    assert!(err.fix_suggestion().contains("https://vendor.example/downloads/"));
    assert_scratch_removed(&harness);
}

#[tokio::test]
async fn test_silent_install_times_out_waiting_for_binary() {
    let root = tempfile::tempdir().unwrap();
    let harness = Harness::new(ScriptedExecutor::new(), home_env(root.path()));

    let err = vendor_installer(root.path().join("never").join("JLink.exe"))
        .run(&harness.ctx, Dependency::SeggerJlink)
        .await
        .unwrap_err();

    assert!(matches!(err, ProvisionError::InstallVerificationTimeout { .. }));
    assert_scratch_removed(&harness);
}

#[tokio::test]
async fn test_silent_install_wait_is_bounded_with_zero_interval() {
    let root = tempfile::tempdir().unwrap();
    let harness = Harness::new(ScriptedExecutor::new(), home_env(root.path()));
    let mut ctx = harness.ctx.clone();
    ctx.options.poll_interval = Duration::ZERO;
    ctx.options.poll_timeout = Duration::from_millis(100);

    let installer = vendor_installer(root.path().join("never").join("JLink.exe"));
    let run = installer.run(&ctx, Dependency::SeggerJlink);
    let err = tokio::time::timeout(Duration::from_secs(3), run)
        .await
        .expect("wait for the binary did not respect its timeout")
        .unwrap_err();

    match err {
        ProvisionError::InstallVerificationTimeout { waited, .. } => {
            assert!(waited >= Duration::from_millis(100));
        }
        other => panic!("expected verification timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_silent_install_reboot_code_after_verification() {
    let root = tempfile::tempdir().unwrap();
    let expected = root.path().join("JLink.exe");
    let target = expected.clone();
    let exec = ScriptedExecutor::new().on_with("Setup.exe /S", ExecOutput::failed(3010, ""), move || {
        touch_executable(&target)
    });
    let harness = Harness::new(exec, home_env(root.path()));

    let err = vendor_installer(expected)
        .run(&harness.ctx, Dependency::SeggerJlink)
        .await
        .unwrap_err();

    assert!(err.is_reboot_required());
    assert!(harness.events().contains(&ProvisionEvent::Verifying {
        dependency: Dependency::SeggerJlink
    }));
}
