//! Tests for package manager detection, repository repair and package installation.

mod helpers;

use std::sync::Arc;
use std::thread;

use wslstrap::error::{PackageStage, WslstrapError};
use wslstrap::guest::GuestShell;
use wslstrap::package::{
    DetectionMemo, KALI_REPAIR, PackageEngine, PackageManagerDetector, PackageManagerKind,
    RepairOutcome,
};

use crate::helpers::{MockExecutor, fail};

const GUEST: &str = "Ubuntu";

fn shell(mock: &Arc<MockExecutor>) -> GuestShell {
    GuestShell::new(mock.clone(), "wsl.exe")
}

fn engine(mock: &Arc<MockExecutor>) -> PackageEngine {
    PackageEngine::new(shell(mock), DetectionMemo::new())
}

/// Configures the mock as a Debian-family guest without Kali.
fn debian_guest(mock: &MockExecutor) {
    mock.on("grep -qi kali", fail(1));
}

/// Configures the mock as a dnf guest.
fn fedora_guest(mock: &MockExecutor) {
    mock.on("command -v apt-get", fail(1));
}

// =============================================================================
// Detection
// =============================================================================

#[test]
fn test_detect_picks_first_matching_manager() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("command -v apt-get", fail(1));
    mock.on("command -v dnf", fail(1));

    let detector = PackageManagerDetector::new(shell(&mock), DetectionMemo::new());
    let profile = detector.detect(GUEST).unwrap();
    assert_eq!(profile.kind, PackageManagerKind::Yum);
    assert_eq!(
        mock.scripts(),
        ["command -v apt-get", "command -v dnf", "command -v yum"]
    );
}

#[test]
fn test_detect_is_memoized() {
    let mock = Arc::new(MockExecutor::new());
    let detector = PackageManagerDetector::new(shell(&mock), DetectionMemo::new());

    let first = detector.detect(GUEST).unwrap();
    let probes = mock.call_count();
    let second = detector.detect(GUEST).unwrap();

    assert_eq!(first.kind, second.kind);
    assert_eq!(mock.call_count(), probes, "second detection must not probe");
}

#[test]
fn test_memo_is_per_guest_and_shared_between_detectors() {
    let mock = Arc::new(MockExecutor::new());
    let memo = DetectionMemo::new();
    let first = PackageManagerDetector::new(shell(&mock), memo.clone());
    let second = PackageManagerDetector::new(shell(&mock), memo.clone());

    first.detect("Ubuntu").unwrap();
    let after_first = mock.call_count();
    second.detect("Ubuntu").unwrap();
    assert_eq!(mock.call_count(), after_first);

    second.detect("Debian").unwrap();
    assert!(mock.call_count() > after_first);
    assert_eq!(memo.len(), 2);
}

#[test]
fn test_detect_no_supported_manager() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("command -v", fail(127));

    let detector = PackageManagerDetector::new(shell(&mock), DetectionMemo::new());
    let err = detector.detect("Mystery").unwrap_err();
    assert!(matches!(err, WslstrapError::NoSupportedManager { ref guest } if guest == "Mystery"));
    assert_eq!(mock.call_count(), 6, "every registry entry should be probed once");
    assert!(detector.memo().is_empty());
}

#[test]
fn test_concurrent_detection_agrees() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("command -v apt-get", fail(1));
    let detector = PackageManagerDetector::new(shell(&mock), DetectionMemo::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let detector = detector.clone();
            let guest = if i % 2 == 0 { "Fedora" } else { "Oracle" };
            thread::spawn(move || detector.detect(guest).map(|p| p.kind))
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap().unwrap(), PackageManagerKind::Dnf);
    }
    assert_eq!(detector.memo().len(), 2);
}

// =============================================================================
// ensure_package
// =============================================================================

#[test]
fn test_ensure_installs_missing_package_on_debian() {
    let mock = Arc::new(MockExecutor::new());
    debian_guest(&mock);
    mock.on("command -v git", fail(1));

    engine(&mock).ensure_package(GUEST, "git", "git").unwrap();

    let scripts = mock.scripts();
    assert_eq!(
        &scripts[..4],
        [
            "command -v git",
            "command -v apt-get",
            "grep -qi kali /etc/os-release",
            "sudo apt-get update"
        ]
    );
    assert_eq!(scripts.len(), 5);
    assert!(scripts[4].ends_with("apt-get install -y git"), "install: {}", scripts[4]);
    assert_eq!(mock.count_matching("apt-get update"), 1);
    assert_eq!(mock.count_matching("install -y git"), 1);
}

#[test]
fn test_ensure_is_idempotent_for_present_package() {
    let mock = Arc::new(MockExecutor::new());
    let engine = engine(&mock);

    engine.ensure_package(GUEST, "git", "git").unwrap();
    engine.ensure_package(GUEST, "git", "git").unwrap();

    assert_eq!(mock.scripts(), ["command -v git", "command -v git"]);
    assert_eq!(mock.count_matching("install"), 0);
}

#[test]
fn test_ensure_streams_install_output() {
    let mock = Arc::new(MockExecutor::new());
    debian_guest(&mock);
    mock.on("command -v curl", fail(1));

    engine(&mock).ensure_package(GUEST, "curl", "curl").unwrap();

    let install = mock
        .calls()
        .into_iter()
        .find(|spec| spec.command_line().contains("install -y curl"))
        .unwrap();
    assert_eq!(install.output, wslstrap::executor::OutputMode::Inherit);
    assert_eq!(install.args[..4], ["-d", GUEST, "bash", "-c"]);
}

#[test]
fn test_update_is_retried_once_after_recovery() {
    let mock = Arc::new(MockExecutor::new());
    debian_guest(&mock);
    mock.on("command -v git", fail(1));
    mock.once("sudo apt-get update", fail(100));

    engine(&mock).ensure_package(GUEST, "git", "git").unwrap();

    let scripts = mock.scripts();
    let updates: Vec<usize> = scripts
        .iter()
        .enumerate()
        .filter(|(_, s)| s.as_str() == "sudo apt-get update")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(updates.len(), 2);
    assert!(scripts[updates[0] + 1].contains("deb cdrom:"), "recovery should run between attempts");
    assert_eq!(updates[1], updates[0] + 2);
    assert!(scripts.last().unwrap().ends_with("install -y git"));
}

#[test]
fn test_update_failing_twice_is_fatal() {
    let mock = Arc::new(MockExecutor::new());
    debian_guest(&mock);
    mock.on("command -v git", fail(1));
    mock.on("sudo apt-get update", fail(100));

    let err = engine(&mock).ensure_package(GUEST, "git", "git").unwrap_err();
    assert!(matches!(err, WslstrapError::Package { stage: PackageStage::Refresh, .. }));
    assert_eq!(mock.count_matching("sudo apt-get update"), 2);
    assert_eq!(mock.count_matching("install -y git"), 0);
}

#[test]
fn test_ensure_without_manager_fails_at_detection() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("command -v", fail(127));

    let err = engine(&mock).ensure_package(GUEST, "git", "git").unwrap_err();
    match err {
        WslstrapError::Package { stage, package, message, .. } => {
            assert_eq!(stage, PackageStage::Detection);
            assert_eq!(package, "git");
            assert!(message.contains("could not detect"), "message: {}", message);
        }
        other => panic!("expected detection failure, got {:?}", other),
    }
}

#[test]
fn test_install_failure_is_reported_with_stage() {
    let mock = Arc::new(MockExecutor::new());
    debian_guest(&mock);
    mock.on("command -v htop", fail(1));
    mock.on("install -y htop", fail(100));

    let err = engine(&mock).ensure_package(GUEST, "htop", "htop").unwrap_err();
    assert!(matches!(
        err,
        WslstrapError::Package { stage: PackageStage::Install, ref guest, .. } if guest == GUEST
    ));
}

// =============================================================================
// dnf specifics
// =============================================================================

#[test]
fn test_dnf_installs_ansible_core_with_pre_and_post_steps() {
    let mock = Arc::new(MockExecutor::new());
    fedora_guest(&mock);
    mock.on("command -v ansible-playbook", fail(1));

    engine(&mock)
        .ensure_package("Fedora", "ansible-playbook", "ansible")
        .unwrap();

    let scripts = mock.scripts();
    assert_eq!(scripts[..3], ["command -v ansible-playbook", "command -v apt-get", "command -v dnf"]);
    assert!(scripts[3].contains("python3-libdnf5"));
    assert!(scripts[4].contains("epel-release"));
    assert_eq!(scripts[5], "sudo dnf install -y ansible-core");
    assert_eq!(scripts[6], "ansible-galaxy collection install community.general");
    assert_eq!(scripts.len(), 7, "dnf has no index refresh or repair: {:?}", scripts);
}

#[test]
fn test_present_ansible_still_gets_missing_collection() {
    let mock = Arc::new(MockExecutor::new());
    fedora_guest(&mock);
    mock.on("ansible-galaxy collection list", fail(1));

    engine(&mock)
        .ensure_package("Fedora", "ansible-playbook", "ansible")
        .unwrap();

    assert_eq!(mock.count_matching("ansible-galaxy collection install community.general"), 1);
    assert_eq!(mock.count_matching("dnf install"), 0);
}

#[test]
fn test_present_ansible_with_collection_is_untouched() {
    let mock = Arc::new(MockExecutor::new());
    fedora_guest(&mock);

    engine(&mock)
        .ensure_package("Fedora", "ansible-playbook", "ansible")
        .unwrap();

    assert_eq!(mock.count_matching("ansible-galaxy collection install"), 0);
}

#[test]
fn test_pre_install_failure_is_fatal() {
    let mock = Arc::new(MockExecutor::new());
    fedora_guest(&mock);
    mock.on("command -v ansible-playbook", fail(1));
    mock.on("python3-libdnf5", fail(1));

    let err = engine(&mock)
        .ensure_package("Fedora", "ansible-playbook", "ansible")
        .unwrap_err();
    assert!(matches!(err, WslstrapError::Package { stage: PackageStage::PreInstall, .. }));
    assert_eq!(mock.count_matching("ansible-core"), 0);
}

#[test]
fn test_post_install_failure_is_fatal() {
    let mock = Arc::new(MockExecutor::new());
    fedora_guest(&mock);
    mock.on("command -v ansible-playbook", fail(1));
    mock.on("ansible-galaxy collection install", fail(1));

    let err = engine(&mock)
        .ensure_package("Fedora", "ansible-playbook", "ansible")
        .unwrap_err();
    assert!(matches!(err, WslstrapError::Package { stage: PackageStage::PostInstall, .. }));
}

#[test]
fn test_install_package_skips_presence_probe() {
    let mock = Arc::new(MockExecutor::new());
    engine(&mock).install_package(GUEST, "git").unwrap();

    let scripts = mock.scripts();
    assert_eq!(scripts[0], "command -v apt-get");
    assert!(scripts[1].ends_with("install -y git"));
    assert_eq!(scripts.len(), 2);
}

// =============================================================================
// Kali repository repair
// =============================================================================

#[test]
fn test_kali_guest_is_repaired_before_install() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("command -v git", fail(1));

    engine(&mock).ensure_package("kali-linux", "git", "git").unwrap();

    let scripts = mock.scripts();
    let fingerprint = scripts.iter().position(|s| s.contains("grep -qi kali")).unwrap();
    assert!(scripts[fingerprint + 1].contains("sources.list.bak"));
    assert!(scripts[fingerprint + 2].contains("kali-rolling"));
    assert!(scripts[fingerprint + 3].contains("gpg --dearmor"));
    assert_eq!(scripts[fingerprint + 4], "sudo apt-get update");
    assert!(scripts[fingerprint + 5].contains("kali-archive-keyring"));
    assert!(scripts[fingerprint + 6].ends_with("install -y git"));
    assert_eq!(mock.count_matching("sudo apt-get update"), 1, "repair already refreshed the index");
}

#[test]
fn test_kali_backup_failure_only_warns() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("sources.list.bak", fail(1));

    let outcome = KALI_REPAIR.repair_if_needed(&shell(&mock), "kali-linux").unwrap();
    assert_eq!(outcome, RepairOutcome::Repaired);
    assert_eq!(mock.count_matching("kali-archive-keyring"), 3);
}

#[test]
fn test_kali_repair_stops_at_failed_step() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("curl -fsSL", fail(22));

    let err = KALI_REPAIR.repair_if_needed(&shell(&mock), "kali-linux").unwrap_err();
    assert!(matches!(
        err,
        WslstrapError::RepairFailed { step: "fetch archive signing key", .. }
    ));
    assert_eq!(mock.count_matching("apt-get update"), 0);
}

#[test]
fn test_repair_not_applicable() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("grep -qi kali", fail(1));

    let outcome = KALI_REPAIR.repair_if_needed(&shell(&mock), GUEST).unwrap();
    assert_eq!(outcome, RepairOutcome::NotApplicable);
    assert_eq!(mock.call_count(), 1);
}

#[test]
fn test_repair_failure_aborts_install() {
    let mock = Arc::new(MockExecutor::new());
    mock.on("command -v git", fail(1));
    mock.on("kali-rolling", fail(1));

    let err = engine(&mock).ensure_package("kali-linux", "git", "git").unwrap_err();
    assert!(matches!(err, WslstrapError::RepairFailed { .. }));
    assert_eq!(mock.count_matching("install -y git"), 0);
}
