//! Static table of supported guest package managers.
//!
//! Order matters: detection walks [`REGISTRY`] front to back and the first
//! manager whose binary resolves wins, so the most widespread manager comes
//! first. Everything manager-specific lives in its
//! [`PackageManagerProfile`]; the engine never branches on the manager kind.

use strum::{Display, EnumString};

use super::repair::{KALI_REPAIR, RepositoryRepair};
use crate::error::WslstrapError;
use crate::guest::shell_join;

/// Package providing the configuration-management tool.
pub const CONFIG_TOOL_PACKAGE: &str = "ansible";

/// Command whose presence proves the configuration-management tool is installed.
pub const CONFIG_TOOL_COMMAND: &str = "ansible-playbook";

/// Identity of a package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum PackageManagerKind {
    Apt,
    Dnf,
    Yum,
    Zypper,
    Pacman,
    Apk,
}

/// Follow-up for the configuration tool on managers that ship a reduced build.
#[derive(Debug)]
pub struct PostInstall {
    /// Guest shell snippet that succeeds when the follow-up is already satisfied.
    pub check: &'static str,
    /// Guest shell snippets run in order when `check` fails or right after installation.
    pub steps: &'static [&'static str],
}

/// How to detect and drive one guest package manager.
#[derive(Debug)]
pub struct PackageManagerProfile {
    pub kind: PackageManagerKind,
    /// Binary whose presence identifies this manager.
    pub binary: &'static str,
    /// Index refresh argv, run before the first installation.
    pub update: Option<&'static [&'static str]>,
    /// Best-effort corrective snippet run before retrying a failed refresh.
    pub update_recovery: Option<&'static str>,
    /// Install argv; the package name is appended.
    pub install: &'static [&'static str],
    /// Required guest snippets run before every installation.
    pub pre_install: &'static [&'static str],
    /// Extra work when installing [`CONFIG_TOOL_PACKAGE`].
    pub post_install: Option<PostInstall>,
    /// Manager-specific package names: `(requested, actual)`.
    pub aliases: &'static [(&'static str, &'static str)],
    /// Distribution-specific repository repair run before the first refresh.
    pub repair: Option<&'static RepositoryRepair>,
    pub description: &'static str,
}

impl PackageManagerProfile {
    /// Guest snippet that succeeds iff this manager is installed.
    pub fn detection_probe(&self) -> String {
        format!("command -v {}", self.binary)
    }

    /// Returns the name this manager uses for `package`.
    pub fn package_name<'a>(&self, package: &'a str) -> &'a str {
        self.aliases
            .iter()
            .find(|(requested, _)| *requested == package)
            .map_or(package, |(_, actual)| *actual)
    }

    /// Builds the guest command that installs `package`.
    pub fn install_command(&self, package: &str) -> Result<String, WslstrapError> {
        shell_join(
            self.install
                .iter()
                .copied()
                .chain(std::iter::once(self.package_name(package))),
        )
    }

    /// Builds the guest command that refreshes the package index, if any.
    pub fn update_command(&self) -> Option<Result<String, WslstrapError>> {
        self.update.map(|argv| shell_join(argv.iter().copied()))
    }

    /// Returns the post-install follow-up that applies to `package`, if any.
    pub fn post_install_for(&self, package: &str) -> Option<&PostInstall> {
        if package == CONFIG_TOOL_PACKAGE {
            self.post_install.as_ref()
        } else {
            None
        }
    }
}

/// Supported package managers in detection priority order.
pub static REGISTRY: [PackageManagerProfile; 6] = [
    PackageManagerProfile {
        kind: PackageManagerKind::Apt,
        binary: "apt-get",
        update: Some(&["sudo", "apt-get", "update"]),
        update_recovery: Some(
            "sudo sed -i -e '/^deb cdrom:/s/^/# /' /etc/apt/sources.list \
             && sudo rm -rf /var/lib/apt/lists/partial",
        ),
        install: &["sudo", "DEBIAN_FRONTEND=noninteractive", "apt-get", "install", "-y"],
        pre_install: &[],
        post_install: None,
        aliases: &[],
        repair: Some(&KALI_REPAIR),
        description: "Ubuntu/Debian/Kali",
    },
    PackageManagerProfile {
        kind: PackageManagerKind::Dnf,
        binary: "dnf",
        update: None,
        update_recovery: None,
        install: &["sudo", "dnf", "install", "-y"],
        pre_install: &[
            "sudo dnf install -y python3-libdnf5 || sudo dnf install -y python3-dnf",
            "sudo dnf install -y epel-release || sudo dnf install -y oracle-epel-release-el9 || true",
        ],
        post_install: Some(PostInstall {
            check: "ansible-galaxy collection list community.general 2>/dev/null \
                    | grep -q community.general",
            steps: &["ansible-galaxy collection install community.general"],
        }),
        aliases: &[("ansible", "ansible-core")],
        repair: None,
        description: "Fedora/Oracle Linux/RHEL 8+",
    },
    PackageManagerProfile {
        kind: PackageManagerKind::Yum,
        binary: "yum",
        update: None,
        update_recovery: None,
        install: &["sudo", "yum", "install", "-y"],
        pre_install: &[
            "sudo yum install -y epel-release || sudo yum install -y oracle-epel-release-el7",
        ],
        post_install: None,
        aliases: &[],
        repair: None,
        description: "RHEL/CentOS/Oracle Linux 7",
    },
    PackageManagerProfile {
        kind: PackageManagerKind::Zypper,
        binary: "zypper",
        update: None,
        update_recovery: None,
        install: &["sudo", "zypper", "--non-interactive", "install"],
        pre_install: &[],
        post_install: None,
        aliases: &[],
        repair: None,
        description: "openSUSE",
    },
    PackageManagerProfile {
        kind: PackageManagerKind::Pacman,
        binary: "pacman",
        update: None,
        update_recovery: None,
        install: &["sudo", "pacman", "-S", "--noconfirm", "--needed"],
        pre_install: &[],
        post_install: None,
        aliases: &[],
        repair: None,
        description: "Arch Linux",
    },
    PackageManagerProfile {
        kind: PackageManagerKind::Apk,
        binary: "apk",
        update: None,
        update_recovery: None,
        install: &["sudo", "apk", "add"],
        pre_install: &[],
        post_install: None,
        aliases: &[],
        repair: None,
        description: "Alpine Linux",
    },
];

/// Returns the profile for `kind`.
pub fn profile(kind: PackageManagerKind) -> &'static PackageManagerProfile {
    REGISTRY
        .iter()
        .find(|p| p.kind == kind)
        .unwrap_or(&REGISTRY[0])
}
