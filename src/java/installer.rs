// Installing a missing Java runtime through the platform package manager

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use log::info;

use crate::constants::PACKAGE_INSTALL_TIMEOUT;
use crate::error::{ProvisionError, ProvisionResult};
use crate::process::ScopedProcess;
use crate::reporter::Reporter;

/// Something able to put a Java runtime of a given major on this machine.
#[async_trait]
pub trait RuntimeInstaller: Send + Sync {
    fn name(&self) -> &str;

    async fn install(&self, major: u32, reporter: &dyn Reporter) -> ProvisionResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Pacman,
    Zypper,
    Brew,
}

impl PackageManager {
    /// Preference order when several are present
    pub const ALL: [PackageManager; 5] = [
        PackageManager::Apt,
        PackageManager::Dnf,
        PackageManager::Pacman,
        PackageManager::Zypper,
        PackageManager::Brew,
    ];

    pub fn binary(&self) -> &'static str {
        match self {
            PackageManager::Apt => "apt-get",
            PackageManager::Dnf => "dnf",
            PackageManager::Pacman => "pacman",
            PackageManager::Zypper => "zypper",
            PackageManager::Brew => "brew",
        }
    }

    /// Distribution package providing a headless-capable JDK of `major`.
    pub fn package_name(&self, major: u32) -> String {
        match (self, major) {
            (PackageManager::Apt, n) => format!("openjdk-{}-jdk", n),
            (PackageManager::Dnf, 8) => "java-1.8.0-openjdk".to_string(),
            (PackageManager::Dnf, n) => format!("java-{}-openjdk", n),
            (PackageManager::Pacman, n) => format!("jdk{}-openjdk", n),
            (PackageManager::Zypper, 8) => "java-1_8_0-openjdk".to_string(),
            (PackageManager::Zypper, n) => format!("java-{}-openjdk", n),
            (PackageManager::Brew, n) => format!("openjdk@{}", n),
        }
    }

    /// Non-interactive install arguments, without the program itself.
    pub fn install_args(&self, major: u32) -> Vec<String> {
        let package = self.package_name(major);
        let args: &[&str] = match self {
            PackageManager::Apt => &["install", "-y"],
            PackageManager::Dnf => &["install", "-y"],
            PackageManager::Pacman => &["-S", "--noconfirm", "--needed"],
            PackageManager::Zypper => &["--non-interactive", "install"],
            PackageManager::Brew => &["install"],
        };
        args.iter()
            .map(|a| a.to_string())
            .chain(std::iter::once(package))
            .collect()
    }

    /// Homebrew refuses to run as root; everything else needs it.
    fn needs_root(&self) -> bool {
        !matches!(self, PackageManager::Brew)
    }
}

/// Run `<manager> install <jdk package>` as a scoped process.
pub struct SystemPackageManager {
    manager: PackageManager,
    program: PathBuf,
    /// Prefix with `sudo -n` (never prompts; fails instead)
    use_sudo: bool,
    timeout: Duration,
}

impl SystemPackageManager {
    /// First supported package manager found on PATH.
    pub fn detect() -> Option<Self> {
        PackageManager::ALL.into_iter().find_map(|manager| {
            let program = which::which(manager.binary()).ok()?;
            Some(Self {
                manager,
                program,
                use_sudo: manager.needs_root() && !running_as_root(),
                timeout: PACKAGE_INSTALL_TIMEOUT,
            })
        })
    }

    pub fn with_program(manager: PackageManager, program: impl Into<PathBuf>) -> Self {
        Self {
            manager,
            program: program.into(),
            use_sudo: false,
            timeout: PACKAGE_INSTALL_TIMEOUT,
        }
    }

    pub fn manager(&self) -> PackageManager {
        self.manager
    }

    fn command(&self, major: u32) -> ScopedProcess {
        let args = self.manager.install_args(major);
        let process = if self.use_sudo {
            ScopedProcess::new("sudo", self.timeout)
                .arg("-n")
                .arg(self.program.display().to_string())
                .args(args)
        } else {
            ScopedProcess::new(&self.program, self.timeout).args(args)
        };
        process.label(self.manager.binary())
    }
}

#[async_trait]
impl RuntimeInstaller for SystemPackageManager {
    fn name(&self) -> &str {
        self.manager.binary()
    }

    async fn install(&self, major: u32, reporter: &dyn Reporter) -> ProvisionResult<()> {
        let package = self.manager.package_name(major);
        info!("Installing {} with {}", package, self.manager.binary());
        reporter.step(&format!("Installing Java {} ({})", major, package));

        let output = self
            .command(major)
            .run(reporter)
            .await
            .map_err(|e| ProvisionError::JavaInstallationFailed {
                major,
                cause: e.to_string(),
            })?;

        if !output.success() {
            let mut cause = match output.exit_code {
                Some(code) => format!("{} exited with code {}", self.manager.binary(), code),
                None => format!("{} was terminated by a signal", self.manager.binary()),
            };
            if let Some(last) = output.tail.last() {
                cause.push_str(": ");
                cause.push_str(last);
            }
            return Err(ProvisionError::JavaInstallationFailed { major, cause });
        }

        Ok(())
    }
}

#[cfg(target_os = "linux")]
fn running_as_root() -> bool {
    std::fs::read_to_string("/proc/self/status")
        .ok()
        .and_then(|status| {
            status
                .lines()
                .find(|l| l.starts_with("Uid:"))
                .and_then(|l| l.split_whitespace().nth(1))
                .map(|uid| uid == "0")
        })
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn running_as_root() -> bool {
    std::env::var("USER").is_ok_and(|u| u == "root")
}
