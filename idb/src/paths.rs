//! Fixed remote locations and the local working layout

use std::path::{Path, PathBuf};

/// Where the device keeps installed applications, one directory per app
pub const APPS_ROOT: &str = "/private/var/mobile/Applications";

/// Home directory of root on the device, used as scratch space
pub const REMOTE_HOME: &str = "/var/root";

pub const DUMPDECRYPTED_LIBRARY: &str = "dumpdecrypted.dylib";
/// Install location of the decryption helper, doubles as its marker
pub const DUMPDECRYPTED_REMOTE: &str = "/var/root/dumpdecrypted.dylib";

pub const APT_GET: &str = "/usr/bin/apt-get";
pub const DPKG: &str = "/usr/bin/dpkg";

/// Installed by the `open` package
pub const OPEN_BINARY: &str = "/usr/bin/open";
pub const OPEN_PACKAGE: &str = "com.conradkramer.open";

pub const KILLSWITCH_DEB: &str = "com.isecpartners.nabla.sslkillswitch_v0.5-iOS_6.1.deb";
pub const KILLSWITCH_REMOTE_DEB: &str =
    "/var/root/com.isecpartners.nabla.sslkillswitch_v0.5-iOS_6.1.deb";
/// Substrate tweak dropped by the killswitch package
pub const KILLSWITCH_MARKER: &str = "/Library/MobileSubstrate/DynamicLibraries/SSLKillSwitch.dylib";

pub const ARCHIVE_REMOTE: &str = "/var/root/app_archive.tar.gz";

pub const DEFAULT_PLATFORM_DIR: &str =
    "/Applications/Xcode.app/Contents/Developer/Platforms/iPhoneOS.platform/Developer";

/// Local directories the tool reads artifacts from and writes results to
#[derive(Clone, Debug)]
pub struct LocalLayout {
    /// Scratch space, one sub-directory per app
    pub work_dir: PathBuf,
    /// Bundled third party tooling
    pub utils_dir: PathBuf,
    /// iPhoneOS platform directory of the local Xcode install
    pub platform_dir: PathBuf,
}

impl Default for LocalLayout {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("tmp"),
            utils_dir: PathBuf::from("utils"),
            platform_dir: PathBuf::from(DEFAULT_PLATFORM_DIR),
        }
    }
}

impl LocalLayout {
    /// Per-app scratch directory, named after the app's identifier on the device
    pub fn app_dir(&self, app_id: &str) -> PathBuf {
        self.work_dir.join(app_id)
    }

    pub fn killswitch_deb(&self) -> PathBuf {
        self.utils_dir.join("ios-ssl-kill-switch").join(KILLSWITCH_DEB)
    }

    pub fn dumpdecrypted_dir(&self) -> PathBuf {
        self.utils_dir.join("dumpdecrypted")
    }

    pub fn dumpdecrypted_library(&self) -> PathBuf {
        self.dumpdecrypted_dir().join(DUMPDECRYPTED_LIBRARY)
    }

    pub fn with_work_dir(mut self, work_dir: impl AsRef<Path>) -> Self {
        self.work_dir = work_dir.as_ref().to_path_buf();
        self
    }

    pub fn with_utils_dir(mut self, utils_dir: impl AsRef<Path>) -> Self {
        self.utils_dir = utils_dir.as_ref().to_path_buf();
        self
    }

    pub fn with_platform_dir(mut self, platform_dir: impl AsRef<Path>) -> Self {
        self.platform_dir = platform_dir.as_ref().to_path_buf();
        self
    }
}
