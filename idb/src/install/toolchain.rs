//! Building dumpdecrypted with the local iOS SDK

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::paths::DUMPDECRYPTED_LIBRARY;

#[derive(Error, Debug)]
pub enum ToolchainError {
    #[error("iOS platform tools not found at {0}")]
    PlatformMissing(PathBuf),
    #[error("no iPhoneOS SDK found in {0}")]
    SdkMissing(PathBuf),
    #[error("gcc not found at {0}")]
    CompilerMissing(PathBuf),
    #[error("compiler exited with status {0}")]
    CompileFailed(i32),
    #[error("failed to run the compiler")]
    Io(#[from] std::io::Error),
}

/// Locates the first `iPhoneOS*.sdk` under the platform's SDK directory
async fn find_sdk(platform_dir: &Path) -> Result<PathBuf, ToolchainError> {
    let sdks = platform_dir.join("SDKs");
    let mut entries = match tokio::fs::read_dir(&sdks).await {
        Ok(e) => e,
        Err(_) => return Err(ToolchainError::SdkMissing(sdks)),
    };

    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with("iPhoneOS") && name.ends_with(".sdk") {
            found.push(entry.path());
        }
    }
    found.sort();
    found
        .into_iter()
        .next()
        .ok_or(ToolchainError::SdkMissing(sdks))
}

/// Compiles `dumpdecrypted.c` in `source_dir` into `dumpdecrypted.dylib`
///
/// # Arguments
/// * `platform_dir` - The iPhoneOS platform `Developer` directory of an Xcode install
/// * `source_dir` - Directory holding `dumpdecrypted.c`, the library is written next to it
pub async fn compile_dumpdecrypted(
    platform_dir: &Path,
    source_dir: &Path,
) -> Result<(), ToolchainError> {
    if !tokio::fs::try_exists(platform_dir).await.unwrap_or(false) {
        return Err(ToolchainError::PlatformMissing(platform_dir.to_path_buf()));
    }

    let sdk = find_sdk(platform_dir).await?;
    info!("Found SDK dir: {}", sdk.display());

    let gcc = platform_dir.join("usr").join("bin").join("gcc");
    if !tokio::fs::try_exists(&gcc).await.unwrap_or(false) {
        return Err(ToolchainError::CompilerMissing(gcc));
    }

    let frameworks = sdk.join("System").join("Library").join("Frameworks");
    let private_frameworks = sdk.join("System").join("Library").join("PrivateFrameworks");

    let mut cmd = tokio::process::Command::new(&gcc);
    cmd.current_dir(source_dir)
        // adjust if necessary
        .args(["-arch", "armv7", "-wimplicit", "-isysroot"])
        .arg(&sdk)
        .arg(format!("-F{}", frameworks.display()))
        .arg(format!("-F{}", private_frameworks.display()))
        .args(["-dynamiclib", "-o", DUMPDECRYPTED_LIBRARY, "dumpdecrypted.c"]);
    debug!("Running {cmd:?}");

    let status = cmd.status().await?;
    if !status.success() {
        return Err(ToolchainError::CompileFailed(status.code().unwrap_or(-1)));
    }
    Ok(())
}
