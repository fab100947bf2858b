//! Info.plist handling
//!
//! Reads the handful of keys the tool needs out of an application's `Info.plist`.

use serde::Deserialize;

use crate::IdbError;

/// What the tool knows about an application from its `Info.plist`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppMetadata {
    /// Name of the main executable inside the `.app` bundle
    pub binary_name: String,
    pub bundle_identifier: String,
    /// Name shown on the home screen, if the bundle declares one
    pub display_name: Option<String>,
    pub version: Option<String>,
    pub minimum_os_version: Option<String>,
}

/// Internal representation of the keys we read
#[derive(Deserialize, Debug)]
struct RawInfoPlist {
    #[serde(rename = "CFBundleExecutable")]
    executable: Option<String>,
    #[serde(rename = "CFBundleIdentifier")]
    identifier: Option<String>,
    #[serde(rename = "CFBundleDisplayName")]
    display_name: Option<String>,
    #[serde(rename = "CFBundleName")]
    name: Option<String>,
    #[serde(rename = "CFBundleShortVersionString")]
    short_version: Option<String>,
    #[serde(rename = "CFBundleVersion")]
    version: Option<String>,
    #[serde(rename = "MinimumOSVersion")]
    minimum_os_version: Option<String>,
}

impl AppMetadata {
    /// Parses an `Info.plist` from raw bytes
    ///
    /// Both XML and binary plists are accepted.
    ///
    /// # Errors
    /// `MissingPlistKey` when the executable or bundle identifier is absent
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdbError> {
        let raw: RawInfoPlist = plist::from_bytes(bytes)?;
        Ok(Self {
            binary_name: raw
                .executable
                .ok_or(IdbError::MissingPlistKey("CFBundleExecutable"))?,
            bundle_identifier: raw
                .identifier
                .ok_or(IdbError::MissingPlistKey("CFBundleIdentifier"))?,
            display_name: raw.display_name.or(raw.name),
            version: raw.short_version.or(raw.version),
            minimum_os_version: raw.minimum_os_version,
        })
    }
}
