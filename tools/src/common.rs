// Common functions between the CLI modules

use std::{path::PathBuf, time::Duration};

use clap::ArgMatches;
use idb::{
    LocalLayout,
    ssh::{SshConfig, SshSession},
};

/// Password used when neither `--password` nor `IDB_PASSWORD` is given
const DEFAULT_PASSWORD: &str = "alpine";

pub fn ssh_config(matches: &ArgMatches) -> Result<SshConfig, String> {
    let host = match matches.get_one::<String>("host") {
        Some(h) => h,
        None => return Err("No host passed, pass -h for help".to_string()),
    };
    let password = match matches.get_one::<String>("password") {
        Some(p) => p.clone(),
        None => std::env::var("IDB_PASSWORD").unwrap_or_else(|_| DEFAULT_PASSWORD.to_string()),
    };

    let mut config = SshConfig::new(host, password);
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(username) = matches.get_one::<String>("username") {
        config.username = username.clone();
    }
    if let Some(timeout) = matches.get_one::<u64>("timeout") {
        config.connect_timeout = Duration::from_secs(*timeout);
    }
    Ok(config)
}

pub fn local_layout(matches: &ArgMatches) -> LocalLayout {
    let mut layout = LocalLayout::default();
    if let Some(dir) = matches.get_one::<PathBuf>("work_dir") {
        layout = layout.with_work_dir(dir);
    }
    if let Some(dir) = matches.get_one::<PathBuf>("utils_dir") {
        layout = layout.with_utils_dir(dir);
    }
    if let Some(dir) = matches.get_one::<PathBuf>("platform_dir") {
        layout = layout.with_platform_dir(dir);
    }
    layout
}

pub async fn connect(config: SshConfig) -> Result<SshSession, String> {
    let label = format!("{}@{}:{}", config.username, config.host, config.port);
    match SshSession::connect(config).await {
        Ok(s) => Ok(s),
        Err(e) => Err(format!("Unable to connect to {label}: {e}")),
    }
}
