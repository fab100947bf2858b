// idb - drive a jailbroken iOS device over SSH

use std::{io::Write, path::PathBuf};

use clap::{Arg, ArgAction, value_parser};
use idb::{AppContext, Command, CommandError, IdbError};
use tracing_subscriber::EnvFilter;

mod common;
mod dispatch;
mod prompt;

use dispatch::{Device, Flow, dispatch};
use prompt::StdinPrompt;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let matches = clap::Command::new("idb")
        .about("Drive a jailbroken iOS device over SSH")
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("IP address or host name of the device")
                .required_unless_present("about"),
        )
        .arg(
            Arg::new("port")
                .long("port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("SSH port of the device [default: 22]"),
        )
        .arg(
            Arg::new("username")
                .long("username")
                .value_name("USER")
                .help("SSH user [default: root]"),
        )
        .arg(
            Arg::new("password")
                .long("password")
                .value_name("PASSWORD")
                .help("SSH password, falls back to IDB_PASSWORD"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("SECONDS")
                .value_parser(value_parser!(u64))
                .help("Connect timeout in seconds"),
        )
        .arg(
            Arg::new("work_dir")
                .long("work-dir")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Local directory downloads are written to [default: tmp]"),
        )
        .arg(
            Arg::new("utils_dir")
                .long("utils-dir")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Local directory holding killswitch and dumpdecrypted [default: utils]"),
        )
        .arg(
            Arg::new("platform_dir")
                .long("platform-dir")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("iPhoneOS platform Developer directory used to compile dumpdecrypted"),
        )
        .arg(
            Arg::new("app")
                .long("app")
                .value_name("APP_ID")
                .help("Select this app before running anything"),
        )
        .arg(
            Arg::new("about")
                .long("about")
                .help("Show about information")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("command")
                .value_name("COMMAND")
                .num_args(1..)
                .trailing_var_arg(true)
                .help("Command to run, e.g. `install open`. Starts a shell when omitted"),
        )
        .get_matches();

    if matches.get_flag("about") {
        println!("idb - iOS pentesting over SSH");
        println!("Version {}", env!("CARGO_PKG_VERSION"));
        return;
    }

    let config = match common::ssh_config(&matches) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    let session = match common::connect(config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let mut device = Device {
        session,
        apps: AppContext::new(),
        layout: common::local_layout(&matches),
    };
    if let Some(id) = matches.get_one::<String>("app") {
        device.apps.select_app(id.clone());
    }
    let mut prompt = StdinPrompt;

    if let Some(words) = matches.get_many::<String>("command") {
        let line = words.cloned().collect::<Vec<_>>().join(" ");
        if run_line(&mut device, &mut prompt, &line).await == Flow::Terminate {
            std::process::exit(0);
        }
        return;
    }

    println!("Connected to {}. Type `help` for commands.", device.session.label());
    loop {
        print!("idb> ");
        std::io::stdout().flush().ok();
        let Some(line) = prompt::read_line() else {
            break;
        };
        match run_line(&mut device, &mut prompt, &line).await {
            Flow::Continue => {}
            Flow::Exit => break,
            Flow::Terminate => std::process::exit(0),
        }
    }
}

/// Parses and runs one line, reporting every failure to the operator
async fn run_line<S: idb::RemoteSession>(
    device: &mut Device<S>,
    prompt: &mut StdinPrompt,
    line: &str,
) -> Flow {
    let command = match Command::parse(line) {
        Ok(c) => c,
        Err(CommandError::Empty) => return Flow::Continue,
        Err(e) => {
            println!("{e}");
            return Flow::Continue;
        }
    };

    match dispatch(device, prompt, command).await {
        Ok(flow) => flow,
        Err(IdbError::NoAppSelected) => {
            eprintln!("No app selected. Use `app list` and `app select <id>` first.");
            Flow::Continue
        }
        Err(e) if e.is_connectivity() => {
            eprintln!("Lost connection to the device: {e}");
            Flow::Continue
        }
        Err(e) => {
            eprintln!("{e}");
            Flow::Continue
        }
    }
}
