use std::{path::PathBuf, process::exit, time::Duration};

use clap::{Parser, Subcommand};
use scom::{prelude::*, protocol::Command};
use session::HostSession;
use tracing_subscriber::EnvFilter;
use util::serial::SerialPorts;

mod config;
mod session;
mod util;

#[derive(Parser)]
#[command(about = "Talks SCOM to a device over a serial port")]
struct CliArgs {
    /// serial port path, `auto` for the first USB port or `simulated` for an in-process device
    #[arg(long, default_value = "simulated", value_parser = SerialPorts::parse)]
    port: SerialPorts,
    #[arg(long, default_value_t = 115200)]
    baud: u32,
    /// directory containing scom.json, defaults are used without it
    #[arg(long)]
    data_dir: Option<PathBuf>,
    /// write the config in use to the data directory
    #[arg(long)]
    save_config: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// open the session and print the link stats
    Ping,
    /// send application values, one at a time
    Send {
        #[arg(allow_negative_numbers = true, required = true)]
        values: Vec<i16>,
    },
    /// send a textual command, e.g. `command led 1`
    Command { body: String, args: Vec<String> },
    /// ask the device for sonar readings
    Sonar {
        #[arg(default_value_t = 5)]
        count: usize,
    },
}

fn run(session: &mut HostSession, command: &Commands) -> Result<(), ScomError> {
    match command {
        Commands::Ping => {}
        Commands::Send { values } => {
            for value in values {
                session.send(*value)?;
                println!("sent {value}");
            }
        }
        Commands::Command { body, args } => {
            let args: Vec<&str> = args.iter().map(String::as_str).collect();
            let command = Command::with_args(body, &args)?;
            session.command(&command)?;
            println!("sent {command}");
        }
        Commands::Sonar { count } => {
            for _ in 0..*count {
                session.command(&Command::new("sonar"))?;
                match session.receive(Duration::from_secs(3))? {
                    Some(distance) => println!("{distance} mm"),
                    None => println!("no reading"),
                }
            }
        }
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let args = CliArgs::parse();

    let config = match &args.data_dir {
        Some(dir) => {
            let config = config::load_config_from_disk(dir);
            if args.save_config {
                config::save_config_to_disk(&config, dir);
            }
            config
        }
        None => ScomConfig::default(),
    };

    let link = match args.port.open(args.baud, config) {
        Ok(link) => link,
        Err(e) => {
            log::error!("{e}");
            exit(1);
        }
    };
    let mut session = match HostSession::connect(link, config) {
        Ok(session) => session,
        Err(e) => {
            log::error!("Could not open the session: {e}");
            exit(1);
        }
    };
    if let Err(e) = run(&mut session, &args.command) {
        log::error!("{e}");
        exit(1);
    }
    println!("{:?}", session.stats());
}
