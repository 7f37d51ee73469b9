//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lightify_core::{Address, Rgba};

/// lightify - Control lights through a Lightify gateway
#[derive(Debug, Parser)]
#[command(name = "lightify")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "LIGHTIFY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Gateway host, overrides the configuration file
    #[arg(long, env = "LIGHTIFY_HOST")]
    pub host: Option<String>,

    /// Gateway port, overrides the configuration file
    #[arg(long)]
    pub port: Option<u16>,

    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
///
/// A TARGET is either a device address (`84:18:26:00:00:0C:8D:9C`) or a
/// group number.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// List paired devices
    Devices,

    /// List groups
    Groups,

    /// Show the current state of one device
    Info {
        #[arg(value_parser = parse_device)]
        device: Address,
    },

    /// Switch a device or group on
    On {
        #[arg(value_parser = parse_target)]
        target: Address,
    },

    /// Switch a device or group off
    Off {
        #[arg(value_parser = parse_target)]
        target: Address,
    },

    /// Set brightness (0-255)
    Luminance {
        #[arg(value_parser = parse_target)]
        target: Address,
        value: u8,
        /// Transition time in tenths of a second
        #[arg(long, short, default_value = "0")]
        transition: u16,
    },

    /// Set color temperature in Kelvin
    Temperature {
        #[arg(value_parser = parse_target)]
        target: Address,
        kelvin: u16,
        /// Transition time in tenths of a second
        #[arg(long, short, default_value = "0")]
        transition: u16,
    },

    /// Set color (#RRGGBB or #RRGGBBAA)
    Color {
        #[arg(value_parser = parse_target)]
        target: Address,
        color: Rgba,
        /// Transition time in tenths of a second
        #[arg(long, short, default_value = "0")]
        transition: u16,
    },

    /// Activate a stored scene
    Scene { scene: u8 },

    /// Show the gateway firmware version
    Firmware,

    /// Show the gateway's stored Wi-Fi networks
    Wifi,

    /// Scan periodically and print lifecycle events until interrupted
    Watch {
        /// Seconds between device scans, overrides the configuration file
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}

/// Parses a device address or a group number.
pub fn parse_target(s: &str) -> Result<Address, String> {
    if let Ok(number) = s.parse::<u16>() {
        return Ok(Address::group(number));
    }
    s.parse::<Address>().map_err(|e| e.to_string())
}

/// Parses a device address; group numbers are rejected.
pub fn parse_device(s: &str) -> Result<Address, String> {
    let address = s.parse::<Address>().map_err(|e| e.to_string())?;
    if !address.is_unicast() {
        return Err(format!("{} is a group address", address));
    }
    Ok(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn target_accepts_group_numbers() {
        assert_eq!(parse_target("3"), Ok(Address::group(3)));
        assert_eq!(
            parse_target("84:18:26:00:00:0C:8D:9C").unwrap().to_string(),
            "84:18:26:00:00:0C:8D:9C"
        );
        assert!(parse_target("kitchen").is_err());
    }

    #[test]
    fn info_rejects_groups() {
        assert!(parse_device("00:00:00:00:00:00:00:03").is_err());
        assert!(parse_device("84:18:26:00:00:0C:8D:9C").is_ok());
    }

    #[test]
    fn parses_color_command() {
        let cli = Cli::try_parse_from([
            "lightify", "--host", "10.0.0.2", "color", "2", "#FF0000", "-t", "15",
        ])
        .unwrap();
        assert_eq!(cli.host.as_deref(), Some("10.0.0.2"));
        match cli.command {
            Command::Color {
                target,
                color,
                transition,
            } => {
                assert_eq!(target, Address::group(2));
                assert_eq!(color, Rgba::opaque(255, 0, 0));
                assert_eq!(transition, 15);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }
}
