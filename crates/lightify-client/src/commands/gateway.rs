//! One-shot gateway commands.
//!
//! Each command opens a connection, runs its requests, prints the result and
//! closes the connection again.

use lightify_gateway::{Gateway, GatewayConfig, NoThings};
use lightify_protocol::Command as Request;
use tracing::debug;

use crate::cli::Command;
use crate::error::{ClientError, ClientResult};
use crate::output;

/// Maps a set or scene subcommand to its gateway request.
pub fn request_for(command: &Command) -> Option<Request> {
    match command {
        Command::On { target } => Some(Request::set_power(*target, true)),
        Command::Off { target } => Some(Request::set_power(*target, false)),
        Command::Luminance {
            target,
            value,
            transition,
        } => Some(Request::set_luminance(*target, *value, *transition)),
        Command::Temperature {
            target,
            kelvin,
            transition,
        } => Some(Request::set_temperature(*target, *kelvin, *transition)),
        Command::Color {
            target,
            color,
            transition,
        } => Some(Request::set_color(*target, *color, *transition)),
        Command::Scene { scene } => Some(Request::ActivateScene { scene: *scene }),
        _ => None,
    }
}

/// Runs a one-shot command against the gateway.
pub async fn run(command: &Command, config: GatewayConfig, json: bool) -> ClientResult<()> {
    debug!(gateway = %config.address(), "Connecting");
    let (mut gateway, _events) = Gateway::connect(config, NoThings).await?;

    let text = match command {
        Command::Devices => output::devices(&gateway.scan_devices().await?, json)?,
        Command::Groups => output::groups(&gateway.scan_groups().await?, json)?,
        Command::Info { device } => {
            // Registers the device as online so a busy answer is retried.
            gateway.scan_devices().await?;
            match gateway.refresh_device(*device).await? {
                Some(snapshot) => output::snapshot(*device, &snapshot, json)?,
                None => {
                    return Err(ClientError::Unavailable(format!(
                        "device {} did not report its state, it may be offline or busy",
                        device
                    )));
                }
            }
        }
        Command::Firmware => output::firmware(gateway.connection().firmware().await?, json)?,
        Command::Wifi => output::wifi(&gateway.connection().wifi_configuration().await?, json)?,
        other => {
            let request = request_for(other).ok_or_else(|| {
                ClientError::Unavailable(format!("{:?} does not talk to the gateway", other))
            })?;
            let response = gateway.send(&request).await?;
            output::ack(&request, &response, json)?
        }
    };

    println!("{}", text);
    gateway.connection().close().await?;
    Ok(())
}
