//! Output rendering for the terminal and for `--json`.

use lightify_core::{Address, DeviceSnapshot, PresenceEvent};
use lightify_gateway::GatewayEvent;
use lightify_protocol::{
    Command, DeviceRecord, FirmwareVersion, GroupRecord, Response, WifiProfile,
};
use serde::Serialize;

use crate::error::ClientResult;

fn to_json<T: Serialize + ?Sized>(value: &T) -> ClientResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn state_label(snapshot: &DeviceSnapshot) -> &'static str {
    match (snapshot.reachable, snapshot.power) {
        (false, _) => "unreachable",
        (true, true) => "on",
        (true, false) => "off",
    }
}

fn state_line(snapshot: &DeviceSnapshot) -> String {
    format!(
        "{:<11}  {:>3}  {:>5}K  {}",
        state_label(snapshot),
        snapshot.luminance,
        snapshot.temperature,
        snapshot.color
    )
}

fn device_line(device: &DeviceRecord) -> String {
    format!(
        "{}  {:<16}  {}",
        device.address,
        device.name,
        state_line(&device.snapshot)
    )
}

/// Renders a device enumeration.
pub fn devices(devices: &[DeviceRecord], json: bool) -> ClientResult<String> {
    if json {
        return to_json(devices);
    }
    if devices.is_empty() {
        return Ok("No devices".to_string());
    }
    Ok(devices.iter().map(device_line).collect::<Vec<_>>().join("\n"))
}

/// Renders a group enumeration.
pub fn groups(groups: &[GroupRecord], json: bool) -> ClientResult<String> {
    if json {
        return to_json(groups);
    }
    if groups.is_empty() {
        return Ok("No groups".to_string());
    }
    Ok(groups
        .iter()
        .map(|group| format!("{:>5}  {}", group.number, group.name))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Renders the state of a single device.
pub fn snapshot(address: Address, snapshot: &DeviceSnapshot, json: bool) -> ClientResult<String> {
    if json {
        #[derive(Serialize)]
        struct Info<'a> {
            address: Address,
            #[serde(flatten)]
            snapshot: &'a DeviceSnapshot,
        }
        return to_json(&Info { address, snapshot });
    }
    Ok(format!("{}  {}", address, state_line(snapshot)))
}

/// Renders the gateway firmware version.
pub fn firmware(version: FirmwareVersion, json: bool) -> ClientResult<String> {
    if json {
        return to_json(&serde_json::json!({ "firmware": version }));
    }
    Ok(version.to_string())
}

/// Renders the stored Wi-Fi networks, one per line.
pub fn wifi(profiles: &[WifiProfile], json: bool) -> ClientResult<String> {
    if json {
        return to_json(profiles);
    }
    if profiles.is_empty() {
        return Ok("No Wi-Fi networks".to_string());
    }
    Ok(profiles
        .iter()
        .map(|p| {
            format!(
                "{:<32}  {}  ch {:>2}  {}/{} via {}",
                p.ssid, p.bssid, p.channel, p.ip, p.netmask, p.gateway
            )
        })
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Renders the acknowledgement of a set or scene command.
pub fn ack(command: &Command, response: &Response, json: bool) -> ClientResult<String> {
    let target = match response {
        Response::Ack { address } => Some(*address),
        _ => None,
    };
    if json {
        return to_json(&serde_json::json!({
            "ok": true,
            "command": command.to_string(),
            "target": target,
        }));
    }
    Ok(format!("ok: {}", command))
}

fn presence_line<K, S>(
    scope: &str,
    event: &PresenceEvent<K, S>,
    describe: impl Fn(&S) -> String,
) -> String
where
    K: std::fmt::Display,
{
    match event {
        PresenceEvent::Discovered { id, state } => {
            format!("+ {} {} {}", scope, id, describe(state))
        }
        PresenceEvent::Recovered { id, state } => {
            format!("^ {} {} {}", scope, id, describe(state))
        }
        PresenceEvent::Lost { id } => format!("- {} {} lost", scope, id),
        PresenceEvent::Forgotten { id } => format!("x {} {} forgotten", scope, id),
    }
}

/// Renders one event for `watch`. JSON output is one object per line.
pub fn event(event: &GatewayEvent, json: bool) -> ClientResult<String> {
    if json {
        return Ok(serde_json::to_string(event)?);
    }
    Ok(match event {
        GatewayEvent::Device(e) => presence_line("device", e, device_line_tail),
        GatewayEvent::Group(e) => presence_line("group", e, |g| g.name.clone()),
        GatewayEvent::State { address, snapshot } => {
            format!("~ device {} {}", address, state_line(snapshot))
        }
    })
}

fn device_line_tail(device: &DeviceRecord) -> String {
    format!("{} ({})", device.name, state_label(&device.snapshot))
}
