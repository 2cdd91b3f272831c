//! Console monitor for a FluidNC machine.
//!
//! Connects over WebSocket, prints every non-status line the controller
//! sends, and prints a one-line status summary once a second.

use anyhow::Result;
use fluidlink::{init_logging, MonitorConfig, BUILD_DATE, VERSION};
use fluidlink_core::{LinkError, MachineState};
use fluidlink_link::{EngineConfig, LinkDescriptor, ProtocolEngine, WebSocketTransport};
use std::time::Instant;

fn main() -> Result<()> {
    init_logging()?;
    tracing::info!(version = VERSION, build = BUILD_DATE, "fluidlink monitor");

    let mut config = MonitorConfig::load_or_default()?;
    if let Some(machine) = std::env::args().nth(1) {
        config.machine = parse_machine_arg(&machine)?;
    }

    let mut engine =
        ProtocolEngine::new(Box::new(WebSocketTransport::new()), EngineConfig::default());
    engine.register_terminal_callback(|line| println!("{line}"));

    tracing::info!(machine = %config.machine, "connecting");
    engine.connect(&config.machine)?;

    let started = Instant::now();
    let mut last_status_print = Instant::now();

    loop {
        engine.tick();

        if !engine.is_connected() && started.elapsed() >= config.connect_timeout() {
            engine.disconnect();
            tracing::error!(machine = %config.machine, "no response, giving up");
            return Err(LinkError::ConnectionTimeout {
                timeout_ms: config.connect_timeout_ms,
            }
            .into());
        }

        if engine.is_connected() && last_status_print.elapsed().as_millis() as u64 >= config.status_print_ms
        {
            last_status_print = Instant::now();
            print_status_line(&engine);
        }

        std::thread::sleep(config.tick_interval());
    }
}

/// Accept `host` or `host:port`.
fn parse_machine_arg(arg: &str) -> Result<LinkDescriptor> {
    match arg.rsplit_once(':') {
        Some((host, port)) => {
            let port: u16 = port.parse().map_err(|_| LinkError::InvalidAddress {
                address: arg.to_string(),
            })?;
            Ok(LinkDescriptor::new(host, port))
        }
        None => Ok(LinkDescriptor::new(arg, LinkDescriptor::default().port)),
    }
}

fn print_status_line(engine: &ProtocolEngine) {
    let status = engine.status();
    let mut line = format!(
        "{} | MPos {} | WPos {} | F{:.0} S{:.0}",
        status.state, status.machine_position, status.work_position, status.feed_rate, status.spindle_speed
    );
    if status.job.active {
        line.push_str(&format!(" | {} {:.1}%", status.job.filename, status.job.percent));
    }
    if !status.last_message.is_empty() {
        line.push_str(&format!(" | [{}]", status.last_message));
    }
    if status.state == MachineState::Alarm {
        line.push_str(" | locked, send $X to unlock");
    }
    println!("{line}");
}
