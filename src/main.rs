//! Interactive console front end for the BLE UART terminal.
//!
//! One task owns the bridge and alternates between stdin commands and
//! marshaled session events, which makes it the single serialized execution
//! context the core requires.

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use bleuart::bridge::UartBridge;
use bleuart::error::BleError;
use bleuart::platform::bluest_backend::BluestBackend;
use bleuart::platform::BleBackend;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("starting BLE UART terminal");

    let backend: Arc<dyn BleBackend> = Arc::new(BluestBackend::new().await?);
    let (mut bridge, mut events) = UartBridge::new(backend);

    println!("BLE UART terminal. Type `help` for commands.");
    let mut lines: Lines<BufReader<Stdin>> = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !run_command(&mut bridge, line.trim()).await? {
                        break;
                    }
                }
                None => break,
            },
            event = events.recv() => match event {
                Some(event) => bridge.apply(event),
                None => break,
            },
        }
    }

    bridge.shutdown().await;
    Ok(())
}

/// Executes one console command. Returns `false` when the session should
/// end.
async fn run_command(bridge: &mut UartBridge, line: &str) -> Result<bool> {
    let (command, arg) = match line.split_once(' ') {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "help" => print_help(),
        "scan" => match bridge.start_scan().await {
            Ok(()) => println!("scanning..."),
            Err(BleError::AlreadyRunning) => println!("already scanning; `stop` first"),
            Err(e) => return Err(e.into()),
        },
        "stop" => {
            bridge.stop_scan();
            println!("scan stopped");
        }
        "devices" => {
            let watcher = bridge.watcher();
            for (i, device) in watcher.devices().iter().enumerate() {
                let rssi = device
                    .rssi
                    .map(|v| format!("{} dBm", v))
                    .unwrap_or_else(|| "-".to_string());
                println!("[{}] {} ({}, {})", i, device.name, device.address, rssi);
            }
            if watcher.enumeration_complete() {
                println!("{} devices", watcher.device_count());
            }
        }
        "connect" => {
            let Some(id) = nth_id(arg, bridge.watcher().devices().iter().map(|d| d.id.clone()))
            else {
                println!("usage: connect <device index>");
                return Ok(true);
            };
            bridge.select_device(&id).await?;
            if bridge.session().is_connected() {
                println!("connected; {} service(s):", bridge.session().services().len());
                for (i, service) in bridge.session().services().iter().enumerate() {
                    println!("[{}] {}", i, service.display_name());
                }
            } else {
                println!("device unavailable");
            }
        }
        "services" => {
            for (i, service) in bridge.session().services().iter().enumerate() {
                println!("[{}] {}", i, service.display_name());
            }
        }
        "characteristics" => {
            for (i, chr) in bridge.session().characteristics().iter().enumerate() {
                println!("[{}] {}", i, chr.display_name());
            }
        }
        "service" => {
            let Some(id) = nth_id(
                arg,
                bridge.session().services().iter().map(|s| s.id().to_string()),
            ) else {
                println!("usage: service <index>");
                return Ok(true);
            };
            bridge.select_service(&id).await?;
            for (i, chr) in bridge.session().characteristics().iter().enumerate() {
                println!("[{}] {}", i, chr.display_name());
            }
            if bridge.session().characteristics().is_empty() {
                println!("no characteristics found");
            }
        }
        "char" => {
            let Some(id) = nth_id(
                arg,
                bridge
                    .session()
                    .characteristics()
                    .iter()
                    .map(|c| c.id().to_string()),
            ) else {
                println!("usage: char <index>");
                return Ok(true);
            };
            bridge.select_characteristic(&id).await?;
            if bridge.session().has_subscription() {
                println!("terminal ready, notifications on");
            } else if bridge.terminal().has_target() {
                println!("terminal ready, writes only");
            }
        }
        "send" => {
            bridge.send_text(arg).await?;
        }
        "sendln" => {
            bridge.send_text(&format!("{}\r\n", arg)).await?;
        }
        "log" => println!("{}", bridge.terminal().response()),
        "clear" => bridge.terminal_mut().clear_response(),
        "quit" | "exit" => return Ok(false),
        other => println!("unknown command `{}`; try `help`", other),
    }
    Ok(true)
}

/// Resolves a 0-based index argument against an id list.
fn nth_id(arg: &str, mut ids: impl Iterator<Item = String>) -> Option<String> {
    let index: usize = arg.parse().ok()?;
    ids.nth(index)
}

fn print_help() {
    println!("commands:");
    println!("  scan / stop          toggle device discovery");
    println!("  devices              list discovered devices");
    println!("  connect <n>          connect to device n and list services");
    println!("  services             list services of the connection");
    println!("  service <n>          select service n and list its characteristics");
    println!("  characteristics      list characteristics of the selected service");
    println!("  char <n>             open the terminal on characteristic n");
    println!("  send <text>          write text to the characteristic");
    println!("  sendln <text>        write text followed by CR LF");
    println!("  log / clear          show or clear the response log");
    println!("  quit                 exit");
}
