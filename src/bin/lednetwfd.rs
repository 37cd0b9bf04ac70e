use std::env;
use std::sync::Arc;

use color_eyre::eyre::{eyre, Result};
use lednetwf_ble::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

/// Parses `a,b,c` into numbers
fn parse_list<T: std::str::FromStr>(args: Option<&str>) -> Result<Vec<T>> {
    args.ok_or_else(|| eyre!("missing arguments"))?
        .split(',')
        .map(|s| s.trim().parse().map_err(|_| eyre!("invalid number: {}", s.trim())))
        .collect()
}

async fn execute(device: &LedNetWfDevice, line: &str) -> Result<()> {
    let mut cmd = line.trim().splitn(2, ':');
    match cmd.next() {
        Some("power_on") => device.turn_on().await?,
        Some("power_off") => device.turn_off().await?,
        Some("set_hs") => {
            let values: Vec<u16> = parse_list(cmd.next())?;
            let (hue, saturation, brightness) = match values[..] {
                [h, s] => (h, s, None),
                [h, s, b] => (h, s, Some(b)),
                _ => return Err(eyre!("use H,S[,B] (e.g. 120,100)")),
            };
            let saturation = u8::try_from(saturation.min(100))?;
            let brightness = brightness.map(|b| u8::try_from(b.min(255))).transpose()?;
            device.set_hs_color((hue, saturation), brightness).await?;
        }
        Some("set_color") => {
            let rgb: Vec<u8> = parse_list(cmd.next())?;
            let [r, g, b] = rgb[..] else {
                return Err(eyre!("use R,G,B (e.g. 255,0,0 for red)"));
            };
            device.set_rgb_color((r, g, b), None).await?;
        }
        Some("set_color_temp") => {
            let values: Vec<u32> = parse_list(cmd.next())?;
            let (kelvin, brightness) = match values[..] {
                [k] => (k, None),
                [k, b] => (k, Some(u8::try_from(b.min(255))?)),
                _ => return Err(eyre!("use K[,B] (e.g. 4000)")),
            };
            device.set_color_temp_kelvin(kelvin, brightness).await?;
        }
        Some("set_brightness") => {
            let [brightness] = parse_list::<u8>(cmd.next())?[..] else {
                return Err(eyre!("use a single brightness 0-255"));
            };
            device.set_brightness(brightness).await?;
        }
        Some("set_effect") => {
            let name = cmd.next().ok_or_else(|| eyre!("no effect given"))?.trim();
            device.set_effect(name, None).await?;
        }
        Some("set_speed") => {
            let [speed] = parse_list::<u8>(cmd.next())?[..] else {
                return Err(eyre!("use a single speed 0-100"));
            };
            device.set_effect_speed(speed).await?;
        }
        Some("status") => {
            let state = device.state();
            println!("{state:?}");
        }
        Some(other) => return Err(eyre!("Unknown command: {other}")),
        None => return Err(eyre!("No command given")),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("lednetwf_ble=warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    color_eyre::install()?;

    // Get a target mac address from command line arguments.
    // If not provided, exit.
    let usage = "Usage: lednetwfd <mac address>";
    let args: Vec<_> = env::args().collect();
    if args.len() < 2 {
        eprintln!("{usage}");
        std::process::exit(1);
    }
    if args[1] == "-h" || args[1] == "--help" {
        eprintln!("{usage}");
        std::process::exit(0);
    }

    let transport = Arc::new(BtleplugTransport::new().await?);
    let device = LedNetWfDevice::new(transport, DeviceConfig::new(args[1].as_str())).await?;

    // Print every state change as it arrives
    let mut changes = device.subscribe();
    tokio::spawn(async move {
        while changes.changed().await.is_ok() {
            let state = changes.borrow_and_update().clone();
            println!("STATE {state:?}");
        }
    });

    // Inform about successful initialization
    println!("OK");

    // Mainloop: wait for user input, line by line
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim() == "quit" {
                    break;
                }
                match execute(&device, &line).await {
                    Ok(()) => println!("OK"),
                    Err(e) => println!("ERR {e}"),
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    device.stop().await;
    Ok(())
}
