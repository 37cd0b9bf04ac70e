use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Result};
use lednetwf_ble::*;
use tokio::time::Duration;
use tracing::{debug, error, info, instrument, trace};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// MAC address (or platform id) of the light
    #[arg(short, long, global = true)]
    mac: Option<String>,

    /// JSON file storing per-device LED settings
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum, Debug)]
enum ModelArg {
    Ring,
    Strip,
}

impl From<ModelArg> for Model {
    fn from(value: ModelArg) -> Self {
        match value {
            ModelArg::Ring => Model::Ring,
            ModelArg::Strip => Model::Strip,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List nearby LEDnetWF devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value_t = 5)]
        duration: u64,
    },
    /// Print the state reported by the light
    Status {
        /// Seconds to wait for notifications
        #[arg(short, long, default_value_t = 2)]
        wait: u64,
    },
    /// Demonstration of light features
    Demo {
        /// Duration of each demo step in seconds
        #[arg(short, long, default_value_t = 5)]
        duration: u64,
    },
    /// Turn the light on
    On,
    /// Turn the light off
    Off,
    /// Set hue and saturation
    Color {
        /// Hue in degrees (0-360)
        #[arg(long, default_value_t = 0)]
        hue: u16,
        /// Saturation (0-100)
        #[arg(short, long, default_value_t = 100)]
        saturation: u8,
        /// Brightness (0-255)
        #[arg(short, long)]
        brightness: Option<u8>,
    },
    /// Set custom RGB color
    Rgb {
        /// Red value (0-255)
        #[arg(short, long, default_value_t = 255)]
        red: u8,
        /// Green value (0-255)
        #[arg(short, long, default_value_t = 255)]
        green: u8,
        /// Blue value (0-255)
        #[arg(short = 'B', long, default_value_t = 255)]
        blue: u8,
        /// Brightness (0-255)
        #[arg(short, long)]
        brightness: Option<u8>,
    },
    /// Set color temperature (ring only)
    ColorTemp {
        /// Color temperature in Kelvin (2700-6500)
        #[arg(short, long, default_value_t = 4000)]
        kelvin: u32,
        /// Brightness (0-255)
        #[arg(short, long)]
        brightness: Option<u8>,
    },
    /// Set brightness
    Brightness {
        /// Brightness level (0-255)
        #[arg(short, long, default_value_t = 255)]
        level: u8,
    },
    /// Start an effect, see `effects` for names
    Effect {
        /// Effect name, or "off"
        name: String,
        /// Brightness (0-255)
        #[arg(short, long)]
        brightness: Option<u8>,
    },
    /// Set effect speed
    Speed {
        /// Effect speed (0-100)
        #[arg(short, long, default_value_t = 50)]
        speed: u8,
    },
    /// List the effects a model supports
    Effects {
        /// Model to list, read from the light if not given
        #[arg(long, value_enum)]
        model: Option<ModelArg>,
    },
    /// Configure LED count, chip type and color order
    LedSettings {
        /// Number of LEDs
        #[arg(long)]
        count: Option<u16>,
        /// Chip type, e.g. WS2812B
        #[arg(long)]
        chip: Option<ChipType>,
        /// Color order, e.g. GRB
        #[arg(short, long)]
        order: Option<ColorOrder>,
    },
}

#[tokio::main]
#[instrument]
async fn main() -> Result<()> {
    // Initialize tracing with pretty colors
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("RUST_LOG")
                .unwrap_or_else(|_| EnvFilter::new("lednetwf_ble=info")),
        )
        .compact()
        .init();

    // Initialize color-eyre for pretty error reporting
    color_eyre::install()?;

    let cli = Cli::parse();
    debug!("Parsed command line arguments");

    let transport = Arc::new(BtleplugTransport::new().await?);
    let command = cli.command.unwrap_or(Commands::Demo { duration: 5 });

    // Commands that need no session
    match &command {
        Commands::Scan { duration } => {
            for found in transport.discover(Duration::from_secs(*duration)).await? {
                let model = found
                    .model
                    .map_or_else(|| "unsupported".to_string(), |m| m.to_string());
                println!(
                    "{}  {}  {}  rssi {}",
                    found.address,
                    found.name,
                    model,
                    found.rssi.map_or_else(|| "-".to_string(), |r| r.to_string())
                );
            }
            return Ok(());
        }
        Commands::Effects { model: Some(model) } => {
            print_effects((*model).into());
            return Ok(());
        }
        _ => {}
    }

    let mac = cli
        .mac
        .ok_or_else(|| eyre!("--mac is required for this command"))?;
    let config = DeviceConfig::new(mac);
    let device = match &cli.config {
        Some(path) => {
            let store = Arc::new(JsonConfigStore::new(path));
            LedNetWfDevice::new_with_store(transport, config, store).await
        }
        None => LedNetWfDevice::new(transport, config).await,
    };
    let device = match device {
        Ok(dev) => dev,
        Err(e) => {
            error!("Failed to initialize device: {}", e);
            return Err(e.into());
        }
    };

    let result = run(&device, command).await;
    device.stop().await;
    result
}

async fn run(device: &LedNetWfDevice, command: Commands) -> Result<()> {
    match command {
        Commands::Scan { .. } => {}
        Commands::Effects { .. } => print_effects(device.model()),
        Commands::Status { wait } => {
            device.connect_if_needed().await?;
            sleep(wait).await;
            print_state(device);
        }
        Commands::Demo { duration } => {
            run_demo(device, duration).await?;
        }
        Commands::On => {
            device.turn_on().await?;
        }
        Commands::Off => {
            device.turn_off().await?;
        }
        Commands::Color {
            hue,
            saturation,
            brightness,
        } => {
            // First ensure device is on, then set color
            device.turn_on().await?;
            device.set_hs_color((hue, saturation), brightness).await?;
        }
        Commands::Rgb {
            red,
            green,
            blue,
            brightness,
        } => {
            device.turn_on().await?;
            device.set_rgb_color((red, green, blue), brightness).await?;
        }
        Commands::ColorTemp { kelvin, brightness } => {
            device.turn_on().await?;
            device.set_color_temp_kelvin(kelvin, brightness).await?;
        }
        Commands::Brightness { level } => {
            // We need to ensure the device is on for brightness changes to be visible
            device.turn_on().await?;
            device.set_brightness(level).await?;
        }
        Commands::Effect { name, brightness } => {
            device.turn_on().await?;
            device.set_effect(&name, brightness).await?;
        }
        Commands::Speed { speed } => {
            device.set_effect_speed(speed).await?;
        }
        Commands::LedSettings { count, chip, order } => {
            device.set_led_settings(count, chip, order).await?;
            print_state(device);
        }
    }

    Ok(())
}

fn print_effects(model: Model) {
    for name in effect_list(model) {
        println!("{name}");
    }
}

fn print_state(device: &LedNetWfDevice) {
    let identity = device.identity();
    let state = device.state();
    println!("model:       {} firmware {}", identity.model, identity.firmware_minor);
    println!(
        "power:       {}",
        match state.is_on {
            Some(true) => "on",
            Some(false) => "off",
            None => "unknown",
        }
    );
    println!("color mode:  {:?}", state.color_mode);
    if let Some((h, s)) = state.hs_color {
        println!("hs color:    {h} {s}%");
    }
    if let Some((r, g, b)) = state.rgb_color {
        println!("rgb color:   {r} {g} {b}");
    }
    if let Some(kelvin) = state.color_temp_kelvin {
        println!("color temp:  {kelvin}K");
    }
    println!("brightness:  {}", state.brightness);
    println!("effect:      {} (speed {})", state.effect_or_off(), state.effect_speed);
    if let Some(count) = state.led_count {
        println!("led count:   {count}");
    }
    if let Some(chip) = state.chip_type {
        println!("chip type:   {chip}");
    }
    if let Some(order) = state.color_order {
        println!("color order: {order}");
    }
}

/// Sleep for specified number of seconds
#[instrument]
async fn sleep(seconds: u64) {
    trace!("Sleeping for {}s", seconds);
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    trace!("Sleep completed");
}

/// Run a demonstration of various light features
#[instrument(skip(device))]
async fn run_demo(device: &LedNetWfDevice, duration: u64) -> Result<()> {
    info!("Running {} demo with {}s intervals", device.model(), duration);

    info!("Turning light off");
    device.turn_off().await?;
    sleep(duration).await;

    info!("Turning light on");
    device.turn_on().await?;
    sleep(duration).await;

    for (name, hue) in [("red", 0), ("green", 120), ("blue", 240)] {
        info!("Setting color to {}", name);
        device.set_hs_color((hue, 100), Some(255)).await?;
        sleep(duration).await;
    }

    info!("Setting brightness to 50%");
    device.set_brightness(128).await?;
    sleep(duration).await;

    if device.model() == Model::Ring {
        info!("Setting warm white ({}K)", MIN_KELVIN);
        device.set_color_temp_kelvin(MIN_KELVIN, Some(255)).await?;
        sleep(duration).await;

        info!("Setting cool white ({}K)", MAX_KELVIN);
        device.set_color_temp_kelvin(MAX_KELVIN, None).await?;
        sleep(duration).await;
    } else {
        info!("Setting solid orange");
        device.set_rgb_color((255, 128, 0), Some(255)).await?;
        sleep(duration).await;
    }

    for name in effect_list(device.model()).iter().take(3) {
        info!("Setting effect {}", name);
        device.set_effect(name, None).await?;
        sleep(duration).await;
    }

    info!("Setting effect speed to slow (20)");
    device.set_effect_speed(20).await?;
    sleep(duration).await;

    info!("Setting effect speed to fast (80)");
    device.set_effect_speed(80).await?;
    sleep(duration).await;

    info!("Back to static white");
    device.set_hs_color((0, 0), Some(255)).await?;
    sleep(1).await;

    info!("Turning light off to end demo");
    device.turn_off().await?;

    info!("Demo completed!");
    Ok(())
}
