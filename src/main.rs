use std::path::PathBuf;
use std::process::exit;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Sender};
use log::{info, warn};

use biolink::{
    logging, transport, ChannelListener, Command, DeviceEvents, DeviceHost, DriverError,
    HostConfig, ProtocolError,
};

/// How long to wait for the device to answer GET_CONFIG.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(
    name = "biolink-monitor",
    about = "Connect to an acquisition device and print sample batches"
)]
struct Args {
    /// JSON config file (fields not given take their defaults)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Serial port (e.g. /dev/ttyUSB0, COM3); overrides the config file
    #[arg(long)]
    port: Option<String>,
    /// Baud rate; overrides the config file
    #[arg(long)]
    baud: Option<u32>,
    /// Seconds to stream before stopping
    #[arg(long, default_value_t = 10)]
    seconds: u64,
    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
    /// List available serial ports and exit
    #[arg(long)]
    list: bool,
}

/// Forwards device identification to the main thread and logs the rest.
struct MonitorEvents {
    identified: Sender<(u32, u8)>,
}

impl DeviceEvents for MonitorEvents {
    fn on_device_identified(&self, serial_number: u32, channel_count: u8) {
        let _ = self.identified.try_send((serial_number, channel_count));
    }

    fn on_control_ack(&self, raw: &[u8]) {
        info!("control ack: {:02X?}", raw);
    }

    fn on_decode_error(&self, error: &ProtocolError) {
        warn!("decode error: {}", error);
    }

    fn on_link_lost(&self, error: &DriverError) {
        eprintln!("Link lost: {error}");
    }
}

struct PrintBatch;

impl ChannelListener for PrintBatch {
    fn on_batch(&self, channel: u8, batch: &[i32]) {
        println!("[ch {}] {:?}", channel, batch);
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref());

    if args.list {
        for (name, kind) in transport::available_ports()? {
            println!("{name}\t{kind}");
        }
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => HostConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => HostConfig::default(),
    };
    if let Some(port) = args.port {
        config.link.port = port;
    }
    if let Some(baud) = args.baud {
        config.link.baud_rate = baud;
    }
    if config.link.port.is_empty() {
        bail!("No serial port given (use --port or a config file; --list shows ports)");
    }

    let (identified_tx, identified_rx) = bounded(4);
    let events = Arc::new(MonitorEvents {
        identified: identified_tx,
    });
    let host = DeviceHost::open_serial(config, events);
    let port = host.config().link.port.clone();

    // 1. Connection
    println!("Connecting to {port}...");
    host.connect()
        .with_context(|| format!("Failed to connect to {port}"))?;

    let (serial_number, channel_count) = identified_rx
        .recv_timeout(IDENTIFY_TIMEOUT)
        .context("Device did not report its configuration")?;
    println!("Device #{serial_number} with {channel_count} channels");

    // 2. Listeners
    let printer = Arc::new(PrintBatch);
    for channel in 0..channel_count {
        host.register_channel_listener(channel, &printer)?;
    }

    // 3. Acquisition
    host.send_command(Command::StartTransmission)?;
    println!("Streaming for {} s...", args.seconds);
    thread::sleep(Duration::from_secs(args.seconds));

    // 4. Cleanup
    println!("Stopping...");
    host.disconnect()?;

    let stats = host.stats();
    println!(
        "Done. frames={} noise_bytes={} decode_errors={} batches={}",
        stats.frames, stats.noise_bytes, stats.decode_errors, stats.batches_flushed
    );
    Ok(())
}
