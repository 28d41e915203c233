// src/main.rs
//! DG14 Bridge - serial Ashtech receiver to structured fix messages

use clap::{Parser, ValueEnum};
use dg14_bridge::{
    bridge::{self, Bridge},
    publish::{FixSink, JsonLinesSink, TerminalSink},
    BridgeConfig, BridgeError, OutputKind, Result, SatLayout,
};
use log::{error, info};
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputArg {
    Json,
    Terminal,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SatLayoutArg {
    Legacy,
    Packed,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Serial device of the receiver (defaults to /dev/gps)
    #[arg(long)]
    src: Option<String>,

    /// Baud rate (defaults to 115200)
    #[arg(long)]
    baud: Option<u32>,

    /// Replay a recorded session instead of opening the serial port
    #[arg(long, value_name = "FILE")]
    test: Option<PathBuf>,

    /// Publish rate in Hz
    #[arg(long)]
    rate: Option<f64>,

    /// Where to publish fixes
    #[arg(long, value_enum)]
    output: Option<OutputArg>,

    /// Also publish the reduced `fix` message (JSON output only)
    #[arg(long)]
    navsat: bool,

    /// Satellite field layout of $PASHR,SAT sentences
    #[arg(long, value_enum)]
    sat_layout: Option<SatLayoutArg>,

    /// List serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Write the effective configuration to the config file
    #[arg(long)]
    save_config: bool,
}

impl Args {
    fn apply(&self, config: &mut BridgeConfig) {
        if self.src.is_some() || self.baud.is_some() {
            let port = self.src.clone().unwrap_or_else(|| config.serial_port.clone());
            let baud = self.baud.unwrap_or(config.serial_baudrate);
            config.update_serial(port, baud);
        }
        if let Some(rate) = self.rate {
            config.publish_rate_hz = rate;
        }
        if let Some(output) = self.output {
            config.output = match output {
                OutputArg::Json => OutputKind::Json,
                OutputArg::Terminal => OutputKind::Terminal,
            };
        }
        if self.navsat {
            config.navsat = true;
        }
        if let Some(layout) = self.sat_layout {
            config.sat_layout = match layout {
                SatLayoutArg::Legacy => SatLayout::Legacy,
                SatLayoutArg::Packed => SatLayout::Packed,
            };
        }
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(Args::parse()).await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    if args.list_ports {
        return bridge::list_serial_ports();
    }

    let mut config = BridgeConfig::load()?;
    args.apply(&mut config);
    config.validate()?;

    if args.save_config {
        config.save()?;
        info!("Configuration saved");
    }

    let bridge = Bridge::with_sat_layout(config.sat_layout);

    if let Some(path) = &args.test {
        return replay(&bridge, path);
    }

    let reader = bridge
        .connect_serial(&config.serial_port, config.serial_baudrate, config.read_timeout())
        .await?;

    // Ctrl+C stops both the reader and the publisher
    let shutdown = bridge.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            shutdown.stop();
        }
    });

    let mut sink: Box<dyn FixSink> = match config.output {
        OutputKind::Json => {
            Box::new(JsonLinesSink::new(std::io::stdout()).with_navsat(config.navsat))
        }
        OutputKind::Terminal => Box::new(TerminalSink::new()),
    };

    info!("Publishing at {} Hz", config.publish_rate_hz);
    bridge.publish_loop(&mut sink, config.publish_period()).await?;

    // reader may still be parked on the port
    reader.abort();
    match reader.await {
        Ok(result) => result.map(|summary| {
            info!("Read {} lines, {} read timeouts", summary.lines, summary.timeouts);
        }),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(BridgeError::Other(format!("Serial reader failed: {}", e))),
    }
}

fn replay(bridge: &Bridge, path: &Path) -> Result<()> {
    info!("Replaying {}", path.display());

    let file = File::open(path)
        .map_err(|e| BridgeError::Other(format!("Failed to open {}: {}", path.display(), e)))?;
    let summary = bridge.replay(BufReader::new(file), std::io::stdout())?;

    info!(
        "Replayed {} lines: {} POS, {} SAT, {} GST, {} unrecognized, {} discarded",
        summary.lines,
        summary.position,
        summary.satellites,
        summary.pseudorange_noise,
        summary.unrecognized,
        summary.discarded
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from(["dg14-bridge", "--baud", "57600", "--rate", "8", "--sat-layout", "packed"]);
        let mut config = BridgeConfig::default();
        config.serial_port = "/dev/ttyS3".to_string();
        args.apply(&mut config);

        assert_eq!(config.serial_port, "/dev/ttyS3");
        assert_eq!(config.serial_baudrate, 57600);
        assert_eq!(config.publish_period(), Duration::from_millis(125));
        assert_eq!(config.sat_layout, SatLayout::Packed);
    }

    #[test]
    fn test_cli_without_serial_options_keeps_config() {
        let args = Args::parse_from(["dg14-bridge", "--src", "/dev/ttyUSB1"]);
        let mut config = BridgeConfig::default();
        config.serial_baudrate = 9600;
        args.apply(&mut config);

        assert_eq!(config.serial_port, "/dev/ttyUSB1");
        assert_eq!(config.serial_baudrate, 9600);
        assert_eq!(config.output, OutputKind::Json);
        assert!(!config.navsat);
    }
}
