use clap::{Parser, Subcommand};
use serial_line::config::{Config, ConfigLoader, LogFormat};
use serial_line::error::AppResult;
use serial_line::{discovery, logging};
use std::path::PathBuf;

#[cfg(unix)]
use clap::Args;
#[cfg(unix)]
use serial_line::error::AppError;
#[cfg(unix)]
use serial_line::port::{Parity, PortConfiguration, SerialPort, StopBits, TerminalAttributes};
#[cfg(unix)]
use std::io::Write;
#[cfg(unix)]
use std::time::Duration;

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-line",
    version,
    about = "Open, configure and talk to serial devices through the host terminal driver."
)]
struct Cli {
    /// Configuration file, instead of the standard locations.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured log format.
    #[arg(long, value_enum, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List candidate serial devices.
    List {
        /// Print a JSON array instead of one path per line.
        #[arg(long)]
        json: bool,
    },

    /// Show the terminal attributes a line configuration maps to.
    #[cfg(unix)]
    Attrs {
        #[command(flatten)]
        line: LineArgs,

        #[arg(long)]
        json: bool,
    },

    /// Write bytes to a device and wait for them to be transmitted.
    #[cfg(unix)]
    Send {
        #[command(flatten)]
        line: LineArgs,

        /// Text to send.
        data: String,
    },

    /// Read bytes from a device and copy them to stdout.
    #[cfg(unix)]
    Read {
        #[command(flatten)]
        line: LineArgs,

        /// Stop after this many bytes; otherwise read until the line closes.
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
}

/// Line settings. Anything not given comes from the `[port]` section.
#[cfg(unix)]
#[derive(Args, Debug)]
struct LineArgs {
    /// Device path or alias from `[port.aliases]`.
    #[arg(short, long)]
    device: Option<String>,

    #[arg(short, long)]
    baud: Option<u32>,

    #[arg(long)]
    data_bits: Option<u8>,

    #[arg(long, value_enum)]
    parity: Option<Parity>,

    #[arg(long, value_enum)]
    stop_bits: Option<StopBits>,

    /// Read timeout in milliseconds; 0 blocks until data arrives.
    #[arg(long)]
    timeout_ms: Option<u64>,
}

#[cfg(unix)]
impl LineArgs {
    fn resolve(&self, config: &Config) -> AppResult<PortConfiguration> {
        let defaults = &config.port;
        let device = self
            .device
            .as_deref()
            .or(defaults.device.as_deref())
            .ok_or(AppError::NoDevice)?;

        let mut port_config = defaults.to_port_configuration(device);
        if let Some(baud) = self.baud {
            port_config.baud_rate = baud;
        }
        if let Some(data_bits) = self.data_bits {
            port_config.data_bits = data_bits;
        }
        if let Some(parity) = self.parity {
            port_config.parity = parity;
        }
        if let Some(stop_bits) = self.stop_bits {
            port_config.stop_bits = stop_bits;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            port_config.read_timeout = Duration::from_millis(timeout_ms);
        }
        Ok(port_config)
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("serial-line: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> AppResult<()> {
    let loader = match cli.config {
        Some(ref path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    let mut config = loader.into_config();
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    logging::init(&config.logging)?;

    match cli.command {
        Command::List { json } => list(&config, json),
        #[cfg(unix)]
        Command::Attrs { line, json } => attrs(&line.resolve(&config)?, json),
        #[cfg(unix)]
        Command::Send { line, data } => send(line.resolve(&config)?, data.as_bytes()),
        #[cfg(unix)]
        Command::Read { line, count } => read(line.resolve(&config)?, count),
    }
}

fn list(config: &Config, json: bool) -> AppResult<()> {
    let ports = discovery::from_config(&config.discovery).enumerate()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else {
        for port in ports {
            println!("{port}");
        }
    }
    Ok(())
}

#[cfg(unix)]
fn attrs(port_config: &PortConfiguration, json: bool) -> AppResult<()> {
    let attributes =
        TerminalAttributes::derive(port_config).map_err(serial_line::PortError::from)?;
    if json {
        let value = serde_json::json!({
            "device": port_config.name,
            "baud_rate": port_config.baud_rate,
            "speed": attributes.speed(),
            "control_flags": attributes.control_flags(),
            "input_flags": attributes.input_flags(),
            "vmin": attributes.min_bytes(),
            "vtime": attributes.timeout_deciseconds(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("device        {}", port_config.name);
        println!(
            "line          {} baud, {} data bits, parity {}, {} stop bits",
            port_config.baud_rate, port_config.data_bits, port_config.parity, port_config.stop_bits
        );
        println!("speed         {:#o}", attributes.speed());
        println!("control_flags {:#o}", attributes.control_flags());
        println!("input_flags   {:#o}", attributes.input_flags());
        println!("vmin          {}", attributes.min_bytes());
        println!("vtime         {}", attributes.timeout_deciseconds());
    }
    Ok(())
}

#[cfg(unix)]
fn send(port_config: PortConfiguration, data: &[u8]) -> AppResult<()> {
    let mut port = SerialPort::open(port_config)?;
    let mut sent = 0;
    while sent < data.len() {
        sent += port.write(&data[sent..])?;
    }
    port.drain()?;
    port.close()?;
    Ok(())
}

#[cfg(unix)]
fn read(port_config: PortConfiguration, count: Option<usize>) -> AppResult<()> {
    let has_timeout = !port_config.read_timeout.is_zero();
    let mut port = SerialPort::open(port_config)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut buffer = [0u8; 1024];
    let mut remaining = count;

    while remaining != Some(0) {
        let want = remaining.map_or(buffer.len(), |n| n.min(buffer.len()));
        let n = match port.read(&mut buffer[..want]) {
            Ok(0) if has_timeout => break,
            Ok(n) => n,
            Err(err) if err.is_end_of_stream() => break,
            Err(err) => return Err(err.into()),
        };
        out.write_all(&buffer[..n])?;
        out.flush()?;
        remaining = remaining.map(|r| r - n);
    }
    port.close()?;
    Ok(())
}
