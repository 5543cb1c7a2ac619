//! qso-relay CLI - log QSOs to Log4OM over UDP and look callsigns up on QRZ.com.

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use qso_relay::{
    Band, Config, DirectoryClient, Mode, QsoEntry, Session, Transmitter, encode_record,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// qso-relay - log amateur radio contacts to a logging program over UDP
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Config file to use instead of the platform default
    #[arg(long, global = true, env = "QSO_RELAY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log a single QSO and send it to the logging program
    Log(LogArgs),

    /// Look a callsign up on QRZ.com
    Lookup {
        /// Callsign to look up
        callsign: String,

        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive logging session reading commands from stdin
    Session,

    /// Inspect or create the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Args, Debug)]
struct LogArgs {
    /// Callsign of the other station
    #[arg(short, long)]
    call: String,

    /// Frequency in MHz
    #[arg(short, long)]
    freq: String,

    /// Band (inferred from the frequency when omitted)
    #[arg(short, long)]
    band: Option<Band>,

    /// Mode
    #[arg(short, long, default_value_t = Mode::Ft8)]
    mode: Mode,

    /// Report sent (defaults to the configured value)
    #[arg(long)]
    sent: Option<String>,

    /// Report received (defaults to the configured value)
    #[arg(long)]
    rcvd: Option<String>,

    /// Logging program IPv4 address (overrides config)
    #[arg(long)]
    host: Option<String>,

    /// Logging program UDP port (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Print the record without sending it
    #[arg(long)]
    dry_run: bool,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
    /// Write a default config file if none exists
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = args.config.clone().or_else(Config::config_path);
    let config = match &config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::default(),
    };
    debug!("Loaded configuration: {:?}", config);

    match args.command {
        Command::Log(log_args) => run_log(&config, log_args).await,
        Command::Lookup { callsign, json } => run_lookup(&config, &callsign, json).await,
        Command::Session => run_session(config, config_path.as_deref()).await,
        Command::Config { action } => run_config(&config, config_path.as_deref(), action),
    }
}

/// Resolve the band for a frequency, falling back to the default band.
fn infer_band(explicit: Option<Band>, freq: &str) -> Band {
    explicit
        .or_else(|| {
            freq.trim()
                .parse::<f64>()
                .ok()
                .and_then(Band::for_frequency_mhz)
        })
        .unwrap_or_default()
}

async fn run_log(config: &Config, args: LogArgs) -> Result<()> {
    let band = infer_band(args.band, &args.freq);
    let sent = args.sent.unwrap_or_else(|| config.default_rst_sent.clone());
    let rcvd = args.rcvd.unwrap_or_else(|| config.default_rst_recv.clone());

    let entry = QsoEntry::new(
        &args.call,
        band,
        &args.freq,
        args.mode,
        &sent,
        &rcvd,
        Utc::now(),
    )?;
    let record = encode_record(&entry);
    println!("{}", record);

    if args.dry_run {
        return Ok(());
    }

    let host = args.host.as_deref().unwrap_or(&config.udp_ip);
    let port = args.port.unwrap_or(config.udp_port);
    let transmitter = Transmitter::new(host, port)?;
    transmitter
        .send(&record)
        .await
        .context("Failed to log QSO")?;

    println!("QSO logged successfully for {}", entry.call());
    Ok(())
}

async fn run_lookup(config: &Config, callsign: &str, json: bool) -> Result<()> {
    if !config.has_directory_credentials() {
        anyhow::bail!(
            "QRZ.com credentials not configured; set qrz_username and qrz_password in the config file"
        );
    }

    let client = DirectoryClient::new(config.directory_config())?;
    let record = client
        .lookup_observed(callsign, |state| debug!("Lookup state: {:?}", state))
        .await
        .with_context(|| format!("QRZ lookup failed for {}", callsign.trim().to_uppercase()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let lines = record.summary_lines();
    if lines.is_empty() {
        println!("No additional information available");
    } else {
        for line in lines {
            println!("{}", line);
        }
    }
    if config.show_photo
        && let Some(image) = record.image()
    {
        println!("Photo: {}", image);
    }
    Ok(())
}

/// A parsed line of interactive input.
#[derive(Debug, Clone, PartialEq)]
enum SessionCommand {
    Call(String),
    Freq(String),
    Band(Band),
    Mode(Mode),
    Sent(String),
    Rcvd(String),
    Log,
    Clear,
    Show,
    Save,
    Help,
    Quit,
}

const SESSION_HELP: &str = "\
Commands:
  call <CALL>   set the callsign (triggers a QRZ lookup)
  freq <MHZ>    set the frequency
  band <BAND>   set the band, e.g. 20m
  mode <MODE>   set the mode, e.g. FT8
  sent <RST>    set the report sent
  rcvd <RST>    set the report received
  log           send the QSO to the logging program
  clear         reset all fields
  show          show the current form and station details
  save          save defaults and toggles to the config file
  help          show this help
  quit          leave the session";

/// Parse one line of session input.
fn parse_command(line: &str) -> Result<SessionCommand, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let needs_value = |name: &str| {
        if rest.is_empty() {
            Err(format!("'{}' needs a value", name))
        } else {
            Ok(rest.to_string())
        }
    };

    match word.to_ascii_lowercase().as_str() {
        "call" => Ok(SessionCommand::Call(rest.to_string())),
        "freq" => needs_value("freq").map(SessionCommand::Freq),
        "band" => rest
            .parse()
            .map(SessionCommand::Band)
            .map_err(|e| e.to_string()),
        "mode" => rest
            .parse()
            .map(SessionCommand::Mode)
            .map_err(|e| e.to_string()),
        "sent" => needs_value("sent").map(SessionCommand::Sent),
        "rcvd" => needs_value("rcvd").map(SessionCommand::Rcvd),
        "log" => Ok(SessionCommand::Log),
        "clear" => Ok(SessionCommand::Clear),
        "show" => Ok(SessionCommand::Show),
        "save" => Ok(SessionCommand::Save),
        "help" | "?" => Ok(SessionCommand::Help),
        "quit" | "exit" => Ok(SessionCommand::Quit),
        other => Err(format!("Unknown command '{}'; type 'help'", other)),
    }
}

fn mark(valid: bool) -> &'static str {
    if valid { "✓" } else { "✗" }
}

fn print_form(session: &Session<DirectoryClient>) {
    let form = session.form();
    println!("Call: {} {}", form.call, mark(form.call_valid()));
    println!("Freq: {} {}", form.frequency, mark(form.frequency_valid()));
    println!("Band: {}  Mode: {}", form.band, form.mode);
    println!("RST:  {} sent / {} rcvd", form.rst_sent, form.rst_recv);
    println!("Log:  {}", if session.can_log() { "ready" } else { "disabled" });
    print_station(session);
}

fn print_station(session: &Session<DirectoryClient>) {
    let station = session.station();
    if let Some(record) = &station.record {
        let lines = record.summary_lines();
        if lines.is_empty() {
            println!("No additional information available");
        }
        for line in lines {
            println!("  {}", line);
        }
    }
    if !station.status.is_empty() {
        println!("[{}]", station.status);
    }
}

async fn run_session(config: Config, config_path: Option<&Path>) -> Result<()> {
    config.validate()?;

    let transmitter = Transmitter::new(&config.udp_ip, config.udp_port)?;
    let directory = Arc::new(DirectoryClient::new(config.directory_config())?);
    if config.auto_lookup && !config.has_directory_credentials() {
        warn!("Auto-lookup enabled but QRZ.com credentials are not configured");
    }

    let (mut session, mut events) = Session::new(&config, directory, transmitter);
    info!("Session started, logging to {}:{}", config.udp_ip, config.udp_port);
    println!("{}", SESSION_HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            // Check for shutdown
            _ = signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }

            // Apply lookup results
            Some(event) = events.recv() => {
                if session.handle_lookup_event(event, Utc::now()) {
                    print_station(&session);
                }
            }

            // Process operator input
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }

                let command = match parse_command(&line) {
                    Ok(command) => command,
                    Err(e) => {
                        println!("{}", e);
                        continue;
                    }
                };

                match command {
                    SessionCommand::Call(text) => {
                        session.set_call(&text);
                        println!("Call: {} {}", text, mark(session.form().call_valid()));
                    }
                    SessionCommand::Freq(text) => {
                        session.set_frequency(&text);
                        println!("Freq: {} {}", text, mark(session.form().frequency_valid()));
                    }
                    SessionCommand::Band(band) => session.set_band(band),
                    SessionCommand::Mode(mode) => session.set_mode(mode),
                    SessionCommand::Sent(text) => session.set_rst_sent(&text),
                    SessionCommand::Rcvd(text) => session.set_rst_recv(&text),
                    SessionCommand::Log => {
                        if !session.can_log() {
                            println!("Cannot log yet: check callsign, frequency and reports");
                            continue;
                        }
                        match session.log_qso(Utc::now()).await {
                            Ok(logged) => println!(
                                "[{}] {} logged successfully",
                                Utc::now().format("%H:%M:%S"),
                                logged.entry.call()
                            ),
                            Err(e) => println!("Logging error: {}", e),
                        }
                    }
                    SessionCommand::Clear => session.clear_all(),
                    SessionCommand::Show => print_form(&session),
                    SessionCommand::Save => {
                        let updated = session.to_config(&config);
                        match save_config(&updated, config_path) {
                            Ok(path) => println!("Configuration saved to {}", path.display()),
                            Err(e) => println!("Error saving config: {:#}", e),
                        }
                    }
                    SessionCommand::Help => println!("{}", SESSION_HELP),
                    SessionCommand::Quit => break,
                }
            }
        }
    }

    println!("{} QSO(s) logged this session", session.history().len());
    Ok(())
}

fn save_config(config: &Config, path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(path) => {
            config.save_to(path)?;
            Ok(path.to_path_buf())
        }
        None => config.save(),
    }
}

fn run_config(config: &Config, path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => match path {
            Some(path) => println!("{}", path.display()),
            None => println!("No configuration directory on this platform"),
        },
        ConfigAction::Show => {
            let mut shown = config.clone();
            if !shown.qrz_password.is_empty() {
                shown.qrz_password = "********".to_string();
            }
            print!("{}", toml::to_string_pretty(&shown)?);
        }
        ConfigAction::Init => {
            let path = path.context("No configuration directory on this platform")?;
            if path.exists() {
                anyhow::bail!("Config file already exists: {}", path.display());
            }
            Config::default().save_to(path)?;
            println!("Wrote {}", path.display());
        }
    }
    Ok(())
}
