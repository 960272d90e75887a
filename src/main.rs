mod airports;
mod error;
mod index;
mod metar;
mod relay;
mod request;
mod util;

use clap::{Parser, Subcommand};
use index::AirportIndex;
use log::{error, info, warn, LevelFilter};
use metar::NoaaWeather;
use serde::{Deserialize, Serialize};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fmt::Display;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

const CONFIG_FILENAME: &str = "config.json";
const LOG_DIRECTORY: &str = "logs";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = CONFIG_FILENAME)]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer alternate airport requests from the simulator plugin
    Serve,
    /// Print the alternates for a single position
    Query {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
        /// Altitude in feet, enables the glide range filter
        #[arg(short, long)]
        altitude: Option<f64>,
    },
    /// Download current METARs for every eligible airport into the snapshot file
    FetchMetars,
}

#[derive(Deserialize, Serialize, Debug, PartialEq)]
#[serde(default)]
struct ConfigData {
    airport_data: PathBuf,
    metar_data: PathBuf,
    min_runway_length_ft: f64,
    result_count: usize,
    use_glide_range: bool,
    listen_address: String,
    metar_threads: u32,
}

impl Default for ConfigData {
    fn default() -> Self {
        Self {
            airport_data: PathBuf::from("data/all_apts.csv"),
            metar_data: PathBuf::from("data/metars.csv"),
            min_runway_length_ft: index::DEFAULT_MIN_RUNWAY_LENGTH_FT,
            result_count: index::DEFAULT_RESULT_COUNT,
            use_glide_range: false,
            listen_address: "127.0.0.1:5555".to_string(),
            metar_threads: 4,
        }
    }
}

fn read_config(path: &Path) -> Result<ConfigData, error::Error> {
    let file = File::open(path)?;
    Ok(serde_json::from_reader(file)?)
}

fn write_default_config(path: &Path) -> Result<ConfigData, error::Error> {
    let config = ConfigData::default();
    serde_json::to_writer_pretty(File::create(path)?, &config)?;
    Ok(config)
}

/// Writes a default config only when none exists. A config that fails to parse is left untouched.
fn read_or_create_config(path: &Path) -> Result<ConfigData, String> {
    match read_config(path) {
        Ok(config) => Ok(config),
        Err(error::Error::IOError(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            match write_default_config(path) {
                Ok(_) => Err(format!(
                    "Could not read {}! Please check the data paths in the newly created file.",
                    path.display()
                )),
                Err(e) => Err(format!(
                    "Could not create {}! Reason: {}",
                    path.display(),
                    e
                )),
            }
        }
        Err(e) => Err(format!(
            "Could not read {}! Reason: {}",
            path.display(),
            e
        )),
    }
}

fn display_msg_and_exit(msg: impl Display) -> ! {
    println!("{}\nPress the enter key to exit.", msg);
    // Wait for enter key
    let mut buf = String::new();
    std::io::stdin().read_line(&mut buf).ok();
    std::process::exit(1);
}

fn setup_logging(to_file: bool) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Stdout,
        ColorChoice::Auto,
    ));
    if !to_file {
        CombinedLogger::init(loggers).ok();
        return;
    }

    let log_path = Path::new(LOG_DIRECTORY).join(format!(
        "altnfinder_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = std::fs::create_dir_all(LOG_DIRECTORY).and_then(|_| File::create(&log_path));

    match file {
        Ok(file) => {
            loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
            CombinedLogger::init(loggers).ok();
            info!("Logging to {}", log_path.display());
        }
        Err(e) => {
            CombinedLogger::init(loggers).ok();
            warn!("Could not create log file {}: {}", log_path.display(), e);
        }
    }
}

fn load_index(config: &ConfigData, with_weather: bool) -> Result<AirportIndex, error::Error> {
    let airports = airports::load_airports(&config.airport_data)?;

    let weather = if with_weather {
        match metar::load_metars(&config.metar_data) {
            Ok(weather) => weather,
            // Running without weather is better than not running
            Err(e) => {
                warn!("No METARs loaded, {}", e);
                Default::default()
            }
        }
    } else {
        Default::default()
    };

    AirportIndex::build(
        airports,
        &weather,
        config.min_runway_length_ft,
        config.result_count,
    )
}

fn handle_client(stream: TcpStream, index: Arc<AirportIndex>, use_glide_range: bool) {
    let addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_default();

    let mut writer = match stream.try_clone() {
        Ok(w) => w,
        Err(e) => {
            error!("Could not set up connection {}: {}", addr, e);
            return;
        }
    };

    for line in BufReader::new(stream).lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Could not read request from {}: {}", addr, e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let reply = relay::handle_message(&index, use_glide_range, &line);
        match &reply {
            relay::Reply::Ok { airports, .. } => {
                info!("Sent {} alternates to {}", airports.len(), addr)
            }
            relay::Reply::Error { message } => warn!("Bad request from {}: {}", addr, message),
        }

        let mut text = match serde_json::to_string(&reply) {
            Ok(t) => t,
            Err(e) => {
                error!("Could not encode reply: {}", e);
                continue;
            }
        };
        text.push('\n');

        if writer.write_all(text.as_bytes()).is_err() {
            break;
        }
    }

    info!("Connection closed {}", addr);
}

fn serve(config: &ConfigData) {
    let index = match load_index(config, true) {
        Ok(index) => Arc::new(index),
        Err(e) => display_msg_and_exit(format!("Could not load airports! Reason: {}", e)),
    };

    if index.is_empty() {
        warn!("No airport is eligible, every request will get an empty list");
    }
    info!(
        "Suggesting {} of {} airports with at least {} ft of runway",
        index.result_count(),
        index.len(),
        index.min_runway_length_ft()
    );

    // Bind TCP server
    let listener = match TcpListener::bind(&config.listen_address) {
        Ok(l) => l,
        Err(e) => display_msg_and_exit(format!("Could not start server! Reason: {}", e)),
    };

    info!("Waiting for connections on {}...", config.listen_address);

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                warn!("Connection failed: {}", e);
                continue;
            }
        };

        info!(
            "Connection established! {}",
            stream
                .peer_addr()
                .map(|a| a.to_string())
                .unwrap_or_default()
        );

        let index = index.clone();
        let use_glide_range = config.use_glide_range;
        thread::spawn(move || handle_client(stream, index, use_glide_range));
    }
}

fn query(config: &ConfigData, latitude: f64, longitude: f64, altitude: Option<f64>) {
    let index = match load_index(config, true) {
        Ok(index) => index,
        Err(e) => display_msg_and_exit(format!("Could not load airports! Reason: {}", e)),
    };

    match index.get_closest_airports(latitude, longitude, altitude) {
        Ok(candidates) => println!("{}", relay::format_alternates(&candidates)),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

fn fetch_metars(config: &ConfigData) {
    // The snapshot being replaced is not needed to pick stations
    let index = match load_index(config, false) {
        Ok(index) => index,
        Err(e) => display_msg_and_exit(format!("Could not load airports! Reason: {}", e)),
    };

    let icaos = index.icaos();
    info!("Fetching METARs for {} airports...", icaos.len());

    let weather = NoaaWeather::new(config.metar_threads);
    weather.run();
    let metars = weather.fetch_all(&icaos);
    weather.stop();

    let written = File::create(&config.metar_data)
        .map_err(error::Error::from)
        .and_then(|file| metar::write_metars(file, &icaos, &metars));

    match written {
        Ok(count) => info!(
            "Wrote {} METARs to {}",
            count,
            config.metar_data.display()
        ),
        Err(e) => display_msg_and_exit(format!(
            "Could not write {}! Reason: {}",
            config.metar_data.display(),
            e
        )),
    }
}

fn main() {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);

    setup_logging(matches!(command, Commands::Serve));

    // Read from config
    let config = match read_or_create_config(&cli.config) {
        Ok(config) => config,
        Err(msg) => display_msg_and_exit(msg),
    };

    match command {
        Commands::Serve => serve(&config),
        Commands::Query {
            latitude,
            longitude,
            altitude,
        } => query(&config, latitude, longitude, altitude),
        Commands::FetchMetars => fetch_metars(&config),
    }
}
