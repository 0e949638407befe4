use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use route_sequencer::error::ErrorKind;
use route_sequencer::gemini::{GeminiClient, GeminiConfig};
use route_sequencer::geocode::{NominatimClient, NominatimConfig};
use route_sequencer::osrm::{OsrmClient, OsrmConfig};
use route_sequencer::{Error, ErrorResponse, Planner, PlannerOptions, Result, RouteRequest};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

/// Plan the visiting order of a multi-stop delivery route.
#[derive(Debug, Parser)]
#[command(name = "route-sequencer", version)]
struct Cli {
    /// Request JSON file; reads stdin when omitted or "-".
    input: Option<PathBuf>,

    /// OSRM base URL; without it segments are ordered locally.
    #[arg(long)]
    osrm_url: Option<String>,

    /// Timeout for each external call, in seconds.
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Most points per trip request.
    #[arg(long, default_value_t = PlannerOptions::default().max_batch_size)]
    max_batch_size: usize,

    /// Maximum 2-opt passes per segment.
    #[arg(long, default_value_t = PlannerOptions::default().local_search_iterations)]
    local_search_iterations: usize,

    /// Use Gemini (GEMINI_API_KEY) when stops lack coordinates.
    #[arg(long)]
    oracle: bool,

    /// Resolve missing coordinates through Nominatim first.
    #[arg(long)]
    geocode: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,
}

fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match format {
        LogFormat::Pretty => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn read_request(input: Option<&PathBuf>) -> Result<RouteRequest> {
    let text = match input {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)?,
        _ => {
            let mut text = String::new();
            io::stdin().read_to_string(&mut text)?;
            text
        }
    };
    serde_json::from_str(&text).map_err(|err| Error::validation(format!("request is not valid JSON: {err}")))
}

fn run(cli: &Cli) -> Result<String> {
    let request = read_request(cli.input.as_ref())?;

    let osrm = cli
        .osrm_url
        .as_ref()
        .map(|base_url| {
            OsrmClient::new(OsrmConfig {
                base_url: base_url.clone(),
                timeout_secs: cli.timeout_secs,
            })
        })
        .transpose()?;
    let gemini = if cli.oracle {
        let mut config = GeminiConfig::from_env()?;
        config.timeout_secs = cli.timeout_secs;
        Some(GeminiClient::new(config)?)
    } else {
        None
    };
    let nominatim = if cli.geocode {
        Some(NominatimClient::new(NominatimConfig {
            timeout_secs: cli.timeout_secs,
            ..NominatimConfig::default()
        })?)
    } else {
        None
    };

    let mut planner = Planner::new(PlannerOptions {
        max_batch_size: cli.max_batch_size,
        local_search_iterations: cli.local_search_iterations,
    });
    if let Some(osrm) = &osrm {
        planner = planner.with_trip_optimizer(osrm);
    }
    if let Some(gemini) = &gemini {
        planner = planner.with_oracle(gemini);
    }
    if let Some(nominatim) = &nominatim {
        planner = planner.with_resolver(nominatim);
    }

    let response = planner.plan(&request)?;
    Ok(serde_json::to_string_pretty(&response)?)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_format);

    match run(&cli) {
        Ok(body) => {
            println!("{body}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            let body = ErrorResponse::from(&err);
            match serde_json::to_string_pretty(&body) {
                Ok(json) => println!("{json}"),
                Err(_) => eprintln!("{err}"),
            }
            match err.kind() {
                ErrorKind::Client => ExitCode::from(2),
                ErrorKind::Upstream => ExitCode::from(3),
                ErrorKind::Cancelled | ErrorKind::Internal => ExitCode::FAILURE,
            }
        }
    }
}
