//! wsdot CLI - Query the WSDOT/WSF traveler information APIs

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use wsdot::transport::TransportKind;
use wsdot::{ApiClient, ApiClientBuilder, ClientConfig, FetchFunctions, create_fetch_functions};
use wsdot_define::{EndpointMeta, Shape};
use wsdot_definitions::all_apis;

#[derive(Parser)]
#[command(name = "wsdot")]
#[command(about = "Query the WSDOT/WSF traveler information APIs", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    log_verbosity: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List every known endpoint
    Endpoints {
        /// Only show endpoints of this API (e.g. "wsf-vessels")
        #[arg(long, value_name = "API")]
        api: Option<String>,
    },

    /// Fetch an endpoint and print the validated JSON
    Fetch {
        /// Function name (e.g. "vesselBasicsByVesselId" or "fetchVesselBasics")
        #[arg(value_name = "FUNCTION")]
        function: String,

        /// Input parameter (repeatable: -p VesselID=74)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Use the endpoint's sample parameters
        #[arg(long, conflicts_with = "params")]
        sample: bool,

        /// Transport to use [default: $WSDOT_TRANSPORT or "direct"]
        #[arg(long, value_name = "direct|script")]
        transport: Option<TransportKind>,

        /// Base URL override for the endpoint's API
        #[arg(long, value_name = "URL")]
        base_url: Option<String>,
    },
}

/// Initialize tracing subscriber based on verbosity and output format
fn init_tracing(verbose: u8, json: bool) {
    let base_filter = match std::env::var("RUST_LOG") {
        Ok(filter) => filter,
        Err(_) => match verbose {
            0 => "warn".to_string(),
            1 => "warn,wsdot=info".to_string(),
            2 => "info,wsdot=debug".to_string(),
            _ => "debug,wsdot=trace".to_string(),
        },
    };

    let filter = EnvFilter::try_new(&base_filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_file(verbose >= 3)
                    .with_line_number(verbose >= 3)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    }
}

/// Every API's fetch functions, one registry per API.
fn registries() -> Result<Vec<FetchFunctions>, Box<dyn std::error::Error>> {
    let mut registries = Vec::new();
    for (api, groups) in all_apis() {
        let mut groups = groups.iter();
        let Some(first) = groups.next() else {
            continue;
        };
        let mut functions = create_fetch_functions(&api, first)?;
        for group in groups {
            functions.extend(group)?;
        }
        registries.push(functions);
    }
    Ok(registries)
}

fn list_endpoints(api_filter: Option<&str>) {
    for (api, groups) in all_apis() {
        if api_filter.is_some_and(|name| name != api.name) {
            continue;
        }
        println!("{} ({})", api.name, api.base_url);
        for group in groups {
            for endpoint in &group.endpoints {
                println!(
                    "  {:<28} {:<9} {}",
                    endpoint.function_name, group.cache_strategy, endpoint.endpoint
                );
            }
        }
    }
}

/// Converts `KEY=VALUE` pairs into an input object, typing each value by
/// the field's shape.
fn parse_params(meta: &EndpointMeta, params: &[String]) -> Result<Value, String> {
    let mut input = Map::new();
    for param in params {
        let (key, raw) = param
            .split_once('=')
            .ok_or_else(|| format!("parameter '{param}' is not KEY=VALUE"))?;
        let typed = match meta.input.field(key).map(|f| f.shape.inner()) {
            Some(Shape::Integer | Shape::Number | Shape::Boolean) => {
                serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
            }
            _ => Value::String(raw.to_string()),
        };
        input.insert(key.to_string(), typed);
    }
    Ok(Value::Object(input))
}

async fn fetch(
    function: &str,
    params: &[String],
    sample: bool,
    transport: Option<TransportKind>,
    base_url: Option<String>,
) -> Result<Value, Box<dyn std::error::Error>> {
    let registries = registries()?;
    let (functions, endpoint) = registries
        .iter()
        .find_map(|functions| functions.get(function).map(|e| (functions, e)))
        .ok_or_else(|| format!("Function '{function}' not found. Run 'wsdot endpoints' to list them."))?;

    let input = if sample {
        endpoint.meta().sample_params.clone()
    } else if params.is_empty() {
        Value::Null
    } else {
        parse_params(endpoint.meta(), params)?
    };

    let mut builder = ApiClientBuilder::from_config(ClientConfig::from_env()?);
    if let Some(kind) = transport {
        builder = builder.transport_kind(kind);
    }
    if let Some(base_url) = base_url {
        builder = builder.base_url_override(&functions.api().name, base_url);
    }
    let client: ApiClient = builder.build()?;

    tracing::info!(function = endpoint.function_name(), %input, "fetching");
    Ok(endpoint.fetch_value(&client, input).await?)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.log_verbosity, cli.json);

    match cli.command {
        Commands::Endpoints { api } => {
            list_endpoints(api.as_deref());
            ExitCode::SUCCESS
        }
        Commands::Fetch {
            function,
            params,
            sample,
            transport,
            base_url,
        } => match fetch(&function, &params, sample, transport, base_url).await {
            Ok(value) => match serde_json::to_string_pretty(&value) {
                Ok(json) => {
                    println!("{json}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("Error: {e}");
                    ExitCode::FAILURE
                }
            },
            Err(e) => {
                match e.downcast_ref::<wsdot::RequestError>() {
                    Some(err) => eprintln!("Error [{}]: {err}", err.kind()),
                    None => eprintln!("Error: {e}"),
                }
                ExitCode::FAILURE
            }
        },
    }
}
