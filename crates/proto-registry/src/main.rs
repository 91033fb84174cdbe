/*
 * SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
 * SPDX-License-Identifier: LicenseRef-NvidiaProprietary
 *
 * NVIDIA CORPORATION, its affiliates and licensors retain all intellectual
 * property and proprietary rights in and to this material, related
 * documentation and any modifications thereto. Any use, reproduction,
 * disclosure or distribution of this material and related documentation
 * without an express license agreement from NVIDIA CORPORATION or
 * its affiliates is strictly prohibited.
 */
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use proto_registry::config::{ConfigError, Defaults, RegistryConfig};
use proto_registry::{
    Direction, ProtoRegistryError, ProtobufComponent, RouteCodec, SchemaStore,
};
use tracing::metadata::LevelFilter;

#[tokio::main(flavor = "multi_thread")]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(&cli);

    match cli.command {
        Command::Run(config_args) => {
            run(config_args.try_into()?).await?;
        }
        Command::DefaultConfig => {
            print!("{}", RegistryConfig::default().into_annotated_config_file())
        }
        Command::Check(command) => {
            let codec = load_codec(command.config.try_into()?);
            match codec.check(command.direction, &command.route) {
                Some(schema) => {
                    println!("{} -> {}", command.route, schema.full_name());
                    for field in schema.field_names() {
                        println!("  {field}");
                    }
                }
                None => {
                    return Err(CliError::Registry(ProtoRegistryError::route_not_found(
                        command.direction,
                        &command.route,
                    ))
                    .into());
                }
            }
        }
        Command::Encode(command) => {
            let codec = load_codec(command.config.try_into()?);
            let message: serde_json::Value =
                serde_json::from_str(&command.message).map_err(CliError::InvalidMessageJson)?;
            let bytes = codec
                .encode_for(command.direction, &command.route, &message)
                .map_err(CliError::Registry)?;
            println!("{}", hex::encode(bytes));
        }
        Command::Decode(command) => {
            let codec = load_codec(command.config.try_into()?);
            let bytes = hex::decode(command.payload.trim()).map_err(CliError::InvalidHex)?;
            let message = codec
                .decode_for(command.direction, &command.route, &bytes)
                .map_err(CliError::Registry)?;
            println!("{}", serde_json::to_string_pretty(&message)?);
        }
        Command::Snapshot(config_args) => {
            let codec = load_codec(config_args.try_into()?);
            println!("{}", serde_json::to_string_pretty(&codec.store().snapshot())?);
        }
        Command::Routes(config_args) => {
            let codec = load_codec(config_args.try_into()?);
            for direction in Direction::ALL {
                match codec.store().schema_set(direction) {
                    Some(set) => {
                        println!("{direction}:");
                        for route in set.route_names() {
                            println!("  {route}");
                        }
                    }
                    None => println!("{direction}: unavailable"),
                }
            }
        }
    }

    Ok(())
}

// run starts the component and keeps it watching descriptor files
// until interrupted.
async fn run(config: RegistryConfig) -> Result<(), CliError> {
    let poll_interval = config.poll_interval;
    let component = ProtobufComponent::new(config);
    let report = component.start().map_err(CliError::Registry)?;
    let mut version = report.version;

    let mut ticker = tokio::time::interval(poll_interval.max(Duration::from_millis(100)));
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(CliError::Signal)?;
                break;
            }
            _ = ticker.tick() => {
                let current = component.version();
                if current != version {
                    tracing::info!(previous = version, current, "Protos version changed");
                    version = current;
                }
            }
        }
    }

    component.stop_and_wait().await;
    Ok(())
}

// load_codec loads both descriptors once, without watching them.
fn load_codec(config: RegistryConfig) -> RouteCodec {
    let store = Arc::new(SchemaStore::new());
    store.initialize(&config.server_protos_path(), &config.client_protos_path());
    RouteCodec::with_options(store, config.codec)
}

#[derive(clap::Parser, Debug)]
struct Cli {
    #[clap(long, short, help = "Turn on debug loggging (same as RUST_LOG=debug)")]
    debug: bool,
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Parser, Debug)]
enum Command {
    #[clap(about = "Load descriptors and reload them whenever they change")]
    Run(ConfigArgs),
    #[clap(about = "Output a default TOML config file for use with -c")]
    DefaultConfig,
    #[clap(about = "Show which message a route resolves to")]
    Check(RouteCommand),
    #[clap(about = "Encode a JSON message and print the bytes as hex")]
    Encode(EncodeCommand),
    #[clap(about = "Decode hex bytes and print the message as JSON")]
    Decode(DecodeCommand),
    #[clap(about = "Print the loaded descriptors and protos version as JSON")]
    Snapshot(ConfigArgs),
    #[clap(about = "List the routes available in each direction")]
    Routes(ConfigArgs),
}

#[derive(clap::Args, Debug)]
struct ConfigArgs {
    #[clap(long, short, help = "Path to TOML configuration file")]
    config: Option<PathBuf>,
    #[clap(
        long,
        env = "PROTOS_BASE_DIR",
        help = format!("Directory descriptor paths are resolved against. Default to PROTOS_BASE_DIR environment variable or {}", Defaults::base_dir().display())
    )]
    base_dir: Option<PathBuf>,
    #[clap(long, help = "Path to the server protos descriptor, overriding configuration file")]
    server_protos: Option<PathBuf>,
    #[clap(long, help = "Path to the client protos descriptor, overriding configuration file")]
    client_protos: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
struct RouteCommand {
    #[clap(flatten)]
    config: ConfigArgs,
    #[clap(long, value_enum, default_value_t = Direction::Server)]
    direction: Direction,
    route: String,
}

#[derive(clap::Args, Debug)]
struct EncodeCommand {
    #[clap(flatten)]
    config: ConfigArgs,
    #[clap(long, value_enum, default_value_t = Direction::Server)]
    direction: Direction,
    route: String,
    #[clap(help = "Message as a JSON object")]
    message: String,
}

#[derive(clap::Args, Debug)]
struct DecodeCommand {
    #[clap(flatten)]
    config: ConfigArgs,
    #[clap(long, value_enum, default_value_t = Direction::Client)]
    direction: Direction,
    route: String,
    #[clap(help = "Message bytes as hex")]
    payload: String,
}

impl TryInto<RegistryConfig> for ConfigArgs {
    type Error = CliError;

    // Load the config file, or the default, allowing CLI flags to override the corresponding settings.
    fn try_into(self) -> Result<RegistryConfig, Self::Error> {
        let mut config = if let Some(config_path) = self.config {
            RegistryConfig::load(&config_path)?
        } else {
            RegistryConfig::default()
        };

        if let Some(base_dir) = self.base_dir {
            config.base_dir = base_dir;
        }
        if let Some(server_protos) = self.server_protos {
            config.server_protos = server_protos;
        }
        if let Some(client_protos) = self.client_protos {
            config.client_protos = client_protos;
        }

        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Registry(ProtoRegistryError),
    #[error("Message is not valid JSON: {0}")]
    InvalidMessageJson(serde_json::Error),
    #[error("Payload is not valid hex: {0}")]
    InvalidHex(hex::FromHexError),
    #[error("Failed to wait for shutdown signal: {0}")]
    Signal(std::io::Error),
}

fn setup_logging(cli: &Cli) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = if cli.debug {
        Some(LevelFilter::DEBUG)
    } else {
        None
    };

    if let Err(e) = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::Layer::default().compact())
        .with(
            EnvFilter::builder()
                .with_default_directive(level.map(Into::into).unwrap_or(LevelFilter::INFO.into()))
                .from_env_lossy(),
        )
        .try_init()
    {
        panic!(
            "Failed to initialize trace logging for proto-registry. It's possible some earlier \
            code path has already set a global default log subscriber: {e}"
        );
    }
}
