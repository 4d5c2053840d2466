use anyhow::{Context, Result};
use log::info;
use serde_json::Value;
use server_events::library::communication::bridge::RedisEventBridge;
use server_events::library::communication::implementation::redis::RedisTransport;
use server_events::library::communication::trigger::{EventId, TriggerConfig};
use server_events::library::communication::RemoteError;
use server_events::options::{RedisOptions, TimeoutOptions};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(about = "Publish and await one-shot events over Redis PubSub")]
struct MainOptions {
    /// Log level, scopable to different modules
    ///
    /// Levels: trace, debug, info, warn, error
    #[structopt(
        short,
        long,
        global = true,
        default_value = "warn",
        env = "RUST_LOG",
        value_name = "level"
    )]
    log: String,

    #[structopt(flatten)]
    redis: RedisOptions,

    #[structopt(flatten)]
    timeout: TimeoutOptions,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Publish an event
    Emit {
        /// Name of the event
        name: String,
        /// Identifier of the event, numeric ids are sent as numbers
        id: String,
        /// Arguments, each parsed as JSON and sent as a plain string otherwise
        args: Vec<String>,
        /// Report a failure with the given message instead of sending arguments
        #[structopt(long, value_name = "message", conflicts_with = "args")]
        fail: Option<String>,
    },
    /// Wait for an event and print its arguments as JSON
    Wait {
        /// Name of the event
        name: String,
        /// Identifier of the event, numeric ids are matched as numbers
        id: String,
    },
    /// Verify that the Redis server is reachable
    Ping,
}

fn parse_id(id: String) -> EventId {
    match id.parse::<i64>() {
        Ok(numeric) => EventId::Integer(numeric),
        Err(_) => EventId::Text(id),
    }
}

fn parse_argument(argument: String) -> Value {
    serde_json::from_str(&argument).unwrap_or(Value::String(argument))
}

#[tokio::main]
async fn main() -> Result<()> {
    let options = MainOptions::from_args();

    pretty_env_logger::formatted_timed_builder()
        .parse_filters(&options.log)
        .init();

    let transport = RedisTransport::open(&options.redis.url)
        .map_err(|e| anyhow::anyhow!(e))
        .context("invalid redis url")?;
    let bridge = RedisEventBridge::from_factory(&transport, TriggerConfig::from(&options.timeout));

    match options.cmd {
        Command::Emit {
            name,
            id,
            args,
            fail,
        } => {
            let id = parse_id(id);

            match fail {
                Some(message) => {
                    bridge
                        .emit_error(&name, id, RemoteError::message(message))
                        .await?
                }
                None => {
                    let args = args.into_iter().map(parse_argument).collect();
                    bridge.emit(&name, id, args).await?
                }
            }

            info!("Emitted {}", name);
        }
        Command::Wait { name, id } => {
            let arguments = bridge.on(&name, parse_id(id), None).await?.await?;
            println!("{}", serde_json::to_string(&arguments)?);
        }
        Command::Ping => {
            bridge.ready().await?;
            info!("Connected to {}", options.redis.url);
            println!("PONG");
        }
    }

    Ok(())
}
