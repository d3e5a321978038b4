//! Subcommand implementations.
//!
//! Formatting is kept in plain functions returning `String` so the output
//! can be tested without sockets.

use crate::cli::{Args, Command};
use anyhow::Context;
use seascape_bus::adapters::ZmqTransport;
use seascape_bus::{BusConfig, ConfigError, EndpointResolver, ReliableClient, Subscriber};
use seascape_types::{Broadcast, Params, Request, Topic, TopicFilter};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Bad command-line input.
#[derive(Debug, Error)]
#[error("invalid {what}: {reason}")]
pub struct InvalidInput {
    pub what: &'static str,
    pub reason: String,
}

/// A subscription ended with a failure broadcast.
#[derive(Debug, Error)]
#[error("subscription to {service} ended: {message}")]
pub struct SubscriptionEnded {
    pub service: String,
    pub message: String,
}

fn invalid(what: &'static str, reason: impl ToString) -> InvalidInput {
    InvalidInput {
        what,
        reason: reason.to_string(),
    }
}

/// Load `path`, or the defaults when no file was given.
pub fn load_config(path: Option<&Path>) -> Result<BusConfig, ConfigError> {
    match path {
        Some(path) => BusConfig::load(path),
        None => Ok(BusConfig::default()),
    }
}

pub fn parse_params(json: &str) -> Result<Params, InvalidInput> {
    match serde_json::from_str::<Value>(json) {
        Ok(Value::Object(map)) => Ok(Params::from(map)),
        Ok(_) => Err(invalid("params", "expected a JSON object")),
        Err(e) => Err(invalid("params", e)),
    }
}

pub fn parse_filter(json: &str) -> Result<TopicFilter, InvalidInput> {
    let value: Value = serde_json::from_str(json).map_err(|e| invalid("filter", e))?;
    TopicFilter::from_json(&value).map_err(|e| invalid("filter", e))
}

pub fn describe_topic(topic: &str) -> Result<String, InvalidInput> {
    let topic = Topic::parse(topic).map_err(|e| invalid("topic", e))?;
    let mut out = format!("topic: {topic}\nlevel: {}\n", topic.level());
    let labels = ["organization", "project", "network_id", "group", "name", "method"];
    for (level, label) in (1u8..).zip(labels) {
        if let Some(value) = topic.field(level).filter(|v| !v.is_empty()) {
            out.push_str(&format!("  {level} {label}: {value}\n"));
        }
    }
    Ok(out)
}

pub fn describe_filter(json: &str) -> Result<String, InvalidInput> {
    let filter = parse_filter(json)?;
    let mut out = format!("key: {}\n", filter.key());
    out.push_str(&format!("json: {}\n", filter.to_json()));
    let counts: Vec<String> = (1u8..=6).map(|level| filter.len(level).to_string()).collect();
    out.push_str(&format!(
        "levels: {} (total {})\n",
        counts.join(" "),
        filter.len(0)
    ));
    Ok(out)
}

/// One broadcast per line: topic, tab, reply JSON.
pub fn render_broadcast(broadcast: &Broadcast) -> String {
    let reply = broadcast
        .reply()
        .encode()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();
    format!("{}\t{}", broadcast.topic(), reply)
}

pub fn render_endpoints(config: &BusConfig) -> String {
    let mut out = String::new();
    for endpoint in &config.endpoints {
        out.push_str(&format!("{}\t{}", endpoint.name, endpoint.url()));
        if let Ok(broadcast) = endpoint.broadcast() {
            out.push_str(&format!("\t{}", broadcast.url()));
        }
        out.push('\n');
    }
    out
}

pub async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;

    match args.command {
        Command::Request {
            service,
            command,
            params,
        } => {
            let params = parse_params(&params)?;
            let registry = config.registry()?;
            let mut client = ReliableClient::for_service(
                &registry,
                &service,
                Arc::new(ZmqTransport::new()),
                config.transport,
            )?;
            let request = Request::new(command).with_params(params);
            let reply = client.request_reply(&request).await?;
            if !reply.message.is_empty() {
                eprintln!("{}", reply.message);
            }
            println!(
                "{}",
                serde_json::to_string_pretty(&Value::from(reply.params))
                    .context("reply parameters could not be printed")?
            );
        }

        Command::Subscribe {
            service,
            filter,
            count,
        } => {
            let filter = parse_filter(&filter)?;
            let registry = config.registry()?;
            let endpoint = registry.resolve(&service).map_err(seascape_bus::TransportError::from)?;
            let transport = Arc::new(ZmqTransport::new());
            let subscriber = Subscriber::new(endpoint, transport.clone(), transport)
                .with_transport_config(config.transport)
                .with_config(config.subscriber);
            let mut subscription = subscriber.subscribe(filter);
            info!(service = %service, subscriber = %subscriber.address(), "Subscribed");

            let mut seen = 0usize;
            loop {
                let next = tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        subscription.cancel();
                        break;
                    }
                    next = subscription.recv() => next,
                };
                let Some(broadcast) = next else { break };
                if !broadcast.is_ok() {
                    return Err(SubscriptionEnded {
                        service,
                        message: broadcast.into_reply().message,
                    }
                    .into());
                }
                println!("{}", render_broadcast(&broadcast));
                seen += 1;
                if count.is_some_and(|limit| seen >= limit) {
                    subscription.cancel();
                    break;
                }
            }
        }

        Command::Topic { topic } => print!("{}", describe_topic(&topic)?),

        Command::Filter { filter } => print!("{}", describe_filter(&filter)?),

        Command::Endpoints => print!("{}", render_endpoints(&config)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seascape_bus::Endpoint;
    use seascape_types::Reply;

    #[test]
    fn test_describe_topic() {
        let out = describe_topic("seascape.core.1").unwrap();
        assert!(out.starts_with("topic: seascape.core.1\nlevel: 3\n"));
        assert!(out.contains("  3 network_id: 1\n"));
        assert!(!out.contains("group"));
    }

    #[test]
    fn test_describe_topic_rejects_single_segment() {
        let err = describe_topic("seascape").unwrap_err();
        assert_eq!(err.what, "topic");
        assert!(err.reason.contains("at least organization and project required"));
    }

    #[test]
    fn test_describe_filter() {
        let out = describe_filter(r#"{"o":["seascape"],"m":["transfer"],"e":["Transfer"]}"#)
            .unwrap();
        assert!(out.starts_with("key: o:seascape;m:transfer;e:Transfer;\n"));
        assert!(out.contains("levels: 1 0 0 0 0 2 (total 3)\n"));
    }

    #[test]
    fn test_parse_params_requires_object() {
        assert!(parse_params(r#"{"a":1}"#).is_ok());
        assert_eq!(parse_params("[1]").unwrap_err().what, "params");
        assert!(parse_params("{").is_err());
    }

    #[test]
    fn test_render_broadcast() {
        let broadcast = Broadcast::new("seascape.core", Reply::ok(Params::new())).unwrap();
        assert_eq!(
            render_broadcast(&broadcast),
            "seascape.core\t{\"status\":\"ok\",\"message\":\"\",\"params\":{}}"
        );
    }

    #[test]
    fn test_render_endpoints() {
        let config = BusConfig {
            endpoints: vec![
                Endpoint::new("indexer", "127.0.0.1", 4000).with_broadcast_port(4001),
                Endpoint::new("reader", "127.0.0.1", 4100),
            ],
            ..Default::default()
        };
        assert_eq!(
            render_endpoints(&config),
            "indexer\ttcp://127.0.0.1:4000\ttcp://127.0.0.1:4001\nreader\ttcp://127.0.0.1:4100\n"
        );
    }

    #[test]
    fn test_load_config_without_path_is_default() {
        assert_eq!(load_config(None).unwrap(), BusConfig::default());
    }
}
