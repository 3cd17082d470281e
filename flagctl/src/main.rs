use clap::{Parser, Subcommand, ValueEnum};
use flagsvc::{FlagSvc, RequestContext, RequestFlags};
use metrics_exporter_statsd::StatsdBuilder;
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod config;
mod errors;
mod service;
#[cfg(test)]
mod testutils;

use config::{Config, LoggingConfig, MetricsConfig};
use errors::CliError;
use service::FlagService;

#[derive(Parser)]
#[command(version, about = "Resolve feature flags from per-host documents")]
struct Cli {
    #[arg(long, global = true, default_value = "flagctl.yaml")]
    config_path: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Resolve one flag and print it
    Get {
        /// Dot-separated flag path, e.g. `checkout.enabled`
        path: String,
        #[arg(long, default_value = "")]
        host: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long = "as", value_enum, default_value_t = ValueKind::Json)]
        kind: ValueKind,
    },
    /// Fetch the document of a host and report whether it loads
    Check {
        #[arg(long, default_value = "")]
        host: String,
    },
    /// Serve flags over HTTP
    Serve,
}

#[derive(Clone, Copy, Debug, PartialEq, ValueEnum)]
enum ValueKind {
    String,
    Bool,
    Int,
    Float,
    Slice,
    Map,
    Json,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config_path) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::FAILURE;
        }
    };

    let _sentry = init_logging(config.common.logging.as_ref());

    if let Some(metrics_config) = &config.common.metrics
        && let Err(err) = init_metrics(metrics_config)
    {
        tracing::error!(error = %err, "Failed to set up metrics");
        return ExitCode::FAILURE;
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(err) => {
            tracing::error!(error = %err, "Failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(run(cli.command, config)) {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "flagctl failed");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so `get` output stays clean. Events are forwarded to
/// Sentry when a DSN is configured; the returned guard flushes on drop.
fn init_logging(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let level = config.and_then(|c| c.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let guard = config
        .and_then(|c| c.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });
    let sentry_layer = guard
        .as_ref()
        .map(|_| sentry::integrations::tracing::layer());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_layer)
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), CliError> {
    let recorder = StatsdBuilder::from(config.statsd_host.clone(), config.statsd_port)
        .build(Some(&config.prefix))
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| CliError::Metrics(e.to_string()))?;
    shared::metrics_defs::describe_all(flagsvc::metrics_defs::ALL_METRICS);
    Ok(())
}

async fn run(command: CliCommand, config: Config) -> Result<ExitCode, CliError> {
    let user_context_key = config.flags.user_context_key.clone();
    let sdk = FlagSvc::new(config.flags)?;

    match command {
        CliCommand::Get {
            path,
            host,
            user,
            kind,
        } => {
            let mut req = RequestContext::new(host);
            if let Some(user) = user {
                req = req.with_value(&user_context_key, user);
            }
            let rendered = render(&sdk.with_request(&req), &path, kind).await?;
            println!("{rendered}");
            Ok(ExitCode::SUCCESS)
        }
        CliCommand::Check { host } => {
            let req = RequestContext::new(host);
            let url = sdk.document_url(&req);
            match sdk.ensure_loaded(&req).await {
                Ok(()) => {
                    println!("ok {url}");
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => {
                    eprintln!("failed {url}: {err}");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        CliCommand::Serve => {
            let service = FlagService::new(sdk, user_context_key);
            shared::http::run_http_service(&config.listener.host, config.listener.port, service)
                .await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn render(flags: &RequestFlags<'_>, path: &str, kind: ValueKind) -> Result<String, CliError> {
    let rendered = match kind {
        ValueKind::String => flags.get_string(path).await?,
        ValueKind::Bool => flags.get_bool(path).await?.to_string(),
        ValueKind::Int => flags.get_int(path).await?.to_string(),
        ValueKind::Float => flags.get_float(path).await?.to_string(),
        ValueKind::Slice => format!("{:#}", Value::from(flags.get_string_slice(path).await?)),
        ValueKind::Map => format!("{:#}", Value::Object(flags.get_map(path).await?)),
        ValueKind::Json => format!("{:#}", flags.resolve_value(path).await?),
    };
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::static_sdk;
    use flagsvc::FlagError;

    #[test]
    fn test_parse_get() {
        let cli = Cli::try_parse_from([
            "flagctl",
            "get",
            "checkout.enabled",
            "--host",
            "tenant1",
            "--user",
            "user@x",
            "--as",
            "bool",
            "--config-path",
            "/etc/flagctl.yaml",
        ])
        .unwrap();
        assert_eq!(cli.config_path, PathBuf::from("/etc/flagctl.yaml"));
        match cli.command {
            CliCommand::Get {
                path,
                host,
                user,
                kind,
            } => {
                assert_eq!(path, "checkout.enabled");
                assert_eq!(host, "tenant1");
                assert_eq!(user.as_deref(), Some("user@x"));
                assert_eq!(kind, ValueKind::Bool);
            }
            _ => panic!("expected get"),
        }
    }

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::try_parse_from(["flagctl", "get", "checkout"]).unwrap();
        assert_eq!(cli.config_path, PathBuf::from("flagctl.yaml"));
        assert!(matches!(
            cli.command,
            CliCommand::Get {
                kind: ValueKind::Json,
                user: None,
                ..
            }
        ));

        assert!(matches!(
            Cli::try_parse_from(["flagctl", "serve"]).unwrap().command,
            CliCommand::Serve
        ));
        assert!(Cli::try_parse_from(["flagctl", "get", "x", "--as", "yaml"]).is_err());
    }

    async fn render_for(sdk: &FlagSvc, user: Option<&str>, path: &str, kind: ValueKind) -> String {
        let mut req = RequestContext::new("tenant1");
        if let Some(user) = user {
            req = req.with_value("user", user);
        }
        render(&sdk.with_request(&req), path, kind).await.unwrap()
    }

    #[tokio::test]
    async fn test_render() {
        let sdk = static_sdk();

        assert_eq!(render_for(&sdk, None, "checkout.enabled", ValueKind::Bool).await, "false");
        assert_eq!(
            render_for(&sdk, Some("user@x"), "checkout.enabled", ValueKind::Bool).await,
            "true"
        );
        assert_eq!(render_for(&sdk, None, "checkout.maxItems", ValueKind::Int).await, "100");
        assert_eq!(render_for(&sdk, None, "checkout.maxItems", ValueKind::String).await, "100");
        assert_eq!(render_for(&sdk, None, "discount", ValueKind::Float).await, "0.25");
        assert_eq!(
            render_for(&sdk, None, "regions", ValueKind::Slice).await,
            "[\n  \"eu\",\n  \"us\"\n]"
        );
        assert_eq!(
            render_for(&sdk, Some("user@x"), "checkout", ValueKind::Map).await,
            "{\n  \"enabled\": true\n}"
        );
        assert_eq!(
            render_for(&sdk, None, "regions", ValueKind::Json).await,
            "[\n  \"eu\",\n  \"us\"\n]"
        );
    }

    #[tokio::test]
    async fn test_render_error() {
        let sdk = static_sdk();
        let req = RequestContext::new("tenant1");
        let err = render(&sdk.with_request(&req), "regions", ValueKind::Bool)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::Flag(FlagError::Coercion {
                target: "bool",
                found: "array"
            })
        ));
    }
}
