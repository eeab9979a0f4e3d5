//! taskbridge - JSON-lines tool host
//!
//! stdin から 1 行 1 リクエスト（`ToolRequest`）を読み、
//! stdout に 1 行 1 レスポンス（envelope または error）を書き出します。
//! ログは stderr（`TASKBRIDGE_LOG` で制御）。

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use taskbridge_core::app::{ServiceContext, ServiceContextBuilder, ToolRequest, handle};
use taskbridge_core::domain::{ErrorReport, LabelId, Project, ResponseEnvelope};
use taskbridge_core::impls::{InMemoryTaskService, Snapshot};

const BREAKER_COOLDOWN: Duration = Duration::from_secs(30);

/// Settings read from the environment.
#[derive(Debug, Clone)]
struct CliConfig {
    log: String,
    max_retries: u32,
    retry_base: Duration,
    /// `None` disables the circuit breaker.
    breaker_threshold: Option<u32>,
    /// JSON snapshot to seed the in-memory service with.
    seed: Option<PathBuf>,
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow!("{name}={raw}: {e}")),
        _ => Ok(None),
    }
}

impl CliConfig {
    fn from_env() -> Result<Self> {
        Ok(Self {
            log: std::env::var("TASKBRIDGE_LOG").unwrap_or_else(|_| "info".to_string()),
            max_retries: env_parse("TASKBRIDGE_MAX_RETRIES")?.unwrap_or(3),
            retry_base: Duration::from_millis(env_parse("TASKBRIDGE_RETRY_BASE_MS")?.unwrap_or(500)),
            breaker_threshold: env_parse::<u32>("TASKBRIDGE_BREAKER_THRESHOLD")?.filter(|t| *t > 0),
            seed: std::env::var_os("TASKBRIDGE_SEED").map(PathBuf::from),
        })
    }
}

fn demo_service() -> InMemoryTaskService {
    InMemoryTaskService::new()
        .with_project(Project::new(1, "Inbox"))
        .with_label(LabelId::new(1), "urgent")
}

fn load_service(config: &CliConfig) -> Result<InMemoryTaskService> {
    let Some(path) = &config.seed else {
        return Ok(demo_service());
    };
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    let snapshot: Snapshot = serde_json::from_str(&contents)
        .with_context(|| format!("invalid seed file {}", path.display()))?;
    tracing::info!(
        "seeded {} project(s), {} label(s), {} task(s) from {}",
        snapshot.projects.len(),
        snapshot.labels.len(),
        snapshot.tasks.len(),
        path.display()
    );
    Ok(InMemoryTaskService::from_snapshot(snapshot))
}

fn build_context(config: &CliConfig, service: InMemoryTaskService) -> Result<ServiceContext> {
    let (max_retries, base) = (config.max_retries, config.retry_base);
    let mut builder = ServiceContextBuilder::new()
        .service(Arc::new(service))
        .map_policies(|p| p.with_max_retries(max_retries).with_base_delay(base));
    if let Some(threshold) = config.breaker_threshold {
        builder = builder.circuit_breaker(threshold, BREAKER_COOLDOWN);
    }
    Ok(builder.build()?)
}

#[derive(Serialize)]
#[serde(untagged)]
enum Reply {
    Ok(ResponseEnvelope),
    Err {
        operation: Option<&'static str>,
        error: ErrorReport,
    },
}

async fn respond(ctx: &ServiceContext, line: &str) -> Reply {
    let request = match ToolRequest::from_json(line) {
        Ok(request) => request,
        Err(e) => {
            return Reply::Err {
                operation: None,
                error: e.report(),
            };
        }
    };

    let operation = request.operation();
    match handle(ctx, request).await {
        Ok(envelope) => Reply::Ok(envelope),
        Err(e) => {
            tracing::debug!("'{}' failed: {}", operation, e);
            Reply::Err {
                operation: Some(operation),
                error: e.report(),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = CliConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let ctx = build_context(&config, load_service(&config)?)?;
    tracing::info!("taskbridge ready, reading requests from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        let reply = respond(&ctx, &line).await;
        let mut out = serde_json::to_string(&reply).context("failed to encode reply")?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    tracing::info!("stdin closed, exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CliConfig {
        CliConfig {
            log: "off".to_string(),
            max_retries: 0,
            retry_base: Duration::ZERO,
            breaker_threshold: Some(3),
            seed: None,
        }
    }

    #[tokio::test]
    async fn malformed_request_yields_validation_report() {
        let ctx = build_context(&test_config(), demo_service()).unwrap();

        let reply = serde_json::to_value(respond(&ctx, "{\"operation\": 1}").await).unwrap();

        assert_eq!(reply["error"]["kind"], "validation");
        assert_eq!(reply["operation"], serde_json::Value::Null);
    }

    #[tokio::test]
    async fn create_then_list_round_trip() {
        let ctx = build_context(&test_config(), demo_service()).unwrap();

        let created = serde_json::to_value(
            respond(&ctx, r#"{"operation": "create", "title": "hello", "labels": [1]}"#).await,
        )
        .unwrap();
        assert_eq!(created["operation"], "create");
        assert_eq!(created["data"]["labels"], serde_json::json!([1]));

        let listed = serde_json::to_value(
            respond(&ctx, r#"{"operation": "list", "filter": "labels in 1"}"#).await,
        )
        .unwrap();
        assert_eq!(listed["metadata"]["evaluation_path"], "server_side");
        assert_eq!(listed["metadata"]["count"], 1);
    }

    #[tokio::test]
    async fn workflow_errors_name_the_operation() {
        let ctx = build_context(&test_config(), demo_service()).unwrap();

        let reply = serde_json::to_value(respond(&ctx, r#"{"operation": "get", "id": 404}"#).await)
            .unwrap();

        assert_eq!(reply["operation"], "get");
        assert_eq!(reply["error"]["kind"], "not_found");
    }
}
