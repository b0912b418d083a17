//! taskscope command-line entry point
//!
//! Usage: `taskscope ping`
//!
//! Credentials come from `TELEMETRY_PUBLIC_KEY` / `TELEMETRY_SECRET_KEY`,
//! pipeline settings from the `TASKSCOPE_*` overrides. Set
//! `TASKSCOPE_LOG_FORMAT=json` for JSON logs.

use std::env;
use std::process::ExitCode;

use taskscope::config::{PUBLIC_KEY_PATH, SECRET_KEY_PATH};
use taskscope::logging::{init_logging, LogFormat};
use taskscope::{EnvSecrets, TelemetryConfig, Tracer};

#[tokio::main]
async fn main() -> ExitCode {
    let command = env::args().nth(1).unwrap_or_default();
    if command != "ping" {
        eprintln!("usage: taskscope ping");
        return ExitCode::from(2);
    }

    let format = env::var("TASKSCOPE_LOG_FORMAT")
        .map(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    if let Err(e) = init_logging("taskscope", format) {
        eprintln!("failed to initialize logging: {}", e);
    }

    match ping().await {
        Ok(endpoint) => {
            println!("ok: {} accepted the connectivity check", endpoint);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("ping failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn ping() -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
    let config = TelemetryConfig::from_secrets(&EnvSecrets, PUBLIC_KEY_PATH, SECRET_KEY_PATH)
        .await?
        .with_env_overrides()?;
    let endpoint = config.base_url.clone();

    let tracer = Tracer::new(config)?;
    let result = tracer.ping().await;
    tracer.stop().await?;
    result?;

    Ok(endpoint)
}
