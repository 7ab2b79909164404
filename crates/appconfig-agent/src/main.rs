// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::{env, process::ExitCode, sync::Arc};

use serde_json::Value;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use appconfig_client::{AppConfigEnv, ConfigService, CountingTelemetry, HttpProvider};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
pub async fn main() -> ExitCode {
    let log_level = env::var("APPCONFIG_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let app_env = AppConfigEnv::from_os_env();
    if !app_env.enabled {
        info!("APPCONFIG_ENABLED is false; shutting down");
        return ExitCode::SUCCESS;
    }

    let identifiers = match app_env.identifiers() {
        Ok(identifiers) => identifiers,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let provider = match HttpProvider::new(
        app_env.base_url(),
        &app_env.to_auth(),
        AGENT_VERSION,
        app_env.http_options(),
    ) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Error creating configuration provider: {e}");
            return ExitCode::FAILURE;
        }
    };
    info!(endpoint = provider.base_url(), "Starting configuration agent");

    let service: ConfigService<Value> =
        ConfigService::json(Arc::new(provider), identifiers, app_env.service_config());
    let telemetry = CountingTelemetry::default();
    service.set_telemetry(Arc::new(telemetry.clone()));

    let _subscription = service.subscribe(|value: Arc<Value>| {
        info!(configuration = %value, "Configuration updated");
    });

    if let Err(e) = service.start().await {
        error!("Error loading initial configuration: {e}");
        service.stop();
        return ExitCode::FAILURE;
    }

    wait_for_shutdown().await;

    service.stop();
    info!(telemetry = %telemetry.counters().snapshot(), "Configuration agent stopped");
    ExitCode::SUCCESS
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => log_ctrl_c(result),
                    _ = terminate.recv() => debug!("SIGTERM received"),
                }
            }
            Err(e) => {
                warn!("Unable to listen for SIGTERM: {e}");
                log_ctrl_c(tokio::signal::ctrl_c().await);
            }
        }
    }
    #[cfg(not(unix))]
    {
        log_ctrl_c(tokio::signal::ctrl_c().await);
    }
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => debug!("Ctrl-C received"),
        Err(e) => warn!("Unable to listen for Ctrl-C: {e}"),
    }
}
