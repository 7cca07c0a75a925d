use std::sync::Arc;

use plannerdesk_lib::pipeline::poller::run_follow_up_poller;
use plannerdesk_lib::state::{load_config, AppState};
use plannerdesk_lib::api;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("plannerdesk=info,plannerdesk_lib=info"))
        .init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };
    let addr = format!("{}:{}", config.server.bind_address, config.server.port);

    let state = Arc::new(AppState::new(config));

    let poller_state = state.clone();
    tokio::spawn(async move {
        run_follow_up_poller(poller_state).await;
    });

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    log::info!("plannerdesk {} listening on {}", env!("CARGO_PKG_VERSION"), addr);

    if let Err(e) = axum::serve(listener, api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        log::error!("Server error: {}", e);
    }
    log::info!("Shut down");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Shutdown signal received");
}
