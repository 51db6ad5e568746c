use techstock::{app, config::AppConfig, seed, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "techstock=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    tracing::info!(environment = ?config.environment, enforce_ownership = config.enforce_ownership, "config loaded");
    let app_state = AppState::init(config).await?;

    if app_state.config.seed.enabled {
        seed::seed_defaults(
            app_state.users.as_ref(),
            app_state.products.as_ref(),
            &app_state.config.seed,
        )
        .await
        .map_err(|e| anyhow::anyhow!("seeding failed: {e}"))?;
    }

    app::serve(app::build_app(app_state)).await
}
