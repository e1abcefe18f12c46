use std::sync::Arc;
use polls_backend::{
    build_rocket,
    config::AppConfig,
    cors::CORS,
    pg_store::PgStore,
    routes::AppState,
};
use rocket::fairing::AdHoc;
use shuttle_runtime::CustomError;
use sqlx::PgPool;
use tokio::time::{interval, Duration};
use tracing::{info, error, warn};

async fn run_tally_audit(store: PgStore, every: Duration) {
    if every.is_zero() {
        warn!("TALLY_AUDIT_INTERVAL_SECS is 0, tally audit disabled");
        return;
    }

    let mut interval = interval(every);
    info!("🧮 Tally audit started, running every {:?}", every);

    loop {
        interval.tick().await;
        match store.reconcile_tallies().await {
            Ok(0) => {}
            Ok(repaired) => warn!("Repaired {} drifted tally counters", repaired),
            Err(e) => error!("Tally audit failed: {}", e),
        }
    }
}

#[shuttle_runtime::main]
async fn rocket(
    #[shuttle_shared_db::Postgres] pool: PgPool,
    #[shuttle_runtime::Secrets] secret_store: shuttle_runtime::SecretStore,
) -> shuttle_rocket::ShuttleRocket {
    info!("🚀 Starting poll voting server");

    let config = AppConfig::from_lookup(|key| secret_store.get(key)).map_err(CustomError::new)?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(CustomError::new)?;

    info!("📋 Migrations complete");

    let store = PgStore::new(pool);
    let shared_store = Arc::new(store.clone());
    let state = AppState::new(shared_store.clone(), shared_store, &config);

    tokio::spawn(run_tally_audit(store.clone(), config.tally_audit_interval));

    let rocket = build_rocket(state, CORS::new(config.allowed_origin.clone()))
        .attach(AdHoc::on_shutdown("Close storage", move |_| Box::pin(async move {
            info!("Closing database pool");
            store.close().await;
        })));

    Ok(rocket.into())
}
