use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use portal::{
    AppState, jwt, lifecycle::LifecycleEngine, notifier, registration::RegistrationGate,
    repositories, routes, session::SessionStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting volunteer portal service");

    // Initialize database connection pool
    let db_config = common::database::DatabaseConfig::from_env()?;
    let pool = common::database::init_pool(&db_config).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize JWT service
    let jwt_config = jwt::JwtConfig::from_env()?;
    let jwt_service = jwt::JwtService::new(&jwt_config);

    // Initialize the Redis-backed session store; sessions share the
    // bearer-token lifetime
    let redis_config = common::cache::RedisConfig::from_env()?;
    let redis_pool = common::cache::RedisPool::new(&redis_config).await?;
    let session_store = SessionStore::new(redis_pool, jwt_service.token_expiry());

    let notifier = notifier::Notifier::new(notifier::NotifierConfig::from_env());

    let user_repository = repositories::UserRepository::new(pool.clone());
    let application_repository = repositories::ApplicationRepository::new(pool.clone());
    let code_repository = repositories::VerificationCodeRepository::new(pool.clone());

    let lifecycle = LifecycleEngine::new(
        pool.clone(),
        application_repository,
        user_repository.clone(),
        notifier.clone(),
    );
    let registration = RegistrationGate::new(
        pool.clone(),
        user_repository.clone(),
        code_repository,
        std::env::var("ADMIN_SETUP_TOKEN").ok(),
    );

    let base_url =
        std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let app_state = AppState {
        db_pool: pool,
        jwt_service,
        session_store,
        user_repository,
        lifecycle,
        registration,
        notifier,
        base_url,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Volunteer portal service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
