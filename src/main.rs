use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulse_news::config::Config;
use pulse_news::controller::FeedController;
use pulse_news::db::Database;
use pulse_news::fetcher::HttpNewsSource;
use pulse_news::local::LocalNews;
use pulse_news::navigator::SwipeNavigator;
use pulse_news::opener::SystemOpener;
use pulse_news::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pulse_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load("pulse.toml")?;
    info!(
        "Loaded {} categories from configuration, news backend at {}",
        config.categories.len(),
        config.news.base_url
    );

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:pulse_news.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let source = HttpNewsSource::new(&config.news)?;
    let feed = FeedController::new(source, config.news.default_category.clone());

    let local = match &config.local {
        Some(settings) => {
            info!("Local news enabled for {} cities", settings.cities.len());
            Some(LocalNews::new(settings)?)
        }
        None => None,
    };

    let state = Arc::new(AppState {
        categories: config.categories.clone(),
        feed,
        local,
        db: Arc::new(db),
        opener: Arc::new(SystemOpener),
        flash_repeat: config.flash.repeat,
        navigator: Mutex::new(SwipeNavigator::new(0, &config.flash)),
    });

    // Initial load of the default category
    let startup = state.clone();
    let default_category = config.news.default_category.clone();
    tokio::spawn(async move {
        startup.feed.select_category(&default_category).await;
    });

    if state.local.is_some() {
        let startup = state.clone();
        tokio::spawn(async move {
            if let Some(local) = &startup.local {
                if let Err(e) = local.restore_city(&startup.db).await {
                    error!("Failed to restore saved city: {}", e);
                }
            }
        });
    }

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    info!("Server starting on http://{}", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
