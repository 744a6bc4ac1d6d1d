use loan_advisor::{
    agent::DialogueController,
    api::start_server,
    config::Settings,
    dataset::Datasets,
    generator::GeminiClient,
    memory::ConversationMemory,
    state::{start_cleanup_task, InMemorySessionStore, SessionStore},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load .env and environment variables
    let settings = Settings::from_env()?;

    if settings.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; free-form questions will get the fallback reply");
    }
    if settings.allow_anonymous {
        warn!("Anonymous callers share one conversation slot; set ALLOW_ANONYMOUS=false to require userId");
    }

    info!("Loan Advisor - API Server");
    info!("Port: {}", settings.port);

    // Load datasets
    let datasets = Datasets::load_with_timeout(
        &settings.customer_data_path,
        &settings.bank_loan_data_path,
        settings.dataset_load_timeout,
    )
    .await;

    // Create components
    let sessions: Arc<dyn SessionStore> =
        Arc::new(InMemorySessionStore::new(settings.pending_request_ttl));
    let memory = Arc::new(
        ConversationMemory::new(settings.memory_scope, settings.history_capacity)
            .with_idle_ttl(settings.memory_idle_ttl),
    );
    let generator = Arc::new(GeminiClient::new(
        settings.gemini_api_key.clone(),
        settings.gemini_model.clone(),
        settings.generation_timeout,
    )?);

    let controller = Arc::new(
        DialogueController::new(sessions.clone(), memory.clone(), generator, Arc::new(datasets))
            .with_generation_timeout(settings.generation_timeout),
    );

    let _cleanup = start_cleanup_task(sessions, memory, settings.session_cleanup_interval);

    info!("Dialogue controller initialized");

    start_server(controller, settings.default_user(), settings.port).await?;

    Ok(())
}
