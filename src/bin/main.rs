//! Console chat client: drives the dialogue controller from stdin.
//!
//! Usage: `advisor [user-id]`

use loan_advisor::{
    agent::DialogueController,
    config::{Settings, DEFAULT_USER_ID},
    dataset::Datasets,
    generator::GeminiClient,
    memory::ConversationMemory,
    state::InMemorySessionStore,
};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing (stderr keeps the transcript on stdout clean)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::from_env()?;
    let user_id = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_USER_ID.to_string());

    let datasets = Datasets::load_with_timeout(
        &settings.customer_data_path,
        &settings.bank_loan_data_path,
        settings.dataset_load_timeout,
    )
    .await;

    let controller = DialogueController::new(
        Arc::new(InMemorySessionStore::new(settings.pending_request_ttl)),
        Arc::new(ConversationMemory::new(
            settings.memory_scope,
            settings.history_capacity,
        )),
        Arc::new(GeminiClient::new(
            settings.gemini_api_key.clone(),
            settings.gemini_model.clone(),
            settings.generation_timeout,
        )?),
        Arc::new(datasets),
    )
    .with_generation_timeout(settings.generation_timeout);

    info!(user_id = %user_id, "Loan advisor console started");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Loan advisor ready. Type a message, or 'exit' to quit.\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }
        if message.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }

        let reply = controller.handle(&user_id, message).await?;
        stdout
            .write_all(format!("\n{}\n\n> ", reply.reply).as_bytes())
            .await?;
        stdout.flush().await?;
    }

    Ok(())
}
