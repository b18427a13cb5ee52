use std::sync::Arc;

use anyhow::Context;

use unified_inbox::config::{EngineConfig, ServerConfig};
use unified_inbox::embedding::{EmbeddingConfig, OpenAiEmbedder};
use unified_inbox::engine::Engine;
use unified_inbox::llm::prompts::Sampling;
use unified_inbox::llm::{LlmConfig, create_provider};
use unified_inbox::providers::{EmailConfig, ImapEmailProvider, TelegramBotProvider, TelegramConfig};
use unified_inbox::server;
use unified_inbox::taxonomy::{DEFAULT_TAXONOMY, EmbeddedTaxonomy};
use unified_inbox::tools::{ToolRegistry, register_engine_tools};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let engine_config = EngineConfig::from_env();
    let server_config = ServerConfig::from_env();
    let embedding_config = EmbeddingConfig::from_env();

    eprintln!("📬 Unified Inbox v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Embeddings: {} ({})", embedding_config.model, embedding_config.base_url);
    eprintln!("   HTTP: http://0.0.0.0:{}", server_config.port);

    // ── Taxonomy (embedded once) ────────────────────────────────────────
    let embedder = Arc::new(OpenAiEmbedder::new(embedding_config).context("embedding client")?);
    let taxonomy = EmbeddedTaxonomy::build(DEFAULT_TAXONOMY, embedder)
        .await
        .context("failed to embed category taxonomy")?;

    let mut engine = Engine::new(engine_config, Arc::new(taxonomy));

    // ── Providers ───────────────────────────────────────────────────────
    match EmailConfig::from_env() {
        Some(config) => {
            eprintln!("   Email: {} as {}", config.imap_host, config.username);
            engine = engine.with_email_provider(Arc::new(ImapEmailProvider::new(config)));
        }
        None => eprintln!("   Email: disabled (EMAIL_IMAP_HOST not set)"),
    }

    match TelegramConfig::from_env() {
        Some(config) => {
            eprintln!("   Telegram: enabled");
            engine = engine.with_chat_provider(Arc::new(TelegramBotProvider::new(config)));
        }
        None => eprintln!("   Telegram: disabled (TELEGRAM_BOT_TOKEN not set)"),
    }

    // ── Completion ──────────────────────────────────────────────────────
    match LlmConfig::from_env()? {
        Some(llm_config) => {
            eprintln!("   Model: {}", llm_config.model);
            let llm = create_provider(&llm_config)?;
            let sampling = Sampling {
                max_tokens: llm_config.max_tokens,
                temperature: llm_config.temperature,
            };
            engine = engine.with_completion(llm, sampling);
        }
        None => eprintln!("   Model: disabled (no API key set)"),
    }

    // ── Tools + HTTP ────────────────────────────────────────────────────
    let engine = Arc::new(engine);
    let registry = Arc::new(ToolRegistry::new());
    register_engine_tools(&registry, Arc::clone(&engine)).await;

    let app = server::routes(engine, registry);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", server_config.port))
        .await
        .with_context(|| format!("failed to bind port {}", server_config.port))?;

    tracing::info!(port = server_config.port, "Serving tools and resources");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;

    Ok(())
}
