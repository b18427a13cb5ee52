//! Built-in tools: email ingestion and classification, views, chats, and
//! completion-backed assistance.

pub mod assistant;
pub mod chat;
pub mod inbox;
pub mod views;

use std::sync::Arc;

use crate::engine::Engine;
use crate::tools::ToolRegistry;

/// Register every engine tool.
pub async fn register_engine_tools(registry: &ToolRegistry, engine: Arc<Engine>) {
    registry.register(Arc::new(inbox::FetchAndStoreTool::new(engine.clone()))).await;
    registry.register(Arc::new(inbox::SyncEmailsTool::new(engine.clone()))).await;
    registry.register(Arc::new(inbox::ClassifyAllTool::new(engine.clone()))).await;
    registry.register(Arc::new(inbox::ClassifySubjectTool::new(engine.clone()))).await;
    registry.register(Arc::new(inbox::SendEmailTool::new(engine.clone()))).await;
    registry.register(Arc::new(views::GetViewTool::new(engine.clone()))).await;
    registry.register(Arc::new(views::ListResourcesTool::new(engine.clone()))).await;
    registry.register(Arc::new(chat::RecordChatTool::new(engine.clone()))).await;
    registry.register(Arc::new(chat::SyncChatsTool::new(engine.clone()))).await;
    registry.register(Arc::new(chat::SendChatMessageTool::new(engine.clone()))).await;
    registry.register(Arc::new(assistant::SummarizeTool::new(engine.clone()))).await;
    registry.register(Arc::new(assistant::AskTool::new(engine.clone()))).await;
    registry.register(Arc::new(assistant::DraftReplyTool::new(engine))).await;
    tracing::info!(tools = registry.count(), "Registered engine tools");
}
