use async_trait::async_trait;
use thiserror::Error;

use crate::chat_ref::ChatKind;
use crate::event::Joiner;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("telegram request failed: {0}")]
    Request(#[from] teloxide::RequestError),
    #[error("chat is not a group")]
    NotAGroup,
    #[error("member list unavailable")]
    Unsupported,
}

#[derive(Debug, Clone)]
pub struct ChatInfo {
    pub kind: ChatKind,
    pub title: String,
}

/// Capabilities the watcher needs from the messaging backend.
///
/// Connection handling, retries and update delivery belong to the client
/// library behind the implementation; the watcher only sees these calls.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Resolves a chat id to its kind and title. Fails for chats the
    /// account cannot see (anymore).
    async fn chat_info(&self, chat_id: i64) -> Result<ChatInfo, BackendError>;

    /// Enumerates up to `limit` members. Backends that cannot produce a
    /// member list for this chat return an error; callers fall back to
    /// `member_count`.
    async fn list_members(&self, chat_id: i64, limit: usize) -> Result<Vec<Joiner>, BackendError>;

    async fn member_count(&self, chat_id: i64) -> Result<u32, BackendError>;

    /// Queues a MarkdownV2 message to the operator's private log. Delivery
    /// failures are the implementation's to log; they never propagate.
    fn notify_operator(&self, text: String);
}
