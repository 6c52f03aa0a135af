use async_trait::async_trait;
use teloxide::prelude::*;

use crate::backend::{Backend, BackendError, ChatInfo};
use crate::chat_ref::ChatKind;
use crate::event::Joiner;
use crate::reply_queue::ReplyQueue;

/// Bot API implementation of the backend port.
pub struct TelegramBackend {
    bot: Bot,
    operator: ReplyQueue,
}

impl TelegramBackend {
    pub fn new(bot: Bot, operator: ReplyQueue) -> Self {
        Self { bot, operator }
    }
}

#[async_trait]
impl Backend for TelegramBackend {
    async fn chat_info(&self, chat_id: i64) -> Result<ChatInfo, BackendError> {
        let chat = self.bot.get_chat(ChatId(chat_id)).await?;

        let kind = if chat.is_supergroup() {
            ChatKind::Supergroup
        } else if chat.is_group() {
            ChatKind::Group
        } else {
            return Err(BackendError::NotAGroup);
        };

        Ok(ChatInfo {
            kind,
            title: chat.title().unwrap_or("Unknown Group").to_string(),
        })
    }

    /// The Bot API exposes no full participant listing; the administrator
    /// subset is the only member view a bot can enumerate. Chats where
    /// even that is unavailable flow into the count fallback.
    async fn list_members(&self, chat_id: i64, limit: usize) -> Result<Vec<Joiner>, BackendError> {
        let members = self.bot.get_chat_administrators(ChatId(chat_id)).await?;

        Ok(members
            .into_iter()
            .take(limit)
            .map(|member| Joiner {
                id: member.user.id.0,
                username: member.user.username,
                first_name: member.user.first_name,
                last_name: member.user.last_name,
            })
            .collect())
    }

    async fn member_count(&self, chat_id: i64) -> Result<u32, BackendError> {
        Ok(self.bot.get_chat_member_count(ChatId(chat_id)).await?)
    }

    fn notify_operator(&self, text: String) {
        self.operator.queue(text);
    }
}
