// Валидация входных данных и входящих строк

use crate::config::Config;
use crate::storage::models::{Message, MessageDraft, MessagePayload};
use crate::utils::error::{Result, VanishError};
use tracing::warn;

/// Проверить черновик перед durable-записью
pub fn validate_draft(draft: &MessageDraft) -> Result<()> {
    let cfg = Config::global();

    if draft.conversation_id.is_empty() {
        return Err(VanishError::InvalidInput(
            "conversation id is empty".to_string(),
        ));
    }
    if draft.sender_id.is_empty() {
        return Err(VanishError::InvalidInput("sender id is empty".to_string()));
    }

    match &draft.payload {
        MessagePayload::Text { content } => {
            if content.trim().is_empty() {
                return Err(VanishError::ValidationError(
                    "message text is empty".to_string(),
                ));
            }
            if content.chars().count() > cfg.max_content_length {
                return Err(VanishError::ValidationError(format!(
                    "message text exceeds {} characters",
                    cfg.max_content_length
                )));
            }
        }
        MessagePayload::Image { media_url } | MessagePayload::Video { media_url } => {
            if media_url.is_empty() {
                return Err(VanishError::ValidationError(
                    "media url is empty".to_string(),
                ));
            }
            if media_url.len() > cfg.max_media_url_length {
                return Err(VanishError::ValidationError(format!(
                    "media url exceeds {} bytes",
                    cfg.max_media_url_length
                )));
            }
        }
    }

    if let Some(ttl) = draft.ttl_seconds {
        if ttl <= 0 {
            return Err(VanishError::ValidationError(
                "ttl must be positive".to_string(),
            ));
        }
    }

    Ok(())
}

/// Нормализовать строку, пришедшую из change feed или истории
///
/// Политика для malformed-строк: не ронять реконсилиацию. Эфемерная строка
/// без expires_at трактуется как непротухающая (Expiry Policy вернёт для
/// неё UNBOUNDED), факт логируется для диагностики. Строки без обязательных
/// идентификаторов отбрасываются.
pub fn normalize_incoming(row: Message) -> Result<Message> {
    if row.id.is_empty() {
        return Err(VanishError::ValidationError(
            "incoming row has empty id".to_string(),
        ));
    }
    if row.conversation_id.is_empty() || row.sender_id.is_empty() {
        return Err(VanishError::ValidationError(format!(
            "incoming row {} misses conversation or sender",
            row.id
        )));
    }

    if row.is_ephemeral && row.expires_at.is_none() {
        warn!(
            message_id = %row.id,
            "ephemeral row without expiresAt, treating as non-expiring"
        );
    }

    Ok(row)
}
