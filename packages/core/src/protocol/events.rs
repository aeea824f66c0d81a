// События change feed
//
// Бэкенд эмитит row-level события по каналу беседы: at-least-once,
// упорядоченно внутри одной беседы.

use crate::storage::models::Message;
use serde::{Deserialize, Serialize};

/// Минимальная информация об удалённой строке
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedRow {
    pub id: String,
    pub conversation_id: String,
}

/// Событие изменения таблицы сообщений
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "row", rename_all = "camelCase")]
pub enum ChangeEvent {
    Insert(Message),
    Update(Message),
    Delete(DeletedRow),
}

impl ChangeEvent {
    /// Беседа, к которой относится событие
    pub fn conversation_id(&self) -> &str {
        match self {
            ChangeEvent::Insert(m) | ChangeEvent::Update(m) => &m.conversation_id,
            ChangeEvent::Delete(d) => &d.conversation_id,
        }
    }

    /// Id затронутого сообщения
    pub fn message_id(&self) -> &str {
        match self {
            ChangeEvent::Insert(m) | ChangeEvent::Update(m) => &m.id,
            ChangeEvent::Delete(d) => &d.id,
        }
    }
}
