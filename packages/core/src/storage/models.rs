// Модели данных
//
// Поля соответствуют строкам таблицы сообщений на бэкенде; локальное поле
// send_state на сервер никогда не уходит.

use serde::{Deserialize, Serialize};

/// Локальный статус отправки (не персистится)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendState {
    /// Создано локально, durable-запись ещё не подтверждена;
    /// id такой записи — correlation id
    Pending,
    /// Подтверждено сервером
    #[default]
    Sent,
    /// Durable-запись не удалась
    Failed,
}

/// Payload сообщения (tagged variant вместо ad-hoc полей)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "camelCase")]
pub enum MessagePayload {
    #[serde(rename_all = "camelCase")]
    Text { content: String },
    /// Медиа хранится во внешнем object store; ядро видит только URL
    #[serde(rename_all = "camelCase")]
    Image { media_url: String },
    #[serde(rename_all = "camelCase")]
    Video { media_url: String },
}

impl MessagePayload {
    /// Текст сообщения, если это текстовый вариант
    pub fn text(&self) -> Option<&str> {
        match self {
            MessagePayload::Text { content } => Some(content),
            _ => None,
        }
    }

    /// URL медиа, если это image/video
    pub fn media_url(&self) -> Option<&str> {
        match self {
            MessagePayload::Image { media_url } | MessagePayload::Video { media_url } => {
                Some(media_url)
            }
            MessagePayload::Text { .. } => None,
        }
    }
}

/// Сообщение
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Серверный UUID после подтверждения; correlation id до него
    pub id: String,
    pub conversation_id: String,
    pub sender_id: String,
    /// None для групповых сообщений (fan-out по каналу беседы)
    pub receiver_id: Option<String>,
    #[serde(flatten)]
    pub payload: MessagePayload,
    /// Подпадает ли сообщение под View-and-Destroy / TTL
    pub is_ephemeral: bool,
    /// Абсолютный дедлайн (unix ms); None — без ограничения по времени
    pub expires_at: Option<i64>,
    /// Момент просмотра получателем; для эфемерных строк просмотр и
    /// удаление атомарны, так что живая строка всегда имеет None
    pub viewed_at: Option<i64>,
    /// Обычное подтверждение доставки, отдельно от viewed_at
    pub is_read: bool,
    /// unix ms
    pub created_at: i64,
    #[serde(skip)]
    pub send_state: SendState,
}

impl Message {
    pub fn is_pending(&self) -> bool {
        self.send_state == SendState::Pending
    }

    /// Сообщение от этого пользователя?
    pub fn is_authored_by(&self, user_id: &str) -> bool {
        self.sender_id == user_id
    }
}

/// Черновик для durable-записи: всё, что знает клиент до подтверждения
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDraft {
    pub conversation_id: String,
    pub sender_id: String,
    #[serde(flatten)]
    pub payload: MessagePayload,
    pub is_ephemeral: bool,
    /// Запрошенный TTL; None — серверный дефолт
    pub ttl_seconds: Option<i64>,
}

/// Участник беседы
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    /// Неактивные участники группы не получают fan-out
    pub is_active: bool,
}

/// Беседа
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub participants: Vec<Participant>,
    pub is_group: bool,
}

impl Conversation {
    /// Беседа 1:1
    pub fn direct(id: impl Into<String>, a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            participants: vec![
                Participant {
                    user_id: a.into(),
                    is_active: true,
                },
                Participant {
                    user_id: b.into(),
                    is_active: true,
                },
            ],
            is_group: false,
        }
    }

    /// Групповая беседа
    pub fn group(id: impl Into<String>, members: impl IntoIterator<Item = String>) -> Self {
        Self {
            id: id.into(),
            participants: members
                .into_iter()
                .map(|user_id| Participant {
                    user_id,
                    is_active: true,
                })
                .collect(),
            is_group: true,
        }
    }

    pub fn has_participant(&self, user_id: &str) -> bool {
        self.participants.iter().any(|p| p.user_id == user_id)
    }

    /// Получатель 1:1 сообщения; None для группы
    pub fn receiver_for(&self, sender_id: &str) -> Option<String> {
        if self.is_group {
            return None;
        }
        self.participants
            .iter()
            .find(|p| p.user_id != sender_id)
            .map(|p| p.user_id.clone())
    }
}
