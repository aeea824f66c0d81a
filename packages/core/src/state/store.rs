// Local Message Store
//
// Упорядоченная коллекция сообщений одной беседы для рендера. Порядок —
// порядок вставки: история приходит хронологически, pending-записи всегда
// дописываются в конец, что совпадает с естественным порядком отправки.
//
// Все операции идемпотентны; optimistic-путь и realtime-путь сливаются
// здесь, и кто пришёл вторым — no-op.

use crate::storage::models::Message;
use tracing::debug;

/// Итог слияния серверной строки с локальным списком
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Строка заменила pending-запись с совпавшим payload
    ReplacedPending,
    /// Строка добавлена в конец
    Inserted,
    /// Строка с таким id уже есть, слияние — no-op
    Duplicate,
}

/// Список сообщений одной беседы
#[derive(Debug, Default)]
pub struct LocalMessageStore {
    messages: Vec<Message>,
}

impl LocalMessageStore {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Добавить сообщение в конец; повтор id — no-op
    pub fn insert(&mut self, msg: Message) -> bool {
        if self.contains(&msg.id) {
            return false;
        }
        self.messages.push(msg);
        true
    }

    /// Заменить первую запись, подходящую под предикат, с сохранением
    /// позиции в списке. Используется для свопа pending → confirmed.
    pub fn replace_by_correlation<F>(&mut self, predicate: F, new_message: Message) -> bool
    where
        F: Fn(&Message) -> bool,
    {
        match self.messages.iter_mut().find(|m| predicate(m)) {
            Some(slot) => {
                *slot = new_message;
                true
            }
            None => false,
        }
    }

    /// Удалить по id; отсутствие записи — валидный исход, не ошибка
    pub fn remove(&mut self, message_id: &str) -> bool {
        let before = self.messages.len();
        self.messages.retain(|m| m.id != message_id);
        before != self.messages.len()
    }

    /// Слить строку, пришедшую с сервера (realtime insert или история)
    ///
    /// Контракт дедупликации: если есть pending-запись того же отправителя
    /// с тем же payload и близким created_at — она заменяется на месте
    /// (это и есть защита от двойного показа при гонке optimistic-пути с
    /// realtime-путём). Иначе строка дописывается; повтор id — no-op.
    pub fn upsert_from_remote(&mut self, msg: Message, match_window_ms: i64) -> MergeOutcome {
        if self.contains(&msg.id) {
            return MergeOutcome::Duplicate;
        }

        let matched = self.messages.iter_mut().find(|m| {
            m.is_pending()
                && m.sender_id == msg.sender_id
                && m.payload == msg.payload
                && (m.created_at - msg.created_at).abs() <= match_window_ms
        });

        match matched {
            Some(slot) => {
                debug!(
                    pending_id = %slot.id,
                    server_id = %msg.id,
                    "remote row matched pending entry"
                );
                *slot = msg;
                MergeOutcome::ReplacedPending
            }
            None => {
                self.messages.push(msg);
                MergeOutcome::Inserted
            }
        }
    }

    /// Обновить строку на месте по id (update-событие); отсутствие — no-op
    pub fn apply_update(&mut self, msg: Message) -> bool {
        match self.messages.iter_mut().find(|m| m.id == msg.id) {
            Some(slot) => {
                // локальный send_state серверная строка не несёт
                let send_state = slot.send_state;
                *slot = msg;
                slot.send_state = send_state;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn contains(&self, message_id: &str) -> bool {
        self.messages.iter().any(|m| m.id == message_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
