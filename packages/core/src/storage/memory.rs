// In-memory бэкенд для тестов и локального режима
//
// Референсная реализация контрактов protocol::backend: таблица строк,
// change feed по беседам и атомарный mark_viewed. Атомарность держится на
// однопоточной модели: проверка, запись просмотра, удаление строки и
// эмиссия события выполняются под одним заимствованием состояния.

use crate::config::Config;
use crate::expiry;
use crate::protocol::backend::{ChangeFeed, EventQueue, MessageBackend, Subscription, ViewOutcome};
use crate::protocol::events::{ChangeEvent, DeletedRow};
use crate::storage::models::{Conversation, Message, MessageDraft, SendState};
use crate::utils::error::{Result, VanishError};
use crate::utils::time::Clock;
use crate::utils::{uuid, validation};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::debug;

/// Запись журнала просмотров
#[derive(Debug, Clone)]
pub struct ViewRecord {
    pub message_id: String,
    pub viewer_id: String,
    pub viewed_at: i64,
}

struct Subscriber {
    conversation_id: String,
    queue: EventQueue,
}

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    conversations: HashMap<String, Conversation>,
    subscribers: HashMap<u64, Subscriber>,
    view_log: Vec<ViewRecord>,
    next_sub_id: u64,
}

impl Inner {
    /// Разослать событие всем подписчикам беседы (порядок эмиссии
    /// сохраняется внутри каждой очереди)
    fn emit(&mut self, conversation_id: &str, event: ChangeEvent) {
        for sub in self.subscribers.values() {
            if sub.conversation_id == conversation_id {
                sub.queue.borrow_mut().push_back(event.clone());
            }
        }
    }
}

/// In-memory хранилище сообщений + change feed
pub struct MemoryBackend {
    clock: Rc<dyn Clock>,
    inner: Rc<RefCell<Inner>>,
}

impl MemoryBackend {
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Rc::new(RefCell::new(Inner::default())),
        }
    }

    // === Беседы ===

    /// Зарегистрировать беседу (membership-management вне ядра,
    /// тестам и локальному режиму достаточно прямой регистрации)
    pub fn register_conversation(&self, conversation: Conversation) {
        self.inner
            .borrow_mut()
            .conversations
            .insert(conversation.id.clone(), conversation);
    }

    // === Housekeeping ===

    /// Фоновая TTL-уборка: удалить протухшие, но так и не просмотренные
    /// эфемерные строки и разослать delete-события. В продакшене это
    /// обязанность серверного планировщика; здесь — явный вызов.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let mut inner = self.inner.borrow_mut();

        let expired: Vec<(String, String)> = inner
            .messages
            .iter()
            .filter(|m| m.is_ephemeral && expiry::is_expired(m, now))
            .map(|m| (m.id.clone(), m.conversation_id.clone()))
            .collect();

        inner
            .messages
            .retain(|m| !(m.is_ephemeral && expiry::is_expired(m, now)));

        for (id, conversation_id) in &expired {
            debug!(message_id = %id, "ttl sweep removed row");
            inner.emit(
                conversation_id,
                ChangeEvent::Delete(DeletedRow {
                    id: id.clone(),
                    conversation_id: conversation_id.clone(),
                }),
            );
        }

        expired.len()
    }

    // === Доступ для тестов и диагностики ===

    /// Строка по id (копия)
    pub fn row(&self, message_id: &str) -> Option<Message> {
        self.inner
            .borrow()
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
    }

    /// Количество строк в таблице
    pub fn row_count(&self) -> usize {
        self.inner.borrow().messages.len()
    }

    /// Журнал просмотров
    pub fn view_log(&self) -> Vec<ViewRecord> {
        self.inner.borrow().view_log.clone()
    }

    /// Количество активных подписок
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }
}

impl MessageBackend for MemoryBackend {
    fn save_message(&self, draft: MessageDraft) -> Result<Message> {
        validation::validate_draft(&draft)?;

        let cfg = Config::global();
        let now = self.clock.now_ms();
        let mut inner = self.inner.borrow_mut();

        let conversation = inner
            .conversations
            .get(&draft.conversation_id)
            .ok_or_else(|| {
                VanishError::NotFound(format!("conversation {}", draft.conversation_id))
            })?;
        if !conversation.has_participant(&draft.sender_id) {
            return Err(VanishError::InvalidInput(format!(
                "{} is not a participant of {}",
                draft.sender_id, draft.conversation_id
            )));
        }

        // Сервер — authority по id, created_at и expires_at
        let expires_at = draft.is_ephemeral.then(|| {
            let ttl = cfg.clamp_ttl(draft.ttl_seconds.unwrap_or(cfg.default_ttl_seconds));
            now + ttl * 1000
        });

        let row = Message {
            id: uuid::generate_v4(),
            conversation_id: draft.conversation_id.clone(),
            sender_id: draft.sender_id.clone(),
            receiver_id: conversation.receiver_for(&draft.sender_id),
            payload: draft.payload,
            is_ephemeral: draft.is_ephemeral,
            expires_at,
            viewed_at: None,
            is_read: false,
            created_at: now,
            send_state: SendState::Sent,
        };

        inner.messages.push(row.clone());
        inner.emit(&draft.conversation_id, ChangeEvent::Insert(row.clone()));

        Ok(row)
    }

    fn mark_viewed(&self, message_id: &str, viewer_id: &str) -> Result<ViewOutcome> {
        let now = self.clock.now_ms();
        let mut inner = self.inner.borrow_mut();

        // first-viewer-wins: удалённая строка означает, что просмотр уже
        // состоялся (или строку убрала TTL-уборка)
        let Some(pos) = inner.messages.iter().position(|m| m.id == message_id) else {
            return Ok(ViewOutcome::AlreadyGone);
        };

        let row = &inner.messages[pos];
        if !row.is_ephemeral || row.sender_id == viewer_id {
            return Ok(ViewOutcome::NotApplicable);
        }
        if expiry::is_expired(row, now) {
            // гонка с TTL-дедлайном: просмотр проигрывает, строка уходит
            let row = inner.messages.remove(pos);
            let conversation_id = row.conversation_id.clone();
            inner.emit(
                &conversation_id,
                ChangeEvent::Delete(DeletedRow {
                    id: row.id,
                    conversation_id: row.conversation_id,
                }),
            );
            return Ok(ViewOutcome::AlreadyGone);
        }

        // Атомарный блок: записать просмотр и удалить строку
        let row = inner.messages.remove(pos);
        inner.view_log.push(ViewRecord {
            message_id: row.id.clone(),
            viewer_id: viewer_id.to_string(),
            viewed_at: now,
        });
        debug!(message_id = %row.id, viewer = %viewer_id, "view consumed row");
        let conversation_id = row.conversation_id.clone();
        inner.emit(
            &conversation_id,
            ChangeEvent::Delete(DeletedRow {
                id: row.id,
                conversation_id: row.conversation_id,
            }),
        );

        Ok(ViewOutcome::Deleted)
    }

    fn mark_read(&self, message_id: &str, reader_id: &str) -> Result<()> {
        let mut inner = self.inner.borrow_mut();

        let Some(pos) = inner.messages.iter().position(|m| m.id == message_id) else {
            // строка могла исчезнуть между insert-событием и ack
            return Ok(());
        };

        let row = &mut inner.messages[pos];
        if row.sender_id == reader_id || row.is_read {
            return Ok(());
        }
        row.is_read = true;

        let updated = row.clone();
        let conversation_id = updated.conversation_id.clone();
        inner.emit(&conversation_id, ChangeEvent::Update(updated));
        Ok(())
    }

    fn load_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>> {
        let now = self.clock.now_ms();
        let inner = self.inner.borrow();

        // Инвариант недостижимости: протухшие эфемерные строки не
        // попадают ни в один read path, даже до уборки
        let mut rows: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| !(m.is_ephemeral && expiry::is_expired(m, now)))
            .cloned()
            .collect();

        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    fn get_conversation(&self, conversation_id: &str) -> Result<Conversation> {
        self.inner
            .borrow()
            .conversations
            .get(conversation_id)
            .cloned()
            .ok_or_else(|| VanishError::NotFound(format!("conversation {}", conversation_id)))
    }
}

impl ChangeFeed for MemoryBackend {
    fn subscribe(&self, conversation_id: &str) -> Result<Subscription> {
        let queue: EventQueue = Rc::new(RefCell::new(VecDeque::new()));

        let mut inner = self.inner.borrow_mut();
        let sub_id = inner.next_sub_id;
        inner.next_sub_id += 1;
        inner.subscribers.insert(
            sub_id,
            Subscriber {
                conversation_id: conversation_id.to_string(),
                queue: queue.clone(),
            },
        );

        // Weak: подписка не должна держать бэкенд живым
        let weak = Rc::downgrade(&self.inner);
        let canceller = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.borrow_mut().subscribers.remove(&sub_id);
            }
        });

        Ok(Subscription::new(queue, canceller))
    }
}
