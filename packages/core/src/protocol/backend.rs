// Контракты внешних коллабораторов: durable store и change feed
//
// Ядро не знает, какой продукт стоит за этими трейтами; in-memory
// референс живёт в storage::memory, сетевые реализации — вне ядра.

use crate::protocol::events::ChangeEvent;
use crate::storage::models::{Conversation, Message, MessageDraft};
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// Результат атомарной операции mark-viewed-and-maybe-delete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewOutcome {
    /// Просмотр записан, строка удалена этим вызовом (first-viewer-wins)
    Deleted,
    /// Строка уже удалена (конкурентный просмотр или TTL-уборка);
    /// валидное терминальное состояние, не ошибка
    AlreadyGone,
    /// Операция неприменима: строка неэфемерная или viewer — автор
    NotApplicable,
}

/// Durable store строк сообщений
///
/// Все методы синхронные с точки зрения вызывающего event loop; сетевые
/// реализации резолвят их через собственный transport (JSON-хелперы для
/// строк и событий — в [`crate::protocol::wire`]). Атомарность
/// mark_viewed — обязанность реализации: проверка «ещё не просмотрено»,
/// запись просмотра и удаление строки составляют одну неделимую операцию.
pub trait MessageBackend {
    /// Durable-запись черновика; сервер назначает id, created_at и
    /// expires_at, возвращает подтверждённую строку
    fn save_message(&self, draft: MessageDraft) -> Result<Message>;

    /// Атомарный compare-and-delete по факту просмотра
    fn mark_viewed(&self, message_id: &str, viewer_id: &str) -> Result<ViewOutcome>;

    /// Обычное подтверждение доставки (is_read), отдельно от просмотра
    fn mark_read(&self, message_id: &str, reader_id: &str) -> Result<()>;

    /// История беседы: хронологически, с пагинацией. Просмотренные и
    /// протухшие эфемерные строки через этот путь недостижимы.
    fn load_conversation(
        &self,
        conversation_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Message>>;

    /// Метаданные беседы (участники, группа или 1:1)
    fn get_conversation(&self, conversation_id: &str) -> Result<Conversation>;
}

/// Подписка на change feed беседы
///
/// Сетевые реализации распаковывают транспортные кадры в [`ChangeEvent`]
/// через [`crate::protocol::wire::unpack_event`] перед постановкой в очередь.
pub trait ChangeFeed {
    /// Подписаться на события беседы; возвращённый handle — единственный
    /// способ получать события и отписаться
    fn subscribe(&self, conversation_id: &str) -> Result<Subscription>;
}

/// Полный контракт бэкенда
pub trait MessengerBackend: MessageBackend + ChangeFeed {}

impl<T: MessageBackend + ChangeFeed> MessengerBackend for T {}

/// Очередь событий одной подписки
pub type EventQueue = Rc<RefCell<VecDeque<ChangeEvent>>>;

/// Handle активной подписки (disposer)
///
/// События копятся в очереди в порядке эмиссии; контроллер выгребает их
/// на каждом тике. Drop отписывает автоматически, так что утечка подписки
/// при любом пути выхода исключена.
pub struct Subscription {
    queue: EventQueue,
    canceller: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(queue: EventQueue, canceller: Box<dyn FnOnce()>) -> Self {
        Self {
            queue,
            canceller: Some(canceller),
        }
    }

    /// Забрать следующее событие, если есть
    pub fn poll(&self) -> Option<ChangeEvent> {
        self.queue.borrow_mut().pop_front()
    }

    /// Забрать все накопленные события
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }

    /// Количество недоставленных событий
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Явная отписка; повторный вызов — no-op
    pub fn unsubscribe(&mut self) {
        if let Some(cancel) = self.canceller.take() {
            cancel();
        }
    }

    /// Подписка ещё активна?
    pub fn is_active(&self) -> bool {
        self.canceller.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("pending", &self.pending())
            .field("active", &self.is_active())
            .finish()
    }
}
