// Контроллер экрана беседы
//
// Явный context object вместо модульных синглтонов: store, scheduler и
// подписка принадлежат экрану, создаются при входе и освобождаются при
// выходе (включая любой аварийный путь — через Drop).

use crate::config::Config;
use crate::expiry;
use crate::protocol::backend::{MessengerBackend, Subscription, ViewOutcome};
use crate::protocol::events::ChangeEvent;
use crate::state::scheduler::CountdownScheduler;
use crate::state::store::{LocalMessageStore, MergeOutcome};
use crate::storage::models::{Message, MessageDraft, MessagePayload, SendState};
use crate::utils::error::{Result, VanishError};
use crate::utils::time::Clock;
use crate::utils::{uuid, validation};
use std::rc::Rc;
use tracing::{debug, warn};

/// Состояние UI-поверхности экрана
#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub is_loading: bool,
    pub error_message: Option<String>,
    pub notification: Option<String>,
    /// Текст, возвращённый в поле ввода после неудачной отправки
    pub restored_draft: Option<String>,
}

impl UiState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn set_error(&mut self, error: String) {
        self.error_message = Some(error);
    }

    pub fn clear_error(&mut self) {
        self.error_message = None;
    }

    /// Забрать восстановленный черновик (одноразово)
    pub fn take_restored_draft(&mut self) -> Option<String> {
        self.restored_draft.take()
    }
}

/// Сообщение с вычисленным остатком времени для рендера
#[derive(Debug, Clone, Copy)]
pub struct MessageView<'a> {
    pub message: &'a Message,
    /// None — без ограничения по времени
    pub seconds_left: Option<i64>,
}

/// Контроллер одной беседы
pub struct ConversationController {
    conversation_id: String,
    user_id: String,
    backend: Rc<dyn MessengerBackend>,
    clock: Rc<dyn Clock>,
    store: LocalMessageStore,
    scheduler: CountdownScheduler,
    subscription: Option<Subscription>,
    unread_count: u32,
    ui_state: UiState,
}

impl ConversationController {
    /// Создать контроллер и подписаться на change feed беседы
    /// (scoped resource: подписка живёт ровно столько, сколько контроллер)
    pub fn new(
        backend: Rc<dyn MessengerBackend>,
        clock: Rc<dyn Clock>,
        user_id: impl Into<String>,
        conversation_id: impl Into<String>,
    ) -> Result<Self> {
        let conversation_id = conversation_id.into();
        let subscription = backend.subscribe(&conversation_id)?;

        Ok(Self {
            conversation_id,
            user_id: user_id.into(),
            backend,
            clock,
            store: LocalMessageStore::new(),
            scheduler: CountdownScheduler::new(),
            subscription: Some(subscription),
            unread_count: 0,
            ui_state: UiState::new(),
        })
    }

    // === Загрузка истории ===

    /// Засеять store историей беседы
    ///
    /// Просмотренные и протухшие эфемерные строки сервер через этот путь
    /// не отдаёт; на всякий случай фильтруем протухшие и локально.
    pub fn load_history(&mut self) -> Result<()> {
        self.ui_state.set_loading(true);

        let cfg = Config::global();
        let result = self
            .backend
            .load_conversation(&self.conversation_id, cfg.history_page_size, 0);

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                self.ui_state.set_loading(false);
                self.ui_state.set_error(e.to_string());
                return Err(e);
            }
        };

        let now = self.clock.now_ms();
        for row in rows {
            let row = match validation::normalize_incoming(row) {
                Ok(row) => row,
                Err(e) => {
                    warn!(error = %e, "dropping malformed history row");
                    continue;
                }
            };
            if expiry::is_expired(&row, now) {
                continue;
            }
            if row.is_ephemeral {
                if let Some(expires_at) = row.expires_at {
                    self.scheduler.track(&row.id, expires_at);
                }
            }
            self.store.insert(row);
        }

        self.ui_state.set_loading(false);
        Ok(())
    }

    // === Optimistic Send Pipeline ===

    /// Отправить текстовое сообщение
    pub fn send_text(&mut self, content: &str, is_ephemeral: bool) -> Result<String> {
        self.send(
            MessagePayload::Text {
                content: content.to_string(),
            },
            is_ephemeral,
            None,
        )
    }

    /// Отправить текст с явным TTL
    pub fn send_text_with_ttl(&mut self, content: &str, ttl_seconds: i64) -> Result<String> {
        self.send(
            MessagePayload::Text {
                content: content.to_string(),
            },
            true,
            Some(ttl_seconds),
        )
    }

    /// Отправить медиа (URL уже загруженного в object store блоба)
    pub fn send_media(&mut self, payload: MessagePayload, is_ephemeral: bool) -> Result<String> {
        if payload.media_url().is_none() {
            return Err(VanishError::InvalidInput(
                "send_media expects image or video payload".to_string(),
            ));
        }
        self.send(payload, is_ephemeral, None)
    }

    /// Общий конвейер отправки: provisional → insert → durable write →
    /// reconcile (replace-on-success / revert-on-failure)
    fn send(
        &mut self,
        payload: MessagePayload,
        is_ephemeral: bool,
        ttl_seconds: Option<i64>,
    ) -> Result<String> {
        let cfg = Config::global();
        let now = self.clock.now_ms();

        let draft = MessageDraft {
            conversation_id: self.conversation_id.clone(),
            sender_id: self.user_id.clone(),
            payload: payload.clone(),
            is_ephemeral,
            ttl_seconds,
        };
        // невалидный ввод не порождает ghost-записи
        validation::validate_draft(&draft)?;

        let correlation_id = uuid::new_correlation_id(now);
        let provisional = Message {
            id: correlation_id.clone(),
            conversation_id: self.conversation_id.clone(),
            sender_id: self.user_id.clone(),
            receiver_id: None, // узнаем из подтверждённой строки
            payload: payload.clone(),
            is_ephemeral,
            expires_at: is_ephemeral
                .then(|| now + cfg.clamp_ttl(ttl_seconds.unwrap_or(cfg.default_ttl_seconds)) * 1000),
            viewed_at: None,
            is_read: false,
            created_at: now,
            send_state: SendState::Pending,
        };

        // UI видит сообщение до сетевого round trip
        self.store.insert(provisional);

        match self.backend.save_message(draft) {
            Ok(mut confirmed) => {
                confirmed.send_state = SendState::Sent;
                let id = confirmed.id.clone();

                if confirmed.is_ephemeral {
                    if let Some(expires_at) = confirmed.expires_at {
                        self.scheduler.track(&id, expires_at);
                    }
                }

                let replaced = self
                    .store
                    .replace_by_correlation(|m| m.id == correlation_id, confirmed.clone());
                if !replaced {
                    // pending уже слит realtime-путём; insert идемпотентен
                    self.store.insert(confirmed);
                }
                debug!(message_id = %id, "send confirmed");
                Ok(id)
            }
            Err(e) => {
                // откат ghost-записи: UI не должен вечно показывать «отправляется»
                self.store.remove(&correlation_id);
                if let MessagePayload::Text { content } = payload {
                    self.ui_state.restored_draft = Some(content);
                }
                self.ui_state.set_error(e.to_string());
                warn!(error = %e, "send failed, optimistic entry rolled back");
                Err(e)
            }
        }
    }

    // === View-and-Destroy (клиентская сторона) ===

    /// Просмотреть эфемерное сообщение (явное действие пользователя)
    ///
    /// Локальное удаление происходит только после подтверждённого
    /// серверного удаления; при сетевой ошибке сообщение остаётся видимым
    /// и непросмотренным.
    pub fn view_message(&mut self, message_id: &str) -> Result<ViewOutcome> {
        let Some(msg) = self.store.get(message_id) else {
            // уже исчезло локально; серверу звонить незачем
            return Ok(ViewOutcome::AlreadyGone);
        };

        if msg.is_pending() {
            return Err(VanishError::InvalidInput(
                "cannot view a message that is still sending".to_string(),
            ));
        }
        if !msg.is_ephemeral || msg.is_authored_by(&self.user_id) {
            return Ok(ViewOutcome::NotApplicable);
        }

        let outcome = match self.backend.mark_viewed(message_id, &self.user_id) {
            Ok(outcome) => outcome,
            Err(e) => {
                self.ui_state.set_error(e.to_string());
                return Err(e);
            }
        };

        match outcome {
            // мгновенная обратная связь, не дожидаясь delete-события;
            // already-gone для UI эквивалентен успешному удалению
            ViewOutcome::Deleted | ViewOutcome::AlreadyGone => {
                self.store.remove(message_id);
                self.scheduler.cancel(message_id);
            }
            ViewOutcome::NotApplicable => {}
        }

        Ok(outcome)
    }

    // === Realtime Reconciliation ===

    /// Применить одно событие change feed
    pub fn handle_event(&mut self, event: ChangeEvent) {
        match event {
            ChangeEvent::Insert(row) => {
                let row = match validation::normalize_incoming(row) {
                    Ok(row) => row,
                    Err(e) => {
                        warn!(error = %e, "dropping malformed insert event");
                        return;
                    }
                };

                let foreign = !row.is_authored_by(&self.user_id);
                if row.is_ephemeral {
                    if let Some(expires_at) = row.expires_at {
                        self.scheduler.track(&row.id, expires_at);
                    }
                }

                let cfg = Config::global();
                let outcome = self
                    .store
                    .upsert_from_remote(row.clone(), cfg.pending_match_window_ms);

                // чужое новое сообщение: delivery bookkeeping (is_read),
                // НЕ эфемерное потребление — оно только по явному тапу
                if outcome == MergeOutcome::Inserted && foreign {
                    self.unread_count += 1;
                    if let Err(e) = self.backend.mark_read(&row.id, &self.user_id) {
                        debug!(error = %e, message_id = %row.id, "read receipt failed");
                    }
                }
            }
            ChangeEvent::Update(row) => {
                self.store.apply_update(row);
            }
            ChangeEvent::Delete(deleted) => {
                // канал, по которому остальные клиенты узнают об удалении;
                // для инициатора просмотра это no-op (уже удалено локально)
                self.store.remove(&deleted.id);
                self.scheduler.cancel(&deleted.id);
            }
        }
    }

    /// Выгрести накопленные события подписки
    fn pump_events(&mut self) {
        let events = match &self.subscription {
            Some(sub) => sub.drain(),
            None => return,
        };
        for event in events {
            self.handle_event(event);
        }
    }

    // === Тик ===

    /// Один тик event loop: применить события feed, затем продвинуть
    /// отсчёты. Возвращает id локально истёкших сообщений (сервер их НЕ
    /// удаляет по нашей инициативе — это обязанность TTL-уборки бэкенда).
    pub fn tick(&mut self) -> Vec<String> {
        self.pump_events();

        let now = self.clock.now_ms();
        let expired = self.scheduler.tick(now);
        for id in &expired {
            self.store.remove(id);
        }
        expired
    }

    // === Рендер ===

    /// Сообщения беседы с актуальным остатком времени
    pub fn messages(&self) -> Vec<MessageView<'_>> {
        let now = self.clock.now_ms();
        self.store
            .iter()
            .map(|m| MessageView {
                message: m,
                seconds_left: expiry::remaining(m, now).seconds_left,
            })
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.store.len()
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    /// Сбросить счётчик непрочитанных (экран беседы на переднем плане)
    pub fn mark_conversation_read(&mut self) {
        self.unread_count = 0;
    }

    pub fn ui_state(&self) -> &UiState {
        &self.ui_state
    }

    pub fn ui_state_mut(&mut self) -> &mut UiState {
        &mut self.ui_state
    }

    /// Количество активных отсчётов (диагностика / тесты teardown)
    pub fn active_countdowns(&self) -> usize {
        self.scheduler.tracked()
    }

    /// Подписка ещё активна?
    pub fn is_subscribed(&self) -> bool {
        self.subscription.as_ref().is_some_and(|s| s.is_active())
    }

    // === Teardown ===

    /// Освободить scoped-ресурсы экрана: отписка + снятие всех отсчётов.
    /// Идемпотентно; вызывается и из Drop, так что ресурсы освобождаются
    /// на любом пути выхода.
    pub fn teardown(&mut self) {
        if let Some(mut sub) = self.subscription.take() {
            sub.unsubscribe();
        }
        self.scheduler.clear();
        debug!(conversation_id = %self.conversation_id, "conversation screen torn down");
    }
}

impl Drop for ConversationController {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;
    use crate::storage::models::Conversation;
    use crate::utils::time::ManualClock;

    fn setup() -> (Rc<ManualClock>, Rc<MemoryBackend>, ConversationController) {
        let clock = Rc::new(ManualClock::new(1_000_000));
        let backend = Rc::new(MemoryBackend::new(clock.clone()));
        backend.register_conversation(Conversation::direct("c1", "alice", "bob"));

        let controller = ConversationController::new(
            backend.clone() as Rc<dyn MessengerBackend>,
            clock.clone() as Rc<dyn Clock>,
            "alice",
            "c1",
        )
        .unwrap();
        (clock, backend, controller)
    }

    #[test]
    fn test_send_replaces_pending_with_confirmed() {
        let (_clock, _backend, mut controller) = setup();

        let id = controller.send_text("hello", true).unwrap();
        assert_eq!(controller.message_count(), 1);

        let views = controller.messages();
        assert_eq!(views[0].message.id, id);
        assert_eq!(views[0].message.send_state, SendState::Sent);
        assert_eq!(views[0].seconds_left, Some(60));
    }

    #[test]
    fn test_own_insert_event_is_deduplicated() {
        let (_clock, _backend, mut controller) = setup();

        controller.send_text("hello", false).unwrap();
        // подписка получила insert собственного сообщения
        controller.tick();
        assert_eq!(controller.message_count(), 1);
        assert_eq!(controller.unread_count(), 0);
    }

    #[test]
    fn test_empty_text_leaves_no_ghost() {
        let (_clock, _backend, mut controller) = setup();
        assert!(controller.send_text("   ", false).is_err());
        assert_eq!(controller.message_count(), 0);
    }

    #[test]
    fn test_viewing_own_message_is_not_applicable() {
        let (_clock, _backend, mut controller) = setup();
        let id = controller.send_text("hello", true).unwrap();

        let outcome = controller.view_message(&id).unwrap();
        assert_eq!(outcome, ViewOutcome::NotApplicable);
        assert_eq!(controller.message_count(), 1);
    }

    #[test]
    fn test_local_expiry_does_not_delete_on_backend() {
        let (clock, backend, mut controller) = setup();
        let id = controller.send_text("fleeting", true).unwrap();
        controller.tick();

        clock.advance_secs(60);
        let expired = controller.tick();
        assert_eq!(expired, vec![id.clone()]);
        assert_eq!(controller.message_count(), 0);
        assert_eq!(controller.active_countdowns(), 0);

        // строка на бэкенде осталась — её убирает TTL-уборка, не клиент
        assert!(backend.row(&id).is_some());
    }

    #[test]
    fn test_teardown_releases_resources() {
        let (_clock, backend, mut controller) = setup();
        controller.send_text("fleeting", true).unwrap();
        assert_eq!(backend.subscriber_count(), 1);
        assert_eq!(controller.active_countdowns(), 1);

        controller.teardown();
        assert_eq!(backend.subscriber_count(), 0);
        assert_eq!(controller.active_countdowns(), 0);
        assert!(!controller.is_subscribed());

        // повторный teardown безопасен
        controller.teardown();
    }

    #[test]
    fn test_drop_unsubscribes() {
        let (_clock, backend, controller) = setup();
        assert_eq!(backend.subscriber_count(), 1);
        drop(controller);
        assert_eq!(backend.subscriber_count(), 0);
    }
}
