// Публичный API для мессенджера
// Высокоуровневые методы поверх контроллеров бесед

use crate::protocol::backend::{MessengerBackend, ViewOutcome};
use crate::state::controller::ConversationController;
use crate::storage::models::MessagePayload;
use crate::utils::error::{Result, VanishError};
use crate::utils::time::Clock;
use std::collections::HashMap;
use std::rc::Rc;

/// Главный API для мессенджера
///
/// Держит handle бэкенда и по одному контроллеру на каждую открытую
/// беседу; закрытие беседы освобождает её scoped-ресурсы (подписку и
/// отсчёты) через teardown контроллера.
pub struct MessengerApi {
    backend: Rc<dyn MessengerBackend>,
    clock: Rc<dyn Clock>,
    user_id: String,
    conversations: HashMap<String, ConversationController>,
}

impl MessengerApi {
    pub fn new(
        backend: Rc<dyn MessengerBackend>,
        clock: Rc<dyn Clock>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            clock,
            user_id: user_id.into(),
            conversations: HashMap::new(),
        }
    }

    // === Жизненный цикл экранов ===

    /// Открыть беседу: создать контроллер, подписаться, загрузить историю.
    /// Повторное открытие возвращает существующий контроллер.
    pub fn open_conversation(
        &mut self,
        conversation_id: &str,
    ) -> Result<&mut ConversationController> {
        if !self.conversations.contains_key(conversation_id) {
            let mut controller = ConversationController::new(
                self.backend.clone(),
                self.clock.clone(),
                self.user_id.clone(),
                conversation_id,
            )?;
            controller.load_history()?;
            self.conversations
                .insert(conversation_id.to_string(), controller);
        }

        Ok(self
            .conversations
            .get_mut(conversation_id)
            .expect("controller inserted above"))
    }

    /// Закрыть беседу; teardown контроллера выполняется в Drop
    pub fn close_conversation(&mut self, conversation_id: &str) -> bool {
        self.conversations.remove(conversation_id).is_some()
    }

    /// Контроллер открытой беседы
    pub fn conversation(&self, conversation_id: &str) -> Option<&ConversationController> {
        self.conversations.get(conversation_id)
    }

    /// Мутабельный контроллер открытой беседы
    pub fn conversation_mut(
        &mut self,
        conversation_id: &str,
    ) -> Option<&mut ConversationController> {
        self.conversations.get_mut(conversation_id)
    }

    pub fn open_count(&self) -> usize {
        self.conversations.len()
    }

    // === Сообщения ===

    /// Отправить текст в открытую беседу (optimistic UI как side effect)
    pub fn send_message(
        &mut self,
        conversation_id: &str,
        content: &str,
        is_ephemeral: bool,
    ) -> Result<String> {
        self.opened(conversation_id)?.send_text(content, is_ephemeral)
    }

    /// Отправить медиа в открытую беседу; payload несёт URL уже
    /// загруженного в object store блоба (тот же optimistic-конвейер)
    pub fn send_media(
        &mut self,
        conversation_id: &str,
        payload: MessagePayload,
        is_ephemeral: bool,
    ) -> Result<String> {
        self.opened(conversation_id)?.send_media(payload, is_ephemeral)
    }

    /// Просмотреть эфемерное сообщение (View-and-Destroy)
    pub fn view_message(&mut self, conversation_id: &str, message_id: &str) -> Result<ViewOutcome> {
        self.opened(conversation_id)?.view_message(message_id)
    }

    // === Тик ===

    /// Тик всех открытых бесед; возвращает id локально истёкших сообщений
    pub fn tick(&mut self) -> Vec<String> {
        let mut expired = Vec::new();
        for controller in self.conversations.values_mut() {
            expired.extend(controller.tick());
        }
        expired
    }

    fn opened(&mut self, conversation_id: &str) -> Result<&mut ConversationController> {
        self.conversations
            .get_mut(conversation_id)
            .ok_or_else(|| VanishError::InvalidInput(format!("conversation {} is not open", conversation_id)))
    }
}
