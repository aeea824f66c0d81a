// Wire format (JSON сериализация)
//
// Транспортные реализации бэкенда гоняют события и строки сообщений
// как JSON с camelCase-полями модели.

use crate::protocol::events::ChangeEvent;
use crate::storage::models::Message;
use crate::utils::error::{Result, VanishError};

/// Упаковать событие change feed в JSON
pub fn pack_event(event: &ChangeEvent) -> Result<String> {
    serde_json::to_string(event)
        .map_err(|e| VanishError::SerializationError(format!("event pack error: {}", e)))
}

/// Распаковать событие change feed из JSON
pub fn unpack_event(data: &str) -> Result<ChangeEvent> {
    serde_json::from_str(data)
        .map_err(|e| VanishError::SerializationError(format!("event unpack error: {}", e)))
}

/// Упаковать строку сообщения в JSON
pub fn pack_row(row: &Message) -> Result<String> {
    serde_json::to_string(row)
        .map_err(|e| VanishError::SerializationError(format!("row pack error: {}", e)))
}

/// Распаковать строку сообщения из JSON
pub fn unpack_row(data: &str) -> Result<Message> {
    serde_json::from_str(data)
        .map_err(|e| VanishError::SerializationError(format!("row unpack error: {}", e)))
}
