// Expiry Policy
//
// Чистая логика остатка времени жизни. Никакого I/O и обращений к
// wall-clock: время всегда передаётся параметром.

use crate::storage::models::Message;

/// Результат вычисления остатка жизни сообщения
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Remaining {
    pub is_expired: bool,
    /// None — сообщение не ограничено по времени
    pub seconds_left: Option<i64>,
}

impl Remaining {
    /// Сообщение без дедлайна
    pub const UNBOUNDED: Remaining = Remaining {
        is_expired: false,
        seconds_left: None,
    };
}

/// Остаток жизни сообщения на момент `now_ms`
///
/// Неэфемерные сообщения и эфемерные без expires_at (malformed-строки
/// нормализует валидация при приёме) считаются непротухающими.
pub fn remaining(message: &Message, now_ms: i64) -> Remaining {
    if !message.is_ephemeral {
        return Remaining::UNBOUNDED;
    }

    let Some(expires_at) = message.expires_at else {
        return Remaining::UNBOUNDED;
    };

    let seconds_left = ((expires_at - now_ms) / 1000).max(0);
    Remaining {
        is_expired: seconds_left == 0,
        seconds_left: Some(seconds_left),
    }
}

/// Быстрая проверка «уже протухло»
pub fn is_expired(message: &Message, now_ms: i64) -> bool {
    remaining(message, now_ms).is_expired
}
