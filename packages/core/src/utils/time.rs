// Источники времени
//
// Вся логика ядра получает время снаружи (unix-миллисекунды), чтобы
// Expiry Policy и Countdown Scheduler были детерминированными в тестах.

use std::cell::Cell;

/// Источник текущего времени (инжектируемый)
pub trait Clock {
    /// Текущее время в unix-миллисекундах
    fn now_ms(&self) -> i64;
}

/// Системные часы (chrono)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        current_timestamp_ms()
    }
}

/// Текущий unix timestamp в миллисекундах
pub fn current_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Ручные часы для тестов: время двигается только явными вызовами
#[derive(Debug)]
pub struct ManualClock {
    now_ms: Cell<i64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
        }
    }

    /// Установить абсолютное время
    pub fn set(&self, now_ms: i64) {
        self.now_ms.set(now_ms);
    }

    /// Продвинуть время вперёд на миллисекунды
    pub fn advance_ms(&self, delta_ms: i64) {
        self.now_ms.set(self.now_ms.get() + delta_ms);
    }

    /// Продвинуть время вперёд на секунды
    pub fn advance_secs(&self, delta_secs: i64) {
        self.advance_ms(delta_secs * 1000);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.get()
    }
}
