// Countdown Scheduler
//
// Один общий тик вместо таймера на каждое сообщение: беседа с сотней
// эфемерных сообщений не плодит сотню timer handle. Хост дергает tick()
// с интервалом Config::countdown_tick_ms; сам scheduler времени не знает.

use std::collections::HashMap;
use tracing::debug;

/// Дедлайны эфемерных сообщений беседы
#[derive(Debug, Default)]
pub struct CountdownScheduler {
    deadlines: HashMap<String, i64>,
}

impl CountdownScheduler {
    pub fn new() -> Self {
        Self {
            deadlines: HashMap::new(),
        }
    }

    /// Начать отсчёт для сообщения; повторный track того же id — no-op
    /// (не больше одного «таймера» на сообщение)
    pub fn track(&mut self, message_id: &str, expires_at_ms: i64) -> bool {
        if self.deadlines.contains_key(message_id) {
            return false;
        }
        self.deadlines.insert(message_id.to_string(), expires_at_ms);
        true
    }

    /// Снять отсчёт (сообщение удалено или просмотрено)
    pub fn cancel(&mut self, message_id: &str) -> bool {
        self.deadlines.remove(message_id).is_some()
    }

    /// Снять все отсчёты (teardown экрана)
    pub fn clear(&mut self) {
        self.deadlines.clear();
    }

    /// Общий тик: вернуть id сообщений, чей дедлайн наступил, и снять их
    /// с отслеживания. Порядок — по дедлайну, затем по id (детерминизм).
    pub fn tick(&mut self, now_ms: i64) -> Vec<String> {
        let mut expired: Vec<(i64, String)> = self
            .deadlines
            .iter()
            .filter(|(_, &deadline)| {
                // согласовано с Expiry Policy: остаток < 1 сек == истёк
                (deadline - now_ms) < 1000
            })
            .map(|(id, &deadline)| (deadline, id.clone()))
            .collect();
        expired.sort();

        for (_, id) in &expired {
            self.deadlines.remove(id);
            debug!(message_id = %id, "countdown reached zero");
        }

        expired.into_iter().map(|(_, id)| id).collect()
    }

    /// Остаток в секундах для отслеживаемого сообщения
    pub fn seconds_left(&self, message_id: &str, now_ms: i64) -> Option<i64> {
        self.deadlines
            .get(message_id)
            .map(|deadline| ((deadline - now_ms) / 1000).max(0))
    }

    pub fn is_tracked(&self, message_id: &str) -> bool {
        self.deadlines.contains_key(message_id)
    }

    /// Количество активных отсчётов
    pub fn tracked(&self) -> usize {
        self.deadlines.len()
    }
}
