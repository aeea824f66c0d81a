// UUID и correlation id утилиты

/// Префикс локальных correlation id
///
/// Серверные id — чистые UUID v4, поэтому пересечение пространств
/// идентификаторов исключено.
pub const CORRELATION_PREFIX: &str = "local-";

pub fn generate_v4() -> String {
    uuid::Uuid::new_v4().to_string()
}

pub fn is_valid(uuid_str: &str) -> bool {
    uuid::Uuid::parse_str(uuid_str).is_ok()
}

/// Сгенерировать correlation id для optimistic-записи
///
/// Формат: `local-<timestamp_ms>-<8 hex символов>`. Timestamp делает id
/// сортируемым в порядке отправки, хвост UUID защищает от коллизий при
/// нескольких отправках в одну миллисекунду.
pub fn new_correlation_id(now_ms: i64) -> String {
    let tail = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}-{}", CORRELATION_PREFIX, now_ms, &tail[..8])
}

/// Проверить, является ли id локальным correlation id
pub fn is_correlation_id(id: &str) -> bool {
    id.starts_with(CORRELATION_PREFIX)
}
