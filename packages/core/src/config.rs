//! Централизованная конфигурация для Vanish Messenger Core
//!
//! Все константы и настройки ядра должны быть определены здесь,
//! чтобы избежать хардкода по всему проекту.

use std::sync::OnceLock;

/// Глобальная конфигурация приложения (синглтон)
static GLOBAL_CONFIG: OnceLock<Config> = OnceLock::new();

/// Основная структура конфигурации
#[derive(Debug, Clone)]
pub struct Config {
    // ============================================
    // ВРЕМЯ ЖИЗНИ СООБЩЕНИЙ
    // ============================================

    /// TTL эфемерного сообщения по умолчанию (в секундах)
    pub default_ttl_seconds: i64,

    /// Минимально допустимый TTL (в секундах)
    pub min_ttl_seconds: i64,

    /// Максимально допустимый TTL (в секундах)
    /// По умолчанию: 24 часа
    pub max_ttl_seconds: i64,

    /// Интервал тика Countdown Scheduler (в миллисекундах)
    ///
    /// Хост обязан вызывать tick() не реже этого интервала, иначе
    /// отображаемый остаток будет отставать.
    pub countdown_tick_ms: u64,

    // ============================================
    // РЕКОНСИЛИАЦИЯ
    // ============================================

    /// Окно сопоставления optimistic-записи с серверной строкой
    /// (в миллисекундах): pending считается «тем же» сообщением, если
    /// отправитель и payload совпали, а created_at отличается не больше
    /// чем на это окно.
    pub pending_match_window_ms: i64,

    /// Размер страницы при загрузке истории беседы
    pub history_page_size: usize,

    // ============================================
    // ВАЛИДАЦИЯ
    // ============================================

    /// Максимальная длина текстового сообщения (в символах)
    pub max_content_length: usize,

    /// Максимальная длина URL медиа-вложения
    pub max_media_url_length: usize,
}

impl Config {
    /// Создать конфигурацию с дефолтными значениями
    pub fn default() -> Self {
        Self {
            // Время жизни
            default_ttl_seconds: 60,
            min_ttl_seconds: 1,
            max_ttl_seconds: 24 * 60 * 60, // 24 hours
            countdown_tick_ms: 1000,

            // Реконсилиация
            pending_match_window_ms: 15_000,
            history_page_size: 50,

            // Валидация
            max_content_length: 4096,
            max_media_url_length: 2048,
        }
    }

    /// Создать конфигурацию из переменных окружения
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // Переопределяем значения из env, если они заданы
        if let Ok(val) = std::env::var("DEFAULT_TTL_SECONDS") {
            if let Ok(parsed) = val.parse() {
                config.default_ttl_seconds = parsed;
            }
        }

        if let Ok(val) = std::env::var("MAX_TTL_SECONDS") {
            if let Ok(parsed) = val.parse() {
                config.max_ttl_seconds = parsed;
            }
        }

        if let Ok(val) = std::env::var("PENDING_MATCH_WINDOW_MS") {
            if let Ok(parsed) = val.parse() {
                config.pending_match_window_ms = parsed;
            }
        }

        if let Ok(val) = std::env::var("HISTORY_PAGE_SIZE") {
            if let Ok(parsed) = val.parse() {
                config.history_page_size = parsed;
            }
        }

        if let Ok(val) = std::env::var("MAX_CONTENT_LENGTH") {
            if let Ok(parsed) = val.parse() {
                config.max_content_length = parsed;
            }
        }

        config
    }

    /// Получить глобальный экземпляр конфигурации
    ///
    /// Автоматически инициализирует конфигурацию со значениями по умолчанию при первом вызове
    pub fn global() -> &'static Config {
        GLOBAL_CONFIG.get_or_init(Config::default)
    }

    /// Инициализировать глобальную конфигурацию со значениями по умолчанию
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::default())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию из переменных окружения
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_from_env() -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(Self::from_env())
            .map_err(|_| "Config already initialized")
    }

    /// Инициализировать глобальную конфигурацию с кастомным экземпляром
    ///
    /// # Errors
    ///
    /// Возвращает ошибку, если конфигурация уже была инициализирована
    pub fn init_with(config: Config) -> Result<(), &'static str> {
        GLOBAL_CONFIG
            .set(config)
            .map_err(|_| "Config already initialized")
    }

    /// Проверить, инициализирована ли глобальная конфигурация
    pub fn is_initialized() -> bool {
        GLOBAL_CONFIG.get().is_some()
    }

    /// Ограничить пользовательский TTL допустимым диапазоном
    pub fn clamp_ttl(&self, ttl_seconds: i64) -> i64 {
        ttl_seconds.clamp(self.min_ttl_seconds, self.max_ttl_seconds)
    }
}
