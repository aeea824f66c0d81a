// Логирование
//
// Ядро пишет диагностические события через tracing; хост (UI-оболочка или
// тесты) выбирает subscriber. init() ставит дефолтный вывод в stderr с
// фильтром из RUST_LOG.

use tracing_subscriber::EnvFilter;

/// Инициализировать глобальный subscriber
///
/// Повторный вызов безопасен: уже установленный subscriber сохраняется.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
