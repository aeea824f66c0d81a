// Контракты бэкенда и change feed

pub mod backend;
pub mod events;
pub mod wire;
