// Модуль хранилища

pub mod memory;
pub mod models;
