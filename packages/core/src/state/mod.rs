// Локальное состояние беседы

pub mod controller;
pub mod scheduler;
pub mod store;
