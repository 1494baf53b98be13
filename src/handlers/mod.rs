//! handlers/mod.rs
//! Módulo que agrupa los distintos handlers (campañas, tareas, contactos).
pub mod campaign_handler;
pub mod contact_handler;
pub mod dispatch_handler;
