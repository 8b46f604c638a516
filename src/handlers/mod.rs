pub mod health_handlers;
pub mod relay_handlers;
