//! Transport-facing abstractions: the outbound API, update delivery and the
//! update model. Telegram is the only implementation today.

pub mod port;
pub mod types;
