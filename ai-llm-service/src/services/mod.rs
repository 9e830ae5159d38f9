pub mod local_ai_service;
pub mod open_ai_service;
pub mod wire;
