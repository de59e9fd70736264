pub mod magic_link_service;
pub mod session_bus;
pub mod token_service;
