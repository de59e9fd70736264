pub mod account;
pub mod health;
pub mod logout;
pub mod magic_link;
pub mod me;
pub mod refresh;
pub mod session_events;
pub mod verify;
