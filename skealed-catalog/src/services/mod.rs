pub mod account_service;
pub mod drill_service;
pub mod favorite_service;
pub mod idea_service;
pub mod inflight;
pub mod listing;
pub mod profile_service;
pub mod vote_service;
pub mod vote_store;
