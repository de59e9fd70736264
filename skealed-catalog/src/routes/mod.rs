pub mod categories;
pub mod drills;
pub mod health;
pub mod home;
pub mod ideas;
pub mod profile;
pub mod skills;
pub mod vault;
