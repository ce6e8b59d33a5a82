pub mod analytics;
pub mod course;
pub mod folder;
pub mod health;
pub mod material;
pub mod root;
pub mod session;
pub mod user;
