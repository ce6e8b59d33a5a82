pub mod analytics;
pub mod common;
pub mod course;
pub mod folder;
pub mod material;
pub mod session;
pub mod user;
