pub mod access;
pub mod course;
pub mod enrollment;
pub mod material;
pub mod session;
