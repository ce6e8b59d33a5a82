pub mod access;
pub mod blob;
pub mod conferencing;
pub mod db;
pub mod entities;
pub mod error;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;
