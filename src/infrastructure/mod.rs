pub mod provider;
pub mod repositories;
