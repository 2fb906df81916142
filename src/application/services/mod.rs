pub mod clock;
pub mod provider;
pub mod retry;
