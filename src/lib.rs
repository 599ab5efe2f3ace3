pub mod core;
pub mod orchestration;
pub mod security;
pub mod transfer;

pub use self::core::*;
pub use orchestration::{PublishCoordinator, PublishReport, PublishStatus};
pub use security::CredentialMasker;
