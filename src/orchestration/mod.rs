//! Orchestration layer for artifact publishing
//!
//! This module provides the post-build publish step and the share check
//! used to validate global configuration.

pub mod cifs_publisher;
pub mod share_check;

// Re-export main types for convenience
pub use cifs_publisher::{
    PublishCoordinator, PublishReport, PublishStatus, SHARE_NOT_FOUND_MESSAGE, TransferOutcome,
};
pub use share_check::{ShareCheck, check_share};
