//! Share check - validates a share definition without transferring anything
//!
//! Mirrors what an administrator would do by hand: reach the server root
//! anonymously, then log in and look at the share directory.

use crate::core::config::ShareDefinition;
use crate::security::CredentialMasker;
use crate::transfer::path_resolver::RemotePath;
use crate::transfer::sink::{ConnectOptions, ShareConnector};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Outcome of [`check_share`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "message", rename_all = "snake_case")]
pub enum ShareCheck {
    Ok,
    DestinationIsFile,
    ServerNotFound,
    Error(String),
}

impl ShareCheck {
    pub fn is_ok(&self) -> bool {
        matches!(self, ShareCheck::Ok)
    }

    pub fn message(&self) -> &str {
        match self {
            ShareCheck::Ok => "ok",
            ShareCheck::DestinationIsFile => "Destination is a file",
            ShareCheck::ServerNotFound => "Server does not exist.",
            ShareCheck::Error(message) => message,
        }
    }
}

impl fmt::Display for ShareCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Check that `share` is reachable and its directory is usable.
///
/// A definition without a server has nothing to check yet and passes.
pub async fn check_share(connector: &dyn ShareConnector, share: &ShareDefinition) -> ShareCheck {
    if share.server.trim().is_empty() {
        return ShareCheck::Ok;
    }

    let masker = CredentialMasker::for_share(share);
    let root = RemotePath::root();

    let anonymous = match connector.connect(share, &ConnectOptions::anonymous()).await {
        Ok(sink) => sink,
        Err(e) => return ShareCheck::Error(masker.mask(&e.to_string())),
    };
    match anonymous.exists(&root).await {
        Ok(true) => {}
        Ok(false) => return ShareCheck::ServerNotFound,
        Err(e) => return ShareCheck::Error(masker.mask(&e.to_string())),
    }
    debug!(server = %share.server, "server root reachable");

    let authenticated = match connector
        .connect(share, &ConnectOptions::authenticated(None))
        .await
    {
        Ok(sink) => sink,
        Err(e) => return ShareCheck::Error(masker.mask(&e.to_string())),
    };
    match authenticated.is_file(&root).await {
        Ok(true) => ShareCheck::DestinationIsFile,
        Ok(false) => ShareCheck::Ok,
        Err(e) => ShareCheck::Error(masker.mask(&e.to_string())),
    }
}
