//! Transfer engine: matching workspace files and writing them to a share

pub mod chunk_reader;
pub mod dry_run;
pub mod entry_copier;
pub mod mounted;
pub mod path_resolver;
pub mod pattern;
pub mod sink;
#[cfg(all(feature = "smb", unix))]
pub mod smb;

pub use dry_run::{DryRunConnector, PlannedOperation};
pub use entry_copier::{EntryCopier, TransferFailure};
pub use mounted::{MountedShareConnector, MountedShareSink};
pub use path_resolver::{PathResolver, RemotePath};
pub use pattern::PatternMatcher;
pub use sink::{ConnectOptions, RemoteFileSink, ShareConnector};
#[cfg(all(feature = "smb", unix))]
pub use smb::SmbConnector;
