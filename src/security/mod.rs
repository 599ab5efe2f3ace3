pub mod credentials;

pub use credentials::CredentialMasker;
