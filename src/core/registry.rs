//! Share registry - the process-wide list of configured shares
//!
//! Readers take an immutable snapshot (`Arc<Vec<_>>`); a configuration save
//! swaps in a complete new list, so a reader never sees a half-updated one.

use crate::core::config::ShareDefinition;
use crate::core::error::{PublishError, PublishResult};
use std::collections::HashSet;
use std::sync::{Arc, RwLock};

/// Registered share definitions in registration order
#[derive(Debug, Default)]
pub struct ShareRegistry {
    shares: RwLock<Arc<Vec<ShareDefinition>>>,
}

impl ShareRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `shares`
    pub fn with_shares(shares: Vec<ShareDefinition>) -> PublishResult<Self> {
        let registry = Self::new();
        registry.replace_all(shares)?;
        Ok(registry)
    }

    /// Atomically replace every definition.
    ///
    /// Fails with [`PublishError::DuplicateShare`] and leaves the current
    /// list untouched if two definitions share a display URL.
    pub fn replace_all(&self, shares: Vec<ShareDefinition>) -> PublishResult<()> {
        let mut seen = HashSet::new();
        for share in &shares {
            let display_url = share.display_url();
            if !seen.insert(display_url.clone()) {
                return Err(PublishError::DuplicateShare { display_url });
            }
        }

        let snapshot = Arc::new(shares);
        let mut current = self.shares.write().unwrap_or_else(|e| e.into_inner());
        *current = snapshot;
        Ok(())
    }

    /// Consistent snapshot of the registered shares
    pub fn list(&self) -> Arc<Vec<ShareDefinition>> {
        Arc::clone(&self.shares.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    /// Resolve a share reference.
    ///
    /// No reference selects the first registered share. A reference must
    /// equal a share's display URL exactly.
    pub fn resolve(&self, reference: Option<&str>) -> PublishResult<ShareDefinition> {
        let shares = self.list();

        match reference {
            None => shares.first().cloned().ok_or(PublishError::NoSharesConfigured),
            Some(reference) => shares
                .iter()
                .find(|share| share.display_url() == reference)
                .cloned()
                .ok_or_else(|| PublishError::ShareNotFound {
                    reference: reference.to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shares() -> Vec<ShareDefinition> {
        vec![
            ShareDefinition::new("nas").with_dir("builds"),
            ShareDefinition::new("nas").with_dir("releases"),
            ShareDefinition::new("backup").with_port(1445),
        ]
    }

    #[test]
    fn test_default_share_is_first_registered() {
        let registry = ShareRegistry::with_shares(shares()).unwrap();

        let share = registry.resolve(None).unwrap();
        assert_eq!(share.display_url(), "smb://nas/builds/");
    }

    #[test]
    fn test_exact_lookup() {
        let registry = ShareRegistry::with_shares(shares()).unwrap();

        for share in registry.list().iter() {
            let resolved = registry.resolve(Some(&share.display_url())).unwrap();
            assert_eq!(resolved.display_url(), share.display_url());
        }
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let registry = ShareRegistry::with_shares(shares()).unwrap();

        let err = registry.resolve(Some("smb://nas/builds")).unwrap_err();
        assert!(matches!(err, PublishError::ShareNotFound { .. }));

        let err = registry.resolve(Some("nonexistent")).unwrap_err();
        assert_eq!(err.code(), "SHARE_NOT_FOUND");
    }

    #[test]
    fn test_empty_registry() {
        let registry = ShareRegistry::new();

        assert!(matches!(
            registry.resolve(None),
            Err(PublishError::NoSharesConfigured)
        ));
        assert!(matches!(
            registry.resolve(Some("smb://nas/")),
            Err(PublishError::ShareNotFound { .. })
        ));
    }

    #[test]
    fn test_replace_all_rejects_duplicates_atomically() {
        let registry = ShareRegistry::with_shares(shares()).unwrap();

        let result = registry.replace_all(vec![
            ShareDefinition::new("other"),
            ShareDefinition::new("other"),
        ]);

        assert!(matches!(result, Err(PublishError::DuplicateShare { .. })));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.resolve(None).unwrap().server, "nas");
    }

    #[test]
    fn test_snapshot_survives_replacement() {
        let registry = ShareRegistry::with_shares(shares()).unwrap();
        let snapshot = registry.list();

        registry
            .replace_all(vec![ShareDefinition::new("fresh")])
            .unwrap();

        assert_eq!(snapshot.len(), 3);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve(None).unwrap().server, "fresh");
    }

    #[test]
    fn test_concurrent_readers_see_complete_lists() {
        let registry = Arc::new(ShareRegistry::with_shares(shares()).unwrap());

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let registry = Arc::clone(&registry);
                scope.spawn(move || {
                    for _ in 0..500 {
                        let len = registry.list().len();
                        assert!(len == 3 || len == 1);
                    }
                });
            }

            for i in 0..100 {
                if i % 2 == 0 {
                    registry.replace_all(vec![ShareDefinition::new("solo")]).unwrap();
                } else {
                    registry.replace_all(shares()).unwrap();
                }
            }
        });
    }
}
