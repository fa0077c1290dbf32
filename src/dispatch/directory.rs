//! Partner identity lookup.
//!
//! Authentication happens outside the core; the broker only asks whether a partner id is
//! known before acting on its behalf.

use crate::model::PartnerId;
use async_trait::async_trait;
use std::collections::HashSet;

#[async_trait]
pub trait PartnerDirectory: Send + Sync {
    async fn is_known(&self, partner_id: &PartnerId) -> bool;
}

/// Accepts every partner id. Used when the calling layer has already authenticated the partner.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenDirectory;

#[async_trait]
impl PartnerDirectory for OpenDirectory {
    async fn is_known(&self, _partner_id: &PartnerId) -> bool {
        true
    }
}

/// A fixed roster of partner ids.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    partners: HashSet<PartnerId>,
}

impl StaticDirectory {
    pub fn new<I, P>(partners: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PartnerId>,
    {
        Self {
            partners: partners.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl PartnerDirectory for StaticDirectory {
    async fn is_known(&self, partner_id: &PartnerId) -> bool {
        self.partners.contains(partner_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_directory_knows_only_its_roster() {
        let directory = StaticDirectory::new(["p-1", "p-2"]);
        assert!(directory.is_known(&PartnerId::new("p-1")).await);
        assert!(!directory.is_known(&PartnerId::new("p-9")).await);
        assert!(OpenDirectory.is_known(&PartnerId::new("p-9")).await);
    }
}
