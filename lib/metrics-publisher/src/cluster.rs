use tracing::{debug, info, warn};

use crate::providers::{InstanceIdentityProvider, InstanceTagProvider};

/// Instance tags, in priority order, probed for the cluster identifier.
pub const CLUSTER_ID_TAGS: &[&str] = &["eks:cluster-name", "CLUSTER_ID", "Name"];

/// Cluster identifier used when none of the candidate tags resolve.
pub const DEFAULT_CLUSTER_ID: &str = "k8s-cluster";

/// Resolves the logical cluster identifier from instance tags.
///
/// Candidate tag keys are probed in order, and the first key with a non-empty value wins. Probe failures are never
/// surfaced: a failed or empty probe simply moves on to the next key, and when no key yields a value, the default
/// identifier is used instead.
pub struct ClusterIdentityResolver<'a> {
    identity: &'a (dyn InstanceIdentityProvider + Send + Sync),
    tags: &'a (dyn InstanceTagProvider + Send + Sync),
}

impl<'a> ClusterIdentityResolver<'a> {
    /// Creates a new `ClusterIdentityResolver` over the given providers.
    pub fn new(
        identity: &'a (dyn InstanceIdentityProvider + Send + Sync), tags: &'a (dyn InstanceTagProvider + Send + Sync),
    ) -> Self {
        Self { identity, tags }
    }

    /// Resolves the cluster identifier.
    pub async fn resolve_cluster_id(&self, candidate_tag_keys: &[&str], default_value: &str) -> String {
        let instance_id = match self.identity.get_instance_identity().await {
            Ok(identity) => identity.instance_id,
            Err(e) => {
                warn!(error = %e, "Unable to obtain instance identity. Using default cluster ID.");
                return default_value.to_string();
            }
        };

        let cluster_id = self
            .probe(&instance_id, candidate_tag_keys)
            .await
            .unwrap_or_else(|| default_value.to_string());

        info!(cluster_id = %cluster_id, "Using cluster ID.");
        cluster_id
    }

    async fn probe(&self, instance_id: &str, candidate_tag_keys: &[&str]) -> Option<String> {
        for key in candidate_tag_keys {
            match self.tags.get_tag_value(instance_id, key).await {
                Ok(value) if !value.is_empty() => return Some(value),
                Ok(_) => debug!(tag_key = *key, "Cluster ID tag is empty."),
                Err(e) => debug!(tag_key = *key, error = %e, "Failed to get cluster ID tag."),
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        error::GenericError,
        providers::{InstanceIdentity, InstanceTagProvider},
    };

    struct StaticIdentity(Option<&'static str>);

    #[async_trait]
    impl InstanceIdentityProvider for StaticIdentity {
        async fn get_region(&self) -> Result<String, GenericError> {
            Ok("us-west-2".to_string())
        }

        async fn get_instance_identity(&self) -> Result<InstanceIdentity, GenericError> {
            match self.0 {
                Some(instance_id) => Ok(InstanceIdentity {
                    instance_id: instance_id.to_string(),
                    region: "us-west-2".to_string(),
                    ..Default::default()
                }),
                None => Err(anyhow::anyhow!("IMDS unreachable")),
            }
        }
    }

    #[derive(Default)]
    struct CountingTags {
        values: HashMap<&'static str, &'static str>,
        probes: Mutex<HashMap<String, usize>>,
        total: AtomicUsize,
    }

    impl CountingTags {
        fn with(values: &[(&'static str, &'static str)]) -> Self {
            Self {
                values: values.iter().copied().collect(),
                ..Default::default()
            }
        }

        fn probes_for(&self, key: &str) -> usize {
            self.probes.lock().unwrap().get(key).copied().unwrap_or(0)
        }
    }

    #[async_trait]
    impl InstanceTagProvider for CountingTags {
        async fn get_tag_value(&self, instance_id: &str, key: &str) -> Result<String, GenericError> {
            assert_eq!(instance_id, "i-0abc");
            self.total.fetch_add(1, Ordering::SeqCst);
            *self.probes.lock().unwrap().entry(key.to_string()).or_default() += 1;

            self.values
                .get(key)
                .map(|v| v.to_string())
                .ok_or_else(|| anyhow::anyhow!("no tag matching key: {}", key))
        }
    }

    #[tokio::test]
    async fn last_candidate_resolves() {
        let identity = StaticIdentity(Some("i-0abc"));
        let tags = CountingTags::with(&[("Name", "prod-cluster")]);

        let resolver = ClusterIdentityResolver::new(&identity, &tags);
        let cluster_id = resolver.resolve_cluster_id(CLUSTER_ID_TAGS, DEFAULT_CLUSTER_ID).await;

        assert_eq!(cluster_id, "prod-cluster");
        assert_eq!(tags.probes_for("eks:cluster-name"), 1);
        assert_eq!(tags.probes_for("CLUSTER_ID"), 1);
        assert_eq!(tags.probes_for("Name"), 1);
    }

    #[tokio::test]
    async fn first_match_stops_probing() {
        let identity = StaticIdentity(Some("i-0abc"));
        let tags = CountingTags::with(&[("eks:cluster-name", "eks-prod"), ("Name", "prod-cluster")]);

        let resolver = ClusterIdentityResolver::new(&identity, &tags);
        let cluster_id = resolver.resolve_cluster_id(CLUSTER_ID_TAGS, DEFAULT_CLUSTER_ID).await;

        assert_eq!(cluster_id, "eks-prod");
        assert_eq!(tags.total.load(Ordering::SeqCst), 1);
        assert_eq!(tags.probes_for("Name"), 0);
    }

    #[tokio::test]
    async fn empty_value_is_skipped() {
        let identity = StaticIdentity(Some("i-0abc"));
        let tags = CountingTags::with(&[("eks:cluster-name", ""), ("CLUSTER_ID", "tagged")]);

        let resolver = ClusterIdentityResolver::new(&identity, &tags);
        let cluster_id = resolver.resolve_cluster_id(CLUSTER_ID_TAGS, DEFAULT_CLUSTER_ID).await;

        assert_eq!(cluster_id, "tagged");
        assert_eq!(tags.total.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn nothing_resolves_uses_default() {
        let identity = StaticIdentity(Some("i-0abc"));
        let tags = CountingTags::default();

        let resolver = ClusterIdentityResolver::new(&identity, &tags);
        let cluster_id = resolver.resolve_cluster_id(CLUSTER_ID_TAGS, DEFAULT_CLUSTER_ID).await;

        assert_eq!(cluster_id, "k8s-cluster");
        assert_eq!(tags.total.load(Ordering::SeqCst), CLUSTER_ID_TAGS.len());
    }

    #[tokio::test]
    async fn missing_identity_uses_default_without_probing() {
        let identity = StaticIdentity(None);
        let tags = CountingTags::with(&[("Name", "prod-cluster")]);

        let resolver = ClusterIdentityResolver::new(&identity, &tags);
        let cluster_id = resolver.resolve_cluster_id(CLUSTER_ID_TAGS, DEFAULT_CLUSTER_ID).await;

        assert_eq!(cluster_id, "k8s-cluster");
        assert_eq!(tags.total.load(Ordering::SeqCst), 0);
    }
}
