//! Integration tests for clusterscope

mod support {
    use clusterscope::{
        ComponentKey, CreationContext, FactoryRegistry, ScopeConfig, ScopedInstance,
    };
    use serde::{Deserialize, Serialize};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Once};

    pub fn init_tracing() {
        static INIT: Once = Once::new();
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init();
        });
    }

    /// The scoped domain object used across the suite
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct SessionCart {
        pub owner: Option<String>,
        pub items: Vec<String>,
    }

    impl SessionCart {
        pub fn empty() -> Self {
            Self {
                owner: None,
                items: Vec::new(),
            }
        }
    }

    /// Component definition for [`SessionCart`]
    pub struct CartComponent {
        qualifier: &'static str,
        pub created: AtomicUsize,
    }

    impl CartComponent {
        pub fn new() -> Self {
            Self::qualified("default")
        }

        pub fn qualified(qualifier: &'static str) -> Self {
            Self {
                qualifier,
                created: AtomicUsize::new(0),
            }
        }
    }

    impl clusterscope::Component for CartComponent {
        fn name(&self) -> &str {
            "session-cart"
        }

        fn passivation_id(&self) -> Option<ComponentKey> {
            Some(ComponentKey::derive(
                "integration::SessionCart",
                &[self.qualifier],
            ))
        }

        fn create(&self, _ctx: &dyn CreationContext) -> Box<dyn ScopedInstance> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Box::new(SessionCart::empty())
        }
    }

    /// Creation context counting release invocations
    pub struct TrackedCreation {
        released: Arc<AtomicUsize>,
    }

    impl CreationContext for TrackedCreation {
        fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn tracked_creation() -> (Arc<AtomicUsize>, Arc<dyn CreationContext>) {
        let released = Arc::new(AtomicUsize::new(0));
        let creation = Arc::new(TrackedCreation {
            released: Arc::clone(&released),
        });
        (released, creation)
    }

    /// Store-by-value plus statistics, the strictest configuration for
    /// observing write-backs
    pub fn config_with_stats() -> ScopeConfig {
        let mut config = ScopeConfig::default();
        config.store.store_by_value = true;
        config.store.statistics_enabled = true;
        config
    }

    pub fn empty_registry() -> FactoryRegistry {
        FactoryRegistry::new()
    }
}

mod lifecycle_tests {
    use crate::support::{self, CartComponent, SessionCart};
    use clusterscope::store::StoreCache;
    use clusterscope::{ClusterScope, MemoryProvider, ScopeConfig};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn scope_with(config: ScopeConfig) -> ClusterScope {
        ClusterScope::bootstrap(
            config,
            Arc::new(MemoryProvider::new()),
            support::empty_registry(),
        )
    }

    fn puts(scope: &ClusterScope) -> u64 {
        scope.storage().unwrap().statistics().unwrap().puts
    }

    #[test]
    fn passive_lookup_misses_without_creating() {
        support::init_tracing();
        let scope = scope_with(ScopeConfig::default());
        let component = CartComponent::new();

        assert!(scope.context().get(&component).unwrap().is_none());
        assert_eq!(component.created.load(Ordering::SeqCst), 0);
        assert!(scope.storage().unwrap().entries().unwrap().is_empty());
    }

    #[test]
    fn missing_creation_context_is_a_noop() {
        support::init_tracing();
        let scope = scope_with(ScopeConfig::default());
        let component = CartComponent::new();

        let resolved = scope.context().get_or_create(&component, None).unwrap();
        assert!(resolved.is_none());
        assert!(scope.storage().unwrap().entries().unwrap().is_empty());
    }

    #[test]
    fn create_mutate_and_reresolve() {
        support::init_tracing();
        let scope = scope_with(support::config_with_stats());
        let context = scope.context();
        let component = CartComponent::new();
        let (_released, creation) = support::tracked_creation();

        let proxy = context
            .get_or_create(&component, Some(creation))
            .unwrap()
            .unwrap();
        proxy
            .with(|cart: &mut SessionCart| {
                cart.owner = Some("cluster".to_string());
                cart.items.push("widget".to_string());
            })
            .unwrap();

        // A fresh passive resolution sees the mutation even though the
        // store only held value-copies
        let fresh = context.get(&component).unwrap().unwrap();
        let owner = fresh
            .with(|cart: &mut SessionCart| cart.owner.clone())
            .unwrap();
        assert_eq!(owner.as_deref(), Some("cluster"));
        assert_eq!(component.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn every_dispatch_writes_back_transfer_does_not() {
        support::init_tracing();
        let scope = scope_with(support::config_with_stats());
        let context = scope.context();
        let component = CartComponent::new();
        let (_released, creation) = support::tracked_creation();

        let proxy = context
            .get_or_create(&component, Some(creation))
            .unwrap()
            .unwrap();
        let baseline = puts(&scope);

        proxy
            .with(|cart: &mut SessionCart| cart.items.push("a".to_string()))
            .unwrap();
        // Reads dispatched through the proxy persist too
        proxy.with(|cart: &mut SessionCart| cart.items.len()).unwrap();
        assert_eq!(puts(&scope) - baseline, 2);

        let snapshot = proxy.transfer().unwrap();
        assert_eq!(snapshot["items"], serde_json::json!(["a"]));
        assert_eq!(puts(&scope) - baseline, 2);
    }

    #[test]
    fn failing_dispatch_propagates_after_write_back() {
        support::init_tracing();
        let scope = scope_with(support::config_with_stats());
        let context = scope.context();
        let component = CartComponent::new();
        let (_released, creation) = support::tracked_creation();

        let proxy = context
            .get_or_create(&component, Some(creation))
            .unwrap()
            .unwrap();
        let baseline = puts(&scope);

        let outcome: Result<(), String> = proxy
            .with(|cart: &mut SessionCart| {
                cart.owner = Some("half-done".to_string());
                Err("validation failed".to_string())
            })
            .unwrap();
        assert_eq!(outcome.unwrap_err(), "validation failed");
        assert_eq!(puts(&scope) - baseline, 1);

        // The partial mutation was persisted by the mandatory write-back
        let fresh = context.get(&component).unwrap().unwrap();
        let owner = fresh
            .with(|cart: &mut SessionCart| cart.owner.clone())
            .unwrap();
        assert_eq!(owner.as_deref(), Some("half-done"));
    }
}

mod cluster_tests {
    use crate::support::{self, CartComponent, SessionCart};
    use clusterscope::store::StoreCache;
    use clusterscope::{ClusterScope, MemoryProvider};
    use std::sync::atomic::Ordering;
    use std::sync::{Arc, Barrier};

    /// Two scopes over one provider behave like two nodes of a cluster
    fn two_nodes() -> (ClusterScope, ClusterScope) {
        let provider = MemoryProvider::new();
        let node_a = ClusterScope::bootstrap(
            support::config_with_stats(),
            Arc::new(provider.clone()),
            support::empty_registry(),
        );
        let node_b = ClusterScope::bootstrap(
            support::config_with_stats(),
            Arc::new(provider),
            support::empty_registry(),
        );
        (node_a, node_b)
    }

    #[test]
    fn second_node_resolves_first_nodes_instance() {
        support::init_tracing();
        let (node_a, node_b) = two_nodes();
        let component = CartComponent::new();
        let (_released, creation) = support::tracked_creation();

        let proxy = node_a
            .context()
            .get_or_create(&component, Some(creation))
            .unwrap()
            .unwrap();
        proxy
            .with(|cart: &mut SessionCart| cart.owner = Some("node-a".to_string()))
            .unwrap();

        let remote = node_b.context().get(&component).unwrap().unwrap();
        let owner = remote
            .with(|cart: &mut SessionCart| cart.owner.clone())
            .unwrap();
        assert_eq!(owner.as_deref(), Some("node-a"));
        assert_eq!(component.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn racing_nodes_converge_to_one_entry() {
        support::init_tracing();
        let (node_a, node_b) = two_nodes();
        let node_a = Arc::new(node_a);
        let node_b = Arc::new(node_b);
        let component = Arc::new(CartComponent::new());
        let barrier = Arc::new(Barrier::new(6));

        let threads: Vec<_> = (0..6)
            .map(|i| {
                let node = if i % 2 == 0 {
                    Arc::clone(&node_a)
                } else {
                    Arc::clone(&node_b)
                };
                let component = Arc::clone(&component);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    let (_released, creation) = support::tracked_creation();
                    node.context()
                        .get_or_create(component.as_ref(), Some(creation))
                        .unwrap()
                        .unwrap()
                        .with(|cart: &mut SessionCart| cart.items.len())
                        .unwrap();
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        // Eventual single-entry convergence; which racer's instance won
        // is deliberately unspecified
        assert_eq!(node_a.storage().unwrap().entries().unwrap().len(), 1);

        let seen_a = node_a
            .context()
            .get(component.as_ref())
            .unwrap()
            .unwrap()
            .record()
            .record_id();
        let seen_b = node_b
            .context()
            .get(component.as_ref())
            .unwrap()
            .unwrap()
            .record()
            .record_id();
        assert_eq!(seen_a, seen_b);
    }
}

mod bootstrap_tests {
    use crate::support::{self, CartComponent, SessionCart};
    use clusterscope::{
        ClusterScope, ComponentKey, CreationContext, FactoryRegistry, InstanceRecord,
        MemoryProvider, Properties, ScopeConfig, ScopeError, ScopeResult,
    };
    use clusterscope::registry::EntryLoader;
    use clusterscope::store::StoreCache;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[test]
    fn toml_file_drives_the_store() {
        support::init_tracing();
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("scope.toml");
        std::fs::write(
            &path,
            "[store]\nuri = \"memory:integration\"\nname = \"carts\"\nstatistics_enabled = true\n",
        )
        .unwrap();

        let config = ScopeConfig::load_from_file(&path).unwrap();
        let scope = ClusterScope::bootstrap(
            config,
            Arc::new(MemoryProvider::new()),
            support::empty_registry(),
        );

        let storage = scope.storage().unwrap();
        assert_eq!(storage.name(), "carts");
        assert!(storage.statistics().is_some());
    }

    #[test]
    fn properties_match_container_contract() {
        support::init_tracing();
        let mut props = Properties::new();
        props.insert("clusterscope.name".to_string(), "carts".to_string());
        props.insert("clusterscope.storeByValue".to_string(), "true".to_string());
        props.insert("clusterscope.release-nodes".to_string(), "false".to_string());

        let config = ScopeConfig::from_properties(&props).unwrap();
        assert_eq!(config.store.name, "carts");
        assert!(config.store.store_by_value);
        assert!(!config.shutdown.release_nodes);
    }

    #[test]
    fn read_through_loader_resolves_without_creating() {
        support::init_tracing();

        struct SeededCarts;

        impl EntryLoader for SeededCarts {
            fn load(&self, _key: &ComponentKey) -> ScopeResult<Option<InstanceRecord>> {
                struct NoRelease;
                impl CreationContext for NoRelease {
                    fn release(&self) {}
                }

                let record = InstanceRecord::new();
                record.install(
                    Box::new(SessionCart {
                        owner: Some("warehouse".to_string()),
                        items: vec!["seeded".to_string()],
                    }),
                    Arc::new(NoRelease),
                );
                Ok(Some(record))
            }
        }

        let mut registry = FactoryRegistry::new();
        registry.register_loader("seeded-carts", || Arc::new(SeededCarts));

        let mut config = ScopeConfig::default();
        config.store.read_through = true;
        config.store.loader_factory = Some("seeded-carts".to_string());

        let scope = ClusterScope::bootstrap(config, Arc::new(MemoryProvider::new()), registry);
        let component = CartComponent::new();

        let proxy = scope.context().get(&component).unwrap().unwrap();
        let owner = proxy
            .with(|cart: &mut SessionCart| cart.owner.clone())
            .unwrap();
        assert_eq!(owner.as_deref(), Some("warehouse"));
        assert_eq!(component.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unknown_factory_fails_on_first_access() {
        support::init_tracing();
        let mut config = ScopeConfig::default();
        config.store.expiry_factory = Some("never-registered".to_string());

        let scope = ClusterScope::bootstrap(
            config,
            Arc::new(MemoryProvider::new()),
            support::empty_registry(),
        );

        let err = scope.context().get(&CartComponent::new()).unwrap_err();
        assert!(matches!(err, ScopeError::UnknownFactory { kind: "expiry", .. }));
    }

    #[test]
    fn malformed_uri_fails_on_first_access() {
        support::init_tracing();
        let mut config = ScopeConfig::default();
        config.store.uri = Some("definitely not a uri".to_string());

        let scope = ClusterScope::bootstrap(
            config,
            Arc::new(MemoryProvider::new()),
            support::empty_registry(),
        );

        let err = scope.storage().unwrap_err();
        assert!(err.is_configuration());
    }
}

mod shutdown_tests {
    use crate::support::{self, CartComponent, SessionCart};
    use clusterscope::store::StoreCache;
    use clusterscope::{ClusterScope, MemoryProvider, Properties, ScopeConfig};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn scope_with(config: ScopeConfig) -> ClusterScope {
        ClusterScope::bootstrap(
            config,
            Arc::new(MemoryProvider::new()),
            support::empty_registry(),
        )
    }

    #[test]
    fn shutdown_releases_every_live_record() {
        support::init_tracing();
        let scope = scope_with(ScopeConfig::default());
        let context = scope.context();

        let first = CartComponent::qualified("tenant-a");
        let second = CartComponent::qualified("tenant-b");
        let (released_a, creation_a) = support::tracked_creation();
        let (released_b, creation_b) = support::tracked_creation();

        context.get_or_create(&first, Some(creation_a)).unwrap().unwrap();
        context.get_or_create(&second, Some(creation_b)).unwrap().unwrap();

        let drained = scope.shutdown();

        assert_eq!(drained, 2);
        assert_eq!(released_a.load(Ordering::SeqCst), 1);
        assert_eq!(released_b.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_nodes_false_skips_the_drain() {
        support::init_tracing();
        let mut props = Properties::new();
        props.insert("clusterscope.release-nodes".to_string(), "false".to_string());
        let config = ScopeConfig::from_properties(&props).unwrap();

        let scope = scope_with(config);
        let component = CartComponent::new();
        let (released, creation) = support::tracked_creation();
        scope
            .context()
            .get_or_create(&component, Some(creation))
            .unwrap()
            .unwrap();

        let drained = scope.shutdown();

        assert_eq!(drained, 0);
        assert_eq!(released.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn store_is_terminal_after_shutdown() {
        support::init_tracing();
        let scope = scope_with(ScopeConfig::default());
        let component = CartComponent::new();
        let (_released, creation) = support::tracked_creation();

        let proxy = scope
            .context()
            .get_or_create(&component, Some(creation))
            .unwrap()
            .unwrap();
        let storage = scope.storage().unwrap();

        scope.shutdown();

        assert!(storage.entries().is_err());
        // Even proxy dispatch fails once the chain is closed
        assert!(proxy.with(|cart: &mut SessionCart| cart.items.len()).is_err());
    }
}
