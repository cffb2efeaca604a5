//! Applies watch events to the in-memory store and maps them to the root
//! policies they affect.

use std::collections::BTreeSet;

use rps_reconcile::triggers;
use rps_schemas::ObjectKey;
use rps_store::{InMemoryStore, ObjectStore, StoreError};
use tracing::debug;

use crate::api_types::WatchEvent;

/// Apply `event` and return the affected root policy keys, sorted.
///
/// A binding change affects the roots of both its previous and its new
/// subjects, so a removed subject still gets its placement cleared.
pub async fn apply_event(
    store: &InMemoryStore,
    event: WatchEvent,
) -> Result<Vec<ObjectKey>, StoreError> {
    let roots = match event {
        WatchEvent::Binding { object, deleted } => {
            let key = object.metadata.key();
            let previous = store
                .list_placement_bindings(&key.namespace)
                .await?
                .into_iter()
                .find(|b| b.name() == key.name);

            let mut roots: BTreeSet<ObjectKey> = BTreeSet::new();
            if let Some(prev) = &previous {
                roots.extend(triggers::roots_for_binding(store, prev).await);
            }
            if deleted {
                store.delete_binding(&key).await;
            } else {
                roots.extend(triggers::roots_for_binding(store, &object).await);
                store.upsert_binding(object).await;
            }
            roots.into_iter().collect()
        }
        WatchEvent::PlacementRule { object, deleted } => {
            if deleted {
                store.delete_placement_rule(&object.metadata.key()).await;
            } else {
                store.upsert_placement_rule(object.clone()).await;
            }
            triggers::roots_for_placement_rule(store, &object).await?
        }
        WatchEvent::PlacementDecision { object, deleted } => {
            if deleted {
                store.delete_placement_decision(&object.metadata.key()).await;
            } else {
                store.upsert_placement_decision(object.clone()).await;
            }
            triggers::roots_for_placement_decision(store, &object).await?
        }
        WatchEvent::Policy { object, deleted } => {
            let root = triggers::root_for_policy(&object);
            if deleted {
                store.delete_policy(&object.key()).await;
            } else {
                store.upsert_policy(object).await;
            }
            vec![root]
        }
    };

    debug!(roots = roots.len(), "Mapped watch event to root policies");
    Ok(roots)
}
