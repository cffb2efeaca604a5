//! Error taxonomy.
//!
//! Two propagation policies coexist and are kept as separate types:
//! - [`ResolveError`]: decision computation. Fail-fast; any instance aborts
//!   the whole decision set.
//! - [`StatusError`]: the update cycle as seen by the caller. Every variant
//!   means "retry this root policy later".
//!
//! Best-effort failures (replica lookups, the pre-write refresh) never
//! surface as either type; they are logged and carried in report values.

use rps_schemas::ObjectKey;
use rps_store::StoreError;

use crate::binding::GroupingKind;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The binding's placementRef does not name a supported grouping kind in
    /// its API group, or carries no name.
    #[error("placement binding {binding} reference is not valid")]
    InvalidBinding { binding: ObjectKey },

    #[error("failed to check for {kind} '{name}'")]
    Lookup {
        kind: GroupingKind,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to get the placement decisions for binding {binding}")]
    Decisions {
        binding: ObjectKey,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("failed to get the root policy {key}")]
    LoadRoot {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("could not list the placement bindings in namespace {namespace}")]
    ListBindings {
        namespace: String,
        #[source]
        source: StoreError,
    },

    #[error("could not get the placement decisions for {key}")]
    Decisions {
        key: ObjectKey,
        #[source]
        source: ResolveError,
    },

    #[error("failed to update the status of root policy {key}")]
    Persist {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}
