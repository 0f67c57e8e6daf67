//! Resource hierarchy resolution (read-only, no permission checks)

use tracing::warn;

use crate::error::{Error, Result};
use crate::model::{FarmId, ResourceId, ResourceKind, ResourceRef};
use crate::store::Store;

/// Longest parent chain: sensor -> rack -> row -> farm
pub const MAX_HIERARCHY_DEPTH: usize = 4;

/// Walk parent links from a resource up to its owning farm.
///
/// A missing starting resource is `NotFound`. A missing ancestor, or a row
/// whose farm is gone, is `Integrity`: the tree is inconsistent.
pub fn resolve_farm_id<S: Store + ?Sized>(store: &S, id: ResourceId, kind: ResourceKind) -> Result<FarmId> {
    resolve(store, ResourceRef::new(kind, id))
}

/// Same as [`resolve_farm_id`] for a `ResourceRef`
pub fn resolve<S: Store + ?Sized>(store: &S, start: ResourceRef) -> Result<FarmId> {
    let mut cur = start;
    for depth in 0..=MAX_HIERARCHY_DEPTH {
        let missing = move || {
            if depth == 0 {
                Error::NotFound(start.to_string())
            } else {
                warn!(%start, missing = %cur, "dangling parent link");
                Error::Integrity(format!("{} references missing {}", start, cur))
            }
        };
        if cur.kind == ResourceKind::Farm {
            return match store.farm(cur.id)? {
                Some(f) => Ok(f.id),
                None => Err(missing()),
            };
        }
        cur = store.node(cur.kind, cur.id)?.ok_or_else(missing)?.parent();
    }
    Err(Error::Integrity(format!("{} exceeds hierarchy depth", start)))
}
