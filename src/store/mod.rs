//! Storage collaborator seam
//!
//! Every operation is a single atomic record operation. Engine functions take
//! the store as an explicit argument; there is no global handle.

use tracing::warn;

use crate::error::Result;
use crate::level::Level;
use crate::model::{Farm, FarmId, NewNode, Node, PermissionGrant, ResourceId, ResourceKind, UserId};

pub mod lmdb;
pub mod memory;

pub use lmdb::LmdbStore;
pub use memory::MemoryStore;

pub trait Store: Send + Sync {
    // Farms

    fn farm(&self, id: FarmId) -> Result<Option<Farm>>;

    /// Every farm whose owner is `owner`, by id
    fn farms_owned_by(&self, owner: &UserId) -> Result<Vec<Farm>>;

    /// Insert a farm record with `owner` as its immutable owner
    fn insert_farm(&self, name: &str, owner: &UserId) -> Result<Farm>;

    /// Insert a farm and the owner's Manager grant.
    ///
    /// This default runs two separate writes. If the grant write fails the
    /// farm is kept and returned; the owner still reaches it through the
    /// ownership fallback in `authz`. Stores with transactions override this.
    fn insert_farm_with_manager(&self, name: &str, owner: &UserId) -> Result<(Farm, Option<PermissionGrant>)> {
        let farm = self.insert_farm(name, owner)?;
        match self.create_grant(PermissionGrant::new(owner.clone(), farm.id, Level::Manager)) {
            Ok(g) => Ok((farm, Some(g))),
            Err(e) => {
                warn!(farm = farm.id, owner = %owner, error = %e, "owner grant not created, relying on ownership fallback");
                Ok((farm, None))
            }
        }
    }

    /// Remove a farm and all its grants. `Conflict` while rows remain.
    fn remove_farm(&self, id: FarmId) -> Result<Farm>;

    // Hierarchy

    fn node(&self, kind: ResourceKind, id: ResourceId) -> Result<Option<Node>>;

    /// Insert a node. `NotFound` if its parent does not exist.
    fn insert_node(&self, new: &NewNode) -> Result<Node>;

    /// Remove a node. `Conflict` while it has children.
    fn remove_node(&self, kind: ResourceKind, id: ResourceId) -> Result<Node>;

    // Grants

    fn grant(&self, farm_id: FarmId, user: &UserId) -> Result<Option<PermissionGrant>>;

    fn grants(&self, farm_id: FarmId) -> Result<Vec<PermissionGrant>>;

    fn grants_for_user(&self, user: &UserId) -> Result<Vec<PermissionGrant>>;

    /// Insert a grant. `Conflict` if one exists for (user, farm), `NotFound`
    /// if the farm is missing. Check and write are one atomic step.
    fn create_grant(&self, grant: PermissionGrant) -> Result<PermissionGrant>;

    /// Change the level of an existing grant. `NotFound` if absent.
    fn update_grant(&self, farm_id: FarmId, user: &UserId, level: Level) -> Result<PermissionGrant>;

    /// Remove an existing grant. `NotFound` if absent.
    fn delete_grant(&self, farm_id: FarmId, user: &UserId) -> Result<PermissionGrant>;
}

impl<S: Store + ?Sized> Store for std::sync::Arc<S> {
    fn farm(&self, id: FarmId) -> Result<Option<Farm>> {
        (**self).farm(id)
    }
    fn farms_owned_by(&self, owner: &UserId) -> Result<Vec<Farm>> {
        (**self).farms_owned_by(owner)
    }
    fn insert_farm(&self, name: &str, owner: &UserId) -> Result<Farm> {
        (**self).insert_farm(name, owner)
    }
    fn insert_farm_with_manager(&self, name: &str, owner: &UserId) -> Result<(Farm, Option<PermissionGrant>)> {
        (**self).insert_farm_with_manager(name, owner)
    }
    fn remove_farm(&self, id: FarmId) -> Result<Farm> {
        (**self).remove_farm(id)
    }
    fn node(&self, kind: ResourceKind, id: ResourceId) -> Result<Option<Node>> {
        (**self).node(kind, id)
    }
    fn insert_node(&self, new: &NewNode) -> Result<Node> {
        (**self).insert_node(new)
    }
    fn remove_node(&self, kind: ResourceKind, id: ResourceId) -> Result<Node> {
        (**self).remove_node(kind, id)
    }
    fn grant(&self, farm_id: FarmId, user: &UserId) -> Result<Option<PermissionGrant>> {
        (**self).grant(farm_id, user)
    }
    fn grants(&self, farm_id: FarmId) -> Result<Vec<PermissionGrant>> {
        (**self).grants(farm_id)
    }
    fn grants_for_user(&self, user: &UserId) -> Result<Vec<PermissionGrant>> {
        (**self).grants_for_user(user)
    }
    fn create_grant(&self, grant: PermissionGrant) -> Result<PermissionGrant> {
        (**self).create_grant(grant)
    }
    fn update_grant(&self, farm_id: FarmId, user: &UserId, level: Level) -> Result<PermissionGrant> {
        (**self).update_grant(farm_id, user, level)
    }
    fn delete_grant(&self, farm_id: FarmId, user: &UserId) -> Result<PermissionGrant> {
        (**self).delete_grant(farm_id, user)
    }
}
