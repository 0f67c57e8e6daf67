//! Hierarchy node operations, each checked against the owning farm

use tracing::info;

use crate::authz::require;
use crate::error::{Error, Result};
use crate::level::LevelSet;
use crate::model::{NewNode, Node, ResourceRef, UserId};
use crate::resolver::resolve;
use crate::store::Store;

/// Create a node under `new.parent`. Requires Editor or Manager.
pub fn create_node<S: Store + ?Sized>(store: &S, caller: &UserId, new: &NewNode) -> Result<Node> {
    new.validate()?;
    let farm_id = resolve(store, new.parent)?;
    require(store, caller, farm_id, LevelSet::EDITORS)?;
    let node = store.insert_node(new)?;
    info!(farm = farm_id, %caller, node = %node.resource(), parent = %new.parent, "node created");
    Ok(node)
}

/// Fetch a node. Any member level.
pub fn get_node<S: Store + ?Sized>(store: &S, caller: &UserId, r: ResourceRef) -> Result<Node> {
    let farm_id = resolve(store, r)?;
    require(store, caller, farm_id, LevelSet::ANY_MEMBER)?;
    store.node(r.kind, r.id)?.ok_or_else(|| Error::NotFound(r.to_string()))
}

/// Delete a leaf node. Requires Editor or Manager.
pub fn delete_node<S: Store + ?Sized>(store: &S, caller: &UserId, r: ResourceRef) -> Result<Node> {
    let farm_id = resolve(store, r)?;
    require(store, caller, farm_id, LevelSet::EDITORS)?;
    let node = store.remove_node(r.kind, r.id)?;
    info!(farm = farm_id, %caller, node = %r, "node deleted");
    Ok(node)
}
