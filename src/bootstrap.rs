//! Farm lifecycle: creation with owner bootstrap, lookup, owner-only removal

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::authz::require;
use crate::error::{Error, Result, Rule};
use crate::level::LevelSet;
use crate::model::{Farm, FarmId, UserId};
use crate::store::Store;

/// Create a farm owned by `creator` and make them its sole Manager.
///
/// Both writes happen in one store transaction where the store supports it.
/// If only the farm was written, the creator still resolves to Manager
/// through the ownership fallback in [`crate::authz::effective_level`].
pub fn create_farm<S: Store + ?Sized>(store: &S, creator: &UserId, name: &str) -> Result<Farm> {
    let (farm, grant) = store.insert_farm_with_manager(name, creator)?;
    match grant {
        Some(_) => info!(farm = farm.id, owner = %creator, "farm created"),
        None => warn!(farm = farm.id, owner = %creator, "farm created without owner grant"),
    }
    Ok(farm)
}

/// Fetch a farm the caller is a member of
pub fn get_farm<S: Store + ?Sized>(store: &S, caller: &UserId, farm_id: FarmId) -> Result<Farm> {
    require(store, caller, farm_id, LevelSet::ANY_MEMBER)?;
    store.farm(farm_id)?.ok_or_else(|| Error::NotFound(format!("farm {}", farm_id)))
}

/// Farms the caller holds a grant on or owns, ordered by id
pub fn list_farms<S: Store + ?Sized>(store: &S, caller: &UserId) -> Result<Vec<Farm>> {
    let mut farms = BTreeMap::new();
    for g in store.grants_for_user(caller)? {
        if let Some(f) = store.farm(g.farm_id)? {
            farms.insert(f.id, f);
        }
    }
    // Owners whose bootstrap grant is missing still see their farms
    for f in store.farms_owned_by(caller)? {
        farms.entry(f.id).or_insert(f);
    }
    Ok(farms.into_values().collect())
}

/// Delete a farm. Only its owner may, and only once its rows are gone.
pub fn delete_farm<S: Store + ?Sized>(store: &S, caller: &UserId, farm_id: FarmId) -> Result<Farm> {
    let farm = store.farm(farm_id)?.ok_or_else(|| Error::NotFound(format!("farm {}", farm_id)))?;
    if farm.owner != *caller {
        return Err(Error::Forbidden(Rule::NotOwner));
    }
    let farm = store.remove_farm(farm_id)?;
    info!(farm = farm_id, owner = %caller, "farm deleted");
    Ok(farm)
}
