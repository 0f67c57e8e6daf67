//! Grant management: who may create, change or remove a grant
//!
//! Rules, in order:
//! 1. The farm must exist (`NotFound`).
//! 2. The caller must hold Manager on the farm (`Forbidden`).
//! 3. A Manager grant cannot be created for, or given to, another user.
//! 4. An existing Manager grant cannot be changed or removed.
//! 5. Only the owner may create, change or remove the owner's own grant.
//! 6. Creating over an existing grant is a `Conflict`; use update.
//!
//! There is no administrator bypass.

use tracing::info;

use crate::authz::require;
use crate::error::{Error, Result, Rule};
use crate::level::{Level, LevelSet};
use crate::model::{Farm, FarmId, PermissionGrant, UserId};
use crate::store::Store;

fn farm_exists<S: Store + ?Sized>(store: &S, farm_id: FarmId) -> Result<Farm> {
    store.farm(farm_id)?.ok_or_else(|| Error::NotFound(format!("farm {}", farm_id)))
}

/// A grant on the owner would outrank the ownership fallback
fn owner_untouched(farm: &Farm, caller: &UserId, target: &UserId) -> Result<()> {
    if *target == farm.owner && *caller != farm.owner {
        return Err(Error::Forbidden(Rule::OwnerProtected));
    }
    Ok(())
}

fn no_manager_escalation(caller: &UserId, target: &UserId, level: Level) -> Result<()> {
    if level == Level::Manager && caller != target {
        return Err(Error::Forbidden(Rule::ManagerEscalation));
    }
    Ok(())
}

/// Load the target's grant, refusing if it is a Manager grant
fn unprotected<S: Store + ?Sized>(store: &S, target: &UserId, farm_id: FarmId) -> Result<PermissionGrant> {
    let g = store
        .grant(farm_id, target)?
        .ok_or_else(|| Error::NotFound(format!("grant for {} on farm {}", target, farm_id)))?;
    if g.level == Level::Manager {
        return Err(Error::Forbidden(Rule::ManagerProtected));
    }
    Ok(g)
}

/// Grant `level` on a farm to `target`.
///
/// A caller may create a Manager grant only for themselves, which lets a
/// farm owner whose bootstrap grant is missing restore it.
pub fn create_grant<S: Store + ?Sized>(
    store: &S,
    caller: &UserId,
    target: &UserId,
    farm_id: FarmId,
    level: Level,
) -> Result<PermissionGrant> {
    let farm = farm_exists(store, farm_id)?;
    require(store, caller, farm_id, LevelSet::MANAGERS)?;
    no_manager_escalation(caller, target, level)?;
    owner_untouched(&farm, caller, target)?;
    let g = store.create_grant(PermissionGrant::new(target.clone(), farm_id, level))?;
    info!(farm = farm_id, %caller, %target, %level, "grant created");
    Ok(g)
}

/// Change the level of an existing non-Manager grant
pub fn update_grant<S: Store + ?Sized>(
    store: &S,
    caller: &UserId,
    target: &UserId,
    farm_id: FarmId,
    level: Level,
) -> Result<PermissionGrant> {
    let farm = farm_exists(store, farm_id)?;
    require(store, caller, farm_id, LevelSet::MANAGERS)?;
    let old = unprotected(store, target, farm_id)?;
    no_manager_escalation(caller, target, level)?;
    owner_untouched(&farm, caller, target)?;
    let g = store.update_grant(farm_id, target, level)?;
    info!(farm = farm_id, %caller, %target, from = %old.level, to = %level, "grant updated");
    Ok(g)
}

/// Remove an existing non-Manager grant
pub fn delete_grant<S: Store + ?Sized>(
    store: &S,
    caller: &UserId,
    target: &UserId,
    farm_id: FarmId,
) -> Result<PermissionGrant> {
    let farm = farm_exists(store, farm_id)?;
    require(store, caller, farm_id, LevelSet::MANAGERS)?;
    unprotected(store, target, farm_id)?;
    owner_untouched(&farm, caller, target)?;
    let g = store.delete_grant(farm_id, target)?;
    info!(farm = farm_id, %caller, %target, level = %g.level, "grant deleted");
    Ok(g)
}

/// List every grant on a farm (Managers only)
pub fn list_grants<S: Store + ?Sized>(store: &S, caller: &UserId, farm_id: FarmId) -> Result<Vec<PermissionGrant>> {
    farm_exists(store, farm_id)?;
    require(store, caller, farm_id, LevelSet::MANAGERS)?;
    store.grants(farm_id)
}

/// The caller's own grants across all farms
pub fn memberships<S: Store + ?Sized>(store: &S, caller: &UserId) -> Result<Vec<PermissionGrant>> {
    store.grants_for_user(caller)
}
