//! Authorization engine
//!
//! Checks are exact set membership: the caller's resolved level must be one
//! of the allowed levels. Nothing is cached; every call reads the store.

use tracing::debug;

use crate::error::{Error, Result, Rule};
use crate::level::{Level, LevelSet};
use crate::model::{FarmId, ResourceRef, UserId};
use crate::resolver;
use crate::store::Store;

/// Resolve the level `user` holds on a farm.
///
/// An explicit grant wins. Without one, the farm owner resolves to Manager
/// (covers a farm whose owner grant was never written). Otherwise `None`.
/// Fails only when the farm itself does not exist.
pub fn effective_level<S: Store + ?Sized>(store: &S, user: &UserId, farm_id: FarmId) -> Result<Option<Level>> {
    let farm = store.farm(farm_id)?.ok_or_else(|| Error::NotFound(format!("farm {}", farm_id)))?;
    if let Some(g) = store.grant(farm_id, user)? {
        return Ok(Some(g.level));
    }
    if farm.owner == *user {
        debug!(farm = farm_id, %user, "no grant for owner, using ownership fallback");
        return Ok(Some(Level::Manager));
    }
    Ok(None)
}

/// Check whether `user` may act on a farm with one of `allowed` levels
pub fn can_perform<S: Store + ?Sized>(store: &S, user: &UserId, farm_id: FarmId, allowed: LevelSet) -> Result<bool> {
    let level = effective_level(store, user, farm_id)?;
    let ok = level.map(|l| allowed.contains(l)).unwrap_or(false);
    debug!(farm = farm_id, %user, ?level, %allowed, ok, "authorization check");
    Ok(ok)
}

/// Like [`can_perform`], but resolves the farm from any hierarchy resource
pub fn can_perform_on<S: Store + ?Sized>(store: &S, user: &UserId, resource: ResourceRef, allowed: LevelSet) -> Result<bool> {
    let farm_id = resolver::resolve(store, resource)?;
    can_perform(store, user, farm_id, allowed)
}

/// Fail with `Forbidden` unless [`can_perform`] allows
#[inline]
pub fn require<S: Store + ?Sized>(store: &S, user: &UserId, farm_id: FarmId, allowed: LevelSet) -> Result<()> {
    if can_perform(store, user, farm_id, allowed)? {
        Ok(())
    } else {
        Err(Error::Forbidden(Rule::InsufficientLevel))
    }
}
