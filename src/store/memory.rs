//! In-process store. One lock guards all records, so every operation
//! (including farm-plus-grant insertion) is atomic.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Store;
use crate::error::{Error, Result};
use crate::level::Level;
use crate::model::{Farm, FarmId, NewNode, Node, PermissionGrant, ResourceId, ResourceKind, ResourceRef, UserId};

#[derive(Default)]
struct State {
    next_id: u64,
    farms: BTreeMap<FarmId, Farm>,
    nodes: HashMap<ResourceRef, Node>,
    grants: BTreeMap<(FarmId, UserId), PermissionGrant>,
}

impl State {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn exists(&self, r: ResourceRef) -> bool {
        match r.kind {
            ResourceKind::Farm => self.farms.contains_key(&r.id),
            _ => self.nodes.contains_key(&r),
        }
    }

    fn has_children(&self, r: ResourceRef) -> bool {
        self.nodes.values().any(|n| n.parent() == r)
    }

    fn put_farm(&mut self, name: &str, owner: &UserId) -> Result<Farm> {
        if name.trim().is_empty() {
            return Err(Error::Invalid("farm name is empty".into()));
        }
        let farm = Farm { id: self.next_id(), name: name.to_string(), owner: owner.clone() };
        self.farms.insert(farm.id, farm.clone());
        Ok(farm)
    }

    fn put_grant(&mut self, g: &PermissionGrant) -> Result<()> {
        if !self.farms.contains_key(&g.farm_id) {
            return Err(Error::NotFound(format!("farm {}", g.farm_id)));
        }
        let k = (g.farm_id, g.user.clone());
        if self.grants.contains_key(&k) {
            return Err(Error::Conflict(format!("grant for {} on farm {}", g.user, g.farm_id)));
        }
        self.grants.insert(k, g.clone());
        Ok(())
    }

    fn grant_mut(&mut self, farm_id: FarmId, user: &UserId) -> Result<&mut PermissionGrant> {
        self.grants
            .get_mut(&(farm_id, user.clone()))
            .ok_or_else(|| Error::NotFound(format!("grant for {} on farm {}", user, farm_id)))
    }
}

/// Store held entirely in memory
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl Store for MemoryStore {
    fn farm(&self, id: FarmId) -> Result<Option<Farm>> {
        Ok(self.read().farms.get(&id).cloned())
    }

    fn farms_owned_by(&self, owner: &UserId) -> Result<Vec<Farm>> {
        Ok(self.read().farms.values().filter(|f| f.owner == *owner).cloned().collect())
    }

    fn insert_farm(&self, name: &str, owner: &UserId) -> Result<Farm> {
        self.write().put_farm(name, owner)
    }

    fn insert_farm_with_manager(&self, name: &str, owner: &UserId) -> Result<(Farm, Option<PermissionGrant>)> {
        let mut s = self.write();
        let farm = s.put_farm(name, owner)?;
        let g = PermissionGrant::new(owner.clone(), farm.id, Level::Manager);
        s.put_grant(&g)?;
        Ok((farm, Some(g)))
    }

    fn remove_farm(&self, id: FarmId) -> Result<Farm> {
        let mut s = self.write();
        if !s.farms.contains_key(&id) {
            return Err(Error::NotFound(format!("farm {}", id)));
        }
        if s.has_children(ResourceRef::farm(id)) {
            return Err(Error::Conflict(format!("rows under farm {}", id)));
        }
        s.grants.retain(|(f, _), _| *f != id);
        s.farms.remove(&id).ok_or_else(|| Error::NotFound(format!("farm {}", id)))
    }

    fn node(&self, kind: ResourceKind, id: ResourceId) -> Result<Option<Node>> {
        Ok(self.read().nodes.get(&ResourceRef::new(kind, id)).cloned())
    }

    fn insert_node(&self, new: &NewNode) -> Result<Node> {
        new.validate()?;
        let mut s = self.write();
        if !s.exists(new.parent) {
            return Err(Error::NotFound(new.parent.to_string()));
        }
        let id = s.next_id();
        let node = Node::build(id, new)?;
        s.nodes.insert(node.resource(), node.clone());
        Ok(node)
    }

    fn remove_node(&self, kind: ResourceKind, id: ResourceId) -> Result<Node> {
        let r = ResourceRef::new(kind, id);
        let mut s = self.write();
        if !s.nodes.contains_key(&r) {
            return Err(Error::NotFound(r.to_string()));
        }
        if s.has_children(r) {
            return Err(Error::Conflict(format!("children under {}", r)));
        }
        s.nodes.remove(&r).ok_or_else(|| Error::NotFound(r.to_string()))
    }

    fn grant(&self, farm_id: FarmId, user: &UserId) -> Result<Option<PermissionGrant>> {
        Ok(self.read().grants.get(&(farm_id, user.clone())).cloned())
    }

    fn grants(&self, farm_id: FarmId) -> Result<Vec<PermissionGrant>> {
        Ok(self.read().grants.values().filter(|g| g.farm_id == farm_id).cloned().collect())
    }

    fn grants_for_user(&self, user: &UserId) -> Result<Vec<PermissionGrant>> {
        Ok(self.read().grants.values().filter(|g| &g.user == user).cloned().collect())
    }

    fn create_grant(&self, grant: PermissionGrant) -> Result<PermissionGrant> {
        self.write().put_grant(&grant)?;
        Ok(grant)
    }

    fn update_grant(&self, farm_id: FarmId, user: &UserId, level: Level) -> Result<PermissionGrant> {
        let mut s = self.write();
        let g = s.grant_mut(farm_id, user)?;
        g.level = level;
        Ok(g.clone())
    }

    fn delete_grant(&self, farm_id: FarmId, user: &UserId) -> Result<PermissionGrant> {
        self.write()
            .grants
            .remove(&(farm_id, user.clone()))
            .ok_or_else(|| Error::NotFound(format!("grant for {} on farm {}", user, farm_id)))
    }
}
