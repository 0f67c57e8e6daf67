//! Shared test fixtures
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use farmgate::*;
use tempfile::TempDir;

/// Fresh LMDB store in a temp dir. Keep the TempDir alive for the test.
pub fn lmdb() -> (TempDir, LmdbStore) {
    let dir = TempDir::new().unwrap();
    let store = LmdbStore::open_path(dir.path()).unwrap();
    (dir, store)
}

pub fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// One of every resource kind under a single farm
pub struct Tree {
    pub farm: Farm,
    pub row: Node,
    pub rack: Node,
    pub shelf: Node,
    pub row_fan: Node,
    pub rack_sensor: Node,
}

pub fn build_tree<S: Store>(store: &S, owner: &UserId) -> Tree {
    let farm = create_farm(store, owner, "greenhouse").unwrap();
    let row = create_node(store, owner, &NewNode::new(ResourceKind::Row, "row-1", ResourceRef::farm(farm.id))).unwrap();
    let rack = create_node(store, owner, &NewNode::new(ResourceKind::Rack, "rack-1", row.resource())).unwrap();
    let shelf = create_node(store, owner, &NewNode::new(ResourceKind::Shelf, "shelf-1", rack.resource())).unwrap();
    let row_fan = create_node(store, owner, &NewNode::new(ResourceKind::Fan, "fan-1", row.resource())).unwrap();
    let rack_sensor =
        create_node(store, owner, &NewNode::new(ResourceKind::SensorDevice, "temp-1", rack.resource())).unwrap();
    Tree { farm, row, rack, shelf, row_fan, rack_sensor }
}

/// Memory store with injectable faults. Uses the default (two-step)
/// farm-with-manager insertion.
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    pub hidden: Mutex<Option<ResourceRef>>,
    pub fail_grant_writes: AtomicBool,
}

impl FaultyStore {
    pub fn hide(&self, r: ResourceRef) {
        *self.hidden.lock().unwrap() = Some(r);
    }

    pub fn fail_grant_writes(&self, on: bool) {
        self.fail_grant_writes.store(on, Ordering::SeqCst);
    }
}

impl Store for FaultyStore {
    fn farm(&self, id: FarmId) -> Result<Option<Farm>> {
        if *self.hidden.lock().unwrap() == Some(ResourceRef::farm(id)) {
            return Ok(None);
        }
        self.inner.farm(id)
    }
    fn farms_owned_by(&self, owner: &UserId) -> Result<Vec<Farm>> {
        self.inner.farms_owned_by(owner)
    }
    fn insert_farm(&self, name: &str, owner: &UserId) -> Result<Farm> {
        self.inner.insert_farm(name, owner)
    }
    fn remove_farm(&self, id: FarmId) -> Result<Farm> {
        self.inner.remove_farm(id)
    }
    fn node(&self, kind: ResourceKind, id: ResourceId) -> Result<Option<Node>> {
        if *self.hidden.lock().unwrap() == Some(ResourceRef::new(kind, id)) {
            return Ok(None);
        }
        self.inner.node(kind, id)
    }
    fn insert_node(&self, new: &NewNode) -> Result<Node> {
        self.inner.insert_node(new)
    }
    fn remove_node(&self, kind: ResourceKind, id: ResourceId) -> Result<Node> {
        self.inner.remove_node(kind, id)
    }
    fn grant(&self, farm_id: FarmId, user: &UserId) -> Result<Option<PermissionGrant>> {
        self.inner.grant(farm_id, user)
    }
    fn grants(&self, farm_id: FarmId) -> Result<Vec<PermissionGrant>> {
        self.inner.grants(farm_id)
    }
    fn grants_for_user(&self, user: &UserId) -> Result<Vec<PermissionGrant>> {
        self.inner.grants_for_user(user)
    }
    fn create_grant(&self, grant: PermissionGrant) -> Result<PermissionGrant> {
        if self.fail_grant_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("injected write failure".into()));
        }
        self.inner.create_grant(grant)
    }
    fn update_grant(&self, farm_id: FarmId, user: &UserId, level: Level) -> Result<PermissionGrant> {
        self.inner.update_grant(farm_id, user, level)
    }
    fn delete_grant(&self, farm_id: FarmId, user: &UserId) -> Result<PermissionGrant> {
        self.inner.delete_grant(farm_id, user)
    }
}
