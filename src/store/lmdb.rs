//! LMDB-backed store
//!
//! Layout:
//! - `farms`: farm id -> Farm
//! - `nodes`: kind/id -> Node
//! - `edges`: parent kind/id + child kind/id -> child id (child lookup for deletes)
//! - `grants`: farm id + user -> PermissionGrant
//! - `grants_rev`: user + NUL + farm id -> farm id
//! - `meta`: counters

use byteorder::BigEndian;
use heed::types::{Bytes, SerdeJson, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use tracing::debug;

use super::Store;
use crate::config::Config;
use crate::error::{err, Error, Result};
use crate::level::Level;
use crate::model::{Farm, FarmId, NewNode, Node, PermissionGrant, ResourceId, ResourceKind, ResourceRef, UserId};

type Id = U64<BigEndian>;

/// Grant key: farm id then user bytes
fn grant_key(farm_id: FarmId, user: &UserId) -> Vec<u8> {
    let mut k = Vec::with_capacity(8 + user.as_str().len());
    k.extend_from_slice(&farm_id.to_be_bytes());
    k.extend_from_slice(user.as_str().as_bytes());
    k
}

/// Reverse grant key: user bytes, NUL, farm id. User ids never contain NUL.
fn user_key(user: &UserId, farm_id: Option<FarmId>) -> Vec<u8> {
    let mut k = Vec::with_capacity(user.as_str().len() + 9);
    k.extend_from_slice(user.as_str().as_bytes());
    k.push(0);
    if let Some(f) = farm_id {
        k.extend_from_slice(&f.to_be_bytes());
    }
    k
}

#[inline]
fn edge_key(parent: ResourceRef, child: ResourceRef) -> [u8; 18] {
    let mut k = [0u8; 18];
    k[..9].copy_from_slice(&parent.key());
    k[9..].copy_from_slice(&child.key());
    k
}

/// Bidirectional grant index: fwd[farm,user] and rev[user,farm] stay in sync
struct GrantIndex {
    fwd: Database<Bytes, SerdeJson<PermissionGrant>>,
    rev: Database<Bytes, Id>,
}

impl GrantIndex {
    fn get(&self, tx: &RoTxn, farm_id: FarmId, user: &UserId) -> Result<Option<PermissionGrant>> {
        self.fwd.get(tx, &grant_key(farm_id, user)).map_err(err)
    }

    fn put(&self, tx: &mut RwTxn, g: &PermissionGrant) -> Result<()> {
        self.fwd.put(tx, &grant_key(g.farm_id, &g.user), g).map_err(err)?;
        self.rev.put(tx, &user_key(&g.user, Some(g.farm_id)), &g.farm_id).map_err(err)
    }

    fn del(&self, tx: &mut RwTxn, farm_id: FarmId, user: &UserId) -> Result<bool> {
        let r = self.fwd.delete(tx, &grant_key(farm_id, user)).map_err(err)?;
        self.rev.delete(tx, &user_key(user, Some(farm_id))).map_err(err)?;
        Ok(r)
    }

    fn list_farm(&self, tx: &RoTxn, farm_id: FarmId) -> Result<Vec<PermissionGrant>> {
        let mut r = Vec::new();
        for item in self.fwd.prefix_iter(tx, &farm_id.to_be_bytes()).map_err(err)? {
            let (_, g) = item.map_err(err)?;
            r.push(g);
        }
        Ok(r)
    }

    fn list_user(&self, tx: &RoTxn, user: &UserId) -> Result<Vec<PermissionGrant>> {
        let mut farms = Vec::new();
        for item in self.rev.prefix_iter(tx, &user_key(user, None)).map_err(err)? {
            let (_, f) = item.map_err(err)?;
            farms.push(f);
        }
        let mut r = Vec::with_capacity(farms.len());
        for f in farms {
            if let Some(g) = self.get(tx, f, user)? {
                r.push(g);
            }
        }
        Ok(r)
    }
}

/// All database handles
struct Dbs {
    farms: Database<Id, SerdeJson<Farm>>,
    nodes: Database<Bytes, SerdeJson<Node>>,
    edges: Database<Bytes, Id>,
    grants: GrantIndex,
    meta: Database<Str, Id>,
}

impl Dbs {
    fn exists(&self, tx: &RoTxn, r: ResourceRef) -> Result<bool> {
        Ok(match r.kind {
            ResourceKind::Farm => self.farms.get(tx, &r.id).map_err(err)?.is_some(),
            _ => self.nodes.get(tx, &r.key()).map_err(err)?.is_some(),
        })
    }

    fn has_children(&self, tx: &RoTxn, r: ResourceRef) -> Result<bool> {
        Ok(self.edges.prefix_iter(tx, &r.key()).map_err(err)?.next().is_some())
    }

    fn next_id(&self, tx: &mut RwTxn) -> Result<u64> {
        let id = self.meta.get(tx, "next_id").map_err(err)?.unwrap_or(1);
        self.meta.put(tx, "next_id", &(id + 1)).map_err(err)?;
        Ok(id)
    }

    fn put_farm(&self, tx: &mut RwTxn, name: &str, owner: &UserId) -> Result<Farm> {
        if name.trim().is_empty() {
            return Err(Error::Invalid("farm name is empty".into()));
        }
        let farm = Farm { id: self.next_id(tx)?, name: name.to_string(), owner: owner.clone() };
        self.farms.put(tx, &farm.id, &farm).map_err(err)?;
        Ok(farm)
    }

    fn put_grant(&self, tx: &mut RwTxn, g: &PermissionGrant) -> Result<()> {
        if self.farms.get(tx, &g.farm_id).map_err(err)?.is_none() {
            return Err(Error::NotFound(format!("farm {}", g.farm_id)));
        }
        if self.grants.get(tx, g.farm_id, &g.user)?.is_some() {
            return Err(Error::Conflict(format!("grant for {} on farm {}", g.user, g.farm_id)));
        }
        self.grants.put(tx, g)
    }
}

/// Store backed by an LMDB environment
pub struct LmdbStore {
    env: Env,
    dbs: Dbs,
}

impl LmdbStore {
    /// Open (or create) the environment described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.db_path).map_err(err)?;
        // SAFETY: LMDB requires no other process opens this path with different flags.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(config.map_size)
                .max_readers(config.max_readers)
                .max_dbs(6)
                .open(&config.db_path)
                .map_err(err)?
        };
        let mut tx = env.write_txn().map_err(err)?;
        let dbs = Dbs {
            farms: env.create_database(&mut tx, Some("farms")).map_err(err)?,
            nodes: env.create_database(&mut tx, Some("nodes")).map_err(err)?,
            edges: env.create_database(&mut tx, Some("edges")).map_err(err)?,
            grants: GrantIndex {
                fwd: env.create_database(&mut tx, Some("grants")).map_err(err)?,
                rev: env.create_database(&mut tx, Some("grants_rev")).map_err(err)?,
            },
            meta: env.create_database(&mut tx, Some("meta")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        debug!(path = %config.db_path.display(), "lmdb store opened");
        Ok(LmdbStore { env, dbs })
    }

    /// Open with default settings at `path`
    pub fn open_path(path: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::open(&Config::at(path))
    }

    /// Execute a read-only operation
    #[inline]
    fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let tx = self.env.read_txn().map_err(err)?;
        f(&self.dbs, &tx)
    }

    /// Execute a write operation in one transaction; aborts on error
    #[inline]
    fn write<T, F: FnOnce(&Dbs, &mut RwTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = self.env.write_txn().map_err(err)?;
        let r = f(&self.dbs, &mut tx)?;
        tx.commit().map_err(err)?;
        Ok(r)
    }
}

impl Store for LmdbStore {
    fn farm(&self, id: FarmId) -> Result<Option<Farm>> {
        self.read(|d, tx| d.farms.get(tx, &id).map_err(err))
    }

    fn farms_owned_by(&self, owner: &UserId) -> Result<Vec<Farm>> {
        self.read(|d, tx| {
            let mut r = Vec::new();
            for item in d.farms.iter(tx).map_err(err)? {
                let (_, farm) = item.map_err(err)?;
                if farm.owner == *owner {
                    r.push(farm);
                }
            }
            Ok(r)
        })
    }

    fn insert_farm(&self, name: &str, owner: &UserId) -> Result<Farm> {
        self.write(|d, tx| d.put_farm(tx, name, owner))
    }

    fn insert_farm_with_manager(&self, name: &str, owner: &UserId) -> Result<(Farm, Option<PermissionGrant>)> {
        self.write(|d, tx| {
            let farm = d.put_farm(tx, name, owner)?;
            let g = PermissionGrant::new(owner.clone(), farm.id, Level::Manager);
            d.put_grant(tx, &g)?;
            Ok((farm, Some(g)))
        })
    }

    fn remove_farm(&self, id: FarmId) -> Result<Farm> {
        self.write(|d, tx| {
            let farm = d.farms.get(tx, &id).map_err(err)?.ok_or_else(|| Error::NotFound(format!("farm {}", id)))?;
            if d.has_children(tx, ResourceRef::farm(id))? {
                return Err(Error::Conflict(format!("rows under farm {}", id)));
            }
            for g in d.grants.list_farm(tx, id)? {
                d.grants.del(tx, id, &g.user)?;
            }
            d.farms.delete(tx, &id).map_err(err)?;
            Ok(farm)
        })
    }

    fn node(&self, kind: ResourceKind, id: ResourceId) -> Result<Option<Node>> {
        self.read(|d, tx| d.nodes.get(tx, &ResourceRef::new(kind, id).key()).map_err(err))
    }

    fn insert_node(&self, new: &NewNode) -> Result<Node> {
        new.validate()?;
        self.write(|d, tx| {
            if !d.exists(tx, new.parent)? {
                return Err(Error::NotFound(new.parent.to_string()));
            }
            let node = Node::build(d.next_id(tx)?, new)?;
            let r = node.resource();
            d.nodes.put(tx, &r.key(), &node).map_err(err)?;
            d.edges.put(tx, &edge_key(new.parent, r), &r.id).map_err(err)?;
            Ok(node)
        })
    }

    fn remove_node(&self, kind: ResourceKind, id: ResourceId) -> Result<Node> {
        let r = ResourceRef::new(kind, id);
        self.write(|d, tx| {
            let node = d.nodes.get(tx, &r.key()).map_err(err)?.ok_or_else(|| Error::NotFound(r.to_string()))?;
            if d.has_children(tx, r)? {
                return Err(Error::Conflict(format!("children under {}", r)));
            }
            d.nodes.delete(tx, &r.key()).map_err(err)?;
            d.edges.delete(tx, &edge_key(node.parent(), r)).map_err(err)?;
            Ok(node)
        })
    }

    fn grant(&self, farm_id: FarmId, user: &UserId) -> Result<Option<PermissionGrant>> {
        self.read(|d, tx| d.grants.get(tx, farm_id, user))
    }

    fn grants(&self, farm_id: FarmId) -> Result<Vec<PermissionGrant>> {
        self.read(|d, tx| d.grants.list_farm(tx, farm_id))
    }

    fn grants_for_user(&self, user: &UserId) -> Result<Vec<PermissionGrant>> {
        self.read(|d, tx| d.grants.list_user(tx, user))
    }

    fn create_grant(&self, grant: PermissionGrant) -> Result<PermissionGrant> {
        self.write(|d, tx| {
            d.put_grant(tx, &grant)?;
            Ok(grant)
        })
    }

    fn update_grant(&self, farm_id: FarmId, user: &UserId, level: Level) -> Result<PermissionGrant> {
        self.write(|d, tx| {
            let mut g = d
                .grants
                .get(tx, farm_id, user)?
                .ok_or_else(|| Error::NotFound(format!("grant for {} on farm {}", user, farm_id)))?;
            g.level = level;
            d.grants.put(tx, &g)?;
            Ok(g)
        })
    }

    fn delete_grant(&self, farm_id: FarmId, user: &UserId) -> Result<PermissionGrant> {
        self.write(|d, tx| {
            let g = d
                .grants
                .get(tx, farm_id, user)?
                .ok_or_else(|| Error::NotFound(format!("grant for {} on farm {}", user, farm_id)))?;
            d.grants.del(tx, farm_id, user)?;
            Ok(g)
        })
    }
}
