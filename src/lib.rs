//! Farmgate - hierarchical permission resolution for farm asset trees
//!
//! Resources form a strict tree: farm -> row -> rack -> shelf, with fans and
//! sensors attached to a row or a rack. Permissions are granted per farm as
//! one of three levels (viewer, editor, manager) and checked by exact set
//! membership.
//!
//! All operations take their [`Store`] explicitly:
//!
//! ```no_run
//! use farmgate::*;
//!
//! let store = LmdbStore::open_path("./data/farmgate.mdb")?;
//! let alice = UserId::new("alice")?;
//! let farm = create_farm(&store, &alice, "greenhouse")?;
//! let row = create_node(&store, &alice, &NewNode::new(ResourceKind::Row, "north", ResourceRef::farm(farm.id)))?;
//! assert_eq!(resolve_farm_id(&store, row.id(), ResourceKind::Row)?, farm.id);
//! assert!(can_perform(&store, &alice, farm.id, LevelSet::MANAGERS)?);
//! # Ok::<(), farmgate::Error>(())
//! ```

pub mod authz;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod grants;
pub mod level;
pub mod model;
pub mod nodes;
pub mod resolver;
pub mod store;

pub use authz::{can_perform, can_perform_on, effective_level, require};
pub use bootstrap::{create_farm, delete_farm, get_farm, list_farms};
pub use config::Config;
pub use error::{Error, Result, Rule};
pub use grants::{create_grant, delete_grant, list_grants, memberships, update_grant};
pub use level::{Level, LevelSet};
pub use model::{
    Fan, Farm, FarmId, Mount, NewNode, Node, PermissionGrant, Rack, ResourceId, ResourceKind, ResourceRef, Row,
    SensorDevice, Shelf, UserId,
};
pub use nodes::{create_node, delete_node, get_node};
pub use resolver::{resolve, resolve_farm_id};
pub use store::{LmdbStore, MemoryStore, Store};
