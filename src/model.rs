//! Typed records for farms, hierarchy nodes and grants

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::level::Level;

pub type FarmId = u64;
pub type ResourceId = u64;

/// Opaque identity of a verified caller
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Longest accepted id in bytes. Ids are embedded in LMDB keys (max 511).
    pub const MAX_LEN: usize = 255;

    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(Error::Invalid("user id is empty".into()));
        }
        if id.contains('\0') {
            return Err(Error::Invalid("user id contains NUL".into()));
        }
        if id.len() > Self::MAX_LEN {
            return Err(Error::Invalid(format!("user id longer than {} bytes", Self::MAX_LEN)));
        }
        Ok(UserId(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for UserId {
    type Error = Error;
    fn try_from(s: String) -> Result<Self> {
        UserId::new(s)
    }
}

impl From<UserId> for String {
    fn from(u: UserId) -> Self {
        u.0
    }
}

impl FromStr for UserId {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        UserId::new(s)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of resource in the farm hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Farm,
    Row,
    Rack,
    Shelf,
    Fan,
    SensorDevice,
}

const KINDS: &[(&str, ResourceKind)] = &[
    ("farm", ResourceKind::Farm),
    ("row", ResourceKind::Row),
    ("rack", ResourceKind::Rack),
    ("shelf", ResourceKind::Shelf),
    ("fan", ResourceKind::Fan),
    ("sensor_device", ResourceKind::SensorDevice),
    ("sensor", ResourceKind::SensorDevice),
];

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Farm => "farm",
            ResourceKind::Row => "row",
            ResourceKind::Rack => "rack",
            ResourceKind::Shelf => "shelf",
            ResourceKind::Fan => "fan",
            ResourceKind::SensorDevice => "sensor_device",
        }
    }

    /// Storage tag, stable across releases
    pub(crate) fn tag(self) -> u8 {
        match self {
            ResourceKind::Farm => 0,
            ResourceKind::Row => 1,
            ResourceKind::Rack => 2,
            ResourceKind::Shelf => 3,
            ResourceKind::Fan => 4,
            ResourceKind::SensorDevice => 5,
        }
    }

    /// Whether a node of this kind may hang off a parent of `parent` kind
    pub fn accepts_parent(self, parent: ResourceKind) -> bool {
        use ResourceKind::*;
        matches!(
            (self, parent),
            (Row, Farm) | (Rack, Row) | (Shelf, Rack) | (Fan, Row) | (Fan, Rack)
                | (SensorDevice, Row) | (SensorDevice, Rack)
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        KINDS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(s))
            .map(|(_, k)| *k)
            .ok_or_else(|| Error::Invalid(format!("unknown resource kind '{}'", s)))
    }
}

/// Kind and id of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: ResourceId,
}

impl ResourceRef {
    pub const fn new(kind: ResourceKind, id: ResourceId) -> Self {
        ResourceRef { kind, id }
    }

    pub const fn farm(id: FarmId) -> Self {
        ResourceRef { kind: ResourceKind::Farm, id }
    }

    /// 9-byte storage key: kind tag then big-endian id
    pub(crate) fn key(&self) -> [u8; 9] {
        let mut k = [0u8; 9];
        k[0] = self.kind.tag();
        k[1..].copy_from_slice(&self.id.to_be_bytes());
        k
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Farm {
    pub id: FarmId,
    pub name: String,
    /// Creator of the farm. Never changes.
    pub owner: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub id: ResourceId,
    pub farm_id: FarmId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rack {
    pub id: ResourceId,
    pub row_id: ResourceId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelf {
    pub id: ResourceId,
    pub rack_id: ResourceId,
    pub name: String,
}

/// Where a fan or sensor is attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mount {
    Row(ResourceId),
    Rack(ResourceId),
}

impl Mount {
    pub fn parent(self) -> ResourceRef {
        match self {
            Mount::Row(id) => ResourceRef::new(ResourceKind::Row, id),
            Mount::Rack(id) => ResourceRef::new(ResourceKind::Rack, id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fan {
    pub id: ResourceId,
    pub mount: Mount,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorDevice {
    pub id: ResourceId,
    pub mount: Mount,
    pub name: String,
}

/// Any non-farm resource in the hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Row(Row),
    Rack(Rack),
    Shelf(Shelf),
    Fan(Fan),
    SensorDevice(SensorDevice),
}

impl Node {
    /// Build a typed record from a creation request
    pub fn build(id: ResourceId, new: &NewNode) -> Result<Node> {
        new.validate()?;
        let name = new.name.clone();
        let pid = new.parent.id;
        let mount = || match new.parent.kind {
            ResourceKind::Row => Mount::Row(pid),
            _ => Mount::Rack(pid),
        };
        Ok(match new.kind {
            ResourceKind::Row => Node::Row(Row { id, farm_id: pid, name }),
            ResourceKind::Rack => Node::Rack(Rack { id, row_id: pid, name }),
            ResourceKind::Shelf => Node::Shelf(Shelf { id, rack_id: pid, name }),
            ResourceKind::Fan => Node::Fan(Fan { id, mount: mount(), name }),
            ResourceKind::SensorDevice => Node::SensorDevice(SensorDevice { id, mount: mount(), name }),
            ResourceKind::Farm => return Err(Error::Invalid("farms are not hierarchy nodes".into())),
        })
    }

    pub fn id(&self) -> ResourceId {
        match self {
            Node::Row(r) => r.id,
            Node::Rack(r) => r.id,
            Node::Shelf(s) => s.id,
            Node::Fan(f) => f.id,
            Node::SensorDevice(s) => s.id,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            Node::Row(_) => ResourceKind::Row,
            Node::Rack(_) => ResourceKind::Rack,
            Node::Shelf(_) => ResourceKind::Shelf,
            Node::Fan(_) => ResourceKind::Fan,
            Node::SensorDevice(_) => ResourceKind::SensorDevice,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Row(r) => &r.name,
            Node::Rack(r) => &r.name,
            Node::Shelf(s) => &s.name,
            Node::Fan(f) => &f.name,
            Node::SensorDevice(s) => &s.name,
        }
    }

    pub fn resource(&self) -> ResourceRef {
        ResourceRef::new(self.kind(), self.id())
    }

    /// The single parent link of this node
    pub fn parent(&self) -> ResourceRef {
        match self {
            Node::Row(r) => ResourceRef::farm(r.farm_id),
            Node::Rack(r) => ResourceRef::new(ResourceKind::Row, r.row_id),
            Node::Shelf(s) => ResourceRef::new(ResourceKind::Rack, s.rack_id),
            Node::Fan(f) => f.mount.parent(),
            Node::SensorDevice(s) => s.mount.parent(),
        }
    }
}

/// Request to create a hierarchy node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNode {
    pub kind: ResourceKind,
    pub name: String,
    pub parent: ResourceRef,
}

impl NewNode {
    pub fn new(kind: ResourceKind, name: impl Into<String>, parent: ResourceRef) -> Self {
        NewNode { kind, name: name.into(), parent }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Invalid(format!("{} name is empty", self.kind)));
        }
        if !self.kind.accepts_parent(self.parent.kind) {
            return Err(Error::Invalid(format!(
                "a {} cannot be placed under a {}",
                self.kind, self.parent.kind
            )));
        }
        Ok(())
    }
}

/// Stored (user, farm, level) record. At most one per (user, farm).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub user: UserId,
    pub farm_id: FarmId,
    pub level: Level,
}

impl PermissionGrant {
    pub fn new(user: UserId, farm_id: FarmId, level: Level) -> Self {
        PermissionGrant { user, farm_id, level }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_validation() {
        assert!(UserId::new("alice").is_ok());
        assert!(matches!(UserId::new(""), Err(Error::Invalid(_))));
        assert!(matches!(UserId::new("a\0b"), Err(Error::Invalid(_))));
    }

    #[test]
    fn user_id_length_cap() {
        assert!(UserId::new("x".repeat(UserId::MAX_LEN)).is_ok());
        assert!(matches!(UserId::new("x".repeat(UserId::MAX_LEN + 1)), Err(Error::Invalid(_))));
        assert!(matches!(UserId::new("x".repeat(600)), Err(Error::Invalid(_))));
        // Multi-byte characters count by bytes
        assert!(matches!(UserId::new("é".repeat(128)), Err(Error::Invalid(_))));
        assert!(matches!(UserId::try_from("y".repeat(256)), Err(Error::Invalid(_))));
    }

    #[test]
    fn parent_kinds() {
        use ResourceKind::*;
        assert!(Row.accepts_parent(Farm));
        assert!(!Row.accepts_parent(Rack));
        assert!(Shelf.accepts_parent(Rack));
        assert!(!Shelf.accepts_parent(Row));
        assert!(Fan.accepts_parent(Row) && Fan.accepts_parent(Rack));
        assert!(!SensorDevice.accepts_parent(Shelf));
        assert!(!Farm.accepts_parent(Farm));
    }

    #[test]
    fn build_typed_nodes() {
        let fan = Node::build(7, &NewNode::new(ResourceKind::Fan, "intake", ResourceRef::new(ResourceKind::Rack, 3))).unwrap();
        assert_eq!(fan, Node::Fan(Fan { id: 7, mount: Mount::Rack(3), name: "intake".into() }));
        assert_eq!(fan.parent(), ResourceRef::new(ResourceKind::Rack, 3));

        let row = Node::build(2, &NewNode::new(ResourceKind::Row, "north", ResourceRef::farm(1))).unwrap();
        assert_eq!(row.parent(), ResourceRef::farm(1));

        let bad = NewNode::new(ResourceKind::Shelf, "s", ResourceRef::farm(1));
        assert!(matches!(Node::build(9, &bad), Err(Error::Invalid(_))));
        let blank = NewNode::new(ResourceKind::Row, "  ", ResourceRef::farm(1));
        assert!(matches!(Node::build(9, &blank), Err(Error::Invalid(_))));
    }

    #[test]
    fn kind_names() {
        assert_eq!("sensor".parse::<ResourceKind>().unwrap(), ResourceKind::SensorDevice);
        assert_eq!("Rack".parse::<ResourceKind>().unwrap(), ResourceKind::Rack);
        assert!("barn".parse::<ResourceKind>().is_err());
        assert_eq!(ResourceRef::new(ResourceKind::Shelf, 4).to_string(), "shelf 4");
    }
}
