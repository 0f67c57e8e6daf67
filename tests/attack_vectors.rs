//! Attack vector tests
//!
//! These tests verify that grant management and node operations deny
//! escalation and cross-farm access.

mod common;

use common::{build_tree, lmdb, user};
use farmgate::*;

/// ATTACK: Editor upgrades their own grant
#[test]
fn attack_editor_self_promotion() {
    let (_dir, store) = lmdb();
    let alice = user("alice");
    let ed = user("ed");
    let farm = create_farm(&store, &alice, "f").unwrap();
    create_grant(&store, &alice, &ed, farm.id, Level::Editor).unwrap();

    // Expected: DENIED - editors cannot manage grants at all
    assert!(update_grant(&store, &ed, &ed, farm.id, Level::Manager).unwrap_err().is_forbidden());
    assert!(create_grant(&store, &ed, &ed, farm.id, Level::Manager).unwrap_err().is_forbidden());
    assert_eq!(effective_level(&store, &ed, farm.id).unwrap(), Some(Level::Editor));
}

/// ATTACK: Manager of one farm reaches into another
#[test]
fn attack_cross_farm_grant() {
    let (_dir, store) = lmdb();
    let alice = user("alice");
    let mallory = user("mallory");
    let victim = create_farm(&store, &alice, "victim").unwrap();
    let _own = create_farm(&store, &mallory, "own").unwrap();

    let r = create_grant(&store, &mallory, &mallory, victim.id, Level::Viewer);
    assert_eq!(r.unwrap_err(), Error::Forbidden(Rule::InsufficientLevel));
    assert!(list_grants(&store, &mallory, victim.id).unwrap_err().is_forbidden());
    assert!(store.grant(victim.id, &mallory).unwrap().is_none());
}

/// ATTACK: Manager of one farm attaches nodes to another farm's rack
#[test]
fn attack_cross_farm_node() {
    let (_dir, store) = lmdb();
    let alice = user("alice");
    let mallory = user("mallory");
    let t = build_tree(&store, &alice);
    create_farm(&store, &mallory, "own").unwrap();

    let r = create_node(&store, &mallory, &NewNode::new(ResourceKind::Fan, "rogue", t.rack.resource()));
    assert!(r.unwrap_err().is_forbidden());
    assert!(delete_node(&store, &mallory, t.shelf.resource()).unwrap_err().is_forbidden());
    assert!(get_node(&store, &mallory, t.row_fan.resource()).unwrap_err().is_forbidden());
}

/// ATTACK: Manager removes the owner to take over the farm
#[test]
fn attack_remove_owner() {
    let (_dir, store) = lmdb();
    let alice = user("alice");
    let bob = user("bob");
    let farm = create_farm(&store, &alice, "f").unwrap();
    store.create_grant(PermissionGrant::new(bob.clone(), farm.id, Level::Manager)).unwrap();

    assert_eq!(delete_grant(&store, &bob, &alice, farm.id).unwrap_err(), Error::Forbidden(Rule::ManagerProtected));
    assert_eq!(delete_farm(&store, &bob, farm.id).unwrap_err(), Error::Forbidden(Rule::NotOwner));
    assert!(can_perform(&store, &alice, farm.id, LevelSet::MANAGERS).unwrap());
}

/// ATTACK: Overwrite a grant through create instead of update
#[test]
fn attack_overwrite_via_create() {
    let (_dir, store) = lmdb();
    let alice = user("alice");
    let farm = create_farm(&store, &alice, "f").unwrap();

    // Re-creating the owner's own grant at a lower level must not replace it
    let r = create_grant(&store, &alice, &alice, farm.id, Level::Viewer);
    assert!(r.unwrap_err().is_conflict());
    assert_eq!(store.grant(farm.id, &alice).unwrap().unwrap().level, Level::Manager);
}

/// ATTACK: Forge identities that collide in the reverse index
#[test]
fn attack_identity_with_separator() {
    assert!(matches!(UserId::new("alice\0\0\0\0\0\0\0\x01"), Err(Error::Invalid(_))));
    assert!(matches!(UserId::new(""), Err(Error::Invalid(_))));
}

/// ATTACK: Ownership fallback does not extend to strangers on an ungranted farm
#[test]
fn attack_fallback_only_for_owner() {
    let (_dir, store) = lmdb();
    let alice = user("alice");
    let farm = store.insert_farm("bare", &alice).unwrap();

    assert!(!can_perform(&store, &user("bob"), farm.id, LevelSet::ANY_MEMBER).unwrap());
    assert!(create_grant(&store, &user("bob"), &user("bob"), farm.id, Level::Manager).unwrap_err().is_forbidden());
}
