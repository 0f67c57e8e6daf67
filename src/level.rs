//! Permission levels and exact-membership level sets

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Permission level held by a user on a farm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Viewer,
    Editor,
    Manager,
}

// Level bits
const VIEWER: u8 = 1;
const EDITOR: u8 = 1 << 1;
const MANAGER: u8 = 1 << 2;

const LEVELS: &[(&str, Level)] = &[
    ("viewer", Level::Viewer),
    ("editor", Level::Editor),
    ("manager", Level::Manager),
];

impl Level {
    #[inline]
    const fn bit(self) -> u8 {
        match self {
            Level::Viewer => VIEWER,
            Level::Editor => EDITOR,
            Level::Manager => MANAGER,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Viewer => "viewer",
            Level::Editor => "editor",
            Level::Manager => "manager",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        LEVELS
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(s))
            .map(|(_, l)| *l)
            .ok_or_else(|| Error::Invalid(format!("unknown level '{}'", s)))
    }
}

/// Set of levels an operation accepts.
///
/// Membership is exact: a set holding only `Manager` rejects an `Editor`.
/// Callers list every level that should pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LevelSet(u8);

impl LevelSet {
    pub const EMPTY: LevelSet = LevelSet(0);
    pub const ANY_MEMBER: LevelSet = LevelSet(VIEWER | EDITOR | MANAGER);
    pub const EDITORS: LevelSet = LevelSet(EDITOR | MANAGER);
    pub const MANAGERS: LevelSet = LevelSet(MANAGER);

    pub const fn of(levels: &[Level]) -> LevelSet {
        let mut mask = 0;
        let mut i = 0;
        while i < levels.len() {
            mask |= levels[i].bit();
            i += 1;
        }
        LevelSet(mask)
    }

    #[inline]
    pub const fn contains(self, level: Level) -> bool {
        self.0 & level.bit() != 0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, level: Level) {
        self.0 |= level.bit();
    }

    pub fn iter(self) -> impl Iterator<Item = Level> {
        LEVELS.iter().map(|(_, l)| *l).filter(move |l| self.contains(*l))
    }

    /// Level names in this set, lowest first
    pub fn names(self) -> Vec<&'static str> {
        self.iter().map(Level::as_str).collect()
    }

    /// Build a set from level names
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<LevelSet> {
        names.iter().try_fold(LevelSet::EMPTY, |mut set, n| {
            set.insert(n.as_ref().parse()?);
            Ok(set)
        })
    }
}

impl From<Level> for LevelSet {
    fn from(level: Level) -> Self {
        LevelSet(level.bit())
    }
}

impl FromIterator<Level> for LevelSet {
    fn from_iter<I: IntoIterator<Item = Level>>(iter: I) -> Self {
        let mut set = LevelSet::EMPTY;
        for l in iter {
            set.insert(l);
        }
        set
    }
}

impl fmt::Display for LevelSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.names().join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn membership_is_exact() {
        assert!(LevelSet::MANAGERS.contains(Level::Manager));
        assert!(!LevelSet::MANAGERS.contains(Level::Editor));
        assert!(!LevelSet::MANAGERS.contains(Level::Viewer));

        // A set without Manager rejects Manager
        let viewers_only = LevelSet::of(&[Level::Viewer]);
        assert!(viewers_only.contains(Level::Viewer));
        assert!(!viewers_only.contains(Level::Manager));
    }

    #[test]
    fn named_sets() {
        assert_eq!(LevelSet::ANY_MEMBER.names(), vec!["viewer", "editor", "manager"]);
        assert_eq!(LevelSet::EDITORS.names(), vec!["editor", "manager"]);
        assert!(LevelSet::EMPTY.is_empty());
        assert_eq!(LevelSet::of(&[Level::Editor, Level::Manager]), LevelSet::EDITORS);
    }

    #[test]
    fn parse_names() {
        let set = LevelSet::from_names(&["viewer", "Manager"]).unwrap();
        assert!(set.contains(Level::Viewer));
        assert!(!set.contains(Level::Editor));
        assert!(set.contains(Level::Manager));
        assert_eq!(set.to_string(), "{viewer,manager}");

        assert!(matches!(LevelSet::from_names(&["owner"]), Err(Error::Invalid(_))));
        assert_eq!("editor".parse::<Level>().unwrap(), Level::Editor);
    }

    #[test]
    fn collect_from_levels() {
        let set: LevelSet = [Level::Manager, Level::Viewer].into_iter().collect();
        assert_eq!(set.iter().collect::<Vec<_>>(), vec![Level::Viewer, Level::Manager]);
        assert_eq!(LevelSet::from(Level::Editor), LevelSet::of(&[Level::Editor]));
    }
}
