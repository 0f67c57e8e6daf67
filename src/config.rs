//! Runtime configuration

use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_DB_PATH: &str = "./data/farmgate.mdb";
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;
pub const DEFAULT_MAX_READERS: u32 = 126;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// LMDB environment directory
    pub db_path: PathBuf,
    /// LMDB map size in bytes
    pub map_size: usize,
    pub max_readers: u32,
    /// Listen address for the HTTP server
    pub bind_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            map_size: DEFAULT_MAP_SIZE,
            max_readers: DEFAULT_MAX_READERS,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

impl Config {
    /// Config with defaults and the given database path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Config { db_path: path.into(), ..Config::default() }
    }

    /// Read `FARMGATE_DB`, `FARMGATE_MAP_SIZE`, `FARMGATE_MAX_READERS` and `FARMGATE_ADDR`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(get: F) -> Result<Self> {
        let mut c = Config::default();
        if let Some(p) = get("FARMGATE_DB") {
            c.db_path = PathBuf::from(p);
        }
        if let Some(v) = get("FARMGATE_MAP_SIZE") {
            c.map_size = parse("FARMGATE_MAP_SIZE", &v)?;
        }
        if let Some(v) = get("FARMGATE_MAX_READERS") {
            c.max_readers = parse("FARMGATE_MAX_READERS", &v)?;
        }
        if let Some(a) = get("FARMGATE_ADDR") {
            c.bind_addr = a;
        }
        Ok(c)
    }
}

fn parse<T: std::str::FromStr>(name: &str, v: &str) -> Result<T> {
    v.trim()
        .parse()
        .map_err(|_| Error::Invalid(format!("{}='{}' is not a number", name, v)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])).unwrap(), Config::default());
    }

    #[test]
    fn reads_overrides() {
        let c = Config::from_lookup(lookup(&[
            ("FARMGATE_DB", "/tmp/fg"),
            ("FARMGATE_MAP_SIZE", "4096"),
            ("FARMGATE_ADDR", "127.0.0.1:8080"),
        ]))
        .unwrap();
        assert_eq!(c.db_path, PathBuf::from("/tmp/fg"));
        assert_eq!(c.map_size, 4096);
        assert_eq!(c.max_readers, DEFAULT_MAX_READERS);
        assert_eq!(c.bind_addr, "127.0.0.1:8080");
    }

    #[test]
    fn rejects_bad_numbers() {
        let r = Config::from_lookup(lookup(&[("FARMGATE_MAX_READERS", "many")]));
        assert!(matches!(r, Err(Error::Invalid(_))));
    }
}
