//!
//! campsite storage module
//! -----------------------
//! File-backed store for user, camp and speaker records under a configured
//! data root. Users live in `users.json`, camps and speakers in `camps.json`;
//! both are plain JSON documents rewritten on every mutation. The store is
//! the narrow interface the auth core talks to: lookup-by-username for
//! credentials, and the camp/speaker records the CRUD gateway mutates.
//!
//! The public API centers around the `Store` type, which is wrapped in a
//! thread-safe `SharedStore` (`Arc<RwLock<Store>>`) for handler use.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::identity::Principal;

/// A stored user row: identity facts plus the opaque password hash.
/// The hash never leaves the store except into the password verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub username: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    #[serde(default)]
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
}

impl UserRecord {
    /// Project the identity facts into a `Principal`, leaving the hash behind.
    pub fn principal(&self) -> Principal {
        Principal {
            username: self.username.clone(),
            given_name: self.given_name.clone(),
            family_name: self.family_name.clone(),
            email: self.email.clone(),
            claims: self.claims.clone(),
        }
    }
}

/// A code camp record, keyed by its moniker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Camp {
    pub moniker: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location_address1: Option<String>,
    #[serde(default)]
    pub location_city_town: Option<String>,
    #[serde(default)]
    pub location_state_province: Option<String>,
    #[serde(default)]
    pub location_postal_code: Option<String>,
    #[serde(default)]
    pub location_country: Option<String>,
}

/// A speaker record. `owner` is the username of the identity that created it
/// and is what the ownership policy compares against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Speaker {
    pub id: i64,
    pub camp_moniker: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub website_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub head_shot_url: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersDoc {
    users: Vec<UserRecord>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DataDoc {
    camps: Vec<Camp>,
    speakers: Vec<Speaker>,
    next_speaker_id: i64,
}

/// Core storage handle rooted at a data folder.
pub struct Store {
    root: PathBuf,
    users: HashMap<String, UserRecord>,
    camps: BTreeMap<String, Camp>,
    speakers: BTreeMap<i64, Speaker>,
    next_speaker_id: i64,
}

fn read_doc<T: Default + for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse {}", path.display()))
}

fn write_doc<T: Serialize>(path: &Path, doc: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(doc)?;
    std::fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

impl Store {
    /// Open (or initialize) a store rooted at the given folder.
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create data root {}", root.display()))?;
        let users_doc: UsersDoc = read_doc(&root.join("users.json"))?;
        let data_doc: DataDoc = read_doc(&root.join("camps.json"))?;

        let mut users = HashMap::new();
        for u in users_doc.users {
            users.insert(u.username.to_ascii_lowercase(), u);
        }
        let mut camps = BTreeMap::new();
        for c in data_doc.camps {
            camps.insert(c.moniker.clone(), c);
        }
        let mut speakers = BTreeMap::new();
        for s in data_doc.speakers {
            speakers.insert(s.id, s);
        }
        let next_speaker_id = data_doc.next_speaker_id.max(
            speakers.keys().max().copied().unwrap_or(0) + 1,
        );
        Ok(Self { root, users, camps, speakers, next_speaker_id })
    }

    pub fn root_path(&self) -> &PathBuf { &self.root }

    fn persist_users(&self) -> Result<()> {
        let doc = UsersDoc { users: self.users.values().cloned().collect() };
        write_doc(&self.root.join("users.json"), &doc)
    }

    fn persist_data(&self) -> Result<()> {
        let doc = DataDoc {
            camps: self.camps.values().cloned().collect(),
            speakers: self.speakers.values().cloned().collect(),
            next_speaker_id: self.next_speaker_id,
        };
        write_doc(&self.root.join("camps.json"), &doc)
    }

    // --- users ---

    /// Lookup by username, case-insensitive.
    pub fn find_user(&self, username: &str) -> Option<&UserRecord> {
        self.users.get(&username.to_ascii_lowercase())
    }

    pub fn user_count(&self) -> usize { self.users.len() }

    pub fn upsert_user(&mut self, record: UserRecord) -> Result<()> {
        self.users.insert(record.username.to_ascii_lowercase(), record);
        self.persist_users()
    }

    // --- camps ---

    pub fn list_camps(&self) -> Vec<Camp> {
        self.camps.values().cloned().collect()
    }

    pub fn get_camp(&self, moniker: &str) -> Option<&Camp> {
        self.camps.get(moniker)
    }

    pub fn insert_camp(&mut self, camp: Camp) -> Result<()> {
        if self.camps.contains_key(&camp.moniker) {
            return Err(anyhow!("camp {} already exists", camp.moniker));
        }
        self.camps.insert(camp.moniker.clone(), camp);
        self.persist_data()
    }

    pub fn update_camp(&mut self, camp: Camp) -> Result<()> {
        if !self.camps.contains_key(&camp.moniker) {
            return Err(anyhow!("camp {} not found", camp.moniker));
        }
        self.camps.insert(camp.moniker.clone(), camp);
        self.persist_data()
    }

    /// Remove a camp and every speaker attached to it.
    pub fn delete_camp(&mut self, moniker: &str) -> Result<()> {
        if self.camps.remove(moniker).is_none() {
            return Err(anyhow!("camp {} not found", moniker));
        }
        self.speakers.retain(|_, s| s.camp_moniker != moniker);
        self.persist_data()
    }

    // --- speakers ---

    pub fn speakers_for(&self, moniker: &str) -> Vec<Speaker> {
        self.speakers
            .values()
            .filter(|s| s.camp_moniker == moniker)
            .cloned()
            .collect()
    }

    pub fn get_speaker(&self, id: i64) -> Option<&Speaker> {
        self.speakers.get(&id)
    }

    /// Insert a speaker, assigning the next id. Returns the stored record.
    pub fn add_speaker(&mut self, mut speaker: Speaker) -> Result<Speaker> {
        speaker.id = self.next_speaker_id;
        self.next_speaker_id += 1;
        let stored = speaker.clone();
        self.speakers.insert(speaker.id, speaker);
        self.persist_data()?;
        Ok(stored)
    }

    pub fn update_speaker(&mut self, speaker: Speaker) -> Result<()> {
        if !self.speakers.contains_key(&speaker.id) {
            return Err(anyhow!("speaker {} not found", speaker.id));
        }
        self.speakers.insert(speaker.id, speaker);
        self.persist_data()
    }

    pub fn delete_speaker(&mut self, id: i64) -> Result<()> {
        if self.speakers.remove(&id).is_none() {
            return Err(anyhow!("speaker {} not found", id));
        }
        self.persist_data()
    }
}

/// Thread-safe shared handle used by handlers and the auth core.
#[derive(Clone)]
pub struct SharedStore(pub Arc<RwLock<Store>>);

impl SharedStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        Ok(Self(Arc::new(RwLock::new(Store::new(root)?))))
    }
}

/// Seed a default super-user account on first run so the API is reachable
/// before any real accounts exist.
pub fn ensure_default_users(store: &SharedStore) -> Result<()> {
    let mut guard = store.0.write();
    if guard.user_count() > 0 {
        return Ok(());
    }
    let hash = crate::security::hash_password("campsite")?;
    let mut claims = BTreeMap::new();
    claims.insert("SuperUser".to_string(), "True".to_string());
    guard.upsert_user(UserRecord {
        username: "admin".into(),
        given_name: "Camp".into(),
        family_name: "Admin".into(),
        email: "admin@campsite.example".into(),
        password_hash: hash,
        claims,
    })?;
    info!("seeded default admin user");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camp(moniker: &str) -> Camp {
        Camp {
            moniker: moniker.into(),
            name: format!("{moniker} camp"),
            description: "a camp used by the storage tests, long enough to pass checks".into(),
            start_date: None,
            end_date: None,
            location_address1: None,
            location_city_town: None,
            location_state_province: None,
            location_postal_code: None,
            location_country: None,
        }
    }

    fn speaker(moniker: &str, owner: &str) -> Speaker {
        Speaker {
            id: 0,
            camp_moniker: moniker.into(),
            owner: owner.into(),
            name: "Test Speaker".into(),
            company_name: None,
            phone_number: None,
            website_url: None,
            bio: None,
            head_shot_url: None,
        }
    }

    #[test]
    fn user_lookup_is_case_insensitive() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = Store::new(tmp.path()).unwrap();
        store
            .upsert_user(UserRecord {
                username: "Alice".into(),
                given_name: String::new(),
                family_name: String::new(),
                email: String::new(),
                password_hash: "x".into(),
                claims: BTreeMap::new(),
            })
            .unwrap();
        assert!(store.find_user("alice").is_some());
        assert!(store.find_user("ALICE").is_some());
        assert!(store.find_user("bob").is_none());
    }

    #[test]
    fn duplicate_camp_moniker_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = Store::new(tmp.path()).unwrap();
        store.insert_camp(camp("atl2026")).unwrap();
        assert!(store.insert_camp(camp("atl2026")).is_err());
    }

    #[test]
    fn speaker_ids_are_assigned_and_monotonic() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = Store::new(tmp.path()).unwrap();
        store.insert_camp(camp("atl2026")).unwrap();
        let a = store.add_speaker(speaker("atl2026", "alice")).unwrap();
        let b = store.add_speaker(speaker("atl2026", "bob")).unwrap();
        assert!(b.id > a.id);
        assert_eq!(store.speakers_for("atl2026").len(), 2);
    }

    #[test]
    fn deleting_a_camp_drops_its_speakers() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = Store::new(tmp.path()).unwrap();
        store.insert_camp(camp("atl2026")).unwrap();
        store.insert_camp(camp("sea2026")).unwrap();
        store.add_speaker(speaker("atl2026", "alice")).unwrap();
        let kept = store.add_speaker(speaker("sea2026", "bob")).unwrap();
        store.delete_camp("atl2026").unwrap();
        assert!(store.get_camp("atl2026").is_none());
        assert!(store.speakers_for("atl2026").is_empty());
        assert!(store.get_speaker(kept.id).is_some());
    }

    #[test]
    fn records_survive_reopen() {
        let tmp = tempfile::tempdir().unwrap();
        let sid;
        {
            let mut store = Store::new(tmp.path()).unwrap();
            store.insert_camp(camp("atl2026")).unwrap();
            sid = store.add_speaker(speaker("atl2026", "alice")).unwrap().id;
        }
        let store = Store::new(tmp.path()).unwrap();
        assert!(store.get_camp("atl2026").is_some());
        let sp = store.get_speaker(sid).expect("persisted speaker");
        assert_eq!(sp.owner, "alice");
    }

    #[test]
    fn reopen_does_not_reuse_speaker_ids() {
        let tmp = tempfile::tempdir().unwrap();
        let first;
        {
            let mut store = Store::new(tmp.path()).unwrap();
            store.insert_camp(camp("atl2026")).unwrap();
            first = store.add_speaker(speaker("atl2026", "alice")).unwrap().id;
        }
        let mut store = Store::new(tmp.path()).unwrap();
        let second = store.add_speaker(speaker("atl2026", "bob")).unwrap().id;
        assert!(second > first);
    }

    #[test]
    fn ensure_default_users_seeds_once() {
        let tmp = tempfile::tempdir().unwrap();
        let store = SharedStore::new(tmp.path()).unwrap();
        ensure_default_users(&store).unwrap();
        let before = store.0.read().find_user("admin").unwrap().clone();
        assert!(before.claims.get("SuperUser").map(|v| v == "True").unwrap_or(false));

        // second call must not rewrite the seeded account
        ensure_default_users(&store).unwrap();
        let after = store.0.read().find_user("admin").unwrap().clone();
        assert_eq!(before.password_hash, after.password_hash);
    }
}
