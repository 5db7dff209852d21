//! In-memory session store.
//!
//! Sessions live only in process memory and are never persisted. Each
//! session sits behind its own mutex so turns on one conversation are
//! serialized while other conversations proceed. When the store is full
//! the oldest session is evicted.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::session::Session;

pub type SharedSession = Arc<Mutex<Session>>;

// ═══════════════════════════════════════════════════════════
// SessionStore
// ═══════════════════════════════════════════════════════════

pub struct SessionStore {
    sessions: HashMap<Uuid, SharedSession>,
    /// Insertion order, oldest first.
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl SessionStore {
    /// Create an empty store holding at most `capacity` sessions.
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert a session, evicting the oldest ones if needed.
    /// Returns the ids evicted.
    pub fn insert(&mut self, session: Session) -> Vec<Uuid> {
        let id = session.id;
        if self.sessions.contains_key(&id) {
            self.order.retain(|o| *o != id);
        }

        let mut evicted = Vec::new();
        while self.sessions.len() >= self.capacity && !self.sessions.contains_key(&id) {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.sessions.remove(&oldest).is_some() {
                evicted.push(oldest);
            }
        }

        self.sessions.insert(id, Arc::new(Mutex::new(session)));
        self.order.push_back(id);
        evicted
    }

    pub fn get(&self, id: &Uuid) -> Option<SharedSession> {
        self.sessions.get(id).cloned()
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.sessions.contains_key(id)
    }

    /// Remove a session. Returns false if it was not stored.
    pub fn remove(&mut self, id: &Uuid) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            self.order.retain(|o| o != id);
        }
        removed
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
        self.order.clear();
    }

    /// Session ids, oldest first.
    pub fn ids(&self) -> Vec<Uuid> {
        self.order.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
