//! In-memory SessionStore.
//!
//! Each session sits behind its own async mutex, so reservations on one
//! session never wait for another. The outer map lock is held only long
//! enough to find the session's mutex.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, TrainingSessionId};
use crate::domain::session::{CapacityError, TrainingSession};
use crate::ports::SessionStore;

/// In-memory session store for tests and single-node development.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<TrainingSessionId, Arc<Mutex<TrainingSession>>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: TrainingSessionId) -> Option<Arc<Mutex<TrainingSession>>> {
        self.sessions.read().await.get(&id).cloned()
    }

    async fn all_slots(&self) -> Vec<Arc<Mutex<TrainingSession>>> {
        self.sessions.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, session: &TrainingSession) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id()) {
            return Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Training session {} already exists", session.id()),
            ));
        }
        sessions.insert(session.id(), Arc::new(Mutex::new(session.clone())));
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: TrainingSessionId,
    ) -> Result<Option<TrainingSession>, DomainError> {
        match self.slot(id).await {
            Some(slot) => Ok(Some(slot.lock().await.clone())),
            None => Ok(None),
        }
    }

    async fn try_reserve(&self, id: TrainingSessionId) -> Result<(), CapacityError> {
        let slot = self
            .slot(id)
            .await
            .ok_or_else(|| CapacityError::not_found(id))?;
        let mut session = slot.lock().await;
        session.try_reserve()
    }

    async fn release(&self, id: TrainingSessionId) -> Result<bool, CapacityError> {
        let slot = self
            .slot(id)
            .await
            .ok_or_else(|| CapacityError::not_found(id))?;
        let mut session = slot.lock().await;
        Ok(session.release())
    }

    async fn close(&self, id: TrainingSessionId, now: Timestamp) -> Result<bool, DomainError> {
        let slot = self.slot(id).await.ok_or_else(|| {
            DomainError::new(
                ErrorCode::TrainingSessionNotFound,
                format!("Training session not found: {}", id),
            )
        })?;
        let mut session = slot.lock().await;
        Ok(session.close(now))
    }

    async fn close_ended(&self, now: Timestamp) -> Result<Vec<TrainingSessionId>, DomainError> {
        let mut closed = Vec::new();
        for slot in self.all_slots().await {
            let mut session = slot.lock().await;
            if session.close_if_ended(now) {
                closed.push(session.id());
            }
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{Currency, Money};
    use crate::domain::session::SessionDetails;

    fn session(max: u32, ends_in_days: i64) -> TrainingSession {
        let now = Timestamp::now();
        let starts_at = now.add_days(ends_in_days - 1);
        TrainingSession::create(
            TrainingSessionId::new(),
            SessionDetails {
                course_title: "Async Rust".to_string(),
                location: "Remote".to_string(),
                starts_at,
                ends_at: now.add_days(ends_in_days),
                prices: vec![Money::from_major(500, Currency::Eur)],
                max_participants: max,
            },
            now.add_days(-30),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn reserves_until_full_then_denies() {
        let store = InMemorySessionStore::new();
        let s = session(2, 5);
        store.insert(&s).await.unwrap();

        assert!(store.try_reserve(s.id()).await.is_ok());
        assert!(store.try_reserve(s.id()).await.is_ok());
        assert_eq!(
            store.try_reserve(s.id()).await,
            Err(CapacityError::session_full(s.id()))
        );

        let stored = store.find_by_id(s.id()).await.unwrap().unwrap();
        assert_eq!(stored.current_participants(), 2);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found() {
        let store = InMemorySessionStore::new();
        let id = TrainingSessionId::new();
        assert_eq!(store.try_reserve(id).await, Err(CapacityError::not_found(id)));
        assert_eq!(store.release(id).await, Err(CapacityError::not_found(id)));
        assert!(store.close(id, Timestamp::now()).await.is_err());
    }

    #[tokio::test]
    async fn release_is_floored() {
        let store = InMemorySessionStore::new();
        let s = session(2, 5);
        store.insert(&s).await.unwrap();

        assert!(!store.release(s.id()).await.unwrap());
        store.try_reserve(s.id()).await.unwrap();
        assert!(store.release(s.id()).await.unwrap());
        assert!(!store.release(s.id()).await.unwrap());
    }

    #[tokio::test]
    async fn close_ended_only_touches_past_sessions() {
        let store = InMemorySessionStore::new();
        let past = session(2, -1);
        let future = session(2, 5);
        store.insert(&past).await.unwrap();
        store.insert(&future).await.unwrap();

        let closed = store.close_ended(Timestamp::now()).await.unwrap();
        assert_eq!(closed, vec![past.id()]);
        assert!(store.close_ended(Timestamp::now()).await.unwrap().is_empty());

        assert_eq!(
            store.try_reserve(past.id()).await,
            Err(CapacityError::session_closed(past.id()))
        );
        assert!(store.try_reserve(future.id()).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_reserves_never_oversell() {
        let store = Arc::new(InMemorySessionStore::new());
        let s = session(10, 5);
        store.insert(&s).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..60 {
            let store = store.clone();
            let id = s.id();
            handles.push(tokio::spawn(async move { store.try_reserve(id).await }));
        }

        let mut granted = 0;
        let mut full = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => granted += 1,
                Err(CapacityError::SessionFull(_)) => full += 1,
                Err(other) => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(granted, 10);
        assert_eq!(full, 50);
    }
}
