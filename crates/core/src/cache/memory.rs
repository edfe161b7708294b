//! In-memory cache storage.
//!
//! Uses a tokio `RwLock` over an insertion-ordered list of generations so
//! concurrent lookups never block each other.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::{CacheStorage, Error};
use crate::http::{RequestKey, Response};

struct Generation {
    name: String,
    entries: HashMap<RequestKey, Response>,
}

/// Process-local [`CacheStorage`]. Cloning shares the underlying maps.
#[derive(Clone, Default)]
pub struct MemoryCacheStorage {
    generations: Arc<RwLock<Vec<Generation>>>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries stored in `generation` (0 if it does not exist).
    pub async fn len(&self, generation: &str) -> usize {
        let generations = self.generations.read().await;
        generations
            .iter()
            .find(|g| g.name == generation)
            .map(|g| g.entries.len())
            .unwrap_or(0)
    }
}

fn find_or_create<'a>(generations: &'a mut Vec<Generation>, name: &str) -> &'a mut Generation {
    let index = match generations.iter().position(|g| g.name == name) {
        Some(index) => index,
        None => {
            generations.push(Generation { name: name.to_string(), entries: HashMap::new() });
            generations.len() - 1
        }
    };
    &mut generations[index]
}

#[async_trait::async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, generation: &str) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        find_or_create(&mut generations, generation);
        Ok(())
    }

    async fn match_request(&self, generation: &str, key: &RequestKey) -> Result<Option<Response>, Error> {
        let generations = self.generations.read().await;
        Ok(generations
            .iter()
            .find(|g| g.name == generation)
            .and_then(|g| g.entries.get(key))
            .map(Response::duplicate))
    }

    async fn put(&self, generation: &str, key: &RequestKey, response: &Response) -> Result<(), Error> {
        let mut generations = self.generations.write().await;
        find_or_create(&mut generations, generation)
            .entries
            .insert(key.clone(), response.duplicate());
        Ok(())
    }

    async fn delete(&self, generation: &str) -> Result<bool, Error> {
        let mut generations = self.generations.write().await;
        let before = generations.len();
        generations.retain(|g| g.name != generation);
        Ok(generations.len() != before)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        let generations = self.generations.read().await;
        Ok(generations.iter().map(|g| g.name.clone()).collect())
    }
}
