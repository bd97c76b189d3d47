// crates/tx-scope/src/infrastructure/concurrency/context_store.rs

//! # ContextStore - Stockage lié à l'unité de travail
//!
//! Une map clé/valeur attachée à la chaîne causale d'une tâche asynchrone,
//! et non à un thread ou à une variable globale.
//!
//! ### Propagation
//! - Tout ce qui est `.await` (directement ou via `join!` / `join_all`) depuis
//!   `run_scoped` voit le même store, quel que soit le worker tokio qui reprend la tâche.
//! - `tokio::spawn` n'hérite PAS des task-locals. Les sous-tâches qui doivent voir
//!   le store passent par [`ContextStore::spawn_scoped`].
//! - Un `run_scoped` imbriqué masque le store parent pendant sa durée ;
//!   le parent redevient visible au retour.

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use dashmap::DashMap;
use tokio::task::JoinHandle;

tokio::task_local! {
    static CURRENT_STORE: Arc<ContextStore>;
}

type Entry = Arc<dyn Any + Send + Sync>;

#[derive(Default)]
pub struct ContextStore {
    entries: DashMap<&'static str, Entry>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
        // On clone l'Arc pour relâcher le verrou du shard avant le downcast
        let entry = self.entries.get(key).map(|e| e.value().clone())?;
        entry.downcast::<T>().ok()
    }

    pub fn set<T: Any + Send + Sync>(&self, key: &'static str, value: T) {
        self.entries.insert(key, Arc::new(value));
    }

    pub fn remove(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copie superficielle : le nouveau store part des entrées du parent,
    /// ses propres écritures restent invisibles pour le parent.
    pub fn fork(&self) -> ContextStore {
        let entries = DashMap::with_capacity(self.entries.len());
        for entry in self.entries.iter() {
            entries.insert(*entry.key(), entry.value().clone());
        }
        Self { entries }
    }

    /// Store de l'unité de travail courante, `None` hors de tout scope.
    pub fn current() -> Option<Arc<ContextStore>> {
        CURRENT_STORE.try_with(Arc::clone).ok()
    }

    /// Exécute `fut` avec `store` comme store courant.
    pub async fn run_scoped<F>(store: impl Into<Arc<ContextStore>>, fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_STORE.scope(store.into(), fut).await
    }

    pub fn run_scoped_sync<F, R>(store: impl Into<Arc<ContextStore>>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        CURRENT_STORE.sync_scope(store.into(), f)
    }

    /// `tokio::spawn` qui transporte le store courant dans la nouvelle tâche.
    pub fn spawn_scoped<F>(fut: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        match Self::current() {
            Some(store) => tokio::spawn(CURRENT_STORE.scope(store, fut)),
            None => tokio::spawn(fut),
        }
    }
}
