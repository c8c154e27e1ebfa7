//! Memoizing algorithm provider.

use parking_lot::RwLock;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use cryptofacade_common::{AlgorithmId, Error, Result};
use cryptofacade_runtime::ProviderState;

type Entry = Arc<dyn Any + Send + Sync>;
type Builder = Box<dyn Fn(&Arc<ProviderState>) -> Entry + Send + Sync>;

/// Algorithms one backend implements, keyed by identifier name.
///
/// Registration is typed: the builder for an `AlgorithmId<dyn F>` must
/// return an `Arc<dyn F>`.
pub struct AlgorithmTable {
    builders: HashMap<&'static str, Builder>,
    order: Vec<&'static str>,
}

impl AlgorithmTable {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register the builder for `id`.
    ///
    /// Builders run at most once per provider, on first lookup. They must be
    /// cheap: no I/O and no handle checkout.
    ///
    /// # Errors
    /// - `AlreadyExists` if an algorithm with the same name is registered
    pub fn register<A>(
        &mut self,
        id: &AlgorithmId<A>,
        builder: impl Fn(&Arc<ProviderState>) -> Arc<A> + Send + Sync + 'static,
    ) -> Result<()>
    where
        A: ?Sized + Send + Sync + 'static,
    {
        let name = id.name();
        if self.builders.contains_key(name) {
            return Err(Error::AlreadyExists(format!(
                "Algorithm '{}' is already registered",
                name
            )));
        }
        self.builders
            .insert(name, Box::new(move |state| Arc::new(builder(state)) as Entry));
        self.order.push(name);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> &[&'static str] {
        &self.order
    }
}

impl Default for AlgorithmTable {
    fn default() -> Self {
        Self::new()
    }
}

/// One backend: resolves identifiers to algorithm instances and keeps them.
///
/// Every identifier maps to at most one instance per provider; repeated
/// lookups return the same `Arc`.
pub struct Provider {
    name: String,
    state: Arc<ProviderState>,
    table: AlgorithmTable,
    cache: RwLock<HashMap<&'static str, Entry>>,
}

impl Provider {
    pub fn new(name: impl Into<String>, state: ProviderState, table: AlgorithmTable) -> Self {
        let name = name.into();
        debug!(provider = %name, algorithms = table.names().len(), "Provider created");
        Self {
            name,
            state: Arc::new(state),
            table,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execution state shared by every operation of this provider.
    pub fn state(&self) -> &Arc<ProviderState> {
        &self.state
    }

    /// Whether this provider implements `id`. Does not construct anything.
    pub fn supports<A: ?Sized>(&self, id: &AlgorithmId<A>) -> bool {
        self.table.contains(id.name())
    }

    /// Names of every implemented algorithm, in registration order.
    pub fn algorithm_names(&self) -> Vec<&'static str> {
        self.table.names().to_vec()
    }

    /// Resolve `id`, or `None` if this provider does not implement it.
    pub fn get_or_null<A>(&self, id: &AlgorithmId<A>) -> Option<Arc<A>>
    where
        A: ?Sized + Send + Sync + 'static,
    {
        let name = id.name();
        if let Some(entry) = self.cache.read().get(name) {
            return downcast::<A>(entry, name);
        }

        let Some(builder) = self.table.builders.get(name) else {
            trace!(provider = %self.name, algorithm = name, "Algorithm not provided");
            return None;
        };

        let entry = {
            let mut cache = self.cache.write();
            // Another caller may have won the race to the write lock.
            Arc::clone(cache.entry(name).or_insert_with(|| {
                debug!(provider = %self.name, algorithm = name, "Constructing algorithm");
                builder(&self.state)
            }))
        };
        downcast::<A>(&entry, name)
    }

    /// Resolve `id`.
    ///
    /// # Errors
    /// - `AlgorithmNotFound` if this provider does not implement `id`
    pub fn get<A>(&self, id: &AlgorithmId<A>) -> Result<Arc<A>>
    where
        A: ?Sized + Send + Sync + 'static,
    {
        self.get_or_null(id).ok_or_else(|| {
            Error::AlgorithmNotFound(format!(
                "{} is not provided by '{}'",
                id.name(),
                self.name
            ))
        })
    }
}

fn downcast<A: ?Sized + Send + Sync + 'static>(entry: &Entry, name: &str) -> Option<Arc<A>> {
    match (**entry).downcast_ref::<Arc<A>>() {
        Some(algorithm) => Some(Arc::clone(algorithm)),
        None => {
            warn!(algorithm = name, "Identifier family does not match registered algorithm");
            None
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("algorithms", &self.table.names())
            .field("state", &self.state)
            .finish()
    }
}
