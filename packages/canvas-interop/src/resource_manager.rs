//! Identity cache mapping native resources to their single live wrapper.
//!
//! Lookups take the map lock only long enough to upgrade a weak entry. Wrapper
//! construction (and whatever native calls it makes) runs outside the lock; when two
//! threads race to create a wrapper for the same resource, the first to register wins
//! and the other's wrapper is discarded.
//!
//! No wrapper is ever dropped while the map lock is held, since dropping a wrapper
//! deregisters it and would re-enter the lock.

use std::fmt;
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::device::Device;
use crate::error::{InteropError, Result};
use crate::native::{NativeIdentity, NativeResource};
use crate::resolver::{self, CreateContext, TryCreateFn};
use crate::singleton::SingletonRegistry;
use crate::wrapper::{ResourceWrapper, is_same_instance};

static INSTANCE: Lazy<SingletonRegistry<ResourceManager>> = Lazy::new(SingletonRegistry::new);

struct Entry {
    wrapper: Weak<dyn ResourceWrapper>,
    token: u64,
}

pub struct ResourceManager {
    wrappers: Mutex<FxHashMap<NativeIdentity, Entry>>,
    creators: RwLock<Vec<TryCreateFn>>,
}

impl Default for ResourceManager {
    fn default() -> Self {
        Self::with_creators(resolver::default_creators())
    }
}

impl ResourceManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_creators(creators: Vec<TryCreateFn>) -> Self {
        Self {
            wrappers: Mutex::new(FxHashMap::default()),
            creators: RwLock::new(creators),
        }
    }

    /// The process-wide manager. It lives while somebody holds it.
    pub fn instance() -> Arc<Self> {
        INSTANCE.get_instance()
    }

    /// Replace the process-wide manager; fails while the current one is still in use.
    pub fn set_instance(manager: &Arc<Self>) -> Result<()> {
        INSTANCE.set_instance(manager)
    }

    /// Creators are tried in registration order; the first to return `Some` decides.
    pub fn register_creator(&self, creator: TryCreateFn) {
        self.creators.write().push(creator);
    }

    pub fn try_get(&self, identity: NativeIdentity) -> Option<Arc<dyn ResourceWrapper>> {
        self.wrappers
            .lock()
            .get(&identity)
            .and_then(|entry| entry.wrapper.upgrade())
    }

    pub fn len(&self) -> usize {
        self.wrappers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the wrapper cached for `native`, creating one through the registered
    /// creators on a miss.
    ///
    /// When `device` is given, an existing wrapper that belongs to another device is
    /// rejected with [`InteropError::InvalidArgument`].
    pub fn get_or_create(
        self: &Arc<Self>,
        device: Option<&Arc<Device>>,
        native: &Arc<dyn NativeResource>,
    ) -> Result<Arc<dyn ResourceWrapper>> {
        let identity = native.identity();
        let wrapper = self.get_or_create_with(identity, || self.create_wrapper(device, native))?;
        validate_device(wrapper.as_ref(), device)?;
        Ok(wrapper)
    }

    /// Cache lookup with a caller-supplied constructor for the miss path.
    pub fn get_or_create_with(
        self: &Arc<Self>,
        identity: NativeIdentity,
        create: impl FnOnce() -> Result<Arc<dyn ResourceWrapper>>,
    ) -> Result<Arc<dyn ResourceWrapper>> {
        if identity.is_null() {
            return Err(InteropError::InvalidArgument("native resource is null"));
        }
        if let Some(existing) = self.try_get(identity) {
            existing.ensure_not_closed()?;
            trace!(?identity, "wrapper cache hit");
            return Ok(existing);
        }

        let created = create()?;
        if created.identity() != identity {
            return Err(InteropError::InvalidArgument(
                "created wrapper wraps a different native resource",
            ));
        }
        self.register(created)
    }

    /// Register a wrapper built outside the cache (a freshly created resource).
    ///
    /// Adding a wrapper that is already cached here is a no-op. A closed wrapper, or one
    /// registered with another manager, is rejected.
    pub fn add(self: &Arc<Self>, wrapper: &Arc<dyn ResourceWrapper>) -> Result<()> {
        if wrapper.identity().is_null() {
            return Err(InteropError::InvalidArgument("native resource is null"));
        }
        wrapper.ensure_not_closed()?;
        let registered = self.register(wrapper.clone())?;
        if is_same_instance(&registered, wrapper) {
            Ok(())
        } else {
            Err(InteropError::InvalidArgument(
                "a wrapper already exists for this native resource",
            ))
        }
    }

    pub fn remove(&self, wrapper: &dyn ResourceWrapper) -> bool {
        let removed = self.forget(wrapper.identity(), wrapper.core().token());
        if removed {
            wrapper.core().detach(self);
        }
        removed
    }

    fn register(
        self: &Arc<Self>,
        wrapper: Arc<dyn ResourceWrapper>,
    ) -> Result<Arc<dyn ResourceWrapper>> {
        let identity = wrapper.identity();
        let (winner, discarded) = {
            let mut wrappers = self.wrappers.lock();
            match wrappers.get(&identity).and_then(|e| e.wrapper.upgrade()) {
                Some(existing) if is_same_instance(&existing, &wrapper) => (existing, None),
                Some(existing) => (existing, Some(wrapper)),
                None => {
                    // Checked under the lock: `close` flags the wrapper before it
                    // takes the lock to deregister.
                    wrapper.ensure_not_closed()?;
                    wrapper.core().attach(self)?;
                    wrappers.insert(
                        identity,
                        Entry {
                            wrapper: Arc::downgrade(&wrapper),
                            token: wrapper.core().token(),
                        },
                    );
                    (wrapper, None)
                }
            }
        };
        match discarded {
            Some(duplicate) => {
                warn!(?identity, "lost wrapper creation race, discarding duplicate");
                drop(duplicate);
            }
            None => debug!(?identity, kind = ?winner.kind(), "wrapper registered"),
        }
        Ok(winner)
    }

    /// Drop the entry for `identity` if it still belongs to the wrapper holding `token`.
    pub(crate) fn forget(&self, identity: NativeIdentity, token: u64) -> bool {
        let removed = {
            let mut wrappers = self.wrappers.lock();
            match wrappers.get(&identity) {
                Some(entry) if entry.token == token => wrappers.remove(&identity),
                _ => None,
            }
        };
        if removed.is_some() {
            debug!(?identity, "wrapper deregistered");
        }
        removed.is_some()
    }

    fn create_wrapper(
        self: &Arc<Self>,
        device: Option<&Arc<Device>>,
        native: &Arc<dyn NativeResource>,
    ) -> Result<Arc<dyn ResourceWrapper>> {
        let creators = self.creators.read().clone();
        let cx = CreateContext {
            manager: self,
            device,
            native,
        };
        creators
            .iter()
            .find_map(|create| create(&cx))
            .unwrap_or_else(|| {
                Err(InteropError::InterfaceNotSupported {
                    requested: "CanvasResource",
                    actual: native.kind().name(),
                })
            })
    }
}

fn validate_device(wrapper: &dyn ResourceWrapper, device: Option<&Arc<Device>>) -> Result<()> {
    match (device, wrapper.core().device()) {
        (Some(requested), Some(owner)) if !Arc::ptr_eq(requested, owner) => Err(
            InteropError::InvalidArgument("resource belongs to a different device"),
        ),
        _ => Ok(()),
    }
}

impl fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceManager")
            .field("wrappers", &self.len())
            .field("creators", &self.creators.read().len())
            .finish()
    }
}
