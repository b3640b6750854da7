//! The bridge facade
//!
//! [`Bridge`] ties the pieces together for one loaded native library: it
//! owns the library, the reflection context, the callback registry, the
//! instance tracker and the main-thread action queue. It lives on the
//! owning thread; other threads talk to it only through a
//! [`DestroyRequester`] or a [`Dispatcher`].
//!
//! # Lifecycle
//!
//! ```text
//! load ──► initialize ──► spawn / tick / destroy ... ──► deinitialize ──► unload
//! ```
//!
//! [`Bridge::shutdown`] performs the whole right-hand side, destroying any
//! instances still alive first.

use std::cell::Ref;
use std::ffi::CString;
use std::path::Path;
use std::rc::Rc;

use ponte_sdk::{BuildProgress, Handle, LifecycleHook, NativeInstance, ProgressSink};

use crate::config::BridgeOptions;
use crate::context::BridgeContext;
use crate::dispatch::{ActionQueue, Dispatcher};
use crate::entry::{self, ActiveContext};
use crate::error::{BridgeError, BridgeResult};
use crate::lifecycle::{
    DestroyRequester, InstanceId, InstanceLifecycleTracker, NativeInstanceRecord,
};
use crate::loader::{Library, SymbolSource};
use crate::registry::{CallbackRegistry, RegistryState};
use crate::runtime::{ObjectRef, TypeBuilder, TypeId, TypeRegistry};

/// Counters describing one bridge's activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Frames ticked
    pub frames: u64,
    /// Native instances created
    pub created: u64,
    /// Native instances destroyed
    pub destroyed: u64,
    /// Native instances alive
    pub outstanding: usize,
    /// Live handles of every kind
    pub live_handles: usize,
}

/// A loaded native library and the managed state it reflects over
pub struct Bridge {
    context: Rc<BridgeContext>,
    registry: CallbackRegistry,
    tracker: InstanceLifecycleTracker,
    actions: ActionQueue,
    library: Option<Box<dyn SymbolSource>>,
    progress_sink: Option<Box<dyn ProgressSink>>,
    frames: u64,
    active: Option<ActiveContext>,
}

impl Bridge {
    /// Load the native library at `path`. The handshake has not run yet.
    pub fn load<P: AsRef<Path>>(path: P, options: BridgeOptions) -> BridgeResult<Self> {
        let library = Library::open(path)?;
        Self::from_source(Box::new(library), options)
    }

    /// Wrap an already loaded symbol source and activate the bridge on the
    /// current thread. At most one bridge may be active per thread.
    pub fn from_source(
        source: Box<dyn SymbolSource>,
        options: BridgeOptions,
    ) -> BridgeResult<Self> {
        let context = Rc::new(BridgeContext::new(options));
        let active = entry::activate(context.clone())?;
        log::debug!("Bridge for {} active on {:?}", source.name(), std::thread::current().id());
        Ok(Self {
            context,
            registry: CallbackRegistry::new(),
            tracker: InstanceLifecycleTracker::new(),
            actions: ActionQueue::new(),
            library: Some(source),
            progress_sink: None,
            frames: 0,
            active: Some(active),
        })
    }

    /// Run the handshake. On failure the registrations already made stand
    /// and the library should be unloaded.
    pub fn initialize(&mut self) -> BridgeResult<()> {
        let source = self.library.as_deref().ok_or(BridgeError::NoContext)?;
        let result = self.registry.initialize(source);
        if let Err(err) = &result {
            log::error!(
                "Initialization of {} aborted in state {}: {}",
                source.name(),
                self.registry.state(),
                err
            );
        }
        result
    }

    /// Reflection context. Implements [`ponte_sdk::Reflect`].
    pub fn context(&self) -> &BridgeContext {
        &self.context
    }

    /// Options the bridge was created with
    pub fn options(&self) -> &BridgeOptions {
        self.context.options()
    }

    /// Handshake state
    pub fn state(&self) -> RegistryState {
        self.registry.state()
    }

    /// Register a host class native code can resolve
    pub fn register_type(&self, builder: TypeBuilder) -> BridgeResult<TypeId> {
        self.context.register_type(builder)
    }

    /// Borrow the type registry
    pub fn types(&self) -> Ref<'_, TypeRegistry> {
        self.context.types()
    }

    /// Make `object` reachable by name for native `SendMessage` calls. The
    /// returned handle belongs to the caller; release it through the context.
    pub fn register_named(&self, name: &str, object: &ObjectRef) -> BridgeResult<Handle> {
        self.context.register_named(name, object)
    }

    // ========================================================================
    // Proxies
    // ========================================================================

    /// Create the native instance of `class_name` for `proxy`, then run its
    /// awake and enable hooks. The proxy is pinned and registered under
    /// `name` for as long as the instance lives.
    pub fn spawn(
        &mut self,
        class_name: &str,
        name: &str,
        proxy: &ObjectRef,
    ) -> BridgeResult<InstanceId> {
        let class = CString::new(class_name).map_err(|_| {
            BridgeError::InvalidArgument(format!("class name {:?} contains NUL", class_name))
        })?;
        let proxy_handle = self.context.register_named(name, proxy)?;

        let native = match self.registry.create_instance(&class, proxy_handle) {
            Ok(native) if !native.is_null() => native,
            Ok(_) => {
                self.release_proxy(name, proxy_handle);
                log::error!("CreateInstance returned null for {} '{}'", class_name, name);
                return Err(BridgeError::CreateFailed(class_name.to_string()));
            }
            Err(err) => {
                self.release_proxy(name, proxy_handle);
                return Err(err);
            }
        };

        let id = match self.register_instance(native, proxy_handle, class_name, name) {
            Ok(id) => id,
            Err(err) => {
                self.release_proxy(name, proxy_handle);
                return Err(err);
            }
        };
        self.run_hook(id, LifecycleHook::Awake)?;
        self.run_hook(id, LifecycleHook::Enable)?;
        log::info!("Spawned {} '{}'", class_name, name);
        Ok(id)
    }

    /// Record a native instance created outside [`Bridge::spawn`]. The bridge
    /// becomes responsible for destroying it exactly once.
    pub fn register_instance(
        &mut self,
        native: NativeInstance,
        proxy: Handle,
        class_name: &str,
        name: &str,
    ) -> BridgeResult<InstanceId> {
        self.tracker.register(native, proxy, class_name, name)
    }

    /// Enable or disable per-frame hooks for an instance
    pub fn set_enabled(&mut self, id: InstanceId, enabled: bool) -> BridgeResult<()> {
        let record = self.record(id)?;
        if record.is_enabled() == enabled {
            return Ok(());
        }
        let hook = if enabled {
            LifecycleHook::Enable
        } else {
            LifecycleHook::Disable
        };
        self.run_hook(id, hook)?;
        if let Some(record) = self.tracker.get_mut(id) {
            record.enabled = enabled;
        }
        Ok(())
    }

    /// Tear an instance down now: disable, stop, destroy hook,
    /// `DestroyInstance`, then release the proxy handle.
    pub fn destroy(&mut self, id: InstanceId) -> BridgeResult<()> {
        let record = self.record(id).map_err(|_| {
            BridgeError::UnbalancedLifecycle(format!(
                "{:?} was already destroyed or never created",
                id
            ))
        })?;

        if record.is_enabled() {
            self.run_hook(id, LifecycleHook::Disable)?;
        }
        if record.is_started() {
            self.run_hook(id, LifecycleHook::Stop)?;
        }
        self.run_hook(id, LifecycleHook::Destroy)?;
        self.registry.destroy_instance(record.native())?;

        self.release_proxy(record.name(), record.proxy());
        self.tracker.remove(id)?;
        log::debug!("Destroyed {} '{}'", record.class_name(), record.name());
        Ok(())
    }

    /// Queue destruction of `native` from the owning thread
    pub fn request_destroy(&self, native: NativeInstance) -> bool {
        self.tracker.requester().request(native)
    }

    /// A requester other threads can use to queue destruction
    pub fn destroy_requester(&self) -> DestroyRequester {
        self.tracker.requester()
    }

    /// Carry out every queued destroy request, oldest first. Returns how
    /// many instances were destroyed.
    pub fn drain_on_tick(&mut self) -> usize {
        let mut destroyed = 0;
        for id in self.tracker.take_requests() {
            match self.destroy(id) {
                Ok(()) => destroyed += 1,
                Err(err) => log::error!("Queued destroy of {:?} failed: {}", id, err),
            }
        }
        destroyed
    }

    /// Tracked record for an instance
    pub fn instance(&self, id: InstanceId) -> Option<&NativeInstanceRecord> {
        self.tracker.get(id)
    }

    /// Instance tracked for a native pointer
    pub fn find_instance(&self, native: NativeInstance) -> Option<InstanceId> {
        self.tracker.find(native)
    }

    /// Number of native instances alive
    pub fn outstanding_instances(&self) -> usize {
        self.tracker.len()
    }

    // ========================================================================
    // Frames
    // ========================================================================

    /// Drive one frame: start, fixed-tick, tick and late-tick hooks for
    /// enabled instances, then queued destroys, then queued actions.
    /// Strings lent to native code during the frame are freed at the end.
    pub fn tick(&mut self) -> BridgeResult<()> {
        for id in self.tracker.enabled_ids() {
            if self.tracker.get(id).is_some_and(|r| !r.is_started()) {
                self.run_hook(id, LifecycleHook::Start)?;
                if let Some(record) = self.tracker.get_mut(id) {
                    record.started = true;
                }
            }
        }
        for _ in 0..self.options().fixed_ticks_per_frame {
            self.run_hooks(LifecycleHook::FixedTick)?;
        }
        self.run_hooks(LifecycleHook::Tick)?;
        self.run_hooks(LifecycleHook::LateTick)?;

        self.drain_on_tick();
        self.run_actions();
        let freed = self.context.clear_scratch();
        if freed > 0 {
            log::trace!("Freed {} scratch strings", freed);
        }
        self.frames += 1;
        Ok(())
    }

    /// A handle other threads can use to post work to this thread
    pub fn dispatcher(&self) -> Dispatcher {
        self.actions.dispatcher()
    }

    /// Install the sink that receives build progress
    pub fn set_progress_sink(&mut self, sink: impl ProgressSink + 'static) {
        self.progress_sink = Some(Box::new(sink));
    }

    /// Forward a progress record to the installed sink
    pub fn report_progress(&mut self, progress: &BuildProgress) {
        match self.progress_sink.as_mut() {
            Some(sink) => sink.update(progress),
            None => log::info!(
                "Build progress {:.0}%: {}",
                progress.progress * 100.0,
                progress.message
            ),
        }
    }

    /// Run queued main-thread actions, returning how many ran
    pub fn run_actions(&mut self) -> usize {
        let actions = self.actions.take();
        let count = actions.len();
        for action in actions {
            action(self);
        }
        if self.actions.len() > 0 {
            log::trace!("{} actions deferred to the next frame", self.actions.len());
        }
        count
    }

    /// Activity counters
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            frames: self.frames,
            created: self.tracker.created(),
            destroyed: self.tracker.destroyed(),
            outstanding: self.tracker.len(),
            live_handles: self.context.live_handles(),
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Call `DeinitializeNative`. Queued destroys are carried out first;
    /// refuses while instances are still alive.
    pub fn deinitialize(&mut self) -> BridgeResult<()> {
        self.drain_on_tick();
        self.check_balanced()?;
        let source = self.library.as_deref().ok_or(BridgeError::NoContext)?;
        self.registry.deinitialize(source)
    }

    /// Release every handle and unload the library. Refuses while instances
    /// are alive or native code is still initialized. Returns the platform's
    /// unload result.
    pub fn unload(&mut self) -> BridgeResult<bool> {
        self.check_balanced()?;
        if self.registry.is_initialized() {
            return Err(BridgeError::InvalidState {
                expected: "Deinitialized",
                actual: self.registry.state(),
            });
        }
        let library = self.library.take().ok_or(BridgeError::NoContext)?;
        let released = self.context.release_all();
        if released > 0 {
            log::debug!("Released {} handles", released);
        }
        self.active = None;
        let name = library.name().to_string();
        let unloaded = library.unload();
        if unloaded {
            log::info!("Unloaded {}", name);
        } else {
            log::warn!("Something went wrong unloading {}", name);
        }
        Ok(unloaded)
    }

    /// Tear everything down: run queued work, destroy instances still alive
    /// (each is reported as a leak), deinitialize and unload.
    pub fn shutdown(&mut self) -> BridgeResult<bool> {
        self.library()?;
        self.run_actions();
        self.drain_on_tick();

        for id in self.tracker.ids() {
            if let Some(record) = self.tracker.get(id) {
                log::warn!(
                    "Unbalanced lifecycle: {} '{}' still alive at shutdown",
                    record.class_name(),
                    record.name()
                );
            }
            if let Err(err) = self.destroy(id) {
                log::error!("Destroying {:?} at shutdown failed: {}", id, err);
            }
        }

        if self.registry.is_initialized() {
            let source = self.library.as_deref().ok_or(BridgeError::NoContext)?;
            self.registry.deinitialize(source)?;
        }
        self.unload()
    }

    /// Check whether the library is still loaded
    pub fn is_loaded(&self) -> bool {
        self.library.is_some()
    }

    fn library(&self) -> BridgeResult<&dyn SymbolSource> {
        self.library.as_deref().ok_or(BridgeError::NoContext)
    }

    fn record(&self, id: InstanceId) -> BridgeResult<NativeInstanceRecord> {
        self.tracker
            .get(id)
            .cloned()
            .ok_or_else(|| BridgeError::invalid_handle(id.handle(), "unknown instance"))
    }

    fn run_hook(&self, id: InstanceId, hook: LifecycleHook) -> BridgeResult<()> {
        let native = self
            .tracker
            .get(id)
            .map(|r| r.native())
            .ok_or_else(|| BridgeError::invalid_handle(id.handle(), "unknown instance"))?;
        self.registry.invoke_hook(hook, native)
    }

    fn run_hooks(&self, hook: LifecycleHook) -> BridgeResult<()> {
        for id in self.tracker.enabled_ids() {
            self.run_hook(id, hook)?;
        }
        Ok(())
    }

    fn release_proxy(&self, name: &str, proxy: Handle) {
        self.context.unregister_named(name, proxy);
        if let Err(err) = self.context.release(proxy) {
            log::debug!("Proxy handle already released: {}", err);
        }
    }

    fn check_balanced(&self) -> BridgeResult<()> {
        match self.tracker.len() {
            0 => Ok(()),
            n => Err(BridgeError::UnbalancedLifecycle(format!(
                "{} native instances are still alive",
                n
            ))),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if self.library.is_some() {
            log::warn!("Bridge dropped without shutdown; tearing down");
            if let Err(err) = self.shutdown() {
                log::error!("Teardown on drop failed: {}", err);
            }
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("library", &self.library.as_ref().map(|l| l.name().to_string()))
            .field("state", &self.registry.state())
            .field("stats", &self.stats())
            .finish()
    }
}
