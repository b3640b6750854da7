//! `ponte run`: load a native library, spawn the configured proxies and
//! drive it for a number of frames.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use ponte_bridge::{
    Bridge, BridgeContext, BridgeResult, BridgeStats, ManagedValue, MethodDef, ObjectRef,
    TypeBuilder, TypeId,
};

use crate::config::{HostConfig, CONFIG_FILE};

/// Managed class every configured proxy is an instance of
pub const PROXY_TYPE: &str = "Ponte.Proxy";

/// Flags of `ponte run`; each overrides the config file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Config file; `ponte.toml` in the working directory when unset
    pub config: Option<PathBuf>,
    /// Native library path
    pub library: Option<PathBuf>,
    /// Frames to run
    pub frames: Option<u64>,
}

/// Merge the config file (if any) with command-line overrides
pub fn resolve_config(options: &RunOptions) -> anyhow::Result<HostConfig> {
    let mut config = match &options.config {
        Some(path) => HostConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None if Path::new(CONFIG_FILE).exists() => HostConfig::from_file(Path::new(CONFIG_FILE))
            .with_context(|| format!("Failed to load {}", CONFIG_FILE))?,
        None => HostConfig::default(),
    };

    if let Some(library) = &options.library {
        config.library.path = Some(library.clone());
    }
    if let Some(frames) = options.frames {
        config.frames = frames;
    }
    Ok(config)
}

/// Register the proxy class: a `name` field and a `Log(String)` method
/// native code can reach through `SendMessage`.
pub fn register_proxy_type(context: &BridgeContext) -> BridgeResult<TypeId> {
    context.register_type(
        TypeBuilder::new(PROXY_TYPE).field("name", TypeId::STRING).method(
            MethodDef::new("Log", |this, args| {
                let name = this
                    .and_then(|proxy| proxy.get("name"))
                    .and_then(|value| value.as_str().map(String::from))
                    .unwrap_or_default();
                log::info!("[{}] {}", name, args[0].as_str().unwrap_or_default());
                Ok(ManagedValue::None)
            })
            .param(TypeId::STRING),
        ),
    )
}

fn new_proxy(context: &BridgeContext, name: &str) -> anyhow::Result<ObjectRef> {
    let proxy = {
        let types = context.types();
        let ty = types
            .lookup(PROXY_TYPE)
            .and_then(|id| types.get(id))
            .ok_or_else(|| anyhow!("{} is not registered", PROXY_TYPE))?;
        ty.instantiate()
    };
    proxy.set("name", name)?;
    Ok(proxy)
}

/// Run the configured session and return its counters
pub fn run_session(config: &HostConfig) -> anyhow::Result<BridgeStats> {
    let path = config.library_path().ok_or_else(|| {
        anyhow!(
            "No native library configured; pass --library or set [library] path in {}",
            CONFIG_FILE
        )
    })?;

    let mut bridge = Bridge::load(path, config.bridge.clone())?;
    register_proxy_type(bridge.context())?;
    bridge.initialize()?;

    for entry in &config.proxies {
        let proxy = new_proxy(bridge.context(), &entry.name)?;
        let id = bridge
            .spawn(&entry.class, &entry.name, &proxy)
            .with_context(|| format!("Failed to spawn {} '{}'", entry.class, entry.name))?;
        if !entry.enabled {
            bridge.set_enabled(id, false)?;
        }
    }

    for _ in 0..config.frames {
        bridge.tick()?;
    }

    let stats = bridge.stats();
    if !bridge.shutdown()? {
        log::warn!("Library reported a failed unload");
    }
    Ok(stats)
}

pub fn execute(options: RunOptions) -> anyhow::Result<()> {
    let config = resolve_config(&options)?;
    let stats = run_session(&config)?;

    println!("Frames:       {}", stats.frames);
    println!("Instances:    {} created, {} destroyed", stats.created, stats.destroyed);
    if stats.outstanding > 0 {
        println!("Outstanding:  {}", stats.outstanding);
    }
    Ok(())
}
