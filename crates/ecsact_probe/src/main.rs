//! Ecsact Probe
//!
//! Loads a native Ecsact runtime and reports what it exports.
//! Usage: `ecsact-probe [settings.json]`

use anyhow::{Context, Result};
use ecsact_runtime::{AbiModule, EcsactRuntime, RuntimeError, RuntimeSettings, TypeRegistry};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let settings = match std::env::args().nth(1) {
        Some(path) => RuntimeSettings::load(&path).with_context(|| format!("reading settings from {path}"))?,
        None => RuntimeSettings::default(),
    };

    // RUST_LOG wins over the settings file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Ecsact probe v{}", ecsact_runtime::VERSION);

    let Some(path) = settings.library_path.as_deref() else {
        tracing::info!("No runtime library configured; set library_path in the settings file");
        return Ok(());
    };

    let runtime = EcsactRuntime::load(path, TypeRegistry::new())
        .with_context(|| format!("loading runtime {}", path.display()))?;

    let methods = runtime.loaded_methods();
    for module in [
        AbiModule::Core,
        AbiModule::Dynamic,
        AbiModule::Meta,
        AbiModule::Serialize,
        AbiModule::Static,
        AbiModule::Async,
        AbiModule::Wasm,
    ] {
        let names: Vec<_> = methods.module(module).collect();
        tracing::info!(%module, count = names.len(), "methods: {}", names.join(", "));
    }

    report("component", runtime.statics().components());
    report("system", runtime.statics().systems());
    report("action", runtime.statics().actions());

    match runtime.meta().count_packages() {
        Ok(count) => tracing::info!(count, "packages"),
        Err(err) => tracing::debug!(error = %err, "meta module unavailable"),
    }

    Ok(())
}

fn report(kind: &str, list: Result<Vec<ecsact_runtime::modules::StaticInfo>, RuntimeError>) {
    match list {
        Ok(entries) => {
            for entry in entries {
                tracing::info!(kind, id = entry.id, name = %entry.name, "static type");
            }
        }
        Err(err) => tracing::debug!(kind, error = %err, "static list unavailable"),
    }
}
