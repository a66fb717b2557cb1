//! Runtime context captured into every record.

use crate::types::JsonMap;
use serde_json::Value;

/// Snapshot of the host process: platform, host, pid, SDK version, environment.
pub fn capture_context() -> JsonMap {
    let hostname = hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    let env = std::env::var("ENV")
        .or_else(|_| std::env::var("RUST_ENV"))
        .unwrap_or_else(|_| "development".to_string());

    let mut context = JsonMap::new();
    context.insert("runtime".into(), Value::from("rust"));
    context.insert("platform".into(), Value::from(std::env::consts::OS));
    context.insert("arch".into(), Value::from(std::env::consts::ARCH));
    context.insert("hostname".into(), Value::from(hostname));
    context.insert("pid".into(), Value::from(std::process::id()));
    context.insert("lib_version".into(), Value::from(env!("CARGO_PKG_VERSION")));
    context.insert("env".into(), Value::from(env));
    context.insert(
        "timestamp".into(),
        Value::from(chrono::Utc::now().timestamp_millis()),
    );
    context
}

/// Merge caller context over the captured one; caller keys win.
pub fn merge_context(captured: JsonMap, caller: Option<&JsonMap>) -> JsonMap {
    let mut merged = captured;
    if let Some(caller) = caller {
        for (key, value) in caller {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}
