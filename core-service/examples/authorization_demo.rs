//! Walks through one consent handshake against the desktop loopback authorizer.
//!
//! ```text
//! cargo run -p core-service --example authorization_demo
//! HEALTH_BRIDGE_PENDING_POLICY=evict cargo run -p core-service --example authorization_demo
//! ```

use std::sync::Arc;

use anyhow::Context;
use bridge_desktop::{DesktopSurface, LoopbackAuthorizer};
use bridge_traits::{HostSurface, LogLevel, MethodCall};
use core_runtime::config::PluginConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::HealthPlugin;
use serde_json::json;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Pretty)
            .with_level(LogLevel::Debug),
    )
    .context("failed to initialize logging")?;

    let config = PluginConfig::builder()
        .with_env_overrides()?
        .build()
        .context("invalid plugin configuration")?;

    let (authorizer, results) = LoopbackAuthorizer::with_auto_reply(-1);
    let plugin = Arc::new(
        HealthPlugin::builder()
            .config(config)
            .authorizer(Arc::new(authorizer))
            .build()?,
    );
    plugin.forward_activity_results(results);

    let mut events = plugin.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("event: {}", event.description());
        }
    });

    let window: Arc<dyn HostSurface> = Arc::new(DesktopSurface::new("Demo window"));
    plugin.attach_surface(&window);

    for call in [
        MethodCall::without_arguments("checkAvailability"),
        MethodCall::new("hasPermissions", json!({ "types": ["STEPS"], "permissions": [0] })),
        MethodCall::new(
            "requestAuthorization",
            json!({ "types": ["STEPS"], "permissions": [0] }),
        ),
        MethodCall::new("hasPermissions", json!({ "types": ["STEPS"], "permissions": [0] })),
        MethodCall::without_arguments("getData"),
        MethodCall::without_arguments("foo"),
    ] {
        let method = call.method.clone();
        let response = plugin.invoke(call).await?;
        println!("{method} -> {}", serde_json::to_string(&response)?);
    }

    plugin.detach_surface();
    Ok(())
}
