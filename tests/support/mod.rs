// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup plus sample stack bodies shared by integration tests.

use serde_json::{Value, json};
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("stackyard=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Two services where `web` depends on `db`, plus one named volume.
#[allow(dead_code)]
pub fn web_db_body() -> Value {
    json!({
        "compose": {
            "services": {
                "web": {
                    "image": "nginx:1.25",
                    "ports": ["8080:80"],
                    "depends_on": ["db"]
                },
                "db": {
                    "image": "redis:7",
                    "volumes": ["data:/data"]
                }
            },
            "volumes": { "data": {} }
        }
    })
}
