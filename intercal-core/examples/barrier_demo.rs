//! Barrier and logging demonstration
//!
//! Joins a page-load signal tree with a barrier and logs every transition.
//!
//! Run with:
//! ```bash
//! # Pretty format (default in debug)
//! cargo run -p intercal-core --example barrier_demo
//!
//! # JSON format, letting the 50ms timeout win
//! cargo run -p intercal-core --example barrier_demo -- json slow
//!
//! # Compact format
//! cargo run -p intercal-core --example barrier_demo -- compact
//! ```

use intercal_async::runtime;
use intercal_async::time::{self, Duration};
use intercal_core::barrier;
use intercal_core::logging::{init_logging, LogFormat, LogLevel, LoggingConfig};
use intercal_core::tree::Intercal;
use serde_json::json;
use std::env;
use tracing::{error, info, warn};

fn main() {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        Some("pretty") => LogFormat::Pretty,
        _ => LogFormat::default(),
    };
    let slow = args.get(2).map(String::as_str) == Some("slow");

    let config = LoggingConfig::default()
        .with_format(format)
        .with_level(LogLevel::Trace)
        .with_target(true);
    init_logging(config).expect("Failed to initialize logging");

    runtime::block_on(run(slow));
}

async fn run(slow: bool) {
    let ic = Intercal::new(&json!({
        "once": {"page": "styles scripts"},
        "on": {"user": "scroll"}
    }))
    .expect("valid signal tree");

    let mut actions = ic.once_node("page").expect("page group").actions();
    actions.extend(ic.on_node("user").expect("user group").actions());

    let join = barrier::all(actions, Some(Duration::from_millis(50))).expect("valid barrier");
    join.on_timeout(|| warn!("page did not become interactive in time"));

    let styles = ic.once("page.styles").expect("styles signal");
    let scripts = ic.once("page.scripts").expect("scripts signal");
    let scroll = ic.on("user.scroll").expect("scroll signal");

    styles.resolve(vec![json!("main.css")]);
    scroll.fire(vec![json!(120)]);
    scroll.fire(vec![json!(240)]);

    if slow {
        time::sleep(Duration::from_millis(100)).await;
    }
    scripts.resolve(vec![json!("app.js")]);

    match join.wait().await {
        Ok(()) => info!("page interactive"),
        Err(failure) => error!(cause = failure.cause(), "page load failed"),
    }

    let status = join.status();
    info!(
        completed = status.completed,
        total = status.total,
        total_time = status.total_time,
        timed_out = status.timed_out,
        "final status"
    );
}
