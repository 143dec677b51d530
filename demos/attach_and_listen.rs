//! Attach to every target and print its events.
//!
//! Demonstrates:
//! - Connecting to a DevTools WebSocket endpoint
//! - Auto-attach with flattened sessions and the `Target` lifecycle hook
//! - Sending commands on child sessions
//! - Per-session event subscriptions that end when the target detaches
//!
//! Start a browser with `--remote-debugging-port=9222`, copy the
//! `webSocketDebuggerUrl` from `http://127.0.0.1:9222/json/version`, then:
//!
//!   cargo run --example attach_and_listen -- ws://127.0.0.1:9222/devtools/browser/<id>
//!   cargo run --example attach_and_listen -- <url> --debug
//!   cargo run --example attach_and_listen -- <url> --no-wait

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use devtools_mux::{Connection, Error, Result, Session, SessionClient};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

const DEFAULT_URL: &str = "ws://127.0.0.1:9222/devtools/browser";

/// How long `--no-wait` listens before exiting.
const NO_WAIT_LISTEN: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone)]
struct Args {
    url: String,
    debug: bool,
    no_wait: bool,
}

impl Args {
    fn parse() -> Self {
        let args: Vec<String> = std::env::args().skip(1).collect();
        Self {
            url: args
                .iter()
                .find(|a| !a.starts_with("--"))
                .cloned()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            debug: args.iter().any(|a| a == "--debug"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachedToTarget {
    session_id: String,
    target_info: TargetInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TargetInfo {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== Attach and Listen ===\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[1] Connecting to {}...", args.url);

    let connection = Connection::builder()
        .target_lifecycle()
        .command_timeout(Duration::from_secs(10))
        .connect(&args.url)
        .await?;

    println!("    ✓ Connected\n");

    // ========================================================================
    // Auto-attach
    // ========================================================================

    println!("[2] Enabling auto-attach...");

    let browser = connection.root_client();
    let mut attached = browser.typed_events::<AttachedToTarget>("Target.attachedToTarget")?;

    browser
        .send(
            "Target.setAutoAttach",
            json!({"autoAttach": true, "waitForDebuggerOnStart": false, "flatten": true}),
        )
        .await?;

    println!("    ✓ Waiting for targets\n");

    // ========================================================================
    // Listen
    // ========================================================================

    let listen = async {
        use futures_util::StreamExt;

        while let Some(event) = attached.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    eprintln!("    ! Unreadable attach event: {e}");
                    continue;
                }
            };

            println!(
                "[+] {} session {} ({})",
                event.target_info.kind, event.session_id, event.target_info.url
            );

            let Some(session) = connection.session(&event.session_id.as_str().into()) else {
                continue;
            };
            tokio::spawn(watch_session(connection.client(&session)));
        }
    };

    if args.no_wait {
        let _ = tokio::time::timeout(NO_WAIT_LISTEN, listen).await;
    } else {
        tokio::select! {
            () = listen => {}
            _ = tokio::signal::ctrl_c() => println!("\n[Ctrl+C]"),
        }
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("\n[3] Closing connection...");
    connection.close().await;
    println!("    ✓ Closed");

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

async fn watch_session(client: SessionClient) {
    let label = session_label(client.session());

    let mut events = match client.subscribe("Page.*") {
        Ok(events) => events,
        Err(e) => {
            eprintln!("    ! {label}: {e}");
            return;
        }
    };

    match client.send("Page.enable", json!({})).await {
        Ok(_) => {}
        // Not every target has a Page domain.
        Err(Error::Protocol { .. }) => return,
        Err(e) => {
            eprintln!("    ! {label}: {e}");
            return;
        }
    }

    while let Some(event) = events.recv().await {
        println!("    {label} {}", event.method);
    }

    println!("[-] {label} detached");
}

fn session_label(session: &Session) -> String {
    session
        .id()
        .map_or_else(|| "root".to_string(), |id| id.as_str().chars().take(8).collect())
}

fn init_logging(debug: bool) {
    let filter = if debug {
        "devtools_mux=debug"
    } else {
        "devtools_mux=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}
