use std::time::Duration;

use chrono::Local;
use hookverify_messages::WebhookFrame;
use serde_json::{Map, Value};

use crate::{error::Error, websocket::ListenerEvents, webhook::ForwardResult};

/// Prints listener events as one line each on stdout.
#[derive(Debug)]
pub struct TerminalRenderer {
    reconnect_delay: Duration,
}

impl TerminalRenderer {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self { reconnect_delay }
    }
}

impl ListenerEvents for TerminalRenderer {
    fn on_connect(&mut self, _session_info: &Map<String, Value>) {
        println!("✅ Connected! Waiting for webhooks...\n");
        println!("Press Ctrl+C to stop\n");
    }

    fn on_webhook(&mut self, frame: &WebhookFrame, result: &ForwardResult) {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        println!("{}", webhook_line(&timestamp, frame.delivery_id(), result));
    }

    fn on_error(&mut self, error: &Error) {
        println!("❌ Error: {error}");
        if error.is_transient() {
            println!("Reconnecting in {} seconds...", self.reconnect_delay.as_secs());
        } else {
            println!("Check your API key with: hookverify status");
        }
    }
}

/// 2xx responses, other responses and failed deliveries each get their own marker.
pub fn indicator(result: &ForwardResult) -> &'static str {
    match result {
        ForwardResult::Delivered { status_code, .. } if (200..300).contains(status_code) => "➡️",
        ForwardResult::Delivered { .. } => "⚠️",
        ForwardResult::Failed { .. } => "❌",
    }
}

pub fn webhook_line(timestamp: &str, delivery_id: &str, result: &ForwardResult) -> String {
    let marker = indicator(result);
    match result {
        ForwardResult::Delivered { status_code, .. } => {
            format!("{timestamp} {marker} {delivery_id} {status_code}")
        }
        ForwardResult::Failed { error_message } => {
            format!("{timestamp} {marker} {delivery_id} - {error_message}")
        }
    }
}
