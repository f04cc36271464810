//! wabridge-cli — operator tool for a running wabridge server
//!
//! Posts webhook bodies shaped like the WhatsApp Business Cloud API's to the
//! server, so the whole pipeline can be exercised without a phone.
//!
//! # Subcommands
//! - `status`                                   — show server health
//! - `send-text --from <wa_id> --body <text>`  — deliver a text message
//! - `send-audio --from <wa_id> --media-id <id>` — deliver a voice note

use clap::{Parser, Subcommand};
use serde::Deserialize;

const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "wabridge-cli", version, about = "Operator CLI for the wabridge webhook server")]
struct Cli {
    /// wabridge HTTP server URL (overrides WABRIDGE_HTTP_URL env var)
    #[arg(long, env = "WABRIDGE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show wabridge server status
    Status,

    /// Deliver a simulated inbound text message
    SendText {
        /// Sender WhatsApp id
        #[arg(long)]
        from: String,

        /// Sender display name
        #[arg(long, default_value = "wabridge-cli")]
        name: String,

        /// Message text
        #[arg(long)]
        body: String,
    },

    /// Deliver a simulated inbound voice note referencing existing media
    SendAudio {
        /// Sender WhatsApp id
        #[arg(long)]
        from: String,

        /// Sender display name
        #[arg(long, default_value = "wabridge-cli")]
        name: String,

        /// Media id previously uploaded to the Graph API
        #[arg(long)]
        media_id: String,

        #[arg(long, default_value = "audio/ogg; codecs=opus")]
        mime_type: String,
    },
}

/// Body returned by POST /webhook
#[derive(Debug, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

// ============================================================================
// Payload construction
// ============================================================================

/// Wrap one message in the `entry[0].changes[0].value` envelope.
pub fn webhook_payload(from: &str, name: &str, message: serde_json::Value) -> serde_json::Value {
    let mut message = message;
    if let Some(obj) = message.as_object_mut() {
        obj.insert("from".to_string(), serde_json::json!(from));
        obj.insert(
            "id".to_string(),
            serde_json::json!(format!("wamid.cli.{}", uuid::Uuid::new_v4().simple())),
        );
        obj.insert(
            "timestamp".to_string(),
            serde_json::json!(chrono::Utc::now().timestamp().to_string()),
        );
    }

    serde_json::json!({
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "wabridge-cli",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "contacts": [{ "wa_id": from, "profile": { "name": name } }],
                    "messages": [message]
                }
            }]
        }]
    })
}

pub fn text_message(body: &str) -> serde_json::Value {
    serde_json::json!({ "type": "text", "text": { "body": body } })
}

pub fn audio_message(media_id: &str, mime_type: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "audio",
        "audio": { "id": media_id, "mime_type": mime_type, "voice": true }
    })
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn do_deliver(server: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
    // Audio goes through download, ffmpeg, the agent and TTS before the reply.
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let url = format!("{}/webhook", server);
    let resp = match client.post(&url).json(payload).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("wabridge-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    let status = resp.status();
    let body: WebhookResponse = match resp.json() {
        Ok(b) => b,
        Err(e) => {
            eprintln!("wabridge-cli: failed to parse webhook response ({}): {}", status, e);
            std::process::exit(1);
        }
    };

    if !status.is_success() {
        eprintln!(
            "wabridge-cli: server returned {}: {}",
            status,
            body.error.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    println!("Status: {}", body.status);
    if let Some(result) = body.result {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(10))
        .build()?;

    let url = format!("{}/health", server);
    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("wabridge server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
            println!("Sessions:        {}", body["sessions"].as_u64().unwrap_or(0));
        }
        Ok(r) => {
            eprintln!("wabridge-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("wabridge-cli: cannot reach {} — {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Status => do_status(&server),
        Commands::SendText { from, name, body } => {
            do_deliver(&server, &webhook_payload(&from, &name, text_message(&body)))
        }
        Commands::SendAudio {
            from,
            name,
            media_id,
            mime_type,
        } => do_deliver(
            &server,
            &webhook_payload(&from, &name, audio_message(&media_id, &mime_type)),
        ),
    };

    if let Err(e) = result {
        eprintln!("wabridge-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_payload_envelope() {
        let payload = webhook_payload("5511", "Ana", text_message("oi"));
        let value = &payload["entry"][0]["changes"][0]["value"];

        assert_eq!(value["contacts"][0]["wa_id"], "5511");
        assert_eq!(value["contacts"][0]["profile"]["name"], "Ana");
        assert_eq!(value["messages"][0]["type"], "text");
        assert_eq!(value["messages"][0]["text"]["body"], "oi");
        assert_eq!(value["messages"][0]["from"], "5511");
    }

    #[test]
    fn test_message_gets_id_and_timestamp() {
        let payload = webhook_payload("5511", "Ana", text_message("oi"));
        let message = &payload["entry"][0]["changes"][0]["value"]["messages"][0];

        assert!(message["id"].as_str().unwrap().starts_with("wamid.cli."));
        assert!(message["timestamp"].as_str().unwrap().parse::<i64>().is_ok());
    }

    #[test]
    fn test_audio_payload() {
        let payload = webhook_payload("5511", "Ana", audio_message("media-1", "audio/ogg"));
        let message = &payload["entry"][0]["changes"][0]["value"]["messages"][0];

        assert_eq!(message["type"], "audio");
        assert_eq!(message["audio"]["id"], "media-1");
        assert_eq!(message["audio"]["mime_type"], "audio/ogg");
    }

    #[test]
    fn test_webhook_response_parses_error() {
        let body: WebhookResponse = serde_json::from_value(serde_json::json!({
            "status": "error",
            "error": "internal error"
        }))
        .unwrap();
        assert_eq!(body.status, "error");
        assert_eq!(body.error.as_deref(), Some("internal error"));
        assert!(body.result.is_none());
    }

    #[test]
    fn test_send_text_takes_body_flag() {
        let cli = Cli::try_parse_from([
            "wabridge-cli",
            "--server",
            "http://localhost:9000",
            "send-text",
            "--from",
            "5511",
            "--body",
            "oi",
        ])
        .unwrap();

        assert_eq!(cli.server, "http://localhost:9000");
        match cli.command {
            Commands::SendText { from, body, .. } => {
                assert_eq!(from, "5511");
                assert_eq!(body, "oi");
            }
            other => panic!("expected SendText, got {other:?}"),
        }

        assert!(Cli::try_parse_from(["wabridge-cli", "send-text", "--from", "5511", "oi"]).is_err());
    }
}
