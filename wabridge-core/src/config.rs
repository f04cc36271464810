use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,
    #[serde(default)]
    pub dialogflow: DialogflowConfig,
    #[serde(default)]
    pub tts: TtsConfig,
    #[serde(default)]
    pub google: GoogleAuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServiceConfig {
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Session expiry policy.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SessionConfig {
    /// Sessions at least this old are removed by the sweep.
    pub expiry_seconds: u64,
    pub sweep_interval_seconds: u64,
    /// Reset a session's age whenever it is looked up.
    pub refresh_on_access: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expiry_seconds: 1800,
            sweep_interval_seconds: 60,
            refresh_on_access: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub target_sample_rate: u32,
    pub timeout_seconds: u64,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            target_sample_rate: 48_000,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct WhatsAppConfig {
    pub base_url: String,
    pub phone_number_id: String,
    pub access_token: String,
    pub http_timeout_seconds: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.facebook.com/v22.0".to_string(),
            phone_number_id: String::new(),
            access_token: String::new(),
            http_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DialogflowConfig {
    pub project_id: String,
    pub location: String,
    pub agent_id: String,
    pub language_code: String,
    /// Fixed bearer token; when empty, tokens come from the `google` credentials.
    pub access_token: String,
    /// Overrides the regional endpoint derived from `location`.
    pub base_url: Option<String>,
    pub http_timeout_seconds: u64,
}

impl Default for DialogflowConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            location: "global".to_string(),
            agent_id: String::new(),
            language_code: "pt-BR".to_string(),
            access_token: String::new(),
            base_url: None,
            http_timeout_seconds: 30,
        }
    }
}

impl DialogflowConfig {
    pub fn endpoint(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None if self.location == "global" => "https://dialogflow.googleapis.com/v3".to_string(),
            None => format!("https://{}-dialogflow.googleapis.com/v3", self.location),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TtsConfig {
    pub base_url: String,
    pub language_code: String,
    pub voice_name: String,
    pub ssml_gender: String,
    pub audio_encoding: String,
    /// Fixed bearer token; falls back to `dialogflow.access_token`, then to
    /// the `google` credentials.
    pub access_token: String,
    pub http_timeout_seconds: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://texttospeech.googleapis.com/v1".to_string(),
            language_code: "pt-BR".to_string(),
            voice_name: "pt-BR-Wavenet-D".to_string(),
            ssml_gender: "FEMALE".to_string(),
            audio_encoding: "MP3".to_string(),
            access_token: String::new(),
            http_timeout_seconds: 30,
        }
    }
}

/// Service-account credentials for the Google APIs.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GoogleAuthConfig {
    /// Path to a service-account JSON key. When unset, Application Default
    /// Credentials are used.
    pub credentials_file: Option<String>,
}

impl BridgeConfig {
    /// Load from a TOML file, then overlay `WABRIDGE__SECTION__KEY` env vars.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("WABRIDGE").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Names of required settings that are still empty after loading.
    /// Google tokens are checked separately since they may come from the
    /// ambient credentials.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.whatsapp.phone_number_id.is_empty() {
            missing.push("whatsapp.phone_number_id");
        }
        if self.whatsapp.access_token.is_empty() {
            missing.push("whatsapp.access_token");
        }
        if self.dialogflow.project_id.is_empty() {
            missing.push("dialogflow.project_id");
        }
        if self.dialogflow.agent_id.is_empty() {
            missing.push("dialogflow.agent_id");
        }
        missing
    }
}
