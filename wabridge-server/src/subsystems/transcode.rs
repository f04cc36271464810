//! Voice-note transcoding for the agent's audio input
//!
//! WhatsApp voice notes arrive as Ogg/Opus at whatever rate the client
//! recorded; Dialogflow wants Ogg/Opus at a declared sample rate. The
//! conversion is delegated to `ffmpeg`, fed through stdin/stdout pipes so no
//! file ever touches disk. The child is spawned with `kill_on_drop`, which
//! covers the timeout path and any early return.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use wabridge_core::config::TranscodeConfig;

#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    async fn transcode(&self, audio: Bytes, target_sample_rate: u32)
        -> Result<Bytes, TranscodeError>;
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("no audio to transcode")]
    EmptyInput,

    #[error("failed to spawn '{binary}': {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transcoder IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcoder exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("transcoder produced no output")]
    EmptyOutput,

    #[error("transcoder timed out after {0:?}")]
    Timeout(Duration),
}

/// Arguments for Ogg/Opus → Ogg/Opus at `sample_rate`, stdin to stdout.
pub fn ffmpeg_args(sample_rate: u32) -> Vec<String> {
    let rate = sample_rate.to_string();
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-i",
        "pipe:0",
        "-c:a",
        "libopus",
        "-ar",
        rate.as_str(),
        "-f",
        "ogg",
        "pipe:1",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: String,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(binary: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &TranscodeConfig) -> Self {
        Self::new(
            config.ffmpeg_path.clone(),
            Duration::from_secs(config.timeout_seconds.max(1)),
        )
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    async fn run(&self, args: Vec<String>, input: Bytes) -> Result<Bytes, TranscodeError> {
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| TranscodeError::Spawn {
                binary: self.binary.clone(),
                source,
            })?;

        let (Some(mut stdin), Some(mut stdout), Some(mut stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(TranscodeError::Io(std::io::Error::other(
                "transcoder pipes unavailable",
            )));
        };

        // Feed stdin while draining stdout/stderr so neither side blocks on a full pipe.
        let writer = async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            match result {
                // The process may exit before reading everything (e.g. bad input);
                // its exit status reports that better than EPIPE does.
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => Ok(()),
                other => other,
            }
        };
        let reader = async move {
            let mut buf = Vec::new();
            stdout.read_to_end(&mut buf).await.map(|_| buf)
        };
        let err_reader = async move {
            let mut buf = Vec::new();
            stderr.read_to_end(&mut buf).await.map(|_| buf)
        };

        let ((), output, errors) = tokio::try_join!(writer, reader, err_reader)?;
        let status = child.wait().await?;

        if !status.success() {
            let stderr = String::from_utf8_lossy(&errors).trim().to_string();
            return Err(TranscodeError::Failed { status, stderr });
        }
        if output.is_empty() {
            return Err(TranscodeError::EmptyOutput);
        }

        Ok(Bytes::from(output))
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        audio: Bytes,
        target_sample_rate: u32,
    ) -> Result<Bytes, TranscodeError> {
        if audio.is_empty() {
            return Err(TranscodeError::EmptyInput);
        }

        let input_len = audio.len();
        let args = ffmpeg_args(target_sample_rate);

        match tokio::time::timeout(self.timeout, self.run(args, audio)).await {
            Ok(Ok(output)) => {
                tracing::debug!(
                    input_bytes = input_len,
                    output_bytes = output.len(),
                    sample_rate = target_sample_rate,
                    "Transcoded voice note"
                );
                Ok(output)
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Transcoding failed");
                Err(e)
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "Transcoding timed out");
                Err(TranscodeError::Timeout(self.timeout))
            }
        }
    }
}

/// Check that the configured binary can be executed at all.
pub async fn probe(binary: &str) -> Result<String, wabridge_core::BridgeError> {
    let output = Command::new(binary).arg("-version").output().await?;
    if !output.status.success() {
        return Err(wabridge_core::BridgeError::Other(format!(
            "{} -version exited with {}",
            binary, output.status
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(stdout.lines().next().unwrap_or_default().to_string())
}
