use std::env;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use easel_contracts::request::GenerationRequest;
use image::{DynamicImage, Rgb, RgbImage};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

pub const TOKEN_ENV: &str = "HUGGINGFACE_TOKEN";

const DEFAULT_API_BASE: &str = "https://api-inference.huggingface.co";
const ERROR_BODY_MAX_CHARS: usize = 512;

pub const AUTH_FAILURE_MESSAGE: &str =
    "Authentication failed. Please check your HuggingFace token and ensure it has 'Write' permissions.";
pub const RATE_LIMIT_MESSAGE: &str =
    "Rate limit exceeded. Please wait a moment and try again. Free tier has limited requests.";
pub const MODEL_LOADING_MESSAGE: &str =
    "Model is currently loading. Please wait 20-30 seconds and try again.";
pub const TIMEOUT_MESSAGE: &str =
    "Request timed out. The model might be busy. Please try again.";

/// A decoded generation result.
#[derive(Debug, Clone)]
pub struct GeneratedImage {
    pub image: DynamicImage,
    pub width: u32,
    pub height: u32,
    pub mime_type: Option<String>,
}

/// Exactly one variant per attempt: the decoded image, or a message already
/// classified for display.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    Success(GeneratedImage),
    Failure { message: String },
}

pub trait ImageBackend {
    fn name(&self) -> &str;
    fn generate(&self, request: &GenerationRequest) -> GenerationOutcome;
}

/// Blocking client for the HuggingFace text-to-image inference endpoint.
///
/// Holding the token is a construction-time requirement; a missing credential
/// surfaces once at startup via [`HuggingFaceBackend::from_env`], never
/// mid-request. Each `generate` issues exactly one call; retries are the
/// user's manual re-submit.
pub struct HuggingFaceBackend {
    api_base: String,
    token: String,
    http: HttpClient,
}

impl HuggingFaceBackend {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            api_base: env::var("HF_API_BASE")
                .ok()
                .map(|value| value.trim().trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            token: token.into(),
            http: HttpClient::new(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let Some(token) = non_empty_env(TOKEN_ENV) else {
            bail!("{TOKEN_ENV} not set");
        };
        Ok(Self::new(token))
    }

    fn model_endpoint(&self, model: &str) -> String {
        format!("{}/models/{}", self.api_base, model)
    }

    fn call(&self, request: &GenerationRequest) -> Result<GeneratedImage> {
        let endpoint = self.model_endpoint(&request.model);
        let payload = inference_payload(request);

        let response = match self
            .http
            .post(&endpoint)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                bail!("connection timeout while contacting HuggingFace ({endpoint})")
            }
            Err(err) => {
                return Err(anyhow::Error::new(err))
                    .with_context(|| format!("HuggingFace request failed ({endpoint})"))
            }
        };

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let body = response.text().unwrap_or_default();
            bail!(
                "HuggingFace request failed ({code}): {}",
                truncate_text(&body, ERROR_BODY_MAX_CHARS)
            );
        }

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .context("failed reading HuggingFace image bytes")?
            .to_vec();
        let image = image::load_from_memory(&bytes)
            .context("HuggingFace returned an undecodable image payload")?;

        Ok(GeneratedImage {
            width: image.width(),
            height: image.height(),
            mime_type,
            image,
        })
    }
}

impl ImageBackend for HuggingFaceBackend {
    fn name(&self) -> &str {
        "huggingface"
    }

    fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        match self.call(request) {
            Ok(image) => GenerationOutcome::Success(image),
            Err(err) => GenerationOutcome::Failure {
                message: classify_api_error(&truncate_text(
                    &format!("{err:#}"),
                    ERROR_BODY_MAX_CHARS,
                )),
            },
        }
    }
}

/// Offline stand-in: a flat color derived from the prompt, at the requested
/// dimensions. Used by `--dry-run` and the end-to-end tests.
pub struct DryRunBackend;

impl ImageBackend for DryRunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate(&self, request: &GenerationRequest) -> GenerationOutcome {
        let (r, g, b) = color_from_prompt(&request.prompt);
        let mut canvas = RgbImage::new(request.width, request.height);
        for pixel in canvas.pixels_mut() {
            *pixel = Rgb([r, g, b]);
        }
        GenerationOutcome::Success(GeneratedImage {
            width: request.width,
            height: request.height,
            mime_type: None,
            image: DynamicImage::ImageRgb8(canvas),
        })
    }
}

fn inference_payload(request: &GenerationRequest) -> Value {
    let mut parameters = Map::new();
    parameters.insert("width".to_string(), Value::Number(request.width.into()));
    parameters.insert("height".to_string(), Value::Number(request.height.into()));
    if let Some(negative) = request.negative_prompt.as_deref() {
        parameters.insert(
            "negative_prompt".to_string(),
            Value::String(negative.to_string()),
        );
    }
    json!({
        "inputs": request.prompt,
        "parameters": parameters,
    })
}

/// Reduces a raw provider failure to a stable user-facing message.
///
/// First match wins; the order is part of the contract with the provider's
/// error vocabulary ("401 timeout" is an authentication failure).
pub fn classify_api_error(raw: &str) -> String {
    let lowered = raw.to_ascii_lowercase();
    if lowered.contains("401") || lowered.contains("unauthorized") {
        AUTH_FAILURE_MESSAGE.to_string()
    } else if lowered.contains("429") || lowered.contains("rate limit") {
        RATE_LIMIT_MESSAGE.to_string()
    } else if lowered.contains("503") || lowered.contains("service unavailable") {
        MODEL_LOADING_MESSAGE.to_string()
    } else if lowered.contains("timeout") {
        TIMEOUT_MESSAGE.to_string()
    } else {
        format!("Error generating image: {raw}")
    }
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, image::ImageFormat::Png)
        .context("failed to encode image as PNG")?;
    Ok(buffer.into_inner())
}

/// `ai_generated_<YYYYMMDD_HHMMSS>.png`, stamped at save time.
pub fn download_file_name() -> String {
    file_name_for(Local::now())
}

/// Compact local timestamp used for session identifiers.
pub fn session_stamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

fn file_name_for(timestamp: DateTime<Local>) -> String {
    format!("ai_generated_{}.png", timestamp.format("%Y%m%d_%H%M%S"))
}

/// Writes PNG bytes under `dir` with a fresh timestamped name.
pub fn save_artifact(dir: &Path, png: &[u8]) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(download_file_name());
    fs::write(&path, png).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

pub fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

fn color_from_prompt(prompt: &str) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

#[cfg(test)]
mod tests {
    use easel_contracts::presets::SizeOption;
    use easel_contracts::request::build_request;
    use serde_json::Value;

    use super::{
        classify_api_error, encode_png, file_name_for, inference_payload, save_artifact,
        truncate_text, DryRunBackend, GenerationOutcome, ImageBackend,
        AUTH_FAILURE_MESSAGE, MODEL_LOADING_MESSAGE, RATE_LIMIT_MESSAGE, TIMEOUT_MESSAGE,
    };

    fn square() -> SizeOption {
        SizeOption {
            name: "Square (512x512)".to_string(),
            width: 512,
            height: 512,
        }
    }

    #[test]
    fn classifier_covers_the_provider_vocabulary() {
        assert_eq!(classify_api_error("Error 401: unauthorized"), AUTH_FAILURE_MESSAGE);
        assert_eq!(classify_api_error("Unauthorized access"), AUTH_FAILURE_MESSAGE);
        assert_eq!(classify_api_error("429 too many requests"), RATE_LIMIT_MESSAGE);
        assert_eq!(classify_api_error("Rate Limit reached"), RATE_LIMIT_MESSAGE);
        assert_eq!(classify_api_error("Service Unavailable 503"), MODEL_LOADING_MESSAGE);
        assert_eq!(classify_api_error("connection timeout"), TIMEOUT_MESSAGE);
    }

    #[test]
    fn classifier_priority_order_is_binding() {
        // Both rules match; authentication wins because its rule comes first.
        assert_eq!(classify_api_error("401 timeout"), AUTH_FAILURE_MESSAGE);
        assert_eq!(classify_api_error("rate limit timeout 429"), RATE_LIMIT_MESSAGE);
    }

    #[test]
    fn classifier_falls_back_to_the_raw_text() {
        let message = classify_api_error("weird glitch xyz");
        assert_eq!(message, "Error generating image: weird glitch xyz");
    }

    #[test]
    fn payload_omits_absent_negative_prompt() {
        let request = build_request("a boat", None, &square(), "test-model").unwrap();
        let payload = inference_payload(&request);
        assert_eq!(payload["inputs"], Value::String("a boat".to_string()));
        assert_eq!(payload["parameters"]["width"], Value::Number(512.into()));
        assert!(payload["parameters"].get("negative_prompt").is_none());
    }

    #[test]
    fn payload_carries_trimmed_negative_prompt() {
        let request = build_request("a boat", Some(" blurry "), &square(), "test-model").unwrap();
        let payload = inference_payload(&request);
        assert_eq!(
            payload["parameters"]["negative_prompt"],
            Value::String("blurry".to_string())
        );
    }

    #[test]
    fn dry_run_backend_honors_requested_dimensions() {
        let size = SizeOption {
            name: "Portrait (512x768)".to_string(),
            width: 512,
            height: 768,
        };
        let request = build_request("a boat", None, &size, "test-model").unwrap();
        match DryRunBackend.generate(&request) {
            GenerationOutcome::Success(generated) => {
                assert_eq!(generated.width, 512);
                assert_eq!(generated.height, 768);
                assert_eq!(generated.image.width(), 512);
                assert_eq!(generated.image.height(), 768);
            }
            GenerationOutcome::Failure { message } => panic!("dry run failed: {message}"),
        }
    }

    #[test]
    fn png_export_round_trips_through_the_decoder() -> anyhow::Result<()> {
        let request = build_request("a boat", None, &square(), "test-model").unwrap();
        let GenerationOutcome::Success(generated) = DryRunBackend.generate(&request) else {
            panic!("dry run failed");
        };
        let png = encode_png(&generated.image)?;
        let decoded = image::load_from_memory(&png)?;
        assert_eq!(decoded.width(), 512);
        assert_eq!(decoded.height(), 512);
        Ok(())
    }

    #[test]
    fn download_name_embeds_the_timestamp() {
        use chrono::TimeZone;
        let timestamp = chrono::Local.with_ymd_and_hms(2024, 1, 31, 9, 30, 15).unwrap();
        assert_eq!(file_name_for(timestamp), "ai_generated_20240131_093015.png");
    }

    #[test]
    fn save_artifact_writes_a_timestamped_png() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let dir = temp.path().join("artifacts");
        let path = save_artifact(&dir, &[1, 2, 3])?;
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or("");
        assert!(name.starts_with("ai_generated_"));
        assert!(name.ends_with(".png"));
        assert_eq!(std::fs::read(&path)?, vec![1, 2, 3]);
        Ok(())
    }

    #[test]
    fn truncation_keeps_short_text_intact() {
        assert_eq!(truncate_text("short", 512), "short");
        let long = "x".repeat(600);
        let truncated = truncate_text(&long, 512);
        assert_eq!(truncated.chars().count(), 513);
        assert!(truncated.ends_with('…'));
    }
}
