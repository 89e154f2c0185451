use caption_qa::{
    Result,
    caption::CaptionGenerator,
    config::Config,
    qa::{AnswerExtractor, QuestionSet},
    server::{self, handlers::AppState},
    session::SessionStore,
    shell::Shell,
};
use axum::Router;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use std::{io::Cursor, sync::Arc, time::Duration};
use tempfile::TempDir;
use tokio::fs;

pub const PASTA_CAPTION: &str = "a plate of pasta with tomato sauce";

pub const TEST_UPLOAD_LIMIT: usize = 1024 * 1024;

pub const BOUNDARY: &str = "caption-qa-test-boundary";

/// Create a test configuration with sensible defaults
pub fn create_test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.logs.level = "debug".to_string();
    config.inference.timeout_secs = 5;
    config
}

/// Create a temporary directory for test files
pub fn create_temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp directory")
}

/// Create a test config YAML file
pub async fn create_test_config_file(dir: &TempDir, content: &str) -> Result<String> {
    let config_path = dir.path().join("config.yaml");
    fs::write(&config_path, content).await?;
    Ok(config_path.to_string_lossy().to_string())
}

pub fn default_questions() -> QuestionSet {
    QuestionSet::new(caption_qa::config::default_questions())
}

pub fn create_test_shell(
    captioner: Arc<dyn CaptionGenerator>,
    extractor: Arc<dyn AnswerExtractor>,
) -> Shell {
    Shell::with_components(captioner, extractor, default_questions(), Duration::from_secs(5))
}

pub fn create_test_app(
    captioner: Arc<dyn CaptionGenerator>,
    extractor: Arc<dyn AnswerExtractor>,
) -> Router {
    let state = AppState {
        shell: Arc::new(create_test_shell(captioner, extractor)),
        sessions: Arc::new(SessionStore::new(Duration::from_secs(60))),
        max_upload_bytes: TEST_UPLOAD_LIMIT,
    };
    server::router(state)
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x * 10) as u8, (y * 10) as u8, 128, if x % 2 == 0 { 255 } else { 0 }])
    });
    encode(DynamicImage::ImageRgba8(image), ImageFormat::Png)
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbImage::from_pixel(width, height, Rgb([200, 60, 40]));
    encode(DynamicImage::ImageRgb8(image), ImageFormat::Jpeg)
}

pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), format)
        .expect("Failed to encode test image");
    buf
}

/// Builds a multipart/form-data body with a single file field.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={BOUNDARY}")
}

/// Sample configuration YAML for testing
pub const SAMPLE_CONFIG_YAML: &str = r#"
server:
  host: "127.0.0.1"
  port: 9090
  max_upload_bytes: 2097152
  session_ttl_secs: 600
  logs:
    level: "debug"

registry:
  token_env: "CAPTION_QA_TEST_TOKEN"
  cache_dir: "/tmp/caption-qa-models"

caption:
  model_id: "Salesforce/blip-image-captioning-large"
  variant: "large"
  max_new_tokens: 30

qa:
  model_id: "deepset/roberta-base-squad2"
  max_answer_len: 10
  min_score: 0.05

inference:
  timeout_secs: 30

questions:
  - "What are the ingredients?"
  - "What are the cooking actions?"
  - "What is on the plate?"
"#;

/// Minimal configuration relying on defaults
pub const MINIMAL_CONFIG_YAML: &str = r#"
server:
  port: 8081
"#;

/// Invalid configuration YAML for testing error cases
pub const INVALID_CONFIG_YAML: &str = r#"
server:
  host: "127.0.0.1"
  port: "not-a-number"
"#;
