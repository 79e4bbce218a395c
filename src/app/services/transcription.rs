//! Vision generation-service collaborator
//!
//! Wraps the external vision-capable text-generation API behind a small
//! trait: give it a rendered page image, get back a free-text table
//! transcription. Transport failures are classified into retryable and
//! non-retryable service errors; everything about interpreting the returned
//! text lives in the transcript parser, not here.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::ServiceConfig;
use crate::constants::SERVICE_API_VERSION;
use crate::{Error, Result};

/// Fixed instruction template sent with every page image
///
/// The ditto-handling and postmaster rules are delegated to the service so
/// its transcription arrives already resolved; the validator still checks
/// for leftovers.
pub const EXTRACTION_INSTRUCTIONS: &str = "\
Extract tabular data from the image into CSV format with the following specifications:
1. The image shows employee records organized by state
2. Each employee row contains: Name, Where born, Whence appointed, Post-office, Compensation per annum
3. Add \"State\" as a sixth column for each row based on the state headings
4. Handle special cases:
   - Replace \"do\" values with the value from the cell above
   - Replace dotted lines with empty values
   - When 'p.m.' is included in salary add 1 to a seventh column called 'Postmaster' and leave it as 0 otherwise
5. Ensure proper field separation with commas
6. Include a header row with the column names
7. Include all data from the image with no rows or columns omitted
Output format: Raw CSV only, no explanations, no markdown formatting";

/// A rendered page handed to the service
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Encoded image bytes
    pub data: Vec<u8>,

    /// MIME type of `data` ("image/png", "image/jpeg")
    pub media_type: String,
}

impl PageImage {
    /// Wrap PNG bytes
    pub fn png(data: Vec<u8>) -> Self {
        Self {
            data,
            media_type: "image/png".to_string(),
        }
    }

    /// Infer the media type from a file extension, defaulting to PNG
    pub fn from_bytes(data: Vec<u8>, extension: Option<&str>) -> Self {
        let media_type = match extension.map(|e| e.to_ascii_lowercase()).as_deref() {
            Some("jpg") | Some("jpeg") => "image/jpeg",
            _ => "image/png",
        };
        Self {
            data,
            media_type: media_type.to_string(),
        }
    }
}

/// External transcription capability: page image in, free text out
///
/// Service failures surface as [`Error::ServiceRequest`] with the retryable
/// flag set for transient conditions.
pub trait TranscriptionService {
    /// Request one transcription of one page
    fn transcribe_page(
        &self,
        image: &PageImage,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

impl<T: TranscriptionService + Sync> TranscriptionService for &T {
    fn transcribe_page(
        &self,
        image: &PageImage,
    ) -> impl std::future::Future<Output = Result<String>> + Send {
        (**self).transcribe_page(image)
    }
}

/// HTTP client for the vision messages API
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    max_tokens: u32,
}

impl VisionClient {
    /// Create a client from service configuration, reading the API key from
    /// the configured environment variable
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            Error::configuration(format!(
                "Service API key environment variable '{}' is not set",
                config.api_key_env
            ))
        })?;

        Ok(Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Pull the first text block out of a messages-API response body
    fn extract_text(body: &serde_json::Value) -> Result<String> {
        body.get("content")
            .and_then(|c| c.as_array())
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find_map(|b| b.get("text").and_then(|t| t.as_str()))
            })
            .map(|s| s.to_string())
            .ok_or_else(|| {
                Error::service_request("Response contained no text content block", false)
            })
    }
}

impl TranscriptionService for VisionClient {
    async fn transcribe_page(&self, image: &PageImage) -> Result<String> {
        let encoded = BASE64.encode(&image.data);

        let body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        { "type": "text", "text": EXTRACTION_INSTRUCTIONS },
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": image.media_type,
                                "data": encoded
                            }
                        }
                    ]
                }
            ]
        });

        debug!(
            "Requesting transcription from {} (model {}, {} image bytes)",
            self.api_base,
            self.model,
            image.data.len()
        );

        let response = self
            .http
            .post(&self.api_base)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", SERVICE_API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!("Service returned status {}: {}", status, detail);
            // Rate limits, overload, and server-side failures are transient;
            // authentication and request-shape failures are not.
            let retryable = status.as_u16() == 429 || status.is_server_error();
            return Err(Error::service_request(
                format!("Service returned status {}: {}", status, detail),
                retryable,
            ));
        }

        let parsed: serde_json::Value = response.json().await?;
        Self::extract_text(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_image_media_types() {
        let png = PageImage::from_bytes(vec![1, 2, 3], Some("png"));
        assert_eq!(png.media_type, "image/png");

        let jpeg = PageImage::from_bytes(vec![1, 2, 3], Some("JPG"));
        assert_eq!(jpeg.media_type, "image/jpeg");

        let unknown = PageImage::from_bytes(vec![1, 2, 3], None);
        assert_eq!(unknown.media_type, "image/png");
    }

    #[test]
    fn test_extract_text_from_response() {
        let body = serde_json::json!({
            "content": [
                { "type": "text", "text": "Name,State\nSmith,Ohio" }
            ]
        });
        assert_eq!(
            VisionClient::extract_text(&body).unwrap(),
            "Name,State\nSmith,Ohio"
        );
    }

    #[test]
    fn test_extract_text_missing_block() {
        let body = serde_json::json!({ "content": [] });
        assert!(VisionClient::extract_text(&body).is_err());

        let body = serde_json::json!({});
        assert!(VisionClient::extract_text(&body).is_err());
    }

    #[test]
    fn test_instructions_mention_all_columns() {
        for column in crate::constants::ROSTER_COLUMN_NAMES {
            assert!(
                EXTRACTION_INSTRUCTIONS.contains(column),
                "instructions missing column {}",
                column
            );
        }
        assert!(EXTRACTION_INSTRUCTIONS.contains("State"));
        assert!(EXTRACTION_INSTRUCTIONS.contains("Postmaster"));
    }
}
