use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::StageError;

use super::{OcrBackend, OcrFuture, PreparedImage, RawTextRun};

const TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";
const OCR_URL: &str = "https://aip.baidubce.com/rest/2.0/ocr/v1/general";
const TOKEN_TIMEOUT: Duration = Duration::from_secs(10);
const OCR_TIMEOUT: Duration = Duration::from_secs(30);
/// Tokens are refreshed this long before the provider says they expire.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(30 * 24 * 3600);
/// Confidence assumed when the provider omits per-run probabilities.
const DEFAULT_CONFIDENCE: f32 = 0.9;
const INVALID_TOKEN_CODES: [i64; 2] = [110, 111];

#[derive(Debug, Clone)]
pub struct BaiduCredentials {
    pub api_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Baidu general OCR (with locations). Cloning shares the token cache.
#[derive(Debug, Clone)]
pub struct BaiduOcr {
    credentials: BaiduCredentials,
    client: reqwest::Client,
    token: Arc<Mutex<Option<CachedToken>>>,
    token_url: String,
    ocr_url: String,
}

impl BaiduOcr {
    pub fn new(credentials: BaiduCredentials) -> Result<Self> {
        if credentials.api_key.trim().is_empty() || credentials.secret_key.trim().is_empty() {
            return Err(anyhow!("baidu ocr api key and secret key are required"));
        }
        let client = reqwest::Client::builder()
            .build()
            .with_context(|| "failed to build http client")?;
        Ok(Self {
            credentials,
            client,
            token: Arc::new(Mutex::new(None)),
            token_url: TOKEN_URL.to_string(),
            ocr_url: OCR_URL.to_string(),
        })
    }

    pub fn with_endpoints(mut self, token_url: impl Into<String>, ocr_url: impl Into<String>) -> Self {
        self.token_url = token_url.into();
        self.ocr_url = ocr_url.into();
        self
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock().ok()?;
        guard
            .as_ref()
            .filter(|token| Instant::now() < token.refresh_at)
            .map(|token| token.value.clone())
    }

    fn invalidate_token(&self) {
        if let Ok(mut guard) = self.token.lock() {
            *guard = None;
        }
    }

    /// Returns a valid token, fetching one when the cache is empty or stale.
    /// Concurrent callers may both fetch; the last writer wins.
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        let response = self
            .client
            .post(&self.token_url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.api_key.as_str()),
                ("client_secret", self.credentials.secret_key.as_str()),
            ])
            .timeout(TOKEN_TIMEOUT)
            .send()
            .await
            .with_context(|| "baidu token request failed")?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(anyhow!("baidu token request failed ({}): {}", status, text));
        }
        let payload: TokenResponse =
            serde_json::from_str(&text).with_context(|| "failed to parse baidu token response")?;
        let Some(value) = payload.access_token else {
            return Err(anyhow!(
                "baidu token response has no access_token: {}",
                payload.error_description.unwrap_or(text)
            ));
        };
        let ttl = payload
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let refresh_at = Instant::now() + ttl.saturating_sub(TOKEN_REFRESH_MARGIN);
        if let Ok(mut guard) = self.token.lock() {
            *guard = Some(CachedToken {
                value: value.clone(),
                refresh_at,
            });
        }
        info!("baidu access token refreshed (ttl {}s)", ttl.as_secs());
        Ok(value)
    }

    async fn recognize_prepared(&self, image: &PreparedImage) -> Result<Vec<RawTextRun>, StageError> {
        let token = self.access_token().await.map_err(StageError::ocr)?;
        let form = [
            ("image", image.base64.as_str()),
            ("recognize_granularity", "small"),
            ("probability", "true"),
        ];
        let response = self
            .client
            .post(&self.ocr_url)
            .query(&[("access_token", token.as_str())])
            .form(&form)
            .timeout(OCR_TIMEOUT)
            .send()
            .await
            .map_err(StageError::ocr)?;
        let status = response.status();
        let text = response.text().await.map_err(StageError::ocr)?;
        if !status.is_success() {
            return Err(StageError::Ocr(format!("http {}: {}", status, text)));
        }
        let runs = parse_ocr_response(&text);
        if let Err(StageError::OcrProvider { code, .. }) = &runs {
            if INVALID_TOKEN_CODES.contains(code) {
                warn!("baidu rejected cached token (code {}), dropping it", code);
                self.invalidate_token();
            }
        }
        runs
    }
}

impl OcrBackend for BaiduOcr {
    fn name(&self) -> &str {
        "baidu"
    }

    fn recognize<'a>(&'a self, image: &'a PreparedImage) -> OcrFuture<'a> {
        Box::pin(self.recognize_prepared(image))
    }
}

pub(crate) fn parse_ocr_response(text: &str) -> Result<Vec<RawTextRun>, StageError> {
    let payload: OcrResponse = serde_json::from_str(text)
        .map_err(|err| StageError::Ocr(format!("failed to parse ocr response: {}", err)))?;
    if let Some(code) = payload.error_code {
        return Err(StageError::OcrProvider {
            code,
            message: payload
                .error_msg
                .unwrap_or_else(|| "unknown error".to_string()),
        });
    }
    debug!("baidu raw result count: {}", payload.words_result.len());
    Ok(payload
        .words_result
        .into_iter()
        .map(|item| RawTextRun {
            text: item.words,
            left: item.location.left,
            top: item.location.top,
            width: item.location.width,
            height: item.location.height,
            confidence: item
                .probability
                .map(|prob| prob.average)
                .unwrap_or(DEFAULT_CONFIDENCE),
        })
        .collect())
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    error_code: Option<i64>,
    error_msg: Option<String>,
    #[serde(default)]
    words_result: Vec<WordsResult>,
}

#[derive(Debug, Deserialize)]
struct WordsResult {
    #[serde(default)]
    words: String,
    #[serde(default)]
    location: Location,
    probability: Option<Probability>,
}

#[derive(Debug, Default, Deserialize)]
struct Location {
    #[serde(default)]
    left: f64,
    #[serde(default)]
    top: f64,
    #[serde(default)]
    width: f64,
    #[serde(default)]
    height: f64,
}

#[derive(Debug, Deserialize)]
struct Probability {
    average: f32,
}
