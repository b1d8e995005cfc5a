// src/sources/play_store.rs
// Play Store reviews via the publisher API, authenticated with a service
// credential. App metadata is scraped from the public store page.

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use metrics::{counter, histogram};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::config::{ResolvedApp, SourceParams};
use crate::message::PlayStoreMessage;
use crate::review::{AppMetadata, FetchOutcome, Review};
use crate::sources::{filter_new, render_outcome, ReviewSource};

const DEFAULT_STORE_URL: &str = "https://play.google.com";
const DEFAULT_API_URL: &str = "https://androidpublisher.googleapis.com/androidpublisher/v3";
const DEFAULT_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const REVIEW_SCOPE: &str = "https://www.googleapis.com/auth/androidpublisher";
const TITLE_SUFFIX: &str = " - Apps on Google Play";

static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector"));
static OG_IMAGE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:image"]"#).expect("valid selector"));

#[derive(Debug, Deserialize)]
struct ServiceCredential {
    client_email: String,
    private_key: String,
    token_uri: Option<String>,
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ReviewsResponse {
    #[serde(default)]
    reviews: Vec<RawReview>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawReview {
    review_id: Option<String>,
    author_name: Option<String>,
    #[serde(default)]
    comments: Vec<RawComment>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawComment {
    user_comment: Option<RawUserComment>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUserComment {
    text: Option<String>,
    star_rating: Option<i32>,
    app_version_name: Option<String>,
    app_version_code: Option<i64>,
    android_os_version: Option<i64>,
    device_metadata: Option<RawDeviceMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDeviceMetadata {
    product_name: Option<String>,
}

// `scraper::Html` is not Send; parsing stays out of any await scope.
fn parse_store_page(app_id: &str, page_url: &str, body: &str) -> Result<AppMetadata> {
    let doc = Html::parse_document(body);
    let title = doc
        .select(&OG_TITLE)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default();
    if title.is_empty() {
        bail!("no store entry found for app {app_id}");
    }
    let name = title.strip_suffix(TITLE_SUFFIX).unwrap_or(title).to_string();
    let icon = doc
        .select(&OG_IMAGE)
        .next()
        .and_then(|el| el.value().attr("content"))
        .unwrap_or_default()
        .to_string();
    Ok(AppMetadata {
        name,
        icon,
        link: page_url.to_string(),
    })
}

fn parse_review(store_url: &str, app_id: &str, raw: RawReview) -> Review {
    let comment = raw
        .comments
        .into_iter()
        .find_map(|c| c.user_comment)
        .unwrap_or_default();
    let id = raw.review_id.unwrap_or_else(|| "NO_REVIEW_ID".into());
    let link = format!("{store_url}/store/apps/details?id={app_id}&reviewId={id}");
    Review {
        id,
        rating: comment.star_rating.unwrap_or(0),
        title: String::new(),
        text: comment.text.unwrap_or_else(|| "NO TEXT".into()),
        author: raw.author_name.unwrap_or_else(|| "NO_AUTHOR_NAME".into()),
        link,
        version: comment
            .app_version_name
            .unwrap_or_else(|| "NO_APP_VERSION".into()),
        version_code: Some(comment.app_version_code.unwrap_or(0)),
        device: comment.device_metadata.and_then(|d| d.product_name),
        os_version: comment.android_os_version,
        region: None,
    }
}

pub struct PlayStoreSource {
    store_url: String,
    api_url: String,
    client: reqwest::Client,
}

impl PlayStoreSource {
    pub fn new() -> Self {
        Self::with_base_urls(DEFAULT_STORE_URL, DEFAULT_API_URL)
    }

    /// Point the source at different hosts. Tests use this with a local
    /// mock server.
    pub fn with_base_urls(store_url: impl Into<String>, api_url: impl Into<String>) -> Self {
        Self {
            store_url: store_url.into(),
            api_url: api_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn fetch_metadata(&self, app_id: &str) -> Result<AppMetadata> {
        let url = format!("{}/store/apps/details?id={}&hl=en", self.store_url, app_id);
        let body = self
            .client
            .get(&url)
            .send()
            .await
            .context("play store page get()")?
            .error_for_status()
            .context("play store page status")?
            .text()
            .await
            .context("play store page body")?;
        parse_store_page(app_id, &url, &body)
    }

    /// Service-account flow: sign a short-lived assertion with the
    /// credential's key, trade it for a bearer token.
    async fn access_token(&self, key_path: &Path) -> Result<String> {
        let raw = tokio::fs::read_to_string(key_path)
            .await
            .with_context(|| format!("reading publisher key {}", key_path.display()))?;
        let credential: ServiceCredential =
            serde_json::from_str(&raw).context("parsing publisher key json")?;

        let token_uri = credential.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URL);
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            iss: &credential.client_email,
            scope: REVIEW_SCOPE,
            aud: token_uri,
            iat: now,
            exp: now + 3600,
        };
        let key = EncodingKey::from_rsa_pem(credential.private_key.as_bytes())
            .context("parsing publisher key pem")?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .context("signing token assertion")?;

        let resp: TokenResponse = self
            .client
            .post(token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .context("token exchange post()")?
            .error_for_status()
            .context("token exchange status")?
            .json()
            .await
            .context("token exchange decode")?;
        Ok(resp.access_token)
    }

    /// Credential and API failures degrade to an empty result for this app;
    /// only the store page lookup is load-bearing.
    async fn fetch_reviews(&self, app: &ResolvedApp, key_path: &Path) -> Vec<Review> {
        match self.try_fetch_reviews(&app.id, key_path).await {
            Ok(reviews) => reviews,
            Err(e) => {
                if app.verbose {
                    tracing::warn!(
                        app = %app.id,
                        error = ?e,
                        "play store review fetch failed; continuing with none"
                    );
                }
                counter!("review_page_errors_total").increment(1);
                Vec::new()
            }
        }
    }

    async fn try_fetch_reviews(&self, app_id: &str, key_path: &Path) -> Result<Vec<Review>> {
        let token = self.access_token(key_path).await?;
        let url = format!("{}/applications/{}/reviews", self.api_url, app_id);
        let resp: ReviewsResponse = self
            .client
            .get(&url)
            .bearer_auth(&token)
            .send()
            .await
            .context("play reviews get()")?
            .error_for_status()
            .context("play reviews status")?
            .json()
            .await
            .context("play reviews decode")?;
        Ok(resp
            .reviews
            .into_iter()
            .map(|raw| parse_review(&self.store_url, app_id, raw))
            .collect())
    }
}

impl Default for PlayStoreSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReviewSource for PlayStoreSource {
    async fn fetch_new(&self, app: &ResolvedApp, seen: &[String]) -> Result<FetchOutcome> {
        let SourceParams::PlayStore { publisher_key } = &app.params else {
            bail!("app {} is not configured for the Play Store", app.id);
        };

        let t0 = Instant::now();
        let meta = self.fetch_metadata(&app.id).await?;
        let fetched = self.fetch_reviews(app, publisher_key).await;

        histogram!("review_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("reviews_fetched_total").increment(fetched.len() as u64);

        let fetched_count = fetched.len();
        let fresh = filter_new(fetched, seen);
        counter!("reviews_suppressed_total").increment((fetched_count - fresh.len()) as u64);
        counter!("reviews_new_total").increment(fresh.len() as u64);

        if app.verbose {
            tracing::info!(
                app = %app.id,
                fetched = fetched_count,
                new = fresh.len(),
                "play store fetch complete"
            );
        }

        Ok(render_outcome(fresh, &meta, app, &PlayStoreMessage))
    }

    fn name(&self) -> &'static str {
        "Play Store"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_page_metadata_comes_from_og_tags() {
        let html = r#"<html><head>
            <meta property="og:title" content="Example App - Apps on Google Play">
            <meta property="og:image" content="https://play.example/icon.png">
            </head><body></body></html>"#;
        let meta = parse_store_page("com.example.app", "https://play.example/d", html).unwrap();
        assert_eq!(meta.name, "Example App");
        assert_eq!(meta.icon, "https://play.example/icon.png");
        assert_eq!(meta.link, "https://play.example/d");
    }

    #[test]
    fn store_page_title_survives_without_the_suffix() {
        let html = r#"<meta property="og:title" content="Example App">"#;
        let meta = parse_store_page("com.example.app", "u", html).unwrap();
        assert_eq!(meta.name, "Example App");
        assert!(meta.icon.is_empty());
    }

    #[test]
    fn store_page_without_a_title_is_an_error() {
        let err = parse_store_page("com.example.app", "u", "<html></html>").unwrap_err();
        assert!(err.to_string().contains("no store entry found"));
    }

    #[test]
    fn missing_review_fields_become_sentinels() {
        let raw: RawReview = serde_json::from_str("{}").unwrap();
        let review = parse_review("https://play.example", "com.example.app", raw);
        assert_eq!(review.id, "NO_REVIEW_ID");
        assert_eq!(review.rating, 0);
        assert_eq!(review.text, "NO TEXT");
        assert_eq!(review.author, "NO_AUTHOR_NAME");
        assert_eq!(review.version, "NO_APP_VERSION");
        assert_eq!(review.version_code, Some(0));
        assert!(review.device.is_none());
        assert!(review.os_version.is_none());
        assert_eq!(
            review.link,
            "https://play.example/store/apps/details?id=com.example.app&reviewId=NO_REVIEW_ID"
        );
    }

    #[test]
    fn full_review_fields_pass_through() {
        let raw: RawReview = serde_json::from_str(
            r#"{
                "reviewId": "r9",
                "authorName": "Alex",
                "comments": [{"userComment": {
                    "text": "Solid",
                    "starRating": 4,
                    "appVersionName": "2.0.1",
                    "appVersionCode": 201,
                    "androidOsVersion": 34,
                    "deviceMetadata": {"productName": "Pixel 8"}
                }}]
            }"#,
        )
        .unwrap();
        let review = parse_review("https://play.example", "com.example.app", raw);
        assert_eq!(review.id, "r9");
        assert_eq!(review.rating, 4);
        assert_eq!(review.text, "Solid");
        assert_eq!(review.author, "Alex");
        assert_eq!(review.version, "2.0.1");
        assert_eq!(review.version_code, Some(201));
        assert_eq!(review.device.as_deref(), Some("Pixel 8"));
        assert_eq!(review.os_version, Some(34));
        assert!(review.title.is_empty());
        assert!(review.region.is_none());
    }
}
