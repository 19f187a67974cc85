use lazy_static::lazy_static;
use regex::Regex;
use scraper::Html;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::metrics::FETCH_ERRORS;

// Positive signals needed before a site counts as WordPress
pub const MIN_SIGNALS: usize = 2;

lazy_static! {
    static ref ASSET_PATH: Regex = Regex::new(r"wp-content|wp-includes").unwrap();
    static ref THEME_OR_PLUGIN_PATH: Regex = Regex::new(r"themes/[^/]+/|plugins/[^/]+/").unwrap();
}

#[derive(Debug, Clone)]
pub struct DetectorConfig {
    pub user_agent: String,
    pub fetch_timeout: Duration,
    pub probe_timeout: Duration,
}

/// Individual heuristics evaluated against one page.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Signals {
    pub asset_path: bool,
    pub generator_meta: bool,
    pub rest_api_link: bool,
    pub theme_or_plugin_path: bool,
    pub rss_feed_link: bool,
    pub wp_json_path: bool,
    /// `None` when the wp-admin probe could not be made at all.
    pub admin_path: Option<bool>,
}

impl Signals {
    /// Evaluates the content signals. `admin_path` is left unset.
    pub fn scan(html: &str) -> Self {
        let document = Html::parse_document(html);

        let mut generator_meta = false;
        let mut rest_api_link = false;
        let mut rss_feed_link = false;

        for node in document.tree.nodes() {
            let Some(el) = node.value().as_element() else {
                continue;
            };
            match el.name() {
                "meta" => {
                    if el.attr("name") == Some("generator")
                        && el
                            .attr("content")
                            .is_some_and(|c| c.to_lowercase().contains("wordpress"))
                    {
                        generator_meta = true;
                    }
                }
                "link" => {
                    // rel is a token list, match any single token
                    if el
                        .attr("rel")
                        .is_some_and(|rel| rel.split_whitespace().any(|t| t == "https://api.w.org/"))
                    {
                        rest_api_link = true;
                    }
                    if el.attr("type") == Some("application/rss+xml") {
                        rss_feed_link = true;
                    }
                }
                _ => {}
            }
        }

        Self {
            asset_path: ASSET_PATH.is_match(html),
            generator_meta,
            rest_api_link,
            theme_or_plugin_path: THEME_OR_PLUGIN_PATH.is_match(html),
            rss_feed_link,
            wp_json_path: html.contains("/wp-json/"),
            admin_path: None,
        }
    }

    pub fn count(&self) -> usize {
        [
            self.asset_path,
            self.generator_meta,
            self.rest_api_link,
            self.theme_or_plugin_path,
            self.rss_feed_link,
            self.wp_json_path,
            self.admin_path.unwrap_or(false),
        ]
        .into_iter()
        .filter(|s| *s)
        .count()
    }

    // Threshold stays the same whether six or seven signals were evaluated
    pub fn is_wordpress(&self) -> bool {
        self.count() >= MIN_SIGNALS
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

#[derive(Clone)]
pub struct Detector {
    page_client: reqwest::Client,
    probe_client: reqwest::Client,
}

impl Detector {
    pub fn new(config: &DetectorConfig) -> Result<Self, reqwest::Error> {
        let page_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.fetch_timeout)
            .build()?;

        // A redirect away from wp-admin is itself evidence, so don't follow it
        let probe_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.probe_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            page_client,
            probe_client,
        })
    }

    /// Returns the verdict for `url`. Fetch failures count as "not WordPress".
    pub async fn detect(&self, url: &str) -> bool {
        match self.inspect(url).await {
            Ok(signals) => {
                debug!(url, ?signals, count = signals.count(), "signals evaluated");
                signals.is_wordpress()
            }
            Err(e) => {
                FETCH_ERRORS.inc();
                warn!(url, error = %e, "error checking WordPress");
                false
            }
        }
    }

    pub async fn inspect(&self, url: &str) -> Result<Signals, FetchError> {
        let html = self.fetch_page(url).await?;
        let mut signals = Signals::scan(&html);

        signals.admin_path = match self.probe_admin(url).await {
            Ok(found) => Some(found),
            Err(e) => {
                debug!(url, error = %e, "wp-admin probe skipped");
                None
            }
        };

        Ok(signals)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        let res = self.page_client.get(url).send().await?.error_for_status()?;
        Ok(res.text().await?)
    }

    // Ok(true) for any status other than 404
    async fn probe_admin(&self, url: &str) -> Result<bool, FetchError> {
        let admin_url = Url::parse(url)?.join("wp-admin")?;
        let res = self.probe_client.head(admin_url).send().await?;
        Ok(res.status() != reqwest::StatusCode::NOT_FOUND)
    }
}
