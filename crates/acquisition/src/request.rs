//! Free-text request parsing.
//!
//! A language-model parser is tried first; on any failure or timeout the
//! keyword parser is used instead, so parsing itself never fails a job.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::catalog::DatasetKind;
use crate::error::{AcquisitionError, Result};

/// Location and datasets extracted from a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedRequest {
    pub location: String,
    pub datasets: Vec<DatasetKind>,
}

impl ParsedRequest {
    /// Hints for the caller when the request looks underspecified.
    pub fn clarifications(&self) -> Vec<String> {
        let mut hints = Vec::new();
        if self.location.split_whitespace().count() < 2 {
            hints.push("Please specify which city or region you need data for.".to_string());
        }
        if self.datasets.len() == DatasetKind::ALL.len() {
            hints.push("Would you like all data types or specific ones?".to_string());
        }
        hints
    }
}

#[async_trait]
pub trait RequestParser: Send + Sync {
    async fn parse(&self, prompt: &str) -> Result<ParsedRequest>;
}

const KEYWORDS: [(DatasetKind, &[&str]); 5] = [
    (
        DatasetKind::LandCover,
        &["land cover", "land use", "lulc", "nlcd", "landcover"],
    ),
    (
        DatasetKind::TreeCover,
        &["tree cover", "tree canopy", "canopy", "forest", "trees"],
    ),
    (
        DatasetKind::Ndvi,
        &["ndvi", "vegetation", "greenness", "vegetation index"],
    ),
    (
        DatasetKind::Population,
        &["population", "pop", "people", "demographic", "census"],
    ),
    (
        DatasetKind::Basemap,
        &["basemap", "satellite", "imagery", "map", "rgb", "true color", "aerial"],
    ),
];

/// Keyword matching. Location is the last three words of the prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordParser;

impl KeywordParser {
    pub fn parse_prompt(&self, prompt: &str) -> ParsedRequest {
        let lower = prompt.to_lowercase();

        let words: Vec<&str> = prompt.split_whitespace().collect();
        let location = words[words.len().saturating_sub(3)..].join(" ");

        let mut datasets: Vec<DatasetKind> = KEYWORDS
            .iter()
            .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
            .map(|(kind, _)| *kind)
            .collect();
        if datasets.is_empty() {
            datasets = DatasetKind::ALL.to_vec();
        }

        ParsedRequest { location, datasets }
    }
}

#[async_trait]
impl RequestParser for KeywordParser {
    async fn parse(&self, prompt: &str) -> Result<ParsedRequest> {
        Ok(self.parse_prompt(prompt))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// OpenAI-compatible API base.
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout_secs: 30,
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a geographic data extraction assistant. \
Extract the city or region name and the requested data types from the user's request. \
Available data types: land_cover (land use/land cover), tree_cover (tree canopy cover), \
ndvi (vegetation index), population (population density), basemap (true-color satellite imagery). \
If no specific types are mentioned, include all of them. \
Reply strictly with a JSON object: {\"city\": \"<city name>\", \"data_types\": [\"...\"]}";

#[derive(Debug, Deserialize)]
struct Extraction {
    city: String,
    #[serde(default)]
    data_types: Vec<String>,
}

/// Chat-completion parser with keyword fallback.
pub struct LlmRequestParser {
    client: Client,
    config: ParserConfig,
    fallback: KeywordParser,
}

impl LlmRequestParser {
    pub fn new(config: ParserConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AcquisitionError::config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            fallback: KeywordParser,
        })
    }

    async fn ask(&self, prompt: &str) -> Result<ParsedRequest> {
        let key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| AcquisitionError::Parse("no API key configured".to_string()))?;

        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "response_format": { "type": "json_object" },
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AcquisitionError::Parse(e.to_string()))?;
        if !response.status().is_success() {
            return Err(AcquisitionError::Parse(format!(
                "parser service returned {}",
                response.status()
            )));
        }

        let reply: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AcquisitionError::Parse(e.to_string()))?;
        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AcquisitionError::Parse("reply has no message content".to_string()))?;

        parse_extraction(content)
    }
}

#[async_trait]
impl RequestParser for LlmRequestParser {
    #[instrument(skip(self))]
    async fn parse(&self, prompt: &str) -> Result<ParsedRequest> {
        match self.ask(prompt).await {
            Ok(parsed) => {
                debug!(location = %parsed.location, datasets = ?parsed.datasets, "Prompt parsed");
                Ok(parsed)
            }
            Err(e) => {
                warn!(error = %e, "Prompt parsing failed, using keyword fallback");
                self.fallback.parse(prompt).await
            }
        }
    }
}

/// Read a `{"city": .., "data_types": [..]}` reply. Unknown types are
/// dropped; an empty list means all datasets.
pub fn parse_extraction(content: &str) -> Result<ParsedRequest> {
    let extraction: Extraction =
        serde_json::from_str(content).map_err(|e| AcquisitionError::Parse(e.to_string()))?;

    if extraction.city.trim().is_empty() {
        return Err(AcquisitionError::Parse("no location in reply".to_string()));
    }

    let mut datasets = Vec::new();
    for name in &extraction.data_types {
        match DatasetKind::parse(name) {
            Some(kind) if !datasets.contains(&kind) => datasets.push(kind),
            Some(_) => {}
            None => warn!(data_type = %name, "Ignoring unknown data type"),
        }
    }
    if datasets.is_empty() {
        datasets = DatasetKind::ALL.to_vec();
    }

    Ok(ParsedRequest {
        location: extraction.city.trim().to_string(),
        datasets,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_select_datasets() {
        let parsed = KeywordParser.parse_prompt("Get NDVI and tree canopy for Austin, Texas USA");
        assert_eq!(parsed.location, "Austin, Texas USA");
        assert_eq!(parsed.datasets, vec![DatasetKind::TreeCover, DatasetKind::Ndvi]);
    }

    #[test]
    fn test_no_keywords_means_everything() {
        let parsed = KeywordParser.parse_prompt("Seattle");
        assert_eq!(parsed.location, "Seattle");
        assert_eq!(parsed.datasets, DatasetKind::ALL.to_vec());

        let hints = parsed.clarifications();
        assert_eq!(hints.len(), 2);
    }

    #[test]
    fn test_substring_matching() {
        // "map" is a substring of "basemap", "pop" of "population"
        let parsed = KeywordParser.parse_prompt("population map of Denver");
        assert_eq!(
            parsed.datasets,
            vec![DatasetKind::Population, DatasetKind::Basemap]
        );
    }

    #[test]
    fn test_parse_extraction_filters_unknown() {
        let parsed =
            parse_extraction(r#"{"city": "Chicago, IL", "data_types": ["ndvi", "elevation", "ndvi"]}"#)
                .unwrap();
        assert_eq!(parsed.location, "Chicago, IL");
        assert_eq!(parsed.datasets, vec![DatasetKind::Ndvi]);
        assert!(parsed.clarifications().is_empty());
    }

    #[test]
    fn test_parse_extraction_rejects_garbage() {
        assert!(matches!(
            parse_extraction("not json"),
            Err(AcquisitionError::Parse(_))
        ));
        assert!(matches!(
            parse_extraction(r#"{"city": " ", "data_types": []}"#),
            Err(AcquisitionError::Parse(_))
        ));
    }

    #[test]
    fn test_keyword_parser_never_fails() {
        let parsed = tokio_test::block_on(KeywordParser.parse("")).unwrap();
        assert_eq!(parsed.location, "");
        assert_eq!(parsed.datasets.len(), DatasetKind::ALL.len());
    }

    #[tokio::test]
    async fn test_llm_without_key_falls_back() {
        let parser = LlmRequestParser::new(ParserConfig::default()).unwrap();
        let parsed = parser.parse("land cover for Boston Massachusetts").await.unwrap();
        assert_eq!(parsed.location, "for Boston Massachusetts");
        assert_eq!(parsed.datasets, vec![DatasetKind::LandCover]);
    }
}
