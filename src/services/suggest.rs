// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Category suggestions for accomplishment descriptions.
//!
//! The suggestion model is an opaque text-in, list-out service. Without one
//! configured, a keyword matcher over the known categories stands in.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Categories used across the dataset.
pub const CATEGORIES: [&str; 8] = [
    "Academics",
    "Science",
    "Leadership",
    "Technology",
    "Community Service",
    "Arts",
    "Sports",
    "Discipline",
];

const MAX_SUGGESTIONS: usize = 3;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SuggestCategoriesInput {
    #[validate(length(
        min = 10,
        max = 500,
        message = "Description must be between 10 and 500 characters."
    ))]
    pub description: String,
}

#[async_trait]
pub trait CategorySuggester: Send + Sync {
    async fn suggest(&self, description: &str) -> Result<Vec<String>>;
}

/// Validate the description, then ask the suggester.
pub async fn suggest_categories(
    suggester: &dyn CategorySuggester,
    input: SuggestCategoriesInput,
) -> Result<Vec<String>> {
    input
        .validate()
        .map_err(|e| AppError::validation("Invalid input: ", &e))?;
    suggester.suggest(&input.description).await
}

// ─── HTTP ────────────────────────────────────────────────────

/// Suggestion model reached over HTTP.
#[derive(Clone)]
pub struct HttpCategorySuggester {
    http: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SuggestRequest<'a> {
    accomplishment_description: &'a str,
}

#[derive(Deserialize)]
struct SuggestResponse {
    categories: Vec<String>,
}

impl HttpCategorySuggester {
    pub fn new(url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
        }
    }
}

#[async_trait]
impl CategorySuggester for HttpCategorySuggester {
    async fn suggest(&self, description: &str) -> Result<Vec<String>> {
        let response = self
            .http
            .post(&self.url)
            .json(&SuggestRequest {
                accomplishment_description: description,
            })
            .send()
            .await
            .map_err(|e| AppError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, "Category suggestion request failed");
            return Err(AppError::Upstream(format!("HTTP {}: {}", status, body)));
        }

        let parsed: SuggestResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("JSON parse error: {}", e)))?;
        Ok(parsed.categories)
    }
}

// ─── Keyword fallback ────────────────────────────────────────

/// Local stand-in matching keywords to [`CATEGORIES`].
#[derive(Debug, Default, Clone)]
pub struct KeywordSuggester;

fn keywords(category: &str) -> &'static [&'static str] {
    match category {
        "Academics" => &["exam", "grade", "math", "olympiad", "essay", "honor", "study", "tutor"],
        "Science" => &["science", "experiment", "lab", "research", "biology", "chemistry", "physics"],
        "Leadership" => &["lead", "captain", "president", "council", "organiz", "mentor"],
        "Technology" => &["robot", "code", "coding", "programming", "software", "computer", "app"],
        "Community Service" => &["volunteer", "charity", "community", "donat", "food bank", "recycl"],
        "Arts" => &["art", "paint", "music", "theater", "drama", "choir", "draw"],
        "Sports" => &["sport", "team", "match", "race", "track", "tournament", "champion"],
        "Discipline" => &["attendance", "punctual", "conduct", "on time"],
        _ => &[],
    }
}

#[async_trait]
impl CategorySuggester for KeywordSuggester {
    async fn suggest(&self, description: &str) -> Result<Vec<String>> {
        let text = description.to_lowercase();
        Ok(CATEGORIES
            .iter()
            .filter(|category| keywords(category).iter().any(|k| text.contains(k)))
            .take(MAX_SUGGESTIONS)
            .map(|category| category.to_string())
            .collect())
    }
}
