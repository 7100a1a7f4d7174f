use serde::{Deserialize, Serialize};

/// Used when the user leaves the endpoint blank.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
/// Used when the user leaves the model blank.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Connection settings for an OpenAI-compatible chat-completions provider.
///
/// Loaded fresh for every workflow run. The API key is never defaulted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
}

impl ProviderSettings {
    /// Trims every field and substitutes defaults for a blank endpoint or model.
    pub fn normalized(&self) -> Self {
        let endpoint = self.endpoint.trim();
        let model = self.model.trim();
        Self {
            endpoint: if endpoint.is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint.to_string()
            },
            api_key: self.api_key.trim().to_string(),
            model: if model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                model.to_string()
            },
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Short, non-reversible hint of the key for display ("sk-…wxyz").
    pub fn api_key_hint(&self) -> Option<String> {
        let key = self.api_key.trim();
        if key.is_empty() {
            return None;
        }
        let chars: Vec<char> = key.chars().collect();
        if chars.len() <= 8 {
            return Some("…".to_string());
        }
        let head: String = chars[..3].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        Some(format!("{head}…{tail}"))
    }
}
