use serde::{Deserialize, Serialize};

/// Sampling parameters sent with every request of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature in `[0, 1]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Nucleus sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Top-k sampling limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,

    /// Upper bound on generated tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    /// Create a config that only pins the temperature.
    pub fn with_temperature(temperature: f32) -> Self {
        Self {
            temperature: Some(temperature),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn omits_unset_fields() {
        let config = GenerationConfig::with_temperature(0.2);
        assert_eq!(to_value(&config).unwrap(), json!({"temperature": 0.2f32}));
    }

    #[test]
    fn camel_case_fields() {
        let config = GenerationConfig {
            max_output_tokens: Some(512),
            top_p: Some(0.5),
            ..GenerationConfig::default()
        };
        assert_eq!(
            to_value(&config).unwrap(),
            json!({"topP": 0.5, "maxOutputTokens": 512})
        );
    }
}
