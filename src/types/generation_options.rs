use serde::{Deserialize, Serialize};

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default cap on generated tokens per response.
pub const DEFAULT_MAX_OUTPUT_TOKENS: u32 = 1024;

/// Per-request sampling options for the remote generation service.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature.
    pub temperature: f32,

    /// Maximum number of tokens the model may generate.
    pub max_output_tokens: u32,

    /// Whether output is delivered incrementally.
    pub stream: bool,
}

impl GenerationOptions {
    /// Creates options with the defaults: temperature 0.7, 1024 tokens, streaming.
    pub fn new() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            stream: true,
        }
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the maximum number of generated tokens.
    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    /// Enables or disables streaming.
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self::new()
    }
}
