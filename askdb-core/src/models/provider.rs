use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Request-time key selecting one of the two model-provider pairs.
/// Both expose the same translate/summarize contract and are substitutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    HuggingFace,
}

impl Provider {
    pub fn as_key(self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::HuggingFace => "huggingface",
        }
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "huggingface" => Ok(Provider::HuggingFace),
            other => Err(format!("unknown provider '{}'", other)),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key())
    }
}
