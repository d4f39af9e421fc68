//! Provider identification.

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    OpenAI,
    Groq,
    Ollama,
    Extractive,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(Self::OpenAI),
            "groq" => Some(Self::Groq),
            "ollama" => Some(Self::Ollama),
            "extractive" | "offline" => Some(Self::Extractive),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Groq => "groq",
            Self::Ollama => "ollama",
            Self::Extractive => "extractive",
        }
    }

    /// Default base URL for network providers.
    pub fn default_endpoint(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("https://api.openai.com/v1"),
            Self::Groq => Some("https://api.groq.com/openai/v1"),
            Self::Ollama => Some("http://localhost:11434"),
            Self::Extractive => None,
        }
    }

    /// Whether the provider refuses to work without an API key.
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Groq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("openai"), Some(ProviderType::OpenAI));
        assert_eq!(ProviderType::parse("GROQ"), Some(ProviderType::Groq));
        assert_eq!(ProviderType::parse("ollama"), Some(ProviderType::Ollama));
        assert_eq!(
            ProviderType::parse("offline"),
            Some(ProviderType::Extractive)
        );
        assert_eq!(ProviderType::parse("unknown"), None);
    }

    #[test]
    fn test_endpoints() {
        assert_eq!(
            ProviderType::Groq.default_endpoint(),
            Some("https://api.groq.com/openai/v1")
        );
        assert_eq!(ProviderType::Extractive.default_endpoint(), None);
        assert!(ProviderType::Groq.requires_api_key());
        assert!(!ProviderType::Ollama.requires_api_key());
    }
}
