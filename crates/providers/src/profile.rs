//! Endpoint profiles.
//!
//! Every supported backend speaks the same chat-completion protocol and
//! differs only in base URL, completions path and how the key is found.

/// Where the bearer key comes from.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Read from this environment variable on every request. A missing
    /// variable yields an empty key; the request is still sent.
    Env(String),
    /// A fixed key.
    Static(String),
    /// Send no Authorization header.
    None,
}

impl Credential {
    pub fn resolve(&self) -> Option<String> {
        match self {
            Credential::Env(name) => Some(std::env::var(name).unwrap_or_default()),
            Credential::Static(key) => Some(key.clone()),
            Credential::None => None,
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Env(name) => f.debug_tuple("Env").field(name).finish(),
            Credential::Static(_) => f.write_str("Static([REDACTED])"),
            Credential::None => f.write_str("None"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointProfile {
    pub name: String,
    pub base_url: String,
    pub completions_path: String,
    pub credential: Credential,
    pub extra_headers: Vec<(String, String)>,
}

/// Preset names, in display order.
pub const PRESETS: &[&str] = &["openai", "groq", "mistral", "gemini"];

impl EndpointProfile {
    pub fn custom(
        name: impl Into<String>,
        base_url: impl Into<String>,
        completions_path: impl Into<String>,
        credential: Credential,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            completions_path: completions_path.into(),
            credential,
            extra_headers: Vec::new(),
        }
    }

    pub fn openai() -> Self {
        Self::custom(
            "openai",
            "https://api.openai.com",
            "/v1/chat/completions",
            Credential::Env("OPENAI_API_KEY".into()),
        )
    }

    pub fn groq() -> Self {
        Self::custom(
            "groq",
            "https://api.groq.com",
            "/openai/v1/chat/completions",
            Credential::Env("GROQ_API_KEY".into()),
        )
    }

    pub fn mistral() -> Self {
        Self::custom(
            "mistral",
            "https://api.mistral.ai",
            "/v1/chat/completions",
            Credential::Env("MISTRAL_API_KEY".into()),
        )
    }

    pub fn gemini() -> Self {
        Self::custom(
            "gemini",
            "https://generativelanguage.googleapis.com",
            "/v1beta/openai/chat/completions",
            Credential::Env("GEMINI_API_KEY".into()),
        )
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "openai" => Some(Self::openai()),
            "groq" => Some(Self::groq()),
            "mistral" => Some(Self::mistral()),
            "gemini" => Some(Self::gemini()),
            _ => None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_completions_path(mut self, path: impl Into<String>) -> Self {
        self.completions_path = path.into();
        self
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    /// Full completions URL. Tolerates a trailing `/` on the base and a
    /// missing leading `/` on the path.
    pub fn url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = self.completions_path.trim_start_matches('/');
        format!("{base}/{path}")
    }
}
