// src/orchestrator/providers.rs - Normalization providers and the ordered fallback chain

use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::error::ProviderError;
use crate::utils::env::{env_opt, env_or};

/// A text-completion backend used to canonicalize record names.
#[async_trait]
pub trait NormalizationProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool {
        true
    }

    async fn get_completion(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError>;
}

/// Successful answer from the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainCompletion {
    pub provider: String,
    pub text: String,
    /// Calls made, including failed ones before this answer.
    pub attempts: usize,
}

/// Providers tried in priority order with a timeout around every call.
/// The first non-empty answer wins; retries apply to one provider at a time.
pub struct ProviderChain {
    providers: Vec<Arc<dyn NormalizationProvider>>,
    call_timeout: Duration,
    retries_per_provider: usize,
}

impl ProviderChain {
    pub fn new(providers: Vec<Arc<dyn NormalizationProvider>>, call_timeout: Duration) -> Self {
        Self {
            providers,
            call_timeout,
            retries_per_provider: 0,
        }
    }

    pub fn with_retries(mut self, retries_per_provider: usize) -> Self {
        self.retries_per_provider = retries_per_provider;
        self
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn enabled_count(&self) -> usize {
        self.providers.iter().filter(|p| p.is_enabled()).count()
    }

    async fn call_once(
        &self,
        provider: &dyn NormalizationProvider,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        match timeout(self.call_timeout, provider.get_completion(system_prompt, user_prompt)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(Ok(_)) => Err(ProviderError::EmptyResponse(provider.name().to_string())),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ProviderError::Timeout {
                provider: provider.name().to_string(),
                after: self.call_timeout,
            }),
        }
    }

    pub async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<ChainCompletion, ProviderError> {
        let mut failures = Vec::new();
        let mut attempts = 0;
        for provider in &self.providers {
            if !provider.is_enabled() {
                debug!("Skipping disabled provider {}", provider.name());
                failures.push(ProviderError::Disabled(provider.name().to_string()).to_string());
                continue;
            }
            for attempt in 0..=self.retries_per_provider {
                attempts += 1;
                match self.call_once(provider.as_ref(), system_prompt, user_prompt).await {
                    Ok(text) => {
                        return Ok(ChainCompletion {
                            provider: provider.name().to_string(),
                            text,
                            attempts,
                        })
                    }
                    Err(e) => {
                        warn!(
                            "⚠️ Provider {} failed (attempt {}/{}): {}",
                            provider.name(),
                            attempt + 1,
                            self.retries_per_provider + 1,
                            e
                        );
                        failures.push(e.to_string());
                    }
                }
            }
        }
        Err(ProviderError::ChainExhausted { attempts: failures })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderApi {
    /// `POST {url}/chat/completions` with system and user messages.
    OpenAiChat,
    /// `POST {url}/api/generate` with one combined prompt.
    OllamaGenerate,
}

impl FromStr for ProviderApi {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai_chat" | "chat" => Ok(ProviderApi::OpenAiChat),
            "ollama" | "ollama_generate" => Ok(ProviderApi::OllamaGenerate),
            other => Err(format!("unknown provider api '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    pub name: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub api: ProviderApi,
    pub enabled: bool,
}

impl HttpProviderConfig {
    /// Reads `PROVIDER_*` variables. `None` when no `PROVIDER_URL` is set.
    pub fn from_env() -> Option<Self> {
        let base_url = env_opt("PROVIDER_URL")?;
        let api = env_opt("PROVIDER_API")
            .and_then(|v| match v.parse() {
                Ok(api) => Some(api),
                Err(e) => {
                    warn!("⚠️ {}; falling back to openai", e);
                    None
                }
            })
            .unwrap_or(ProviderApi::OpenAiChat);
        Some(Self {
            name: env_opt("PROVIDER_NAME").unwrap_or_else(|| "http".to_string()),
            base_url,
            api_key: env_opt("PROVIDER_API_KEY"),
            model: env_opt("PROVIDER_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            api,
            enabled: env_or("PROVIDER_ENABLED", true),
        })
    }

    pub fn log_config(&self) {
        info!(
            "🤖 Provider '{}': {:?} at {} (model: {}, api key: {}, enabled: {})",
            self.name,
            self.api,
            self.base_url,
            self.model,
            if self.api_key.is_some() { "set" } else { "none" },
            self.enabled
        );
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Provider speaking an OpenAI-compatible or Ollama HTTP API.
pub struct HttpCompletionProvider {
    config: HttpProviderConfig,
    client: Client,
}

impl HttpCompletionProvider {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            config,
            client: Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.api {
            ProviderApi::OpenAiChat => format!("{}/chat/completions", base),
            ProviderApi::OllamaGenerate => format!("{}/api/generate", base),
        }
    }

    async fn post<B: Serialize + ?Sized>(&self, body: &B) -> Result<reqwest::Response, ProviderError> {
        let mut request = self.client.post(self.endpoint()).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::request(&self.config.name, e.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Status {
                provider: self.config.name.clone(),
                status: response.status().as_u16(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl NormalizationProvider for HttpCompletionProvider {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn get_completion(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ProviderError> {
        let parse_error = |e: reqwest::Error| {
            ProviderError::request(&self.config.name, format!("unreadable response: {}", e))
        };
        let text = match self.config.api {
            ProviderApi::OpenAiChat => {
                let body = ChatRequest {
                    model: &self.config.model,
                    messages: vec![
                        ChatMessage {
                            role: "system",
                            content: system_prompt,
                        },
                        ChatMessage {
                            role: "user",
                            content: user_prompt,
                        },
                    ],
                    temperature: 0.0,
                };
                let response: ChatResponse = self.post(&body).await?.json().await.map_err(parse_error)?;
                response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .unwrap_or_default()
            }
            ProviderApi::OllamaGenerate => {
                let body = GenerateRequest {
                    model: &self.config.model,
                    prompt: format!("{}\n\n{}", system_prompt, user_prompt),
                    stream: false,
                };
                let response: GenerateResponse = self.post(&body).await?.json().await.map_err(parse_error)?;
                response.response
            }
        };
        let text = text.trim().trim_matches('"').trim().to_string();
        if text.is_empty() {
            return Err(ProviderError::EmptyResponse(self.config.name.clone()));
        }
        Ok(text)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    pub(crate) enum Script {
        Answer(String),
        Fail,
        FailTimes(usize, String),
        Sleep(Duration),
        Empty,
    }

    pub(crate) struct ScriptedProvider {
        pub name: String,
        pub enabled: bool,
        pub script: Script,
        pub calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub(crate) fn new(name: &str, script: Script) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                enabled: true,
                script,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NormalizationProvider for ScriptedProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }

        async fn get_completion(&self, _system: &str, user: &str) -> Result<String, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.script {
                Script::Answer(text) => Ok(text.clone()),
                Script::Fail => Err(ProviderError::Status {
                    provider: self.name.clone(),
                    status: 502,
                }),
                Script::FailTimes(n, text) if call >= *n => Ok(text.clone()),
                Script::FailTimes(..) => Err(ProviderError::request(&self.name, "connection reset")),
                Script::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(user.to_string())
                }
                Script::Empty => Ok("   ".to_string()),
            }
        }
    }

    fn chain(providers: Vec<Arc<ScriptedProvider>>) -> ProviderChain {
        ProviderChain::new(
            providers.into_iter().map(|p| p as Arc<dyn NormalizationProvider>).collect(),
            Duration::from_millis(100),
        )
    }

    #[tokio::test]
    async fn test_falls_back_to_next_provider() {
        let a = ScriptedProvider::new("A", Script::Fail);
        let b = ScriptedProvider::new("B", Script::Answer(" X ".into()));
        let result = chain(vec![a.clone(), b.clone()]).complete("sys", "user").await.unwrap();
        assert_eq!(result.text, "X");
        assert_eq!(result.provider, "B");
        assert_eq!(result.attempts, 2);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 1);
    }

    #[tokio::test]
    async fn test_exhausted_chain_lists_every_failure() {
        let a = ScriptedProvider::new("A", Script::Fail);
        let b = ScriptedProvider::new("B", Script::Empty);
        let err = chain(vec![a, b]).complete("sys", "user").await.unwrap_err();
        match err {
            ProviderError::ChainExhausted { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].contains("HTTP 502"));
                assert!(attempts[1].contains("empty response"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let slow = ScriptedProvider::new("slow", Script::Sleep(Duration::from_secs(5)));
        let fast = ScriptedProvider::new("fast", Script::Answer("ok".into()));
        let started = std::time::Instant::now();
        let result = chain(vec![slow, fast]).complete("sys", "user").await.unwrap();
        assert_eq!(result.provider, "fast");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_disabled_provider_is_skipped() {
        let disabled = Arc::new(ScriptedProvider {
            name: "off".into(),
            enabled: false,
            script: Script::Answer("never".into()),
            calls: AtomicUsize::new(0),
        });
        let on = ScriptedProvider::new("on", Script::Answer("yes".into()));
        let chain = chain(vec![disabled.clone(), on]);
        assert_eq!(chain.enabled_count(), 1);
        assert_eq!(chain.complete("s", "u").await.unwrap().text, "yes");
        assert_eq!(disabled.calls(), 0);
    }

    #[tokio::test]
    async fn test_retries_stay_on_one_provider() {
        let flaky = ScriptedProvider::new("flaky", Script::FailTimes(1, "fixed".into()));
        let backup = ScriptedProvider::new("backup", Script::Answer("backup".into()));
        let result = chain(vec![flaky.clone(), backup.clone()])
            .with_retries(1)
            .complete("s", "u")
            .await
            .unwrap();
        assert_eq!(result.text, "fixed");
        assert_eq!(result.attempts, 2);
        assert_eq!(backup.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_chain_is_exhausted() {
        let err = chain(vec![]).complete("s", "u").await.unwrap_err();
        assert_eq!(err, ProviderError::ChainExhausted { attempts: vec![] });
    }

    #[test]
    fn test_provider_api_parsing_and_endpoint() {
        assert_eq!("Ollama".parse::<ProviderApi>(), Ok(ProviderApi::OllamaGenerate));
        assert!("grpc".parse::<ProviderApi>().is_err());
        let provider = HttpCompletionProvider::new(HttpProviderConfig {
            name: "local".into(),
            base_url: "http://localhost:11434/".into(),
            api_key: None,
            model: "llama3".into(),
            api: ProviderApi::OllamaGenerate,
            enabled: true,
        });
        assert_eq!(provider.endpoint(), "http://localhost:11434/api/generate");
    }

    #[tokio::test]
    async fn test_unreachable_http_provider_is_a_request_error() {
        let provider = HttpCompletionProvider::new(HttpProviderConfig {
            name: "down".into(),
            base_url: "http://127.0.0.1:9".into(),
            api_key: Some("key".into()),
            model: "m".into(),
            api: ProviderApi::OpenAiChat,
            enabled: true,
        });
        let chain = ProviderChain::new(vec![Arc::new(provider)], Duration::from_secs(5));
        assert!(matches!(
            chain.complete("s", "u").await,
            Err(ProviderError::ChainExhausted { .. })
        ));
    }
}
