use crate::llm::client::{CompletionOptions, LLMClient, ModelParams, ResponseFormat};
use crate::types::{AppError, ChatMessage, MessageRole, Result};
use async_trait::async_trait;
use ollama_rs::{
    Ollama,
    generation::{
        chat::{ChatMessage as OllamaMessage, request::ChatMessageRequest},
        parameters::FormatType,
    },
    models::ModelOptions,
};

const DEFAULT_PORT: u16 = 11434;

const JSON_ONLY_INSTRUCTION: &str =
    "Respond with a single valid JSON document and nothing else. Do not use markdown fences.";

pub struct OllamaClient {
    client: Ollama,
    model: String,
    params: ModelParams,
}

impl OllamaClient {
    pub async fn new(base_url: String, model: String, params: ModelParams) -> Result<Self> {
        let (host, port) = split_host_port(&base_url);
        reqwest::Url::parse(&host).map_err(|e| {
            AppError::Configuration(format!("Invalid Ollama URL '{}': {}", base_url, e))
        })?;

        let client = Ollama::new(host, port);

        Ok(Self {
            client,
            model,
            params,
        })
    }

    fn build_request(&self, messages: &[ChatMessage], options: &CompletionOptions) -> ChatMessageRequest {
        let structured = options.response_format == ResponseFormat::Structured;

        let mut chat_messages: Vec<OllamaMessage> = Vec::with_capacity(messages.len() + 1);
        if structured {
            chat_messages.push(OllamaMessage::system(JSON_ONLY_INSTRUCTION.to_string()));
        }
        chat_messages.extend(messages.iter().map(to_ollama));

        let mut request = ChatMessageRequest::new(self.model.clone(), chat_messages);

        let (temperature, max_tokens) = self.params.resolve(options);
        if temperature.is_some() || max_tokens.is_some() {
            let mut model_options = ModelOptions::default();
            if let Some(temperature) = temperature {
                model_options = model_options.temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                model_options = model_options.num_predict(i32::try_from(max_tokens).unwrap_or(i32::MAX));
            }
            request = request.options(model_options);
        }

        if structured {
            request = request.format(FormatType::Json);
        }
        request
    }
}

/// Split `scheme://host:port` into `scheme://host` and the port.
fn split_host_port(base_url: &str) -> (String, u16) {
    let trimmed = base_url.trim().trim_end_matches('/');
    let (scheme, rest) = trimmed.split_once("://").unwrap_or(("http", trimmed));
    if rest.is_empty() {
        return (format!("{}://localhost", scheme), DEFAULT_PORT);
    }

    match rest.rsplit_once(':') {
        Some((host, port)) => (
            format!("{}://{}", scheme, host),
            port.parse().unwrap_or(DEFAULT_PORT),
        ),
        None => (format!("{}://{}", scheme, rest), DEFAULT_PORT),
    }
}

fn to_ollama(message: &ChatMessage) -> OllamaMessage {
    match message.role {
        MessageRole::System => OllamaMessage::system(message.content.clone()),
        MessageRole::User => OllamaMessage::user(message.content.clone()),
        MessageRole::Assistant => OllamaMessage::assistant(message.content.clone()),
    }
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions) -> Result<String> {
        let request = self.build_request(messages, options);
        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AppError::LLM(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_parsing_full() {
        let (host, port) = split_host_port("http://localhost:11434");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, 11434);
    }

    #[test]
    fn test_url_parsing_no_port() {
        let (host, port) = split_host_port("http://localhost");
        assert_eq!(host, "http://localhost");
        assert_eq!(port, DEFAULT_PORT);
    }

    #[test]
    fn test_url_parsing_custom_port_and_trailing_slash() {
        let (host, port) = split_host_port("https://192.168.1.100:8080/");
        assert_eq!(host, "https://192.168.1.100");
        assert_eq!(port, 8080);
    }

    #[test]
    fn test_url_parsing_without_scheme() {
        let (host, port) = split_host_port("gpu-box:9000");
        assert_eq!(host, "http://gpu-box");
        assert_eq!(port, 9000);
    }

    async fn client(params: ModelParams) -> OllamaClient {
        OllamaClient::new("http://localhost:11434".to_string(), "llama3.2".to_string(), params)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_client_reports_model() {
        assert_eq!(client(ModelParams::default()).await.model_name(), "llama3.2");
    }

    #[tokio::test]
    async fn test_request_carries_options_and_json_format() {
        let client = client(ModelParams {
            temperature: Some(0.2),
            max_tokens: Some(256),
        })
        .await;
        let options = CompletionOptions::structured().with_max_tokens(64);
        let request = client.build_request(&[ChatMessage::user("plan this")], &options);

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(body["format"], "json");
        assert_eq!(body["options"]["num_predict"], 64);
        let temperature = body["options"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.2).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
    }

    #[tokio::test]
    async fn test_text_request_without_params_is_plain() {
        let client = client(ModelParams::default()).await;
        let request = client.build_request(&[ChatMessage::user("hi")], &CompletionOptions::text());

        let body = serde_json::to_value(&request).unwrap();
        assert!(body.get("format").is_none_or(|f| f.is_null()));
        assert!(body.get("options").is_none_or(|o| o.is_null()));
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }
}
