use reqwest::Client;
use serde::{Deserialize, Serialize};
use anyhow::{Result, anyhow};

/// Default chatbot server endpoint, used when no override is configured.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

#[derive(Serialize)]
struct ChatRequest {
    message: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    response: String,
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send one user message and return the server's reply text.
    ///
    /// The message is sent exactly as typed; trimming is a submission
    /// concern, not a wire concern.
    pub async fn send(&self, message: &str) -> Result<String> {
        let url = format!("{}/chat", self.base_url);

        let request = ChatRequest {
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "chat request failed with status: {}. Make sure the chatbot server is running",
                response.status()
            ));
        }

        let chat_response: ChatResponse = response.json().await?;
        Ok(chat_response.response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn send_returns_the_response_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"message": "Hello"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"response": "Hi there!"})),
            )
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri());
        let reply = client.send("Hello").await.unwrap();
        assert_eq!(reply, "Hi there!");
    }

    #[tokio::test]
    async fn send_posts_the_untrimmed_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_json(json!({"message": "  side effects of aspirin  "})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"response": "ok"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri());
        client.send("  side effects of aspirin  ").await.unwrap();
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri());
        let err = client.send("Hello").await.unwrap_err();
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn non_json_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri());
        assert!(client.send("Hello").await.is_err());
    }

    #[tokio::test]
    async fn unexpected_shape_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"reply": "wrong key"})))
            .mount(&server)
            .await;

        let client = ChatClient::new(&server.uri());
        assert!(client.send("Hello").await.is_err());
    }
}
