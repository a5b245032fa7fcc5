use crate::config::HttpConfig;
use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::info;

/// Build the shared HTTP client with the configured user agent and timeout
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()
        .map_err(|source| Error::Http {
            url: "(client setup)".into(),
            source,
        })
}

async fn get(client: &reqwest::Client, url: &str) -> Result<reqwest::Response> {
    let http_err = |source| Error::Http {
        url: url.to_string(),
        source,
    };

    let response = client.get(url).send().await.map_err(http_err)?;
    info!(
        action = "response",
        component = "http",
        url,
        status = %response.status(),
        "Received response"
    );
    response.error_for_status().map_err(http_err)
}

/// Fetch a page and return its body as text
pub async fn fetch_text(client: &reqwest::Client, url: &str) -> Result<String> {
    get(client, url)
        .await?
        .text()
        .await
        .map_err(|source| Error::Http {
            url: url.to_string(),
            source,
        })
}

/// Fetch a JSON document and deserialize it into `T`
pub async fn fetch_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T> {
    let body = fetch_text(client, url).await?;
    serde_json::from_str(&body).map_err(|e| Error::Malformed {
        what: url.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::utils::test_server::TestServer;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Token {
        token: String,
    }

    async fn server() -> TestServer {
        TestServer::start(&[
            ("/page", 200, "<p>hello</p>"),
            ("/token.json", 200, r#"{"token": "abc"}"#),
            ("/broken.json", 200, "{ not json"),
            ("/down", 500, "internal error"),
        ])
        .await
    }

    fn client() -> reqwest::Client {
        build_client(&HttpConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn fetch_text_returns_body() {
        let server = server().await;
        let body = fetch_text(&client(), &server.url("/page")).await.unwrap();
        assert_eq!(body, "<p>hello</p>");
    }

    #[tokio::test]
    async fn fetch_json_deserializes() {
        let server = server().await;
        let token: Token = fetch_json(&client(), &server.url("/token.json")).await.unwrap();
        assert_eq!(token, Token { token: "abc".into() });
    }

    #[tokio::test]
    async fn missing_page_is_not_found() {
        let server = server().await;
        let err = fetch_text(&client(), &server.url("/gone")).await.unwrap_err();
        assert!(matches!(err, Error::Http { .. }));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn server_error_is_io() {
        let server = server().await;
        let err = fetch_text(&client(), &server.url("/down")).await.unwrap_err();
        assert!(matches!(err, Error::Http { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[tokio::test]
    async fn unparsable_json_is_malformed() {
        let server = server().await;
        let err = fetch_json::<Token>(&client(), &server.url("/broken.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
