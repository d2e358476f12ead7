//! Hosted memory API backend.
//!
//! [`CloudClient`] is the client-library path: typed calls with the
//! service's own endpoint conventions. [`CloudTransport`] is the direct
//! path: raw JSON sent to whatever endpoint the dispatcher names.
//! Both authenticate with `Authorization: Token <key>`.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use super::{ensure_success, read_lenient, DirectRequest, DirectTransport, MemoryLibrary, Options};
use crate::errors::Error;

/// Hosted memory endpoints.
pub mod endpoints {
    pub const PING: &str = "/v1/ping/";
    pub const MEMORIES: &str = "/v1/memories/";
    pub const SEARCH: &str = "/v1/memories/search";
    pub const LIBRARY_SEARCH: &str = "/v1/memories/search/";
    pub const EXPORTS: &str = "/v1/exports/";
    pub const EXPORTS_GET: &str = "/v1/exports/get/";

    /// Path of a single memory; the id is encoded as one path segment.
    pub fn memory(id: &str) -> String {
        format!("/v1/memories/{}/", urlencoding::encode(id))
    }
}

#[derive(Clone)]
struct HostedApi {
    base_url: String,
    api_key: String,
    http_client: reqwest::Client,
}

impl HostedApi {
    fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Token {}", self.api_key))
    }
}

/// Single user message wrapping `content`, the shape the hosted add call expects.
pub fn user_messages(content: &str) -> Value {
    json!([{"role": "user", "content": content}])
}

/// Client-library handle for the hosted API.
pub struct CloudClient {
    api: HostedApi,
}

impl CloudClient {
    /// Build a client and validate the key against the ping endpoint.
    ///
    /// # Errors
    ///
    /// Returns error if the service is unreachable or rejects the key.
    pub async fn connect(base_url: &str, api_key: &str) -> Result<Self, Error> {
        let client = Self {
            api: HostedApi::new(base_url, api_key),
        };
        let response = client.api.request(Method::GET, endpoints::PING).send().await?;
        ensure_success("API key validation", response).await?;
        debug!(base_url = %client.api.base_url, "hosted API key validated");
        Ok(client)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<Value, Error> {
        let response = self.api.request(Method::POST, path).json(body).send().await?;
        let response = ensure_success("Hosted API request", response).await?;
        Ok(response.json().await?)
    }
}

fn with_options(mut body: Options, options: &Options) -> Value {
    for (key, value) in options {
        body.insert(key.clone(), value.clone());
    }
    Value::Object(body)
}

#[async_trait]
impl MemoryLibrary for CloudClient {
    async fn add(&self, content: &str, options: &Options) -> Result<Value, Error> {
        let mut body = Options::new();
        body.insert("messages".to_string(), user_messages(content));
        self.post(endpoints::MEMORIES, &with_options(body, options)).await
    }

    async fn search(&self, query: &str, options: &Options) -> Result<Value, Error> {
        let mut body = Options::new();
        body.insert("query".to_string(), Value::String(query.to_string()));
        self.post(endpoints::LIBRARY_SEARCH, &with_options(body, options))
            .await
    }

    async fn delete_memory(&self, memory_id: &str) -> Result<(), Error> {
        let response = self
            .api
            .request(Method::DELETE, &endpoints::memory(memory_id))
            .send()
            .await?;
        ensure_success("Hosted API request", response).await?;
        Ok(())
    }

    async fn create_export(&self, options: &Options) -> Result<Value, Error> {
        self.post(endpoints::EXPORTS, &Value::Object(options.clone()))
            .await
    }

    async fn get_export(&self, options: &Options) -> Result<Value, Error> {
        self.post(endpoints::EXPORTS_GET, &Value::Object(options.clone()))
            .await
    }
}

/// Direct transport to the hosted API.
pub struct CloudTransport {
    api: HostedApi,
}

impl CloudTransport {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            api: HostedApi::new(base_url, api_key),
        }
    }
}

#[async_trait]
impl DirectTransport for CloudTransport {
    async fn send(&self, request: &DirectRequest) -> Result<Value, Error> {
        let mut builder = self.api.request(request.method.clone(), &request.path);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        let response = ensure_success(request.context, response).await?;
        read_lenient(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn options(value: Value) -> Options {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_connect_pings_with_token_auth() {
        let server = MockServer::start();
        let ping = server.mock(|when, then| {
            when.method(GET)
                .path("/v1/ping/")
                .header("authorization", "Token m0-key");
            then.status(200).json_body(json!({"status": "ok"}));
        });

        CloudClient::connect(&server.base_url(), "m0-key").await.unwrap();
        ping.assert();
    }

    #[tokio::test]
    async fn test_connect_rejected_key() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/ping/");
            then.status(401).body("invalid key");
        });

        let err = CloudClient::connect(&server.base_url(), "bad")
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("API key validation failed: 401"));
    }

    #[tokio::test]
    async fn test_library_add_wraps_content_as_user_message() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/ping/");
            then.status(200);
        });
        let add = server.mock(|when, then| {
            when.method(POST).path("/v1/memories/").json_body(json!({
                "messages": [{"role": "user", "content": "hello"}],
                "user_id": "u1",
                "version": "v2"
            }));
            then.status(200)
                .json_body(json!([{"id": "m1", "event": "ADD", "memory": "hello"}]));
        });

        let client = CloudClient::connect(&server.base_url(), "k").await.unwrap();
        let result = client
            .add("hello", &options(json!({"user_id": "u1", "version": "v2"})))
            .await
            .unwrap();

        add.assert();
        assert_eq!(result[0]["id"], "m1");
    }

    #[tokio::test]
    async fn test_library_delete_targets_memory_path() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/v1/ping/");
            then.status(200);
        });
        let delete = server.mock(|when, then| {
            when.method(DELETE).path("/v1/memories/m1/");
            then.status(204);
        });

        let client = CloudClient::connect(&server.base_url(), "k").await.unwrap();
        client.delete_memory("m1").await.unwrap();
        delete.assert();
    }

    #[test]
    fn test_memory_path_escapes_id() {
        assert_eq!(endpoints::memory("m1"), "/v1/memories/m1/");
        assert_eq!(
            endpoints::memory("x/../../exports/get"),
            "/v1/memories/x%2F..%2F..%2Fexports%2Fget/"
        );
        assert_eq!(endpoints::memory("a?b#c"), "/v1/memories/a%3Fb%23c/");
    }

    #[tokio::test]
    async fn test_transport_reports_status_failures() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/memories/search");
            then.status(500).body("boom");
        });

        let transport = CloudTransport::new(&server.base_url(), "k");
        let err = transport
            .send(&DirectRequest {
                method: Method::POST,
                path: endpoints::SEARCH.to_string(),
                body: Some(json!({"query": "q"})),
                context: "Direct search API call",
            })
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Direct search API call failed: 500 Internal Server Error - boom"
        );
    }

    #[tokio::test]
    async fn test_transport_accepts_non_json_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/v1/memories/m1/");
            then.status(200).body("deleted");
        });

        let transport = CloudTransport::new(&server.base_url(), "k");
        let value = transport
            .send(&DirectRequest {
                method: Method::DELETE,
                path: endpoints::memory("m1"),
                body: None,
                context: "Direct delete API call",
            })
            .await
            .unwrap();

        assert_eq!(value, Value::String("deleted".to_string()));
    }
}
