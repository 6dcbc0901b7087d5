#[cfg(test)]
mod test {

    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::Json;
    use chrono::TimeDelta;
    use reqwest::Client;
    use serde_json::{json, Value};
    use serial_test::serial;

    use crate::config::providers::{
        GenericSourceValue, ParseConfig, ProviderConfig, ProviderTypes, RequestConfig, TokenEncoding,
    };
    use crate::config::runtime::RuntimeConfig;
    use crate::credentials::CredentialBundle;
    use crate::error::ProviderError;
    use crate::identity::{IdentityHandle, LoginMethod, LoginSelector};
    use crate::providers::http::HttpTokenProvider;
    use crate::providers::{CredentialProvider, ProviderRegistry};
    use crate::renewal::TokenAcquisitionRound;
    use crate::tests::common::{spawn_axum, FakeIdentityLibrary, Router};

    async fn token_endpoint(headers: HeaderMap) -> Json<Value> {
        let renewer = headers
            .get("x-renewer")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_owned();
        Json(json!({
            "Token": {
                "urlString": format!("token-for-{}", renewer),
                "expiresIn": 3600
            }
        }))
    }

    async fn server() -> SocketAddr {
        let router = Router::new()
            .route("/token", get(token_endpoint))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/garbage", get(|| async { "<html>not json</html>" }))
            .route(
                "/base64",
                post(|| async { Json(json!({"token": "AAEC", "expires_at": 4102444800i64})) }),
            );
        let (_handle, addr) = spawn_axum(router).await;
        addr
    }

    fn provider_config(url: String) -> ProviderConfig {
        ProviderConfig {
            provider_type: ProviderTypes::Http,
            enabled: true,
            required: true,
            request: RequestConfig {
                url,
                method: http::Method::GET,
                headers: Some(HashMap::from([(
                    "X-Renewer".to_owned(),
                    GenericSourceValue::Template {
                        template: "{{short_name}}".to_owned(),
                    },
                )])),
                timeout_ms: Some(2000),
            },
            parse: ParseConfig {
                token_pointer: "/Token/urlString".to_owned(),
                token_encoding: TokenEncoding::Plain,
                issued_at_pointer: None,
                expires_in_pointer: Some("/Token/expiresIn".to_owned()),
                expires_at_pointer: None,
            },
        }
    }

    fn identity() -> IdentityHandle {
        IdentityHandle::new("etl/worker@EXAMPLE.COM", LoginMethod::Keytab)
    }

    #[tokio::test]
    async fn fetches_token_with_rendered_headers() {
        let addr = server().await;
        let provider = HttpTokenProvider::new(
            "hdfs",
            provider_config(format!("http://{}/token", addr)),
            Client::new(),
        );

        let mut bundle = CredentialBundle::new();
        let deadline = provider
            .obtain_tokens(&identity(), &RuntimeConfig::default(), &mut bundle)
            .await
            .unwrap();

        let token = bundle.get("hdfs").unwrap();
        assert_eq!(token.bytes, b"token-for-etl".to_vec());
        assert_eq!(token.expires_at - token.issued_at, TimeDelta::seconds(3600));
        assert_eq!(deadline, Some(token.issued_at + TimeDelta::seconds(2700)));
    }

    #[tokio::test]
    async fn post_with_base64_token_and_absolute_expiry() {
        let addr = server().await;
        let mut config = provider_config(format!("http://{}/base64", addr));
        config.request.method = http::Method::POST;
        config.request.headers = None;
        config.parse = ParseConfig {
            token_pointer: "/token".to_owned(),
            token_encoding: TokenEncoding::Base64,
            issued_at_pointer: None,
            expires_in_pointer: None,
            expires_at_pointer: Some("/expires_at".to_owned()),
        };
        let provider = HttpTokenProvider::new("hive", config, Client::new());

        let mut bundle = CredentialBundle::new();
        provider
            .obtain_tokens(&identity(), &RuntimeConfig::default(), &mut bundle)
            .await
            .unwrap();
        let token = bundle.get("hive").unwrap();
        assert_eq!(token.bytes, vec![0u8, 1, 2]);
        assert_eq!(token.expires_at.timestamp(), 4_102_444_800);
    }

    #[tokio::test]
    async fn server_error_is_unavailable() {
        let addr = server().await;
        let provider = HttpTokenProvider::new(
            "hdfs",
            provider_config(format!("http://{}/broken", addr)),
            Client::new(),
        );

        let mut bundle = CredentialBundle::new();
        let err = provider
            .obtain_tokens(&identity(), &RuntimeConfig::default(), &mut bundle)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(bundle.is_empty());
    }

    #[tokio::test]
    async fn non_json_body_is_invalid_response() {
        let addr = server().await;
        let provider = HttpTokenProvider::new(
            "hdfs",
            provider_config(format!("http://{}/garbage", addr)),
            Client::new(),
        );

        let mut bundle = CredentialBundle::new();
        let err = provider
            .obtain_tokens(&identity(), &RuntimeConfig::default(), &mut bundle)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn not_required_when_security_is_disabled() {
        let provider = HttpTokenProvider::new(
            "hdfs",
            provider_config("http://127.0.0.1:1/token".to_owned()),
            Client::new(),
        );
        let insecure = RuntimeConfig {
            security_enabled: false,
            ..Default::default()
        };
        assert!(provider.requires_credentials(&RuntimeConfig::default()).await.unwrap());
        assert!(!provider.requires_credentials(&insecure).await.unwrap());

        let mut optional = provider_config("http://127.0.0.1:1/token".to_owned());
        optional.required = false;
        let provider = HttpTokenProvider::new("hdfs", optional, Client::new());
        assert!(!provider.requires_credentials(&RuntimeConfig::default()).await.unwrap());
    }

    #[tokio::test]
    #[serial]
    async fn round_with_http_providers_keeps_healthy_services() {
        let addr = server().await;
        let client = Client::new();
        let providers: Vec<Arc<dyn CredentialProvider>> = vec![
            Arc::new(HttpTokenProvider::new(
                "hdfs",
                provider_config(format!("http://{}/token", addr)),
                client.clone(),
            )),
            Arc::new(HttpTokenProvider::new(
                "hbase",
                provider_config(format!("http://{}/broken", addr)),
                client,
            )),
        ];
        let login = LoginSelector::new(None, None, Arc::new(FakeIdentityLibrary::new("alice@EXAMPLE.COM"))).unwrap();
        let round = TokenAcquisitionRound::new(
            Arc::new(login),
            Arc::new(ProviderRegistry::new(providers, &HashMap::new())),
            Arc::new(RuntimeConfig::default()),
        );

        let outcome = round.run_round().await.unwrap();
        assert_eq!(outcome.bundle.get("hdfs").unwrap().bytes, b"token-for-alice".to_vec());
        assert_eq!(outcome.failed_providers, vec!["hbase".to_owned()]);
    }
}
