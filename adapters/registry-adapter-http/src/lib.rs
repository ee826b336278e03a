//! HTTP registry adapter.
//!
//! Talks to the notification API of the server:
//!
//! - `GET  {base}/api/notification/vapid-public-key` returns `{"vapidPublicKey": "..."}`
//! - `POST {base}/api/notification/subscription` stores
//!   `{"subscription": <push handle>, "settings": <notification settings>}`

#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![forbid(unsafe_code)]

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{Method, StatusCode};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use pushsync_types::{prelude::*, registry_adapter::RegistryAdapter};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const KEY_PATH: &str = "api/notification/vapid-public-key";
const SUBSCRIPTION_PATH: &str = "api/notification/subscription";

/// Longest response body excerpt kept in error messages
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyResponse {
	#[serde(default)]
	vapid_public_key: Option<String>,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
	subscription: &'a PushHandle,
	settings: &'a NotificationSettings,
}

type HttpClient = Client<HttpsConnector<HttpConnector>, Full<Bytes>>;

pub struct RegistryAdapterHttp {
	base_url: Url,
	token: Option<Box<str>>,
	timeout: Duration,
	client: HttpClient,
}

impl std::fmt::Debug for RegistryAdapterHttp {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RegistryAdapterHttp")
			.field("base_url", &self.base_url.as_str())
			.field("token", &self.token.as_ref().map(|_| "***"))
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

impl RegistryAdapterHttp {
	/// Creates an adapter for the server at `base_url` (http or https)
	pub fn new(base_url: &str) -> ClResult<Self> {
		let mut base_url = Url::parse(base_url)
			.map_err(|e| Error::ValidationError(format!("invalid registry URL: {}", e)))?;
		if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
			return Err(Error::ValidationError(format!("unsupported registry URL: {}", base_url)));
		}
		// relative joins must extend the path, not replace its last segment
		if !base_url.path().ends_with('/') {
			let path = format!("{}/", base_url.path());
			base_url.set_path(&path);
		}

		let connector =
			HttpsConnectorBuilder::new().with_webpki_roots().https_or_http().enable_http1().build();
		let client = Client::builder(TokioExecutor::new()).build(connector);

		Ok(Self { base_url, token: None, timeout: DEFAULT_TIMEOUT, client })
	}

	/// Sends `Authorization: Bearer <token>` with every request
	pub fn with_token(mut self, token: impl Into<Box<str>>) -> Self {
		self.token = Some(token.into());
		self
	}

	/// Limits the duration of a single request
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = timeout;
		self
	}

	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	fn url(&self, path: &str) -> ClResult<Url> {
		self.base_url
			.join(path)
			.map_err(|e| Error::Internal(format!("cannot build registry URL: {}", e)))
	}

	/// Sends a request, returning the body of a successful response
	async fn send(&self, method: Method, path: &str, body: Option<Vec<u8>>) -> ClResult<Bytes> {
		let url = self.url(path)?;

		let mut builder = hyper::Request::builder()
			.method(method.clone())
			.uri(url.as_str())
			.header("Accept", "application/json");
		if body.is_some() {
			builder = builder.header("Content-Type", "application/json");
		}
		if let Some(token) = &self.token {
			builder = builder.header("Authorization", format!("Bearer {}", token));
		}
		let request = builder
			.body(Full::new(body.map(Bytes::from).unwrap_or_default()))
			.map_err(|e| Error::Internal(format!("request build error: {}", e)))?;

		let res = tokio::time::timeout(self.timeout, async {
			let response = self
				.client
				.request(request)
				.await
				.map_err(|e| Error::Network(format!("{} {}: {}", method, url, e)))?;
			let status = response.status();
			let body = response
				.into_body()
				.collect()
				.await
				.map_err(|e| Error::Network(format!("{} {}: {}", method, url, e)))?
				.to_bytes();
			Ok::<(StatusCode, Bytes), Error>((status, body))
		})
		.await;

		let (status, body) = match res {
			Ok(res) => res?,
			Err(_) => {
				let msg = format!("{} {}: timed out after {:?}", method, url, self.timeout);
				return Err(Error::Network(msg));
			}
		};

		if !status.is_success() {
			let text = String::from_utf8_lossy(&body);
			let excerpt: String = text.chars().take(ERROR_BODY_LIMIT).collect();
			debug!(%method, %url, %status, "Registry request rejected");
			return Err(Error::Registry(format!("HTTP {}: {}", status, excerpt.trim())));
		}
		Ok(body)
	}
}

#[async_trait]
impl RegistryAdapter for RegistryAdapterHttp {
	async fn fetch_server_public_key(&self) -> ClResult<Box<str>> {
		let body = self.send(Method::GET, KEY_PATH, None).await?;
		let res: KeyResponse = serde_json::from_slice(&body)?;
		Ok(res.vapid_public_key.unwrap_or_default().into())
	}

	async fn register(&self, handle: &PushHandle, settings: &NotificationSettings) -> ClResult<()> {
		let body = serde_json::to_vec(&RegisterRequest { subscription: handle, settings })?;
		self.send(Method::POST, SUBSCRIPTION_PATH, Some(body)).await?;
		debug!(endpoint = %handle.endpoint, "Registry updated");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_url_keeps_base_path() {
		let adapter = RegistryAdapterHttp::new("https://cl.example.com/prefix").unwrap();
		assert_eq!(
			adapter.url(KEY_PATH).unwrap().as_str(),
			"https://cl.example.com/prefix/api/notification/vapid-public-key"
		);

		let adapter = RegistryAdapterHttp::new("https://cl.example.com").unwrap();
		assert_eq!(
			adapter.url(SUBSCRIPTION_PATH).unwrap().as_str(),
			"https://cl.example.com/api/notification/subscription"
		);
	}

	#[test]
	fn test_rejects_bad_urls() {
		assert!(matches!(RegistryAdapterHttp::new("not a url"), Err(Error::ValidationError(_))));
		assert!(matches!(
			RegistryAdapterHttp::new("ftp://cl.example.com"),
			Err(Error::ValidationError(_))
		));
	}

	#[test]
	fn test_register_body_shape() {
		let handle = PushHandle::new("https://push.example.com/e1").with_keys("pk", "au");
		let settings = NotificationSettings { notify_on_warning: true, ..Default::default() };
		let json = serde_json::to_value(RegisterRequest { subscription: &handle, settings: &settings })
			.unwrap();

		assert_eq!(json["subscription"]["endpoint"], "https://push.example.com/e1");
		assert_eq!(json["subscription"]["keys"]["p256dh"], "pk");
		assert_eq!(json["settings"]["notifyOnWarning"], true);
		assert_eq!(json["settings"]["subscriptions"], serde_json::json!([]));
	}

	#[test]
	fn test_debug_hides_token() {
		let adapter = RegistryAdapterHttp::new("https://cl.example.com").unwrap().with_token("secret");
		assert!(!format!("{:?}", adapter).contains("secret"));
	}
}

// vim: ts=4
