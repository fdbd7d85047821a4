//! HTTP client for the webhook and spreadsheet calls
//!
//! Every external call is attempted exactly once; non-2xx responses become
//! `DeliveryError::Status`.

use crate::error::DeliveryError;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;

#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("heviton-report/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("ko-KR,ko;q=0.9,en-US;q=0.8"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| DeliveryError::Request {
                url: String::new(),
                reason: e.to_string(),
            })?;

        Ok(Self { inner: client })
    }

    pub async fn get(&self, url: &str, bearer: Option<&str>) -> Result<Response, DeliveryError> {
        let request = self.inner.get(url);
        send(url, with_bearer(request, bearer)).await
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        headers: HeaderMap,
        bearer: Option<&str>,
    ) -> Result<Response, DeliveryError> {
        let request = self.inner.post(url).headers(headers).json(body);
        send(url, with_bearer(request, bearer)).await
    }

    pub async fn put_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        bearer: Option<&str>,
    ) -> Result<Response, DeliveryError> {
        let request = self.inner.put(url).json(body);
        send(url, with_bearer(request, bearer)).await
    }

    pub async fn post_form<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        form: &T,
    ) -> Result<Response, DeliveryError> {
        send(url, self.inner.post(url).form(form)).await
    }
}

fn with_bearer(request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
    match bearer {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

async fn send(url: &str, request: RequestBuilder) -> Result<Response, DeliveryError> {
    let resp = request.send().await.map_err(|e| DeliveryError::Request {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    Err(DeliveryError::Status {
        url: url.to_string(),
        status,
        body: text.chars().take(200).collect(),
    })
}
