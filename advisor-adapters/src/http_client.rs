use std::sync::Arc;
use std::time::Duration;

use hyper::body::{Bytes, to_bytes};
use hyper::client::HttpConnector;
use hyper::header::{CONTENT_TYPE, HeaderName, HeaderValue, RETRY_AFTER};
use hyper::{Body, Client, Request, StatusCode, Uri};
use rustls::{ClientConfig, OwnedTrustAnchor, RootCertStore};
use tokio::time::timeout;
use tracing::debug;
use webpki_roots::TLS_SERVER_ROOTS;

use crate::traits::{AdapterError, AdapterResult};

pub(crate) type HyperClient = Client<hyper_rustls::HttpsConnector<HttpConnector>, Body>;

pub(crate) fn build_https_client() -> HyperClient {
    let mut roots = RootCertStore::empty();
    roots.add_trust_anchors(TLS_SERVER_ROOTS.iter().map(|anchor| {
        OwnedTrustAnchor::from_subject_spki_name_constraints(
            anchor.subject,
            anchor.spki,
            anchor.name_constraints,
        )
    }));

    let config = ClientConfig::builder()
        .with_safe_defaults()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let mut http = HttpConnector::new();
    http.enforce_http(false);

    let connector = hyper_rustls::HttpsConnector::from((http, Arc::new(config)));

    Client::builder().build::<_, Body>(connector)
}

/// Normalises a base URL so endpoint paths can be appended.
pub(crate) fn sanitize_base_url(input: &str) -> AdapterResult<String> {
    let mut base = input.trim().to_owned();
    if !(base.starts_with("http://") || base.starts_with("https://")) {
        return Err(AdapterError::configuration(format!(
            "base URL `{base}` must start with http:// or https://"
        )));
    }
    if !base.ends_with('/') {
        base.push('/');
    }
    base.parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid base URL `{base}`: {err}")))?;
    Ok(base)
}

/// Joins a sanitised base URL and an endpoint path.
pub(crate) fn endpoint(provider: &str, base: &str, path: &str) -> AdapterResult<Uri> {
    format!("{base}{path}")
        .parse::<Uri>()
        .map_err(|err| AdapterError::configuration(format!("invalid {provider} endpoint: {err}")))
}

/// POSTs a JSON body and returns the successful response body.
///
/// The deadline covers connecting, sending, and reading the whole body.
pub(crate) async fn post_json(
    client: &HyperClient,
    provider: &'static str,
    endpoint: Uri,
    headers: &[(HeaderName, HeaderValue)],
    body: Vec<u8>,
    deadline: Duration,
) -> AdapterResult<Bytes> {
    let mut builder = Request::post(endpoint).header(CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(name.clone(), value.clone());
    }
    let request = builder.body(Body::from(body)).map_err(|err| {
        AdapterError::invalid_request(format!("failed to build {provider} request: {err}"))
    })?;

    let exchange = async {
        let response = client
            .request(request)
            .await
            .map_err(|err| AdapterError::transport(format!("{provider} request failed: {err}")))?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let bytes = to_bytes(response.into_body()).await.map_err(|err| {
            AdapterError::transport(format!("failed to read {provider} response: {err}"))
        })?;
        Ok::<_, AdapterError>((status, retry_after, bytes))
    };

    let (status, retry_after, bytes) = timeout(deadline, exchange)
        .await
        .map_err(|_| AdapterError::Timeout { after: deadline })??;

    debug!(provider, %status, bytes = bytes.len(), "provider responded");
    check_status(provider, status, retry_after, &bytes)?;
    Ok(bytes)
}

fn check_status(
    provider: &str,
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &[u8],
) -> AdapterResult<()> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AdapterError::RateLimited { retry_after });
    }
    if !status.is_success() {
        let reason = String::from_utf8_lossy(body);
        return Err(AdapterError::response(format!(
            "{provider} returned {status}: {reason}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_requires_scheme() {
        let err =
            sanitize_base_url("generativelanguage.googleapis.com").expect_err("missing scheme");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let base = sanitize_base_url(" http://localhost:11434 ").unwrap();
        assert_eq!(base, "http://localhost:11434/");
    }

    #[test]
    fn endpoint_rejects_unparsable_paths() {
        let uri = endpoint("Ollama", "http://localhost:11434/", "api/chat").unwrap();
        assert_eq!(uri.path(), "/api/chat");
        assert!(endpoint("Gemini", "https://host/", "models/a b").is_err());
    }

    #[test]
    fn status_mapping() {
        assert!(check_status("x", StatusCode::OK, None, b"").is_ok());
        assert!(matches!(
            check_status("x", StatusCode::TOO_MANY_REQUESTS, Some(Duration::from_secs(2)), b""),
            Err(AdapterError::RateLimited {
                retry_after: Some(_)
            })
        ));
        let err = check_status("Gemini", StatusCode::BAD_REQUEST, None, b"bad key")
            .expect_err("400");
        assert!(err.to_string().contains("Gemini returned 400 Bad Request: bad key"));
    }
}
