use pathrpc_codec::{BodySink, ClientCodec, CodecError, Request, Response, Result};
use reqwest::blocking::{Client, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use serde::de::{Deserialize, IgnoredAny};
use tracing::debug;
use url::Url;

use crate::body::{ErrorBody, ARG_FIELD, JSON_CONTENT_TYPE};

struct Pending {
    seq: u64,
    response: HttpResponse,
}

/// Client codec issuing every call as an HTTP POST.
///
/// The argument is sent as JSON in form field `p` to `base_url + path`.
/// The response is interpreted lazily by the read methods. Only one call
/// can be in flight; writing a new request drops an unread response.
pub struct HttpClientCodec {
    client: Client,
    base_url: String,
    pending: Option<Pending>,
}

impl HttpClientCodec {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder().build().map_err(http_error)?;
        Self::with_client(client, base_url)
    }

    /// Use a preconfigured reqwest client (timeouts, proxies).
    pub fn with_client(client: Client, base_url: &str) -> Result<Self> {
        Url::parse(base_url).map_err(http_error)?;
        // Paths are slash-rooted, so one trailing slash on the base is dropped.
        let base_url = base_url.strip_suffix('/').unwrap_or(base_url).to_string();
        Ok(Self {
            client,
            base_url,
            pending: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn http_error(err: impl std::error::Error + Send + Sync + 'static) -> CodecError {
    CodecError::Http(Box::new(err))
}

fn is_json(response: &HttpResponse) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        == Some(JSON_CONTENT_TYPE)
}

impl ClientCodec for HttpClientCodec {
    fn write_request(
        &mut self,
        request: &Request,
        arg: &dyn erased_serde::Serialize,
    ) -> Result<()> {
        if !request.path.starts_with('/') {
            return Err(CodecError::BadPath(request.path.clone()));
        }
        let data = serde_json::to_string(arg)?;
        let url = format!("{}{}", self.base_url, request.path);
        debug!(seq = request.seq, %url, "posting call");

        self.pending = None;
        let response = self
            .client
            .post(url)
            .form(&[(ARG_FIELD, data)])
            .send()
            .map_err(http_error)?;
        self.pending = Some(Pending {
            seq: request.seq,
            response,
        });
        Ok(())
    }

    fn read_response_header(&mut self) -> Result<Response> {
        let pending = self.pending.as_mut().ok_or(CodecError::NoPendingRequest)?;
        let status = pending.response.status();
        if status == StatusCode::OK {
            return Ok(Response::ok(pending.seq));
        }
        if status != StatusCode::BAD_REQUEST || !is_json(&pending.response) {
            self.pending = None;
            return Err(CodecError::HttpStatus(status.to_string()));
        }

        let body: ErrorBody = serde_json::from_reader(&mut pending.response)?;
        Ok(Response::failed(pending.seq, body.error, body.error_path))
    }

    fn read_response_body(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()> {
        let Pending { response, .. } = self.pending.take().ok_or(CodecError::NoPendingRequest)?;
        if response.status() != StatusCode::OK {
            return Ok(());
        }

        let mut de = serde_json::Deserializer::from_reader(response);
        match sink {
            Some(sink) => {
                let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
                sink.decode(&mut erased).map_err(CodecError::decode)?;
            }
            None => {
                IgnoredAny::deserialize(&mut de)?;
            }
        }
        de.end()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_stripped_once() {
        let codec = HttpClientCodec::new("http://127.0.0.1:8080/rpc/").unwrap();
        assert_eq!(codec.base_url(), "http://127.0.0.1:8080/rpc");
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        assert!(matches!(
            HttpClientCodec::new("not a url"),
            Err(CodecError::Http(_))
        ));
    }

    #[test]
    fn relative_path_is_rejected_before_sending() {
        let mut codec = HttpClientCodec::new("http://127.0.0.1:9").unwrap();
        let err = codec
            .write_request(&Request::new("foo/bar", 1), &())
            .unwrap_err();
        assert_eq!(err.to_string(), r#"bad path in RPC request: "foo/bar""#);
    }

    #[test]
    fn reading_without_request_fails() {
        let mut codec = HttpClientCodec::new("http://127.0.0.1:9").unwrap();
        assert!(matches!(
            codec.read_response_header(),
            Err(CodecError::NoPendingRequest)
        ));
    }
}
