use std::borrow::Cow;
use std::io::Read;

use pathrpc_codec::{BodySink, CodecError, Request, Response, Result, ServerCodec};
use tiny_http::{Header, StatusCode};
use url::form_urlencoded;

use crate::body::{ErrorBody, ARG_FIELD, JSON_CONTENT_TYPE};
use crate::config::HttpConfig;

/// Server codec for exactly one HTTP exchange.
///
/// The first header read yields the URL path with sequence 0, every later
/// read reports the end of the stream. The response is written once.
pub struct HttpServerCodec {
    request: Option<tiny_http::Request>,
    config: HttpConfig,
    header_read: bool,
}

impl HttpServerCodec {
    pub fn new(request: tiny_http::Request, config: HttpConfig) -> Self {
        Self {
            request: Some(request),
            config,
            header_read: false,
        }
    }

    /// The HTTP request, if no response has been written to it.
    pub fn into_unanswered(self) -> Option<tiny_http::Request> {
        self.request
    }

    fn request_mut(&mut self) -> Result<&mut tiny_http::Request> {
        self.request.as_mut().ok_or(CodecError::NoPendingRequest)
    }

    /// Value of form field `p`: the form-encoded body first, then the query.
    fn argument(&mut self) -> Result<Option<String>> {
        let max = self.config.max_body_size;
        let request = self.request_mut()?;

        if has_content_type(request, "application/x-www-form-urlencoded") {
            let mut body = Vec::new();
            request
                .as_reader()
                .take(max as u64 + 1)
                .read_to_end(&mut body)?;
            if body.len() > max {
                return Err(CodecError::PayloadTooLarge {
                    size: body.len(),
                    max,
                });
            }
            if let Some(value) = form_value(&body) {
                return Ok(Some(value));
            }
        }

        Ok(request
            .url()
            .split_once('?')
            .and_then(|(_, query)| form_value(query.as_bytes())))
    }
}

fn form_value(form: &[u8]) -> Option<String> {
    form_urlencoded::parse(form)
        .find(|(key, _)| key == ARG_FIELD)
        .map(|(_, value)| value.into_owned())
}

fn has_content_type(request: &tiny_http::Request, expected: &str) -> bool {
    request
        .headers()
        .iter()
        .find(|header| header.field.equiv("Content-Type"))
        .and_then(|header| header.value.as_str().split(';').next())
        .is_some_and(|value| value.trim().eq_ignore_ascii_case(expected))
}

fn json_header() -> Result<Header> {
    Header::from_bytes(&b"Content-Type"[..], JSON_CONTENT_TYPE.as_bytes())
        .map_err(|()| CodecError::Http("invalid Content-Type header".into()))
}

impl ServerCodec for HttpServerCodec {
    fn read_request_header(&mut self) -> Result<Option<Request>> {
        if self.header_read {
            return Ok(None);
        }
        self.header_read = true;

        let url = self.request_mut()?.url();
        let raw_path = url.split_once('?').map_or(url, |(path, _)| path);
        let path = urlencoding::decode(raw_path)
            .map_err(|_| CodecError::BadPath(raw_path.to_string()))?;
        Ok(Some(Request::new(path.into_owned(), 0)))
    }

    fn read_request_body(&mut self, sink: Option<&mut dyn BodySink>) -> Result<()> {
        let Some(sink) = sink else {
            return Ok(());
        };
        // A missing argument decodes as `null`.
        let arg = self
            .argument()?
            .map_or(Cow::Borrowed("null"), Cow::Owned);

        let mut de = serde_json::Deserializer::from_str(&arg);
        {
            let mut erased = <dyn erased_serde::Deserializer>::erase(&mut de);
            sink.decode(&mut erased).map_err(CodecError::decode)?;
        }
        de.end()?;
        Ok(())
    }

    fn write_response(
        &mut self,
        response: &Response,
        body: Option<&dyn erased_serde::Serialize>,
    ) -> Result<()> {
        let (status, data) = if response.is_error() {
            let error = ErrorBody {
                error: response.error.clone(),
                error_path: response.error_path.clone(),
            };
            (StatusCode(400), serde_json::to_vec(&error)?)
        } else {
            (StatusCode(200), serde_json::to_vec(body.unwrap_or(&()))?)
        };
        let header = json_header()?;

        let request = self.request.take().ok_or(CodecError::NoPendingRequest)?;
        // Never chunk, so every reply carries Content-Length.
        let reply = tiny_http::Response::from_data(data)
            .with_chunked_threshold(usize::MAX)
            .with_status_code(status)
            .with_header(header);
        request.respond(reply)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_value_finds_argument_field() {
        assert_eq!(
            form_value(b"x=1&p=%7B%22a%22%3A1%7D").as_deref(),
            Some(r#"{"a":1}"#)
        );
        assert_eq!(form_value(b"p=a+b").as_deref(), Some("a b"));
        assert_eq!(form_value(b"q=1"), None);
    }

    #[test]
    fn json_header_is_valid() {
        let header = json_header().unwrap();
        assert!(header.field.equiv("Content-Type"));
        assert_eq!(header.value.as_str(), "application/json");
    }
}
