use std::sync::Arc;
use std::thread;

use pathrpc_codec::CodecError;
use pathrpc_dispatch::{Context, Server, ServerError};
use tiny_http::{Header, Method, StatusCode};
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::server::HttpServerCodec;

type NewContextFn = dyn Fn(&tiny_http::Request) -> Context + Send + Sync;

/// Serves RPC calls made as HTTP POST requests.
///
/// Each request runs the dispatch pipeline once through an
/// [`HttpServerCodec`]. Clones share the server and context hook.
#[derive(Clone)]
pub struct HttpHandler {
    server: Server,
    config: HttpConfig,
    new_context: Arc<NewContextFn>,
}

impl HttpHandler {
    pub fn new(server: Server) -> Self {
        Self {
            server,
            config: HttpConfig::default(),
            new_context: Arc::new(|_: &tiny_http::Request| Context::empty()),
        }
    }

    /// Build each call's context from the inbound HTTP request.
    pub fn with_context<F>(mut self, new_context: F) -> Self
    where
        F: Fn(&tiny_http::Request) -> Context + Send + Sync + 'static,
    {
        self.new_context = Arc::new(new_context);
        self
    }

    pub fn with_config(mut self, config: HttpConfig) -> Self {
        self.config = config;
        self
    }

    /// Receive requests from `http` and handle each on its own thread.
    ///
    /// Returns when receiving fails.
    pub fn serve(&self, http: &tiny_http::Server) -> pathrpc_dispatch::Result<()> {
        if let Some(addr) = http.server_addr().to_ip() {
            info!(%addr, "serving HTTP calls");
        }
        loop {
            let request = http
                .recv()
                .map_err(|err| ServerError::Codec(CodecError::Io(err)))?;
            let handler = self.clone();
            thread::Builder::new()
                .name("pathrpc-http".to_string())
                .spawn(move || handler.handle(request))
                .map_err(ServerError::Spawn)?;
        }
    }

    /// Answer one HTTP request.
    ///
    /// Non-POST requests get `405`. A pipeline failure before any response
    /// was written gets `500` with the error as plain text.
    pub fn handle(&self, request: tiny_http::Request) {
        debug!(method = %request.method(), url = request.url(), "http call");
        if *request.method() != Method::Post {
            let allow = Header::from_bytes(&b"Allow"[..], &b"POST"[..]);
            let mut reply = text_reply(405, "method not allowed");
            if let Ok(allow) = allow {
                reply.add_header(allow);
            }
            respond_quietly(request, reply);
            return;
        }

        let context = (self.new_context)(&request);
        let mut codec = HttpServerCodec::new(request, self.config.clone());
        let served = self.server.serve_codec(&mut codec, &context);
        if let Err(err) = &served {
            warn!(error = %err, "http call failed");
        }

        if let Some(request) = codec.into_unanswered() {
            let message = match served {
                Err(err) => err.to_string(),
                Ok(()) => "no response written".to_string(),
            };
            respond_quietly(request, text_reply(500, &message));
        }
    }
}

/// Plain-text reply; `from_string` sets the text content type.
fn text_reply(status: u16, message: &str) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    tiny_http::Response::from_string(format!("{message}\n")).with_status_code(StatusCode(status))
}

fn respond_quietly<R: std::io::Read>(request: tiny_http::Request, reply: tiny_http::Response<R>) {
    if let Err(err) = request.respond(reply) {
        debug!(error = %err, "http reply not delivered");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;
    use std::sync::Arc;

    use pathrpc_codec::CodecError;
    use pathrpc_dispatch::{Client, ClientError, Registry, Value};

    use super::*;
    use crate::client::HttpClientCodec;

    struct Root;
    struct Foo;

    fn handler() -> HttpHandler {
        let mut builder = Registry::builder();
        builder
            .register::<Root>()
            .object("foo", |_, _| Ok(Arc::new(Foo)))
            .method("add", |_, _, pair: (i64, i64)| Ok(pair.0 + pair.1))
            .getter("caller", |_, ctx| {
                Ok(ctx.get::<String>().cloned().unwrap_or_default())
            });
        builder
            .register::<Foo>()
            .method("bar", |_, _, s: String| Ok(s));
        let server = Server::new(builder.build(), Value::new(Root)).expect("root registered");
        HttpHandler::new(server).with_context(|request| {
            Context::new(
                request
                    .remote_addr()
                    .map(|addr| addr.ip().to_string())
                    .unwrap_or_default(),
            )
        })
    }

    fn start() -> String {
        let http = tiny_http::Server::http("127.0.0.1:0").expect("http server should bind");
        let addr = http.server_addr().to_ip().expect("tcp listen address");
        let handler = handler();
        thread::spawn(move || handler.serve(&http));
        format!("http://{addr}")
    }

    fn post(base: &str, path: &str, arg: &str) -> reqwest::blocking::Response {
        reqwest::blocking::Client::new()
            .post(format!("{base}{path}"))
            .form(&[("p", arg)])
            .send()
            .expect("request should complete")
    }

    #[test]
    fn resolution_failure_maps_to_bad_request() {
        let base = start();
        let response = post(&base, "/foo/baz", "null");
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_TYPE],
            "application/json"
        );
        let body: serde_json::Value =
            serde_json::from_reader(response).expect("error body should be json");
        assert_eq!(
            body,
            serde_json::json!({"Error": "not found", "ErrorPath": "foo/baz"})
        );
    }

    #[test]
    fn success_maps_to_ok_with_length() {
        let base = start();
        let response = post(&base, "/foo/bar-x", "");
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert_eq!(response.headers()[reqwest::header::CONTENT_LENGTH], "3");
        let mut text = String::new();
        let mut response = response;
        response.read_to_string(&mut text).expect("body");
        assert_eq!(text, r#""x""#);

        let response = post(&base, "/add", "[40,2]");
        let body: serde_json::Value = serde_json::from_reader(response).expect("json");
        assert_eq!(body, serde_json::json!(42));
    }

    #[test]
    fn client_codec_round_trips_calls() {
        let base = start();
        let mut client = Client::new(HttpClientCodec::new(&base).expect("client codec"));

        let sum: i64 = client.call("/add", &(1, 2)).expect("add should succeed");
        assert_eq!(sum, 3);

        let caller: String = client.call("/caller", &()).expect("caller should succeed");
        assert_eq!(caller, "127.0.0.1");

        let err = client.call::<_, String>("/foo/nope", &()).unwrap_err();
        match err {
            ClientError::Remote { message, path } => {
                assert_eq!(message, "not found");
                assert_eq!(path, "foo/nope");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[test]
    fn large_result_keeps_content_length() {
        let base = start();
        let text = "m".repeat(40_000);
        let arg = serde_json::to_string(&text).expect("argument should encode");
        let response = post(&base, "/foo/bar", &arg);
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        assert!(response
            .headers()
            .get(reqwest::header::TRANSFER_ENCODING)
            .is_none());
        assert_eq!(
            response.headers()[reqwest::header::CONTENT_LENGTH],
            (text.len() + 2).to_string().as_str()
        );
        let body: String = serde_json::from_reader(response).expect("json");
        assert_eq!(body, text);
    }

    #[test]
    fn non_post_is_method_not_allowed() {
        let base = start();
        let response = reqwest::blocking::get(format!("{base}/add")).expect("get should complete");
        assert_eq!(response.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
    }

    #[test]
    fn undecodable_argument_is_server_error() {
        let base = start();
        let response = post(&base, "/add", "{not json");
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn unexpected_status_is_reported_as_http_error() {
        let base = start();
        let mut client = Client::new(HttpClientCodec::new(&base).expect("client codec"));
        let err = client.call::<_, i64>("/add", &"wrong").unwrap_err();
        assert!(matches!(
            err,
            ClientError::Codec(CodecError::HttpStatus(ref status)) if status.starts_with("500")
        ));
    }
}
