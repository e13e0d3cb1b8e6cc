use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use pathrpc_codec::{BodySink, Request, Response, ServerCodec};
use pathrpc_transport::Listener;
use tracing::{debug, info, warn};

use crate::error::{CallError, PathError, RequestError, Result, ServerError};
use crate::registry::{ArgType, Registry};
use crate::resolve::{resolve_path, split_path, ResolvedElement};
use crate::value::{Context, Value};

type CheckContextFn = dyn Fn(&Context) -> std::result::Result<(), CallError> + Send + Sync;

/// Serves path-routed calls against a root value and its registry.
///
/// Cloning is cheap; clones share the registry and root.
#[derive(Clone)]
pub struct Server {
    registry: Arc<Registry>,
    root: Value,
    check_context: Option<Arc<CheckContextFn>>,
}

impl Server {
    /// Fails if the root value's type has no registry entry.
    pub fn new(registry: Registry, root: Value) -> Result<Self> {
        if !registry.contains(root.type_key()) {
            return Err(ServerError::UnregisteredRoot(root.type_key().name()));
        }
        Ok(Self {
            registry: Arc::new(registry),
            root,
            check_context: None,
        })
    }

    /// Validate each connection's context once before serving it.
    pub fn with_context_check<F>(mut self, check: F) -> Self
    where
        F: Fn(&Context) -> std::result::Result<(), CallError> + Send + Sync + 'static,
    {
        self.check_context = Some(Arc::new(check));
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Serve requests from `codec` until the peer ends the stream.
    ///
    /// Resolution and invocation failures are answered in the response and
    /// the loop continues. Codec failures end the loop with an error.
    pub fn serve_codec<C: ServerCodec + ?Sized>(
        &self,
        codec: &mut C,
        context: &Context,
    ) -> Result<()> {
        if let Some(check) = &self.check_context {
            check(context).map_err(ServerError::ContextRejected)?;
        }
        while let Some(request) = codec.read_request_header()? {
            self.serve_request(codec, context, &request)?;
        }
        Ok(())
    }

    /// Accept connections from `listener` and serve each on its own thread.
    ///
    /// For every connection the context is built from the stream first,
    /// then the codec takes ownership of it. The connection closes when its
    /// serving loop returns. Returns only when accepting fails.
    pub fn accept<L, C, NC, NX>(&self, listener: &L, new_codec: NC, new_context: NX) -> Result<()>
    where
        L: Listener,
        C: ServerCodec,
        NC: Fn(L::Stream) -> pathrpc_codec::Result<C> + Send + Sync + 'static,
        NX: Fn(&L::Stream) -> Context + Send + Sync + 'static,
    {
        let new_codec = Arc::new(new_codec);
        let new_context = Arc::new(new_context);
        let next_id = AtomicU64::new(1);
        info!(addr = %listener.local_addr(), "accepting connections");

        loop {
            let stream = listener.accept()?;
            let conn = next_id.fetch_add(1, Ordering::Relaxed);
            debug!(conn, "connection accepted");

            let server = self.clone();
            let new_codec = Arc::clone(&new_codec);
            let new_context = Arc::clone(&new_context);
            thread::Builder::new()
                .name(format!("pathrpc-conn-{conn}"))
                .spawn(move || {
                    let context = new_context(&stream);
                    let served = new_codec(stream)
                        .map_err(ServerError::from)
                        .and_then(|mut codec| server.serve_codec(&mut codec, &context));
                    match served {
                        Ok(()) => debug!(conn, "connection closed"),
                        Err(err) => warn!(conn, error = %err, "connection failed"),
                    }
                })
                .map_err(ServerError::Spawn)?;
        }
    }

    fn serve_request<C: ServerCodec + ?Sized>(
        &self,
        codec: &mut C,
        context: &Context,
        request: &Request,
    ) -> Result<()> {
        debug!(seq = request.seq, path = %request.path, "serving request");

        let outcome = match resolve_path(&self.registry, self.root.type_key(), &request.path) {
            Ok(resolved) => {
                let arg = read_argument(codec, &resolved)?;
                self.invoke(&request.path, &resolved, context, arg)
            }
            Err(err) => {
                codec.read_request_body(None)?;
                Err(err)
            }
        };

        match outcome {
            Ok(value) => {
                let body = value.as_ref().and_then(Value::as_serialize);
                codec.write_response(&Response::ok(request.seq), body)?;
            }
            Err(err) => {
                debug!(seq = request.seq, error = %err, "request failed");
                codec.write_response(&err.to_response(request.seq), None)?;
            }
        }
        Ok(())
    }

    fn invoke(
        &self,
        path: &str,
        resolved: &[ResolvedElement<'_>],
        context: &Context,
        mut body_arg: Option<Value>,
    ) -> std::result::Result<Option<Value>, RequestError> {
        let elements = split_path(path);
        let last = resolved.len() - 1;
        let mut receiver = self.root.clone();
        let mut result = None;

        for (i, element) in resolved.iter().enumerate() {
            let arg = match &element.inline_arg {
                Some(inline) => Some(Value::new(inline.clone())),
                None if i == last => body_arg.take(),
                None => None,
            };
            match element.procedure.invoke(&receiver, context, arg) {
                Ok(value) if i == last => result = value,
                Ok(Some(value)) => receiver = value,
                Ok(None) => {
                    let reason = "no value to navigate from";
                    return Err(PathError::new(reason, &elements[..=i]).into());
                }
                Err(err) if i == last => return Err(RequestError::Call(err)),
                Err(err) => return Err(PathError::new(err, &elements[..=i]).into()),
            }
        }
        Ok(result)
    }
}

/// Read the request body into the last element's argument, or discard it.
fn read_argument<C: ServerCodec + ?Sized>(
    codec: &mut C,
    resolved: &[ResolvedElement<'_>],
) -> Result<Option<Value>> {
    let arg_type = match resolved.last() {
        Some(last) if last.inline_arg.is_none() => last.procedure.arg_type(),
        _ => None,
    };
    let Some(arg_type) = arg_type else {
        codec.read_request_body(None)?;
        return Ok(None);
    };

    let mut sink = ArgSink {
        arg_type,
        value: None,
    };
    codec.read_request_body(Some(&mut sink))?;
    Ok(sink.value)
}

struct ArgSink {
    arg_type: ArgType,
    value: Option<Value>,
}

impl BodySink for ArgSink {
    fn decode(
        &mut self,
        de: &mut dyn erased_serde::Deserializer<'_>,
    ) -> std::result::Result<(), erased_serde::Error> {
        self.value = Some(self.arg_type.decode(de)?);
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use pathrpc_codec::{ClientCodec, JsonMarshal, Slot, StreamClientCodec, StreamServerCodec};
    use pathrpc_transport::UnixDomainSocket;

    use super::*;

    struct Root;

    struct Foo {
        log: Mutex<Vec<String>>,
    }

    fn server() -> Server {
        let foo = Arc::new(Foo {
            log: Mutex::new(Vec::new()),
        });
        let mut builder = Registry::builder();
        builder
            .register::<Root>()
            .object("foo", move |_, _| Ok(Arc::clone(&foo)))
            .getter("ping", |_, _| Ok("pong"))
            .method("double", |_, _, n: u64| Ok(n * 2))
            .method("whoami", |_, ctx, _: ()| {
                Ok(ctx.get::<String>().cloned().unwrap_or_default())
            })
            .object_by_id("fail", |_, _, reason| -> std::result::Result<Arc<Foo>, CallError> {
                Err(reason.into())
            });
        builder
            .register::<Foo>()
            .method("bar", |_, _, s: String| Ok(s))
            .method("record", |foo: &Foo, _, entry: String| {
                let mut log = foo.log.lock().map_err(|_| "log poisoned")?;
                log.push(entry);
                Ok(log.len())
            })
            .getter("explode", |_, _| -> std::result::Result<u8, CallError> {
                Err("boom".into())
            });
        Server::new(builder.build(), Value::new(Root)).expect("root should be registered")
    }

    fn spawn_server(server: Server, context: Context) -> StreamClientCodec<JsonMarshal<UnixStream>> {
        let (client, conn) = UnixStream::pair().expect("socket pair should open");
        thread::spawn(move || {
            let mut codec = StreamServerCodec::json(conn);
            server
                .serve_codec(&mut codec, &context)
                .expect("serving loop should end cleanly");
        });
        StreamClientCodec::json(client)
    }

    fn call<C: ClientCodec>(
        codec: &mut C,
        path: &str,
        seq: u64,
        arg: &dyn erased_serde::Serialize,
    ) -> (Response, serde_json::Value) {
        codec
            .write_request(&Request::new(path, seq), arg)
            .expect("request should be written");
        let header = codec.read_response_header().expect("response header");
        let mut body = Slot::<serde_json::Value>::new();
        codec
            .read_response_body(Some(&mut body))
            .expect("response body");
        (header, body.take().expect("body should be present"))
    }

    #[test]
    fn new_rejects_unregistered_root() {
        let err = Server::new(Registry::default(), Value::new(Root)).err();
        assert!(matches!(err, Some(ServerError::UnregisteredRoot(_))));
    }

    #[test]
    fn inline_argument_chain_returns_value() {
        let mut client = spawn_server(server(), Context::empty());
        let (header, body) = call(&mut client, "foo/bar-x", 1, &());
        assert_eq!(header, Response::ok(1));
        assert_eq!(body, serde_json::json!("x"));
    }

    #[test]
    fn body_argument_is_bound_to_last_element() {
        let mut client = spawn_server(server(), Context::empty());
        let (header, body) = call(&mut client, "double", 7, &21u64);
        assert_eq!(header, Response::ok(7));
        assert_eq!(body, serde_json::json!(42));

        let (_, body) = call(&mut client, "foo/bar", 8, &"from body");
        assert_eq!(body, serde_json::json!("from body"));
    }

    #[test]
    fn responses_follow_request_order() {
        let mut client = spawn_server(server(), Context::empty());
        for seq in 1..=3u64 {
            client
                .write_request(&Request::new("double", seq), &seq)
                .expect("request should be written");
        }
        for seq in 1..=3u64 {
            let header = client.read_response_header().expect("response header");
            assert_eq!(header.seq, seq);
            let mut body = Slot::<u64>::new();
            client.read_response_body(Some(&mut body)).expect("body");
            assert_eq!(body.take(), Some(seq * 2));
        }
    }

    #[test]
    fn unused_body_is_drained() {
        let mut client = spawn_server(server(), Context::empty());
        let big = serde_json::json!({"nested": [1, 2, {"deep": "value"}], "more": "text"});
        let (header, body) = call(&mut client, "ping", 1, &big);
        assert_eq!(header, Response::ok(1));
        assert_eq!(body, serde_json::json!("pong"));

        let (_, body) = call(&mut client, "foo/bar-inline", 2, &big);
        assert_eq!(body, serde_json::json!("inline"));

        let (header, body) = call(&mut client, "double", 3, &5u64);
        assert_eq!(header, Response::ok(3));
        assert_eq!(body, serde_json::json!(10));
    }

    #[test]
    fn resolution_failures_keep_connection() {
        let mut client = spawn_server(server(), Context::empty());

        let (header, body) = call(&mut client, "foo/baz", 1, &"ignored");
        assert_eq!(header, Response::failed(1, "not found", "foo/baz"));
        assert_eq!(body, serde_json::Value::Null);

        let (header, _) = call(&mut client, "", 2, &());
        assert_eq!(header, Response::failed(2, "empty path", ""));

        let (header, _) = call(&mut client, "double-3", 3, &());
        assert_eq!(
            header,
            Response::failed(
                3,
                "string argument given for inappropriate method/field: u64",
                "double-3"
            )
        );

        let (header, body) = call(&mut client, "ping", 4, &());
        assert_eq!(header, Response::ok(4));
        assert_eq!(body, serde_json::json!("pong"));
    }

    #[test]
    fn invocation_errors_carry_path_except_at_last_element() {
        let mut client = spawn_server(server(), Context::empty());

        let (header, _) = call(&mut client, "foo/explode", 1, &());
        assert_eq!(header, Response::failed(1, "boom", ""));

        let (header, _) = call(&mut client, "fail-gone/bar-x", 2, &());
        assert_eq!(header, Response::failed(2, "gone", "fail-gone"));
    }

    #[test]
    fn non_final_element_without_inline_argument_fails() {
        let mut client = spawn_server(server(), Context::empty());
        let (header, _) = call(&mut client, "fail/bar-x", 1, &());
        assert_eq!(
            header,
            Response::failed(1, r#"missing argument for "fail""#, "fail")
        );
    }

    #[test]
    fn navigating_past_a_value_less_element_is_not_found() {
        let mut client = spawn_server(server(), Context::empty());
        let (header, _) = call(&mut client, "ping/len", 1, &());
        assert_eq!(header, Response::failed(1, "not found", "ping/len"));
    }

    #[test]
    fn object_results_encode_as_null() {
        let mut client = spawn_server(server(), Context::empty());
        let (header, body) = call(&mut client, "foo", 1, &());
        assert_eq!(header, Response::ok(1));
        assert_eq!(body, serde_json::Value::Null);
    }

    #[test]
    fn context_reaches_procedures() {
        let mut client = spawn_server(server(), Context::new("alice".to_string()));
        let (_, body) = call(&mut client, "whoami", 1, &());
        assert_eq!(body, serde_json::json!("alice"));
    }

    #[test]
    fn context_check_rejects_connection() {
        let server = server().with_context_check(|ctx| {
            if ctx.is_empty() {
                Err("anonymous connection".into())
            } else {
                Ok(())
            }
        });
        let (_client, conn) = UnixStream::pair().expect("socket pair should open");
        let mut codec = StreamServerCodec::json(conn);
        let err = server
            .serve_codec(&mut codec, &Context::empty())
            .unwrap_err();
        assert!(matches!(err, ServerError::ContextRejected(_)));
    }

    #[test]
    fn malformed_body_ends_connection() {
        let (client, conn) = UnixStream::pair().expect("socket pair should open");
        let server = server();
        let handle = thread::spawn(move || {
            let mut codec = StreamServerCodec::json(conn);
            server.serve_codec(&mut codec, &Context::empty())
        });

        let mut client = StreamClientCodec::json(client);
        client
            .write_request(&Request::new("double", 1), &"not a number")
            .expect("request should be written");
        let err = handle
            .join()
            .expect("server thread should finish")
            .unwrap_err();
        assert!(matches!(err, ServerError::Codec(_)));
    }

    fn make_sock_path(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "pathrpc-{}-{}-{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("time should be after epoch")
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
        dir.join("server.sock")
    }

    #[test]
    fn accept_serves_each_connection_independently() {
        let sock_path = make_sock_path("accept");
        let listener = UnixDomainSocket::bind(&sock_path).expect("listener should bind");
        let server = server();
        thread::spawn(move || {
            let _ = server.accept(
                &listener,
                |stream| Ok(StreamServerCodec::json(stream)),
                |stream| Context::new(stream.transport_name().to_string()),
            );
        });

        let mut first = StreamClientCodec::json(
            UnixDomainSocket::connect(&sock_path).expect("first client should connect"),
        );
        let mut second = StreamClientCodec::json(
            UnixDomainSocket::connect(&sock_path).expect("second client should connect"),
        );

        let (_, body) = call(&mut second, "foo/record", 1, &"b");
        assert_eq!(body, serde_json::json!(1));
        let (_, body) = call(&mut first, "foo/record", 1, &"a");
        assert_eq!(body, serde_json::json!(2));
        let (_, body) = call(&mut first, "whoami", 2, &());
        assert_eq!(body, serde_json::json!("unix"));

        if let Some(parent) = sock_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }
}
