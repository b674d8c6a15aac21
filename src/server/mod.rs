//! HTTP server
//!
//! Thin hyper adapter between the wire and the orchestrator: one spawned
//! task per connection, request path and Accept header in, a
//! [`ServiceResponse`](crate::handler::ServiceResponse) mapped onto the
//! response out. All pipeline logic lives behind
//! [`handler::handle`](crate::handler::handle); this layer never makes
//! decisions about requests.

use std::convert::Infallible;
use std::error::Error;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

use crate::context::Context;
use crate::handler;

/// Accept connections and serve until the process is stopped.
pub async fn run(ctx: Arc<Context>, address: &str, port: u16) -> Result<(), Box<dyn Error>> {
    let listener = TcpListener::bind((address, port)).await?;
    tracing::info!(address, port, "listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let ctx = ctx.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| respond(ctx.clone(), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(peer = %peer, error = %e, "connection closed with error");
            }
        });
    }
}

async fn respond(
    ctx: Arc<Context>,
    req: Request<hyper::body::Incoming>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let is_head = req.method() == Method::HEAD;
    if !is_head && req.method() != Method::GET {
        return Ok(plain_status(StatusCode::METHOD_NOT_ALLOWED));
    }

    let path = req.uri().path().trim_start_matches('/').to_string();
    let accept = req
        .headers()
        .get(hyper::header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let service_response = handler::handle(ctx, &path, accept.as_deref()).await;

    let mut builder = Response::builder().status(
        StatusCode::from_u16(service_response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
    );
    for (name, value) in &service_response.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let body = if is_head {
        Bytes::new()
    } else {
        service_response.body
    };

    Ok(builder
        .body(Full::new(body))
        .unwrap_or_else(|_| plain_status(StatusCode::INTERNAL_SERVER_ERROR)))
}

fn plain_status(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}
