//! HTTP/1.1 front end: one task per connection, one route.

use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::{combinators::UnsyncBoxBody, BodyDataStream, BodyExt};
use hyper::{body::Body, server::conn::http1, service::service_fn};
use hyper_util::rt::TokioIo;
use std::{convert::Infallible, fmt, sync::Arc};
use tokio::net::TcpListener;

use crate::{
    response::{self, ResponseBody},
    Config, Error, Multipart, Pipeline,
};

pub const UPLOAD_PATH: &str = "/upload";

/// Name of the form field carrying the file.
pub const FILE_FIELD: &str = "file";

/// Request body as a stream of data chunks.
type RequestStream<E> = BodyDataStream<UnsyncBoxBody<Bytes, E>>;

/// Accepts connections on `listener` until the process is stopped.
pub async fn serve(listener: TcpListener, config: Config) -> Result<(), Error> {
    let config = Arc::new(config);

    log::info!(
        "Listening on {}, validating the first {} bytes of each upload",
        listener.local_addr()?,
        config.validation_bytes
    );

    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                log::error!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let config = config.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, config.clone()));

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                log::warn!("Connection with {} failed: {}", remote, e);
            }
        });
    }
}

/// Routes a single request.
pub async fn handle<B>(
    req: Request<B>,
    config: Arc<Config>,
) -> Result<Response<ResponseBody>, Infallible>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: fmt::Display + Send + 'static,
{
    log::debug!("{} {}", req.method(), req.uri().path());

    let res = match (req.method(), req.uri().path()) {
        (&Method::POST, UPLOAD_PATH) => upload(req, &config).await,
        (_, UPLOAD_PATH) => response::method_not_allowed("POST"),
        _ => response::not_found(),
    };

    Ok(res)
}

async fn upload<B>(req: Request<B>, config: &Config) -> Response<ResponseBody>
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: fmt::Display + Send + 'static,
{
    let (parts, body) = req.into_parts();
    let body: RequestStream<B::Error> = body.boxed_unsync().into_data_stream();

    let multipart = match Multipart::from_headers(&parts.headers, body) {
        Ok(multipart) => multipart,
        Err(e) => {
            log::info!("Refusing upload: {}", e);
            return response::from_error(&e);
        }
    };

    let file = match multipart.into_part(FILE_FIELD).await {
        Ok(file) => file,
        Err(e) => {
            log::info!("Refusing upload: {}", e);
            return response::from_error(&e);
        }
    };

    log::debug!("Receiving file {:?}", file.filename());

    let outcome = Pipeline::new(file, config.validation_bytes).run().await;
    response::from_outcome(outcome)
}
