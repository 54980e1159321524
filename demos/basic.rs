//! Local host with one signed route and a storage-backed upload endpoint.
//!
//! Run with:
//!   LOG_FORMAT=pretty cargo run --example basic
//!
//! The demo prints a ready-to-use `curl` line carrying a valid signature for
//! `GET /items/42`. Uploads go to an in-memory bucket:
//!   curl -X PUT http://localhost:3000/files/hello.txt -d 'hi'
//!   curl http://localhost:3000/files/hello.txt

use std::collections::HashMap;
use std::sync::Arc;

use gatekit::middleware::RequestVerifier;
use gatekit::signing::{CanonicalProfile, RequestSigner, SigningKey};
use gatekit::storage::Bucket;
use gatekit::{Chain, Config, Error, Method, Next, Reply, Request, Response, Router, Server, header};
use http::StatusCode;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let config = Config::from_env();
    gatekit::logging::init(&config.log)?;

    let key = SigningKey::from_slice(&[0x5a; 32])
        .map_err(|e| Error::internal(e.to_string()))?;
    let signer = RequestSigner::new(key, CanonicalProfile::trace());
    let verifier = RequestVerifier::new(signer.verifying_key(), CanonicalProfile::trace());

    print_signed_curl(&signer)?;

    let bucket = Arc::new(Bucket::in_memory("demo"));
    let put_bucket = Arc::clone(&bucket);
    let get_bucket = Arc::clone(&bucket);

    let app = Router::new()
        .with(timing)
        .route(Method::Get, "/items/{id}", Chain::new().then(verifier).then(get_item))
        .on(Method::Put, "/files/{name}", move |req: Request| {
            let bucket = Arc::clone(&put_bucket);
            async move { upload(&bucket, req).await }
        })
        .on(Method::Get, "/files/{name}", move |req: Request| {
            let bucket = Arc::clone(&get_bucket);
            async move { download(&bucket, req).await }
        });

    Server::bind("127.0.0.1:3000")?.serve(app).await
}

async fn timing(req: Request, next: Next) -> Reply {
    let started = std::time::Instant::now();
    let path = req.path().to_owned();
    let reply = next.run(req).await;
    info!(path = %path, elapsed_ms = started.elapsed().as_millis() as u64, "handled");
    reply
}

async fn get_item(req: Request) -> Response {
    let id = req.param("id").unwrap_or_default();
    Response::json(format!(r#"{{"id":"{id}","name":"widget"}}"#))
}

async fn upload(bucket: &Bucket, req: Request) -> Result<StatusCode, Error> {
    let name = req.param("name").unwrap_or_default();
    if req.body().is_empty() {
        return Err(Error::bad_request("empty upload"));
    }
    let metadata = HashMap::from([("source-ip".to_owned(), req.source_ip().to_owned())]);
    bucket.put(name, req.body().to_vec(), metadata).await?;
    Ok(StatusCode::CREATED)
}

async fn download(bucket: &Bucket, req: Request) -> Result<Response, Error> {
    let name = req.param("name").unwrap_or_default();
    let content = bucket.get(name).await?;
    Ok(Response::builder().bytes(gatekit::ContentType::OctetStream, content))
}

fn print_signed_curl(signer: &RequestSigner) -> Result<(), Error> {
    let req = Request::builder()
        .method("GET")
        .path("/items/42")
        .header(header::TRACE_ID, "demo-trace")
        .build();
    let req = signer.sign(req)?;
    println!(
        "curl http://127.0.0.1:3000/items/42 -H '{}: demo-trace' -H '{}: {}' -H '{}: {}'",
        header::TRACE_ID,
        header::TIMESTAMP,
        req.header_or_empty(header::TIMESTAMP),
        header::SIGNATURE,
        req.header_or_empty(header::SIGNATURE),
    );
    Ok(())
}
