use crate::feed::FeedKey;
use crate::feed_service::FeedService;
use crate::web_cache::{CachedPayload, ContentEncoding};
use log::{debug, error, info};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::http::header::{HeaderValue, CONTENT_ENCODING, CONTENT_TYPE, VARY};
use warp::http::StatusCode;
use warp::hyper::Body;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

fn with_service(
    service: Arc<FeedService>,
) -> impl Filter<Extract = (Arc<FeedService>,), Error = Infallible> + Clone {
    warp::any().map(move || service.clone())
}

/// `GET /api/<feed>` and `GET /<feed>`
pub fn routes(
    service: Arc<FeedService>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let cors_policy = warp::cors()
        .allow_any_origin()
        .allow_headers(vec![
            "Origin",
            "Accept",
            "Accept-Encoding",
            "X-Requested-With",
            "Content-Type",
        ])
        .allow_methods(["GET"]);

    let feed_name = warp::path!("api" / String)
        .or(warp::path!(String))
        .unify();

    warp::get()
        .and(feed_name)
        .and(warp::header::optional::<String>("accept-encoding"))
        .and(with_service(service))
        .and_then(serve_feed)
        .with(cors_policy)
        .with(warp::log("metlink_relay::web"))
}

pub async fn serve(service: Arc<FeedService>) {
    let addr = SocketAddr::new(service.config().bind_addr, service.config().port);
    info!("Listening on {addr}");
    warp::serve(routes(service)).run(addr).await;
}

async fn serve_feed(
    name: String,
    accept_encoding: Option<String>,
    service: Arc<FeedService>,
) -> Result<Response, Infallible> {
    let Some(key) = FeedKey::new(&name) else {
        return Ok(empty(StatusCode::NOT_FOUND));
    };

    match service.get_feed(&key).await {
        Ok(payload) => Ok(payload_response(
            &payload,
            accepts_gzip(accept_encoding.as_deref()),
        )),
        Err(e) => {
            debug!("{key}: {e}");
            Ok(empty(e.status_code()))
        }
    }
}

fn empty(status: StatusCode) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
}

/// Gzipped payloads are decompressed for clients that do not accept gzip
fn payload_response(payload: &CachedPayload, accepts_gzip: bool) -> Response {
    let (body, encoding) = match payload.encoding() {
        ContentEncoding::Gzip if !accepts_gzip => match payload.decoded() {
            Ok(json) => (json, ContentEncoding::Identity),
            Err(e) => {
                error!("Cannot decompress cached payload: {e}");
                return empty(StatusCode::INTERNAL_SERVER_ERROR);
            }
        },
        encoding => (payload.body().clone(), encoding),
    };

    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static(payload.content_type()),
    );
    if let Some(value) = encoding.header_value() {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(value));
    }
    headers.insert(VARY, HeaderValue::from_static("accept-encoding"));
    response
}

/// Whether an `Accept-Encoding` value allows gzip; `q=0` refuses it
fn accepts_gzip(accept_encoding: Option<&str>) -> bool {
    let Some(accept_encoding) = accept_encoding else {
        return false;
    };
    accept_encoding.split(',').any(|coding| {
        let mut parts = coding.split(';').map(str::trim);
        let name = parts.next().unwrap_or_default();
        let refused = parts.any(|param| {
            param
                .strip_prefix("q=")
                .and_then(|q| q.parse::<f32>().ok())
                .map_or(false, |q| q == 0.0)
        });
        (name.eq_ignore_ascii_case("gzip") || name == "*") && !refused
    })
}
