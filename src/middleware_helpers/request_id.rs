use crate::tracing::{scope_request_id, RequestId, REQUEST_ID_HEADER};
use axum::{extract::Request, http::header::HeaderName, middleware::Next, response::Response};

/// Tags the request with a correlation id, reusing a well formed
/// `x-request-id` from the client, and echoes it on the response.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let header = HeaderName::from_static(REQUEST_ID_HEADER);
    let request_id = request
        .headers()
        .get(&header)
        .and_then(RequestId::from_header)
        .unwrap_or_else(RequestId::generate);

    let value = request_id.header_value();
    request.headers_mut().insert(header.clone(), value.clone());
    request.extensions_mut().insert(request_id.clone());

    let mut response = scope_request_id(request_id, next.run(request)).await;
    response.headers_mut().insert(header, value);
    response
}
