//! API version routing middleware.
//!
//! `/api/v1/...` is served by the unversioned handlers; other versions are
//! refused before admission runs.

use std::future::{Ready, ready};
use std::rc::Rc;

use actix_web::{
    Error, HttpResponse, ResponseError,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{
        header::{HeaderMap, HeaderName, HeaderValue},
        uri::{PathAndQuery, Uri},
    },
};
use futures::future::LocalBoxFuture;

use herbarium_core::domain::versioning::supported_versions_header;
use herbarium_core::domain::{CURRENT_API_VERSION, SUPPORTED_API_VERSIONS, VersionRoute};
use herbarium_shared::VersionErrorResponse;

use super::error::AppError;

pub const API_VERSION_HEADER: &str = "x-api-version";
pub const SUPPORTED_VERSIONS_HEADER: &str = "x-api-supported-versions";

/// API version middleware factory.
#[derive(Clone, Default)]
pub struct ApiVersion;

impl<S, B> Transform<S, ServiceRequest> for ApiVersion
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = ApiVersionService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(ApiVersionService {
            service: Rc::new(service),
        }))
    }
}

pub struct ApiVersionService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for ApiVersionService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();

        Box::pin(async move {
            let response = match VersionRoute::classify(req.match_info().as_str()) {
                VersionRoute::Bypass => {
                    return Ok(service.call(req).await?.map_into_left_body());
                }
                VersionRoute::Current => None,
                VersionRoute::Rewrite(_) => match rewrite_path(&mut req) {
                    Ok(()) => None,
                    Err(e) => {
                        tracing::warn!(path = %req.path(), error = %e, "Failed to rewrite versioned path");
                        Some(AppError::BadRequest("Malformed request path".to_string()).error_response())
                    }
                },
                VersionRoute::Unsupported(version) => {
                    tracing::debug!(version, path = %req.path(), "Unsupported API version requested");
                    Some(HttpResponse::NotImplemented().json(VersionErrorResponse::unsupported(
                        version,
                        SUPPORTED_API_VERSIONS,
                    )))
                }
                VersionRoute::Invalid(segment) => Some(HttpResponse::BadRequest().json(
                    VersionErrorResponse::invalid(segment, SUPPORTED_API_VERSIONS),
                )),
            };

            if let Some(response) = response {
                let mut res = req.into_response(response);
                insert_version_headers(res.headers_mut());
                return Ok(res.map_into_right_body());
            }

            let mut res = service.call(req).await?;
            insert_version_headers(res.headers_mut());
            Ok(res.map_into_left_body())
        })
    }
}

/// Strip the version segment from the request URI, keeping the query string,
/// so routing sees the unversioned form.
fn rewrite_path(req: &mut ServiceRequest) -> Result<(), Box<dyn std::error::Error>> {
    let path = unversioned_path(req.uri().path());
    let path_and_query = match req.query_string() {
        "" => path,
        query => format!("{path}?{query}"),
    };

    let mut parts = req.uri().clone().into_parts();
    parts.path_and_query = Some(path_and_query.parse::<PathAndQuery>()?);
    let uri = Uri::from_parts(parts)?;

    req.match_info_mut().get_mut().update(&uri);
    req.head_mut().uri = uri;
    Ok(())
}

/// Drop the first non-empty segment after the API root from a raw,
/// still percent-encoded path. Encoded slashes stay encoded when the router
/// decodes, so raw and decoded segments line up.
fn unversioned_path(raw: &str) -> String {
    let mut segments: Vec<&str> = raw.split('/').collect();
    if let Some(idx) = segments.iter().skip(2).position(|s| !s.is_empty()) {
        segments.remove(idx + 2);
    }
    segments.join("/")
}

fn insert_version_headers(headers: &mut HeaderMap) {
    headers.insert(
        HeaderName::from_static(API_VERSION_HEADER),
        HeaderValue::from(CURRENT_API_VERSION),
    );
    if let Ok(supported) = HeaderValue::try_from(supported_versions_header()) {
        headers.insert(HeaderName::from_static(SUPPORTED_VERSIONS_HEADER), supported);
    }
}
