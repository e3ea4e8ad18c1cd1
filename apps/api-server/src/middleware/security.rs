//! CORS and security-header middleware.
//!
//! Outermost of the application middlewares: preflights are answered here
//! before version routing or admission run, and every other response,
//! including 429s and version errors, leaves through it.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::{
        Method,
        header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue},
    },
};
use futures::future::LocalBoxFuture;

use herbarium_core::domain::{ContentSecurityPolicy, CorsPolicy};

const ALLOWED_METHODS: &str = "GET, POST, PUT, PATCH, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Content-Type, Authorization, Accept, X-Requested-With";
const EXPOSED_HEADERS: &str = "X-RateLimit-Limit, X-RateLimit-Remaining, X-RateLimit-Reset, \
                               Retry-After, X-Api-Version, X-Api-Supported-Versions";
const PREFLIGHT_MAX_AGE: &str = "86400";
const HSTS: &str = "max-age=31536000; includeSubDomains; preload";
const REFERRER_POLICY: &str = "strict-origin-when-cross-origin";
const PERMISSIONS_POLICY: &str = "camera=(), microphone=(), geolocation=(), payment=()";

/// Headers that reveal the server implementation.
const DISCLOSING_HEADERS: &[&str] = &["server", "x-powered-by"];

struct SecurityPolicy {
    cors: CorsPolicy,
    csp: HeaderValue,
}

/// Security headers middleware factory.
#[derive(Clone)]
pub struct SecurityHeaders {
    policy: Arc<SecurityPolicy>,
}

impl SecurityHeaders {
    /// Fails only when the rendered CSP is not a valid header value.
    pub fn new(cors: CorsPolicy, csp: &ContentSecurityPolicy) -> Result<Self, InvalidHeaderValue> {
        let csp = HeaderValue::try_from(csp.to_string())?;
        Ok(Self {
            policy: Arc::new(SecurityPolicy { cors, csp }),
        })
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = SecurityHeadersService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SecurityHeadersService {
            service: Rc::new(service),
            policy: self.policy.clone(),
        }))
    }
}

pub struct SecurityHeadersService<S> {
    service: Rc<S>,
    policy: Arc<SecurityPolicy>,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let policy = self.policy.clone();

        Box::pin(async move {
            let origin = req
                .headers()
                .get(header::ORIGIN)
                .filter(|value| {
                    value
                        .to_str()
                        .is_ok_and(|origin| policy.cors.is_allowed(origin))
                })
                .cloned();

            if req.method() == Method::OPTIONS {
                if origin.is_none() {
                    tracing::debug!(path = %req.path(), "Preflight from origin outside the allow-list");
                }

                let mut res = req.into_response(HttpResponse::NoContent().finish());
                let headers = res.headers_mut();
                if let Some(origin) = origin {
                    insert_preflight_headers(headers, origin);
                }
                headers.append(header::VARY, HeaderValue::from_static("Origin"));
                insert_security_headers(headers, &policy.csp);
                return Ok(res.map_into_right_body());
            }

            let mut res = service.call(req).await?;
            let headers = res.headers_mut();
            if let Some(origin) = origin {
                insert_cors_headers(headers, origin);
            }
            // CORS headers depend on Origin whether or not it was allowed.
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
            insert_security_headers(headers, &policy.csp);
            Ok(res.map_into_left_body())
        })
    }
}

fn insert_preflight_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    insert_cors_headers(headers, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static(PREFLIGHT_MAX_AGE),
    );
}

/// The origin is echoed back, never `*`, since credentials are allowed.
fn insert_cors_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static(EXPOSED_HEADERS),
    );
}

fn insert_security_headers(headers: &mut HeaderMap, csp: &HeaderValue) {
    headers.insert(header::CONTENT_SECURITY_POLICY, csp.clone());
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static(HSTS),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static(REFERRER_POLICY),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(PERMISSIONS_POLICY),
    );

    for name in DISCLOSING_HEADERS {
        headers.remove(*name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, http::StatusCode, test, web};
    use herbarium_core::domain::Environment;

    fn security_headers() -> SecurityHeaders {
        let cors = CorsPolicy::for_environment(
            Environment::Production,
            ["https://herbarium.example", "https://*.herbarium.example"],
        );
        SecurityHeaders::new(cors, &ContentSecurityPolicy::strict(&["https://herbarium.example"]))
            .unwrap()
    }

    async fn herbs() -> HttpResponse {
        HttpResponse::Ok()
            .insert_header(("Server", "actix-web"))
            .insert_header(("X-Powered-By", "actix"))
            .body("[]")
    }

    fn header<'a, B>(res: &'a ServiceResponse<B>, name: &str) -> Option<&'a str> {
        res.headers().get(name).and_then(|v| v.to_str().ok())
    }

    #[actix_web::test]
    async fn test_preflight_from_allowed_origin() {
        let app = test::init_service(
            App::new()
                .wrap(security_headers())
                .route("/api/herbs", web::get().to(herbs)),
        )
        .await;

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/herbs")
            .insert_header(("Origin", "https://herbarium.example"))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            header(&res, "access-control-allow-origin"),
            Some("https://herbarium.example")
        );
        assert_eq!(header(&res, "access-control-allow-methods"), Some(ALLOWED_METHODS));
        assert_eq!(header(&res, "access-control-max-age"), Some("86400"));
        assert_eq!(header(&res, "vary"), Some("Origin"));
        assert_eq!(header(&res, "x-frame-options"), Some("DENY"));
    }

    #[actix_web::test]
    async fn test_preflight_from_unknown_origin_has_no_cors_headers() {
        let app = test::init_service(
            App::new()
                .wrap(security_headers())
                .route("/api/herbs", web::get().to(herbs)),
        )
        .await;

        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/herbs")
            .insert_header(("Origin", "https://evil.example"))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(header(&res, "access-control-allow-origin").is_none());
        assert!(header(&res, "access-control-allow-methods").is_none());
    }

    #[actix_web::test]
    async fn test_allowed_origin_on_regular_request() {
        let app = test::init_service(
            App::new()
                .wrap(security_headers())
                .route("/api/herbs", web::get().to(herbs)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/herbs")
            .insert_header(("Origin", "https://app.herbarium.example"))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            header(&res, "access-control-allow-origin"),
            Some("https://app.herbarium.example")
        );
        assert_eq!(header(&res, "access-control-allow-credentials"), Some("true"));
        assert!(
            header(&res, "access-control-expose-headers")
                .is_some_and(|v| v.contains("X-RateLimit-Remaining"))
        );
    }

    #[actix_web::test]
    async fn test_vary_origin_on_every_response() {
        let app = test::init_service(
            App::new()
                .wrap(security_headers())
                .route("/api/herbs", web::get().to(herbs)),
        )
        .await;

        for origin in [Some("https://herbarium.example"), Some("https://evil.example"), None] {
            let mut req = test::TestRequest::get().uri("/api/herbs");
            if let Some(origin) = origin {
                req = req.insert_header(("Origin", origin));
            }
            let res = test::call_service(&app, req.to_request()).await;

            let vary: Vec<&str> = res
                .headers()
                .get_all(header::VARY)
                .map(|v| v.to_str().unwrap())
                .collect();
            assert_eq!(vary, ["Origin"], "{origin:?}");
        }
    }

    #[actix_web::test]
    async fn test_security_headers_always_present() {
        let app = test::init_service(
            App::new()
                .wrap(security_headers())
                .route("/api/herbs", web::get().to(herbs)),
        )
        .await;

        for origin in [Some("https://evil.example"), Some("null"), None] {
            let mut req = test::TestRequest::get().uri("/api/herbs");
            if let Some(origin) = origin {
                req = req.insert_header(("Origin", origin));
            }
            let res = test::call_service(&app, req.to_request()).await;

            assert!(header(&res, "access-control-allow-origin").is_none());
            assert_eq!(header(&res, "x-content-type-options"), Some("nosniff"));
            assert_eq!(header(&res, "strict-transport-security"), Some(HSTS));
            assert_eq!(header(&res, "referrer-policy"), Some(REFERRER_POLICY));
            assert!(
                header(&res, "content-security-policy").is_some_and(|v| v
                    .contains("frame-ancestors 'none'")
                    && v.contains("connect-src 'self' https://herbarium.example"))
            );
            assert!(header(&res, "server").is_none());
            assert!(header(&res, "x-powered-by").is_none());
        }
    }

    #[actix_web::test]
    async fn test_not_found_still_gets_headers() {
        let app = test::init_service(
            App::new()
                .wrap(security_headers())
                .route("/api/herbs", web::get().to(herbs)),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/api/nowhere")
            .insert_header(("Origin", "https://herbarium.example"))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            header(&res, "access-control-allow-origin"),
            Some("https://herbarium.example")
        );
        assert_eq!(header(&res, "x-frame-options"), Some("DENY"));
    }
}
