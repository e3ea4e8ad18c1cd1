//! Rate limiting middleware.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;

use actix_web::{
    Error, HttpResponse,
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
    http::header::{self, HeaderMap, HeaderName, HeaderValue},
};
use futures::future::LocalBoxFuture;

use herbarium_core::AdmissionController;
use herbarium_core::domain::identity::{FORWARDED_FOR_HEADER, REAL_IP_HEADER};
use herbarium_core::domain::{AdmissionDecision, CallerIdentity};
use herbarium_shared::RateLimitedResponse;

use crate::observability::AlertDispatcher;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Caller identity from the proxy headers.
pub fn caller_identity(headers: &HeaderMap) -> CallerIdentity {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    CallerIdentity::resolve(header(FORWARDED_FOR_HEADER), header(REAL_IP_HEADER))
}

/// Rate limiting middleware factory.
#[derive(Clone)]
pub struct RateLimitMiddleware {
    controller: Arc<AdmissionController>,
    alerts: AlertDispatcher,
}

impl RateLimitMiddleware {
    pub fn new(controller: Arc<AdmissionController>, alerts: AlertDispatcher) -> Self {
        Self { controller, alerts }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RateLimitMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Transform = RateLimitMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RateLimitMiddlewareService {
            service: Rc::new(service),
            controller: self.controller.clone(),
            alerts: self.alerts.clone(),
        }))
    }
}

pub struct RateLimitMiddlewareService<S> {
    service: Rc<S>,
    controller: Arc<AdmissionController>,
    alerts: AlertDispatcher,
}

impl<S, B> Service<ServiceRequest> for RateLimitMiddlewareService<S>
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
        let controller = self.controller.clone();
        let alerts = self.alerts.clone();

        Box::pin(async move {
            let caller = caller_identity(req.headers());
            let now = now_ms();
            // Routing matches on the decoded path; the bucket must too.
            let admission = controller
                .admit(caller, req.match_info().as_str(), now)
                .await;

            if let Some(alert) = admission.alert {
                tracing::warn!(
                    client_id = %alert.client_id,
                    request_count = alert.request_count,
                    "Abuse threshold crossed"
                );
                alerts.dispatch(alert);
            }

            let decision = admission.decision;
            if !decision.allowed {
                tracing::warn!(
                    key = %admission.key,
                    limit = decision.limit,
                    estimate = decision.estimate,
                    "Rate limit exceeded"
                );

                let mut response = HttpResponse::TooManyRequests();
                response.insert_header((
                    header::RETRY_AFTER,
                    decision.retry_after_secs(now).to_string(),
                ));
                let mut res = req.into_response(response.json(RateLimitedResponse::default()));
                insert_rate_limit_headers(res.headers_mut(), &decision);
                return Ok(res.map_into_right_body());
            }

            let mut res = service.call(req).await?;
            insert_rate_limit_headers(res.headers_mut(), &decision);
            Ok(res.map_into_left_body())
        })
    }
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &AdmissionDecision) {
    headers.insert(
        HeaderName::from_static(LIMIT_HEADER),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static(RESET_HEADER),
        HeaderValue::from(decision.reset_at_ms),
    );
}
