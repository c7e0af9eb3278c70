//! The API Server's middleware contract, innermost to outermost
//! (`spec.md` §4.3): request-id tagging, panic recovery, loopback-only
//! gate, permissive CORS for loopback origins, structured request/response
//! logging.
//!
//! Panic recovery is actix-web's own: every service invocation is already
//! wrapped in `catch_unwind` by its `HttpServiceFactory`, so a panicking
//! handler always yields a 500 rather than taking a worker down. Nothing
//! extra is layered on for that part of the contract.

use std::future::{ready, Future, Ready};
use std::net::IpAddr;
use std::pin::Pin;
use std::rc::Rc;

use actix_web::body::MessageBody;
use actix_web::dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{Error, HttpMessage};
use tracing::{info, warn};
use uuid::Uuid;

/// Attaches an opaque request id to request extensions (read back by
/// `RequestLogging`) and to the response's `x-request-id` header.
pub struct RequestId;

impl<S, B> Transform<S, ServiceRequest> for RequestId
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestIdMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestIdMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestIdMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let request_id = Uuid::new_v4().to_string();
        req.extensions_mut().insert(RequestIdValue(request_id.clone()));
        let service = self.service.clone();

        Box::pin(async move {
            let mut response = service.call(req).await?;
            response.headers_mut().insert(
                actix_web::http::header::HeaderName::from_static("x-request-id"),
                actix_web::http::header::HeaderValue::from_str(&request_id)
                    .unwrap_or_else(|_| actix_web::http::header::HeaderValue::from_static("invalid")),
            );
            Ok(response)
        })
    }
}

#[derive(Clone)]
pub struct RequestIdValue(pub String);

/// Structured request/response logging: method, path, status, latency,
/// and the request id `RequestId` attached.
pub struct RequestLogging;

impl<S, B> Transform<S, ServiceRequest> for RequestLogging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = RequestLoggingMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggingMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLoggingMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let method = req.method().clone();
        let path = req.match_pattern().unwrap_or_else(|| req.path().to_string());
        let started = std::time::Instant::now();
        let service = self.service.clone();

        Box::pin(async move {
            let response = service.call(req).await?;
            let elapsed = started.elapsed();
            let status = response.status().as_u16();

            let metrics = super::metrics::metrics();
            metrics
                .http_requests_total
                .with_label_values(&[method.as_str(), &path, &status.to_string()])
                .inc();
            metrics
                .http_request_duration_seconds
                .with_label_values(&[method.as_str(), &path])
                .observe(elapsed.as_secs_f64());

            info!(
                %method,
                path,
                status,
                latency_ms = elapsed.as_millis() as u64,
                "request handled"
            );
            Ok(response)
        })
    }
}

/// `spec.md` §4.3: "each request is additionally verified to originate
/// from a loopback peer; non-loopback peers are rejected with 403
/// regardless of binding".
pub struct LoopbackGate;

impl<S, B> Transform<S, ServiceRequest> for LoopbackGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = LoopbackGateMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoopbackGateMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct LoopbackGateMiddleware<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for LoopbackGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let is_loopback = req
            .peer_addr()
            .map(|addr| is_loopback_addr(addr.ip()))
            .unwrap_or(false);

        if is_loopback {
            let service = self.service.clone();
            Box::pin(async move { service.call(req).await })
        } else {
            warn!(peer = ?req.peer_addr(), "rejected non-loopback peer");
            Box::pin(async move {
                Err(actix_web::error::ErrorForbidden(
                    "connections are only accepted from loopback peers",
                ))
            })
        }
    }
}

#[cfg(not(feature = "disable-loopback-check"))]
fn is_loopback_addr(ip: IpAddr) -> bool {
    ip.is_loopback()
}

#[cfg(feature = "disable-loopback-check")]
fn is_loopback_addr(_ip: IpAddr) -> bool {
    true
}
