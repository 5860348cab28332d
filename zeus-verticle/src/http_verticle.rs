// HTTP verticles: handler trait, shared listeners and the serving loop

use crate::descriptor::ResolvedDescriptor;
use crate::verticle::{ShutdownSignal, Verticle, VerticleContext};
use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use zeus_core::{Container, Error, HttpRequest, HttpResponse, Injectable, Provider};
use zeus_metrics::prometheus::Counter;
use zeus_metrics::{MeterRegistry, MetricsDomain, Timer};
use zeus_ratelimit::RateLimiter;

/// Request handling logic of an HTTP verticle
#[async_trait]
pub trait HttpVerticle: Send + Sync + 'static {
    async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error>;

    /// Called on the instance's event loop before it starts listening
    async fn on_start(&self) -> Result<(), Error> {
        Ok(())
    }

    async fn on_stop(&self) -> Result<(), Error> {
        Ok(())
    }
}

struct SharedListener {
    listener: StdTcpListener,
    users: usize,
}

/// Listening sockets shared by every instance serving the same port.
///
/// The first instance binds; later ones receive a duplicate of the socket
/// and accept on their own event loop. The socket closes once its last user
/// released it.
#[derive(Default)]
pub struct ServerRegistry {
    listeners: Mutex<HashMap<u16, SharedListener>>,
}

impl ServerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease the listener for `port`, binding it on first use
    pub fn acquire(&self, port: u16) -> std::io::Result<StdTcpListener> {
        let mut listeners = self.listeners.lock();
        if let Some(shared) = listeners.get_mut(&port) {
            let listener = shared.listener.try_clone()?;
            shared.users += 1;
            return Ok(listener);
        }

        let listener = StdTcpListener::bind(SocketAddr::from(([0, 0, 0, 0], port)))?;
        listener.set_nonblocking(true)?;
        let lease = listener.try_clone()?;
        listeners.insert(port, SharedListener { listener, users: 1 });

        debug!(port, "Bound HTTP listener");
        Ok(lease)
    }

    pub fn release(&self, port: u16) {
        let mut listeners = self.listeners.lock();
        let Some(shared) = listeners.get_mut(&port) else {
            return;
        };
        shared.users -= 1;
        if shared.users == 0 {
            listeners.remove(&port);
            debug!(port, "Released HTTP listener");
        }
    }

    pub fn local_addr(&self, port: u16) -> Option<SocketAddr> {
        self.listeners
            .lock()
            .get(&port)
            .and_then(|shared| shared.listener.local_addr().ok())
    }

    pub fn bound_ports(&self) -> Vec<u16> {
        self.listeners.lock().keys().copied().collect()
    }
}

impl Provider for ServerRegistry {}

#[derive(Clone)]
struct ServerMetrics {
    requests: Arc<Timer>,
    rejected: Counter,
}

impl ServerMetrics {
    fn new(registry: &MeterRegistry) -> zeus_metrics::Result<Self> {
        Ok(Self {
            requests: registry.timer(
                &MetricsDomain::HttpServer.meter_name("requests_seconds"),
                "HTTP server request latency",
            )?,
            rejected: registry.counter(
                &MetricsDomain::HttpServer.meter_name("rejected_total"),
                "HTTP server requests refused by rate limiting",
            )?,
        })
    }
}

/// Serves an [`HttpVerticle`] on its descriptor's port and path
pub struct HttpServerVerticle<T: HttpVerticle> {
    service: Arc<RequestService<T>>,
    servers: Arc<ServerRegistry>,
    port: u16,
    leased: bool,
    accept_loop: Option<JoinHandle<()>>,
}

impl<T: HttpVerticle> HttpServerVerticle<T> {
    pub fn new(
        handler: T,
        descriptor: ResolvedDescriptor,
        servers: Arc<ServerRegistry>,
        limiter: Option<RateLimiter>,
        metrics: Option<&MeterRegistry>,
    ) -> Result<Self, Error> {
        let port = descriptor.port;
        let metrics = metrics.map(ServerMetrics::new).transpose()?;
        Ok(Self {
            service: Arc::new(RequestService {
                handler,
                descriptor,
                limiter,
                metrics,
            }),
            servers,
            port,
            leased: false,
            accept_loop: None,
        })
    }

    /// Build an instance for `T` from the container
    pub fn construct(container: &Container, descriptor: &ResolvedDescriptor) -> Result<Self, Error>
    where
        T: Injectable,
    {
        let handler = container.construct::<T>()?;
        let servers = container.resolve_or_register(ServerRegistry::new)?;
        let limiter = descriptor.rate_limit()?.build()?;
        let metrics = container.try_resolve::<MeterRegistry>();

        Self::new(handler, descriptor.clone(), servers, limiter, metrics.as_deref())
    }
}

#[async_trait]
impl<T: HttpVerticle> Verticle for HttpServerVerticle<T> {
    fn name(&self) -> &str {
        std::any::type_name::<T>()
    }

    async fn start(&mut self, ctx: &VerticleContext) -> Result<(), Error> {
        self.service.handler.on_start().await?;

        let listener = match TcpListener::from_std(self.servers.acquire(self.port)?) {
            Ok(listener) => listener,
            Err(e) => {
                self.servers.release(self.port);
                return Err(e.into());
            }
        };
        self.leased = true;

        self.accept_loop = Some(tokio::spawn(accept_loop(
            listener,
            self.service.clone(),
            ctx.shutdown_signal(),
        )));

        debug!(
            verticle = self.name(),
            port = self.port,
            path = %self.service.descriptor.path,
            instance = ctx.instance(),
            event_loop = ctx.event_loop(),
            "HTTP verticle instance listening"
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), Error> {
        if let Some(accept_loop) = self.accept_loop.take() {
            accept_loop.abort();
            // Wait until the task dropped its listener
            let _ = accept_loop.await;
        }
        if std::mem::take(&mut self.leased) {
            self.servers.release(self.port);
        }
        self.service.handler.on_stop().await
    }
}

async fn accept_loop<T: HttpVerticle>(
    listener: TcpListener,
    service: Arc<RequestService<T>>,
    mut shutdown: ShutdownSignal,
) {
    loop {
        let (stream, remote) = tokio::select! {
            _ = shutdown.wait() => break,
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Failed to accept connection");
                    continue;
                }
            },
        };

        let io = TokioIo::new(stream);
        let service = service.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req: Request<IncomingBody>| {
                let service = service.clone();
                async move { service.serve(req).await }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                debug!(%remote, error = %err, "Error serving connection");
            }
        });
    }
}

struct RequestService<T: HttpVerticle> {
    handler: T,
    descriptor: ResolvedDescriptor,
    limiter: Option<RateLimiter>,
    metrics: Option<ServerMetrics>,
}

impl<T: HttpVerticle> RequestService<T> {
    async fn serve(
        &self,
        req: Request<IncomingBody>,
    ) -> Result<Response<Full<bytes::Bytes>>, hyper::Error> {
        let method = req.method().to_string();
        let target = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        let mut request = HttpRequest::from_target(method, &target);
        for (name, value) in req.headers() {
            if let Ok(value) = value.to_str() {
                request.headers.insert(name.to_string(), value.to_string());
            }
        }
        request.body = req.collect().await?.to_bytes().to_vec();

        Ok(into_hyper(self.respond(request).await))
    }

    async fn respond(&self, request: HttpRequest) -> HttpResponse {
        if !self.descriptor.matches(&request.path) {
            trace!(path = %request.path, "No route for request");
            return HttpResponse::not_found();
        }

        if let Some(limiter) = &self.limiter
            && let Err(refused) = limiter.acquire().await
        {
            if let Some(metrics) = &self.metrics {
                metrics.rejected.inc();
            }
            let retry_after = refused.retry_after_header();
            let mut response = HttpResponse::from_error(&refused.into());
            if let Some(retry_after) = retry_after {
                response = response.with_header("Retry-After".to_string(), retry_after);
            }
            return response;
        }

        let sample = self.metrics.as_ref().map(|m| m.requests.start());
        let response = match self.handler.handle(request).await {
            Ok(response) => response,
            Err(err) => HttpResponse::from_error(&err),
        };
        if let Some(sample) = sample {
            sample.stop();
        }
        response
    }
}

fn into_hyper(response: HttpResponse) -> Response<Full<bytes::Bytes>> {
    let mut builder = Response::builder().status(response.status);
    for (key, value) in response.headers {
        builder = builder.header(key, value);
    }

    builder
        .body(Full::new(bytes::Bytes::from(response.body)))
        .unwrap_or_else(|e| {
            warn!(error = %e, "Invalid response produced by verticle");
            let mut fallback = Response::new(Full::new(bytes::Bytes::new()));
            *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
            fallback
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use zeus_config::ConfigManager;
    use crate::descriptor::VerticleDescriptor;

    struct Echo;

    #[async_trait]
    impl HttpVerticle for Echo {
        async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
            if request.query("fail").is_some() {
                return Err(Error::BadRequest("asked to fail".to_string()));
            }
            Ok(HttpResponse::text(format!("{} {}", request.method, request.path)))
        }
    }

    fn service(descriptor: VerticleDescriptor, metrics: Option<&MeterRegistry>) -> RequestService<Echo> {
        let descriptor = descriptor.resolve(&ConfigManager::new()).unwrap();
        let limiter = descriptor.rate_limit().unwrap().build().unwrap();
        RequestService {
            handler: Echo,
            descriptor,
            limiter,
            metrics: metrics.map(|m| ServerMetrics::new(m).unwrap()),
        }
    }

    #[tokio::test]
    async fn test_routes_only_descriptor_path() {
        let service = service(VerticleDescriptor::new("8080", "/echo"), None);

        let ok = service.respond(HttpRequest::from_target("GET", "/echo")).await;
        assert_eq!(ok.status, 200);
        assert_eq!(ok.body, b"GET /echo");

        let missing = service.respond(HttpRequest::from_target("GET", "/other")).await;
        assert_eq!(missing.status, 404);
    }

    #[tokio::test]
    async fn test_handler_errors_become_responses() {
        let service = service(VerticleDescriptor::new("8080", "/echo"), None);
        let response = service.respond(HttpRequest::from_target("GET", "/echo?fail=1")).await;
        assert_eq!(response.status, 400);
    }

    #[tokio::test]
    async fn test_zero_rate_refuses_with_429() {
        let metrics = MeterRegistry::new();
        let service = service(
            VerticleDescriptor::new("8080", "/echo").with_permits_per_second("0"),
            Some(&metrics),
        );

        let response = service.respond(HttpRequest::from_target("GET", "/echo")).await;
        assert_eq!(response.status, 429);
        assert_eq!(
            metrics
                .counter("zeus_http_server_rejected_total", "")
                .unwrap()
                .get(),
            1.0
        );
    }

    #[tokio::test]
    async fn test_rate_limit_admits_burst_then_refuses() {
        let service = service(
            VerticleDescriptor::new("8080", "/echo").with_permits_per_second("2"),
            None,
        );

        for _ in 0..2 {
            let response = service.respond(HttpRequest::from_target("GET", "/echo")).await;
            assert_eq!(response.status, 200);
        }
        let refused = service.respond(HttpRequest::from_target("GET", "/echo")).await;
        assert_eq!(refused.status, 429);
        assert!(refused.headers.contains_key("Retry-After"));
    }

    #[tokio::test]
    async fn test_served_requests_are_timed() {
        let metrics = MeterRegistry::new();
        let service = service(VerticleDescriptor::new("8080", "/echo"), Some(&metrics));

        service.respond(HttpRequest::from_target("GET", "/echo")).await;
        service.respond(HttpRequest::from_target("GET", "/nope")).await;

        let timer = metrics
            .timer("zeus_http_server_requests_seconds", "")
            .unwrap();
        assert_eq!(timer.count(), 1);
    }

    #[test]
    fn test_server_registry_shares_listener() {
        let registry = ServerRegistry::new();
        let probe = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let first = registry.acquire(port).unwrap();
        let second = registry.acquire(port).unwrap();
        assert_eq!(
            first.local_addr().unwrap().port(),
            second.local_addr().unwrap().port()
        );
        assert_eq!(registry.bound_ports(), vec![port]);

        registry.release(port);
        assert!(registry.local_addr(port).is_some());
        registry.release(port);
        assert!(registry.local_addr(port).is_none());
    }
}
