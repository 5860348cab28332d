//! End-to-end deployment tests: discovery, refresh, serving, shutdown

use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use zeus_config::ConfigManager;
use zeus_core::{Container, Error, HttpRequest, HttpResponse, Injectable, Provider};
use zeus_metrics::{HTTP_SERVER_PERCENTILES, MeterRegistry};
use zeus_verticle::{Application, ScanDeclaration, VerticleError};

mod api {
    use super::*;
    use std::sync::Arc;
    use zeus_verticle::{HttpVerticle, VerticleController, VerticleDescriptor};

    pub struct Greeting(pub String);

    impl Provider for Greeting {}

    pub struct Hello {
        greeting: Arc<Greeting>,
    }

    #[async_trait]
    impl HttpVerticle for Hello {
        async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
            let name = request.query("name").map(String::as_str).unwrap_or("world");
            Ok(HttpResponse::text(format!("{} {}", self.greeting.0, name)))
        }
    }

    impl VerticleController for Hello {
        const DESCRIPTOR: VerticleDescriptor = VerticleDescriptor::new("${hello.port}", "/hello")
            .with_instance_num("${hello.instances:2}")
            .with_description("Hello");
    }

    impl Injectable for Hello {
        fn inject(container: &Container) -> Result<Self, Error> {
            Ok(Self {
                greeting: container.resolve::<Greeting>()?,
            })
        }
    }

    zeus_verticle::register_verticle!(Hello);

    pub mod limited {
        use super::*;

        pub struct Limited;

        #[async_trait]
        impl HttpVerticle for Limited {
            async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
                Ok(HttpResponse::ok())
            }
        }

        impl VerticleController for Limited {
            const DESCRIPTOR: VerticleDescriptor = VerticleDescriptor::new("${limited.port}", "/limited")
                .with_permits_per_second("${limited.rate:0}");
        }

        impl Injectable for Limited {
            fn inject(_container: &Container) -> Result<Self, Error> {
                Ok(Limited)
            }
        }

        zeus_verticle::register_verticle!(Limited);
    }
}

mod broken {
    use super::*;
    use zeus_verticle::{HttpVerticle, VerticleController, VerticleDescriptor};

    pub struct Occupied;

    #[async_trait]
    impl HttpVerticle for Occupied {
        async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
            Ok(HttpResponse::ok())
        }
    }

    impl VerticleController for Occupied {
        const DESCRIPTOR: VerticleDescriptor = VerticleDescriptor::new("${occupied.port}", "/occupied");
    }

    impl Injectable for Occupied {
        fn inject(_container: &Container) -> Result<Self, Error> {
            Ok(Occupied)
        }
    }

    zeus_verticle::register_verticle!(Occupied);
}

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn get(port: u16, target: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let status = raw
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let body = raw.split_once("\r\n\r\n").map(|(_, body)| body.to_string()).unwrap_or_default();
    (status, body)
}

async fn wait_for_deployments(app: &Application, expected: usize) {
    for _ in 0..300 {
        if app.runtime().deployment_count() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("deployments never reached {expected}");
}

#[tokio::test]
async fn test_discovered_verticles_serve_requests() {
    let hello_port = free_port();
    let limited_port = free_port();

    let config = ConfigManager::new();
    config.set("hello.port", hello_port).unwrap();
    config.set("limited.port", limited_port).unwrap();

    let container = Container::new();
    container.register(api::Greeting("hi".to_string()));
    let metrics = MeterRegistry::new();

    let app = Application::builder()
        .container(container)
        .config(config)
        .metrics(metrics.clone())
        .event_loops(2)
        .scan(ScanDeclaration::new(module_path!()).base_package(format!("{}::api", module_path!())))
        .build()
        .unwrap();

    app.refresh().unwrap();
    wait_for_deployments(&app, 2).await;
    assert_eq!(app.deployer().submitted(), 2);

    let (status, body) = get(hello_port, "/hello?name=zeus").await;
    assert_eq!(status, 200);
    assert_eq!(body, "hi zeus");

    // Both instances accept on the shared listener
    for _ in 0..4 {
        assert_eq!(get(hello_port, "/hello").await, (200, "hi world".to_string()));
    }

    let (status, _) = get(hello_port, "/elsewhere").await;
    assert_eq!(status, 404);

    let (status, body) = get(limited_port, "/limited").await;
    assert_eq!(status, 429);
    assert!(body.contains("\"status\":429"));

    let timer = metrics
        .timer("zeus_http_server_requests_seconds", "")
        .unwrap();
    assert_eq!(timer.count(), 5);
    assert_eq!(timer.config().percentiles(), HTTP_SERVER_PERCENTILES.as_slice());
    assert!(metrics.export().contains("zeus_http_server_rejected_total 1"));

    app.shutdown().await.unwrap();
    assert_eq!(app.runtime().deployment_count(), 0);
    assert!(TcpStream::connect(("127.0.0.1", hello_port)).await.is_err());
}

#[tokio::test]
async fn test_occupied_port_is_fatal() {
    let occupied = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
    let port = occupied.local_addr().unwrap().port();

    let config = ConfigManager::new();
    config.set("occupied.port", port).unwrap();

    let app = Application::builder()
        .config(config)
        .event_loops(1)
        .scan(ScanDeclaration::new(module_path!()).base_package(format!("{}::broken", module_path!())))
        .build()
        .unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), app.run())
        .await
        .unwrap()
        .unwrap_err();

    assert!(err.is_fatal());
    match err {
        VerticleError::DeploymentFailed { verticle, source } => {
            assert!(verticle.ends_with("Occupied"));
            assert!(matches!(
                source,
                zeus_verticle::RuntimeError::Start { source: Error::Io(_), .. }
            ));
        }
        other => panic!("unexpected error {other}"),
    }
    drop(occupied);
}

#[tokio::test]
async fn test_missing_dependency_fails_deployment() {
    // No Greeting registered: constructing Hello fails
    let config = ConfigManager::new();
    config.set("hello.port", free_port()).unwrap();
    config.set("hello.instances", 1).unwrap();

    let mut app = Application::builder()
        .config(config)
        .event_loops(1)
        .verticle::<api::Hello>()
        .build()
        .unwrap();

    app.refresh().unwrap();
    let err = tokio::time::timeout(Duration::from_secs(5), app.fatal_errors().next())
        .await
        .unwrap()
        .unwrap();
    assert!(err.to_string().contains("Hello"));
    app.shutdown().await.unwrap();
}
