//! A minimal Zeus application
//!
//! Deploys two verticles discovered in the `api` module:
//!
//! - `Hello` on port 8080 at `/hello`, with as many instances as
//!   `ZEUS_HELLO_INSTANCES` says (default 4)
//! - `Echo` on port 8081 below `/echo/`, limited to 5 requests per second
//!
//! Run with `cargo run --example hello_verticle`, then:
//!
//! ```text
//! curl 'http://localhost:8080/hello?name=zeus'
//! curl -X POST -d 'ping' http://localhost:8081/echo/anything
//! ```

use zeus::prelude::*;

mod api {
    use super::*;
    use std::sync::Arc;

    /// Shared greeting text, registered in the container
    pub struct Greeter {
        pub greeting: String,
    }

    impl Provider for Greeter {}

    pub struct Hello {
        greeter: Arc<Greeter>,
    }

    #[async_trait]
    impl HttpVerticle for Hello {
        async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
            let name = request.query("name").map(String::as_str).unwrap_or("world");
            Ok(HttpResponse::text(format!("{}, {}!", self.greeter.greeting, name)))
        }
    }

    impl VerticleController for Hello {
        const DESCRIPTOR: VerticleDescriptor =
            VerticleDescriptor::new("${hello.port:8080}", "/hello")
                .with_instance_num("${hello.instances:4}")
                .with_description("Hello service");
    }

    impl Injectable for Hello {
        fn inject(container: &Container) -> Result<Self, Error> {
            Ok(Self {
                greeter: container.resolve::<Greeter>()?,
            })
        }
    }

    register_verticle!(Hello);

    pub struct Echo;

    #[async_trait]
    impl HttpVerticle for Echo {
        async fn handle(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
            Ok(HttpResponse::ok().with_body(request.body))
        }
    }

    impl VerticleController for Echo {
        const DESCRIPTOR: VerticleDescriptor = VerticleDescriptor::new("${echo.port:8081}", "/echo/*")
            .with_permits_per_second("${echo.rate:5}")
            .with_acquire_permits_timeout_nanos("${echo.timeout:100000000}");
    }

    impl Injectable for Echo {
        fn inject(_container: &Container) -> Result<Self, Error> {
            Ok(Echo)
        }
    }

    register_verticle!(Echo);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigService::builder()
        .with_prefix("ZEUS")
        .load_dotenv(None)
        .default_value("hello.greeting", "Hello")
        .default_value("logging.format", "pretty")
        .build()?;

    let _guard = LogConfig::from_properties(|key| config.get::<String>(key).ok()).init()?;
    let greeting = config.get_or("hello.greeting", "Hello".to_string());

    let container = Container::new();
    container.register(api::Greeter { greeting });

    Application::builder()
        .container(container)
        .config(config.into_manager())
        .metrics(MeterRegistry::new())
        .scan(ScanDeclaration::new(module_path!()).base_package(format!("{}::api", module_path!())))
        .build()?
        .run()
        .await?;

    Ok(())
}
