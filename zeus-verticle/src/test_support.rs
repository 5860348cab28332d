// Verticle fixtures shared by unit tests

use crate::descriptor::{VerticleController, VerticleDescriptor};
use crate::http_verticle::HttpVerticle;
use async_trait::async_trait;
use zeus_core::{Container, Error, HttpRequest, HttpResponse, Injectable};

pub struct Alpha;

#[async_trait]
impl HttpVerticle for Alpha {
    async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
        Ok(HttpResponse::text("alpha"))
    }
}

impl VerticleController for Alpha {
    const DESCRIPTOR: VerticleDescriptor = VerticleDescriptor::new("${alpha.port:0}", "/alpha");
}

impl Injectable for Alpha {
    fn inject(_container: &Container) -> Result<Self, Error> {
        Ok(Alpha)
    }
}

crate::register_verticle!(Alpha);

pub struct Beta;

#[async_trait]
impl HttpVerticle for Beta {
    async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
        Ok(HttpResponse::text("beta"))
    }
}

impl VerticleController for Beta {
    const DESCRIPTOR: VerticleDescriptor = VerticleDescriptor::new("${beta.port:0}", "/beta")
        .with_instance_num("${beta.instances:2}")
        .with_description("Beta service")
        .with_permits_per_second("${beta.rate:}")
        .with_acquire_permits_timeout_nanos("${beta.timeout:}");
}

impl Injectable for Beta {
    fn inject(_container: &Container) -> Result<Self, Error> {
        Ok(Beta)
    }
}

crate::register_verticle!(Beta);

pub mod nested {
    use super::*;

    pub struct Gamma;

    #[async_trait]
    impl HttpVerticle for Gamma {
        async fn handle(&self, _request: HttpRequest) -> Result<HttpResponse, Error> {
            Ok(HttpResponse::text("gamma"))
        }

        async fn on_start(&self) -> Result<(), Error> {
            Err(Error::Internal("boom".to_string()))
        }
    }

    impl VerticleController for Gamma {
        const DESCRIPTOR: VerticleDescriptor = VerticleDescriptor::new("${gamma.port:0}", "/gamma");
    }

    impl Injectable for Gamma {
        fn inject(_container: &Container) -> Result<Self, Error> {
            Ok(Gamma)
        }
    }

    crate::register_verticle!(Gamma);
}

/// A port nothing is listening on right now
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .unwrap()
}
