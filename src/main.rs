use std::sync::Arc;
use std::time::Duration;

use actix_web::{
    get, http::StatusCode, middleware, post, web, web::Data, App, HttpRequest, HttpResponse,
    HttpServer, Responder,
};
use clap::Parser;
use hub_monitor::{
    api::ResourceRegistry,
    config::Settings,
    federation::{KubeClientFactory, KubeClusterApi, PassContext},
    service::{Cache, FederationService},
    telemetry, Error, State,
};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Envelope of every `/api` response
#[derive(Serialize)]
struct Reply<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn ok<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(Reply {
        success: true,
        data: Some(data),
        error: None,
    })
}

fn failed(error: Error) -> HttpResponse {
    let status = match &error {
        Error::HubNotFound(_) => StatusCode::NOT_FOUND,
        Error::HubUnreachable { .. } | Error::Credential(_) | Error::Connect(_) => StatusCode::BAD_GATEWAY,
        Error::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    warn!(%status, "request failed: {error}");
    HttpResponse::build(status).json(Reply::<()> {
        success: false,
        data: None,
        error: Some(error.to_string()),
    })
}

/// Per-request pass settings
#[derive(Clone)]
struct Passes {
    shutdown: CancellationToken,
    timeout: Duration,
}

impl Passes {
    fn context(&self) -> PassContext {
        PassContext::new(self.shutdown.child_token()).with_timeout(self.timeout)
    }
}

#[get("/metrics")]
async fn metrics(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    match encoder.encode(&metrics, &mut buffer) {
        Ok(()) => HttpResponse::Ok().body(buffer),
        Err(e) => HttpResponse::InternalServerError().body(e.to_string()),
    }
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[get("/api/hubs")]
async fn list_hubs(service: Data<FederationService>, passes: Data<Passes>) -> impl Responder {
    match service.list_hubs(&passes.context()).await {
        Ok(hubs) => ok(hubs.as_slice()),
        Err(e) => failed(e),
    }
}

#[post("/api/hubs/refresh")]
async fn refresh(service: Data<FederationService>) -> impl Responder {
    service.refresh().await;
    ok("Cache cleared")
}

#[get("/api/hubs/{name}")]
async fn get_hub(
    service: Data<FederationService>,
    passes: Data<Passes>,
    name: web::Path<String>,
) -> impl Responder {
    match service.get_hub(&passes.context(), &name).await {
        Ok(hub) => ok(hub.as_ref()),
        Err(e) => failed(e),
    }
}

#[get("/api/hubs/{name}/clusters")]
async fn list_hub_clusters(
    service: Data<FederationService>,
    passes: Data<Passes>,
    name: web::Path<String>,
) -> impl Responder {
    match service.list_spokes_of(&passes.context(), &name).await {
        Ok(spokes) => ok(spokes.as_slice()),
        Err(e) => failed(e),
    }
}

/// Client for the global hub, from an explicit kubeconfig or the usual discovery
async fn global_client(settings: &Settings) -> hub_monitor::Result<Client> {
    let config = match &settings.kubeconfig {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        }
        None => Config::infer().await.map_err(kube::Error::InferConfig)?,
    };
    Ok(Client::try_from(config)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().await?;
    let settings = Settings::parse();

    let state = State::new()?;
    let registry = Arc::new(ResourceRegistry::default());
    let global = Arc::new(KubeClusterApi::new(global_client(&settings).await?, registry.clone()));
    let factory = Arc::new(KubeClientFactory::new(registry));
    let cache = Arc::new(Cache::new(settings.cache_ttl()));
    let service = state.service(global, factory, settings.aggregation(), cache.clone());

    let shutdown = CancellationToken::new();
    let sweeper = cache.spawn_sweeper(settings.sweep_interval(), shutdown.clone());
    let passes = Passes {
        shutdown: shutdown.clone(),
        timeout: settings.request_timeout(),
    };

    // Start web server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .app_data(Data::new(service.clone()))
            .app_data(Data::new(passes.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
            .service(list_hubs)
            .service(refresh)
            .service(get_hub)
            .service(list_hub_clusters)
    })
    .bind(("0.0.0.0", settings.port))?
    .shutdown_timeout(5)
    .run();

    info!(port = settings.port, "serving federation api");
    let served = server.await;

    shutdown.cancel();
    sweeper.await?;
    Ok(served?)
}
