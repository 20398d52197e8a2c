use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use std::sync::Arc;

use crate::{
    classifier::{self, Classifier, TractClassifier},
    config::Config,
    export, handlers,
};

pub fn cors() -> Cors {
    Cors::default()
        .allow_any_origin()
        .allow_any_method()
        .allow_any_header()
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/predict").route(web::post().to(handlers::predict)))
        .service(web::resource("/health").route(web::get().to(handlers::healthcheck)));
}

/// Loads the model, runs the graph export and serves until shutdown.
pub async fn start_app(config: Config) -> anyhow::Result<()> {
    let model_path = config.model.get_path();
    let model = classifier::load_model(&model_path)?;
    export::export_on_startup(&model, &config.export)?;

    let classifier: Arc<dyn Classifier> = Arc::new(TractClassifier::new(model)?);
    let classifier = web::Data::from(classifier);
    let upload_config = web::Data::new(config.upload.clone());

    let addr = config.server.get_address();
    let mut server = HttpServer::new(move || {
        App::new()
            .wrap(cors())
            .wrap(middleware::Logger::default())
            .app_data(classifier.clone())
            .app_data(upload_config.clone())
            .configure(configure_routes)
    });
    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    tracing::info!("Server running at http://{}", addr);
    server
        .bind(&addr)
        .with_context(|| format!("Failed to bind {}", addr))?
        .run()
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
