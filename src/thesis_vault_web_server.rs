use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{dev::Server, web::Data, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

use crate::core::jwt_auth::KIOSK_KEY_HEADER;
use crate::core::{AppConfig, FlowSettings};
use crate::gateway::PostgrestGateway;
use crate::routes::thesis_vault_routes;
use crate::services::viewer::HttpDocumentFetcher;
use crate::services::AppContext;

pub struct ThesisVaultWebServer {
    port: u16,
    context: AppContext,
    server: Server,
}

impl ThesisVaultWebServer {
    /// Build against the configured PostgREST backend.
    pub async fn build(configuration: AppConfig) -> Result<Self, anyhow::Error> {
        let gateway = PostgrestGateway::new(&configuration.gateway)?;
        let fetcher = HttpDocumentFetcher::new(configuration.gateway.timeout())?;
        let context = AppContext::new(
            Arc::new(gateway),
            Arc::new(fetcher),
            FlowSettings::from(&configuration),
        );

        Self::build_with_context(configuration, context).await
    }

    /// Build around an existing context, e.g. one backed by an in-memory gateway.
    pub async fn build_with_context(
        configuration: AppConfig,
        context: AppContext,
    ) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.thesis_vault_server_config.host,
            configuration.thesis_vault_server_config.port
        );

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();

        let server = run(listener, context.clone(), configuration)?;

        Ok(Self {
            port,
            context,
            server,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn context(&self) -> AppContext {
        self.context.clone()
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(
    listener: TcpListener,
    context: AppContext,
    configuration: AppConfig,
) -> Result<Server, anyhow::Error> {
    let context = Data::new(context);
    let jwt_auth_config = Data::new(configuration.jwt_auth_config);
    let kiosk_config = Data::new(configuration.kiosk);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
            ])
            .allowed_header(KIOSK_KEY_HEADER);
        App::new()
            .wrap(TracingLogger::default())
            .configure(thesis_vault_routes)
            .app_data(context.clone())
            .app_data(jwt_auth_config.clone())
            .app_data(kiosk_config.clone())
            .wrap(cors)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
