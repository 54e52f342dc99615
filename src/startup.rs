use actix_web::dev::Server;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{AuthService, PasswordVerifier, SessionCookies, TokenIssuer};
use crate::client_ip::ClientIpResolver;
use crate::configuration::{JwtSettings, Settings};
use crate::error::AppError;
use crate::logger::LoggerMiddleware;
use crate::middleware::JwtMiddleware;
use crate::routes::{current_session, health_check, login, login_json_config, logout, refresh};
use crate::store::{CredentialStore, TokenStore};

/// Everything the auth routes need, wired from settings and stores
#[derive(Clone)]
pub struct AuthComponents {
    pub service: AuthService,
    pub cookies: SessionCookies,
    pub client_ip: ClientIpResolver,
    pub jwt: JwtSettings,
}

impl AuthComponents {
    pub fn build(
        settings: &Settings,
        credentials: Arc<dyn CredentialStore>,
        tokens: Arc<dyn TokenStore>,
    ) -> Result<Self, AppError> {
        let verifier = PasswordVerifier::new(settings.jwt.bcrypt_cost)?;
        let issuer = TokenIssuer::new(settings.jwt.clone(), tokens);
        let client_ip = ClientIpResolver::from_settings(&settings.client_ip)
            .map_err(|e| AppError::Internal(format!("invalid trusted proxy address: {}", e)))?;

        Ok(Self {
            service: AuthService::new(credentials, issuer, verifier),
            cookies: SessionCookies::new(&settings.cookie, settings.jwt.refresh_token_expiry),
            client_ip,
            jwt: settings.jwt.clone(),
        })
    }
}

/// Token-bearing responses must never be cached or sniffed
fn auth_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Cache-Control", "no-store"))
        .add(("Pragma", "no-cache"))
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("Referrer-Policy", "no-referrer"))
}

pub fn run(listener: TcpListener, components: AuthComponents) -> Result<Server, std::io::Error> {
    let service = web::Data::new(components.service);
    let cookies = web::Data::new(components.cookies);
    let client_ip = web::Data::new(components.client_ip);
    let jwt_config = components.jwt;

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(service.clone())
            .app_data(cookies.clone())
            .app_data(client_ip.clone())

            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/api/auth")
                    .wrap(auth_headers())
                    .service(
                        web::resource("/login")
                            .app_data(login_json_config())
                            .route(web::post().to(login)),
                    )
                    .route("/logout", web::post().to(logout))
                    .route("/refresh", web::post().to(refresh))
                    // Requires a bearer access token
                    .service(
                        web::resource("/me")
                            .wrap(JwtMiddleware::new(jwt_config.clone()))
                            .route(web::get().to(current_session)),
                    ),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
