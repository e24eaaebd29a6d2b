// src/main.rs

mod app_state;
mod auth;
mod bootstrap;
mod clock;
mod config;
mod dashboard;
mod db;
mod employee;
mod error;
mod files;
mod local;
mod matching;
mod models;
mod package;
mod permission;
mod profile;
mod travel;
mod user_management;

use std::env;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use log::info;

use crate::app_state::AppState;
use crate::auth::{
    dashboard_signin, reset_password, signin, signout, signup, validate_jwt,
};
use crate::clock::SystemClock;
use crate::files::ImageStore;

/// Decodes the bearer token, if present, and leaves the subject id in
/// the request extensions. Routes that need a caller pull it from
/// there; public routes just ignore it.
#[derive(Debug)]
pub struct Authentication {
    secret: String,
}

impl Authentication {
    pub fn new(secret: &str) -> Self {
        Authentication {
            secret: secret.to_string(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware {
            service,
            secret: self.secret.clone(),
        })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
    secret: String,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present
        if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if auth_str.starts_with("Bearer ") {
                    let token = auth_str.trim_start_matches("Bearer ").trim().to_string();
                    match validate_jwt(&token, &self.secret) {
                        Ok(claims) => {
                            req.extensions_mut().insert(claims.sub);
                        }
                        Err(e) => {
                            let (req_parts, _payload) = req.into_parts();
                            let resp = HttpResponse::Unauthorized()
                                .json(serde_json::json!({
                                    "message": format!("Invalid token: {}", e)
                                }))
                                .map_into_boxed_body();
                            let srv_resp = ServiceResponse::new(req_parts, resp);
                            return Box::pin(async move { Ok(srv_resp) });
                        }
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(db::MongoDB::init(&config.mongo_uri, &config.database_name).await);
    let images = ImageStore::new(&config.image_dir)?;

    if let Err(e) = bootstrap::init(&mongodb.db).await {
        log::error!("Error seeding the database: {}", e);
    }

    let frontend_origin =
        env::var("FRONTEND_ORIGIN").unwrap_or_else(|_| "http://localhost:3000".to_string());
    let bind_address = config.bind_address.clone();
    let jwt_secret = config.jwt_secret.clone();

    info!("Server running at http://{}", bind_address);
    info!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication::new(&jwt_secret))
            .app_data(web::Data::new(AppState {
                mongodb: mongodb.clone(),
                config: config.clone(),
                clock: Arc::new(SystemClock),
                images: images.clone(),
            }))
            // AUTH
            .service(
                web::scope("/auth")
                    .service(
                        web::scope("/dashboard")
                            .route("/signin", web::post().to(dashboard_signin))
                            .route("/signout", web::post().to(signout)),
                    )
                    .route("/signup", web::post().to(signup))
                    .route("/signin", web::post().to(signin))
                    .route("/signout", web::post().to(signout))
                    .route("/resetPassword", web::patch().to(reset_password)),
            )
            // TRAVELS
            .service(
                web::scope("/travels")
                    .route("/filterByDate", web::get().to(travel::list_upcoming))
                    .route("/filterByCity", web::get().to(travel::list_by_route))
                    .route("/proprietor", web::get().to(travel::list_own_travels))
                    .route("/cancelation/{travel}", web::delete().to(travel::cancel_travel))
                    .route("", web::get().to(travel::list_travels))
                    .route("", web::post().to(travel::create_travel))
                    .route("/{id}", web::get().to(travel::get_travel))
                    .route("/{id}", web::put().to(travel::update_travel))
                    .route("/{id}", web::delete().to(travel::delete_travel)),
            )
            // PACKAGES
            .service(
                web::scope("/packages")
                    .route("/filterByMatch", web::get().to(matching::list_matches))
                    .route(
                        "/filterByRequest",
                        web::get().to(matching::list_requests_for_traveler),
                    )
                    .route(
                        "/filterByAcceptedRequest",
                        web::get().to(matching::list_accepted_for_proprietor),
                    )
                    .route(
                        "/filterIsNotPublished",
                        web::get().to(matching::list_not_published),
                    )
                    .route("/proprietor", web::get().to(package::list_own_packages))
                    .route("/image/{image}", web::get().to(package::get_image))
                    .route(
                        "/suggestions/confirmation/{package}",
                        web::post().to(package::confirm_suggestion),
                    )
                    .route(
                        "/suggestions/{package}",
                        web::post().to(package::send_suggestion),
                    )
                    .route(
                        "/requests/confirmation/{package}",
                        web::post().to(package::confirm_request),
                    )
                    .route(
                        "/requests/rejection/{package}",
                        web::post().to(package::reject_request),
                    )
                    .route(
                        "/requests/{traveler}",
                        web::post().to(package::create_request),
                    )
                    .route(
                        "/cancelation/{package}",
                        web::delete().to(package::cancel_package),
                    )
                    .route("", web::get().to(package::list_packages))
                    .route("", web::post().to(package::create_package))
                    .route("/{id}", web::get().to(package::get_package))
                    .route("/{id}", web::put().to(package::update_package))
                    .route("/{id}", web::delete().to(package::delete_package)),
            )
            // DASHBOARD
            .service(
                web::scope("/dashboard/packages")
                    .route("/approved", web::get().to(dashboard::list_approved))
                    .route("/shipped", web::get().to(dashboard::list_shipped))
                    .route("/delivered", web::get().to(dashboard::list_delivered))
                    .route("/completed", web::get().to(dashboard::list_completed))
                    .route(
                        "/shipped/{package}",
                        web::post().to(dashboard::confirm_shipped),
                    )
                    .route(
                        "/delivered/{package}",
                        web::post().to(dashboard::confirm_delivered),
                    )
                    .route(
                        "/received/{package}",
                        web::post().to(dashboard::confirm_received),
                    )
                    .route(
                        "/completed/{package}",
                        web::post().to(dashboard::confirm_completed),
                    )
                    .route("", web::get().to(dashboard::list_all))
                    .route("", web::post().to(dashboard::create_package_for))
                    .route("/{id}", web::put().to(dashboard::update_package_fields)),
            )
            // PROFILES
            .service(
                web::scope("/profiles")
                    .route("/profile", web::put().to(profile::update_profile))
                    .route("/password", web::patch().to(profile::change_password))
                    .route("/image", web::put().to(profile::change_image))
                    .route("", web::delete().to(profile::disable_account)),
            )
            // BACK OFFICE
            .service(
                web::scope("/users")
                    .route("", web::get().to(user_management::list_users))
                    .route("", web::post().to(user_management::create_user))
                    .route("/{id}", web::get().to(user_management::get_user))
                    .route("/{id}", web::put().to(user_management::update_user))
                    .route("/{id}", web::delete().to(user_management::delete_user)),
            )
            .service(
                web::scope("/employees")
                    .route("", web::get().to(employee::list_employees))
                    .route("", web::post().to(employee::create_employee))
                    .route("/{id}", web::get().to(employee::get_employee))
                    .route("/{id}", web::put().to(employee::update_employee))
                    .route("/{id}", web::delete().to(employee::delete_employee)),
            )
            .service(
                web::scope("/permissions")
                    .route("", web::get().to(permission::list_permissions))
                    .route("", web::post().to(permission::create_permission))
                    .route("/{id}", web::get().to(permission::get_permission))
                    .route("/{id}", web::put().to(permission::update_permission))
                    .route("/{id}", web::delete().to(permission::delete_permission)),
            )
            .service(
                web::scope("/locals")
                    .route("", web::get().to(local::list_locals))
                    .route("", web::post().to(local::create_local))
                    .route("/{id}", web::get().to(local::get_local))
                    .route("/{id}", web::put().to(local::update_local))
                    .route("/{id}", web::delete().to(local::delete_local)),
            )
            // IMAGES
            .route("/images", web::post().to(files::upload_image))
    })
    .bind(bind_address)?
    .run()
    .await
}
