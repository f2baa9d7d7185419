mod config;
mod errors;
mod handlers;
mod middleware;
mod models;
mod services;

use actix_cors::Cors;
use actix_files::Files;
use actix_governor::{Governor, GovernorConfigBuilder};
use actix_web::{get, http::header, middleware::Logger, web, App, HttpResponse, HttpServer};
use dotenv::dotenv;

use errors::ApiError;
use handlers::{admin, auth, blogs, bookings, guides, treks};
use middleware::Authentication;

#[get("/")]
async fn welcome() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Welcome to the JustHike API",
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let database = config::init_database()
        .await
        .expect("Failed to connect to database");

    let upload_dir = config::get_upload_dir();
    std::fs::create_dir_all(&upload_dir).expect("Failed to create upload directory");

    let port = config::get_port();
    let frontend_urls = config::get_frontend_urls();

    // Rate limiting: refill 1 request/second, burst of 60
    let governor_conf = GovernorConfigBuilder::default()
        .per_second(1)
        .burst_size(60)
        .finish()
        .unwrap();

    HttpServer::new(move || {
        let mut cors = Cors::default()
            .allow_any_method()
            .allowed_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .supports_credentials();
        for origin in &frontend_urls {
            cors = cors.allowed_origin(origin);
        }

        App::new()
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(Governor::new(&governor_conf))
            .wrap(Authentication)
            .app_data(web::Data::new(database.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                ApiError::BadRequest(err.to_string()).into()
            }))
            .service(welcome)
            .service(Files::new("/uploads", upload_dir.clone()))
            .service(
                web::scope("/api")
                    .service(
                        web::scope("/auth")
                            .service(auth::register)
                            .service(auth::login)
                            .service(auth::verify_token)
                            .service(auth::verify_admin_token)
                            .service(auth::set_cookies)
                            .service(auth::forgot_password)
                            .service(auth::request_password_reset)
                            .service(auth::reset_password_with_token)
                            .service(auth::reset_password)
                            .service(auth::update_profile)
                            .service(auth::upload_profile_picture),
                    )
                    .service(
                        web::scope("/admin")
                            .service(admin::create_user)
                            .service(admin::list_users)
                            .service(admin::get_user)
                            .service(admin::update_user)
                            .service(admin::delete_user),
                    )
                    .service(
                        web::scope("/treks")
                            .service(treks::list_treks)
                            .service(treks::create_trek)
                            .service(treks::upload_trek_image)
                            .service(treks::get_trek)
                            .service(treks::update_trek)
                            .service(treks::delete_trek),
                    )
                    .service(
                        web::scope("/guides")
                            .service(guides::list_guides)
                            .service(guides::create_guide)
                            .service(guides::upload_guide_image)
                            .service(guides::get_guide)
                            .service(guides::update_guide)
                            .service(guides::delete_guide),
                    )
                    .service(
                        web::scope("/bookings")
                            // admin routes first so /admin/... never matches /{id}
                            .service(bookings::get_all_bookings_admin)
                            .service(bookings::get_booking_admin)
                            .service(bookings::update_booking_admin)
                            .service(bookings::delete_booking_admin)
                            .service(bookings::create_booking)
                            .service(bookings::get_my_bookings)
                            .service(bookings::get_my_booking)
                            .service(bookings::update_my_booking)
                            .service(bookings::cancel_my_booking),
                    )
                    .service(
                        web::scope("/blogs")
                            .service(blogs::list_blogs)
                            .service(blogs::get_all_blogs_admin)
                            .service(blogs::create_blog)
                            .service(blogs::upload_blog_image)
                            .service(blogs::get_blog)
                            .service(blogs::update_blog)
                            .service(blogs::delete_blog),
                    ),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
