use mongodb::{Client, Database};
use std::env;
use std::path::PathBuf;

pub async fn init_database() -> mongodb::error::Result<Database> {
    let mongodb_uri = env::var("MONGODB_URI").expect("MONGODB_URI must be set");
    let database_name = env::var("DATABASE_NAME").expect("DATABASE_NAME must be set");

    log::info!("Connecting to MongoDB database: {}", database_name);

    let client = Client::with_uri_str(&mongodb_uri).await?;

    // Test the connection
    match client.list_database_names(None, None).await {
        Ok(names) => {
            log::info!("Successfully connected to MongoDB. Available databases: {:?}", names);
        }
        Err(e) => {
            log::error!("Failed to list databases: {}", e);
        }
    }

    Ok(client.database(&database_name))
}

pub fn get_jwt_secret() -> String {
    env::var("JWT_SECRET").expect("JWT_SECRET must be set")
}

pub fn get_port() -> u16 {
    env::var("PORT")
        .expect("PORT must be set")
        .parse()
        .expect("PORT must be a number")
}

/// Allowed CORS origins, comma-separated in FRONTEND_URL.
pub fn get_frontend_urls() -> Vec<String> {
    env::var("FRONTEND_URL")
        .expect("FRONTEND_URL must be set")
        .split(',')
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty())
        .collect()
}

/// Base URL of the frontend used inside password-reset links.
pub fn get_client_url() -> String {
    env::var("CLIENT_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
}

pub fn get_upload_dir() -> PathBuf {
    PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()))
}

pub fn cookie_secure() -> bool {
    env::var("COOKIE_SECURE").map(|v| v == "true").unwrap_or(false)
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub from_name: String,
    pub enabled: bool,
}

impl EmailConfig {
    pub fn from_env() -> Self {
        Self {
            smtp_host: env::var("SMTP_HOST").unwrap_or_default(),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|port| port.parse().ok())
                .unwrap_or(587),
            smtp_username: env::var("SMTP_USERNAME").unwrap_or_default(),
            smtp_password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_address: env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@justhike.com".to_string()),
            from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "JustHike".to_string()),
            enabled: env::var("EMAIL_ENABLED").map(|v| v != "false").unwrap_or(true),
        }
    }
}
