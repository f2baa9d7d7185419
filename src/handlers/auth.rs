use actix_multipart::Multipart;
use actix_web::{
    cookie::{Cookie, SameSite},
    get, post, put, web, HttpMessage, HttpRequest, HttpResponse,
};
use bcrypt::{hash, verify};
use chrono::Utc;
use mongodb::{
    bson::{doc, DateTime, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};
use serde::Deserialize;
use serde_json::json;
use validator::Validate;

use crate::{
    config,
    errors::ApiError,
    middleware::auth::{decode_token, issue_token, require_admin, require_auth, token_from_request},
    models::user::{
        ForgotPasswordDto, LoginDto, RegisterDto, ResetPasswordDto, Role, UpdateProfileDto, User,
    },
    services::{email::EmailService, reset, uploads},
};

pub const BCRYPT_COST: u32 = 10;

const RESET_SENT_MESSAGE: &str =
    "If an account with that email exists, a password reset link has been sent";

#[post("/register")]
pub async fn register(
    db: web::Data<Database>,
    payload: web::Json<RegisterDto>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let users_collection = db.collection::<User>("users");

    if users_collection
        .find_one(doc! { "email": &payload.email }, None)
        .await?
        .is_some()
    {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let hashed_password = hash(payload.password.as_bytes(), BCRYPT_COST)?;
    let now = DateTime::from_millis(Utc::now().timestamp_millis());

    let mut new_user = User {
        id: None,
        name: payload.name.clone(),
        email: payload.email.clone(),
        password: hashed_password,
        phone_number: payload.phone_number.clone(),
        role: Role::User,
        profile_picture: None,
        reset_password_token: None,
        reset_password_expires: None,
        created_at: now,
        updated_at: now,
    };

    let inserted = users_collection.insert_one(&new_user, None).await?;
    new_user.id = inserted.inserted_id.as_object_id();
    let user_id = new_user
        .id
        .ok_or_else(|| ApiError::internal("inserted user has no object id"))?;

    let token = issue_token(&user_id, &new_user.email)?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Registration successful",
        "token": token,
        "data": new_user.sanitized(),
    })))
}

#[post("/login")]
pub async fn login(
    db: web::Data<Database>,
    payload: web::Json<LoginDto>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let users_collection = db.collection::<User>("users");

    // Unknown email and wrong password answer identically so the endpoint
    // cannot be used to probe for accounts.
    let user = match users_collection
        .find_one(doc! { "email": &payload.email }, None)
        .await?
    {
        Some(user) => user,
        None => return Err(ApiError::Unauthorized("Invalid credentials".to_string())),
    };

    if !verify(&payload.password, &user.password).unwrap_or(false) {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal("stored user has no object id"))?;
    let token = issue_token(&user_id, &user.email)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Login successful",
        "token": token,
        "data": user.sanitized(),
    })))
}

#[get("/verify")]
pub async fn verify_token(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let user = require_auth(&extensions)?;
    drop(extensions);

    let mut data = user.sanitized();
    if let Some(claims) = token_from_request(&req).and_then(|token| decode_token(&token).ok()) {
        if let serde_json::Value::Object(ref mut map) = data {
            map.insert("iat".to_string(), json!(claims.iat));
            map.insert("exp".to_string(), json!(claims.exp));
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Token is valid",
        "data": data,
    })))
}

#[get("/verify-admin")]
pub async fn verify_admin_token(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let admin = require_admin(&extensions)?;
    drop(extensions);

    let mut data = admin.sanitized();
    if let Some(claims) = token_from_request(&req).and_then(|token| decode_token(&token).ok()) {
        if let serde_json::Value::Object(ref mut map) = data {
            map.insert("iat".to_string(), json!(claims.iat));
            map.insert("exp".to_string(), json!(claims.exp));
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Admin token is valid",
        "data": data,
    })))
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    token: Option<String>,
}

#[post("/set-cookies")]
pub async fn set_cookies(
    req: HttpRequest,
    payload: Option<web::Json<TokenPayload>>,
) -> Result<HttpResponse, ApiError> {
    let token = token_from_request(&req)
        .or_else(|| payload.as_ref().and_then(|body| body.token.clone()))
        .ok_or_else(|| ApiError::BadRequest("Token is required".to_string()))?;

    // verify before handing the token back as a cookie
    decode_token(&token).map_err(|_| ApiError::Unauthorized("Invalid token".to_string()))?;

    let cookie = Cookie::build("token", token)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(config::cookie_secure())
        .finish();

    Ok(HttpResponse::Ok().cookie(cookie).json(json!({
        "success": true,
        "message": "Auth cookie set",
    })))
}

#[put("/profile")]
pub async fn update_profile(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<UpdateProfileDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let user = require_auth(&extensions)?;
    drop(extensions);

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal("stored user has no object id"))?;

    let mut update = Document::new();
    if let Some(name) = &payload.name {
        update.insert("name", name.clone());
    }
    if let Some(phone_number) = &payload.phone_number {
        update.insert("phoneNumber", phone_number.clone());
    }
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    update.insert(
        "updatedAt",
        DateTime::from_millis(Utc::now().timestamp_millis()),
    );

    let users_collection = db.collection::<User>("users");
    let updated = users_collection
        .find_one_and_update(
            doc! { "_id": user_id },
            doc! { "$set": update },
            FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await?;

    match updated {
        Some(user) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Profile updated successfully",
            "data": user.sanitized(),
        }))),
        None => Err(ApiError::NotFound("User not found".to_string())),
    }
}

#[post("/profile-picture")]
pub async fn upload_profile_picture(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let user = require_auth(&extensions)?;
    drop(extensions);

    let user_id = user
        .id
        .ok_or_else(|| ApiError::internal("stored user has no object id"))?;

    let filename = uploads::save_image(payload, "profile", &config::get_upload_dir()).await?;

    let users_collection = db.collection::<User>("users");
    users_collection
        .update_one(
            doc! { "_id": user_id },
            doc! { "$set": {
                "profilePicture": &filename,
                "updatedAt": DateTime::from_millis(Utc::now().timestamp_millis()),
            } },
            None,
        )
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile picture updated successfully",
        "data": {
            "profilePicture": filename,
            "imageUrl": uploads::public_url(&req, &filename),
        },
    })))
}

#[post("/forgot-password")]
pub async fn forgot_password(
    db: web::Data<Database>,
    payload: web::Json<ForgotPasswordDto>,
) -> Result<HttpResponse, ApiError> {
    request_reset(db, payload).await
}

#[post("/request-password-reset")]
pub async fn request_password_reset(
    db: web::Data<Database>,
    payload: web::Json<ForgotPasswordDto>,
) -> Result<HttpResponse, ApiError> {
    request_reset(db, payload).await
}

async fn request_reset(
    db: web::Data<Database>,
    payload: web::Json<ForgotPasswordDto>,
) -> Result<HttpResponse, ApiError> {
    payload.validate()?;

    let users_collection = db.collection::<User>("users");

    // Unknown addresses get the same generic answer, and no mail.
    let user = match users_collection
        .find_one(doc! { "email": &payload.email }, None)
        .await?
    {
        Some(user) => user,
        None => {
            return Ok(HttpResponse::Ok().json(json!({
                "success": true,
                "message": RESET_SENT_MESSAGE,
            })))
        }
    };

    let (raw_token, token_hash) = reset::generate_reset_token();
    let now = Utc::now();
    let expires_at = DateTime::from_millis(
        (now + chrono::Duration::seconds(reset::RESET_TOKEN_TTL_SECS)).timestamp_millis(),
    );

    users_collection
        .update_one(
            doc! { "email": &payload.email },
            doc! { "$set": {
                "resetPasswordToken": &token_hash,
                "resetPasswordExpires": expires_at,
                "updatedAt": DateTime::from_millis(now.timestamp_millis()),
            } },
            None,
        )
        .await?;

    let reset_link = format!(
        "{}/auth/reset-password?token={}&email={}",
        config::get_client_url(),
        raw_token,
        user.email
    );

    let mailer = EmailService::from_env();
    if let Err(err) = mailer
        .send_password_reset_email(&user.email, &user.name, &reset_link)
        .await
    {
        log::error!("password reset email to {} failed: {err}", user.email);
        return Err(ApiError::EmailSend(
            "Failed to send reset email. Please try again later.".to_string(),
        ));
    }

    log::info!("password reset email sent to {}", user.email);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": RESET_SENT_MESSAGE,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ResetTokenQuery {
    token: Option<String>,
}

#[post("/reset-password/{token}")]
pub async fn reset_password_with_token(
    db: web::Data<Database>,
    path: web::Path<String>,
    payload: web::Json<ResetPasswordDto>,
) -> Result<HttpResponse, ApiError> {
    let token = path.into_inner();
    let password = new_password_from(&payload)?;
    perform_reset(&db, &token, &password).await
}

#[post("/reset-password")]
pub async fn reset_password(
    db: web::Data<Database>,
    query: web::Query<ResetTokenQuery>,
    payload: web::Json<ResetPasswordDto>,
) -> Result<HttpResponse, ApiError> {
    let token = query
        .token
        .clone()
        .or_else(|| payload.token.clone())
        .ok_or_else(|| ApiError::BadRequest("Reset token is required".to_string()))?;
    let password = new_password_from(&payload)?;
    perform_reset(&db, &token, &password).await
}

fn new_password_from(payload: &ResetPasswordDto) -> Result<String, ApiError> {
    let password = payload
        .new_password
        .clone()
        .or_else(|| payload.password.clone())
        .ok_or_else(|| ApiError::BadRequest("Password is required".to_string()))?;
    if password.len() < 6 {
        return Err(ApiError::BadRequest(
            "Password must be at least 6 characters".to_string(),
        ));
    }
    Ok(password)
}

async fn perform_reset(
    db: &Database,
    raw_token: &str,
    new_password: &str,
) -> Result<HttpResponse, ApiError> {
    let token_hash = reset::hash_token(raw_token);
    let now = DateTime::from_millis(Utc::now().timestamp_millis());
    let hashed_password = hash(new_password.as_bytes(), BCRYPT_COST)?;

    let users_collection = db.collection::<User>("users");

    // Single atomic update: matching on the hash plus a still-future expiry
    // and unsetting both reset fields means a token can never be consumed
    // twice, and a wrong token is indistinguishable from an expired one.
    let user = users_collection
        .find_one_and_update(
            doc! {
                "resetPasswordToken": &token_hash,
                "resetPasswordExpires": { "$gt": now },
            },
            doc! {
                "$set": { "password": &hashed_password, "updatedAt": now },
                "$unset": { "resetPasswordToken": "", "resetPasswordExpires": "" },
            },
            None,
        )
        .await?;

    let user = match user {
        Some(user) => user,
        None => {
            return Err(ApiError::BadRequest(
                "Invalid or expired reset token".to_string(),
            ))
        }
    };

    log::info!("password reset completed for {}", user.email);

    // Confirmation is best-effort; the reset already happened.
    let mailer = EmailService::from_env();
    if let Err(err) = mailer
        .send_reset_confirmation_email(&user.email, &user.name)
        .await
    {
        log::warn!("reset confirmation email to {} failed: {err}", user.email);
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Password has been reset successfully",
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_password_prefers_the_new_password_field() {
        let payload = ResetPasswordDto {
            token: None,
            new_password: Some("fresh-password".to_string()),
            password: Some("legacy-password".to_string()),
        };
        assert_eq!(new_password_from(&payload).unwrap(), "fresh-password");
    }

    #[test]
    fn new_password_falls_back_to_the_legacy_field() {
        let payload = ResetPasswordDto {
            token: None,
            new_password: None,
            password: Some("legacy-password".to_string()),
        };
        assert_eq!(new_password_from(&payload).unwrap(), "legacy-password");
    }

    #[test]
    fn missing_password_is_rejected() {
        let payload = ResetPasswordDto {
            token: None,
            new_password: None,
            password: None,
        };
        let err = new_password_from(&payload).unwrap_err();
        assert_eq!(err.to_string(), "Password is required");
    }

    #[test]
    fn short_password_is_rejected() {
        let payload = ResetPasswordDto {
            token: None,
            new_password: Some("short".to_string()),
            password: None,
        };
        let err = new_password_from(&payload).unwrap_err();
        assert_eq!(err.to_string(), "Password must be at least 6 characters");
    }
}
