use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use bcrypt::hash;
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};
use serde_json::{json, Value};
use validator::Validate;

use crate::{
    errors::ApiError,
    handlers::auth::BCRYPT_COST,
    middleware::auth::require_admin,
    models::user::{AdminCreateUserDto, AdminUpdateUserDto, Role, User},
};

fn parse_user_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::BadRequest("Invalid user ID".to_string()))
}

#[post("/users")]
pub async fn create_user(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<AdminCreateUserDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

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
        role: payload.role.unwrap_or(Role::User),
        profile_picture: None,
        reset_password_token: None,
        reset_password_expires: None,
        created_at: now,
        updated_at: now,
    };

    let inserted = users_collection.insert_one(&new_user, None).await?;
    new_user.id = inserted.inserted_id.as_object_id();

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "User created successfully",
        "data": new_user.sanitized(),
    })))
}

#[get("/users")]
pub async fn list_users(req: HttpRequest, db: web::Data<Database>) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let users_collection = db.collection::<User>("users");
    let cursor = users_collection.find(doc! {}, None).await?;
    let users: Vec<User> = cursor.try_collect().await?;
    let data: Vec<Value> = users.iter().map(User::sanitized).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Users fetched successfully",
        "data": data,
    })))
}

#[get("/users/{id}")]
pub async fn get_user(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let user_id = parse_user_id(&id)?;

    let users_collection = db.collection::<User>("users");
    let user = match users_collection.find_one(doc! { "_id": user_id }, None).await? {
        Some(user) => user,
        None => return Err(ApiError::NotFound("User not found".to_string())),
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User fetched successfully",
        "data": user.sanitized(),
    })))
}

#[put("/users/{id}")]
pub async fn update_user(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: web::Json<AdminUpdateUserDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    payload.validate()?;
    let user_id = parse_user_id(&id)?;

    let users_collection = db.collection::<User>("users");
    let existing = match users_collection.find_one(doc! { "_id": user_id }, None).await? {
        Some(user) => user,
        None => return Err(ApiError::NotFound("User not found".to_string())),
    };

    if let Some(email) = &payload.email {
        if email != &existing.email
            && users_collection
                .find_one(doc! { "email": email }, None)
                .await?
                .is_some()
        {
            return Err(ApiError::BadRequest("Email already in use".to_string()));
        }
    }

    let mut update = Document::new();
    if let Some(name) = &payload.name {
        update.insert("name", name.clone());
    }
    if let Some(email) = &payload.email {
        update.insert("email", email.clone());
    }
    if let Some(phone_number) = &payload.phone_number {
        update.insert("phoneNumber", phone_number.clone());
    }
    if let Some(role) = payload.role {
        update.insert("role", role.as_str());
    }
    if let Some(password) = &payload.password {
        update.insert("password", hash(password.as_bytes(), BCRYPT_COST)?);
    }
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    update.insert(
        "updatedAt",
        DateTime::from_millis(Utc::now().timestamp_millis()),
    );

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
            "message": "User updated successfully",
            "data": user.sanitized(),
        }))),
        None => Err(ApiError::NotFound("User not found".to_string())),
    }
}

#[delete("/users/{id}")]
pub async fn delete_user(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let user_id = parse_user_id(&id)?;

    let users_collection = db.collection::<User>("users");
    let result = users_collection.delete_one(doc! { "_id": user_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User deleted successfully",
    })))
}
