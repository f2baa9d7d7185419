use actix_multipart::Multipart;
use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
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
    config,
    errors::ApiError,
    middleware::auth::require_admin,
    models::trek::{CreateTrekDto, Difficulty, Trek, UpdateTrekDto, DEFAULT_MAX_GROUP_SIZE},
    services::uploads,
};

/// Serialize a trek and attach the composed image URL.
fn trek_json(trek: &Trek, req: &HttpRequest) -> Value {
    let mut value = serde_json::to_value(trek).unwrap_or_else(|_| json!({}));
    if let Value::Object(ref mut map) = value {
        let url = trek
            .image_file_name
            .as_deref()
            .map(|filename| uploads::public_url(req, filename));
        map.insert("imageUrl".to_string(), json!(url));
    }
    value
}

fn parse_trek_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::BadRequest("Invalid trek ID".to_string()))
}

#[get("")]
pub async fn list_treks(req: HttpRequest, db: web::Data<Database>) -> Result<HttpResponse, ApiError> {
    let treks_collection = db.collection::<Trek>("treks");

    // Only active treks are listed publicly
    let cursor = treks_collection.find(doc! { "isActive": true }, None).await?;
    let treks: Vec<Trek> = cursor.try_collect().await?;
    let data: Vec<Value> = treks.iter().map(|trek| trek_json(trek, &req)).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Treks fetched successfully",
        "data": data,
    })))
}

#[get("/{id}")]
pub async fn get_trek(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let trek_id = parse_trek_id(&id)?;

    let treks_collection = db.collection::<Trek>("treks");
    let trek = match treks_collection.find_one(doc! { "_id": trek_id }, None).await? {
        Some(trek) => trek,
        None => return Err(ApiError::NotFound("Trek not found".to_string())),
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Trek fetched successfully",
        "data": trek_json(&trek, &req),
    })))
}

#[post("")]
pub async fn create_trek(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<CreateTrekDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let admin = require_admin(&extensions)?;
    drop(extensions);

    payload.validate()?;

    let now = DateTime::from_millis(Utc::now().timestamp_millis());
    let mut new_trek = Trek {
        id: None,
        title: payload.title.clone(),
        description: payload.description.clone(),
        difficulty: payload.difficulty.unwrap_or(Difficulty::Moderate),
        duration_days: payload.duration_days,
        price: payload.price,
        location: payload.location.clone(),
        max_group_size: payload.max_group_size.unwrap_or(DEFAULT_MAX_GROUP_SIZE),
        is_active: payload.is_active.unwrap_or(true),
        image_file_name: None,
        created_by: admin.id,
        created_at: now,
        updated_at: now,
    };

    let treks_collection = db.collection::<Trek>("treks");
    let inserted = treks_collection.insert_one(&new_trek, None).await?;
    new_trek.id = inserted.inserted_id.as_object_id();

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Trek created successfully",
        "data": trek_json(&new_trek, &req),
    })))
}

#[put("/{id}")]
pub async fn update_trek(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: web::Json<UpdateTrekDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    payload.validate()?;
    let trek_id = parse_trek_id(&id)?;

    let mut update = Document::new();
    if let Some(title) = &payload.title {
        update.insert("title", title.clone());
    }
    if let Some(description) = &payload.description {
        update.insert("description", description.clone());
    }
    if let Some(difficulty) = payload.difficulty {
        update.insert("difficulty", difficulty.as_str());
    }
    if let Some(duration_days) = payload.duration_days {
        update.insert("durationDays", duration_days);
    }
    if let Some(price) = payload.price {
        update.insert("price", price);
    }
    if let Some(location) = &payload.location {
        update.insert("location", location.clone());
    }
    if let Some(max_group_size) = payload.max_group_size {
        update.insert("maxGroupSize", max_group_size);
    }
    if let Some(is_active) = payload.is_active {
        update.insert("isActive", is_active);
    }
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    update.insert(
        "updatedAt",
        DateTime::from_millis(Utc::now().timestamp_millis()),
    );

    let treks_collection = db.collection::<Trek>("treks");
    let updated = treks_collection
        .find_one_and_update(
            doc! { "_id": trek_id },
            doc! { "$set": update },
            FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await?;

    match updated {
        Some(trek) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Trek updated successfully",
            "data": trek_json(&trek, &req),
        }))),
        None => Err(ApiError::NotFound("Trek not found".to_string())),
    }
}

#[delete("/{id}")]
pub async fn delete_trek(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let trek_id = parse_trek_id(&id)?;

    let treks_collection = db.collection::<Trek>("treks");
    let result = treks_collection.delete_one(doc! { "_id": trek_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Trek not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Trek deleted successfully",
    })))
}

#[post("/{id}/image")]
pub async fn upload_trek_image(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let trek_id = parse_trek_id(&id)?;

    let filename = uploads::save_image(payload, "trekImage", &config::get_upload_dir()).await?;

    let treks_collection = db.collection::<Trek>("treks");
    let result = treks_collection
        .update_one(
            doc! { "_id": trek_id },
            doc! { "$set": {
                "imageFileName": &filename,
                "updatedAt": DateTime::from_millis(Utc::now().timestamp_millis()),
            } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Trek not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Trek image uploaded successfully",
        "data": {
            "imageFileName": filename,
            "imageUrl": uploads::public_url(&req, &filename),
        },
    })))
}
