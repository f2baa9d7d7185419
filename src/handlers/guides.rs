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
    models::guide::{CreateGuideDto, Guide, UpdateGuideDto},
    services::uploads,
};

fn guide_json(guide: &Guide, req: &HttpRequest) -> Value {
    let mut value = serde_json::to_value(guide).unwrap_or_else(|_| json!({}));
    if let Value::Object(ref mut map) = value {
        let url = guide
            .image_file_name
            .as_deref()
            .map(|filename| uploads::public_url(req, filename));
        map.insert("imageUrl".to_string(), json!(url));
    }
    value
}

fn parse_guide_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::BadRequest("Invalid guide ID".to_string()))
}

#[get("")]
pub async fn list_guides(req: HttpRequest, db: web::Data<Database>) -> Result<HttpResponse, ApiError> {
    let guides_collection = db.collection::<Guide>("guides");

    let cursor = guides_collection.find(doc! {}, None).await?;
    let guides: Vec<Guide> = cursor.try_collect().await?;
    let data: Vec<Value> = guides.iter().map(|guide| guide_json(guide, &req)).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Guides fetched successfully",
        "data": data,
    })))
}

#[get("/{id}")]
pub async fn get_guide(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let guide_id = parse_guide_id(&id)?;

    let guides_collection = db.collection::<Guide>("guides");
    let guide = match guides_collection.find_one(doc! { "_id": guide_id }, None).await? {
        Some(guide) => guide,
        None => return Err(ApiError::NotFound("Guide not found".to_string())),
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Guide fetched successfully",
        "data": guide_json(&guide, &req),
    })))
}

#[post("")]
pub async fn create_guide(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<CreateGuideDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let admin = require_admin(&extensions)?;
    drop(extensions);

    payload.validate()?;

    let now = DateTime::from_millis(Utc::now().timestamp_millis());
    let mut new_guide = Guide {
        id: None,
        name: payload.name.clone(),
        email: payload.email.clone(),
        phone_number: payload.phone_number.clone(),
        bio: payload.bio.clone(),
        experience_years: payload.experience_years.unwrap_or(0),
        languages: payload.languages.clone().unwrap_or_default(),
        image_file_name: None,
        created_by: admin.id,
        created_at: now,
        updated_at: now,
    };

    let guides_collection = db.collection::<Guide>("guides");
    let inserted = guides_collection.insert_one(&new_guide, None).await?;
    new_guide.id = inserted.inserted_id.as_object_id();

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Guide created successfully",
        "data": guide_json(&new_guide, &req),
    })))
}

#[put("/{id}")]
pub async fn update_guide(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: web::Json<UpdateGuideDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    payload.validate()?;
    let guide_id = parse_guide_id(&id)?;

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
    if let Some(bio) = &payload.bio {
        update.insert("bio", bio.clone());
    }
    if let Some(experience_years) = payload.experience_years {
        update.insert("experienceYears", experience_years);
    }
    if let Some(languages) = &payload.languages {
        update.insert("languages", languages.clone());
    }
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    update.insert(
        "updatedAt",
        DateTime::from_millis(Utc::now().timestamp_millis()),
    );

    let guides_collection = db.collection::<Guide>("guides");
    let updated = guides_collection
        .find_one_and_update(
            doc! { "_id": guide_id },
            doc! { "$set": update },
            FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await?;

    match updated {
        Some(guide) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Guide updated successfully",
            "data": guide_json(&guide, &req),
        }))),
        None => Err(ApiError::NotFound("Guide not found".to_string())),
    }
}

#[delete("/{id}")]
pub async fn delete_guide(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let guide_id = parse_guide_id(&id)?;

    let guides_collection = db.collection::<Guide>("guides");
    let result = guides_collection.delete_one(doc! { "_id": guide_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Guide not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Guide deleted successfully",
    })))
}

#[post("/{id}/image")]
pub async fn upload_guide_image(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let guide_id = parse_guide_id(&id)?;

    let filename = uploads::save_image(payload, "guideImage", &config::get_upload_dir()).await?;

    let guides_collection = db.collection::<Guide>("guides");
    let result = guides_collection
        .update_one(
            doc! { "_id": guide_id },
            doc! { "$set": {
                "imageFileName": &filename,
                "updatedAt": DateTime::from_millis(Utc::now().timestamp_millis()),
            } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Guide not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Guide image uploaded successfully",
        "data": {
            "imageFileName": filename,
            "imageUrl": uploads::public_url(&req, &filename),
        },
    })))
}
