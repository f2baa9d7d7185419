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
    models::blog::{Blog, BlogStatus, CreateBlogDto, UpdateBlogDto},
    services::uploads,
};

fn blog_json(blog: &Blog, req: &HttpRequest) -> Value {
    let mut value = serde_json::to_value(blog).unwrap_or_else(|_| json!({}));
    if let Value::Object(ref mut map) = value {
        let url = blog
            .image_file_name
            .as_deref()
            .map(|filename| uploads::public_url(req, filename));
        map.insert("imageUrl".to_string(), json!(url));
    }
    value
}

fn parse_blog_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::BadRequest("Invalid blog ID".to_string()))
}

#[get("")]
pub async fn list_blogs(req: HttpRequest, db: web::Data<Database>) -> Result<HttpResponse, ApiError> {
    let blogs_collection = db.collection::<Blog>("blogs");

    let cursor = blogs_collection
        .find(doc! { "status": BlogStatus::Published.as_str() }, None)
        .await?;
    let blogs: Vec<Blog> = cursor.try_collect().await?;
    let data: Vec<Value> = blogs.iter().map(|blog| blog_json(blog, &req)).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Blogs fetched successfully",
        "data": data,
    })))
}

#[get("/admin/all")]
pub async fn get_all_blogs_admin(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let blogs_collection = db.collection::<Blog>("blogs");
    let cursor = blogs_collection.find(doc! {}, None).await?;
    let blogs: Vec<Blog> = cursor.try_collect().await?;
    let data: Vec<Value> = blogs.iter().map(|blog| blog_json(blog, &req)).collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Blogs fetched successfully",
        "data": data,
    })))
}

#[get("/{id}")]
pub async fn get_blog(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let blog_id = parse_blog_id(&id)?;

    let blogs_collection = db.collection::<Blog>("blogs");
    let blog = blogs_collection.find_one(doc! { "_id": blog_id }, None).await?;

    // Drafts answer exactly like missing posts so their existence is not
    // revealed to outside readers.
    let blog = match blog {
        Some(blog) if blog.status == BlogStatus::Published => blog,
        _ => return Err(ApiError::NotFound("Blog not found".to_string())),
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Blog fetched successfully",
        "data": blog_json(&blog, &req),
    })))
}

#[post("")]
pub async fn create_blog(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<CreateBlogDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let admin = require_admin(&extensions)?;
    drop(extensions);

    payload.validate()?;

    let now = DateTime::from_millis(Utc::now().timestamp_millis());
    let mut new_blog = Blog {
        id: None,
        title: payload.title.clone(),
        content: payload.content.clone(),
        excerpt: payload.excerpt.clone(),
        tags: payload.tags.clone().unwrap_or_default(),
        image_file_name: None,
        status: payload.status.unwrap_or(BlogStatus::Draft),
        author: admin.id,
        created_at: now,
        updated_at: now,
    };

    let blogs_collection = db.collection::<Blog>("blogs");
    let inserted = blogs_collection.insert_one(&new_blog, None).await?;
    new_blog.id = inserted.inserted_id.as_object_id();

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Blog created successfully",
        "data": blog_json(&new_blog, &req),
    })))
}

#[put("/{id}")]
pub async fn update_blog(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: web::Json<UpdateBlogDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let blog_id = parse_blog_id(&id)?;

    let mut update = Document::new();
    if let Some(title) = &payload.title {
        update.insert("title", title.clone());
    }
    if let Some(content) = &payload.content {
        update.insert("content", content.clone());
    }
    if let Some(excerpt) = &payload.excerpt {
        update.insert("excerpt", excerpt.clone());
    }
    if let Some(tags) = &payload.tags {
        update.insert("tags", tags.clone());
    }
    if let Some(status) = payload.status {
        update.insert("status", status.as_str());
    }
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    update.insert(
        "updatedAt",
        DateTime::from_millis(Utc::now().timestamp_millis()),
    );

    let blogs_collection = db.collection::<Blog>("blogs");
    let updated = blogs_collection
        .find_one_and_update(
            doc! { "_id": blog_id },
            doc! { "$set": update },
            FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await?;

    match updated {
        Some(blog) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Blog updated successfully",
            "data": blog_json(&blog, &req),
        }))),
        None => Err(ApiError::NotFound("Blog not found".to_string())),
    }
}

#[delete("/{id}")]
pub async fn delete_blog(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let blog_id = parse_blog_id(&id)?;

    let blogs_collection = db.collection::<Blog>("blogs");
    let result = blogs_collection.delete_one(doc! { "_id": blog_id }, None).await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Blog not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Blog deleted successfully",
    })))
}

#[post("/{id}/image")]
pub async fn upload_blog_image(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let blog_id = parse_blog_id(&id)?;

    let filename = uploads::save_image(payload, "blogImage", &config::get_upload_dir()).await?;

    let blogs_collection = db.collection::<Blog>("blogs");
    let result = blogs_collection
        .update_one(
            doc! { "_id": blog_id },
            doc! { "$set": {
                "imageFileName": &filename,
                "updatedAt": DateTime::from_millis(Utc::now().timestamp_millis()),
            } },
            None,
        )
        .await?;

    if result.matched_count == 0 {
        return Err(ApiError::NotFound("Blog not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Blog image uploaded successfully",
        "data": {
            "imageFileName": filename,
            "imageUrl": uploads::public_url(&req, &filename),
        },
    })))
}
