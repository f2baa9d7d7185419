use actix_web::{delete, get, post, put, web, HttpMessage, HttpRequest, HttpResponse};
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime, Document},
    options::{FindOneAndUpdateOptions, ReturnDocument},
    Database,
};
use serde_json::json;
use validator::Validate;

use crate::{
    errors::ApiError,
    middleware::auth::{require_admin, require_auth},
    models::booking::{
        total_price, AdminUpdateBookingDto, Booking, BookingStatus, CreateBookingDto,
        UpdateBookingDto,
    },
    models::trek::Trek,
    models::user::User,
};

fn parse_booking_id(id: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(id).map_err(|_| ApiError::BadRequest("Invalid booking ID".to_string()))
}

fn user_object_id(user: &User) -> Result<ObjectId, ApiError> {
    user.id
        .ok_or_else(|| ApiError::internal("stored user has no object id"))
}

#[post("")]
pub async fn create_booking(
    req: HttpRequest,
    db: web::Data<Database>,
    payload: web::Json<CreateBookingDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let user = require_auth(&extensions)?;
    drop(extensions);

    payload.validate()?;

    let user_id = user_object_id(&user)?;
    let trek_id = ObjectId::parse_str(&payload.trek_id)
        .map_err(|_| ApiError::BadRequest("Invalid trek ID".to_string()))?;

    let treks_collection = db.collection::<Trek>("treks");
    let trek = match treks_collection.find_one(doc! { "_id": trek_id }, None).await? {
        Some(trek) => trek,
        None => return Err(ApiError::NotFound("Trek not found".to_string())),
    };

    let now = DateTime::from_millis(Utc::now().timestamp_millis());
    let mut new_booking = Booking {
        id: None,
        user: user_id,
        trek: trek_id,
        guide: None,
        start_date: DateTime::from_millis(payload.start_date.timestamp_millis()),
        participants: payload.participants,
        total_price: total_price(payload.participants, trek.price),
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    let bookings_collection = db.collection::<Booking>("bookings");
    let inserted = bookings_collection.insert_one(&new_booking, None).await?;
    new_booking.id = inserted.inserted_id.as_object_id();

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Booking created successfully",
        "data": new_booking,
    })))
}

#[get("")]
pub async fn get_my_bookings(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let user = require_auth(&extensions)?;
    drop(extensions);

    let user_id = user_object_id(&user)?;

    let bookings_collection = db.collection::<Booking>("bookings");
    let cursor = bookings_collection.find(doc! { "user": user_id }, None).await?;
    let bookings: Vec<Booking> = cursor.try_collect().await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Bookings fetched successfully",
        "data": bookings,
    })))
}

#[get("/admin/all")]
pub async fn get_all_bookings_admin(
    req: HttpRequest,
    db: web::Data<Database>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let bookings_collection = db.collection::<Booking>("bookings");
    let cursor = bookings_collection.find(doc! {}, None).await?;
    let bookings: Vec<Booking> = cursor.try_collect().await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Bookings fetched successfully",
        "data": bookings,
    })))
}

#[get("/admin/{id}")]
pub async fn get_booking_admin(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let booking_id = parse_booking_id(&id)?;

    let bookings_collection = db.collection::<Booking>("bookings");
    let booking = match bookings_collection
        .find_one(doc! { "_id": booking_id }, None)
        .await?
    {
        Some(booking) => booking,
        None => return Err(ApiError::NotFound("Booking not found".to_string())),
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Booking fetched successfully",
        "data": booking,
    })))
}

#[put("/admin/{id}")]
pub async fn update_booking_admin(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: web::Json<AdminUpdateBookingDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let booking_id = parse_booking_id(&id)?;

    let mut update = Document::new();
    if let Some(status) = payload.status {
        update.insert("status", status.as_str());
    }
    if let Some(guide_id) = &payload.guide_id {
        let guide_id = ObjectId::parse_str(guide_id)
            .map_err(|_| ApiError::BadRequest("Invalid guide ID".to_string()))?;
        update.insert("guide", guide_id);
    }
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    update.insert(
        "updatedAt",
        DateTime::from_millis(Utc::now().timestamp_millis()),
    );

    let bookings_collection = db.collection::<Booking>("bookings");
    let updated = bookings_collection
        .find_one_and_update(
            doc! { "_id": booking_id },
            doc! { "$set": update },
            FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await?;

    match updated {
        Some(booking) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Booking updated successfully",
            "data": booking,
        }))),
        None => Err(ApiError::NotFound("Booking not found".to_string())),
    }
}

#[delete("/admin/{id}")]
pub async fn delete_booking_admin(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    require_admin(&extensions)?;
    drop(extensions);

    let booking_id = parse_booking_id(&id)?;

    let bookings_collection = db.collection::<Booking>("bookings");
    let result = bookings_collection
        .delete_one(doc! { "_id": booking_id }, None)
        .await?;

    if result.deleted_count == 0 {
        return Err(ApiError::NotFound("Booking not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Booking deleted successfully",
    })))
}

#[get("/{id}")]
pub async fn get_my_booking(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let user = require_auth(&extensions)?;
    drop(extensions);

    let user_id = user_object_id(&user)?;
    let booking_id = parse_booking_id(&id)?;

    let bookings_collection = db.collection::<Booking>("bookings");
    let booking = match bookings_collection
        .find_one(doc! { "_id": booking_id, "user": user_id }, None)
        .await?
    {
        Some(booking) => booking,
        None => return Err(ApiError::NotFound("Booking not found".to_string())),
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Booking fetched successfully",
        "data": booking,
    })))
}

#[put("/{id}")]
pub async fn update_my_booking(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
    payload: web::Json<UpdateBookingDto>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let user = require_auth(&extensions)?;
    drop(extensions);

    payload.validate()?;

    let user_id = user_object_id(&user)?;
    let booking_id = parse_booking_id(&id)?;

    let bookings_collection = db.collection::<Booking>("bookings");
    let booking = match bookings_collection
        .find_one(doc! { "_id": booking_id, "user": user_id }, None)
        .await?
    {
        Some(booking) => booking,
        None => return Err(ApiError::NotFound("Booking not found".to_string())),
    };

    if booking.status != BookingStatus::Pending {
        return Err(ApiError::BadRequest(
            "Only pending bookings can be updated".to_string(),
        ));
    }

    let mut update = Document::new();
    if let Some(start_date) = payload.start_date {
        update.insert(
            "startDate",
            DateTime::from_millis(start_date.timestamp_millis()),
        );
    }
    if let Some(participants) = payload.participants {
        update.insert("participants", participants);

        // Recomputed from the trek's current price, not the price at booking
        // time.
        let treks_collection = db.collection::<Trek>("treks");
        if let Some(trek) = treks_collection
            .find_one(doc! { "_id": booking.trek }, None)
            .await?
        {
            update.insert("totalPrice", total_price(participants, trek.price));
        }
    }
    if update.is_empty() {
        return Err(ApiError::BadRequest("No fields to update".to_string()));
    }
    update.insert(
        "updatedAt",
        DateTime::from_millis(Utc::now().timestamp_millis()),
    );

    let updated = bookings_collection
        .find_one_and_update(
            doc! { "_id": booking_id, "user": user_id },
            doc! { "$set": update },
            FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await?;

    match updated {
        Some(booking) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Booking updated successfully",
            "data": booking,
        }))),
        None => Err(ApiError::NotFound("Booking not found".to_string())),
    }
}

#[delete("/{id}")]
pub async fn cancel_my_booking(
    req: HttpRequest,
    db: web::Data<Database>,
    id: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let extensions = req.extensions();
    let user = require_auth(&extensions)?;
    drop(extensions);

    let user_id = user_object_id(&user)?;
    let booking_id = parse_booking_id(&id)?;

    let bookings_collection = db.collection::<Booking>("bookings");
    let booking = match bookings_collection
        .find_one(doc! { "_id": booking_id, "user": user_id }, None)
        .await?
    {
        Some(booking) => booking,
        None => return Err(ApiError::NotFound("Booking not found".to_string())),
    };

    if !booking.status.is_cancellable() {
        return Err(ApiError::BadRequest(
            "Only pending or confirmed bookings can be cancelled".to_string(),
        ));
    }

    let updated = bookings_collection
        .find_one_and_update(
            doc! { "_id": booking_id, "user": user_id },
            doc! { "$set": {
                "status": BookingStatus::Cancelled.as_str(),
                "updatedAt": DateTime::from_millis(Utc::now().timestamp_millis()),
            } },
            FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build(),
        )
        .await?;

    match updated {
        Some(booking) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Booking cancelled successfully",
            "data": booking,
        }))),
        None => Err(ApiError::NotFound("Booking not found".to_string())),
    }
}
