use std::path::Path;

use actix_multipart::Multipart;
use actix_web::HttpRequest;
use futures::{StreamExt, TryStreamExt};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::errors::ApiError;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Pull the first file field out of a multipart payload and persist it under
/// `upload_dir`. Only images are accepted and files are capped at 5 MB.
/// Returns the stored filename; the caller records it on the owning document.
pub async fn save_image(
    mut payload: Multipart,
    prefix: &str,
    upload_dir: &Path,
) -> Result<String, ApiError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {e}")))?
    {
        let Some(original_name) = field.content_disposition().get_filename().map(str::to_string)
        else {
            // plain text field, not a file
            continue;
        };

        let content_type = field
            .content_type()
            .map(|mime| mime.to_string())
            .unwrap_or_default();
        if !content_type.starts_with("image/") {
            return Err(ApiError::BadRequest("Only image files are allowed".to_string()));
        }

        let filename = unique_filename(prefix, &original_name);
        let path = upload_dir.join(&filename);
        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| ApiError::internal(format!("failed to create upload file: {e}")))?;

        let mut written = 0usize;
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {e}")))?;
            written += chunk.len();
            if written > MAX_IMAGE_BYTES {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(ApiError::BadRequest(
                    "Image must be smaller than 5 MB".to_string(),
                ));
            }
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::internal(format!("failed to write upload file: {e}")))?;
        }

        return Ok(filename);
    }

    Err(ApiError::BadRequest("An image file is required".to_string()))
}

/// `{prefix}-{uuid}{ext}`, keeping the original extension lowercased.
pub fn unique_filename(prefix: &str, original_name: &str) -> String {
    let extension = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default();
    format!("{}-{}{}", prefix, Uuid::new_v4(), extension)
}

/// Absolute URL for a stored filename, composed from the request's
/// connection info at response time. Documents only ever store the bare
/// filename.
pub fn public_url(req: &HttpRequest, filename: &str) -> String {
    let info = req.connection_info();
    format!("{}://{}/uploads/{}", info.scheme(), info.host(), filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn filenames_keep_the_extension_and_prefix() {
        let name = unique_filename("trekImage", "Everest Base Camp.PNG");
        assert!(name.starts_with("trekImage-"));
        assert!(name.ends_with(".png"));
    }

    #[test]
    fn filenames_without_extension_are_allowed() {
        let name = unique_filename("profile", "raw");
        assert!(name.starts_with("profile-"));
        assert!(!name.contains('.'));
    }

    #[test]
    fn filenames_are_unique() {
        assert_ne!(
            unique_filename("blogImage", "a.jpg"),
            unique_filename("blogImage", "a.jpg")
        );
    }

    #[test]
    fn public_url_is_composed_from_connection_info() {
        let req = TestRequest::default()
            .insert_header(("host", "api.justhike.com"))
            .to_http_request();
        let url = public_url(&req, "trekImage-abc.png");
        assert_eq!(url, "http://api.justhike.com/uploads/trekImage-abc.png");
    }
}
