use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
};

use crate::{
    dto::upload::UploadedImageList,
    error::{AppError, AppResult},
    images::{ImageClient, UploadedImage, extract_public_id},
    middleware::auth::{AuthUser, ensure_admin},
    response::{ApiResponse, Meta},
    state::AppState,
};

const MAX_FILES_PER_REQUEST: usize = 5;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/image", axum::routing::post(upload_image))
        .route("/images", axum::routing::post(upload_images))
        .route("/image/{public_id}", axum::routing::delete(delete_image))
}

fn image_client(state: &AppState) -> AppResult<&ImageClient> {
    state
        .images
        .as_ref()
        .ok_or_else(|| AppError::Unavailable("Image uploads are not configured".into()))
}

#[utoipa::path(
    post,
    path = "/api/upload/image",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Uploaded image", body = ApiResponse<UploadedImage>),
        (status = 400, description = "No image file provided"),
        (status = 403, description = "Admin only"),
        (status = 503, description = "CDN credentials not configured"),
    ),
    tag = "Upload"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<UploadedImage>>)> {
    ensure_admin(&user)?;
    let client = image_client(&state)?;

    let mut images = collect_uploads(client, multipart, 1).await?;
    let image = images
        .pop()
        .ok_or_else(|| AppError::BadRequest("No image file provided".into()))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Image uploaded",
            image,
            Some(Meta::empty()),
        )),
    ))
}

#[utoipa::path(
    post,
    path = "/api/upload/images",
    request_body(content = Vec<u8>, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Uploaded images", body = ApiResponse<UploadedImageList>),
        (status = 403, description = "Admin only"),
        (status = 503, description = "CDN credentials not configured"),
    ),
    tag = "Upload"
)]
pub async fn upload_images(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<(StatusCode, Json<ApiResponse<UploadedImageList>>)> {
    ensure_admin(&user)?;
    let client = image_client(&state)?;

    let images = collect_uploads(client, multipart, MAX_FILES_PER_REQUEST).await?;
    if images.is_empty() {
        return Err(AppError::BadRequest("No image files in request".into()));
    }

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(
            "Images uploaded",
            UploadedImageList { images },
            Some(Meta::empty()),
        )),
    ))
}

async fn collect_uploads(
    client: &ImageClient,
    mut multipart: Multipart,
    max_files: usize,
) -> AppResult<Vec<UploadedImage>> {
    let mut images = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if images.len() >= max_files {
            return Err(AppError::BadRequest(format!(
                "At most {max_files} files per request"
            )));
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        if let Some(content_type) = field.content_type() {
            if !content_type.starts_with("image/") {
                return Err(AppError::BadRequest("Only image files are accepted".into()));
            }
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if bytes.is_empty() {
            continue;
        }

        let uploaded = client
            .upload(bytes.to_vec(), filename)
            .await
            .map_err(AppError::Internal)?;
        images.push(uploaded);
    }
    Ok(images)
}

#[utoipa::path(
    delete,
    path = "/api/upload/image/{public_id}",
    params(
        ("public_id" = String, Path, description = "CDN public id, or a full delivery URL")
    ),
    responses(
        (status = 200, description = "Image removed from the CDN"),
        (status = 400, description = "Value does not look like a CDN image reference"),
    ),
    tag = "Upload"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    user: AuthUser,
    Path(public_id): Path<String>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    ensure_admin(&user)?;
    let client = image_client(&state)?;

    // Clients may pass the stored delivery URL instead of the bare id.
    let public_id = if public_id.starts_with("http://") || public_id.starts_with("https://") {
        extract_public_id(&public_id)
            .ok_or_else(|| AppError::BadRequest("Could not extract image id from URL".into()))?
    } else {
        public_id
    };
    if public_id.trim().is_empty() {
        return Err(AppError::BadRequest("Image id is required".into()));
    }

    client
        .delete(&public_id)
        .await
        .map_err(AppError::Internal)?;

    Ok(Json(ApiResponse::success(
        "Image deleted",
        serde_json::json!({ "public_id": public_id }),
        Some(Meta::empty()),
    )))
}
