use serde::Serialize;
use utoipa::ToSchema;

use crate::images::UploadedImage;

#[derive(Debug, Serialize, ToSchema)]
pub struct UploadedImageList {
    pub images: Vec<UploadedImage>,
}
