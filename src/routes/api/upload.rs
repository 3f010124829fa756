use std::path::Path;

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::tokio::io::AsyncReadExt;
use rocket::{Route, State};
use serde_json::json;

use crate::db::DbPool;
use crate::error::{ok, ApiError, ApiResult};
use crate::images::{sniff_upload, stored_filename, UploadRejection};
use crate::models::settings::SiteConfig;
use crate::security::auth::AdminUser;

#[derive(FromForm)]
pub struct UploadForm<'r> {
    pub file: TempFile<'r>,
}

async fn read_all(file: &TempFile<'_>) -> std::io::Result<Vec<u8>> {
    let reader = file.open().await?;
    rocket::tokio::pin!(reader);
    let mut bytes = Vec::with_capacity(file.len() as usize);
    reader.read_to_end(&mut bytes).await?;
    Ok(bytes)
}

#[post("/upload", data = "<form>")]
pub async fn upload(
    pool: &State<DbPool>,
    admin: AdminUser,
    form: Form<UploadForm<'_>>,
) -> ApiResult {
    if !admin.capability.can_upload() {
        return Err(ApiError::forbidden());
    }
    let config = SiteConfig::load(pool);
    let file = &form.file;

    if file.len() > config.uploads_max_bytes {
        return Err(ApiError::field(
            "file",
            UploadRejection::TooLarge {
                max_bytes: config.uploads_max_bytes,
            }
            .to_string(),
        ));
    }

    let original_name = file
        .raw_name()
        .map(|n| n.dangerous_unsafe_unsanitized_raw().as_str().to_string())
        .unwrap_or_default();

    let bytes = read_all(file)
        .await
        .map_err(|e| ApiError::Internal(format!("reading upload: {}", e)))?;
    let kind = sniff_upload(&original_name, &bytes, config.uploads_max_bytes).map_err(|rejection| {
        log::warn!(
            "Upload '{}' from {} rejected: {}",
            original_name,
            admin.user.username,
            rejection
        );
        ApiError::field("file", rejection.to_string())
    })?;

    let filename = stored_filename(kind);
    let dir = Path::new(&config.uploads_dir);
    rocket::tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| ApiError::Internal(format!("creating {}: {}", dir.display(), e)))?;
    rocket::tokio::fs::write(dir.join(&filename), &bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("writing {}: {}", filename, e)))?;

    log::info!(
        "Stored upload {} ({} bytes) for {}",
        filename,
        bytes.len(),
        admin.user.username
    );
    ok(
        "File uploaded",
        json!({
            "url": format!("/uploads/{}", filename),
            "filename": filename,
            "size": bytes.len(),
            "type": kind.mime(),
        }),
    )
}

pub fn routes() -> Vec<Route> {
    routes![upload]
}
