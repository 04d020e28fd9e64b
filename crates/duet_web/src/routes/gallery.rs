use super::parse_id;
use crate::error::AppError;
use crate::pages::{self, Notice};
use crate::session::CoupleScope;
use crate::state::AppState;
use axum::body::Bytes;
use axum::extract::{Multipart, Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{Html, IntoResponse, Response};
use axum::Extension;
use duet_core::{GalleryService, GalleryServiceError, SqliteGalleryRepository};
use log::warn;
use std::sync::Arc;

/// Upload limit for one gallery POST, enforced by the router.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Default)]
struct GalleryForm {
    action: Option<String>,
    file_name: Option<String>,
    file: Option<Bytes>,
    note: Option<String>,
    image_id: Option<String>,
}

impl GalleryForm {
    async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = Self::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|err| AppError::MalformedPayload(err.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "file" => {
                    form.file_name = field.file_name().map(str::to_string);
                    form.file = Some(
                        field
                            .bytes()
                            .await
                            .map_err(|err| AppError::MalformedPayload(err.to_string()))?,
                    );
                }
                "action" | "note" | "image_id" => {
                    let value = field
                        .text()
                        .await
                        .map_err(|err| AppError::MalformedPayload(err.to_string()))?;
                    match name.as_str() {
                        "action" => form.action = Some(value),
                        "note" => form.note = Some(value),
                        _ => form.image_id = Some(value),
                    }
                }
                _ => {}
            }
        }
        Ok(form)
    }
}

pub async fn show(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
) -> Result<Html<String>, AppError> {
    render(&state, &scope, None)
}

pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let form = GalleryForm::read(multipart).await?;

    let notice = match form.action.as_deref() {
        Some("upload") => upload(&state, &scope, form)?,
        Some("delete") => {
            let item_id = parse_id(form.image_id.as_deref(), "image_id")?;
            state.with_conn(|conn| {
                let gallery =
                    GalleryService::new(SqliteGalleryRepository::try_new(conn)?, &state.files);
                gallery.delete(scope.couple_id, item_id)?;
                Ok(Notice::info("Photo deleted."))
            })?
        }
        _ => return Err(AppError::MalformedPayload("unknown gallery action".to_string())),
    };

    render(&state, &scope, Some(&notice))
}

fn upload(state: &AppState, scope: &CoupleScope, form: GalleryForm) -> Result<Notice, AppError> {
    let (Some(file_name), Some(bytes)) = (form.file_name, form.file) else {
        return Ok(Notice::error("Please choose a photo to upload."));
    };
    let note = form.note.unwrap_or_default();

    state.with_conn(|conn| {
        let gallery = GalleryService::new(SqliteGalleryRepository::try_new(conn)?, &state.files);
        match gallery.upload(scope.couple_id, &file_name, &bytes, note.trim()) {
            Ok(_) => Ok(Notice::info("Photo uploaded.")),
            Err(err @ (GalleryServiceError::Validation(_) | GalleryServiceError::Capacity { .. })) => {
                warn!(
                    "event=gallery_upload module=gallery status=rejected couple_id={} reason={}",
                    scope.couple_id, err
                );
                Ok(Notice::error(err.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    })
}

fn render(
    state: &AppState,
    scope: &CoupleScope,
    notice: Option<&Notice>,
) -> Result<Html<String>, AppError> {
    let items = state.with_conn(|conn| {
        let gallery = GalleryService::new(SqliteGalleryRepository::try_new(conn)?, &state.files);
        Ok(gallery.list(scope.couple_id)?)
    })?;
    Ok(pages::gallery(&items, notice))
}

/// Serves a stored photo, only to members of the couple that owns it.
pub async fn serve_upload(
    State(state): State<Arc<AppState>>,
    Extension(scope): Extension<CoupleScope>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    let path = state.with_conn(|conn| {
        let gallery = GalleryService::new(SqliteGalleryRepository::try_new(conn)?, &state.files);
        if !gallery.owns_file(scope.couple_id, &name)? {
            return Err(AppError::NotFound);
        }
        state.files.path_of(&name).map_err(|_| AppError::NotFound)
    })?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Err(AppError::NotFound),
        Err(err) => return Err(AppError::Internal(err.to_string())),
    };

    Ok((
        [
            (CONTENT_TYPE, content_type_for(&name)),
            (CACHE_CONTROL, "private, max-age=3600"),
        ],
        bytes,
    )
        .into_response())
}

fn content_type_for(name: &str) -> &'static str {
    let extension = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::content_type_for;

    #[test]
    fn content_type_follows_extension() {
        assert_eq!(content_type_for("a1b2_photo.PNG"), "image/png");
        assert_eq!(content_type_for("x.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("x.gif"), "image/gif");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
