//! Attachment groups: uploads land in `<upload_dir>/<group>/<seq>_<name>`, metadata in
//! the `attachment` table. The stored `file_path` is relative to the upload root.

use std::io::ErrorKind;
use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use groupware_core::domain::attachment::{
    is_valid_group, resolve_group, sanitize_file_name, Attachment,
};
use groupware_db::repositories::attachment::NewAttachment;
use groupware_db::SqlAttachmentRepository;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{
    bad_request, failure, io_error, not_found, repository_error, ApiFailure, ApiResult,
    CreatedResult,
};
use crate::pdf::attachment_disposition;
use crate::state::AppState;

use super::Message;

/// Multipart text field carrying an existing group id.
const GROUP_FIELD: &str = "untyFileNo";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: &'static str,
    pub unty_file_no: String,
    pub files: Vec<Attachment>,
}

struct UploadedPart {
    file_name: String,
    bytes: Vec<u8>,
}

fn repo(state: &AppState) -> SqlAttachmentRepository {
    SqlAttachmentRepository::new(state.db_pool.clone())
}

fn multipart_error(err: MultipartError) -> ApiFailure {
    failure(err.status(), err.body_text())
}

fn stored_path(upload_dir: &FsPath, relative: &str) -> PathBuf {
    upload_dir.join(relative)
}

pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> CreatedResult<UploadResponse> {
    let mut requested_group = None;
    let mut parts = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        match field.file_name().map(str::to_string) {
            Some(raw_name) => {
                let file_name = sanitize_file_name(&raw_name)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| bad_request("Invalid file name"))?;
                let bytes = field.bytes().await.map_err(multipart_error)?;
                parts.push(UploadedPart { file_name, bytes: bytes.to_vec() });
            }
            None if field.name() == Some(GROUP_FIELD) => {
                requested_group = Some(field.text().await.map_err(multipart_error)?);
            }
            None => {}
        }
    }

    if parts.is_empty() {
        return Err(bad_request("no files were uploaded"));
    }
    let group = resolve_group(requested_group.as_deref());
    if !is_valid_group(&group) {
        return Err(bad_request(format!("invalid attachment group `{group}`")));
    }

    let group_dir = state.upload_dir.join(&group);
    tokio::fs::create_dir_all(&group_dir).await.map_err(io_error)?;

    let repo = repo(&state);
    let mut seq = repo.next_seq(&group).await.map_err(repository_error)?;
    let mut files = Vec::with_capacity(parts.len());
    for part in parts {
        let relative = format!("{group}/{seq}_{}", part.file_name);
        tokio::fs::write(stored_path(&state.upload_dir, &relative), &part.bytes)
            .await
            .map_err(io_error)?;
        let attachment = repo
            .add(
                NewAttachment {
                    unty_file_no: group.clone(),
                    file_name: part.file_name,
                    file_path: relative,
                    size_bytes: part.bytes.len() as i64,
                },
                seq,
            )
            .await
            .map_err(repository_error)?;
        files.push(attachment);
        seq += 1;
    }

    info!(event_name = "files.uploaded", unty_file_no = %group, count = files.len(), "files uploaded");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse { message: "files uploaded", unty_file_no: group, files }),
    ))
}

pub async fn list_group(
    State(state): State<AppState>,
    Path(group): Path<String>,
) -> ApiResult<Vec<Attachment>> {
    if !is_valid_group(&group) {
        return Err(bad_request(format!("invalid attachment group `{group}`")));
    }
    repo(&state).list_group(&group).await.map(Json).map_err(repository_error)
}

pub async fn download(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiFailure> {
    let attachment = repo(&state)
        .get(id)
        .await
        .map_err(repository_error)?
        .ok_or_else(|| not_found(format!("file {id} not found")))?;

    let bytes = match tokio::fs::read(stored_path(&state.upload_dir, &attachment.file_path)).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            warn!(
                event_name = "files.missing_on_disk",
                file_id = id,
                file_path = %attachment.file_path,
                "attachment row has no stored file"
            );
            return Err(not_found(format!("file {id} is missing from storage")));
        }
        Err(err) => return Err(io_error(err)),
    };

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/octet-stream")),
            (header::CONTENT_DISPOSITION, attachment_disposition(&attachment.file_name)),
        ],
        bytes,
    )
        .into_response())
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Message> {
    let removed = repo(&state).delete(id).await.map_err(repository_error)?;
    match tokio::fs::remove_file(stored_path(&state.upload_dir, &removed.file_path)).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(io_error(err)),
    }
    info!(
        event_name = "files.deleted",
        file_id = id,
        unty_file_no = %removed.unty_file_no,
        "file deleted"
    );
    Ok(Json(Message::new("file deleted")))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use tower::ServiceExt;

    use crate::api::router;
    use crate::state::test_support;

    const BOUNDARY: &str = "groupware-test-boundary";

    fn multipart_body(group: Option<&str>, files: &[(&str, &str)]) -> String {
        let mut body = String::new();
        if let Some(group) = group {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"untyFileNo\"\r\n\r\n{group}\r\n"
            ));
        }
        for (name, content) in files {
            body.push_str(&format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n{content}\r\n"
            ));
        }
        body.push_str(&format!("--{BOUNDARY}--\r\n"));
        body
    }

    fn upload_request(auth: &str, body: String) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(header::AUTHORIZATION, auth)
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(body))
            .expect("request")
    }

    fn get_request(auth: &str, uri: &str, method: Method) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, auth)
            .body(Body::empty())
            .expect("request")
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn upload_list_download_delete() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let auth = test_support::bearer(&state, "sales01", false).await;
        let app = router(state);

        let uploaded = app
            .clone()
            .oneshot(upload_request(
                &auth,
                multipart_body(None, &[("견적 요청서.txt", "hello"), ("spec.pdf", "%PDF")]),
            ))
            .await
            .expect("response");
        assert_eq!(uploaded.status(), StatusCode::CREATED);
        let payload = json(uploaded).await;
        let group = payload["untyFileNo"].as_str().expect("group").to_string();
        assert_eq!(payload["files"][0]["fileName"], "견적_요청서.txt");
        assert_eq!(payload["files"][1]["fileSeq"], 2);
        assert!(payload["files"][0].get("filePath").is_none());
        assert!(dir.path().join(&group).join("1_견적_요청서.txt").exists());

        // A second upload into the same group continues the sequence.
        let again = app
            .clone()
            .oneshot(upload_request(&auth, multipart_body(Some(&group), &[("notes.txt", "more")])))
            .await
            .expect("response");
        assert_eq!(json(again).await["files"][0]["fileSeq"], 3);

        let listed = app
            .clone()
            .oneshot(get_request(&auth, &format!("/files/{group}"), Method::GET))
            .await
            .expect("response");
        let listed = json(listed).await;
        assert_eq!(listed.as_array().map(Vec::len), Some(3));
        let file_id = listed[0]["fileId"].as_i64().expect("file id");

        let downloaded = app
            .clone()
            .oneshot(get_request(&auth, &format!("/download/file/{file_id}"), Method::GET))
            .await
            .expect("response");
        assert_eq!(downloaded.status(), StatusCode::OK);
        let disposition = downloaded
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .expect("disposition")
            .to_string();
        assert!(disposition.contains("filename*=UTF-8''"));
        let bytes = axum::body::to_bytes(downloaded.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&bytes[..], b"hello");

        let deleted = app
            .clone()
            .oneshot(get_request(&auth, &format!("/files/{file_id}"), Method::DELETE))
            .await
            .expect("response");
        assert_eq!(deleted.status(), StatusCode::OK);
        assert!(!dir.path().join(&group).join("1_견적_요청서.txt").exists());

        let gone = app
            .oneshot(get_request(&auth, &format!("/download/file/{file_id}"), Method::GET))
            .await
            .expect("response");
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn traversal_group_and_empty_upload_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = test_support::state(dir.path()).await;
        let auth = test_support::bearer(&state, "sales01", false).await;
        let app = router(state);

        let traversal = app
            .clone()
            .oneshot(upload_request(&auth, multipart_body(Some("../etc"), &[("a.txt", "x")])))
            .await
            .expect("response");
        assert_eq!(traversal.status(), StatusCode::BAD_REQUEST);

        let empty = app
            .clone()
            .oneshot(upload_request(&auth, multipart_body(Some("group-1"), &[])))
            .await
            .expect("response");
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let dots = app
            .oneshot(upload_request(&auth, multipart_body(None, &[("..", "x")])))
            .await
            .expect("response");
        assert_eq!(dots.status(), StatusCode::BAD_REQUEST);
    }
}
