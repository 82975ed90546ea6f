//! Durable per-job store
//!
//! Each job owns a directory under the store root:
//!
//! ```text
//! {root}/{jobId}/
//!   request.json    immutable admission record
//!   state.json      observable lifecycle record
//!   input.png|jpg   optional attached image
//!   result.html     generated slide
//!   preview.png     rendered preview
//! ```
//!
//! State mutations are serialized per job through a lazily-populated mutex
//! registry; the store is lock-free across jobs. Artifacts are written
//! before the state records their paths, so a reader that observes a path
//! always finds the file.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use slated_core::{Aspect, JobInput, JobState, Result, SlatedError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tracing::debug;

const REQUEST_FILE: &str = "request.json";
const STATE_FILE: &str = "state.json";
const RESULT_HTML_FILE: &str = "result.html";
const PREVIEW_PNG_FILE: &str = "preview.png";

const PNG_MAGIC: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_MAGIC: [u8; 3] = [0xFF, 0xD8, 0xFF];

/// Immutable request record as persisted; the attached image lives in a
/// sibling file and is reconstructed on read.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRequest {
    job_id: String,
    prompt: String,
    aspect: Aspect,
}

/// Filesystem-backed job store
pub struct JobStore {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl JobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn job_dir(&self, job_id: &str) -> PathBuf {
        self.root.join(job_id)
    }

    /// Per-job mutex, allocated on first use. Entries are never removed;
    /// the registry is bounded by the jobs seen in this process.
    fn job_lock(&self, job_id: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry poisoned");
        locks
            .entry(job_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Persist a new job: request record, optional image bytes, initial state
    pub async fn create(&self, input: &JobInput) -> Result<()> {
        let dir = self.job_dir(&input.job_id);
        fs::create_dir_all(&dir).await?;

        let request = StoredRequest {
            job_id: input.job_id.clone(),
            prompt: input.prompt.clone(),
            aspect: input.aspect,
        };
        write_atomic(&dir.join(REQUEST_FILE), &serde_json::to_vec_pretty(&request)?).await?;

        if let Some(data_url) = &input.image_data_url {
            let (extension, bytes) = decode_image_data_url(data_url)?;
            write_atomic(&dir.join(format!("input.{}", extension)), &bytes).await?;
        }

        let state = JobState::queued();
        write_atomic(&dir.join(STATE_FILE), &serde_json::to_vec_pretty(&state)?).await?;

        debug!("Created job {} at {}", input.job_id, dir.display());
        Ok(())
    }

    /// Current state, or `None` for an unknown job
    pub async fn get(&self, job_id: &str) -> Result<Option<JobState>> {
        match fs::read(self.job_dir(job_id).join(STATE_FILE)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Reconstruct the admission record, including the image data-URL
    pub async fn get_input(&self, job_id: &str) -> Result<Option<JobInput>> {
        let dir = self.job_dir(job_id);
        let request: StoredRequest = match fs::read(dir.join(REQUEST_FILE)).await {
            Ok(data) => serde_json::from_slice(&data)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut image_data_url = None;
        for name in ["input.png", "input.jpg"] {
            if let Ok(bytes) = fs::read(dir.join(name)).await {
                if let Some(mime) = sniff_image_mime(&bytes) {
                    image_data_url = Some(format!("data:{};base64,{}", mime, BASE64.encode(&bytes)));
                }
                break;
            }
        }

        Ok(Some(JobInput {
            job_id: request.job_id,
            prompt: request.prompt,
            aspect: request.aspect,
            image_data_url,
        }))
    }

    /// Apply a mutation to the state under the per-job lock.
    ///
    /// Reads the current state, applies the mutator, refreshes `updatedAt`
    /// and rewrites the record. Returns the state as written.
    pub async fn update<F>(&self, job_id: &str, mutator: F) -> Result<JobState>
    where
        F: FnOnce(&mut JobState),
    {
        let lock = self.job_lock(job_id);
        let _guard = lock.lock().await;

        let path = self.job_dir(job_id).join(STATE_FILE);
        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SlatedError::NotFound(format!("job {}", job_id)));
            }
            Err(e) => return Err(e.into()),
        };

        let mut state: JobState = serde_json::from_slice(&data)?;
        mutator(&mut state);
        state.updated_at = Utc::now();

        write_atomic(&path, &serde_json::to_vec_pretty(&state)?).await?;
        Ok(state)
    }

    /// Persist the generated HTML, then record its path in the state
    pub async fn save_html(&self, job_id: &str, html: &str) -> Result<PathBuf> {
        let path = self.job_dir(job_id).join(RESULT_HTML_FILE);
        write_atomic(&path, html.as_bytes()).await?;

        let recorded = path.clone();
        self.update(job_id, move |state| {
            state.result_html_path = Some(recorded);
        })
        .await?;
        Ok(path)
    }

    /// Persist the rendered preview, then record its path in the state
    pub async fn save_preview_png(&self, job_id: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.job_dir(job_id).join(PREVIEW_PNG_FILE);
        write_atomic(&path, bytes).await?;

        let recorded = path.clone();
        self.update(job_id, move |state| {
            state.preview_png_path = Some(recorded);
        })
        .await?;
        Ok(path)
    }
}

/// Write via a temp file in the same directory, then rename into place
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| SlatedError::Other(format!("bad artifact path: {}", path.display())))?;
    let tmp = path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&tmp, bytes).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

/// Identify PNG/JPEG payloads by signature
pub fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&PNG_MAGIC) {
        Some("image/png")
    } else if bytes.starts_with(&JPEG_MAGIC) {
        Some("image/jpeg")
    } else {
        None
    }
}

/// Decode a normalized image data-URL into (file extension, bytes)
fn decode_image_data_url(data_url: &str) -> Result<(&'static str, Vec<u8>)> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| SlatedError::Validation("image is not a data URL".to_string()))?;
    let (mime, payload) = rest
        .split_once(";base64,")
        .ok_or_else(|| SlatedError::Validation("image data URL is not base64".to_string()))?;

    let extension = match mime {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        other => {
            return Err(SlatedError::Validation(format!(
                "unsupported image type: {}",
                other
            )))
        }
    };

    let bytes = BASE64
        .decode(payload)
        .map_err(|e| SlatedError::Validation(format!("invalid base64 image: {}", e)))?;
    Ok((extension, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slated_core::{JobStatus, PipelineStep};

    fn png_data_url() -> String {
        let mut bytes = PNG_MAGIC.to_vec();
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        format!("data:image/png;base64,{}", BASE64.encode(&bytes))
    }

    fn input(job_id: &str, image: Option<String>) -> JobInput {
        JobInput {
            job_id: job_id.to_string(),
            prompt: "Make a slide about rust".to_string(),
            aspect: Aspect::Widescreen,
            image_data_url: image,
        }
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());

        store.create(&input("job-1", None)).await.unwrap();

        let state = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(state.status, JobStatus::Queued);
        assert!(state.step.is_none());

        assert!(store.get("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_image_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());

        let data_url = png_data_url();
        store
            .create(&input("job-img", Some(data_url.clone())))
            .await
            .unwrap();

        // Bytes land on disk with the extension chosen from the MIME type
        assert!(dir.path().join("job-img/input.png").exists());

        // The data-URL is reconstructed from bytes via magic sniffing
        let restored = store.get_input("job-img").await.unwrap().unwrap();
        assert_eq!(restored.image_data_url, Some(data_url));
        assert_eq!(restored.prompt, "Make a slide about rust");
    }

    #[tokio::test]
    async fn test_get_input_without_image() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        store.create(&input("job-2", None)).await.unwrap();

        let restored = store.get_input("job-2").await.unwrap().unwrap();
        assert!(restored.image_data_url.is_none());
        assert!(store.get_input("unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_unknown_job() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        let result = store.update("nope", |_| {}).await;
        assert!(matches!(result, Err(SlatedError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_is_idempotent_modulo_updated_at() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        store.create(&input("job-3", None)).await.unwrap();

        let strip_updated_at = |state: &JobState| {
            let mut value = serde_json::to_value(state).unwrap();
            value.as_object_mut().unwrap().remove("updatedAt");
            value
        };

        let first = store.update("job-3", |_| {}).await.unwrap();
        let second = store.update("job-3", |_| {}).await.unwrap();
        assert_eq!(strip_updated_at(&first), strip_updated_at(&second));
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JobStore::new(dir.path()));
        store.create(&input("job-4", None)).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .update("job-4", move |state| {
                        state.sources.add_url(&format!("https://example.com/{}", i));
                    })
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Every mutation survived: no lost updates
        let state = store.get("job-4").await.unwrap().unwrap();
        assert_eq!(state.sources.urls.len(), 50);
    }

    #[tokio::test]
    async fn test_artifacts_exist_before_state_records_them() {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::new(dir.path());
        store.create(&input("job-5", None)).await.unwrap();

        let html_path = store
            .save_html("job-5", "<html><body></body></html>")
            .await
            .unwrap();
        let png_path = store.save_preview_png("job-5", b"png-bytes").await.unwrap();

        let state = store.get("job-5").await.unwrap().unwrap();
        let recorded_html = state.result_html_path.unwrap();
        let recorded_png = state.preview_png_path.unwrap();
        assert_eq!(recorded_html, html_path);
        assert_eq!(recorded_png, png_path);
        assert!(recorded_html.exists());
        assert!(recorded_png.exists());

        store
            .update("job-5", |state| {
                state.advance_status(JobStatus::Running);
                state.step = Some(PipelineStep::Plan);
            })
            .await
            .unwrap();
        let state = store.get("job-5").await.unwrap().unwrap();
        assert_eq!(state.step, Some(PipelineStep::Plan));
    }

    #[test]
    fn test_sniff_image_mime() {
        assert_eq!(sniff_image_mime(&PNG_MAGIC), Some("image/png"));
        assert_eq!(sniff_image_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("image/jpeg"));
        assert_eq!(sniff_image_mime(b"GIF89a"), None);
        assert_eq!(sniff_image_mime(&[]), None);
    }

    #[test]
    fn test_decode_image_data_url() {
        let (ext, bytes) = decode_image_data_url(&png_data_url()).unwrap();
        assert_eq!(ext, "png");
        assert!(bytes.starts_with(&PNG_MAGIC));

        assert!(decode_image_data_url("data:image/gif;base64,AAAA").is_err());
        assert!(decode_image_data_url("not a data url").is_err());
        assert!(decode_image_data_url("data:image/png;base64,!!!").is_err());
    }
}
