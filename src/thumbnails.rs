//! Thumbnail regeneration for downloaded images.
//!
//! Resizing itself is delegated to an [`ImagePipeline`]. This module only
//! decides which attachments qualify, enforces the time budget, and
//! classifies what the pipeline returned.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::RunConfig;
use crate::store::{AttachmentMetadata, AttachmentRecord};

/// Failure reported by an image pipeline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct PipelineError(pub String);

/// Generates the derived image sizes of an attachment.
#[async_trait]
pub trait ImagePipeline: Send + Sync {
    /// Returns the new image-size metadata. An empty map means the pipeline
    /// produced nothing.
    async fn generate_sizes(
        &self,
        id: u64,
        local_path: &Path,
    ) -> Result<AttachmentMetadata, PipelineError>;
}

#[async_trait]
impl<P: ImagePipeline + ?Sized> ImagePipeline for Box<P> {
    async fn generate_sizes(
        &self,
        id: u64,
        local_path: &Path,
    ) -> Result<AttachmentMetadata, PipelineError> {
        (**self).generate_sizes(id, local_path).await
    }
}

/// What happened to one attachment's thumbnails.
#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailOutcome {
    /// Not eligible, or generation disabled.
    Skipped,
    /// New metadata to store.
    Generated(AttachmentMetadata),
    /// The pipeline failed or ran out of time.
    Error(String),
    /// The pipeline succeeded but returned no metadata.
    EmptyResult,
}

/// Thumbnails run only for image attachments when generation is enabled.
#[must_use]
pub fn is_eligible(record: &AttachmentRecord, config: &RunConfig) -> bool {
    config.generate_thumbnails && record.is_attachment() && record.is_image()
}

/// Runs the pipeline for an eligible record within the thumbnail budget.
pub async fn maybe_generate<P: ImagePipeline + ?Sized>(
    pipeline: &P,
    record: &AttachmentRecord,
    local_path: &Path,
    config: &RunConfig,
) -> ThumbnailOutcome {
    if !is_eligible(record, config) {
        return ThumbnailOutcome::Skipped;
    }

    let budget = config.timeouts.thumbnail;
    log::debug!("generating thumbnails for attachment {}", record.id);
    match tokio::time::timeout(budget, pipeline.generate_sizes(record.id, local_path)).await {
        Err(_) => ThumbnailOutcome::Error(format!(
            "gave up after {} seconds",
            budget.as_secs()
        )),
        Ok(Err(e)) => ThumbnailOutcome::Error(e.to_string()),
        Ok(Ok(metadata)) if metadata.is_empty() => ThumbnailOutcome::EmptyResult,
        Ok(Ok(metadata)) => ThumbnailOutcome::Generated(metadata),
    }
}

/// Pipeline used when no thumbnail command is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImagePipeline;

#[async_trait]
impl ImagePipeline for NoImagePipeline {
    async fn generate_sizes(
        &self,
        _id: u64,
        _local_path: &Path,
    ) -> Result<AttachmentMetadata, PipelineError> {
        Err(PipelineError(
            "no thumbnail_command configured in [site]".to_string(),
        ))
    }
}

/// Pipeline that shells out to an external program.
///
/// The program is called as `<program> <args...> <id> <path>` and must print
/// the image-size metadata as a JSON object on stdout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandImagePipeline {
    program: String,
    args: Vec<String>,
}

impl CommandImagePipeline {
    /// Builds a pipeline from a command line. Returns `None` if it is empty.
    #[must_use]
    pub fn from_command(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl ImagePipeline for CommandImagePipeline {
    async fn generate_sizes(
        &self,
        id: u64,
        local_path: &Path,
    ) -> Result<AttachmentMetadata, PipelineError> {
        let output = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(id.to_string())
            .arg(local_path)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| PipelineError(format!("could not run {}: {e}", self.program)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(PipelineError(if stderr.is_empty() {
                format!("{} exited with {}", self.program, output.status)
            } else {
                stderr.to_string()
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.trim().is_empty() {
            return Ok(AttachmentMetadata::new());
        }
        match serde_json::from_str::<Value>(stdout.trim()) {
            Ok(Value::Object(metadata)) => Ok(metadata),
            Ok(Value::Null) => Ok(AttachmentMetadata::new()),
            Ok(other) => Err(PipelineError(format!(
                "expected a JSON object from {}, got {other}",
                self.program
            ))),
            Err(e) => Err(PipelineError(format!(
                "invalid JSON from {}: {e}",
                self.program
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Timeouts;
    use crate::store::RecordKind;
    use std::time::Duration;

    struct FixedPipeline(Result<AttachmentMetadata, PipelineError>);

    #[async_trait]
    impl ImagePipeline for FixedPipeline {
        async fn generate_sizes(
            &self,
            _id: u64,
            _local_path: &Path,
        ) -> Result<AttachmentMetadata, PipelineError> {
            self.0.clone()
        }
    }

    struct SlowPipeline;

    #[async_trait]
    impl ImagePipeline for SlowPipeline {
        async fn generate_sizes(
            &self,
            _id: u64,
            _local_path: &Path,
        ) -> Result<AttachmentMetadata, PipelineError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(AttachmentMetadata::new())
        }
    }

    fn config(generate: bool) -> RunConfig {
        RunConfig::new("https://old.example.com/uploads/")
            .unwrap()
            .with_generate_thumbnails(generate)
    }

    fn image() -> AttachmentRecord {
        AttachmentRecord::new(3, "a.jpg", "", "image/jpeg")
    }

    fn sizes() -> AttachmentMetadata {
        let mut m = AttachmentMetadata::new();
        m.insert("width".into(), Value::from(1024));
        m
    }

    #[test]
    fn eligibility() {
        assert!(is_eligible(&image(), &config(true)));
        assert!(!is_eligible(&image(), &config(false)));
        let pdf = AttachmentRecord::new(3, "a.pdf", "", "application/pdf");
        assert!(!is_eligible(&pdf, &config(true)));
        let page = image().with_kind(RecordKind::Other("page".into()));
        assert!(!is_eligible(&page, &config(true)));
    }

    #[tokio::test]
    async fn classifies_pipeline_results() {
        let path = Path::new("/up/a.jpg");
        let cfg = config(true);

        let generated = maybe_generate(&FixedPipeline(Ok(sizes())), &image(), path, &cfg).await;
        assert_eq!(generated, ThumbnailOutcome::Generated(sizes()));

        let empty = maybe_generate(
            &FixedPipeline(Ok(AttachmentMetadata::new())),
            &image(),
            path,
            &cfg,
        )
        .await;
        assert_eq!(empty, ThumbnailOutcome::EmptyResult);

        let failed = maybe_generate(
            &FixedPipeline(Err(PipelineError("corrupt JPEG".into()))),
            &image(),
            path,
            &cfg,
        )
        .await;
        assert_eq!(failed, ThumbnailOutcome::Error("corrupt JPEG".into()));
    }

    #[tokio::test]
    async fn ineligible_records_never_reach_the_pipeline() {
        let outcome = maybe_generate(&SlowPipeline, &image(), Path::new("/a.jpg"), &config(false)).await;
        assert_eq!(outcome, ThumbnailOutcome::Skipped);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_exceeded_is_an_error() {
        let cfg = config(true).with_timeouts(Timeouts {
            thumbnail: Duration::from_secs(2),
            ..Timeouts::default()
        });
        let outcome = maybe_generate(&SlowPipeline, &image(), Path::new("/a.jpg"), &cfg).await;
        assert_eq!(
            outcome,
            ThumbnailOutcome::Error("gave up after 2 seconds".into())
        );
    }

    #[tokio::test]
    async fn no_pipeline_reports_error() {
        let outcome = maybe_generate(&NoImagePipeline, &image(), Path::new("/a.jpg"), &config(true)).await;
        assert!(matches!(outcome, ThumbnailOutcome::Error(_)));
    }

    #[test]
    fn from_command_splits_program() {
        assert_eq!(CommandImagePipeline::from_command(&[]), None);
        let p = CommandImagePipeline::from_command(&["thumbs".into(), "-q".into()]).unwrap();
        assert_eq!(p.program, "thumbs");
        assert_eq!(p.args, vec!["-q".to_string()]);
    }

    #[cfg(unix)]
    mod command {
        use super::*;

        fn sh(script: &str) -> CommandImagePipeline {
            CommandImagePipeline::from_command(&[
                "sh".into(),
                "-c".into(),
                script.into(),
                "sh".into(),
            ])
            .unwrap()
        }

        #[tokio::test]
        async fn parses_json_object() {
            let p = sh(r#"printf '{"id": %s, "file": "%s"}' "$1" "$2""#);
            let meta = p.generate_sizes(12, Path::new("/up/a.jpg")).await.unwrap();
            assert_eq!(meta.get("id"), Some(&Value::from(12)));
            assert_eq!(meta.get("file"), Some(&Value::from("/up/a.jpg")));
        }

        #[tokio::test]
        async fn empty_stdout_is_empty_metadata() {
            let meta = sh("true").generate_sizes(1, Path::new("/a.jpg")).await.unwrap();
            assert!(meta.is_empty());
        }

        #[tokio::test]
        async fn failure_surfaces_stderr() {
            let err = sh("echo 'cannot decode' >&2; exit 3")
                .generate_sizes(1, Path::new("/a.jpg"))
                .await
                .unwrap_err();
            assert_eq!(err.0, "cannot decode");
        }

        #[tokio::test]
        async fn non_object_output_is_error() {
            let err = sh("echo '[1, 2]'")
                .generate_sizes(1, Path::new("/a.jpg"))
                .await
                .unwrap_err();
            assert!(err.0.contains("expected a JSON object"));
        }

        #[tokio::test]
        async fn missing_program_is_error() {
            let p = CommandImagePipeline::from_command(&["/nonexistent/thumbs".into()]).unwrap();
            let err = p.generate_sizes(1, Path::new("/a.jpg")).await.unwrap_err();
            assert!(err.0.starts_with("could not run /nonexistent/thumbs"));
        }
    }
}
