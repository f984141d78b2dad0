//! Direct extractor (§4.2). Matches any http(s) URL not claimed by a more
//! specific extractor; resolves to a single progressive format backed by
//! the URL itself, deriving size/container from response headers. Grounded
//! in the teacher's minimal `HttpSource`/`HttpClient` shape, stripped of the
//! symphonia probing that source used for in-process decode.

use async_trait::async_trait;

use crate::common::errors::PipelineError;
use crate::common::http::Transport;
use crate::common::types::CancelToken;
use crate::format::descriptor::{FormatDescriptor, FormatKind, VideoDescriptor};
use crate::normalizer::{Normalized, NormalizedTarget};

use super::plugin::Extractor;

pub struct DirectExtractor;

#[async_trait]
impl Extractor for DirectExtractor {
    fn name(&self) -> &str {
        "direct"
    }

    fn matches(&self, target: &Normalized) -> bool {
        matches!(target.target, NormalizedTarget::Url(_))
    }

    async fn resolve_video(
        &self,
        target: &Normalized,
        transport: &Transport,
        cancel: &CancelToken,
    ) -> Result<VideoDescriptor, PipelineError> {
        let NormalizedTarget::Url(url) = &target.target else {
            return Err(PipelineError::invalid_url("direct extractor requires a URL"));
        };

        cancel.check().map_err(|_| PipelineError::interrupted("cancelled"))?;

        let res = transport
            .client()
            .head(url)
            .send()
            .await
            .map_err(|e| PipelineError::network(format!("HEAD request failed: {e}")))?;

        let content_length = res.content_length();
        let content_type = res
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let container = content_type
            .as_deref()
            .and_then(|ct| ct.split('/').nth(1))
            .map(|s| s.split(';').next().unwrap_or(s).to_string())
            .unwrap_or_else(|| "bin".to_string());

        let title = url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download")
            .to_string();

        let format = FormatDescriptor {
            itag: None,
            kind: FormatKind::Progressive,
            container,
            url: Some(url.clone()),
            manifest_url: None,
            bitrate: None,
            width: None,
            height: None,
            fps: None,
            audio_codec: None,
            video_codec: None,
            filesize: content_length,
        };

        Ok(VideoDescriptor {
            id: title.clone(),
            title,
            uploader: None,
            duration_secs: None,
            publish_date: None,
            description: None,
            thumbnail_url: None,
            formats: vec![format],
            music: None,
            source_url: url.clone(),
        })
    }
}
