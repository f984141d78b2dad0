use super::types::Resource;
use crate::common::errors::PipelineError;

/// Fetches one HLS resource (segment or init map), honoring its byte range
/// when present (§4.9/§4.10).
pub async fn fetch_segment_into(
    client: &reqwest::Client,
    resource: &Resource,
    out: &mut Vec<u8>,
) -> Result<(), PipelineError> {
    let mut req = client.get(&resource.url).header("Accept", "*/*");

    if let Some(range) = &resource.range {
        let end = range.offset + range.length - 1;
        req = req.header("Range", format!("bytes={}-{}", range.offset, end));
    }

    let res = req
        .send()
        .await
        .map_err(|e| PipelineError::network(format!("HLS segment request failed: {e}")))?;

    if !res.status().is_success() {
        return Err(PipelineError::network(format!(
            "HLS segment fetch failed {}: {}",
            res.status(),
            resource.url
        )));
    }

    let bytes = res
        .bytes()
        .await
        .map_err(|e| PipelineError::network(format!("HLS segment body read failed: {e}")))?;
    out.extend_from_slice(&bytes);
    Ok(())
}
