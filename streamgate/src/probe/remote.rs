//! Remote probe backend: a gRPC client generated from `proto/probe.proto`.

use std::time::Duration;

use tonic::Request;
use tonic::transport::Channel;

use crate::{Error, Result};

use super::{Format, ProbeResult, Stream};

pub mod proto {
    tonic::include_proto!("streamgate.probe");
}

use proto::ProbeRequest;
use proto::probe_client::ProbeClient;

/// Call the configured remote probe service for `url`, converting its reply
/// into a [`ProbeResult`].
pub async fn probe(host: &str, port: u16, url: &str, timeout: Duration) -> Result<ProbeResult> {
    let endpoint = format!("http://{host}:{port}");

    let channel = Channel::from_shared(endpoint.clone())
        .map_err(|e| Error::ProbeUnavailable(format!("invalid probe endpoint {endpoint}: {e}")))?
        .connect_timeout(timeout)
        .timeout(timeout)
        .connect()
        .await
        .map_err(|e| Error::ProbeUnavailable(format!("failed to connect to {endpoint}: {e}")))?;

    let mut client = ProbeClient::new(channel);

    let request = Request::new(ProbeRequest { url: url.to_string() });

    let reply = client
        .probe(request)
        .await
        .map_err(|status| Error::ProbeUnavailable(format!("probe RPC failed: {status}")))?
        .into_inner();

    let format = reply.format.map(|f| Format { duration: f.duration }).unwrap_or_default();

    let streams = reply
        .streams
        .into_iter()
        .map(|s| Stream {
            index: s.index,
            codec_type: s.codec_type,
            codec_name: s.codec_name,
            height: s.height,
            channels: s.channels,
            tags: s.tags,
        })
        .collect();

    Ok(ProbeResult { format, streams })
}
