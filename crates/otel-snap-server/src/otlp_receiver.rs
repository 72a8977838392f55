//! OTLP gRPC ingest: trace, log, and metric export services backed by the
//! shared [`otel_snap_store::UnifiedStore`].
//!
//! Decoding OTLP wire records into our own record shapes already happens
//! inside `UnifiedStore::receive_*`; the service impls here are thin
//! adapters between tonic's generated trait and that store method.

use std::net::SocketAddr;

use opentelemetry_proto::tonic::collector::logs::v1::logs_service_server::{LogsService, LogsServiceServer};
use opentelemetry_proto::tonic::collector::logs::v1::{ExportLogsServiceRequest, ExportLogsServiceResponse};
use opentelemetry_proto::tonic::collector::metrics::v1::metrics_service_server::{
    MetricsService, MetricsServiceServer,
};
use opentelemetry_proto::tonic::collector::metrics::v1::{ExportMetricsServiceRequest, ExportMetricsServiceResponse};
use opentelemetry_proto::tonic::collector::trace::v1::trace_service_server::{TraceService, TraceServiceServer};
use opentelemetry_proto::tonic::collector::trace::v1::{ExportTraceServiceRequest, ExportTraceServiceResponse};
use otel_snap_core::{Error, Result};
use otel_snap_store::UnifiedStore;
use tonic::{Request, Response, Status, transport::Server};

struct GrpcTraceService {
    store: &'static UnifiedStore,
}

#[tonic::async_trait]
impl TraceService for GrpcTraceService {
    async fn export(
        &self,
        request: Request<ExportTraceServiceRequest>,
    ) -> std::result::Result<Response<ExportTraceServiceResponse>, Status> {
        let count = self.store.receive_spans(request.get_ref());
        tracing::debug!(spans = count, "ingested trace export");
        Ok(Response::new(ExportTraceServiceResponse { partial_success: None }))
    }
}

struct GrpcLogsService {
    store: &'static UnifiedStore,
}

#[tonic::async_trait]
impl LogsService for GrpcLogsService {
    async fn export(
        &self,
        request: Request<ExportLogsServiceRequest>,
    ) -> std::result::Result<Response<ExportLogsServiceResponse>, Status> {
        let count = self.store.receive_logs(request.get_ref());
        tracing::debug!(records = count, "ingested logs export");
        Ok(Response::new(ExportLogsServiceResponse { partial_success: None }))
    }
}

struct GrpcMetricsService {
    store: &'static UnifiedStore,
}

#[tonic::async_trait]
impl MetricsService for GrpcMetricsService {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> std::result::Result<Response<ExportMetricsServiceResponse>, Status> {
        let count = self.store.receive_metrics(request.get_ref());
        tracing::debug!(points = count, "ingested metrics export");
        Ok(Response::new(ExportMetricsServiceResponse { partial_success: None }))
    }
}

/// Bind a combined OTLP gRPC server (traces + logs + metrics on one port) and
/// serve until the process is asked to shut down.
///
/// Returns the bound address so the caller can report it back via
/// `get_otlp_endpoints` when the configured port was `0` (OS-assigned).
pub async fn serve_otlp(host: &str, port: u16, store: &'static UnifiedStore) -> Result<SocketAddr> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .map_err(|e| Error::Config(format!("invalid otlp bind address {host}:{port}: {e}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { transport: "otlp-grpc", addr: addr.to_string(), source })?;
    let bound_addr = listener.local_addr().map_err(|source| Error::Bind {
        transport: "otlp-grpc",
        addr: addr.to_string(),
        source,
    })?;
    let incoming = tokio_stream::wrappers::TcpListenerStream::new(listener);

    tracing::info!(%bound_addr, "otlp gRPC ingest listening");

    tokio::spawn(async move {
        let result = Server::builder()
            .add_service(TraceServiceServer::new(GrpcTraceService { store }))
            .add_service(LogsServiceServer::new(GrpcLogsService { store }))
            .add_service(MetricsServiceServer::new(GrpcMetricsService { store }))
            .serve_with_incoming(incoming)
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "otlp gRPC server exited with error");
        }
    });

    Ok(bound_addr)
}

#[cfg(test)]
mod tests {
    use opentelemetry_proto::tonic::trace::v1::status::StatusCode;

    use super::*;

    fn leak_store() -> &'static UnifiedStore {
        Box::leak(Box::new(UnifiedStore::new(8, 8, 8).unwrap()))
    }

    #[tokio::test]
    async fn trace_export_increments_store() {
        let store = leak_store();
        let svc = GrpcTraceService { store };
        let request = Request::new(otel_snap_test_helpers::trace_export_request(
            "svc",
            otel_snap_test_helpers::otlp_span(vec![1], vec![2], Vec::new(), "op", 0, 1, StatusCode::Ok),
        ));
        let response = svc.export(request).await.unwrap();
        assert!(response.get_ref().partial_success.is_none());
        assert_eq!(store.stats().traces.ring.size, 1);
    }

    #[tokio::test]
    async fn serve_otlp_binds_ephemeral_port() {
        let store = leak_store();
        let addr = serve_otlp("127.0.0.1", 0, store).await.unwrap();
        assert_ne!(addr.port(), 0);
    }
}
