use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Request counters for every source fetched through one client.
#[derive(Debug, Clone, Default)]
pub struct FetchMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rate_limited_requests: u64,
    pub items_received: u64,
    pub total_response_time: Duration,
    pub requests_by_source: HashMap<String, SourceMetrics>,
}

#[derive(Debug, Clone)]
pub struct SourceMetrics {
    pub request_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub items_received: u64,
    pub total_response_time: Duration,
    pub min_response_time: Duration,
    pub max_response_time: Duration,
    pub last_error: Option<String>,
}

/// Outcome of one listing request, as recorded by the client.
#[derive(Debug, Clone)]
pub struct RequestMetrics {
    pub source_name: String,
    pub status_code: Option<u16>,
    pub response_time: Duration,
    pub items: usize,
    pub success: bool,
    pub rate_limited: bool,
    pub error_code: Option<String>,
}

impl FetchMetrics {
    pub fn average_response_time(&self) -> Duration {
        if self.total_requests == 0 {
            Duration::ZERO
        } else {
            self.total_response_time / self.total_requests as u32
        }
    }
}

impl SourceMetrics {
    fn new() -> Self {
        Self {
            request_count: 0,
            success_count: 0,
            error_count: 0,
            items_received: 0,
            total_response_time: Duration::ZERO,
            min_response_time: Duration::MAX,
            max_response_time: Duration::ZERO,
            last_error: None,
        }
    }

    fn update(&mut self, metrics: &RequestMetrics) {
        self.request_count += 1;
        self.total_response_time += metrics.response_time;
        self.min_response_time = self.min_response_time.min(metrics.response_time);
        self.max_response_time = self.max_response_time.max(metrics.response_time);

        if metrics.success {
            self.success_count += 1;
            self.items_received += metrics.items as u64;
        } else {
            self.error_count += 1;
            self.last_error = metrics.error_code.clone();
        }
    }

    pub fn average_response_time(&self) -> Duration {
        if self.request_count == 0 {
            Duration::ZERO
        } else {
            self.total_response_time / self.request_count as u32
        }
    }
}

#[derive(Debug, Default)]
pub struct MetricsCollector {
    metrics: Arc<RwLock<FetchMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_request(&self, request_metrics: RequestMetrics) {
        let mut metrics = self.metrics.write().await;

        metrics.total_requests += 1;
        metrics.total_response_time += request_metrics.response_time;

        if request_metrics.success {
            metrics.successful_requests += 1;
            metrics.items_received += request_metrics.items as u64;
        } else {
            metrics.failed_requests += 1;
        }

        if request_metrics.rate_limited {
            metrics.rate_limited_requests += 1;
        }

        metrics
            .requests_by_source
            .entry(request_metrics.source_name.clone())
            .or_insert_with(SourceMetrics::new)
            .update(&request_metrics);
    }

    /// Return everything recorded so far and start a fresh window.
    pub async fn take(&self) -> FetchMetrics {
        let mut metrics = self.metrics.write().await;
        std::mem::take(&mut *metrics)
    }
}
