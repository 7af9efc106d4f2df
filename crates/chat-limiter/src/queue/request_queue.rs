//! Rate-limited request dispatcher
//!
//! Every outbound request resolves a bucket, takes an admission ticket,
//! clears the global pause gate, sends, and feeds the response headers
//! back into the bucket. 429s are absorbed by sleeping out the reset when
//! the retry flags allow it; everything the dispatcher cannot recover
//! locally surfaces as one typed error.

use super::GlobalGate;
use crate::bucket::{Admission, BucketId, BucketTable, RequestBucket};
use crate::error::RequestError;
use crate::events::RateLimitEvent;
use crate::request::{Request, RequestOptions, RetryMode, TransportResponse};
use crate::transport::{Transport, TransportError};
use chat_common::LimiterConfig;
use chat_core::events::{HandlerRegistry, SubscriptionHandle};
use chat_core::ApiError;
use std::sync::Arc;
use tokio::time::Instant;

/// Admission control for all outbound traffic
///
/// Shared between the REST surface and the gateway session manager; both
/// paths converge on the same buckets and the same global pause gate.
pub struct RequestQueue {
    transport: Arc<dyn Transport>,
    table: BucketTable,
    global: GlobalGate,
    config: LimiterConfig,
    events: HandlerRegistry<RateLimitEvent>,
}

impl RequestQueue {
    /// Create a queue and start its background bucket sweep
    ///
    /// Must be called from within a tokio runtime; the sweep runs once per
    /// configured interval and stops when the queue is dropped.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, config: LimiterConfig) -> Arc<Self> {
        let queue = Arc::new(Self {
            transport,
            table: BucketTable::new(),
            global: GlobalGate::new(),
            config,
            events: HandlerRegistry::new(),
        });
        Self::spawn_sweeper(&queue);
        queue
    }

    /// Dispatch one request through its bucket
    ///
    /// Returns the transport response once a 2xx (or unrecognized but
    /// successful) status arrives, or one typed error. Retry behavior is
    /// governed entirely by the request's [`RetryMode`] flags and
    /// deadline.
    pub async fn enqueue(&self, request: Request) -> Result<TransportResponse, RequestError> {
        let endpoint = request.endpoint();

        loop {
            Self::check_interrupts(&request.options)?;

            let (bucket_id, bucket) = self.table.resolve(&request.bucket);
            self.admit(&bucket_id, &bucket, &request.options, &endpoint)
                .await?;
            self.wait_global(&request.options, &bucket_id).await?;

            let response = match self.execute_once(&request).await {
                Ok(response) => response,
                Err(RequestError::Transport(TransportError::Timeout)) => {
                    if request.options.retry.contains(RetryMode::TIMEOUT) {
                        tracing::debug!(endpoint = %endpoint, "Transport timed out, retrying");
                        continue;
                    }
                    return Err(RequestError::Timeout);
                }
                Err(err) => return Err(err),
            };

            let now = Instant::now();
            bucket.update(&response.rate, now);
            if let Some(hash) = response.rate.bucket.clone() {
                self.table.apply_hash(&request.bucket, &bucket, &hash);
            }

            if response.is_success() {
                return Ok(response);
            }

            match response.status {
                429 => {
                    let retry_after = response.rate.reset_after_duration();
                    if response.rate.global {
                        let pause = retry_after.unwrap_or_else(|| self.config.min_backoff())
                            + self.config.clock_skew_lag();
                        self.global.pause_until(now + pause);
                        tracing::warn!(
                            endpoint = %endpoint,
                            pause_ms = pause.as_millis() as u64,
                            "Global rate limit hit, pausing all sends"
                        );
                    }
                    if !request.options.retry.contains(RetryMode::RATE_LIMIT) {
                        return Err(RequestError::RateLimited {
                            bucket: bucket_id,
                            retry_after,
                        });
                    }
                    tracing::debug!(
                        endpoint = %endpoint,
                        bucket = %bucket_id,
                        retry_after = ?retry_after,
                        "Request was rate limited, waiting it out"
                    );
                    // Loop back; admission sleeps out the bucket reset and
                    // the global gate covers the rest
                }
                502 => {
                    if !request.options.retry.contains(RetryMode::BAD_GATEWAY) {
                        return Err(RequestError::Transport(TransportError::Other(
                            "bad gateway".to_string(),
                        )));
                    }
                    tracing::debug!(endpoint = %endpoint, "Got 502, retrying");
                }
                status => {
                    let error = ApiError::from_body(status, &response.body);
                    tracing::debug!(
                        endpoint = %endpoint,
                        status,
                        code = %error.code,
                        "Server rejected request"
                    );
                    return Err(RequestError::Rejected { status, error });
                }
            }
        }
    }

    /// Admission and global gate only, no I/O
    ///
    /// The gateway session manager calls this before writing a frame so
    /// gateway sends share admission logic with REST.
    pub async fn throttle(
        &self,
        bucket_id: &BucketId,
        options: &RequestOptions,
    ) -> Result<(), RequestError> {
        Self::check_interrupts(options)?;
        let (resolved, bucket) = self.table.resolve(bucket_id);
        let endpoint = resolved.to_string();
        self.admit(&resolved, &bucket, options, &endpoint).await?;
        self.wait_global(options, &resolved).await
    }

    /// Subscribe to rate-limit-triggered notifications
    pub fn on_rate_limit<F>(&self, handler: F) -> SubscriptionHandle
    where
        F: Fn(&RateLimitEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(handler)
    }

    /// Remove a rate-limit subscription
    pub fn unsubscribe_rate_limit(&self, handle: SubscriptionHandle) -> bool {
        self.events.unsubscribe(handle)
    }

    /// Number of bucket slots currently tracked
    pub fn bucket_count(&self) -> usize {
        self.table.len()
    }

    /// Take one ticket from the bucket, sleeping out stalls
    ///
    /// The rate-limit-triggered notification fires exactly once per stall,
    /// not once per retry iteration.
    async fn admit(
        &self,
        bucket_id: &BucketId,
        bucket: &Arc<RequestBucket>,
        options: &RequestOptions,
        endpoint: &str,
    ) -> Result<(), RequestError> {
        let mut notified = false;

        loop {
            Self::check_interrupts(options)?;
            let now = Instant::now();

            match bucket.try_take(now) {
                Admission::Admitted => return Ok(()),
                Admission::Blocked { until } => {
                    if !notified {
                        notified = true;
                        tracing::debug!(
                            bucket = %bucket_id,
                            endpoint = %endpoint,
                            "Rate limit triggered, holding request"
                        );
                        self.events.publish(&RateLimitEvent {
                            bucket: bucket_id.clone(),
                            info: Some(bucket.info(now)),
                            endpoint: endpoint.to_string(),
                        });
                    }

                    let wait = match until {
                        Some(reset) => reset.saturating_duration_since(now),
                        None => self.config.min_backoff(),
                    };
                    self.sleep_bounded(wait, options, bucket_id).await?;
                }
            }
        }
    }

    /// Sleep out the process-wide pause, if one is active
    async fn wait_global(
        &self,
        options: &RequestOptions,
        bucket_id: &BucketId,
    ) -> Result<(), RequestError> {
        loop {
            let Some(wait) = self.global.remaining(Instant::now()) else {
                return Ok(());
            };
            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                "Global pause active, holding send"
            );
            self.sleep_bounded(wait, options, bucket_id).await?;
        }
    }

    /// Sleep `wait`, respecting cancellation and never past the deadline
    async fn sleep_bounded(
        &self,
        wait: std::time::Duration,
        options: &RequestOptions,
        bucket_id: &BucketId,
    ) -> Result<(), RequestError> {
        if let Some(deadline) = options.deadline {
            if Instant::now() + wait > deadline {
                // Sleeping past the deadline is pointless; fail now. With
                // the rate-limit retry flag set the caller gets the richer
                // error so it can schedule its own retry.
                return Err(if options.retry.contains(RetryMode::RATE_LIMIT) {
                    RequestError::RateLimited {
                        bucket: bucket_id.clone(),
                        retry_after: Some(wait),
                    }
                } else {
                    RequestError::Timeout
                });
            }
        }

        tokio::select! {
            () = options.cancellation.cancelled() => Err(RequestError::Cancelled),
            () = tokio::time::sleep(wait) => Ok(()),
        }
    }

    /// One transport attempt, bounded by the deadline and cancellation
    async fn execute_once(&self, request: &Request) -> Result<TransportResponse, RequestError> {
        let io = self.transport.execute(request);

        tokio::select! {
            () = request.options.cancellation.cancelled() => Err(RequestError::Cancelled),
            result = async {
                match request.options.deadline {
                    Some(deadline) => match tokio::time::timeout_at(deadline, io).await {
                        Ok(result) => result,
                        Err(_) => Err(TransportError::Timeout),
                    },
                    None => io.await,
                }
            } => result.map_err(RequestError::from),
        }
    }

    fn check_interrupts(options: &RequestOptions) -> Result<(), RequestError> {
        if options.cancellation.is_cancelled() {
            return Err(RequestError::Cancelled);
        }
        if let Some(deadline) = options.deadline {
            if Instant::now() >= deadline {
                return Err(RequestError::Timeout);
            }
        }
        Ok(())
    }

    fn spawn_sweeper(queue: &Arc<Self>) {
        let weak = Arc::downgrade(queue);
        let period = queue.config.sweep_interval();
        let idle = queue.config.bucket_idle();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The first tick completes immediately; skip it so the sweep
            // waits a full period before its first pass
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(queue) = weak.upgrade() else { break };
                queue.table.sweep(Instant::now(), idle);
            }
        });
    }
}

impl std::fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestQueue")
            .field("buckets", &self.table.len())
            .finish()
    }
}
