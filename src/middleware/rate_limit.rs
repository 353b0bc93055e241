use parking_lot::Mutex;
use poem::{
    Endpoint, IntoResponse, Middleware, Request, Response, Result,
    http::{StatusCode, header},
};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

const MAX_TRACKED_CLIENTS: usize = 10_000;
const PRUNE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: u32, now: Instant) -> Self {
        Self {
            capacity: f64::from(capacity),
            tokens: f64::from(capacity),
            refill_per_sec: f64::from(refill_per_sec),
            last: now,
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last = now;
    }

    /// Takes one token, or returns how long until one is available.
    pub fn try_acquire(&mut self, now: Instant) -> std::result::Result<(), Duration> {
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64(
                (1.0 - self.tokens) / self.refill_per_sec,
            ))
        }
    }

    pub fn is_full(&mut self, now: Instant) -> bool {
        self.refill(now);
        self.tokens >= self.capacity
    }
}

struct BucketTable {
    buckets: HashMap<String, TokenBucket>,
    last_prune: Option<Instant>,
}

impl BucketTable {
    /// Drops idle full buckets, at most once per [`PRUNE_INTERVAL`].
    fn prune(&mut self, now: Instant) {
        let due = self
            .last_prune
            .is_none_or(|last| now.saturating_duration_since(last) >= PRUNE_INTERVAL);
        if due {
            self.buckets.retain(|_, bucket| !bucket.is_full(now));
            self.last_prune = Some(now);
        }
    }
}

/// Per-client token buckets keyed by remote IP.
///
/// The table holds at most `max_clients` entries. A new client arriving
/// while every tracked bucket is still in use is refused until one goes idle.
pub struct RateLimiter {
    per_sec: u32,
    burst: u32,
    max_clients: usize,
    table: Mutex<BucketTable>,
}

impl RateLimiter {
    pub fn new(per_sec: u32, burst: u32) -> Self {
        Self::with_max_clients(per_sec, burst, MAX_TRACKED_CLIENTS)
    }

    pub fn with_max_clients(per_sec: u32, burst: u32, max_clients: usize) -> Self {
        Self {
            per_sec,
            burst: burst.max(1),
            max_clients: max_clients.max(1),
            table: Mutex::new(BucketTable {
                buckets: HashMap::new(),
                last_prune: None,
            }),
        }
    }

    pub fn check(&self, key: &str) -> std::result::Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> std::result::Result<(), Duration> {
        let mut table = self.table.lock();
        if let Some(bucket) = table.buckets.get_mut(key) {
            return bucket.try_acquire(now);
        }

        if table.buckets.len() >= self.max_clients {
            table.prune(now);
            if table.buckets.len() >= self.max_clients {
                return Err(PRUNE_INTERVAL);
            }
        }

        let mut bucket = TokenBucket::new(self.burst, self.per_sec, now);
        let admitted = bucket.try_acquire(now);
        table.buckets.insert(key.to_string(), bucket);
        admitted
    }

    pub fn tracked_clients(&self) -> usize {
        self.table.lock().buckets.len()
    }
}

/// Admission control middleware. Passes everything through when built with
/// a rate of zero.
pub struct RateLimit {
    limiter: Option<Arc<RateLimiter>>,
}

impl RateLimit {
    pub fn new(per_sec: u32, burst: Option<u32>) -> Self {
        let limiter = (per_sec > 0)
            .then(|| Arc::new(RateLimiter::new(per_sec, burst.unwrap_or(per_sec))));
        Self { limiter }
    }
}

impl<E: Endpoint> Middleware<E> for RateLimit {
    type Output = RateLimitEndpoint<E>;

    fn transform(&self, ep: E) -> Self::Output {
        RateLimitEndpoint {
            inner: ep,
            limiter: self.limiter.clone(),
        }
    }
}

pub struct RateLimitEndpoint<E> {
    inner: E,
    limiter: Option<Arc<RateLimiter>>,
}

impl<E: Endpoint> Endpoint for RateLimitEndpoint<E> {
    type Output = Response;

    async fn call(&self, req: Request) -> Result<Self::Output> {
        if let Some(limiter) = &self.limiter {
            let key = client_key(&req);
            if let Err(retry_after) = limiter.check(&key) {
                tracing::warn!("Rate limited client {} on {}", key, req.uri().path());
                return Ok(too_many_requests(retry_after));
            }
        }

        self.inner.call(req).await.map(IntoResponse::into_response)
    }
}

fn client_key(req: &Request) -> String {
    req.remote_addr()
        .as_socket_addr()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn too_many_requests(retry_after: Duration) -> Response {
    let seconds = retry_after.as_secs_f64().ceil().max(1.0) as u64;
    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header(header::RETRY_AFTER, seconds.to_string())
        .content_type("application/json")
        .body(serde_json::json!({ "message": "too many requests" }).to_string())
}
