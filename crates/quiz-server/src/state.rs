use std::sync::Arc;

use crate::quiz::QuizService;
use crate::rate_limit::IpRateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub quizzes: QuizService,
    /// Per-client token buckets shared by every route.
    pub rate_limiter: Arc<IpRateLimiter>,
    pub trust_proxy: bool,
}
