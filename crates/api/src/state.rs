use ads::AdsService;
use auth::AuthService;

/// Application state shared across all handlers
pub struct AppState {
    pub auth: AuthService,
    pub ads: AdsService,
    /// Limit applied to JSON and multipart request bodies
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(auth: AuthService, ads: AdsService, max_body_bytes: usize) -> Self {
        Self {
            auth,
            ads,
            max_body_bytes,
        }
    }
}
