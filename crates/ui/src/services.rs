use std::sync::Arc;

use emberchat_backend::{ChatBackend, IdentityClient};
use emberchat_filter::ProfanityFilter;

/// Explicitly constructed service handles, built once in `main` and passed
/// down. Views depend on the traits only, so tests can substitute fakes.
#[derive(Clone)]
pub struct AppServices {
    pub identity: Arc<dyn IdentityClient>,
    pub backend: Arc<dyn ChatBackend>,
    pub filter: Arc<dyn ProfanityFilter>,
}

impl AppServices {
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        backend: Arc<dyn ChatBackend>,
        filter: Arc<dyn ProfanityFilter>,
    ) -> Self {
        Self {
            identity,
            backend,
            filter,
        }
    }
}
