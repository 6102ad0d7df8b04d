//! List reloading through the fallback surface.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::router::{RefreshTarget, Refresher, RideView};

use super::RideApi;

/// [`Refresher`] that fetches lists with a [`RideApi`] and hands them to a
/// [`RideView`].
///
/// Each refresh runs as its own task. Failed loads leave the view as is.
#[derive(Clone)]
pub struct ApiRefresher {
    api: RideApi,
    view: Arc<dyn RideView>,
}

impl ApiRefresher {
    /// Creates a refresher.
    #[must_use]
    pub fn new(api: RideApi, view: Arc<dyn RideView>) -> Self {
        Self { api, view }
    }
}

impl fmt::Debug for ApiRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiRefresher")
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl Refresher for ApiRefresher {
    fn refresh(&self, target: RefreshTarget, delay: Duration) {
        let Ok(handle) = Handle::try_current() else {
            warn!(%target, "No runtime, refresh skipped");
            return;
        };

        let api = self.api.clone();
        let view = Arc::clone(&self.view);

        handle.spawn(async move {
            if !delay.is_zero() {
                sleep(delay).await;
            }

            match api.list(target).await {
                Ok(rides) => {
                    trace!(%target, count = rides.len(), "List refreshed");
                    view.show_rides(target, &rides);
                }
                Err(e) => debug!(%target, error = %e, "List refresh failed"),
            }
        });
    }
}
