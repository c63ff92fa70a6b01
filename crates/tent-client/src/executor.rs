//! Ordered failover across servers.

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Run `op` against each item in order until one succeeds.
///
/// Each item is tried exactly once. The first success is returned as is;
/// if every item fails, the last item's error is returned and the earlier
/// ones are only logged. An empty slice is `Error::NoServers`.
pub fn first_success<S, T, F>(items: &[S], mut op: F) -> Result<T>
where
    F: FnMut(&S) -> Result<T>,
{
    let Some((last, rest)) = items.split_last() else {
        return Err(Error::NoServers);
    };
    for (index, item) in rest.iter().enumerate() {
        match op(item) {
            Ok(value) => return Ok(value),
            Err(err) => warn!(attempt = index + 1, of = items.len(), "Failed, trying next: {err}"),
        }
    }
    debug!(attempt = items.len(), of = items.len(), "Trying last option");
    op(last)
}
