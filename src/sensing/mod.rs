pub mod clock;
pub mod loop_worker;
pub mod sampler;
#[cfg(target_os = "linux")]
pub mod x11;

use anyhow::Result;
use std::sync::Arc;

pub use clock::{Clock, SystemClock};
pub use loop_worker::foreground_poll_loop;
pub use sampler::ForegroundSampler;

/// Foreground sampler for the platform this binary was built for.
pub fn native_sampler() -> Result<Arc<dyn ForegroundSampler>> {
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(x11::X11Sampler::connect()?))
    }

    #[cfg(not(target_os = "linux"))]
    {
        anyhow::bail!("foreground sampling is only available on Linux (X11)")
    }
}
