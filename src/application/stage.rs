// ============================================================
// Layer 2: Stage Timing
// ============================================================
// Runs one pipeline stage inside an `info` span and logs how long
// it took, whether it succeeded or not.

use std::time::Instant;

use anyhow::Result;

pub fn timed<T>(stage: &str, f: impl FnOnce() -> Result<T>) -> Result<T> {
    let span = tracing::info_span!("stage", name = stage);
    let _enter = span.enter();

    let started = Instant::now();
    let result = f();
    let secs = started.elapsed().as_secs_f64();

    match &result {
        Ok(_) => tracing::info!("{} finished in {:.2}s", stage, secs),
        Err(e) => tracing::info!("{} failed after {:.2}s: {:#}", stage, secs, e),
    }
    result
}
