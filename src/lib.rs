pub use pano_core as core;
pub use pano_features as features;
pub use pano_stitch as stitch;

use rayon::ThreadPoolBuilder;
use std::env;
use std::sync::OnceLock;

static THREAD_POOL_INIT: OnceLock<Result<(), String>> = OnceLock::new();

/// Initialize a single global Rayon thread pool for all parallel stages.
///
/// Call once at application startup. Repeated calls are idempotent and return
/// the first initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `PANO_CPU_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<(), String> {
    let res = THREAD_POOL_INIT.get_or_init(|| {
        let configured_threads = match num_threads {
            Some(n) => Some(n),
            None => read_cpu_threads_from_env()?,
        };
        let mut builder = ThreadPoolBuilder::new();
        if let Some(n) = configured_threads {
            builder = builder.num_threads(n);
        }
        builder.build_global().map_err(|e| e.to_string())
    });
    res.clone()
}

fn read_cpu_threads_from_env() -> Result<Option<usize>, String> {
    let raw = match env::var("PANO_CPU_THREADS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };
    let parsed = raw
        .parse::<usize>()
        .map_err(|_| format!("invalid PANO_CPU_THREADS value: {raw}"))?;
    if parsed == 0 {
        return Err("PANO_CPU_THREADS must be positive".into());
    }
    Ok(Some(parsed))
}
