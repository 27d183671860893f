//! Coordinator-side job pipeline: resolve the kernel, load, filter, save.

use crate::core::codec::ImageCodec;
use crate::core::config::JobConfig;
use crate::core::error::StencilResult;
use crate::core::options::JobOptions;
use crate::core::types::ImageDescriptor;
use crate::execution::engine::{EngineOptions, JobStats, StencilEngine};
use crate::filters::catalog::KernelCatalog;

/// Build the kernel catalog for a job: the built-ins plus any kernel file.
pub fn load_catalog(options: &JobOptions) -> StencilResult<KernelCatalog> {
    let mut catalog = KernelCatalog::with_builtins();
    if let Some(path) = &options.kernel_file {
        catalog.load_file(path)?;
    }
    Ok(catalog)
}

/// Run the job described by `options`.
///
/// The kernel is resolved and the input loaded before any worker starts, so
/// configuration and load errors never reach the worker group. The output is
/// only written if every worker succeeded.
pub fn run_job(
    options: &JobOptions,
    codec: &dyn ImageCodec,
    engine_options: EngineOptions,
) -> StencilResult<JobStats> {
    let catalog = load_catalog(options)?;
    let kernel = catalog.lookup(&options.kernel_name)?.clone();

    let image = codec.load(&options.input)?;
    let job = JobConfig::new(ImageDescriptor::of(&image), kernel, options.iterations);

    let engine_options = match options.workers {
        Some(workers) => engine_options.with_workers(workers),
        None => engine_options,
    };
    let output = StencilEngine::with_options(engine_options).run(&job, &image)?;

    codec.save(&options.output, &output.image)?;
    log::info!(
        "Wrote {} ({} iterations of '{}')",
        options.output.display(),
        options.iterations,
        options.kernel_name
    );
    Ok(output.stats)
}
