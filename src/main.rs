//! halo-stencil CLI - distributed iterative image convolution.

use anyhow::Context;
use halo_stencil::prelude::*;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args();
    let program = args.next().unwrap_or_else(|| halo_stencil::NAME.to_string());
    let args: Vec<String> = args.collect();

    match args.first().map(String::as_str) {
        None | Some("help" | "--help" | "-h") => {
            println!("{}", JobOptions::usage(&program));
            ExitCode::SUCCESS
        }
        Some("--version" | "-V") => {
            println!("{} {}", halo_stencil::NAME, halo_stencil::VERSION);
            ExitCode::SUCCESS
        }
        Some("list") => report(list_kernels(&args[1..])),
        Some(_) => report(process(&args)),
    }
}

fn report(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if let Some(fix) = e.downcast_ref::<StencilError>().and_then(StencilError::suggested_fix) {
                eprintln!("Hint: {}", fix);
            }
            ExitCode::FAILURE
        }
    }
}

fn list_kernels(args: &[String]) -> anyhow::Result<()> {
    let mut catalog = KernelCatalog::with_builtins();
    match args {
        [] => {}
        [flag, path] if flag == "--kernels" || flag == "-k" => {
            catalog.load_file(path.as_ref())?;
        }
        _ => anyhow::bail!("Usage: list [--kernels <FILE>]"),
    }

    println!("Available kernels ({} total):", catalog.len());
    println!();
    for (name, entry) in catalog.entries() {
        let kernel = &entry.kernel;
        println!(
            "  {:<12} {}x{}  factor {:<8} {}",
            name,
            kernel.dim(),
            kernel.dim(),
            kernel.factor(),
            entry.description
        );
    }
    Ok(())
}

fn process(args: &[String]) -> anyhow::Result<()> {
    let options = JobOptions::parse(args.iter().cloned()).map_err(StencilError::from)?;
    let codec = FileCodec::new().with_origin(options.origin);

    let stats = run_job(&options, &codec, EngineOptions::new())
        .with_context(|| format!("Job on '{}' failed", options.input.display()))?;

    println!(
        "Processed {} iterations on {} workers in {:.2?}",
        stats.iterations, stats.workers, stats.total_duration
    );
    for worker in &stats.per_worker {
        log::debug!(
            "worker {}: {} exchanges, compute {:.2?}, communication {:.2?}",
            worker.rank,
            worker.exchanges,
            worker.compute_time,
            worker.communication_time
        );
    }
    Ok(())
}
