//! Command-line job options.
//!
//! Only the coordinator parses arguments; workers receive the derived
//! [`JobConfig`](crate::core::config::JobConfig).

use crate::core::error::ConfigError;
use crate::core::types::Origin;
use std::path::PathBuf;

/// Parsed command-line options for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOptions {
    /// Image to read.
    pub input: PathBuf,
    /// Where to write the result.
    pub output: PathBuf,
    /// Kernel to look up in the catalog.
    pub kernel_name: String,
    /// Number of iterations.
    pub iterations: u32,
    /// Worker count (None = available parallelism).
    pub workers: Option<usize>,
    /// Extra kernel definitions in TOML.
    pub kernel_file: Option<PathBuf>,
    /// Row origin used by the codec.
    pub origin: Origin,
}

impl JobOptions {
    /// Parse arguments, excluding the program name.
    ///
    /// Positional: `<input> <output> <kernel> <iterations>`. Flags may appear
    /// anywhere: `--workers N`, `--kernels FILE`, `--flip`.
    pub fn parse<I, S>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut positional = Vec::new();
        let mut workers = None;
        let mut kernel_file = None;
        let mut origin = Origin::TopLeft;

        let mut args = args.into_iter().map(Into::into);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--workers" | "-n" => {
                    let value = args.next().ok_or(ConfigError::MissingArgument("worker count"))?;
                    let count: usize = parse_number("--workers", &value)?;
                    if count == 0 {
                        return Err(ConfigError::NoWorkers);
                    }
                    workers = Some(count);
                }
                "--kernels" | "-k" => {
                    let value = args
                        .next()
                        .ok_or(ConfigError::MissingArgument("kernel file"))?;
                    kernel_file = Some(PathBuf::from(value));
                }
                "--flip" => origin = Origin::BottomLeft,
                flag if flag.starts_with('-') && flag.len() > 1 => {
                    return Err(ConfigError::UnknownOption(flag.to_string()));
                }
                _ => positional.push(arg),
            }
        }

        let mut positional = positional.into_iter();
        let input = positional
            .next()
            .ok_or(ConfigError::MissingArgument("input path"))?;
        let output = positional
            .next()
            .ok_or(ConfigError::MissingArgument("output path"))?;
        let kernel_name = positional
            .next()
            .ok_or(ConfigError::MissingArgument("kernel name"))?;
        let iterations = positional
            .next()
            .ok_or(ConfigError::MissingArgument("iteration count"))?;
        let iterations = parse_number("iterations", &iterations)?;

        if let Some(extra) = positional.next() {
            return Err(ConfigError::InvalidArgument {
                argument: "arguments".to_string(),
                value: extra,
            });
        }

        Ok(Self {
            input: PathBuf::from(input),
            output: PathBuf::from(output),
            kernel_name,
            iterations,
            workers,
            kernel_file,
            origin,
        })
    }

    /// Usage text for the command line.
    pub fn usage(program: &str) -> String {
        format!(
            "Usage: {} <input> <output> <kernel> <iterations> [options]\n\
             \n\
             Options:\n\
             \x20 --workers, -n <N>     Number of workers (default: available cores)\n\
             \x20 --kernels, -k <FILE>  Load extra kernels from a TOML file\n\
             \x20 --flip                Treat row 0 as the bottom of the image\n\
             \n\
             Other commands:\n\
             \x20 list                  List available kernels",
            program
        )
    }
}

fn parse_number<T: std::str::FromStr>(argument: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidArgument {
        argument: argument.to_string(),
        value: value.to_string(),
    })
}
