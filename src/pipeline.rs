//! ## ETL Pipeline Runner
//!
//! This module provides the core abstractions for running a fixed, linear sequence of
//! ETL steps.
//!
//! ### Overview
//!
//! - The [`Step`] trait defines a named unit of work (download, transform, upload, ...).
//! - The [`Pipeline`] struct runs the steps strictly sequentially; the first error
//!   aborts the run so downstream steps are never executed.
//! - The [`crate::make_pipeline`] macro simplifies pipeline construction by boxing the
//!   steps.
//!
//! A [`TaxiEtlError::DataQuality`] failure is logged as a business-rule failure rather
//! than an infrastructure failure; behaviorally both abort the run identically.

use std::time::Instant;

use async_trait::async_trait;
use tracing::{error, info};

use crate::exceptions::{TaxiEtlError, TaxiEtlResult};

/// A named unit of work in a pipeline run.
#[async_trait]
pub trait Step {
    /// Executes the step. Any error aborts the pipeline run.
    async fn run(&self) -> TaxiEtlResult<()>;
}

/// A pipeline that runs a sequence of steps in order.
///
/// The step order is a strict dependency chain: a step only runs if every step before
/// it succeeded. No step is retried; retry policy belongs to whatever invokes the
/// pipeline binary.
pub struct Pipeline {
    steps: Vec<(String, Box<dyn Step + Send + Sync>)>,
    verbose: bool,
}

impl Pipeline {
    /// Creates a new pipeline.
    ///
    /// # Arguments
    ///
    /// * `steps` - A vector of (name, step) pairs (each step is already boxed).
    /// * `verbose` - If true, prints per-step progress and timing.
    pub fn new(steps: Vec<(String, Box<dyn Step + Send + Sync>)>, verbose: bool) -> Self {
        Self { steps, verbose }
    }

    /// Runs each step sequentially, stopping at the first failure.
    pub async fn run(&self) -> TaxiEtlResult<()> {
        if self.steps.is_empty() {
            return Err(TaxiEtlError::InvalidParameter(
                "Pipeline must have at least one step.".to_string(),
            ));
        }
        for (name, step) in self.steps.iter() {
            if self.verbose {
                println!("Running step: {}", name);
            }
            let start = Instant::now();
            match step.run().await {
                Ok(()) => {
                    info!(step = %name, elapsed = ?start.elapsed(), "step completed");
                    if self.verbose {
                        println!("Step '{}' completed in {:?}", name, start.elapsed());
                    }
                }
                Err(e @ TaxiEtlError::DataQuality(_)) => {
                    error!(step = %name, %e, "business-rule failure; skipping downstream steps");
                    return Err(e);
                }
                Err(e) => {
                    error!(step = %name, %e, "step failed; skipping downstream steps");
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}

/// Macro to simplify pipeline creation by automatically boxing steps.
///
/// # Example
///
/// ```rust,no_run
/// use taxi_etl::make_pipeline;
/// use taxi_etl::steps::cleanup::Cleanup;
///
/// let pipeline = make_pipeline!(false,
///     ("cleanup", Cleanup::new("/tmp/output.csv".into())),
/// );
/// ```
#[macro_export]
macro_rules! make_pipeline {
    ($verbose:expr, $(($name:expr, $step:expr)),+ $(,)?) => {
        {
            let steps: Vec<(String, Box<dyn $crate::pipeline::Step + Send + Sync>)> = vec![
                $(
                    ($name.to_string(), Box::new($step)),
                )+
            ];
            $crate::pipeline::Pipeline::new(steps, $verbose)
        }
    };
}
