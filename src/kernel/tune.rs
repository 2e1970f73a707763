//! Sweeping the prefix-sum tuning space on a device.

use std::{collections::BTreeMap, io};

use serde::Serialize;

use super::{
    prefix_sum::{self, ElementType, Lookback, PrefixSumParams, Reduction},
    runner::{PrefixSumKernel, TimingSource},
};
use crate::{Error, GpuContext, Result};

#[derive(Debug, Clone)]
pub struct TuneOptions {
    pub vector_sizes: Vec<u32>,
    /// Compare every output with [`prefix_sum::cpu_reference`].
    pub check: bool,
    /// Value every input element is filled with.
    pub fill: u32,
}

impl Default for TuneOptions {
    fn default() -> Self {
        Self {
            vector_sizes: prefix_sum::DEFAULT_VECTOR_SIZES.to_vec(),
            check: false,
            fill: 1,
        }
    }
}

/// One measured configuration.
#[derive(Debug, Clone, Serialize)]
pub struct TuneRecord {
    pub vector_size: u32,
    pub element: ElementType,
    pub workgroup_size_x: u32,
    pub workgroup_size_y: u32,
    pub batch_size: u32,
    pub reduction: Reduction,
    pub lookback: Lookback,
    pub workgroups: u32,
    pub elapsed_ns: f64,
    pub timing: TimingSource,
    /// `None` unless checking was requested.
    pub verified: Option<bool>,
}

impl TuneRecord {
    fn new(params: &PrefixSumParams, workgroups: u32, elapsed_ns: f64, timing: TimingSource) -> Self {
        Self {
            vector_size: params.vector_size,
            element: params.element,
            workgroup_size_x: params.workgroup_size_x,
            workgroup_size_y: params.workgroup_size_y,
            batch_size: params.batch_size,
            reduction: params.reduction,
            lookback: params.lookback,
            workgroups,
            elapsed_ns,
            timing,
            verified: None,
        }
    }

    /// Values scanned per nanosecond.
    pub fn throughput(&self) -> f64 {
        if self.elapsed_ns > 0.0 {
            f64::from(self.vector_size) / self.elapsed_ns
        } else {
            0.0
        }
    }
}

/// Runs every valid configuration for every requested vector size.
///
/// Configurations the device cannot run are skipped. A variant that fails to
/// compile is logged and skipped, but a size where no runnable variant
/// compiled is an error.
pub async fn tune(context: &GpuContext, options: &TuneOptions) -> Result<Vec<TuneRecord>> {
    let limits = context.limits();
    let features = context.device.features();
    let space = prefix_sum::tuning_space();
    let configurations = space.configurations();
    let mut records = Vec::new();

    for &vector_size in &options.vector_sizes {
        let input = vec![options.fill; vector_size as usize];
        let expected = options.check.then(|| prefix_sum::cpu_reference(&input));
        let mut attempted = 0;
        let mut compiled = 0;
        let mut last_rejection = None;

        for config in &configurations {
            let params = PrefixSumParams::from_configuration(vector_size, config)?;
            let runnable = params
                .validate(&limits)
                .and_then(|()| params.check_features(features))
                .and_then(|()| params.validate_input(&input));
            if let Err(reason) = runnable {
                log::debug!("Skipping {params}: {reason}");
                continue;
            }
            attempted += 1;

            let kernel = match PrefixSumKernel::new(context, params).await {
                Ok(kernel) => kernel,
                Err(error @ Error::Validation { .. }) => {
                    log::warn!("Skipping {params}: {error}");
                    last_rejection = Some(error);
                    continue;
                }
                Err(e) => return Err(e),
            };
            compiled += 1;
            let run = kernel.run(context, &input).await?;

            let mut record = TuneRecord::new(&params, run.workgroups.0, run.elapsed_ns, run.timing);
            if let Some(ref expected) = expected {
                let mismatch = run.first_mismatch(expected);
                if let Some(index) = mismatch {
                    log::error!(
                        "{params}: output[{index}] = {:?}, expected {:?}",
                        run.output.get(index),
                        expected.get(index)
                    );
                }
                record.verified = Some(mismatch.is_none());
            }
            log::info!("{params}: {:.0} ns ({:?})", record.elapsed_ns, record.timing);
            records.push(record);
        }

        check_size(vector_size, attempted, compiled, last_rejection)?;
    }

    Ok(records)
}

/// Turns a size where nothing ran into an error.
///
/// `last_rejection` is the most recent compile error, if any variant failed.
fn check_size(
    vector_size: u32,
    attempted: usize,
    compiled: usize,
    last_rejection: Option<Error>,
) -> Result<()> {
    if attempted == 0 {
        return Err(Error::NoRunnableVariant { vector_size });
    }
    match last_rejection {
        Some(error) if compiled == 0 => {
            log::error!("No variant compiled for vector size {vector_size}");
            Err(error)
        }
        _ => Ok(()),
    }
}

/// The fastest record for each vector size.
pub fn best_by_size(records: &[TuneRecord]) -> BTreeMap<u32, &TuneRecord> {
    let mut best: BTreeMap<u32, &TuneRecord> = BTreeMap::new();
    for record in records {
        if record.verified == Some(false) {
            continue;
        }
        best.entry(record.vector_size)
            .and_modify(|current| {
                if record.elapsed_ns < current.elapsed_ns {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    best
}

pub fn print_records(output: &mut impl io::Write, records: &[TuneRecord]) -> io::Result<()> {
    writeln!(
        output,
        "{:>10} {:>5} {:>8} {:>5} {:>15} {:>9} {:>10} {:>14} {:>9} {:>8}",
        "size", "elem", "wg", "batch", "reduction", "lookback", "groups", "time (ns)", "values/ns", "check"
    )?;
    for record in records {
        let check = match record.verified {
            Some(true) => "ok",
            Some(false) => "FAILED",
            None => "-",
        };
        writeln!(
            output,
            "{:>10} {:>5} {:>8} {:>5} {:>15} {:>9} {:>10} {:>14.0} {:>9.3} {:>8}",
            record.vector_size,
            record.element.to_string(),
            format!("{}x{}", record.workgroup_size_x, record.workgroup_size_y),
            record.batch_size,
            record.reduction.to_string(),
            record.lookback.to_string(),
            record.workgroups,
            record.elapsed_ns,
            record.throughput(),
            check
        )?;
    }

    let best = best_by_size(records);
    if !best.is_empty() {
        writeln!(output)?;
        writeln!(output, "Best configuration per size:")?;
        for (size, record) in best {
            writeln!(
                output,
                "{size:>10}: {} wg={}x{} batch={} {} lookback={} ({:.0} ns)",
                record.element,
                record.workgroup_size_x,
                record.workgroup_size_y,
                record.batch_size,
                record.reduction,
                record.lookback,
                record.elapsed_ns
            )?;
        }
    }
    Ok(())
}
