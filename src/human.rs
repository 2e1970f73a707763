use std::io;

use crate::report::{AdapterReport, ComputeLimits, GpuReport};

fn print_empty_string(input: &str) -> &str {
    if input.is_empty() {
        "<empty>"
    } else {
        input
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "supported"
    } else {
        "not supported"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintingVerbosity {
    /// Corresponds to the `-q` flag
    NameOnly,
    /// Corresponds to no flag.
    Information,
    /// Corresponds to the `-v` flag
    InformationLimits,
}

// Lets keep these print statements on one line
#[rustfmt::skip]
fn print_adapter(output: &mut impl io::Write, report: &AdapterReport, idx: usize, verbosity: PrintingVerbosity) -> io::Result<()> {
    if verbosity == PrintingVerbosity::NameOnly {
        writeln!(output, "Adapter {idx}: {} ({})", report.name, report.backend)?;
        return Ok(());
    }

    writeln!(output, "Adapter {idx}:")?;
    writeln!(output, "\t         Backend: {}", report.backend)?;
    writeln!(output, "\t            Name: {}", report.name)?;
    writeln!(output, "\t        VendorID: {:#X?}", report.vendor)?;
    writeln!(output, "\t        DeviceID: {:#X?}", report.device)?;
    writeln!(output, "\t            Type: {}", report.device_type)?;
    writeln!(output, "\t          Driver: {}", print_empty_string(&report.driver))?;
    writeln!(output, "\t      DriverInfo: {}", print_empty_string(&report.driver_info))?;
    writeln!(output, "\t        Fallback: {}", report.is_fallback)?;
    writeln!(output, "\tWebGPU Compliant: {}", report.webgpu_compliant)?;

    if verbosity == PrintingVerbosity::Information {
        return Ok(());
    }

    writeln!(output, "\tCapabilities:")?;
    writeln!(output, "\t\t Timestamp Query: {}", yes_no(report.timestamp_query))?;
    writeln!(output, "\t\t        Subgroup: {}", yes_no(report.subgroup))?;

    writeln!(output, "\tLimits:")?;
    let ComputeLimits {
        max_compute_workgroup_size_x,
        max_compute_workgroup_size_y,
        max_compute_workgroup_size_z,
        max_compute_invocations_per_workgroup,
        max_compute_workgroup_storage_size,
        max_compute_workgroups_per_dimension,
        max_storage_buffer_binding_size,
        max_storage_buffers_per_shader_stage,
        max_buffer_size,
        min_subgroup_size,
        max_subgroup_size,
    } = report.limits;
    writeln!(output, "\t\t           Max Compute Workgroup Size X: {max_compute_workgroup_size_x}")?;
    writeln!(output, "\t\t           Max Compute Workgroup Size Y: {max_compute_workgroup_size_y}")?;
    writeln!(output, "\t\t           Max Compute Workgroup Size Z: {max_compute_workgroup_size_z}")?;
    writeln!(output, "\t\t  Max Compute Invocations Per Workgroup: {max_compute_invocations_per_workgroup}")?;
    writeln!(output, "\t\t     Max Compute Workgroup Storage Size: {max_compute_workgroup_storage_size}")?;
    writeln!(output, "\t\t   Max Compute Workgroups Per Dimension: {max_compute_workgroups_per_dimension}")?;
    writeln!(output, "\t\t        Max Storage Buffer Binding Size: {max_storage_buffer_binding_size}")?;
    writeln!(output, "\t\t   Max Storage Buffers Per Shader Stage: {max_storage_buffers_per_shader_stage}")?;
    writeln!(output, "\t\t                        Max Buffer Size: {max_buffer_size}")?;
    writeln!(output, "\t\t                      Min Subgroup Size: {min_subgroup_size}")?;
    writeln!(output, "\t\t                      Max Subgroup Size: {max_subgroup_size}")?;

    Ok(())
}

pub fn print_adapters(
    output: &mut impl io::Write,
    report: &GpuReport,
    verbosity: PrintingVerbosity,
) -> io::Result<()> {
    if report.devices.is_empty() {
        writeln!(output, "No adapters found")?;
        return Ok(());
    }

    for (idx, adapter) in report.devices.iter().enumerate() {
        print_adapter(output, adapter, idx, verbosity)?;
        if verbosity != PrintingVerbosity::NameOnly && idx + 1 != report.devices.len() {
            writeln!(output)?;
        }
    }

    Ok(())
}
