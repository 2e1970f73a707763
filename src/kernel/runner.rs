//! Running the prefix-sum kernel on a device.

use std::{borrow::Cow, time::Instant};

use serde::Serialize;

use super::prefix_sum::{PrefixSumParams, ENTRY_POINT};
use crate::{Error, GpuContext, Result};

const TIMESTAMP_COUNT: u32 = 2;
const TIMESTAMP_BYTES: wgpu::BufferAddress = TIMESTAMP_COUNT as u64 * wgpu::QUERY_SIZE as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimingSource {
    /// GPU timestamps written at the start and end of the compute pass.
    Timestamp,
    /// Host time from submitting the dispatch until the device went idle.
    /// The input upload has already finished by then.
    WallClock,
}

/// Result of one dispatch.
#[derive(Debug, Clone)]
pub struct KernelRun {
    pub params: PrefixSumParams,
    pub workgroups: (u32, u32),
    pub elapsed_ns: f64,
    pub timing: TimingSource,
    pub output: Vec<u32>,
}

impl KernelRun {
    /// Index of the first value that differs from `expected`.
    pub fn first_mismatch(&self, expected: &[u32]) -> Option<usize> {
        if self.output.len() != expected.len() {
            return Some(self.output.len().min(expected.len()));
        }
        self.output
            .iter()
            .zip(expected)
            .position(|(produced, expected)| produced != expected)
    }
}

/// A compiled pipeline for one set of [`PrefixSumParams`].
pub struct PrefixSumKernel {
    params: PrefixSumParams,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl PrefixSumKernel {
    pub async fn new(context: &GpuContext, params: PrefixSumParams) -> Result<Self> {
        params.validate(&context.limits())?;
        params.check_features(context.device.features())?;
        let source = params.shader_source()?;
        let device = &context.device;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("prefix sum"),
            source: wgpu::ShaderSource::Wgsl(Cow::Owned(source)),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("prefix sum"),
            entries: &[
                storage_entry(0, true),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, false),
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("prefix sum"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("prefix sum"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: ENTRY_POINT,
            compilation_options: Default::default(),
        });
        if let Some(error) = device.pop_error_scope().await {
            return Err(Error::Validation {
                stage: "prefix sum pipeline",
                message: error.to_string(),
            });
        }

        Ok(Self {
            params,
            bind_group_layout,
            pipeline,
        })
    }

    pub fn params(&self) -> &PrefixSumParams {
        &self.params
    }

    /// Scans `input` once and reads the result back.
    pub async fn run(&self, context: &GpuContext, input: &[u32]) -> Result<KernelRun> {
        self.params.validate_input(input)?;
        let device = &context.device;
        let queue = &context.queue;
        let params = self.params;
        let workgroups = params.num_workgroups();
        let size = params.buffer_size();

        let input_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prefix sum input"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let output_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prefix sum output"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let output_staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prefix sum readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let states_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prefix sum states"),
            size: u64::from(workgroups.0) * 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let partition_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("prefix sum partition counter"),
            size: 4,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        queue.write_buffer(&input_buffer, 0, bytemuck::cast_slice(input));
        // Flush the upload so the wall clock only covers the dispatch.
        queue.submit(None);
        let _ = device.poll(wgpu::Maintain::Wait);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("prefix sum"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: input_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: states_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: partition_buffer.as_entire_binding(),
                },
            ],
        });

        let timestamps = context.timestamps_supported().then(|| Timestamps::new(device));

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("prefix sum"),
        });
        // Partition ids and lookback flags must start from zero on every run.
        encoder.clear_buffer(&states_buffer, 0, None);
        encoder.clear_buffer(&partition_buffer, 0, None);
        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("prefix sum"),
                timestamp_writes: timestamps.as_ref().map(Timestamps::pass_writes),
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, &bind_group, &[]);
            compute_pass.dispatch_workgroups(workgroups.0, workgroups.1, 1);
        }
        encoder.copy_buffer_to_buffer(&output_buffer, 0, &output_staging_buffer, 0, size);
        if let Some(ref timestamps) = timestamps {
            timestamps.resolve(&mut encoder);
        }

        let started = Instant::now();
        queue.submit(Some(encoder.finish()));
        let _ = device.poll(wgpu::Maintain::Wait);
        let wall_clock_ns = started.elapsed().as_nanos() as f64;
        log::debug!("{params}: submitted {} workgroups", workgroups.0);

        let output: Vec<u32> = map_read(device, &output_staging_buffer).await?;

        let (elapsed_ns, timing) = match timestamps {
            Some(timestamps) => (
                timestamps.elapsed_ns(device, queue).await?,
                TimingSource::Timestamp,
            ),
            None => (wall_clock_ns, TimingSource::WallClock),
        };

        Ok(KernelRun {
            params,
            workgroups,
            elapsed_ns,
            timing,
            output,
        })
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

struct Timestamps {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    read_buffer: wgpu::Buffer,
}

impl Timestamps {
    fn new(device: &wgpu::Device) -> Self {
        Self {
            query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("prefix sum timestamps"),
                ty: wgpu::QueryType::Timestamp,
                count: TIMESTAMP_COUNT,
            }),
            resolve_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp resolve"),
                size: TIMESTAMP_BYTES,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            read_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("timestamp readback"),
                size: TIMESTAMP_BYTES,
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
                mapped_at_creation: false,
            }),
        }
    }

    fn pass_writes(&self) -> wgpu::ComputePassTimestampWrites<'_> {
        wgpu::ComputePassTimestampWrites {
            query_set: &self.query_set,
            beginning_of_pass_write_index: Some(0),
            end_of_pass_write_index: Some(1),
        }
    }

    fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.resolve_query_set(&self.query_set, 0..TIMESTAMP_COUNT, &self.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(&self.resolve_buffer, 0, &self.read_buffer, 0, TIMESTAMP_BYTES);
    }

    async fn elapsed_ns(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<f64> {
        let ticks: Vec<u64> = map_read(device, &self.read_buffer).await?;
        let delta = ticks[1].wrapping_sub(ticks[0]);
        Ok(delta as f64 * f64::from(queue.get_timestamp_period()))
    }
}

/// Maps `buffer` for reading and copies its contents out.
async fn map_read<T: bytemuck::Pod>(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<T>> {
    let buffer_slice = buffer.slice(..);
    // The callback may outlive this future on the web, so bridge it with a
    // channel instead of borrowing anything.
    let (sender, receiver) = flume::bounded(1);
    buffer_slice.map_async(wgpu::MapMode::Read, move |r| {
        let _ = sender.send(r);
    });
    let _ = device.poll(wgpu::Maintain::Wait);
    receiver
        .recv_async()
        .await
        .map_err(|_| Error::ChannelClosed)??;

    let data = bytemuck::cast_slice::<u8, T>(&buffer_slice.get_mapped_range()).to_vec();
    buffer.unmap();
    Ok(data)
}
