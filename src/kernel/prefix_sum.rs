//! Parameters, validation and shader generation for the prefix-sum kernel.
//!
//! The kernel computes an inclusive prefix sum over `vector_size` `u32`
//! values in a single dispatch. Inputs are read as `u32`, `vec2<u32>` or
//! `vec4<u32>` elements, each thread scans `batch_size` consecutive elements
//! in registers, and the per-thread totals are combined in workgroup memory
//! with one of the [`Reduction`] strategies. Workgroups then chain their
//! totals through a decoupled [`Lookback`].
//!
//! The subgroup variants need [`wgpu::Features::SUBGROUP`]; see
//! [`PrefixSumParams::check_features`].

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;

use super::{
    template::{self, TemplateError},
    tuning::{Configuration, TuningArg, TuningSpace},
};

const SHADER_TEMPLATE: &str = include_str!("prefix_sum.wgsl");

pub const ENTRY_POINT: &str = "prefix_sum";

/// Aggregates are packed next to a 2-bit flag, so every partial sum must
/// stay below this bound.
pub const MAX_TOTAL: u64 = 1 << 30;

/// Invocations per workgroup are capped here regardless of device limits.
pub const MAX_INVOCATIONS: u32 = 256;

pub const WORKGROUP_SIZES_X: [u32; 4] = [32, 64, 128, 256];
pub const WORKGROUP_SIZES_Y: [u32; 1] = [1];
pub const BATCH_SIZES: [u32; 4] = [1, 2, 4, 8];

pub const DEFAULT_VECTOR_SIZES: [u32; 15] = [
    1 << 10,
    1 << 11,
    1 << 13,
    1 << 14,
    1 << 15,
    1 << 16,
    1 << 17,
    1 << 18,
    1 << 19,
    1 << 20,
    1 << 21,
    1 << 22,
    1 << 23,
    1 << 24,
    1 << 25,
];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParamsError {
    #[error("vector size must be non-zero")]
    EmptyVector,
    #[error("workgroup size {0}x{1} is not a power of two")]
    WorkgroupSizeNotPowerOfTwo(u32, u32),
    #[error("batch size must be non-zero")]
    EmptyBatch,
    #[error("{invocations} invocations per workgroup exceeds the maximum of {max}")]
    TooManyInvocations { invocations: u32, max: u32 },
    #[error("workgroup size {size} along {dimension} exceeds the maximum of {max}")]
    WorkgroupDimension {
        dimension: char,
        size: u32,
        max: u32,
    },
    #[error("{bytes} bytes of workgroup storage exceeds the maximum of {max}")]
    WorkgroupStorage { bytes: u32, max: u32 },
    #[error("vector size {vector_size} is not a multiple of the {chunk} values one workgroup consumes")]
    NotDivisible { vector_size: u32, chunk: u64 },
    #[error("{count} workgroups exceeds the maximum of {max} per dimension")]
    TooManyWorkgroups { count: u32, max: u32 },
    #[error("a {bytes} byte buffer exceeds the storage binding limit of {max}")]
    BufferTooLarge { bytes: u64, max: u64 },
    #[error("input length {len} does not match vector size {vector_size}")]
    InputLength { len: usize, vector_size: u32 },
    #[error("input total {total} does not fit the 30-bit aggregate")]
    SumOverflow { total: u64 },
    #[error("unknown value {value:?} for `{arg}`")]
    UnknownValue { arg: &'static str, value: String },
    #[error("configuration is missing `{0}`")]
    MissingArg(&'static str),
    #[error("the device does not support subgroup operations")]
    SubgroupsUnsupported,
}

/// How input elements are loaded from global memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    U32,
    Vec2,
    Vec4,
}

impl ElementType {
    pub const ALL: [Self; 3] = [Self::U32, Self::Vec2, Self::Vec4];

    /// Number of `u32` values in one element.
    pub fn lanes(self) -> u32 {
        match self {
            Self::U32 => 1,
            Self::Vec2 => 2,
            Self::Vec4 => 4,
        }
    }

    pub fn wgsl_type(self) -> &'static str {
        match self {
            Self::U32 => "u32",
            Self::Vec2 => "vec2<u32>",
            Self::Vec4 => "vec4<u32>",
        }
    }

    /// Loads a thread's batch into `values`, scanning as it goes, and leaves
    /// the thread total in `running`.
    fn mem_load(self) -> &'static str {
        match self {
            Self::U32 => {
                "
    for (var i = 0u; i < BATCH_SIZE; i = i + 1u) {
        running += input[my_id + i];
        values[i] = running;
    }"
            }
            Self::Vec2 => {
                "
    for (var i = 0u; i < BATCH_SIZE; i = i + 1u) {
        var v = input[my_id + i];
        v.x += running;
        v.y += v.x;
        running = v.y;
        values[i] = v;
    }"
            }
            Self::Vec4 => {
                "
    for (var i = 0u; i < BATCH_SIZE; i = i + 1u) {
        var v = input[my_id + i];
        v.x += running;
        v.y += v.x;
        v.z += v.y;
        v.w += v.z;
        running = v.w;
        values[i] = v;
    }"
            }
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::U32 => "u32",
            Self::Vec2 => "vec2",
            Self::Vec4 => "vec4",
        })
    }
}

impl FromStr for ElementType {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "u32" => Ok(Self::U32),
            "vec2" => Ok(Self::Vec2),
            "vec4" => Ok(Self::Vec4),
            _ => Err(ParamsError::UnknownValue {
                arg: "elementType",
                value: s.to_owned(),
            }),
        }
    }
}

/// In-workgroup scan over the per-thread totals in `scratch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// `log2(n)` steps, every thread active in each.
    HillisSteele,
    /// Up-sweep then down-sweep; half the work, twice the steps.
    BrentKung,
    /// One subgroup rakes the whole block serially, then combines the rake
    /// totals with a subgroup scan.
    SubgroupRaking,
}

impl Reduction {
    pub const ALL: [Self; 3] = [Self::HillisSteele, Self::BrentKung, Self::SubgroupRaking];

    pub fn uses_subgroups(self) -> bool {
        matches!(self, Self::SubgroupRaking)
    }

    fn wgsl(self) -> &'static str {
        match self {
            Self::HillisSteele => {
                "
    for (var offset = 1u; offset < BLOCK_SIZE; offset = offset * 2u) {
        var addend = 0u;
        if (local_index >= offset) {
            addend = scratch[local_index - offset];
        }
        workgroupBarrier();
        scratch[local_index] += addend;
        workgroupBarrier();
    }"
            }
            Self::BrentKung => {
                "
    for (var stride = 1u; stride < BLOCK_SIZE; stride = stride * 2u) {
        let index = (local_index + 1u) * stride * 2u - 1u;
        if (index < BLOCK_SIZE) {
            scratch[index] += scratch[index - stride];
        }
        workgroupBarrier();
    }
    for (var stride = BLOCK_SIZE / 4u; stride > 0u; stride = stride / 2u) {
        let index = (local_index + 1u) * stride * 2u - 1u;
        if (index + stride < BLOCK_SIZE) {
            scratch[index + stride] += scratch[index];
        }
        workgroupBarrier();
    }"
            }
            // Only the subgroup holding invocation 0 rakes. Its active lanes
            // are a power of two no larger than the block.
            Self::SubgroupRaking => {
                "
    {
        let lanes = subgroupAdd(1u);
        if (subgroupMin(local_index) == 0u) {
            let rake_size = BLOCK_SIZE / lanes;
            let start = subgroup_invocation_id * rake_size;
            for (var i = start + 1u; i < start + rake_size; i = i + 1u) {
                scratch[i] += scratch[i - 1u];
            }
            let rake_prefix = subgroupExclusiveAdd(scratch[start + rake_size - 1u]);
            for (var i = start; i < start + rake_size; i = i + 1u) {
                scratch[i] += rake_prefix;
            }
        }
        workgroupBarrier();
    }"
            }
        }
    }
}

impl fmt::Display for Reduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::HillisSteele => "hillis_steele",
            Self::BrentKung => "brent_kung",
            Self::SubgroupRaking => "subgroup_raking",
        })
    }
}

impl FromStr for Reduction {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hillis_steele" => Ok(Self::HillisSteele),
            "brent_kung" => Ok(Self::BrentKung),
            "subgroup_raking" => Ok(Self::SubgroupRaking),
            _ => Err(ParamsError::UnknownValue {
                arg: "workgroupReduction",
                value: s.to_owned(),
            }),
        }
    }
}

/// How a workgroup collects the totals of the partitions before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookback {
    /// Invocation 0 walks back one partition at a time.
    Serial,
    /// Every lane of one subgroup reads a different partition per step.
    Subgroup,
}

impl Lookback {
    pub const ALL: [Self; 2] = [Self::Subgroup, Self::Serial];

    pub fn uses_subgroups(self) -> bool {
        matches!(self, Self::Subgroup)
    }

    fn wgsl(self) -> &'static str {
        match self {
            Self::Serial => {
                "
    if (part_id != 0u && local_index == 0u) {
        var lookback_id = i32(part_id) - 1i;
        var prefix = 0u;
        loop {
            if (lookback_id < 0i) {
                break;
            }
            let state = atomicLoad(&prefix_states[lookback_id]);
            let flag = state >> FLAG_SHIFT;
            if (flag == FLAG_PREFIX) {
                prefix += state & VALUE_MASK;
                break;
            }
            if (flag == FLAG_AGGREGATE) {
                prefix += state & VALUE_MASK;
                lookback_id -= 1i;
            }
        }
        exclusive_prefix = prefix;
        let inclusive = (prefix + scratch[BLOCK_SIZE - 1u]) & VALUE_MASK;
        atomicStore(&prefix_states[part_id], (FLAG_PREFIX << FLAG_SHIFT) | inclusive);
    }"
            }
            // Lane `k` of `n` reads partition `part_id - n + k`. Out of range
            // lanes act as an empty inclusive prefix so the walk stops there.
            Self::Subgroup => {
                "
    {
        let lanes = subgroupAdd(1u);
        if (part_id != 0u && subgroupMin(local_index) == 0u) {
            var lookback_id = i32(part_id) - i32(lanes - subgroup_invocation_id);
            var prefix = 0u;
            loop {
                var flag = FLAG_PREFIX;
                var value = 0u;
                if (lookback_id >= 0i) {
                    let state = atomicLoad(&prefix_states[lookback_id]);
                    flag = state >> FLAG_SHIFT;
                    value = state & VALUE_MASK;
                }
                if (!subgroupAll(flag != 0u)) {
                    continue;
                }
                if (subgroupAny(flag == FLAG_PREFIX)) {
                    let last_prefix = subgroupMax(select(0u, subgroup_invocation_id, flag == FLAG_PREFIX));
                    var contribution = 0u;
                    if (subgroup_invocation_id >= last_prefix) {
                        contribution = value;
                    }
                    prefix += subgroupAdd(contribution);
                    break;
                }
                prefix += subgroupAdd(value);
                lookback_id -= i32(lanes);
            }
            if (local_index == 0u) {
                exclusive_prefix = prefix;
                let inclusive = (prefix + scratch[BLOCK_SIZE - 1u]) & VALUE_MASK;
                atomicStore(&prefix_states[part_id], (FLAG_PREFIX << FLAG_SHIFT) | inclusive);
            }
        }
    }"
            }
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serial => "serial",
            Self::Subgroup => "subgroup",
        })
    }
}

impl FromStr for Lookback {
    type Err = ParamsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(Self::Serial),
            "subgroup" => Ok(Self::Subgroup),
            _ => Err(ParamsError::UnknownValue {
                arg: "lookBackType",
                value: s.to_owned(),
            }),
        }
    }
}

const SUBGROUP_BUILTINS: &str = "
    @builtin(subgroup_size) subgroup_size: u32,
    @builtin(subgroup_invocation_id) subgroup_invocation_id: u32,";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PrefixSumParams {
    /// Number of `u32` values to scan.
    pub vector_size: u32,
    pub element: ElementType,
    pub workgroup_size_x: u32,
    pub workgroup_size_y: u32,
    /// Elements scanned by each thread.
    pub batch_size: u32,
    pub reduction: Reduction,
    pub lookback: Lookback,
}

impl PrefixSumParams {
    pub fn new(vector_size: u32) -> Self {
        Self {
            vector_size,
            element: ElementType::U32,
            workgroup_size_x: 64,
            workgroup_size_y: 1,
            batch_size: 1,
            reduction: Reduction::HillisSteele,
            lookback: Lookback::Serial,
        }
    }

    /// Builds parameters from one point of [`tuning_space`].
    pub fn from_configuration(
        vector_size: u32,
        config: &Configuration,
    ) -> Result<Self, ParamsError> {
        fn get<'a>(config: &'a Configuration, arg: &'static str) -> Result<&'a str, ParamsError> {
            config
                .get(arg)
                .map(String::as_str)
                .ok_or(ParamsError::MissingArg(arg))
        }
        fn number(config: &Configuration, arg: &'static str) -> Result<u32, ParamsError> {
            let value = get(config, arg)?;
            value.parse().map_err(|_| ParamsError::UnknownValue {
                arg,
                value: value.to_owned(),
            })
        }

        Ok(Self {
            vector_size,
            element: get(config, "elementType")?.parse()?,
            workgroup_size_x: number(config, "workgroupSizeX")?,
            workgroup_size_y: number(config, "workgroupSizeY")?,
            batch_size: number(config, "batchSize")?,
            reduction: get(config, "workgroupReduction")?.parse()?,
            lookback: get(config, "lookBackType")?.parse()?,
        })
    }

    pub fn uses_subgroups(&self) -> bool {
        self.reduction.uses_subgroups() || self.lookback.uses_subgroups()
    }

    /// Checks that the device exposes every feature these parameters need.
    pub fn check_features(&self, features: wgpu::Features) -> Result<(), ParamsError> {
        if self.uses_subgroups() && !features.contains(wgpu::Features::SUBGROUP) {
            return Err(ParamsError::SubgroupsUnsupported);
        }
        Ok(())
    }

    pub fn block_size(&self) -> u32 {
        self.workgroup_size_x * self.workgroup_size_y
    }

    /// Number of `vec`/`u32` elements in the input and output buffers.
    pub fn element_count(&self) -> u32 {
        self.vector_size / self.element.lanes()
    }

    /// `u32` values consumed by one workgroup.
    fn chunk(&self) -> u64 {
        u64::from(self.element.lanes())
            * u64::from(self.workgroup_size_x)
            * u64::from(self.workgroup_size_y)
            * u64::from(self.batch_size)
    }

    pub fn buffer_size(&self) -> u64 {
        u64::from(self.vector_size) * 4
    }

    /// Workgroups to dispatch along x and y.
    ///
    /// Only meaningful for parameters that passed [`validate`](Self::validate).
    pub fn num_workgroups(&self) -> (u32, u32) {
        let chunk = self.chunk().max(1);
        ((u64::from(self.vector_size) / chunk) as u32, 1)
    }

    pub fn validate(&self, limits: &wgpu::Limits) -> Result<(), ParamsError> {
        if self.vector_size == 0 {
            return Err(ParamsError::EmptyVector);
        }
        if self.batch_size == 0 {
            return Err(ParamsError::EmptyBatch);
        }
        let (x, y) = (self.workgroup_size_x, self.workgroup_size_y);
        if !x.is_power_of_two() || !y.is_power_of_two() {
            return Err(ParamsError::WorkgroupSizeNotPowerOfTwo(x, y));
        }
        if x > limits.max_compute_workgroup_size_x {
            return Err(ParamsError::WorkgroupDimension {
                dimension: 'x',
                size: x,
                max: limits.max_compute_workgroup_size_x,
            });
        }
        if y > limits.max_compute_workgroup_size_y {
            return Err(ParamsError::WorkgroupDimension {
                dimension: 'y',
                size: y,
                max: limits.max_compute_workgroup_size_y,
            });
        }
        let max_invocations = MAX_INVOCATIONS.min(limits.max_compute_invocations_per_workgroup);
        let invocations = u64::from(x) * u64::from(y);
        if invocations > u64::from(max_invocations) {
            return Err(ParamsError::TooManyInvocations {
                invocations: invocations.min(u64::from(u32::MAX)) as u32,
                max: max_invocations,
            });
        }
        // `scratch` plus the two broadcast words.
        let storage = self.block_size() * 4 + 8;
        if storage > limits.max_compute_workgroup_storage_size {
            return Err(ParamsError::WorkgroupStorage {
                bytes: storage,
                max: limits.max_compute_workgroup_storage_size,
            });
        }

        let chunk = self.chunk();
        if u64::from(self.vector_size) % chunk != 0 {
            return Err(ParamsError::NotDivisible {
                vector_size: self.vector_size,
                chunk,
            });
        }
        let (count, _) = self.num_workgroups();
        if count > limits.max_compute_workgroups_per_dimension {
            return Err(ParamsError::TooManyWorkgroups {
                count,
                max: limits.max_compute_workgroups_per_dimension,
            });
        }

        let bytes = self.buffer_size();
        let max = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        if bytes > max {
            return Err(ParamsError::BufferTooLarge { bytes, max });
        }

        Ok(())
    }

    /// Checks that `input` can be scanned by these parameters.
    pub fn validate_input(&self, input: &[u32]) -> Result<(), ParamsError> {
        if input.len() != self.vector_size as usize {
            return Err(ParamsError::InputLength {
                len: input.len(),
                vector_size: self.vector_size,
            });
        }
        let total: u64 = input.iter().map(|&v| u64::from(v)).sum();
        if total >= MAX_TOTAL {
            return Err(ParamsError::SumOverflow { total });
        }
        Ok(())
    }

    pub fn shader_source(&self) -> Result<String, TemplateError> {
        let values: BTreeMap<&str, String> = [
            ("blockSize", self.block_size().to_string()),
            ("batchSize", self.batch_size.to_string()),
            ("workgroupSizeX", self.workgroup_size_x.to_string()),
            ("workgroupSizeY", self.workgroup_size_y.to_string()),
            ("elementType", self.element.wgsl_type().to_owned()),
            ("memLoad", self.element.mem_load().to_owned()),
            ("workgroupReduction", self.reduction.wgsl().to_owned()),
            ("lookBack", self.lookback.wgsl().to_owned()),
            (
                "subgroupBuiltins",
                if self.uses_subgroups() {
                    SUBGROUP_BUILTINS.to_owned()
                } else {
                    String::new()
                },
            ),
        ]
        .into_iter()
        .collect();

        template::interpolate(SHADER_TEMPLATE, &values)
    }
}

impl fmt::Display for PrefixSumParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} {} wg={}x{} batch={} {} lookback={}",
            self.vector_size,
            self.element,
            self.workgroup_size_x,
            self.workgroup_size_y,
            self.batch_size,
            self.reduction,
            self.lookback
        )
    }
}

/// Every knob of the kernel, ordered as the tuner walks them.
pub fn tuning_space() -> TuningSpace {
    TuningSpace::new(vec![
        TuningArg::new(
            "workgroupSizeY",
            WORKGROUP_SIZES_Y,
            "Workgroup size in Y dim",
            0,
        ),
        TuningArg::new(
            "workgroupSizeX",
            WORKGROUP_SIZES_X,
            "Workgroup size in X dim",
            1,
        ),
        TuningArg::new(
            "elementType",
            ElementType::ALL,
            "Type of element loaded from global memory",
            2,
        ),
        TuningArg::new(
            "workgroupReduction",
            Reduction::ALL,
            "Workgroup reduction strategy",
            3,
        ),
        TuningArg::new(
            "lookBackType",
            Lookback::ALL,
            "Decoupled lookback strategy",
            4,
        ),
        TuningArg::new(
            "batchSize",
            BATCH_SIZES,
            "Number of elements from global memory per thread",
            5,
        ),
    ])
}

/// Inclusive prefix sum on the CPU, wrapping on overflow.
pub fn cpu_reference(input: &[u32]) -> Vec<u32> {
    input
        .iter()
        .scan(0u32, |acc, &v| {
            *acc = acc.wrapping_add(v);
            Some(*acc)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(vector_size: u32, element: ElementType, x: u32, batch: u32) -> PrefixSumParams {
        PrefixSumParams {
            vector_size,
            element,
            workgroup_size_x: x,
            workgroup_size_y: 1,
            batch_size: batch,
            reduction: Reduction::HillisSteele,
            lookback: Lookback::Serial,
        }
    }

    #[test]
    fn reference_is_inclusive() {
        assert_eq!(cpu_reference(&[1, 2, 3, 4]), [1, 3, 6, 10]);
        assert_eq!(cpu_reference(&[5]), [5]);
        assert!(cpu_reference(&[]).is_empty());
    }

    #[test]
    fn reference_wraps() {
        assert_eq!(cpu_reference(&[u32::MAX, 2]), [u32::MAX, 1]);
    }

    #[test]
    fn workgroup_count_accounts_for_lanes_and_batch() {
        let limits = wgpu::Limits::default();

        let p = params(1 << 10, ElementType::U32, 32, 1);
        p.validate(&limits).unwrap();
        assert_eq!(p.num_workgroups(), (32, 1));

        let p = params(1 << 14, ElementType::Vec4, 64, 2);
        p.validate(&limits).unwrap();
        assert_eq!(p.num_workgroups(), (32, 1));
        assert_eq!(p.element_count(), 1 << 12);
    }

    #[test]
    fn rejects_partial_workgroups() {
        let err = params(1000, ElementType::U32, 32, 1)
            .validate(&wgpu::Limits::default())
            .unwrap_err();
        assert_eq!(
            err,
            ParamsError::NotDivisible {
                vector_size: 1000,
                chunk: 32
            }
        );
    }

    #[test]
    fn rejects_oversized_workgroups() {
        let mut p = params(1 << 12, ElementType::U32, 256, 1);
        p.workgroup_size_y = 2;
        let err = p.validate(&wgpu::Limits::default()).unwrap_err();
        assert_eq!(
            err,
            ParamsError::TooManyInvocations {
                invocations: 512,
                max: 256
            }
        );

        let err = params(1 << 12, ElementType::U32, 48, 1)
            .validate(&wgpu::Limits::default())
            .unwrap_err();
        assert_eq!(err, ParamsError::WorkgroupSizeNotPowerOfTwo(48, 1));
    }

    #[test]
    fn rejects_too_many_workgroups() {
        let err = params(1 << 25, ElementType::U32, 32, 1)
            .validate(&wgpu::Limits::default())
            .unwrap_err();
        assert_eq!(
            err,
            ParamsError::TooManyWorkgroups {
                count: 1 << 20,
                max: 65535
            }
        );
    }

    #[test]
    fn respects_device_invocation_limit() {
        let limits = wgpu::Limits {
            max_compute_invocations_per_workgroup: 128,
            ..wgpu::Limits::default()
        };
        let err = params(1 << 12, ElementType::U32, 256, 1)
            .validate(&limits)
            .unwrap_err();
        assert_eq!(
            err,
            ParamsError::TooManyInvocations {
                invocations: 256,
                max: 128
            }
        );
    }

    #[test]
    fn input_total_must_fit_aggregate() {
        let p = params(4, ElementType::U32, 1, 1);
        p.validate_input(&[1, 2, 3, 4]).unwrap();

        let err = p.validate_input(&[1 << 29, 1 << 29, 0, 0]).unwrap_err();
        assert_eq!(err, ParamsError::SumOverflow { total: 1 << 30 });

        let err = p.validate_input(&[1, 2]).unwrap_err();
        assert_eq!(
            err,
            ParamsError::InputLength {
                len: 2,
                vector_size: 4
            }
        );
    }

    #[test]
    fn configuration_round_trips_through_params() {
        let space = tuning_space();
        assert_eq!(space.len(), 4 * 3 * 3 * 2 * 4);

        for config in space.configurations() {
            let p = PrefixSumParams::from_configuration(1 << 16, &config).unwrap();
            assert_eq!(p.workgroup_size_x.to_string(), config["workgroupSizeX"]);
            assert_eq!(p.element.to_string(), config["elementType"]);
            assert_eq!(p.reduction.to_string(), config["workgroupReduction"]);
            assert_eq!(p.batch_size.to_string(), config["batchSize"]);
            assert_eq!(p.lookback.to_string(), config["lookBackType"]);
        }
    }

    #[test]
    fn configuration_errors() {
        let mut config = tuning_space().configurations().remove(0);
        config.insert("elementType", "vec3".to_owned());
        assert_eq!(
            PrefixSumParams::from_configuration(64, &config).unwrap_err(),
            ParamsError::UnknownValue {
                arg: "elementType",
                value: "vec3".to_owned()
            }
        );

        config.remove("batchSize");
        config.insert("elementType", "u32".to_owned());
        assert_eq!(
            PrefixSumParams::from_configuration(64, &config).unwrap_err(),
            ParamsError::MissingArg("batchSize")
        );
    }

    #[test]
    fn shader_is_fully_interpolated() {
        let p = PrefixSumParams {
            reduction: Reduction::BrentKung,
            ..params(1 << 12, ElementType::Vec2, 128, 4)
        };
        let source = p.shader_source().unwrap();
        assert!(!source.contains("{{"));
        assert!(source.contains("@workgroup_size(128, 1)"));
        assert!(source.contains("array<vec2<u32>, 4>"));
        assert!(source.contains("var<workgroup> scratch: array<u32, 128>;"));
        assert!(source.contains(&format!("fn {ENTRY_POINT}(")));
        assert!(source.contains("var<storage, read_write> partition_counter: atomic<u32>;"));
        assert!(!source.contains("subgroup"));
    }

    #[test]
    fn subgroup_variants_need_the_feature() {
        let portable = params(1 << 12, ElementType::U32, 64, 1);
        portable.check_features(wgpu::Features::empty()).unwrap();

        for p in [
            PrefixSumParams {
                reduction: Reduction::SubgroupRaking,
                ..portable
            },
            PrefixSumParams {
                lookback: Lookback::Subgroup,
                ..portable
            },
        ] {
            assert!(p.uses_subgroups());
            assert_eq!(
                p.check_features(wgpu::Features::TIMESTAMP_QUERY),
                Err(ParamsError::SubgroupsUnsupported)
            );
            p.check_features(wgpu::Features::SUBGROUP).unwrap();

            let source = p.shader_source().unwrap();
            assert!(source.contains("@builtin(subgroup_invocation_id)"));
            assert!(source.contains("subgroupAdd(1u)"));
        }
    }

    #[test]
    fn lookback_names_round_trip() {
        for lookback in Lookback::ALL {
            assert_eq!(lookback.to_string().parse::<Lookback>(), Ok(lookback));
        }
        assert_eq!(
            "parallel".parse::<Lookback>(),
            Err(ParamsError::UnknownValue {
                arg: "lookBackType",
                value: "parallel".to_owned()
            })
        );
    }
}
