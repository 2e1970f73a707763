use naga::{
    front::wgsl,
    valid::{Capabilities, ShaderStages, SubgroupOperationSet, ValidationFlags, Validator},
};
use webgpu_probe::kernel::{prefix_sum, Lookback, PrefixSumParams, Reduction};

fn validator() -> Validator {
    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .subgroup_stages(ShaderStages::COMPUTE)
        .subgroup_operations(SubgroupOperationSet::all());
    validator
}

#[test]
fn every_prefix_sum_variant_validates() {
    let space = prefix_sum::tuning_space();
    let mut validator = validator();

    for config in space.configurations() {
        let params = PrefixSumParams::from_configuration(1 << 16, &config).unwrap();
        let source = params.shader_source().unwrap();

        let module = wgsl::parse_str(&source)
            .unwrap_or_else(|e| panic!("{params}: {}", e.emit_to_string(&source)));
        if let Err(e) = validator.validate(&module) {
            panic!("{params}: {e:?}\n{source}");
        }
    }
}

#[test]
fn default_kernel_parses_with_its_bindings() {
    let source = PrefixSumParams::new(1 << 12).shader_source().unwrap();
    let module =
        wgsl::parse_str(&source).unwrap_or_else(|e| panic!("{}", e.emit_to_string(&source)));

    let mut bindings: Vec<_> = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| Some((var.binding.as_ref()?.binding, var.name.clone()?)))
        .collect();
    bindings.sort();
    assert_eq!(
        bindings,
        [
            (0, "input".to_owned()),
            (1, "output".to_owned()),
            (2, "prefix_states".to_owned()),
            (3, "partition_counter".to_owned()),
        ]
    );
}

#[test]
fn portable_variants_need_no_subgroup_capability() {
    let mut validator = Validator::new(
        ValidationFlags::all(),
        Capabilities::all() - Capabilities::SUBGROUP,
    );

    for reduction in [Reduction::HillisSteele, Reduction::BrentKung] {
        let params = PrefixSumParams {
            reduction,
            lookback: Lookback::Serial,
            ..PrefixSumParams::new(1 << 12)
        };
        let source = params.shader_source().unwrap();
        let module = wgsl::parse_str(&source).unwrap();
        if let Err(e) = validator.validate(&module) {
            panic!("{params}: {e:?}");
        }
    }
}

#[test]
fn entry_point_is_a_compute_stage() {
    let source = PrefixSumParams::new(1 << 12).shader_source().unwrap();
    let module = wgsl::parse_str(&source).unwrap();

    let entry = module
        .entry_points
        .iter()
        .find(|ep| ep.name == prefix_sum::ENTRY_POINT)
        .expect("prefix sum entry point");
    assert_eq!(entry.stage, naga::ShaderStage::Compute);
    assert_eq!(entry.workgroup_size, [64, 1, 1]);
}
