//! Runs the prefix-sum kernel on whatever adapter is available.

use webgpu_probe::kernel::{
    prefix_sum::cpu_reference, tune, ElementType, Lookback, ParamsError,
    PrefixSumKernel, PrefixSumParams, Reduction, TuneOptions,
};

use crate::common::{initialize_context, test_input};

#[test]
fn matches_cpu_reference() {
    let Some(context) = initialize_context() else {
        return;
    };

    for element in ElementType::ALL {
        for reduction in [Reduction::HillisSteele, Reduction::BrentKung] {
            let params = PrefixSumParams {
                vector_size: 1 << 14,
                element,
                workgroup_size_x: 64,
                workgroup_size_y: 1,
                batch_size: 2,
                reduction,
                lookback: Lookback::Serial,
            };
            let input = test_input(params.vector_size as usize, 7);

            let run = pollster::block_on(async {
                let kernel = PrefixSumKernel::new(&context, params).await?;
                kernel.run(&context, &input).await
            })
            .unwrap();

            assert_eq!(run.workgroups, params.num_workgroups());
            assert!(run.elapsed_ns.is_finite() && run.elapsed_ns >= 0.0, "{params}");
            assert_eq!(run.first_mismatch(&cpu_reference(&input)), None, "{params}");
        }
    }
}

#[test]
fn subgroup_variants_match_cpu_reference() {
    let Some(context) = initialize_context() else {
        return;
    };
    if !context.subgroups_supported() {
        eprintln!("Skipping subgroup test: adapter lacks subgroup support");
        return;
    }

    for (reduction, lookback) in [
        (Reduction::SubgroupRaking, Lookback::Serial),
        (Reduction::HillisSteele, Lookback::Subgroup),
        (Reduction::SubgroupRaking, Lookback::Subgroup),
    ] {
        for workgroup_size_x in [32, 256] {
            let params = PrefixSumParams {
                workgroup_size_x,
                reduction,
                lookback,
                ..PrefixSumParams::new(1 << 16)
            };
            let input = test_input(params.vector_size as usize, 11);

            let run = pollster::block_on(async {
                let kernel = PrefixSumKernel::new(&context, params).await?;
                kernel.run(&context, &input).await
            })
            .unwrap();

            assert_eq!(run.first_mismatch(&cpu_reference(&input)), None, "{params}");
        }
    }
}

#[test]
fn subgroup_variant_is_refused_without_the_feature() {
    let Some(context) = initialize_context() else {
        return;
    };
    if context.subgroups_supported() {
        return;
    }

    let params = PrefixSumParams {
        lookback: Lookback::Subgroup,
        ..PrefixSumParams::new(1 << 12)
    };
    let err = pollster::block_on(PrefixSumKernel::new(&context, params))
        .err()
        .unwrap();
    assert!(
        matches!(
            err,
            webgpu_probe::Error::InvalidParams(ParamsError::SubgroupsUnsupported)
        ),
        "{err}"
    );
}

#[test]
fn lookback_spans_many_partitions() {
    let Some(context) = initialize_context() else {
        return;
    };

    let params = PrefixSumParams {
        workgroup_size_x: 32,
        ..PrefixSumParams::new(1 << 16)
    };
    let input = test_input(params.vector_size as usize, 42);

    let run = pollster::block_on(async {
        let kernel = PrefixSumKernel::new(&context, params).await?;
        kernel.run(&context, &input).await
    })
    .unwrap();

    assert_eq!(run.workgroups, (2048, 1));
    assert_eq!(run.output, cpu_reference(&input));
}

#[test]
fn kernel_can_be_reused() {
    let Some(context) = initialize_context() else {
        return;
    };

    let params = PrefixSumParams::new(1 << 12);
    pollster::block_on(async {
        let kernel = PrefixSumKernel::new(&context, params).await.unwrap();
        for seed in 0..3 {
            let input = test_input(params.vector_size as usize, seed);
            let run = kernel.run(&context, &input).await.unwrap();
            assert_eq!(run.output, cpu_reference(&input), "seed {seed}");
        }
    });
}

#[test]
fn rejects_input_that_overflows_the_aggregate() {
    let Some(context) = initialize_context() else {
        return;
    };

    let params = PrefixSumParams::new(1 << 10);
    let input = vec![1 << 21; params.vector_size as usize];
    let err = pollster::block_on(async {
        let kernel = PrefixSumKernel::new(&context, params).await?;
        kernel.run(&context, &input).await
    })
    .unwrap_err();
    assert!(matches!(err, webgpu_probe::Error::InvalidParams(_)), "{err}");
}

#[test]
fn tuning_small_sizes_verifies() {
    let Some(context) = initialize_context() else {
        return;
    };

    let options = TuneOptions {
        vector_sizes: vec![1 << 12],
        check: true,
        fill: 1,
    };
    let records = pollster::block_on(tune(&context, &options)).unwrap();

    assert!(!records.is_empty());
    assert_eq!(
        records.iter().any(|record| record.lookback == Lookback::Subgroup),
        context.subgroups_supported()
    );
    for record in &records {
        assert_eq!(record.vector_size, 1 << 12);
        assert_eq!(record.verified, Some(true), "{record:?}");
    }
}

#[test]
fn tuning_a_size_nothing_can_run_is_an_error() {
    let Some(context) = initialize_context() else {
        return;
    };

    let options = TuneOptions {
        vector_sizes: vec![1000],
        check: false,
        fill: 1,
    };
    let err = pollster::block_on(tune(&context, &options)).unwrap_err();
    assert!(
        matches!(err, webgpu_probe::Error::NoRunnableVariant { vector_size: 1000 }),
        "{err}"
    );
}
