use approx::assert_relative_eq;
use kornia_3d::{
    pointcloud::PointCloud,
    transforms::{angular_distance, EuclideanTransform},
};
use kornia_icp::{
    icp_vanilla, DefaultTransformationCheckerFactory, ICPConvergenceCriteria, Icp, IcpConfig,
    IcpError, IcpState, KnownCorrespondenceMatcherFactory, MinimizerType, NullOutlierFilter,
    PointToPlaneErrorMinimizer, SurfaceNormalParams,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// three orthogonal 2x2 patches meeting at the origin
fn corner_scene() -> PointCloud {
    let mut points = Vec::new();
    for a in 0..20 {
        for b in 0..20 {
            let u = 0.05 + 0.1 * a as f64;
            let v = 0.05 + 0.1 * b as f64;
            points.push([u, v, 0.0]);
            points.push([u, 0.0, v]);
            points.push([0.0, u, v]);
        }
    }
    PointCloud::from_points(points)
}

fn tight_criteria() -> ICPConvergenceCriteria {
    ICPConvergenceCriteria {
        min_diff_rot_err: 1e-6,
        min_diff_trans_err: 1e-6,
        ..Default::default()
    }
}

fn assert_transform_eq(a: &EuclideanTransform, b: &EuclideanTransform, epsilon: f64) {
    assert_relative_eq!(angular_distance(&a.rotation, &b.rotation), 0.0, epsilon = epsilon);
    assert_relative_eq!((a.translation - b.translation).length(), 0.0, epsilon = epsilon);
}

#[test]
fn point_to_plane_known_correspondences() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();

    let mut rng = StdRng::seed_from_u64(0);
    let num_points = 1000;
    let points = (0..num_points)
        .map(|_| [(); 3].map(|_| 100.0 * rng.random::<f64>() - 50.0))
        .collect::<Vec<_>>();
    let normals = (0..num_points)
        .map(|_| {
            let n = [(); 3].map(|_| rng.random::<f64>() - 0.5);
            let norm = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            n.map(|v| v / norm)
        })
        .collect::<Vec<_>>();
    let reference = PointCloud::new(points, Some(normals))?;

    let t = EuclideanTransform::from_axis_angle([0.4, -1.0, 0.2], 0.3, [2.0, -1.0, 3.0]);
    let reading = PointCloud::from_points(reference.transformed(&t.inverse())?.into_parts().0);

    let mut icp = Icp::new(
        Box::new(KnownCorrespondenceMatcherFactory),
        Box::new(NullOutlierFilter),
        Box::new(PointToPlaneErrorMinimizer),
        Box::new(DefaultTransformationCheckerFactory::new(tight_criteria())),
        100,
    );
    let result = icp.compute(&reading, &reference, EuclideanTransform::IDENTITY)?;

    assert!(result.converged);
    assert_transform_eq(&result.transform, &t, 1e-3);
    Ok(())
}

#[test]
fn point_to_plane_with_estimated_normals() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();

    let reference = corner_scene();
    let t = EuclideanTransform::from_axis_angle([1.0, 2.0, 3.0], 0.02, [0.03, -0.02, 0.04]);
    let reading = reference.transformed(&t.inverse())?;

    let config = IcpConfig {
        reference_normals: Some(SurfaceNormalParams {
            ratio: 1.0,
            ..Default::default()
        }),
        convergence: tight_criteria(),
        ..Default::default()
    };
    let mut icp = Icp::from_config(&config, 7)?;
    let result = icp.compute(&reading, &reference, EuclideanTransform::IDENTITY)?;

    assert!(result.converged);
    assert_eq!(icp.state(), IcpState::Converged);
    assert_transform_eq(&result.transform, &t, 5e-3);

    Ok(())
}

#[test]
fn point_to_point_with_reading_sampling() -> Result<(), Box<dyn std::error::Error>> {
    init_logger();

    let mut rng = StdRng::seed_from_u64(3);
    let points = (0..2000)
        .map(|_| [rng.random::<f64>(), rng.random::<f64>(), rng.random::<f64>()])
        .collect::<Vec<_>>();
    let reference = PointCloud::from_points(points);
    let t = EuclideanTransform::from_axis_angle([0.0, 1.0, 1.0], 0.02, [0.02, 0.0, -0.01]);
    let reading = reference.transformed(&t.inverse())?;

    let config = IcpConfig {
        reading_sampling_prob: Some(0.75),
        reference_normals: None,
        minimizer: MinimizerType::PointToPoint,
        convergence: tight_criteria(),
        ..Default::default()
    };
    let mut icp = Icp::from_config(&config, 11)?;
    let result = icp.compute(&reading, &reference, EuclideanTransform::IDENTITY)?;

    assert!(result.num_iterations <= config.max_iterations);
    assert_transform_eq(&result.transform, &t, 5e-3);

    Ok(())
}

#[test]
fn initial_guess_is_refined() -> Result<(), Box<dyn std::error::Error>> {
    let reference = corner_scene();
    let t = EuclideanTransform::from_axis_angle([0.0, 0.0, 1.0], 0.3, [0.5, 0.2, 0.0]);
    let reading = reference.transformed(&t.inverse())?;

    // a guess close to the truth, the remaining offset is well below the point spacing
    let initial = EuclideanTransform::from_axis_angle([0.0, 0.0, 1.0], 0.29, [0.51, 0.2, 0.0]);
    let result = icp_vanilla(&reading, &reference, initial, tight_criteria())?;

    assert_transform_eq(&result.transform, &t, 5e-3);
    Ok(())
}

#[test]
fn config_from_json() -> Result<(), Box<dyn std::error::Error>> {
    let config: IcpConfig = serde_json::from_str(
        r#"{
            "reference_normals": null,
            "matcher": { "knn": 3, "search_type": "BruteForce" },
            "convergence": { "smooth_length": 5 }
        }"#,
    )?;

    assert!(config.reference_normals.is_none());
    assert_eq!(config.matcher.knn, 3);
    assert_eq!(config.matcher.bucket_size, 8);
    assert_eq!(config.convergence.smooth_length, 5);
    assert_eq!(config.convergence.max_iterations, 100);
    assert_eq!(config.minimizer, MinimizerType::PointToPlane);

    let icp = Icp::from_config(&config, 0)?;
    assert!(icp.reference_filters.is_empty());
    Ok(())
}

#[test]
fn empty_target_is_rejected() -> Result<(), Box<dyn std::error::Error>> {
    let source = corner_scene();
    let target = PointCloud::default();

    let res = icp_vanilla(
        &source,
        &target,
        EuclideanTransform::IDENTITY,
        Default::default(),
    );
    assert!(matches!(res, Err(IcpError::Knn(_))));
    Ok(())
}
