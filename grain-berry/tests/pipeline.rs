//! 跨模块流程: 分割 -> 点集文件 -> 点集配准, 体数据配准, 位深转换.

use grain_berry::prelude::*;
use nalgebra::Vector3;
use ndarray::Array3;

fn init_logger() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init();
}

/// 在 `(z, h, w)` 处放一个边长 `edge` 的立方体.
fn put_cube(v: &mut Volume<u8>, (z0, h0, w0): Idx3d, edge: usize) {
    for z in z0..z0 + edge {
        for h in h0..h0 + edge {
            for w in w0..w0 + edge {
                v[(z, h, w)] = 200;
            }
        }
    }
}

fn blob(n: usize, sigma: f64) -> Volume<f32> {
    let c = (n as f64 - 1.0) / 2.0;
    let data = Array3::from_shape_fn((n, n, n), |(z, h, w)| {
        let r2 = (z as f64 - c).powi(2) + (h as f64 - c).powi(2) + (w as f64 - c).powi(2);
        (-r2 / (2.0 * sigma * sigma)).exp() as f32
    });
    Volume::from_array(data, Geometry::default())
}

#[test]
fn segment_then_register_point_sets() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let geometry = Geometry::with_spacing([0.5, 0.5, 1.0]).unwrap();
    let mut v = Volume::<u8>::new((12, 12, 12), geometry);
    put_cube(&mut v, (1, 1, 1), 3);
    put_cube(&mut v, (6, 2, 7), 3);
    put_cube(&mut v, (2, 8, 3), 2);
    v[(10, 10, 10)] = 200;

    let params = SegmentParams {
        reconstruction: Reconstruction::None,
        ..Default::default()
    };
    let segmentation = segment(&v, &params).unwrap();
    assert_eq!(segmentation.len(), 3);
    let sizes: Vec<usize> = segmentation.objects().iter().map(|o| o.size).collect();
    assert_eq!(sizes, vec![27, 8, 27]);
    assert_eq!(segmentation.objects()[0].centroid, [1.0, 1.0, 2.0]);

    let path = dir.path().join("fixed.txt");
    segmentation.centroids::<3>().unwrap().write(&path).unwrap();
    let fixed = PointSet::<3>::read(&path).unwrap();
    assert_eq!(fixed.len(), 3);

    let shift = Vector3::new(5.0, -3.0, 2.0);
    let moving = fixed.translate(&shift);
    let optimizer = RegularStepGradientDescent::new(OptimizerConfig {
        number_of_iterations: 1000,
        ..Default::default()
    })
    .unwrap();
    let initial = initialize_point_sets(&fixed, &moving);
    let result = register_point_sets(&fixed, &moving, &optimizer, initial, |_| {}).unwrap();
    assert!((result.transform.translation() + shift).norm() < 1e-3);

    let back = moving.transform(&result.transform);
    for (p, q) in back.iter().zip(fixed.iter()) {
        assert!((Vector3::from(*p) - Vector3::from(*q)).norm() < 1e-3);
    }
}

#[test]
fn register_shifted_volume() {
    init_logger();
    let fixed = blob(20, 3.0);
    let mut shift = Similarity3d::identity();
    shift.set_translation(Vector3::new(1.0, -0.5, 0.8));
    let moving = resample_like(&fixed, &shift, 0.0);

    let initial = initialize_by_geometric_centers(&fixed, &moving);
    let registration =
        ImageRegistration::new(RegularStepGradientDescent::new(OptimizerConfig::default()).unwrap());
    let result = registration.run(&fixed, &moving, initial, |_| {}).unwrap();

    let expected = Vector3::new(-1.0, 0.5, -0.8);
    assert!(
        (result.transform.translation() - expected).norm() < 0.1,
        "{}",
        result.transform.translation()
    );
    assert!(result.value < 1e-3);
}

#[test]
fn bit_depth_round_trip_through_files() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let data = Array3::from_shape_vec((1, 1, 3), vec![0u8, 128, 255]).unwrap();
    let v = Volume::from_array(data, Geometry::default());

    let wide: Volume<u16> = convert_bit_depth(&v, RescaleMode::FullRange);
    assert_eq!(wide[(0, 0, 0)], 0);
    assert_eq!(wide[(0, 0, 1)], 128 * 257);
    assert_eq!(wide[(0, 0, 2)], 65535);

    let path = dir.path().join("wide.nii.gz");
    write_volume(&path, &wide).unwrap();
    let back: Volume<u16> = read_volume(&path).unwrap();
    assert_eq!(back, wide);

    let narrow: Volume<u8> = convert_bit_depth(&back, RescaleMode::FullRange);
    assert_eq!(narrow, v);
}
