#![allow(clippy::uninlined_format_args, clippy::cast_precision_loss)]
use std::collections::HashMap;

use approx::assert_abs_diff_eq;
use tpcreco_fit::{
    fit_circle_taubin, ClusterKey, ClusterPoint, FitError, FitterConfig, TrackCandidate,
    TrackSeedFitter,
};

// Clusters on a circle in x-y, on a straight line in r-z.
fn helix_clusters(radius: f64, x0: f64, y0: f64, angles: &[f64], slope: f64, z0: f64) -> Vec<ClusterPoint> {
    angles
        .iter()
        .enumerate()
        .map(|(i, &t)| {
            let x = x0 + radius * t.cos();
            let y = y0 + radius * t.sin();
            let r = x.hypot(y);
            ClusterPoint::new(10 + i as u32, x, y, slope * r + z0)
        })
        .collect()
}

fn store_track(points: &[ClusterPoint], momentum: [f64; 3]) -> (TrackCandidate, HashMap<ClusterKey, ClusterPoint>) {
    let mut store = HashMap::new();
    let mut keys = Vec::new();
    for (i, point) in points.iter().enumerate() {
        let key = ClusterKey(1000 + i as u64);
        store.insert(key, *point);
        keys.push(key);
    }
    (TrackCandidate::new(1, keys, momentum, 1), store)
}

#[test]
fn test_scenario_known_circle() {
    let points = helix_clusters(50.0, 10.0, 0.0, &[0.3, 0.6, 0.9, 1.2, 1.5], 0.5, 3.0);
    let xy: Vec<(f64, f64)> = points.iter().map(|p| (p.x, p.y)).collect();
    let circle = fit_circle_taubin(&xy);
    assert_abs_diff_eq!(circle.radius, 50.0, epsilon = 1e-6);
    assert_abs_diff_eq!(circle.x0, 10.0, epsilon = 1e-6);
    assert_abs_diff_eq!(circle.y0, 0.0, epsilon = 1e-6);
}

#[test]
fn test_fit_track_updates_position_and_momentum() {
    let points = helix_clusters(50.0, 10.0, 0.0, &[3.0, 2.9, 2.8, 2.7, 2.6], 0.5, 3.0);
    let (mut track, store) = store_track(&points, [0.0, 1.2, 0.0]);
    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));

    let fit = fitter.fit_track(&mut track, &store).unwrap();

    assert_abs_diff_eq!(fit.circle.radius, 50.0, epsilon = 1e-6);
    assert_abs_diff_eq!(fit.line.a, 0.5, epsilon = 1e-9);
    assert_abs_diff_eq!(fit.line.b, 3.0, epsilon = 1e-7);
    assert_eq!(fit.n_clusters, 5);
    assert_eq!(fit.n_layers, 5);

    // DCA of a circle centred at (10, 0) with R = 50 is (-40, 0).
    assert_abs_diff_eq!(track.position[0], -40.0, epsilon = 1e-6);
    assert_abs_diff_eq!(track.position[1], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(track.position[2], 3.0, epsilon = 1e-7);

    // pT is kept; direction is tangent at the DCA, i.e. along ±y.
    assert_abs_diff_eq!(track.pt(), 1.2, epsilon = 1e-9);
    assert_abs_diff_eq!(track.momentum[0], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(track.momentum[2], 1.2 * 0.5, epsilon = 1e-9);
}

#[test]
fn test_reversed_order_flips_direction() {
    let angles = [0.3, 0.45, 0.6, 0.75, 0.9];
    let points = helix_clusters(80.0, 30.0, 40.0, &angles, -0.2, 1.0);
    let mut reversed = points.clone();
    reversed.reverse();

    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));
    let forward = fitter.fit_points(&points, 2.0).unwrap();
    let backward = fitter.fit_points(&reversed, 2.0).unwrap();

    assert_abs_diff_eq!(forward.momentum[0], -backward.momentum[0], epsilon = 1e-9);
    assert_abs_diff_eq!(forward.momentum[1], -backward.momentum[1], epsilon = 1e-9);
    assert_abs_diff_eq!(forward.dca.0, backward.dca.0, epsilon = 1e-9);
    assert_abs_diff_eq!(forward.dca.1, backward.dca.1, epsilon = 1e-9);
}

#[test]
fn test_too_few_clusters_leaves_track_untouched() {
    let points = helix_clusters(50.0, 10.0, 0.0, &[0.3, 0.6], 0.5, 3.0);
    let (mut track, store) = store_track(&points, [1.0, 1.0, 0.5]);
    track.position = [1.0, 2.0, 3.0];
    let before = track.clone();

    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));
    let err = fitter.fit_track(&mut track, &store).unwrap_err();
    assert_eq!(
        err,
        FitError::TooFewClusters {
            found: 2,
            required: 3
        }
    );
    assert_eq!(track, before);
}

#[test]
fn test_layer_window_filters_clusters() {
    // Layers 10..=14; a window of 12..=20 keeps only three.
    let points = helix_clusters(50.0, 10.0, 0.0, &[0.3, 0.6, 0.9, 1.2, 1.5], 0.5, 3.0);
    let (track, store) = store_track(&points, [1.0, 0.0, 0.0]);

    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(12, 20));
    let kept = fitter.track_clusters(&track, &store);
    assert_eq!(kept.len(), 3);
    assert!(kept.iter().all(|p| p.layer >= 12));

    let narrow = TrackSeedFitter::new(FitterConfig::new().with_layer_range(13, 20));
    let mut track = track;
    assert!(matches!(
        narrow.fit_track(&mut track, &store),
        Err(FitError::TooFewClusters { found: 2, .. })
    ));
}

#[test]
fn test_collinear_clusters_are_degenerate() {
    let points: Vec<ClusterPoint> = (0..5)
        .map(|i| {
            let s = 30.0 + 5.0 * i as f64;
            ClusterPoint::new(10 + i, s, s, 0.1 * s)
        })
        .collect();
    let (mut track, store) = store_track(&points, [1.0, 1.0, 0.0]);
    let before = track.clone();

    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));
    assert_eq!(
        fitter.fit_track(&mut track, &store),
        Err(FitError::DegenerateCircle)
    );
    assert_eq!(track, before);
}

#[test]
fn test_rounded_collinear_clusters_are_degenerate() {
    let points: Vec<ClusterPoint> = [30.0, 35.0, 40.0, 45.0]
        .iter()
        .enumerate()
        .map(|(i, &x)| {
            let y = 0.7 * x + 3.3;
            ClusterPoint::new(10 + i as u32, x, y, 0.1 * x.hypot(y))
        })
        .collect();
    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));
    assert_eq!(fitter.fit_points(&points, 1.0), Err(FitError::DegenerateCircle));
}

#[test]
fn test_same_radius_is_degenerate_line() {
    // All clusters on a circle about the origin: r is constant.
    let points = [
        ClusterPoint::new(10, 40.0, 0.0, 1.0),
        ClusterPoint::new(11, 0.0, 40.0, 2.0),
        ClusterPoint::new(12, -40.0, 0.0, 3.0),
        ClusterPoint::new(13, 0.0, -40.0, 4.0),
    ];
    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));
    assert_eq!(fitter.fit_points(&points, 1.0), Err(FitError::DegenerateLine));
}

#[test]
fn test_missing_clusters_are_ignored() {
    let points = helix_clusters(50.0, 10.0, 0.0, &[0.3, 0.6, 0.9, 1.2], 0.5, 3.0);
    let (mut track, store) = store_track(&points, [1.0, 0.0, 0.0]);
    track.cluster_keys.push(ClusterKey(99_999));

    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));
    let fit = fitter.fit_track(&mut track, &store).unwrap();
    assert_eq!(fit.n_clusters, 4);
}

#[test]
fn test_outlier_rejection_refits() {
    let mut points = helix_clusters(60.0, 20.0, -10.0, &[0.2, 0.4, 0.6, 0.8, 1.0, 1.2], 0.3, -2.0);
    let clean = fit_circle_taubin(&points.iter().map(|p| (p.x, p.y)).collect::<Vec<_>>());
    points[3].x += 4.0;
    points[3].y += 4.0;

    let plain = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));
    let polluted = plain.fit_points(&points, 1.0).unwrap();
    assert!((polluted.circle.radius - clean.radius).abs() > 1e-3);

    let robust = TrackSeedFitter::new(
        FitterConfig::new()
            .with_layer_range(0, 100)
            .with_xy_residual_cut(3.0),
    );
    let fit = robust.fit_points(&points, 1.0).unwrap();
    assert_eq!(fit.n_clusters, 5);
    assert_abs_diff_eq!(fit.circle.radius, 60.0, epsilon = 1e-6);
    assert_abs_diff_eq!(fit.circle.x0, 20.0, epsilon = 1e-6);
}

#[test]
fn test_outlier_rejection_can_starve_fit() {
    let points = helix_clusters(60.0, 20.0, -10.0, &[0.2, 0.4, 0.6], 0.3, -2.0);
    let mut shifted = points.clone();
    shifted[1].z += 10.0;

    let fitter = TrackSeedFitter::new(
        FitterConfig::new()
            .with_layer_range(0, 100)
            .with_z_residual_cut(0.5),
    );
    assert!(matches!(
        fitter.fit_points(&shifted, 1.0),
        Err(FitError::TooFewClusters { required: 3, .. })
    ));
}

#[test]
fn test_circle_pt_cross_check() {
    let points = helix_clusters(250.0, 200.0, 150.0, &[3.5, 3.55, 3.6, 3.65, 3.7], 0.1, 0.0);
    let fitter = TrackSeedFitter::new(FitterConfig::new().with_layer_range(0, 100));
    let fit = fitter.fit_points(&points, 1.05).unwrap();
    assert_abs_diff_eq!(fit.circle_pt(1.4), 0.3 * 1.4 * 2.5, epsilon = 1e-6);
}
