use ndarray::Array4;

use flowstack_core::consts::{PYRAMID_MAX_DOWNSAMPLES, PYRAMID_MIN_EXTENT};
use flowstack_core::flow::{build_pyramid, upsample_flow};

#[test]
fn pyramid_levels_halve_and_finest_is_original() {
    let mut frame = Array4::<f32>::zeros((1, 3, 80, 112));
    for y in 0..80 {
        for x in 0..112 {
            frame[[0, 0, y, x]] = (y * 112 + x) as f32 / (80.0 * 112.0);
        }
    }

    let pyramid = build_pyramid(&frame);
    assert_eq!(pyramid.len(), 3, "80x112 should downsample twice");

    // Coarsest first, each level floor-half of its successor.
    for i in 1..pyramid.len() {
        let (_, _, h, w) = pyramid[i].dim();
        let (_, _, ph, pw) = pyramid[i - 1].dim();
        assert_eq!(ph, h / 2);
        assert_eq!(pw, w / 2);
    }

    // The finest level is the input, bit for bit.
    let finest = pyramid.last().unwrap();
    assert_eq!(finest.dim(), frame.dim());
    assert!(finest.iter().zip(frame.iter()).all(|(a, b)| a == b));
}

#[test]
fn pyramid_stops_once_both_extents_small() {
    let frame = Array4::<f32>::zeros((1, 3, 32, 32));
    let pyramid = build_pyramid(&frame);
    assert_eq!(pyramid.len(), 1, "32x32 needs no downsampling");

    // One extent above the cutoff keeps downsampling going.
    let frame = Array4::<f32>::zeros((1, 3, 32, 56));
    let pyramid = build_pyramid(&frame);
    assert_eq!(pyramid.len(), 2);
    let (_, _, h, w) = pyramid[0].dim();
    assert_eq!((h, w), (16, 28));
}

#[test]
fn pyramid_iteration_cap_overrides_size_rule() {
    // 512x512 would need four halvings to reach the size cutoff, but the
    // fixed iteration cap stops at three.
    let frame = Array4::<f32>::zeros((1, 3, 512, 512));
    let pyramid = build_pyramid(&frame);
    assert_eq!(pyramid.len(), PYRAMID_MAX_DOWNSAMPLES + 1);

    let (_, _, h, w) = pyramid[0].dim();
    assert!(h > PYRAMID_MIN_EXTENT && w > PYRAMID_MIN_EXTENT);
    assert_eq!((h, w), (64, 64));
}

#[test]
fn pyramid_averages_2x2_blocks() {
    let mut frame = Array4::<f32>::zeros((1, 1, 34, 34));
    frame[[0, 0, 0, 0]] = 1.0;
    frame[[0, 0, 0, 1]] = 2.0;
    frame[[0, 0, 1, 0]] = 3.0;
    frame[[0, 0, 1, 1]] = 4.0;

    let pyramid = build_pyramid(&frame);
    assert_eq!(pyramid.len(), 2);
    assert!((pyramid[0][[0, 0, 0, 0]] - 2.5).abs() < 1e-6);
}

#[test]
fn flow_upsample_doubles_values_and_extent() {
    let flow = Array4::<f32>::from_elem((1, 2, 8, 8), 1.5);
    let up = upsample_flow(&flow, 16, 16).unwrap();
    assert_eq!(up.dim(), (1, 2, 16, 16));
    // A constant field stays constant under bilinear interpolation, so
    // every value is exactly doubled.
    assert!(up.iter().all(|&v| (v - 3.0).abs() < 1e-6));
}

#[test]
fn flow_upsample_pads_odd_targets_by_replication() {
    let mut flow = Array4::<f32>::zeros((1, 2, 8, 8));
    for y in 0..8 {
        for x in 0..8 {
            flow[[0, 0, y, x]] = x as f32;
            flow[[0, 1, y, x]] = y as f32;
        }
    }

    let up = upsample_flow(&flow, 17, 17).unwrap();
    assert_eq!(up.dim(), (1, 2, 17, 17));

    // The padded row/column replicates the edge.
    for x in 0..17 {
        assert_eq!(up[[0, 0, 16, x]], up[[0, 0, 15, x]]);
        assert_eq!(up[[0, 1, 16, x]], up[[0, 1, 15, x]]);
    }
    for y in 0..17 {
        assert_eq!(up[[0, 0, y, 16]], up[[0, 0, y, 15]]);
    }
}

#[test]
fn flow_upsample_rejects_larger_gaps() {
    let flow = Array4::<f32>::zeros((1, 2, 8, 8));
    assert!(upsample_flow(&flow, 19, 16).is_err());
    assert!(upsample_flow(&flow, 16, 14).is_err());
}
