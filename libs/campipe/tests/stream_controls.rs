// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-stream controls on the reference product's conference config.

mod common;

use campipe::core::StreamType;
use campipe::core::config::ProductConfig;
use campipe::core::error::PipelineError;
use campipe::core::graph::NodePath;
use campipe::core::hardware::CropRect;
use campipe::core::hardware::fake::VirtualHardware;
use common::{Bench, REFERENCE_PRODUCT};

fn conference_bench() -> Bench {
    let config = ProductConfig::from_yaml_str(REFERENCE_PRODUCT).unwrap();
    let roots = config.roots(1).unwrap().to_vec();
    Bench::with_roots(roots, VirtualHardware::new())
}

#[test]
fn test_conference_path_layout() {
    let mut bench = conference_bench();
    let conference = bench.open(StreamType::VIDEO_CONFERENCE);
    assert_eq!(conference.path(), &NodePath::from_indices([0, 0, 0, 0]));

    let resize = bench.hardware.compositor.task("0.0").unwrap();
    let watermark = bench.hardware.compositor.task("0.0.0").unwrap();
    assert!(!resize.in_place);
    assert!(watermark.in_place);
    assert_eq!(resize.format_count, 2);
    assert_eq!(
        bench.hardware.firmware.loaded(),
        vec!["watermark_720p.rgba", "watermark_360p.rgba"]
    );
    drop(conference);
    bench.shutdown();
}

#[test]
fn test_region_of_interest_reaches_resize_stage() {
    let mut bench = conference_bench();
    let conference = bench.open(StreamType::VIDEO_CONFERENCE);
    let monitor = bench.open(StreamType::MONITORING);

    let pending = conference.set_region_of_interest(0.25, 0.25, 0.75, 0.75);
    bench.resolve(pending).unwrap();
    let resize = bench.hardware.compositor.task("0.0").unwrap();
    assert_eq!(
        resize.crop,
        Some(CropRect {
            x_min: 0.25,
            y_min: 0.25,
            x_max: 0.75,
            y_max: 0.75,
        })
    );

    let unsupported = monitor.set_region_of_interest(0.0, 0.0, 0.5, 0.5);
    assert!(matches!(
        bench.resolve(unsupported),
        Err(PipelineError::NotSupported(_))
    ));

    let inverted = conference.set_region_of_interest(0.75, 0.25, 0.25, 0.75);
    assert!(matches!(
        inverted.try_take(),
        Some(Err(PipelineError::InvalidArgs(_)))
    ));
    drop(conference);
    drop(monitor);
    bench.shutdown();
}

#[test]
fn test_image_format_switch_applies_to_every_stage() {
    let mut bench = conference_bench();
    let mut conference = bench.start(StreamType::VIDEO_CONFERENCE);

    let formats = bench.resolve(conference.get_image_formats()).unwrap();
    let widths: Vec<u32> = formats.iter().map(|format| format.width).collect();
    assert_eq!(widths, vec![1280, 640]);

    bench.resolve(conference.set_image_format(1)).unwrap();
    let compositor = &bench.hardware.compositor;
    assert_eq!(compositor.task("0.0").unwrap().format_index, 1);
    assert_eq!(compositor.task("0.0.0").unwrap().format_index, 1);
    let output = bench.manager.graph().node(conference.path()).unwrap();
    assert_eq!(output.current_format(), 1);

    assert!(matches!(
        bench.resolve(conference.set_image_format(2)),
        Err(PipelineError::InvalidArgs(_))
    ));

    // Frames still flow after the switch.
    bench.emit(0);
    assert_eq!(bench.consume(&mut conference), 1);
    let task = bench.hardware.compositor.task("0.0").unwrap();
    assert!(task.held_outputs.is_empty());
    drop(conference);
    bench.shutdown();
}

#[test]
fn test_client_buffers_come_from_the_owning_stage() {
    let mut bench = conference_bench();
    let conference = bench.open(StreamType::VIDEO_CONFERENCE);

    let buffers = bench.resolve(conference.get_buffers()).unwrap();
    // Resize output shared with the in-place watermark and the output.
    assert_eq!(buffers.buffer_count, 4);
    let resize = bench
        .manager
        .graph()
        .get(&NodePath::from_indices([0, 0]))
        .and_then(|entry| entry.owned_collection())
        .unwrap();
    assert_eq!(buffers.collection_id, resize.id());
    assert_eq!(bench.hardware.allocator.attached_tokens(), 1);
    drop(conference);
    bench.shutdown();
}
