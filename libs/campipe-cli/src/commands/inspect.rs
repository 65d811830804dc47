// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::Path;

use anyhow::{Context, Result};
use campipe::core::config::{ConfigNode, ProductConfig};
use campipe::core::graph::NodePath;

/// Load, validate and describe a product configuration.
pub fn run(product: &Path, tree: bool) -> Result<()> {
    let config = ProductConfig::load(product)
        .with_context(|| format!("Invalid product configuration {}", product.display()))?;

    let info = &config.device_info;
    println!(
        "{} {} ({:04x}:{:04x})",
        info.vendor_name, info.product_name, info.vendor_id, info.product_id
    );
    println!("Configs ({}):\n", config.external_configs.len());

    for (index, external) in config.external_configs.iter().enumerate() {
        println!("  [{}]", index);
        for (stream_index, stream) in external.streams.iter().enumerate() {
            println!(
                "    stream {}: {} @ {}/{} fps",
                stream_index,
                stream.stream_type,
                stream.frame_rate.numerator,
                stream.frame_rate.denominator
            );
            for format in &stream.image_formats {
                println!(
                    "      - {:?} {}x{} (stride {})",
                    format.pixel_format, format.width, format.height, format.bytes_per_row
                );
            }
        }

        if tree {
            if let Some(roots) = config.roots(index) {
                println!("    nodes:");
                for (root_index, root) in roots.iter().enumerate() {
                    print_node(root, &NodePath::root(root_index as u8), 3);
                }
            }
        }
        println!();
    }

    println!("Configuration is valid.");
    Ok(())
}

fn print_node(node: &ConfigNode, path: &NodePath, depth: usize) {
    let streams: Vec<String> = node
        .supported_streams
        .iter()
        .map(|support| support.stream_type.to_string())
        .collect();
    println!(
        "{:indent$}{} {} @ {}/{} fps [{}]",
        "",
        path,
        node.kind.name(),
        node.frame_rate.numerator,
        node.frame_rate.denominator,
        streams.join(", "),
        indent = depth * 2
    );
    for (index, child) in node.children.iter().enumerate() {
        print_node(child, &path.child(index as u8), depth + 1);
    }
}
