// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! `dgrt inspect` command: decode a container and print its tables.

use std::path::PathBuf;

use model_container::{header::Section, BindingSlot, ContainerDecoder};

use super::ModelFile;

pub async fn execute(file: PathBuf) -> anyhow::Result<()> {
    super::banner("dgraph-rt · Container Inspector");

    let model = ModelFile::open(&file)?;
    let decoder = ContainerDecoder::new(model.container()?)
        .map_err(|e| anyhow::anyhow!("failed to decode '{}': {e}", file.display()))?;
    let header = decoder.header();

    // ── Header ─────────────────────────────────────────────────
    println!("  File:      {}", file.display());
    println!(
        "  Format:    {}",
        if model.is_wrapped() { "model data (wrapped)" } else { "raw container" }
    );
    println!("  Version:   {}.{}", header.major, header.minor);
    println!("  Size:      {} bytes", decoder.bytes().len());
    for (section, range) in Section::TABLES.iter().zip(header.sections.iter()) {
        println!(
            "   {:<10} offset {:>8}  size {:>8}",
            section.to_string(),
            range.offset,
            range.size
        );
    }
    println!();

    // ── Modules ────────────────────────────────────────────────
    println!("  Modules:");
    println!("  {:<4} {:<8} {:<20} {:>10}", "Idx", "Kind", "Entry", "Code");
    println!("  {}", "-".repeat(46));
    for (i, module) in decoder.modules().iter().enumerate() {
        println!(
            "  {:<4} {:<8} {:<20} {:>8} B",
            i,
            module.kind.to_string(),
            truncate(&module.entry_point, 20),
            module.code.len()
        );
    }
    println!();

    // ── Resources ──────────────────────────────────────────────
    println!("  Resources:");
    println!("  {:<4} {:<16} {:<12} {:<20}", "Idx", "Category", "Format", "Shape");
    println!("  {}", "-".repeat(56));
    for (i, resource) in decoder.resources().iter().enumerate() {
        println!(
            "  {:<4} {:<16} {:<12} {:<20}",
            i,
            resource.category.to_string(),
            resource.format.to_string(),
            resource.shape().to_string()
        );
    }
    println!();

    // ── Sequence ───────────────────────────────────────────────
    let sequence = decoder.sequence();
    println!("  Model inputs:  {}", slots(&sequence.model_inputs));
    println!("  Model outputs: {}", slots(&sequence.model_outputs));
    println!();
    println!("  Segments:");
    for (i, segment) in sequence.segments.iter().enumerate() {
        println!(
            "   [{i}] {} ({}, module {})",
            segment.name, segment.kind, segment.module_index
        );
        println!("       inputs:    {}", slots(&segment.inputs));
        println!("       outputs:   {}", slots(&segment.outputs));
        println!("       sets:      {}", segment.descriptor_sets.len());
        if !segment.push_constants.is_empty() {
            println!("       push ranges: {}", segment.push_constants.len());
        }
        if !segment.constants.is_empty() {
            println!("       constants: {:?}", segment.constants);
        }
    }
    println!();

    // ── Constants ──────────────────────────────────────────────
    if !decoder.constants().is_empty() {
        println!("  Constants:");
        for (i, constant) in decoder.constants().iter().enumerate() {
            println!(
                "   [{i}] resource {:<4} {:>8} B",
                constant.resource_index,
                constant.data.len()
            );
        }
        println!();
    }

    Ok(())
}

/// Formats binding slots as `binding→resource` pairs.
fn slots(slots: &[BindingSlot]) -> String {
    if slots.is_empty() {
        return "-".into();
    }
    slots
        .iter()
        .map(|s| format!("{}→{}", s.binding, s.resource))
        .collect::<Vec<_>>()
        .join(", ")
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{head}...")
    }
}
