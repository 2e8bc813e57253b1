//! Example: fuse TensorFlow LSTM loops in an ONNX model
//!
//! # Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --example fuse_lstm_model -- input.onnx output.onnx [--opset N]
//! ```

use std::env;

use lstm_fuse::io::{fuse_lstm_model, get_model_info, load_model, save_model};
use lstm_fuse::prelude::*;

fn main() -> OnnxResult<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <input.onnx> [output.onnx] [options]", args[0]);
        eprintln!();
        eprintln!("Options:");
        eprintln!("  --opset N    Opset of the emitted glue nodes (default: model opset)");
        eprintln!("  --no-prune   Keep nodes left unreachable after fusion");
        eprintln!("  --info       Show model info only");
        std::process::exit(1);
    }

    let input_path = &args[1];

    if args.iter().any(|a| a == "--info") {
        let info = get_model_info(input_path)?;
        println!("Model Information:");
        println!("  IR Version: {}", info.ir_version);
        println!("  Producer: {}", info.producer_name);
        println!("  Opset: {:?}", info.opset);
        println!("  Graph: {}", info.graph_name);
        println!("  Nodes: {}", info.node_count);
        println!("  While loops: {}", info.loop_count);
        println!("  LSTM nodes: {}", info.lstm_count);
        return Ok(());
    }

    if args.len() < 3 || args[2].starts_with("--") {
        eprintln!("Error: output path required");
        std::process::exit(1);
    }
    let output_path = &args[2];

    let model = load_model(input_path)?;
    let mut config = FuseLstmConfig::from_model(&model)?;

    if let Some(pos) = args.iter().position(|a| a == "--opset") {
        let opset = args
            .get(pos + 1)
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| TransformError::InvalidModel("--opset needs an integer".to_string()))?;
        config = config.with_target_opset(opset);
    }
    if args.iter().any(|a| a == "--no-prune") {
        config = config.with_prune_dead_nodes(false);
    }

    println!("Fusing {} -> {} (opset {})", input_path, output_path, config.target_opset);
    let (fused, stats) = fuse_lstm_model(&model, &config)?;
    save_model(&fused, output_path)?;

    println!();
    println!("Results:");
    println!("  Cells matched:  {}", stats.transform.patterns_matched);
    println!("  Cells fused:    {}", stats.transform.transforms_applied);
    println!("  Original nodes: {}", stats.original_nodes);
    println!(
        "  Fused nodes:    {} ({:.1}% fewer)",
        stats.fused_nodes,
        stats.node_reduction_percent()
    );
    for name in &stats.transform.transformed_nodes {
        println!("  + {}", name);
    }

    Ok(())
}
