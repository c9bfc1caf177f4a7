//! Generate a synthetic fall sequence.

use std::path::PathBuf;

use fallwatch_pose_model::synthetic::{fall_sequence, SyntheticFallConfig};
use fallwatch_pose_model::write_pose_frames;

pub fn run(output: PathBuf, falls: usize, width: u32, height: u32, fps: u32) -> anyhow::Result<()> {
    if width == 0 || height == 0 || fps == 0 {
        anyhow::bail!("width, height and fps must be non-zero");
    }

    let synthetic = SyntheticFallConfig {
        width,
        height,
        fps,
        falls,
        ..Default::default()
    };
    let frames = fall_sequence(&synthetic);
    let jsonl = write_pose_frames(&synthetic.header(), &frames)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&output, jsonl)?;

    println!("Wrote {} frames to {}", frames.len(), output.display());
    println!("  Resolution: {width}x{height} @ {fps}fps");
    for n in 0..falls {
        println!("  Fall {} ends at frame {}", n + 1, synthetic.fall_end_frame(n));
    }

    Ok(())
}
