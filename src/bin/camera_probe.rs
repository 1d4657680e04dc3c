use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use posture_overlay::camera::{Acquired, AcquisitionManager, OpenCvHost};
use posture_overlay::config::Config;

const CONFIG_PATH: &str = "config.toml";

/// 最初のフレームを待つ上限
const FIRST_FRAME_TIMEOUT: Duration = Duration::from_secs(3);

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("camera_probe {}", env!("GIT_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH);

    println!("=== カメラプローブ ===");
    println!();

    let manager = AcquisitionManager::new(
        OpenCvHost::new(config.camera.clone()),
        config.camera.constraints(),
    );
    let Acquired { mut stream, tier } = manager.acquire()?;
    let (width, height) = stream.resolution();
    println!("tier:       {:?}", tier);
    println!("resolution: {}x{}", width, height);

    let deadline = Instant::now() + FIRST_FRAME_TIMEOUT;
    let frame = loop {
        if let Some(frame) = stream.current_frame()? {
            break Some(frame);
        }
        if stream.is_ended() || Instant::now() >= deadline {
            break None;
        }
        thread::sleep(Duration::from_millis(10));
    };

    match frame {
        Some(frame) => println!(
            "frame:      {}x{} mean luma={:.1}",
            frame.width,
            frame.height,
            frame.mean_luma()
        ),
        None => println!("frame:      none within {:?}", FIRST_FRAME_TIMEOUT),
    }

    stream.stop();
    Ok(())
}
