use std::sync::mpsc;

use anyhow::Result;
use posture_overlay::camera::{AcquisitionManager, OpenCvHost};
use posture_overlay::config::Config;
use posture_overlay::pipeline::{Display, PosePipeline, Refresh, StopReason};
use posture_overlay::pose::{InferenceAdapter, MoveNetModel};
use posture_overlay::render::{MinifbDisplay, OverlayRenderer};
use posture_overlay::tracker::{Feedback, PostureGuide};

const CONFIG_PATH: &str = "config.toml";

fn title_for(base: &str, feedback: &Feedback) -> String {
    let mut title = format!("{} - {}", base, feedback.text);
    if feedback.status.is_tracking() {
        title.push_str(&format!(" ({}%)", feedback.confidence_percent));
    }
    if let Some(hint) = &feedback.hint {
        title.push_str(" | ");
        title.push_str(hint);
    }
    title
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("posture-overlay {}", env!("GIT_VERSION"));

    let config = Config::load_or_default(CONFIG_PATH);
    log::info!("Press ESC to exit, R to retry after an error");

    let (title_tx, title_rx) = mpsc::channel();
    let mut display = MinifbDisplay::new(
        &config.render.title,
        config.camera.width as usize,
        config.camera.height as usize,
        config.render.target_fps,
    )?
    .with_label_scale(config.render.label_scale)
    .with_title_feed(title_rx);

    let base_title = config.render.title.clone();
    let mut last_text = String::new();
    let sink = move |feedback: &Feedback| {
        if feedback.text != last_text {
            log::info!("{}", feedback.text);
            last_text = feedback.text.clone();
        }
        // ウィンドウが先に閉じていれば送れなくてよい
        let _ = title_tx.send(title_for(&base_title, feedback));
    };

    let acquisition = AcquisitionManager::new(
        OpenCvHost::new(config.camera.clone()),
        config.camera.constraints(),
    );
    let adapter = InferenceAdapter::new(
        MoveNetModel::new(&config.model.path),
        config.model.adapter_options(),
    );
    let mut pipeline = PosePipeline::new(acquisition, adapter, sink)
        .with_guide(PostureGuide::new(config.guidance.targets.clone()))
        .with_renderer(OverlayRenderer::new(config.render.point_radius));

    if pipeline.initialize().is_ok() {
        // 失敗は Error 状態として表示される
        let _ = pipeline.start();
    }

    loop {
        if pipeline.has_session() {
            match pipeline.run(&mut display) {
                StopReason::DisplayClosed | StopReason::Requested => break,
                StopReason::StreamEnded | StopReason::NoSession => {}
            }
        }

        // セッションが無い間は表示を保ったまま R を待つ
        if display.next_refresh() == Refresh::Closed {
            break;
        }
        if display.retry_requested() {
            if let Err(e) = pipeline.retry() {
                log::warn!("Retry failed: {}", e);
            }
        }
    }

    pipeline.stop();
    log::info!("Shutting down...");
    Ok(())
}
