//! 1リフレッシュにつき1回のフレーム処理ループ
//!
//! フレーム取得 → 推論 → 平滑化 → 角度 → 状態 → 描画 → フィードバック の順で
//! 同期的に回す。ある反復が終わるまで次の反復は始まらない。

use crate::camera::{AcquisitionManager, AcquisitionTier, CameraHost};
use crate::error::{ModelInitFailure, PipelineError};
use crate::pose::{
    compute_joint_angles, Backend, InferenceAdapter, JointAngleSpec, LandmarkSet, PoseModel,
    HUMANOID_JOINTS,
};
use crate::render::{OverlayRenderer, Surface};
use crate::tracker::{Feedback, LandmarkSmoother, PipelineStatus, PostureGuide, StatusMachine};

use super::pacer::{Display, Refresh};
use super::session::{SessionHandle, StopHandle};
use super::stats::SessionStats;

/// 状態テキストなどを受け取る面
pub trait FeedbackSink {
    fn publish(&mut self, feedback: &Feedback);
}

impl<F> FeedbackSink for F
where
    F: FnMut(&Feedback),
{
    fn publish(&mut self, feedback: &Feedback) {
        self(feedback)
    }
}

/// ループが止まった理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    StreamEnded,
    DisplayClosed,
    NoSession,
}

/// 1反復の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Rendered,
    /// まだフレームが無い。何もせず次のリフレッシュを待つ。
    Pending,
    Stopped(StopReason),
}

pub struct PosePipeline<H: CameraHost, M: PoseModel, F: FeedbackSink> {
    acquisition: AcquisitionManager<H>,
    adapter: InferenceAdapter<M>,
    smoother: LandmarkSmoother,
    status: StatusMachine,
    guide: PostureGuide,
    renderer: OverlayRenderer,
    joints: Vec<JointAngleSpec>,
    session: Option<SessionHandle>,
    run_flag: StopHandle,
    sink: F,
    stats: SessionStats,
}

impl<H: CameraHost, M: PoseModel, F: FeedbackSink> PosePipeline<H, M, F> {
    pub fn new(acquisition: AcquisitionManager<H>, adapter: InferenceAdapter<M>, sink: F) -> Self {
        Self {
            acquisition,
            adapter,
            smoother: LandmarkSmoother::new(),
            status: StatusMachine::new(),
            guide: PostureGuide::new(Vec::new()),
            renderer: OverlayRenderer::default(),
            joints: HUMANOID_JOINTS.to_vec(),
            session: None,
            run_flag: StopHandle::new(),
            sink,
            stats: SessionStats::new(),
        }
    }

    pub fn with_guide(mut self, guide: PostureGuide) -> Self {
        self.guide = guide;
        self
    }

    pub fn with_renderer(mut self, renderer: OverlayRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn with_joints(mut self, joints: Vec<JointAngleSpec>) -> Self {
        self.joints = joints;
        self
    }

    pub fn status(&self) -> PipelineStatus {
        self.status.status()
    }

    pub fn feedback(&self) -> Feedback {
        self.status.feedback(None)
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn smoothing_state(&self) -> Option<&LandmarkSet> {
        self.smoother.state()
    }

    pub fn session_tier(&self) -> Option<AcquisitionTier> {
        self.session.as_ref().map(|s| s.tier())
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn adapter(&self) -> &InferenceAdapter<M> {
        &self.adapter
    }

    /// 別スレッドやシグナルハンドラから止めるためのハンドル
    pub fn stop_handle(&self) -> StopHandle {
        self.run_flag.clone()
    }

    /// モデルを読み込む。失敗したら Error 状態へ。
    pub fn initialize(&mut self) -> Result<Backend, ModelInitFailure> {
        match self.adapter.initialize() {
            Ok(backend) => {
                self.status.model_ready();
                self.publish(None);
                Ok(backend)
            }
            Err(e) => {
                log::error!("Pose model initialization failed: {}", e);
                self.status.fail(e.clone());
                self.publish(None);
                Err(e)
            }
        }
    }

    /// カメラを取得してセッションを開始する。
    ///
    /// 既存のセッションは `stop` と同じ手順で畳む。新しいストリームは別セッションなので
    /// 平滑化状態も引き継がない。
    pub fn start(&mut self) -> Result<(), PipelineError> {
        let status = self.status.status();
        if matches!(status, PipelineStatus::Loading | PipelineStatus::Error) {
            log::warn!("Cannot start camera session while {:?}", status);
            return Err(PipelineError::NotReady);
        }

        self.stop();

        match self.acquisition.acquire() {
            Ok(acquired) => {
                self.session = Some(SessionHandle::new(acquired, self.run_flag.clone()));
                self.stats = SessionStats::new();
                Ok(())
            }
            Err(failure) => {
                log::error!("{}", failure);
                self.status.fail(failure.clone());
                self.publish(None);
                Err(failure.into())
            }
        }
    }

    /// 1反復ぶん処理する
    pub fn tick<S: Surface + ?Sized>(&mut self, surface: &mut S) -> Tick {
        let frame = {
            let Some(session) = self.session.as_mut() else {
                return Tick::Stopped(StopReason::NoSession);
            };
            if !session.is_running() {
                return Tick::Stopped(StopReason::Requested);
            }
            if session.stream().is_ended() {
                return Tick::Stopped(StopReason::StreamEnded);
            }
            match session.stream_mut().current_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => return Tick::Pending,
                Err(e) => {
                    log::warn!("Failed to read camera frame: {:#}", e);
                    return Tick::Pending;
                }
            }
        };

        // 推論エラーはこのフレームだけ「未検出」として扱う
        let raw = match self.adapter.estimate(&frame) {
            Ok(set) => set,
            Err(e) => {
                log::warn!("Pose inference failed: {:#}", e);
                self.stats.record_inference_error();
                LandmarkSet::new()
            }
        };

        let smoothed = self.smoother.apply(&raw);
        let angles = compute_joint_angles(&smoothed, &self.joints);

        if self.status.observe(&smoothed) {
            log::info!("Tracking status: {:?}", self.status.status());
        }

        if let Err(e) = self
            .renderer
            .draw(surface, &frame, &smoothed, &angles, self.adapter.adjacency())
        {
            log::warn!("Failed to draw overlay: {:#}", e);
        }

        let hint = self.guide.advise(&angles);
        self.publish(hint);
        self.stats.record_frame();
        Tick::Rendered
    }

    /// 表示リフレッシュごとに `tick` を回し、止まったら後始末をして理由を返す
    pub fn run<D: Display + ?Sized>(&mut self, display: &mut D) -> StopReason {
        if self.session.is_none() {
            return StopReason::NoSession;
        }

        let reason = loop {
            if !self.run_flag.is_running() {
                break StopReason::Requested;
            }
            match display.next_refresh() {
                Refresh::Closed => break StopReason::DisplayClosed,
                Refresh::Ready { skipped } => {
                    if skipped > 0 {
                        self.stats.record_dropped(skipped);
                    }
                }
            }
            if let Tick::Stopped(reason) = self.tick(display) {
                break reason;
            }
        };

        log::info!("Frame loop stopped: {:?}", reason);
        self.stop();
        reason
    }

    /// ループを止めてカメラを解放する。フラグ → デバイス → 平滑化状態 の順。
    pub fn stop(&mut self) {
        self.run_flag.stop();
        self.release_session();
        self.smoother.reset();
        if self.status.status().is_tracking() {
            self.status.await_stream();
            self.publish(None);
        }
    }

    /// Error からの明示的な再試行。自動では呼ばれない。
    pub fn retry(&mut self) -> Result<(), PipelineError> {
        log::info!("Retrying pipeline startup");
        self.stop();
        if self.status.retry() {
            self.publish(None);
        }
        if !self.adapter.is_ready() {
            self.initialize()?;
        }
        self.start()
    }

    fn release_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.release();
        }
    }

    fn publish(&mut self, hint: Option<String>) {
        let feedback = self.status.feedback(hint);
        self.sink.publish(&feedback);
    }
}

impl<H: CameraHost, M: PoseModel, F: FeedbackSink> Drop for PosePipeline<H, M, F> {
    fn drop(&mut self) {
        self.run_flag.stop();
        self.release_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::capture::testing::ScriptedHost;
    use crate::camera::{Constraints, DeviceError};
    use crate::config::GuidanceTarget;
    use crate::error::AcquisitionCause;
    use crate::pose::detector::testing::{ScriptedModel, Step};
    use crate::pose::{AdapterOptions, BodyPartId, Landmark, Subject};
    use crate::render::surface::testing::{Op, Recorder};
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<Feedback>>>;
    type TestPipeline = PosePipeline<ScriptedHost, ScriptedModel, Box<dyn FnMut(&Feedback)>>;

    fn pipeline(host: ScriptedHost, model: ScriptedModel) -> (TestPipeline, Log) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink_log = log.clone();
        let sink: Box<dyn FnMut(&Feedback)> =
            Box::new(move |f: &Feedback| sink_log.borrow_mut().push(f.clone()));
        let pipeline = PosePipeline::new(
            AcquisitionManager::new(host, Constraints::default()),
            InferenceAdapter::new(model, AdapterOptions::default()),
            sink,
        );
        (pipeline, log)
    }

    /// 膝を90度に曲げた全身。信頼度は一律。
    fn body(confidence: f32) -> LandmarkSet {
        BodyPartId::ALL
            .iter()
            .map(|&id| {
                let (x, y) = match id {
                    BodyPartId::LeftHip | BodyPartId::RightHip => (30.0, 20.0),
                    BodyPartId::LeftKnee | BodyPartId::RightKnee => (30.0, 30.0),
                    BodyPartId::LeftAnkle | BodyPartId::RightAnkle => (40.0, 30.0),
                    _ => (32.0, 10.0),
                };
                Landmark::new(id, x, y, confidence)
            })
            .collect()
    }

    fn subject(confidence: f32) -> Step {
        Step::Subjects(vec![Subject {
            score: confidence,
            landmarks: body(confidence),
        }])
    }

    fn started(host: ScriptedHost, script: Vec<Step>) -> (TestPipeline, Log) {
        let (mut p, log) = pipeline(host, ScriptedModel::new(script));
        p.initialize().unwrap();
        p.start().unwrap();
        (p, log)
    }

    /// リフレッシュ回数を数え、上限で閉じる表示
    #[derive(Default)]
    struct FakeDisplay {
        surface: Recorder,
        refreshes: u32,
        limit: u32,
        skipped: u32,
    }

    impl FakeDisplay {
        fn new(limit: u32) -> Self {
            Self {
                limit,
                ..Self::default()
            }
        }
    }

    impl Surface for FakeDisplay {
        fn clear(&mut self) -> anyhow::Result<()> {
            self.surface.clear()
        }
        fn draw_image(&mut self, frame: &crate::camera::Frame) -> anyhow::Result<()> {
            self.surface.draw_image(frame)
        }
        fn draw_circle(&mut self, x: i32, y: i32, radius: i32, color: u32) -> anyhow::Result<()> {
            self.surface.draw_circle(x, y, radius, color)
        }
        fn draw_line(
            &mut self,
            x1: i32,
            y1: i32,
            x2: i32,
            y2: i32,
            color: u32,
        ) -> anyhow::Result<()> {
            self.surface.draw_line(x1, y1, x2, y2, color)
        }
        fn draw_text(&mut self, x: i32, y: i32, label: &str, color: u32) -> anyhow::Result<()> {
            self.surface.draw_text(x, y, label, color)
        }
    }

    impl Display for FakeDisplay {
        fn next_refresh(&mut self) -> Refresh {
            if self.refreshes >= self.limit {
                return Refresh::Closed;
            }
            self.refreshes += 1;
            Refresh::Ready {
                skipped: self.skipped,
            }
        }
    }

    #[test]
    fn test_startup_reaches_awaiting_stream() {
        let (mut p, log) = pipeline(ScriptedHost::working(), ScriptedModel::new(vec![]));
        assert_eq!(p.status(), PipelineStatus::Loading);
        assert_eq!(p.initialize().unwrap(), Backend::Cuda);
        assert_eq!(p.status(), PipelineStatus::AwaitingStream);
        assert_eq!(log.borrow().last().unwrap().text, "Waiting for camera...");

        p.start().unwrap();
        assert_eq!(p.session_tier(), Some(AcquisitionTier::Ideal));
        assert!(p.stop_handle().is_running());
    }

    #[test]
    fn test_start_before_model_ready_is_rejected() {
        let host = ScriptedHost::working();
        let requests = host.requests.clone();
        let (mut p, _) = pipeline(host, ScriptedModel::new(vec![]));
        assert_eq!(p.start(), Err(PipelineError::NotReady));
        assert!(requests.borrow().is_empty());
    }

    #[test]
    fn test_high_confidence_tracking() {
        let (mut p, log) = started(ScriptedHost::working(), vec![subject(0.9), subject(0.9)]);
        let mut canvas = Recorder::default();

        assert_eq!(p.tick(&mut canvas), Tick::Rendered);
        assert_eq!(p.status(), PipelineStatus::TrackingHigh);

        let last = log.borrow().last().cloned().unwrap();
        assert_eq!(last.text, "Analysing alignment...");
        assert_eq!(last.confidence_percent, 90);
        assert!(p.smoothing_state().is_some());
    }

    #[test]
    fn test_guidance_hint_only_when_tracking_high() {
        let (p, log) = started(ScriptedHost::working(), vec![subject(0.9), subject(0.4)]);
        let mut p = p.with_guide(PostureGuide::new(vec![GuidanceTarget {
            joint: "left knee".to_string(),
            target: 90.0,
            tolerance: 15.0,
        }]));
        let mut canvas = Recorder::default();

        p.tick(&mut canvas);
        assert_eq!(
            log.borrow().last().unwrap().hint.as_deref(),
            Some("Good form - hold it")
        );

        // 0.9 と 0.4 が混ざって 0.65 なのでまだ High
        p.tick(&mut canvas);
        assert_eq!(p.status(), PipelineStatus::TrackingHigh);
        assert_eq!(log.borrow().last().unwrap().confidence_percent, 65);
    }

    #[test]
    fn test_low_confidence_tracking() {
        let (mut p, log) = started(ScriptedHost::working(), vec![subject(0.4)]);
        let mut canvas = Recorder::default();
        p.tick(&mut canvas);
        assert_eq!(p.status(), PipelineStatus::TrackingLow);
        let last = log.borrow().last().cloned().unwrap();
        assert_eq!(last.confidence_percent, 40);
        assert_eq!(last.hint, None);
    }

    #[test]
    fn test_subject_leaves_resets_smoothing() {
        let (mut p, _) = started(
            ScriptedHost::working(),
            vec![subject(0.9), subject(0.9), Step::Subjects(vec![]), subject(0.6)],
        );
        let mut canvas = Recorder::default();

        p.tick(&mut canvas);
        p.tick(&mut canvas);
        assert_eq!(p.status(), PipelineStatus::TrackingHigh);

        p.tick(&mut canvas);
        assert_eq!(p.status(), PipelineStatus::NoSubject);
        assert!(p.smoothing_state().is_none());

        // 再登場時は前の被写体と混ぜない
        p.tick(&mut canvas);
        assert_eq!(p.smoothing_state(), Some(&body(0.6)));
        assert_eq!(p.status(), PipelineStatus::TrackingHigh);
    }

    #[test]
    fn test_lone_weak_subject_is_tracking_low() {
        let (mut p, log) = started(ScriptedHost::working(), vec![subject(0.15)]);
        let mut canvas = Recorder::default();
        assert_eq!(p.tick(&mut canvas), Tick::Rendered);
        assert_eq!(p.status(), PipelineStatus::TrackingLow);
        assert_eq!(p.smoothing_state(), Some(&body(0.15)));
        assert_eq!(log.borrow().last().unwrap().confidence_percent, 15);
    }

    #[test]
    fn test_start_on_live_session_begins_fresh() {
        let host = ScriptedHost::working();
        let live_at_request = host.live_at_request.clone();
        let (mut p, log) = started(host, vec![subject(0.9), subject(0.4)]);
        let mut canvas = Recorder::default();

        p.tick(&mut canvas);
        assert_eq!(p.status(), PipelineStatus::TrackingHigh);

        p.start().unwrap();
        assert_eq!(p.status(), PipelineStatus::AwaitingStream);
        assert!(p.smoothing_state().is_none());
        assert!(p.stop_handle().is_running());
        assert_eq!(log.borrow().last().unwrap().text, "Waiting for camera...");

        // 前のストリームの 0.9 と混ざらない
        p.tick(&mut canvas);
        assert_eq!(p.smoothing_state(), Some(&body(0.4)));
        assert_eq!(p.status(), PipelineStatus::TrackingLow);
        assert_eq!(*live_at_request.borrow(), vec![0, 0]);
    }

    #[test]
    fn test_tick_draws_frame_and_skeleton() {
        let (mut p, _) = started(ScriptedHost::working(), vec![subject(0.9)]);
        let mut canvas = Recorder::default();
        p.tick(&mut canvas);

        let ops = canvas.last_frame();
        assert_eq!(ops[0], Op::Clear);
        assert!(matches!(ops[1], Op::Image(..)));
        assert!(ops.iter().any(|op| matches!(op, Op::Line(..))));
        assert!(ops.contains(&Op::Text("90".to_string())));
    }

    #[test]
    fn test_inference_error_is_treated_as_no_subject() {
        let (mut p, _) = started(
            ScriptedHost::working(),
            vec![subject(0.9), Step::Fail("backend lost"), subject(0.9)],
        );
        let mut canvas = Recorder::default();

        p.tick(&mut canvas);
        assert_eq!(p.tick(&mut canvas), Tick::Rendered);
        assert_eq!(p.status(), PipelineStatus::NoSubject);
        assert_eq!(p.stats().inference_errors(), 1);

        // ループは続く
        assert_eq!(p.tick(&mut canvas), Tick::Rendered);
        assert_eq!(p.status(), PipelineStatus::TrackingHigh);
    }

    #[test]
    fn test_permission_denied_stays_in_error() {
        let host = ScriptedHost::broken(DeviceError::PermissionDenied);
        let requests = host.requests.clone();
        let (mut p, log) = pipeline(host, ScriptedModel::new(vec![]));
        p.initialize().unwrap();

        let err = p.start().unwrap_err();
        assert_eq!(
            err,
            PipelineError::Acquisition(crate::error::AcquisitionFailure::new(
                AcquisitionCause::PermissionDenied,
                "permission denied"
            ))
        );
        assert_eq!(p.status(), PipelineStatus::Error);
        assert!(log.borrow().last().unwrap().text.contains("permission denied"));

        // 自動リトライはしない
        let attempts = requests.borrow().len();
        let mut canvas = Recorder::default();
        assert_eq!(p.tick(&mut canvas), Tick::Stopped(StopReason::NoSession));
        assert_eq!(p.run(&mut FakeDisplay::new(5)), StopReason::NoSession);
        assert_eq!(p.start(), Err(PipelineError::NotReady));
        assert_eq!(requests.borrow().len(), attempts);
        assert_eq!(p.status(), PipelineStatus::Error);
    }

    #[test]
    fn test_hardware_unavailable_model() {
        let mut model = ScriptedModel::new(vec![]);
        model.available = vec![Backend::Cpu];
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink_log = log.clone();
        let mut p = PosePipeline::new(
            AcquisitionManager::new(ScriptedHost::working(), Constraints::default()),
            InferenceAdapter::new(
                model,
                AdapterOptions {
                    require_acceleration: true,
                    ..AdapterOptions::default()
                },
            ),
            move |f: &Feedback| sink_log.borrow_mut().push(f.clone()),
        );

        assert_eq!(p.initialize(), Err(ModelInitFailure::HardwareUnavailable));
        assert_eq!(p.status(), PipelineStatus::Error);
        assert_eq!(
            log.borrow().last().unwrap().text,
            "Hardware acceleration required for pose tracking"
        );
    }

    #[test]
    fn test_retry_reloads_model() {
        let mut model = ScriptedModel::new(vec![]);
        model.load_error = Some("corrupt weights");
        let (mut p, _) = pipeline(ScriptedHost::working(), model);

        assert!(p.initialize().is_err());
        assert_eq!(p.status(), PipelineStatus::Error);

        // 同じモデルで再試行しても失敗し、再び Error
        assert!(p.retry().is_err());
        assert_eq!(p.status(), PipelineStatus::Error);
        assert_eq!(p.adapter().model().loads, 2);
    }

    #[test]
    fn test_stop_clears_flag_then_releases_device() {
        let host = ScriptedHost::working();
        let live = host.live_streams.clone();
        let (mut p, _) = started(host, vec![subject(0.9)]);
        let handle = p.stop_handle();
        let mut canvas = Recorder::default();
        p.tick(&mut canvas);
        assert_eq!(*live.borrow(), 1);

        p.stop();
        assert!(!handle.is_running());
        assert_eq!(*live.borrow(), 0);
        assert!(!p.has_session());
        assert!(p.smoothing_state().is_none());
        assert_eq!(p.status(), PipelineStatus::AwaitingStream);
        assert_eq!(p.tick(&mut canvas), Tick::Stopped(StopReason::NoSession));
    }

    #[test]
    fn test_external_stop_handle_ends_run() {
        let host = ScriptedHost::working();
        let live = host.live_streams.clone();
        let (mut p, _) = started(host, vec![]);
        p.stop_handle().stop();

        let mut display = FakeDisplay::new(10);
        assert_eq!(p.run(&mut display), StopReason::Requested);
        assert_eq!(display.refreshes, 0);
        assert_eq!(*live.borrow(), 0);
    }

    #[test]
    fn test_restart_releases_previous_stream_first() {
        let host = ScriptedHost::working();
        let live = host.live_streams.clone();
        let live_at_request = host.live_at_request.clone();
        let (mut p, _) = started(host, vec![]);

        p.start().unwrap();
        p.retry().unwrap();
        assert_eq!(*live_at_request.borrow(), vec![0, 0, 0]);
        assert_eq!(*live.borrow(), 1);
    }

    #[test]
    fn test_retry_after_acquisition_failure() {
        let host = ScriptedHost::broken(DeviceError::NotFound);
        let (mut p, log) = pipeline(host, ScriptedModel::new(vec![subject(0.9)]));
        p.initialize().unwrap();
        assert!(p.start().is_err());
        assert_eq!(p.status(), PipelineStatus::Error);

        // retry はデバイスがまだ無ければ再び Error に戻る
        assert!(p.retry().is_err());
        assert_eq!(p.status(), PipelineStatus::Error);
        let texts: Vec<String> = log.borrow().iter().map(|f| f.text.clone()).collect();
        assert!(texts.contains(&"Waiting for camera...".to_string()));
        assert_eq!(
            texts.last().map(String::as_str),
            Some("No camera found - connect a camera and retry")
        );
    }

    #[test]
    fn test_run_until_display_closed() {
        let (mut p, _) = started(ScriptedHost::working(), vec![]);
        let mut display = FakeDisplay::new(3);
        display.skipped = 2;

        assert_eq!(p.run(&mut display), StopReason::DisplayClosed);
        assert_eq!(p.stats().frames(), 3);
        assert_eq!(p.stats().dropped(), 6);
        assert!(!p.has_session());
    }

    #[test]
    fn test_run_until_stream_ends() {
        let host = ScriptedHost {
            ended_after: Some(2),
            ..ScriptedHost::working()
        };
        let live = host.live_streams.clone();
        let (mut p, _) = started(host, vec![subject(0.9), subject(0.9)]);

        let mut display = FakeDisplay::new(10);
        assert_eq!(p.run(&mut display), StopReason::StreamEnded);
        assert_eq!(p.stats().frames(), 2);
        assert_eq!(display.refreshes, 3);
        assert_eq!(*live.borrow(), 0);
        assert_eq!(p.status(), PipelineStatus::AwaitingStream);
    }
}
