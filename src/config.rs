use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::camera::{Constraints, Facing};
use crate::pose::{AdapterOptions, Backend};

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub guidance: GuidanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// 正面カメラのインデックス
    #[serde(default)]
    pub index: i32,
    /// 背面カメラのインデックス
    #[serde(default = "default_back_index")]
    pub back_index: i32,
    #[serde(default = "default_facing")]
    pub facing: Facing,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_camera_fps")]
    pub fps: u32,
    /// レガシーAPIで順に試すインデックス
    #[serde(default = "default_legacy_indices")]
    pub legacy_indices: Vec<i32>,
}

fn default_back_index() -> i32 { 1 }
fn default_facing() -> Facing { Facing::Front }
fn default_width() -> u32 { 640 }
fn default_height() -> u32 { 480 }
fn default_camera_fps() -> u32 { 30 }
fn default_legacy_indices() -> Vec<i32> { vec![0, 1, 2] }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            back_index: default_back_index(),
            facing: default_facing(),
            width: default_width(),
            height: default_height(),
            fps: default_camera_fps(),
            legacy_indices: default_legacy_indices(),
        }
    }
}

impl CameraConfig {
    /// 第1ティアの理想条件
    pub fn constraints(&self) -> Constraints {
        Constraints {
            facing: self.facing,
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
    /// 実行バックエンドの優先順
    #[serde(default = "default_backends")]
    pub backends: Vec<Backend>,
    /// CPUしか使えない場合は初期化失敗にする
    #[serde(default)]
    pub require_acceleration: bool,
}

fn default_model_path() -> String { "models/movenet_lightning.onnx".to_string() }
fn default_backends() -> Vec<Backend> { vec![Backend::Cuda, Backend::CoreMl, Backend::Cpu] }

impl ModelConfig {
    pub fn adapter_options(&self) -> AdapterOptions {
        AdapterOptions {
            backends: self.backends.clone(),
            require_acceleration: self.require_acceleration,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            backends: default_backends(),
            require_acceleration: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_point_radius")]
    pub point_radius: i32,
    #[serde(default = "default_target_fps")]
    pub target_fps: u32,
    #[serde(default = "default_label_scale")]
    pub label_scale: f64,
}

fn default_title() -> String { "Posture Overlay".to_string() }
fn default_point_radius() -> i32 { 4 }
fn default_target_fps() -> u32 { 30 }
fn default_label_scale() -> f64 { 0.6 }

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            point_radius: default_point_radius(),
            target_fps: default_target_fps(),
            label_scale: default_label_scale(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuidanceConfig {
    #[serde(default = "default_guidance_targets")]
    pub targets: Vec<GuidanceTarget>,
}

/// 関節の目標角度
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GuidanceTarget {
    /// 関節ラベル (e.g. "left knee")
    pub joint: String,
    /// 目標角度（度）
    pub target: f32,
    /// 許容誤差（度）
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

fn default_tolerance() -> f32 { 15.0 }

fn default_guidance_targets() -> Vec<GuidanceTarget> {
    ["left knee", "right knee"]
        .iter()
        .map(|joint| GuidanceTarget {
            joint: joint.to_string(),
            target: 90.0,
            tolerance: default_tolerance(),
        })
        .collect()
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            targets: default_guidance_targets(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// 読めなければ警告してデフォルト値を使う
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("{:#}; using default configuration", e);
                Self::default()
            }
        }
    }
}
