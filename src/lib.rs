//! Spring Bone 运行时引擎
//!
//! 为角色骨骼上的头发、裙摆、尾巴等悬挂骨链提供二次运动模拟。
//!
//! 模块划分：
//! - skeleton: 骨骼层次结构（BoneLink / BoneSet）
//! - physics: 碰撞形状、世界碰撞体、骨链构建、关节积分、参考系、时钟调度
//! - loader: JSON 配置读写

pub mod skeleton;
pub mod physics;
pub mod loader;

use thiserror::Error;

pub use skeleton::{BoneFlags, BoneLink, BoneSet, BoneTransform};
pub use physics::{
    Collider, ColliderGroup, ColliderShape, SchedulerState, Spring, SpringBoneConfig,
    SpringJoint, SpringRig,
};
pub use loader::SpringBoneFile;

/// 引擎错误类型
#[derive(Debug, Error)]
pub enum SpringBoneError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid spring bone config: {0}")]
    InvalidConfig(String),

    #[error("invalid frame rate: {0}")]
    InvalidFrameRate(String),
}

pub type Result<T> = std::result::Result<T, SpringBoneError>;
