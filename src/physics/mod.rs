//! Spring Bone 物理
//!
//! 组件（由底层到上层）：
//! - shape: 碰撞形状与 `collide`
//! - collider: 碰撞体/碰撞组与每帧世界碰撞体解析
//! - chain: 由关节列表构建骨链
//! - integrator: 关节积分（惯性 + 刚度 + 重力、长度约束、碰撞、旋转提取）
//! - reference_frame: 中心骨骼参考系
//! - scheduler: 确定性 / 实时时钟
//! - spring_rig: 装配体入口

pub mod config;
pub mod shape;
pub mod collider;
pub mod spring;
pub mod chain;
pub mod integrator;
pub mod reference_frame;
pub mod rational;
pub mod scheduler;
pub mod spring_rig;

pub use config::{get_config, reset_config, set_config, SpringBoneConfig};
pub use shape::{ColliderShape, WorldShape};
pub use collider::{Collider, ColliderGroup, ColliderGroupId, ColliderId, WorldColliders};
pub use spring::{JointAnimationState, Spring, SpringAnimationState, SpringId, SpringJoint};
pub use chain::{build_chains, Chain};
pub use integrator::{integrate_chain, PairSolution};
pub use rational::Rational;
pub use scheduler::{SchedulerState, TimelinePlan};
pub use spring_rig::SpringRig;
