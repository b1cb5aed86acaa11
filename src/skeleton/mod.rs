//! 骨骼系统
//!
//! 核心设计思想：
//! - BoneLink: 单个骨骼节点（静止姿态 + 动画旋转 + 物理旋转）
//! - BoneSet: 管理骨骼层次结构，Spring Bone 从中读取世界变换并写回旋转

mod bone_link;
mod bone_set;

pub use bone_link::{BoneLink, BoneFlags};
pub use bone_set::BoneSet;

use glam::{DVec3, DQuat, DMat4};

// ============================================================================
// 公共类型定义
// ============================================================================

/// 骨骼变换数据
#[derive(Clone, Copy, Debug)]
pub struct BoneTransform {
    pub translation: DVec3,
    pub rotation: DQuat,
    pub scale: DVec3,
}

impl Default for BoneTransform {
    fn default() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
            scale: DVec3::ONE,
        }
    }
}

impl BoneTransform {
    /// 转换为 4x4 矩阵
    #[inline]
    pub fn to_matrix(&self) -> DMat4 {
        DMat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    /// 从矩阵分解
    #[inline]
    pub fn from_matrix(m: DMat4) -> Self {
        let (scale, rotation, translation) = m.to_scale_rotation_translation();
        Self { translation, rotation, scale }
    }

    /// 最大轴向缩放（用于缩放碰撞半径）
    #[inline]
    pub fn max_scale(&self) -> f64 {
        self.scale.abs().max_element()
    }
}
