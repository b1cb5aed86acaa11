//! 骨骼节点
//!
//! BoneLink 是骨骼系统的核心单元，每个 BoneLink 代表骨骼层次中的一个节点。
//! Spring Bone 只写入 physics_rotate，其余动画数据由宿主驱动。

use glam::{DMat4, DQuat, DVec3};
use bitflags::bitflags;

// ============================================================================
// 骨骼标志
// ============================================================================

bitflags! {
    /// 骨骼标志位
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BoneFlags: u32 {
        /// 继承父骨骼旋转
        const INHERIT_ROTATION = 1 << 0;
        /// 当前姿态由 Spring Bone 驱动
        const PHYSICS_DRIVEN = 1 << 1;
        /// 层级中存在环（父链无法到达根）
        const CYCLIC = 1 << 2;
    }
}

// ============================================================================
// 骨骼节点
// ============================================================================

/// 骨骼节点
///
/// - 静态数据：名称、父子关系、静止姿态
/// - 动态数据：动画旋转、物理旋转、每帧更新的变换
/// - 变换计算：local_to_world = parent.local_to_world * local_to_parent
#[derive(Clone, Debug)]
pub struct BoneLink {
    // ========================================
    // 静态数据（初始化后不变）
    // ========================================

    /// 骨骼名称
    pub name: String,

    /// 父骨骼索引 (-1 表示根骨骼)
    pub parent_index: i32,

    /// 骨骼标志
    pub flags: BoneFlags,

    /// 相对于父骨骼的静止偏移
    pub body_shift: DVec3,

    /// 相对于父骨骼的静止旋转
    pub rest_rotation: DQuat,

    /// 静止姿态的世界变换（在 build 时计算）
    pub rest_to_world: DMat4,

    // ========================================
    // 动态数据（每帧更新）
    // ========================================

    /// 动画平移
    pub animation_translate: DVec3,

    /// 动画旋转
    pub animation_rotate: DQuat,

    /// Spring Bone 计算的旋转（PHYSICS_DRIVEN 时替换 animation_rotate）
    pub physics_rotate: DQuat,

    /// 本地变换矩阵 (local_to_parent)
    pub local_to_parent: DMat4,

    /// 全局变换矩阵 (local_to_world)
    pub local_to_world: DMat4,

    /// 是否为叶节点
    pub(crate) is_leaf: bool,
}

impl BoneLink {
    /// 创建新骨骼
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_index: -1,
            flags: BoneFlags::INHERIT_ROTATION,
            body_shift: DVec3::ZERO,
            rest_rotation: DQuat::IDENTITY,
            rest_to_world: DMat4::IDENTITY,
            animation_translate: DVec3::ZERO,
            animation_rotate: DQuat::IDENTITY,
            physics_rotate: DQuat::IDENTITY,
            local_to_parent: DMat4::IDENTITY,
            local_to_world: DMat4::IDENTITY,
            is_leaf: true,
        }
    }

    /// 设置父骨骼
    pub fn with_parent(mut self, parent: usize) -> Self {
        self.parent_index = parent as i32;
        self
    }

    /// 设置静止姿态（相对父骨骼）
    pub fn with_rest(mut self, offset: DVec3, rotation: DQuat) -> Self {
        self.body_shift = offset;
        self.rest_rotation = rotation.normalize();
        self
    }

    /// 设置是否继承父骨骼旋转
    pub fn with_inherit_rotation(mut self, inherit: bool) -> Self {
        self.flags.set(BoneFlags::INHERIT_ROTATION, inherit);
        self
    }

    // ========================================
    // 访问器
    // ========================================

    /// 父骨骼索引
    #[inline]
    pub fn parent_id(&self) -> Option<usize> {
        if self.parent_index >= 0 {
            Some(self.parent_index as usize)
        } else {
            None
        }
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.is_leaf
    }

    /// 获取世界位置
    #[inline]
    pub fn position(&self) -> DVec3 {
        self.local_to_world.w_axis.truncate()
    }

    /// 获取世界旋转
    #[inline]
    pub fn rotation(&self) -> DQuat {
        let (_, rotation, _) = self.local_to_world.to_scale_rotation_translation();
        rotation
    }

    /// 静止姿态的世界旋转
    #[inline]
    pub fn rest_world_rotation(&self) -> DQuat {
        let (_, rotation, _) = self.rest_to_world.to_scale_rotation_translation();
        rotation
    }

    /// 当前生效的姿态旋转
    #[inline]
    pub fn pose_rotation(&self) -> DQuat {
        if self.flags.contains(BoneFlags::PHYSICS_DRIVEN) {
            self.physics_rotate
        } else {
            self.animation_rotate
        }
    }

    /// 静止姿态的本地变换
    #[inline]
    pub fn rest_local(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.rest_rotation, self.body_shift)
    }

    // ========================================
    // 变换计算
    // ========================================

    /// 写入 Spring Bone 旋转
    #[inline]
    pub fn set_physics_rotation(&mut self, rotation: DQuat) {
        self.physics_rotate = rotation;
        self.flags.insert(BoneFlags::PHYSICS_DRIVEN);
    }

    /// 清除 Spring Bone 旋转，恢复动画旋转
    #[inline]
    pub fn clear_physics(&mut self) {
        self.physics_rotate = DQuat::IDENTITY;
        self.flags.remove(BoneFlags::PHYSICS_DRIVEN);
    }

    /// 计算本地变换 (local_to_parent)
    ///
    /// 平移 = body_shift + animation_translate
    /// 旋转 = rest_rotation * 姿态旋转
    pub fn compute_local_transform(&mut self) {
        let translate = self.body_shift + self.animation_translate;
        let rotation = self.rest_rotation * self.pose_rotation();
        self.local_to_parent = DMat4::from_rotation_translation(rotation, translate);
    }

    /// 由父骨骼世界变换计算本骨骼世界变换
    ///
    /// 不继承旋转的骨骼只跟随父骨骼的位置，朝向为静止世界朝向叠加姿态旋转。
    pub(crate) fn compute_world_transform(&mut self, parent_to_world: DMat4) {
        if self.flags.contains(BoneFlags::INHERIT_ROTATION) {
            self.local_to_world = parent_to_world * self.local_to_parent;
        } else {
            let translate = parent_to_world
                .transform_point3(self.body_shift + self.animation_translate);
            let rotation = self.rest_world_rotation() * self.pose_rotation();
            self.local_to_world = DMat4::from_rotation_translation(rotation, translate);
        }
    }

    // ========================================
    // 标志检查方法
    // ========================================

    #[inline]
    pub fn inherits_rotation(&self) -> bool {
        self.flags.contains(BoneFlags::INHERIT_ROTATION)
    }

    #[inline]
    pub fn is_physics_driven(&self) -> bool {
        self.flags.contains(BoneFlags::PHYSICS_DRIVEN)
    }

    #[inline]
    pub fn is_cyclic(&self) -> bool {
        self.flags.contains(BoneFlags::CYCLIC)
    }
}

impl Default for BoneLink {
    fn default() -> Self {
        Self::new(String::new())
    }
}
