//! Spring 参考系
//!
//! 存在中心骨骼时，中心骨骼本帧的位移会平移所有关节的历史尾端位置，
//! 骨链的惯性相对中心骨骼计算，角色整体移动时不会被世界空间拖拽。

use glam::DVec3;

use crate::skeleton::BoneSet;
use super::spring::Spring;

/// 更新中心骨骼参考系，返回本帧的中心位移
///
/// 首次使用（或重置后）只记录位置，位移为零。
/// 无中心骨骼或中心骨骼缺失时位移恒为零。
pub fn update_center_space(spring: &mut Spring, bones: &BoneSet) -> DVec3 {
    let center_position = spring.center.and_then(|idx| bones.world_position(idx));
    let state = &mut spring.animation_state;

    let Some(current) = center_position else {
        state.use_center_space = false;
        return DVec3::ZERO;
    };

    let previous = if state.use_center_space {
        state.previous_center_world
    } else {
        state.use_center_space = true;
        current
    };
    state.previous_center_world = current;
    current - previous
}

/// 把中心位移应用到所有关节的历史状态
pub fn apply_center_delta(spring: &mut Spring, delta: DVec3) {
    if delta == DVec3::ZERO {
        return;
    }
    for joint in &mut spring.joints {
        joint.animation_state.translate(delta);
    }
}
