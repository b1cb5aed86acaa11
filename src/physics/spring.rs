//! Spring 与关节参数
//!
//! 配置部分由外部编辑，引擎只读；AnimationState 由引擎每帧读写。

use glam::DVec3;

use super::collider::ColliderGroupId;

pub type SpringId = u32;

/// 默认重力方向（世界空间 -Z）
pub const DEFAULT_GRAVITY_DIR: DVec3 = DVec3::new(0.0, 0.0, -1.0);

/// 关节作为骨链尾端时的历史状态
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct JointAnimationState {
    pub initialized: bool,
    pub previous_tail_world: DVec3,
    pub current_tail_world: DVec3,
}

impl JointAnimationState {
    /// 以骨骼当前位置初始化历史，速度为零
    #[inline]
    pub fn seed(&mut self, position: DVec3) {
        self.initialized = true;
        self.previous_tail_world = position;
        self.current_tail_world = position;
    }

    /// 平移历史（参考系变化）
    #[inline]
    pub fn translate(&mut self, delta: DVec3) {
        if self.initialized {
            self.previous_tail_world += delta;
            self.current_tail_world += delta;
        }
    }

    /// 推进一步：current → previous，next → current
    #[inline]
    pub fn advance(&mut self, next_tail_world: DVec3) {
        self.previous_tail_world = self.current_tail_world;
        self.current_tail_world = next_tail_world;
    }
}

/// Spring 关节
#[derive(Clone, Debug, PartialEq)]
pub struct SpringJoint {
    /// 绑定骨骼（None 表示未绑定，不参与模拟）
    pub bone: Option<usize>,
    hit_radius: f64,
    stiffness: f64,
    gravity_power: f64,
    gravity_dir: DVec3,
    drag_force: f64,
    pub animation_state: JointAnimationState,
}

impl Default for SpringJoint {
    fn default() -> Self {
        Self {
            bone: None,
            hit_radius: 0.0,
            stiffness: 1.0,
            gravity_power: 0.0,
            gravity_dir: DEFAULT_GRAVITY_DIR,
            drag_force: 0.5,
            animation_state: JointAnimationState::default(),
        }
    }
}

/// 非负且有限，否则取默认值
fn non_negative(value: f64, default: f64) -> f64 {
    if value.is_finite() {
        value.max(0.0)
    } else {
        default
    }
}

impl SpringJoint {
    pub fn new(bone: usize) -> Self {
        Self {
            bone: Some(bone),
            ..Default::default()
        }
    }

    pub fn with_hit_radius(mut self, value: f64) -> Self {
        self.set_hit_radius(value);
        self
    }

    pub fn with_stiffness(mut self, value: f64) -> Self {
        self.set_stiffness(value);
        self
    }

    pub fn with_gravity(mut self, power: f64, dir: DVec3) -> Self {
        self.set_gravity_power(power);
        self.set_gravity_dir(dir);
        self
    }

    pub fn with_drag_force(mut self, value: f64) -> Self {
        self.set_drag_force(value);
        self
    }

    #[inline]
    pub fn hit_radius(&self) -> f64 {
        self.hit_radius
    }

    #[inline]
    pub fn stiffness(&self) -> f64 {
        self.stiffness
    }

    #[inline]
    pub fn gravity_power(&self) -> f64 {
        self.gravity_power
    }

    /// 单位长度重力方向
    #[inline]
    pub fn gravity_dir(&self) -> DVec3 {
        self.gravity_dir
    }

    #[inline]
    pub fn drag_force(&self) -> f64 {
        self.drag_force
    }

    pub fn set_hit_radius(&mut self, value: f64) {
        self.hit_radius = non_negative(value, 0.0);
    }

    pub fn set_stiffness(&mut self, value: f64) {
        self.stiffness = non_negative(value, 1.0);
    }

    pub fn set_gravity_power(&mut self, value: f64) {
        self.gravity_power = non_negative(value, 0.0);
    }

    /// 归一化重力方向，零向量或非有限值重置为 (0,0,-1)
    pub fn set_gravity_dir(&mut self, dir: DVec3) {
        self.gravity_dir = dir.try_normalize().unwrap_or(DEFAULT_GRAVITY_DIR);
    }

    pub fn set_drag_force(&mut self, value: f64) {
        self.drag_force = if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.5 };
    }
}

/// Spring 的参考系状态
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SpringAnimationState {
    pub use_center_space: bool,
    pub previous_center_world: DVec3,
}

/// Spring：一组关节 + 可选中心骨骼 + 碰撞组
#[derive(Clone, Debug, PartialEq)]
pub struct Spring {
    pub id: SpringId,
    pub name: String,
    pub enabled: bool,
    pub joints: Vec<SpringJoint>,
    /// 中心骨骼，存在时骨链在其参考系中运动
    pub center: Option<usize>,
    pub collider_groups: Vec<ColliderGroupId>,
    pub animation_state: SpringAnimationState,
}

impl Spring {
    pub fn new(id: SpringId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            enabled: true,
            joints: Vec::new(),
            center: None,
            collider_groups: Vec::new(),
            animation_state: SpringAnimationState::default(),
        }
    }

    pub fn with_joints(mut self, joints: Vec<SpringJoint>) -> Self {
        self.joints = joints;
        self
    }

    pub fn with_center(mut self, center: Option<usize>) -> Self {
        self.center = center;
        self
    }

    pub fn with_collider_groups(mut self, groups: Vec<ColliderGroupId>) -> Self {
        self.collider_groups = groups;
        self
    }

    /// 清除所有历史状态，下一帧从骨骼当前位置重新初始化
    pub fn reset_state(&mut self) {
        self.animation_state = SpringAnimationState::default();
        for joint in &mut self.joints {
            joint.animation_state = JointAnimationState::default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gravity_dir_normalized() {
        let joint = SpringJoint::new(0).with_gravity(1.0, DVec3::new(0.0, 3.0, 4.0));
        assert!((joint.gravity_dir().length() - 1.0).abs() < 1e-12);
        assert!((joint.gravity_dir().y - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_degenerate_gravity_dir_resets() {
        let mut joint = SpringJoint::new(0).with_gravity(1.0, DVec3::X);
        joint.set_gravity_dir(DVec3::ZERO);
        assert_eq!(joint.gravity_dir(), DEFAULT_GRAVITY_DIR);
        joint.set_gravity_dir(DVec3::new(f64::NAN, 0.0, 1.0));
        assert_eq!(joint.gravity_dir(), DEFAULT_GRAVITY_DIR);
    }

    #[test]
    fn test_parameters_clamped() {
        let joint = SpringJoint::new(0)
            .with_hit_radius(-1.0)
            .with_stiffness(-2.0)
            .with_gravity(-3.0, DVec3::Z)
            .with_drag_force(1.5);
        assert_eq!(joint.hit_radius(), 0.0);
        assert_eq!(joint.stiffness(), 0.0);
        assert_eq!(joint.gravity_power(), 0.0);
        assert_eq!(joint.drag_force(), 1.0);
    }

    #[test]
    fn test_translate_ignores_uninitialized() {
        let mut state = JointAnimationState::default();
        state.translate(DVec3::ONE);
        assert_eq!(state.current_tail_world, DVec3::ZERO);

        state.seed(DVec3::X);
        state.translate(DVec3::Y);
        assert_eq!(state.previous_tail_world, DVec3::new(1.0, 1.0, 0.0));
        assert_eq!(state.current_tail_world, DVec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn test_reset_state() {
        let mut spring = Spring::new(0, "hair").with_joints(vec![SpringJoint::new(0)]);
        spring.joints[0].animation_state.seed(DVec3::ONE);
        spring.animation_state.use_center_space = true;
        spring.reset_state();
        assert!(!spring.joints[0].animation_state.initialized);
        assert!(!spring.animation_state.use_center_space);
    }
}
