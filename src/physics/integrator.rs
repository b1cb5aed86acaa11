//! 关节积分器
//!
//! 对骨链中每个相邻关节对 (head, tail) 依次求解，前一对的结果作为后一对的输入：
//! 1. 头部旋转前世界变换
//! 2. 首次使用时以尾骨骼当前位置初始化历史
//! 3. 惯性 + 刚度 + 重力预测尾端位置
//! 4. 长度约束（当前 head-tail 距离，容忍运行时缩放）
//! 5. 碰撞推出，每次推出后重新施加长度约束
//! 6. 提取最小旋转
//! 7. 保存历史，向下一对传递尾部旋转前变换

use glam::{DMat4, DQuat, DVec3};

use crate::skeleton::BoneSet;
use super::chain::Chain;
use super::shape::WorldShape;
use super::spring::SpringJoint;

/// 单个关节对的求解结果
#[derive(Clone, Copy, Debug)]
pub struct PairSolution {
    /// 头骨骼索引
    pub head_bone: usize,
    /// 写回头骨骼的姿态旋转
    pub pose_rotation: DQuat,
    /// 约束后的尾端世界位置
    pub tail_world: DVec3,
    /// 头部世界位置
    pub head_world: DVec3,
}

/// 求解一条骨链，结果追加到 `out`
pub fn integrate_chain(
    joints: &mut [SpringJoint],
    chain: &Chain,
    bones: &BoneSet,
    colliders: &[WorldShape],
    delta_time: f64,
    out: &mut Vec<PairSolution>,
) {
    let mut next_head_before_rotation: Option<DMat4> = None;

    for (head_index, tail_index) in chain.pairs() {
        let (Some(head_bone_index), Some(tail_bone_index)) =
            (joints[head_index].bone, joints[tail_index].bone)
        else {
            return;
        };
        let (Some(head_bone), Some(tail_bone)) =
            (bones.get(head_bone_index), bones.get(tail_bone_index))
        else {
            return;
        };

        // 1. 头部旋转前世界变换：链首取父骨骼已更新变换 · 静止偏移，其余取上一对的输出
        let head_before_rotation = match next_head_before_rotation {
            Some(matrix) => matrix,
            None => match bones.pose_free_world(head_bone_index) {
                Some(matrix) => matrix,
                None => return,
            },
        };
        let next_head_world = head_before_rotation.w_axis.truncate();

        // 静止姿态下尾部在头部局部空间的位置
        let rest_head_to_tail = head_bone.rest_to_world.inverse() * tail_bone.rest_to_world;
        let rest_tail_local = rest_head_to_tail.w_axis.truncate();

        // 当前（非设计期）head-tail 距离
        let rest_length = (tail_bone.position() - head_bone.position()).length();

        let head_joint = &joints[head_index];
        let drag_force = head_joint.drag_force();
        let stiffness = head_joint.stiffness();
        let gravity = head_joint.gravity_dir() * head_joint.gravity_power();
        let hit_radius = head_joint.hit_radius();

        // 2. 初始化历史
        let state = &mut joints[tail_index].animation_state;
        if !state.initialized {
            state.seed(tail_bone.position());
        }

        // 3. 预测
        let (_, head_rotation, _) = head_before_rotation.to_scale_rotation_translation();
        let stiffness_direction = (head_rotation * rest_tail_local).normalize_or_zero();
        let inertia = (state.current_tail_world - state.previous_tail_world) * (1.0 - drag_force);
        let stiffness_term = stiffness_direction * delta_time * stiffness;
        let external_term = gravity * delta_time;
        let mut next_tail_world =
            state.current_tail_world + inertia + stiffness_term + external_term;

        // 4. 长度约束
        next_tail_world =
            constrain_length(next_head_world, next_tail_world, rest_length, stiffness_direction);

        // 5. 碰撞
        for collider in colliders {
            let (direction, distance) = collider.collide(next_tail_world, hit_radius);
            if distance >= 0.0 {
                continue;
            }
            next_tail_world -= direction * distance;
            next_tail_world = constrain_length(
                next_head_world,
                next_tail_world,
                rest_length,
                stiffness_direction,
            );
        }

        // 6. 旋转提取（头部旋转前局部空间）
        let next_tail_local = head_before_rotation.inverse().transform_point3(next_tail_world);
        let rotation = rotation_between(rest_tail_local, next_tail_local);
        let head_after_rotation = head_before_rotation * DMat4::from_quat(rotation);

        let pose_rotation = if head_bone.inherits_rotation() {
            rotation
        } else {
            // 不继承父旋转的骨骼：以静止世界朝向为基准表达同一世界朝向
            let (_, world_rotation, _) = head_after_rotation.to_scale_rotation_translation();
            (head_bone.rest_world_rotation().inverse() * world_rotation).normalize()
        };

        out.push(PairSolution {
            head_bone: head_bone_index,
            pose_rotation,
            tail_world: next_tail_world,
            head_world: next_head_world,
        });

        // 7. 保存历史并传递
        state.advance(next_tail_world);
        next_head_before_rotation = Some(head_after_rotation * rest_head_to_tail);
    }
}

/// 把尾端拉回到距头部 `length` 的位置
///
/// 尾端与头部重合时沿 `fallback` 方向放置。
fn constrain_length(head: DVec3, tail: DVec3, length: f64, fallback: DVec3) -> DVec3 {
    let direction = (tail - head)
        .try_normalize()
        .or_else(|| fallback.try_normalize())
        .unwrap_or(DVec3::Z);
    head + direction * length
}

/// 把 `from` 方向转到 `to` 方向的最小旋转，退化时为单位旋转
fn rotation_between(from: DVec3, to: DVec3) -> DQuat {
    match (from.try_normalize(), to.try_normalize()) {
        (Some(from), Some(to)) => DQuat::from_rotation_arc(from, to),
        _ => DQuat::IDENTITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use crate::physics::chain::build_chains;
    use crate::skeleton::BoneLink;

    /// 沿 +X 水平伸出的骨链
    fn horizontal_chain(count: usize) -> BoneSet {
        let bones = (0..count)
            .map(|i| {
                let bone = BoneLink::new(format!("hair_{i}"));
                if i == 0 {
                    bone
                } else {
                    bone.with_parent(i - 1).with_rest(DVec3::X, DQuat::IDENTITY)
                }
            })
            .collect();
        BoneSet::new(bones)
    }

    fn solve(
        bones: &BoneSet,
        joints: &mut [SpringJoint],
        colliders: &[WorldShape],
        delta_time: f64,
    ) -> Vec<PairSolution> {
        let mut out = Vec::new();
        for chain in build_chains(joints, bones) {
            integrate_chain(joints, &chain, bones, colliders, delta_time, &mut out);
        }
        out
    }

    #[test]
    fn test_seed_on_first_use() {
        let bones = horizontal_chain(2);
        let mut joints = vec![
            SpringJoint::new(0).with_stiffness(0.0).with_drag_force(1.0),
            SpringJoint::new(1),
        ];
        let out = solve(&bones, &mut joints, &[], 1.0 / 60.0);
        assert_eq!(out.len(), 1);
        assert!(joints[1].animation_state.initialized);
        assert_relative_eq!(joints[1].animation_state.current_tail_world.x, 1.0, epsilon = 1e-12);
        assert!(out[0].pose_rotation.angle_between(DQuat::IDENTITY) < 1e-9);
    }

    #[test]
    fn test_gravity_pulls_tail_down() {
        let bones = horizontal_chain(2);
        let mut joints = vec![
            SpringJoint::new(0)
                .with_stiffness(0.0)
                .with_drag_force(0.0)
                .with_gravity(1.0, DVec3::NEG_Z),
            SpringJoint::new(1),
        ];
        let out = solve(&bones, &mut joints, &[], 1.0 / 60.0);
        let tail = out[0].tail_world;
        assert!(tail.z < 0.0);
        assert_relative_eq!(tail.length(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_stiffness_pushes_along_rest_direction() {
        let bones = horizontal_chain(2);
        let mut joints = vec![
            SpringJoint::new(0).with_stiffness(1.0).with_drag_force(1.0),
            SpringJoint::new(1),
        ];
        // 历史偏离静止方向
        joints[1].animation_state.seed(DVec3::new(0.0, 1.0, 0.0));
        let out = solve(&bones, &mut joints, &[], 0.5);
        let tail = out[0].tail_world;
        assert!(tail.x > 0.0);
        assert_relative_eq!(tail.length(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_length_constraint_on_three_joint_chain() {
        let bones = horizontal_chain(3);
        let mut joints: Vec<SpringJoint> = (0..3)
            .map(|i| {
                SpringJoint::new(i)
                    .with_stiffness(0.3)
                    .with_drag_force(0.2)
                    .with_gravity(2.0, DVec3::new(0.0, 0.3, -1.0))
            })
            .collect();
        for _ in 0..30 {
            let out = solve(&bones, &mut joints, &[], 1.0 / 60.0);
            assert_eq!(out.len(), 2);
            for pair in &out {
                let length = (pair.tail_world - pair.head_world).length();
                assert_relative_eq!(length, 1.0, epsilon = 1e-9);
            }
            // 第二对的头部是第一对的尾端
            assert_relative_eq!(out[1].head_world.distance(out[0].tail_world), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_collision_push_keeps_length() {
        let bones = horizontal_chain(2);
        let mut joints = vec![
            SpringJoint::new(0).with_stiffness(0.0).with_drag_force(1.0).with_hit_radius(0.1),
            SpringJoint::new(1),
        ];
        let colliders = [WorldShape::sphere(DVec3::new(1.0, 0.0, -0.2), 0.3, false)];
        let out = solve(&bones, &mut joints, &colliders, 1.0 / 60.0);
        let tail = out[0].tail_world;
        assert_relative_eq!(tail.length(), 1.0, epsilon = 1e-12);
        // 被推向上方
        assert!(tail.z > 0.0);
    }

    #[test]
    fn test_rotation_maps_rest_direction() {
        let bones = horizontal_chain(2);
        let mut joints = vec![
            SpringJoint::new(0).with_stiffness(0.0).with_drag_force(1.0),
            SpringJoint::new(1),
        ];
        joints[1].animation_state.seed(DVec3::new(0.0, 0.0, -1.0));
        let out = solve(&bones, &mut joints, &[], 1.0 / 60.0);
        let rotated = out[0].pose_rotation * DVec3::X;
        assert_relative_eq!(rotated.z, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_non_inherit_bone_matches_world_orientation() {
        let bones = BoneSet::new(vec![
            BoneLink::new("root").with_rest(DVec3::ZERO, DQuat::from_rotation_z(0.5)),
            BoneLink::new("head")
                .with_parent(0)
                .with_rest(DVec3::X, DQuat::IDENTITY)
                .with_inherit_rotation(false),
            BoneLink::new("tail").with_parent(1).with_rest(DVec3::X, DQuat::IDENTITY),
        ]);
        let mut joints = vec![
            SpringJoint::new(1).with_stiffness(0.0).with_drag_force(1.0),
            SpringJoint::new(2),
        ];
        joints[1].animation_state.seed(bones.world_position(1).unwrap() + DVec3::NEG_Z);
        let out = solve(&bones, &mut joints, &[], 1.0 / 60.0);

        let mut posed = bones.clone();
        posed.set_physics_rotation(1, out[0].pose_rotation);
        posed.update_global_transforms();
        let tail = posed.world_position(2).unwrap();
        assert_relative_eq!(tail.distance(out[0].tail_world), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_delta_time_is_finite() {
        let bones = horizontal_chain(2);
        let mut joints = vec![SpringJoint::new(0), SpringJoint::new(1)];
        let out = solve(&bones, &mut joints, &[], 0.0);
        assert!(out[0].tail_world.is_finite());
        assert!(out[0].pose_rotation.is_finite());
    }
}
