//! Spring Bone 装配体
//!
//! 管理碰撞体、碰撞组、Spring 与时钟状态。
//! 流程：每个子步 [解析世界碰撞体 → 各 Spring 并行求解 → 写回骨骼旋转 → 更新全局变换]

use std::time::Instant;

use glam::DQuat;
use rayon::prelude::*;

use crate::Result;
use crate::skeleton::BoneSet;
use super::chain::build_chains;
use super::collider::{
    Collider, ColliderGroup, ColliderGroupId, ColliderId, ColliderIndex, WorldColliders,
};
use super::config::get_config;
use super::integrator::{integrate_chain, PairSolution};
use super::rational::Rational;
use super::reference_frame::{apply_center_delta, update_center_space};
use super::scheduler::{live_interval, SchedulerState};
use super::spring::{Spring, SpringId};

/// Spring Bone 装配体（一个角色一份）
#[derive(Clone, Debug)]
pub struct SpringRig {
    /// 总开关
    pub enabled: bool,
    colliders: Vec<Collider>,
    collider_groups: Vec<ColliderGroup>,
    springs: Vec<Spring>,
    /// id 查找表（配置变化时重建）
    index: ColliderIndex,
    /// 时钟状态
    pub scheduler: SchedulerState,
    /// 最近一次步进是否改变了骨骼
    changed: bool,
}

impl Default for SpringRig {
    fn default() -> Self {
        Self::new()
    }
}

impl SpringRig {
    pub fn new() -> Self {
        Self {
            enabled: true,
            colliders: Vec::new(),
            collider_groups: Vec::new(),
            springs: Vec::new(),
            index: ColliderIndex::default(),
            scheduler: SchedulerState::new(),
            changed: false,
        }
    }

    /// 由完整配置创建
    pub fn from_parts(
        colliders: Vec<Collider>,
        collider_groups: Vec<ColliderGroup>,
        springs: Vec<Spring>,
    ) -> Self {
        let index = ColliderIndex::rebuild(&colliders, &collider_groups);
        let rig = Self {
            colliders,
            collider_groups,
            springs,
            index,
            ..Self::new()
        };
        log::info!(
            "Spring Bone 构建完成: {} Spring ({} 关节), {} 碰撞体, {} 碰撞组",
            rig.springs.len(),
            rig.joint_count(),
            rig.colliders.len(),
            rig.collider_groups.len()
        );
        rig
    }

    // ========================================
    // 配置编辑
    // ========================================

    pub fn add_collider(&mut self, collider: Collider) {
        self.colliders.push(collider);
        self.rebuild_index();
    }

    pub fn remove_collider(&mut self, id: ColliderId) -> Option<Collider> {
        let i = self.index.collider(id)?;
        let removed = self.colliders.remove(i);
        self.rebuild_index();
        Some(removed)
    }

    pub fn add_collider_group(&mut self, group: ColliderGroup) {
        self.collider_groups.push(group);
        self.rebuild_index();
    }

    pub fn remove_collider_group(&mut self, id: ColliderGroupId) -> Option<ColliderGroup> {
        let i = self.index.group(id)?;
        let removed = self.collider_groups.remove(i);
        self.rebuild_index();
        Some(removed)
    }

    pub fn add_spring(&mut self, spring: Spring) {
        self.springs.push(spring);
    }

    pub fn remove_spring(&mut self, id: SpringId) -> Option<Spring> {
        let i = self.springs.iter().position(|s| s.id == id)?;
        Some(self.springs.remove(i))
    }

    fn rebuild_index(&mut self) {
        self.index = ColliderIndex::rebuild(&self.colliders, &self.collider_groups);
    }

    // ========================================
    // 访问器
    // ========================================

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn collider_groups(&self) -> &[ColliderGroup] {
        &self.collider_groups
    }

    pub fn springs(&self) -> &[Spring] {
        &self.springs
    }

    pub fn springs_mut(&mut self) -> &mut [Spring] {
        &mut self.springs
    }

    pub fn spring(&self, id: SpringId) -> Option<&Spring> {
        self.springs.iter().find(|s| s.id == id)
    }

    pub fn joint_count(&self) -> usize {
        self.springs.iter().map(|s| s.joints.len()).sum()
    }

    /// 最近一次步进是否改变了任何骨骼（调用方据此跳过多余的下游计算）
    #[inline]
    pub fn changed(&self) -> bool {
        self.changed
    }

    // ========================================
    // 模拟
    // ========================================

    /// 步进一个子步，返回是否改变了骨骼
    ///
    /// 读取骨骼当前（已求值的）世界变换，写回物理旋转并更新全局变换。
    pub fn step(&mut self, bones: &mut BoneSet, delta_time: f64) -> bool {
        self.changed = false;
        if !self.enabled {
            return false;
        }
        let delta_time = if delta_time.is_finite() { delta_time.max(0.0) } else { 0.0 };

        let solutions = {
            let bones: &BoneSet = bones;
            let world = WorldColliders::resolve(
                &self.colliders,
                &self.collider_groups,
                &self.index,
                &self.springs,
                bones,
            );
            let groups = &self.collider_groups;
            let index = &self.index;

            // Spring 之间没有数据依赖，并行求解后按 Spring 顺序合并
            self.springs
                .par_iter_mut()
                .filter(|spring| spring.enabled)
                .map(|spring| {
                    let delta = update_center_space(spring, bones);
                    apply_center_delta(spring, delta);
                    let colliders = world.for_spring(spring, groups, index);
                    let mut out = Vec::new();
                    for chain in build_chains(&spring.joints, bones) {
                        integrate_chain(
                            &mut spring.joints,
                            &chain,
                            bones,
                            &colliders,
                            delta_time,
                            &mut out,
                        );
                    }
                    out
                })
                .collect::<Vec<Vec<PairSolution>>>()
        };

        self.changed = apply_solutions(bones, solutions.iter().flatten());
        if self.changed {
            bones.update_global_transforms();
        }

        if get_config().debug_log {
            log::debug!(
                "[SpringBone] step dt={:.5} 旋转 {} 骨骼, changed={}",
                delta_time,
                solutions.iter().map(Vec::len).sum::<usize>(),
                self.changed
            );
        }
        self.changed
    }

    /// 清除所有历史与时钟状态，下一次步进从骨骼当前位置重新初始化
    pub fn reset(&mut self) {
        for spring in &mut self.springs {
            spring.reset_state();
        }
        self.scheduler.reset();
        self.changed = false;
    }

    /// 确定性模式：时间轴位置变化，返回执行的子步数
    pub fn advance_timeline(
        &mut self,
        bones: &mut BoneSet,
        frame: Rational,
        fps: Rational,
    ) -> Result<usize> {
        let plan = self.scheduler.plan_timeline(frame, fps)?;
        if plan.reset {
            for spring in &mut self.springs {
                spring.reset_state();
            }
        }
        let mut changed = false;
        for &delta_time in &plan.delta_times {
            changed |= self.step(bones, delta_time);
        }
        self.changed = changed;
        Ok(plan.step_count())
    }

    /// 实时模式：按墙钟时间推进，返回是否步进
    pub fn tick_live(&mut self, bones: &mut BoneSet, now: Instant) -> bool {
        match self.scheduler.plan_live(now) {
            Some(delta_time) => {
                self.step(bones, delta_time);
                true
            }
            None => false,
        }
    }

    /// 阻塞运行实时模式 `ticks` 次（预览/调试用）
    pub fn run_live(&mut self, bones: &mut BoneSet, ticks: usize) {
        let interval = live_interval(get_config().live_tick_hz);
        self.tick_live(bones, Instant::now());
        let mut done = 0;
        while done < ticks {
            std::thread::sleep(interval);
            if self.tick_live(bones, Instant::now()) {
                done += 1;
            }
        }
    }
}

/// 写回骨骼旋转，返回是否有骨骼发生变化
fn apply_solutions<'a>(
    bones: &mut BoneSet,
    solutions: impl Iterator<Item = &'a PairSolution>,
) -> bool {
    let epsilon = get_config().rotation_change_epsilon;
    let mut changed = false;
    for solution in solutions {
        let Some(bone) = bones.get(solution.head_bone) else {
            continue;
        };
        let same = bone.is_physics_driven()
            && rotation_close(bone.pose_rotation(), solution.pose_rotation, epsilon);
        if !same {
            changed = true;
        }
        bones.set_physics_rotation(solution.head_bone, solution.pose_rotation);
    }
    changed
}

fn rotation_close(a: DQuat, b: DQuat, epsilon: f64) -> bool {
    a.dot(b).abs() >= 1.0 - epsilon
}
