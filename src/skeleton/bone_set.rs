//! 骨骼集合 - 管理骨骼层次结构
//!
//! BoneSet 负责：
//! - 构建子骨骼缓存与变换顺序（父骨骼先于子骨骼）
//! - 检测父链中的环，环内骨骼按根骨骼处理
//! - 每帧更新全局变换
//! - 祖先/后代查询（供骨链构建使用）

use std::collections::{HashMap, VecDeque};

use glam::{DMat4, DQuat, DVec3};

use super::bone_link::{BoneFlags, BoneLink};

/// 骨骼集合
#[derive(Clone, Debug, Default)]
pub struct BoneSet {
    bones: Vec<BoneLink>,
    /// 子骨骼缓存
    children_cache: Vec<Vec<usize>>,
    /// 变换顺序（父骨骼先于子骨骼，环内骨骼排在最后）
    transform_order: Vec<usize>,
    /// 名称索引
    name_index: HashMap<String, usize>,
}

impl BoneSet {
    /// 由骨骼列表创建并构建层次
    pub fn new(bones: Vec<BoneLink>) -> Self {
        let mut set = Self {
            bones,
            ..Default::default()
        };
        set.build();
        set
    }

    /// 构建层次结构、静止姿态与当前全局变换
    pub fn build(&mut self) {
        let count = self.bones.len();
        self.children_cache = vec![Vec::new(); count];
        self.name_index.clear();

        for (i, bone) in self.bones.iter_mut().enumerate() {
            bone.flags.remove(BoneFlags::CYCLIC);
            self.name_index.entry(bone.name.clone()).or_insert(i);
        }

        let mut roots = Vec::new();
        for i in 0..count {
            match self.valid_parent(i) {
                Some(parent) => self.children_cache[parent].push(i),
                None => roots.push(i),
            }
        }
        for i in 0..count {
            self.bones[i].is_leaf = self.children_cache[i].is_empty();
        }

        // 广度优先生成变换顺序，未访问到的骨骼处于环中
        let mut visited = vec![false; count];
        let mut order = Vec::with_capacity(count);
        let mut queue: VecDeque<usize> = roots.into_iter().collect();
        while let Some(idx) = queue.pop_front() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            order.push(idx);
            queue.extend(self.children_cache[idx].iter().copied());
        }
        let mut cyclic_count = 0;
        for (i, seen) in visited.iter().enumerate() {
            if !seen {
                self.bones[i].flags.insert(BoneFlags::CYCLIC);
                order.push(i);
                cyclic_count += 1;
            }
        }
        if cyclic_count > 0 {
            log::warn!("骨骼层级中存在环: {} 根骨骼按根节点处理", cyclic_count);
        }
        self.transform_order = order;

        // 静止姿态世界变换
        for &idx in &self.transform_order {
            let parent_rest = self
                .hierarchy_parent(idx)
                .map(|p| self.bones[p].rest_to_world)
                .unwrap_or(DMat4::IDENTITY);
            let rest_local = self.bones[idx].rest_local();
            self.bones[idx].rest_to_world = parent_rest * rest_local;
        }

        self.update_global_transforms();
    }

    /// 有效的父骨骼索引（越界或自引用视为无父骨骼）
    fn valid_parent(&self, idx: usize) -> Option<usize> {
        self.bones[idx]
            .parent_id()
            .filter(|&p| p < self.bones.len() && p != idx)
    }

    /// 参与变换计算的父骨骼（环内骨骼按根处理）
    fn hierarchy_parent(&self, idx: usize) -> Option<usize> {
        if self.bones[idx].is_cyclic() {
            None
        } else {
            self.valid_parent(idx)
        }
    }

    /// 按变换顺序更新所有骨骼的全局变换
    pub fn update_global_transforms(&mut self) {
        for i in 0..self.transform_order.len() {
            let idx = self.transform_order[i];
            let parent_world = self
                .hierarchy_parent(idx)
                .map(|p| self.bones[p].local_to_world)
                .unwrap_or(DMat4::IDENTITY);
            let bone = &mut self.bones[idx];
            bone.compute_local_transform();
            bone.compute_world_transform(parent_world);
        }
    }

    // ========================================
    // 查询
    // ========================================

    #[inline]
    pub fn len(&self) -> usize {
        self.bones.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    #[inline]
    pub fn get(&self, idx: usize) -> Option<&BoneLink> {
        self.bones.get(idx)
    }

    #[inline]
    pub fn get_mut(&mut self, idx: usize) -> Option<&mut BoneLink> {
        self.bones.get_mut(idx)
    }

    #[inline]
    pub fn bones(&self) -> &[BoneLink] {
        &self.bones
    }

    pub fn find_by_name(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    pub fn children(&self, idx: usize) -> &[usize] {
        self.children_cache.get(idx).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 骨骼当前世界位置
    #[inline]
    pub fn world_position(&self, idx: usize) -> Option<DVec3> {
        self.bones.get(idx).map(BoneLink::position)
    }

    /// 父骨骼当前世界变换（无父骨骼时为单位矩阵）
    pub fn parent_world(&self, idx: usize) -> DMat4 {
        self.hierarchy_parent(idx)
            .map(|p| self.bones[p].local_to_world)
            .unwrap_or(DMat4::IDENTITY)
    }

    /// 不含自身姿态旋转的当前世界变换
    ///
    /// 父骨骼当前世界变换 · 静止偏移（含动画平移）。Spring Bone 在此基础上叠加旋转。
    pub fn pose_free_world(&self, idx: usize) -> Option<DMat4> {
        let bone = self.bones.get(idx)?;
        let local = DMat4::from_rotation_translation(
            bone.rest_rotation,
            bone.body_shift + bone.animation_translate,
        );
        Some(self.parent_world(idx) * local)
    }

    /// `descendant` 是否为 `ancestor` 的严格后代
    ///
    /// 沿父链向上查找，步数以骨骼总数为上限，遇到环时返回 false。
    pub fn is_descendant(&self, ancestor: usize, descendant: usize) -> bool {
        if ancestor >= self.bones.len() || descendant >= self.bones.len() {
            return false;
        }
        let mut current = descendant;
        for _ in 0..self.bones.len() {
            match self.valid_parent(current) {
                Some(parent) if parent == ancestor => return true,
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }

    // ========================================
    // 写入
    // ========================================

    /// 设置动画旋转（宿主驱动）
    pub fn set_animation_rotation(&mut self, idx: usize, rotation: DQuat) {
        if let Some(bone) = self.bones.get_mut(idx) {
            bone.animation_rotate = rotation;
        }
    }

    /// 设置动画平移（宿主驱动）
    pub fn set_animation_translation(&mut self, idx: usize, translation: DVec3) {
        if let Some(bone) = self.bones.get_mut(idx) {
            bone.animation_translate = translation;
        }
    }

    /// 写入 Spring Bone 旋转
    pub fn set_physics_rotation(&mut self, idx: usize, rotation: DQuat) {
        if let Some(bone) = self.bones.get_mut(idx) {
            bone.set_physics_rotation(rotation);
        }
    }

    /// 清除所有 Spring Bone 旋转
    pub fn clear_physics(&mut self) {
        for bone in &mut self.bones {
            bone.clear_physics();
        }
        self.update_global_transforms();
    }
}
