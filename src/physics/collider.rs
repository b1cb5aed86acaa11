//! 碰撞体、碰撞组与世界碰撞体解析
//!
//! 每帧只对被启用 Spring 引用的碰撞体做一次世界变换，
//! 结果按 id 存表，各关节直接查表，避免重复变换。

use std::collections::HashMap;

use crate::skeleton::{BoneSet, BoneTransform};
use super::shape::{ColliderShape, WorldShape};
use super::spring::Spring;

pub type ColliderId = u32;
pub type ColliderGroupId = u32;

/// 碰撞体
#[derive(Clone, Debug, PartialEq)]
pub struct Collider {
    pub id: ColliderId,
    /// 附着骨骼（None 表示世界空间）
    pub bone: Option<usize>,
    pub shape: ColliderShape,
    /// 反转碰撞语义：碰撞体是容器而非实体（仅球体/胶囊体有效）
    pub inside: bool,
}

impl Collider {
    pub fn new(id: ColliderId, bone: Option<usize>, shape: ColliderShape) -> Self {
        Self { id, bone, shape, inside: false }
    }

    pub fn with_inside(mut self, inside: bool) -> Self {
        self.inside = inside && self.shape.supports_inside();
        self
    }

    /// 按附着骨骼当前世界变换求世界空间形状
    ///
    /// 骨骼缺失时按世界空间处理。
    pub fn to_world(&self, bones: &BoneSet) -> WorldShape {
        let matrix = self
            .bone
            .and_then(|idx| bones.get(idx))
            .map(|bone| bone.local_to_world);

        let Some(matrix) = matrix else {
            return match self.shape {
                ColliderShape::Sphere { offset, radius } => {
                    WorldShape::sphere(offset, radius, self.inside)
                }
                ColliderShape::Capsule { offset, radius, tail } => {
                    WorldShape::capsule(offset, radius, tail, self.inside)
                }
                ColliderShape::Plane { offset, normal } => WorldShape::plane(offset, normal),
            };
        };

        let transform = BoneTransform::from_matrix(matrix);
        let scale = transform.max_scale();
        match self.shape {
            ColliderShape::Sphere { offset, radius } => WorldShape::sphere(
                matrix.transform_point3(offset),
                radius * scale,
                self.inside,
            ),
            ColliderShape::Capsule { offset, radius, tail } => WorldShape::capsule(
                matrix.transform_point3(offset),
                radius * scale,
                matrix.transform_point3(tail),
                self.inside,
            ),
            ColliderShape::Plane { offset, normal } => WorldShape::plane(
                matrix.transform_point3(offset),
                transform.rotation * normal,
            ),
        }
    }
}

/// 碰撞组
#[derive(Clone, Debug, PartialEq)]
pub struct ColliderGroup {
    pub id: ColliderGroupId,
    pub name: String,
    /// 有序碰撞体引用，已删除的碰撞体在解析时跳过
    pub colliders: Vec<ColliderId>,
}

impl ColliderGroup {
    pub fn new(id: ColliderGroupId, name: impl Into<String>, colliders: Vec<ColliderId>) -> Self {
        Self { id, name: name.into(), colliders }
    }
}

/// id → 下标 查找表
#[derive(Clone, Debug, Default)]
pub struct ColliderIndex {
    colliders: HashMap<ColliderId, usize>,
    groups: HashMap<ColliderGroupId, usize>,
}

impl ColliderIndex {
    /// 重建查找表（重复 id 以先出现者为准）
    pub fn rebuild(colliders: &[Collider], groups: &[ColliderGroup]) -> Self {
        let mut index = Self::default();
        for (i, collider) in colliders.iter().enumerate() {
            index.colliders.entry(collider.id).or_insert(i);
        }
        for (i, group) in groups.iter().enumerate() {
            index.groups.entry(group.id).or_insert(i);
        }
        index
    }

    #[inline]
    pub fn collider(&self, id: ColliderId) -> Option<usize> {
        self.colliders.get(&id).copied()
    }

    #[inline]
    pub fn group(&self, id: ColliderGroupId) -> Option<usize> {
        self.groups.get(&id).copied()
    }
}

/// 本帧的世界碰撞体表
#[derive(Clone, Debug, Default)]
pub struct WorldColliders {
    shapes: HashMap<ColliderId, WorldShape>,
}

impl WorldColliders {
    /// 解析所有被启用 Spring 引用的碰撞体
    pub fn resolve(
        colliders: &[Collider],
        groups: &[ColliderGroup],
        index: &ColliderIndex,
        springs: &[Spring],
        bones: &BoneSet,
    ) -> Self {
        let mut shapes = HashMap::new();
        for spring in springs.iter().filter(|s| s.enabled) {
            for collider_id in referenced_colliders(spring, groups, index) {
                if shapes.contains_key(&collider_id) {
                    continue;
                }
                if let Some(i) = index.collider(collider_id) {
                    shapes.insert(collider_id, colliders[i].to_world(bones));
                }
            }
        }
        Self { shapes }
    }

    #[inline]
    pub fn get(&self, id: ColliderId) -> Option<&WorldShape> {
        self.shapes.get(&id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// 按 Spring 的碰撞组顺序收集世界碰撞体
    pub fn for_spring(
        &self,
        spring: &Spring,
        groups: &[ColliderGroup],
        index: &ColliderIndex,
    ) -> Vec<WorldShape> {
        referenced_colliders(spring, groups, index)
            .filter_map(|id| self.get(id).copied())
            .collect()
    }
}

/// Spring 经碰撞组引用的碰撞体 id（保持顺序，悬空引用跳过）
fn referenced_colliders<'a>(
    spring: &'a Spring,
    groups: &'a [ColliderGroup],
    index: &'a ColliderIndex,
) -> impl Iterator<Item = ColliderId> + 'a {
    spring
        .collider_groups
        .iter()
        .filter_map(move |group_id| index.group(*group_id))
        .flat_map(move |i| groups[i].colliders.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::{DQuat, DVec3};
    use crate::skeleton::BoneLink;

    fn origin_sphere(id: ColliderId, radius: f64) -> Collider {
        Collider::new(id, None, ColliderShape::sphere(DVec3::ZERO, radius))
    }

    fn bones() -> BoneSet {
        BoneSet::new(vec![
            BoneLink::new("root"),
            BoneLink::new("arm")
                .with_parent(0)
                .with_rest(
                    DVec3::new(1.0, 0.0, 0.0),
                    DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2),
                ),
        ])
    }

    #[test]
    fn test_attached_collider_follows_bone() {
        let bones = bones();
        let shape = ColliderShape::sphere(DVec3::new(1.0, 0.0, 0.0), 0.5);
        let collider = Collider::new(0, Some(1), shape);
        match collider.to_world(&bones) {
            WorldShape::Sphere { offset, radius } => {
                assert_relative_eq!(offset.x, 1.0, epsilon = 1e-9);
                assert_relative_eq!(offset.y, 1.0, epsilon = 1e-9);
                assert_relative_eq!(radius, 0.5, epsilon = 1e-12);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_missing_bone_is_world_space() {
        let bones = bones();
        let collider = Collider::new(0, Some(42), ColliderShape::sphere(DVec3::ONE, 0.5));
        assert_eq!(collider.to_world(&bones), WorldShape::sphere(DVec3::ONE, 0.5, false));
    }

    #[test]
    fn test_plane_normal_rotates() {
        let bones = bones();
        let collider = Collider::new(0, Some(1), ColliderShape::plane(DVec3::ZERO, DVec3::X));
        match collider.to_world(&bones) {
            WorldShape::Plane { normal, .. } => {
                assert_relative_eq!(normal.y, 1.0, epsilon = 1e-9);
            }
            other => panic!("unexpected shape {other:?}"),
        }
    }

    #[test]
    fn test_plane_ignores_inside_flag() {
        let collider =
            Collider::new(0, None, ColliderShape::plane(DVec3::ZERO, DVec3::Z)).with_inside(true);
        assert!(!collider.inside);
    }

    #[test]
    fn test_resolve_skips_dangling_and_unreferenced() {
        let bones = bones();
        let colliders = vec![origin_sphere(1, 0.5), origin_sphere(2, 0.5)];
        let groups = vec![ColliderGroup::new(10, "group", vec![1, 99])];
        let index = ColliderIndex::rebuild(&colliders, &groups);

        let mut spring = Spring::new(0, "spring");
        spring.collider_groups = vec![10, 77];
        let springs = vec![spring];

        let world = WorldColliders::resolve(&colliders, &groups, &index, &springs, &bones);
        assert_eq!(world.len(), 1);
        assert!(world.get(1).is_some());
        assert!(world.get(2).is_none());
        assert_eq!(world.for_spring(&springs[0], &groups, &index).len(), 1);
    }

    #[test]
    fn test_disabled_spring_contributes_nothing() {
        let bones = bones();
        let colliders = vec![origin_sphere(1, 0.5)];
        let groups = vec![ColliderGroup::new(0, "group", vec![1])];
        let index = ColliderIndex::rebuild(&colliders, &groups);
        let mut spring = Spring::new(0, "spring");
        spring.collider_groups = vec![0];
        spring.enabled = false;

        let world = WorldColliders::resolve(&colliders, &groups, &index, &[spring], &bones);
        assert!(world.is_empty());
    }
}
