//! Spring Bone JSON 配置读写
//!
//! 布局：
//! - colliders[]: { node, shape: { sphere | capsule | plane }, extensions? }
//! - colliderGroups[]: { name, colliders: [collider_index...] }
//! - springs[]: { name, joints: [...], center?, colliderGroups: [group_index...] }
//!
//! 节点引用是骨骼列表下标，越界视为未绑定。碰撞体/碰撞组 id 取其在数组中的下标。

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::{Result, SpringBoneError};
use crate::physics::{
    Collider, ColliderGroup, ColliderShape, Spring, SpringJoint, SpringRig,
};
use crate::physics::spring::DEFAULT_GRAVITY_DIR;

const EXTENDED_COLLIDER: &str = "VRMC_springBone_extended_collider";

// ============================================================================
// 文件结构
// ============================================================================

/// Spring Bone 配置文件
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpringBoneFile {
    #[serde(default)]
    pub colliders: Vec<ColliderJson>,
    #[serde(default)]
    pub collider_groups: Vec<ColliderGroupJson>,
    #[serde(default)]
    pub springs: Vec<SpringJson>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColliderJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<i64>,
    #[serde(default)]
    pub shape: ShapeJson,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<ColliderExtensions>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColliderExtensions {
    #[serde(
        rename = "VRMC_springBone_extended_collider",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub extended_collider: Option<ExtendedColliderJson>,
}

/// 扩展碰撞体：存在时覆盖基础形状
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtendedColliderJson {
    #[serde(default)]
    pub shape: ShapeJson,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sphere: Option<SphereJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capsule: Option<CapsuleJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plane: Option<PlaneJson>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SphereJson {
    #[serde(default)]
    pub offset: [f64; 3],
    #[serde(default)]
    pub radius: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub inside: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CapsuleJson {
    #[serde(default)]
    pub offset: [f64; 3],
    #[serde(default)]
    pub radius: f64,
    #[serde(default)]
    pub tail: [f64; 3],
    #[serde(default, skip_serializing_if = "is_false")]
    pub inside: bool,
}

fn default_plane_normal() -> [f64; 3] {
    [0.0, 0.0, 1.0]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaneJson {
    #[serde(default)]
    pub offset: [f64; 3],
    #[serde(default = "default_plane_normal")]
    pub normal: [f64; 3],
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ColliderGroupJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub colliders: Vec<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpringJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub joints: Vec<JointJson>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<i64>,
    #[serde(default)]
    pub collider_groups: Vec<i64>,
}

fn default_stiffness() -> f64 {
    1.0
}

fn default_gravity_dir() -> [f64; 3] {
    DEFAULT_GRAVITY_DIR.to_array()
}

fn default_drag_force() -> f64 {
    0.5
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JointJson {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<i64>,
    #[serde(default)]
    pub hit_radius: f64,
    #[serde(default = "default_stiffness")]
    pub stiffness: f64,
    #[serde(default)]
    pub gravity_power: f64,
    #[serde(default = "default_gravity_dir")]
    pub gravity_dir: [f64; 3],
    #[serde(default = "default_drag_force")]
    pub drag_force: f64,
}

// ============================================================================
// 读取
// ============================================================================

impl SpringBoneFile {
    /// 从文件路径加载
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        Self::load_from_reader(&mut reader)
    }

    /// 从字节切片加载
    pub fn load_from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// 从 Reader 加载
    pub fn load_from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// 序列化为 JSON 字符串
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 构建 SpringRig
    ///
    /// `bone_count` 用于校验节点引用，越界的节点视为未绑定。
    pub fn to_rig(&self, bone_count: usize) -> Result<SpringRig> {
        let node = |value: Option<i64>| -> Option<usize> {
            let index = value?;
            match usize::try_from(index) {
                Ok(i) if i < bone_count => Some(i),
                _ => {
                    log::debug!(
                        "[SpringBone] 节点 {} 越界 (骨骼数 {}), 视为未绑定",
                        index,
                        bone_count
                    );
                    None
                }
            }
        };

        let colliders = self
            .colliders
            .iter()
            .enumerate()
            .map(|(i, json)| {
                let (shape, inside) = json.resolve_shape().ok_or_else(|| {
                    SpringBoneError::InvalidConfig(format!("collider {i} has no shape"))
                })?;
                Ok(Collider::new(i as u32, node(json.node), shape).with_inside(inside))
            })
            .collect::<Result<Vec<_>>>()?;

        let collider_groups = self
            .collider_groups
            .iter()
            .enumerate()
            .map(|(i, json)| {
                let ids = json.colliders.iter().filter_map(|&c| u32::try_from(c).ok()).collect();
                ColliderGroup::new(i as u32, json.name.clone(), ids)
            })
            .collect();

        let springs = self
            .springs
            .iter()
            .enumerate()
            .map(|(i, json)| {
                let joints = json
                    .joints
                    .iter()
                    .map(|joint| {
                        let mut spring_joint = SpringJoint::default();
                        spring_joint.bone = node(joint.node);
                        spring_joint.set_hit_radius(joint.hit_radius);
                        spring_joint.set_stiffness(joint.stiffness);
                        spring_joint.set_gravity_power(joint.gravity_power);
                        spring_joint.set_gravity_dir(DVec3::from_array(joint.gravity_dir));
                        spring_joint.set_drag_force(joint.drag_force);
                        spring_joint
                    })
                    .collect();
                let groups = json
                    .collider_groups
                    .iter()
                    .filter_map(|&g| u32::try_from(g).ok())
                    .collect();
                Spring::new(i as u32, json.name.clone())
                    .with_joints(joints)
                    .with_center(node(json.center))
                    .with_collider_groups(groups)
            })
            .collect();

        Ok(SpringRig::from_parts(colliders, collider_groups, springs))
    }

    /// 由 SpringRig 导出（id 重新编号为数组下标，悬空引用丢弃）
    pub fn from_rig(rig: &SpringRig) -> Self {
        let collider_position = |id: u32| rig.colliders().iter().position(|c| c.id == id);
        let group_position = |id: u32| rig.collider_groups().iter().position(|g| g.id == id);
        let node = |bone: Option<usize>| bone.map(|b| b as i64);

        let colliders = rig.colliders().iter().map(ColliderJson::from_collider).collect();

        let collider_groups = rig
            .collider_groups()
            .iter()
            .map(|group| ColliderGroupJson {
                name: group.name.clone(),
                colliders: group
                    .colliders
                    .iter()
                    .filter_map(|&id| collider_position(id))
                    .map(|p| p as i64)
                    .collect(),
            })
            .collect();

        let springs = rig
            .springs()
            .iter()
            .map(|spring| SpringJson {
                name: spring.name.clone(),
                joints: spring
                    .joints
                    .iter()
                    .map(|joint| JointJson {
                        node: node(joint.bone),
                        hit_radius: joint.hit_radius(),
                        stiffness: joint.stiffness(),
                        gravity_power: joint.gravity_power(),
                        gravity_dir: joint.gravity_dir().to_array(),
                        drag_force: joint.drag_force(),
                    })
                    .collect(),
                center: node(spring.center),
                collider_groups: spring
                    .collider_groups
                    .iter()
                    .filter_map(|&id| group_position(id))
                    .map(|p| p as i64)
                    .collect(),
            })
            .collect();

        Self { colliders, collider_groups, springs }
    }
}

impl ColliderJson {
    /// 扩展形状优先，其次基础形状
    fn resolve_shape(&self) -> Option<(ColliderShape, bool)> {
        self.extensions
            .as_ref()
            .and_then(|ext| ext.extended_collider.as_ref())
            .and_then(|ext| ext.shape.to_shape())
            .or_else(|| self.shape.to_shape())
    }

    /// 平面与内部碰撞体写入扩展，基础形状写一个零半径球体作为回退
    fn from_collider(collider: &Collider) -> Self {
        let node = collider.bone.map(|b| b as i64);
        let shape = ShapeJson::from_shape(&collider.shape, collider.inside);
        let extended = collider.inside || matches!(collider.shape, ColliderShape::Plane { .. });
        if !extended {
            return Self { node, shape, extensions: None };
        }

        let offset = match collider.shape {
            ColliderShape::Sphere { offset, .. }
            | ColliderShape::Capsule { offset, .. }
            | ColliderShape::Plane { offset, .. } => offset,
        };
        let fallback = ShapeJson {
            sphere: Some(SphereJson { offset: offset.to_array(), radius: 0.0, inside: false }),
            ..Default::default()
        };
        log::debug!("[SpringBone] 碰撞体 {} 写入 {}", collider.id, EXTENDED_COLLIDER);
        Self {
            node,
            shape: fallback,
            extensions: Some(ColliderExtensions {
                extended_collider: Some(ExtendedColliderJson { shape }),
            }),
        }
    }
}

impl ShapeJson {
    fn to_shape(&self) -> Option<(ColliderShape, bool)> {
        if let Some(sphere) = &self.sphere {
            return Some((
                ColliderShape::sphere(DVec3::from_array(sphere.offset), sphere.radius),
                sphere.inside,
            ));
        }
        if let Some(capsule) = &self.capsule {
            return Some((
                ColliderShape::capsule(
                    DVec3::from_array(capsule.offset),
                    capsule.radius,
                    DVec3::from_array(capsule.tail),
                ),
                capsule.inside,
            ));
        }
        self.plane.as_ref().map(|plane| {
            (
                ColliderShape::plane(
                    DVec3::from_array(plane.offset),
                    DVec3::from_array(plane.normal),
                ),
                false,
            )
        })
    }

    fn from_shape(shape: &ColliderShape, inside: bool) -> Self {
        match *shape {
            ColliderShape::Sphere { offset, radius } => Self {
                sphere: Some(SphereJson { offset: offset.to_array(), radius, inside }),
                ..Default::default()
            },
            ColliderShape::Capsule { offset, radius, tail } => Self {
                capsule: Some(CapsuleJson {
                    offset: offset.to_array(),
                    radius,
                    tail: tail.to_array(),
                    inside,
                }),
                ..Default::default()
            },
            ColliderShape::Plane { offset, normal } => Self {
                plane: Some(PlaneJson { offset: offset.to_array(), normal: normal.to_array() }),
                ..Default::default()
            },
        }
    }
}
