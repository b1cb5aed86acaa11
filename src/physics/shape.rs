//! 碰撞形状
//!
//! ColliderShape 是编辑期（骨骼局部空间）的形状参数；
//! WorldShape 是每帧解析到世界空间后的形状，5 种变体共用一个 `collide`。

use glam::DVec3;

/// 退化几何判定阈值
pub const SHAPE_EPSILON: f64 = 1e-8;

/// 退化几何时的推出方向
pub const FALLBACK_DIRECTION: DVec3 = DVec3::new(0.0, 0.0, -1.0);

/// 退化几何时的穿透距离
pub const FALLBACK_DISTANCE: f64 = -0.01;

/// 碰撞体形状（骨骼局部空间）
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ColliderShape {
    Sphere { offset: DVec3, radius: f64 },
    Capsule { offset: DVec3, radius: f64, tail: DVec3 },
    Plane { offset: DVec3, normal: DVec3 },
}

impl ColliderShape {
    pub fn sphere(offset: DVec3, radius: f64) -> Self {
        Self::Sphere { offset, radius: radius.max(0.0) }
    }

    pub fn capsule(offset: DVec3, radius: f64, tail: DVec3) -> Self {
        Self::Capsule { offset, radius: radius.max(0.0), tail }
    }

    pub fn plane(offset: DVec3, normal: DVec3) -> Self {
        Self::Plane { offset, normal }
    }

    /// 平面没有内外之分
    #[inline]
    pub fn supports_inside(&self) -> bool {
        !matches!(self, Self::Plane { .. })
    }
}

/// 世界空间碰撞形状
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum WorldShape {
    Sphere { offset: DVec3, radius: f64 },
    SphereInside { offset: DVec3, radius: f64 },
    Capsule { offset: DVec3, radius: f64, tail: DVec3 },
    CapsuleInside { offset: DVec3, radius: f64, tail: DVec3 },
    Plane { offset: DVec3, normal: DVec3 },
}

impl WorldShape {
    /// 构造胶囊体，线段长度过短时退化为球体
    pub fn capsule(offset: DVec3, radius: f64, tail: DVec3, inside: bool) -> Self {
        let degenerate = (tail - offset).length_squared() < SHAPE_EPSILON;
        match (degenerate, inside) {
            (true, false) => Self::Sphere { offset, radius },
            (true, true) => Self::SphereInside { offset, radius },
            (false, false) => Self::Capsule { offset, radius, tail },
            (false, true) => Self::CapsuleInside { offset, radius, tail },
        }
    }

    pub fn sphere(offset: DVec3, radius: f64, inside: bool) -> Self {
        if inside {
            Self::SphereInside { offset, radius }
        } else {
            Self::Sphere { offset, radius }
        }
    }

    /// 平面法线归一化，零向量退化为 (0,0,1)
    pub fn plane(offset: DVec3, normal: DVec3) -> Self {
        let normal = normal.try_normalize().unwrap_or(DVec3::Z);
        Self::Plane { offset, normal }
    }

    /// 计算目标球体与形状的碰撞
    ///
    /// 返回 `(direction, signed_distance)`：距离为负表示沿 direction 穿透了 |signed_distance|。
    pub fn collide(&self, target: DVec3, target_radius: f64) -> (DVec3, f64) {
        match *self {
            Self::Sphere { offset, radius } => {
                sphere_outside(offset, radius, target, target_radius)
            }
            Self::SphereInside { offset, radius } => {
                sphere_inside(offset, radius, target, target_radius)
            }
            Self::Capsule { offset, radius, tail } => {
                let nearest = nearest_point_on_segment(offset, tail, target);
                sphere_outside(nearest, radius, target, target_radius)
            }
            Self::CapsuleInside { offset, radius, tail } => {
                let nearest = nearest_point_on_segment(offset, tail, target);
                sphere_inside(nearest, radius, target, target_radius)
            }
            Self::Plane { offset, normal } => {
                let distance = (target - offset).dot(normal) - target_radius;
                (normal, distance)
            }
        }
    }
}

fn sphere_outside(center: DVec3, radius: f64, target: DVec3, target_radius: f64) -> (DVec3, f64) {
    let delta = target - center;
    let length = delta.length();
    if length < SHAPE_EPSILON {
        return (FALLBACK_DIRECTION, FALLBACK_DISTANCE);
    }
    (delta / length, length - target_radius - radius)
}

fn sphere_inside(center: DVec3, radius: f64, target: DVec3, target_radius: f64) -> (DVec3, f64) {
    let delta = target - center;
    let length = delta.length();
    if length < SHAPE_EPSILON {
        return (FALLBACK_DIRECTION, FALLBACK_DISTANCE);
    }
    (-delta / length, -length - target_radius + radius)
}

/// 线段 [start, end] 上距 target 最近的点
fn nearest_point_on_segment(start: DVec3, end: DVec3, target: DVec3) -> DVec3 {
    let segment = end - start;
    let length_squared = segment.length_squared();
    if length_squared < SHAPE_EPSILON {
        return start;
    }
    let ratio = ((target - start).dot(segment) / length_squared).clamp(0.0, 1.0);
    start + segment * ratio
}
