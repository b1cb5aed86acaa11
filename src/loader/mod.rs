//! 配置读写
//!
//! 提供 Spring Bone JSON 配置的解析、构建与导出。

mod spring_json;

pub use spring_json::{
    CapsuleJson, ColliderGroupJson, ColliderJson, JointJson, PlaneJson, ShapeJson, SphereJson,
    SpringBoneFile, SpringJson,
};
