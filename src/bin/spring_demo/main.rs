//! Spring Bone 演示
//!
//! 用法: spring_demo [config.json] [frames]
//!
//! 未指定配置时使用内置的单条水平骨链。骨骼沿 +X 排成一条直线，
//! 以 30fps 时间轴推进，打印末端骨骼的位置。

use std::env;
use std::process::ExitCode;

use glam::{DQuat, DVec3};
use log::LevelFilter;

use spring_bone_engine::physics::Rational;
use spring_bone_engine::{BoneLink, BoneSet, SpringBoneFile, SpringJoint, SpringRig};

const DEFAULT_FRAMES: i64 = 90;
const HOST_FPS: i64 = 30;

fn main() -> ExitCode {
    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .format_timestamp_millis()
        .format_target(false)
        .parse_default_env()
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> spring_bone_engine::Result<()> {
    let mut args = env::args().skip(1);
    let file = match args.next() {
        Some(path) => {
            log::info!("加载配置: {}", path);
            Some(SpringBoneFile::load(&path)?)
        }
        None => None,
    };
    let frames = args
        .next()
        .and_then(|s| s.parse::<i64>().ok())
        .unwrap_or(DEFAULT_FRAMES);

    let bone_count = file
        .as_ref()
        .map(referenced_bone_count)
        .unwrap_or(0)
        .max(5);
    let mut bones = straight_chain(bone_count);

    let mut rig = match &file {
        Some(file) => file.to_rig(bone_count)?,
        None => builtin_rig(bone_count),
    };

    let fps = Rational::from_integer(HOST_FPS);
    let tail = bone_count - 1;
    let mut total_steps = 0;
    for frame in 0..=frames {
        total_steps += rig.advance_timeline(&mut bones, Rational::from_integer(frame), fps)?;
        if frame % 10 == 0 {
            let p = bones.world_position(tail).unwrap_or_default();
            println!(
                "frame {:4}  steps {:5}  tail ({:8.4}, {:8.4}, {:8.4})",
                frame, total_steps, p.x, p.y, p.z
            );
        }
    }
    Ok(())
}

/// 沿 +X 的直线骨链，每节长度 1
fn straight_chain(count: usize) -> BoneSet {
    let links = (0..count)
        .map(|i| {
            let link = BoneLink::new(format!("bone_{i}"));
            if i == 0 {
                link
            } else {
                link.with_parent(i - 1)
                    .with_rest(DVec3::new(1.0, 0.0, 0.0), DQuat::IDENTITY)
            }
        })
        .collect();
    BoneSet::new(links)
}

fn builtin_rig(bone_count: usize) -> SpringRig {
    let joints = (0..bone_count)
        .map(|i| {
            SpringJoint::new(i)
                .with_stiffness(0.2)
                .with_gravity(1.0, DVec3::new(0.0, 0.0, -1.0))
                .with_drag_force(0.3)
        })
        .collect();
    let spring = spring_bone_engine::Spring::new(0, "demo").with_joints(joints);
    SpringRig::from_parts(Vec::new(), Vec::new(), vec![spring])
}

/// 配置中引用到的最大骨骼下标 + 1
fn referenced_bone_count(file: &SpringBoneFile) -> usize {
    let joints = file
        .springs
        .iter()
        .flat_map(|s| s.joints.iter().filter_map(|j| j.node).chain(s.center));
    let colliders = file.colliders.iter().filter_map(|c| c.node);
    joints
        .chain(colliders)
        .filter_map(|n| usize::try_from(n).ok())
        .map(|n| n + 1)
        .max()
        .unwrap_or(0)
}
