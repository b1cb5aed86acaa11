//! Spring Bone 配置
//!
//! 所有参数扁平化，直接在代码中修改默认值即可。

use once_cell::sync::Lazy;
use std::sync::RwLock;

/// Spring Bone 配置（扁平化，不嵌套）
#[derive(Debug, Clone)]
pub struct SpringBoneConfig {
    // ========== 确定性模式 ==========
    /// 子步频率，默认 60（每个子步 1/60 秒）
    pub substep_fps: i64,
    /// 单次时间轴跳跃最多积分的子步数，默认 600（10 秒）
    /// 超出时保留历史，只积分最近的子步
    pub max_catch_up_steps: i64,

    // ========== 实时模式 ==========
    /// 实时预览的刷新频率 (Hz)，默认 30
    pub live_tick_hz: f64,
    /// 实时模式单步最大 delta_time（秒），默认 0.25
    /// 防止卡顿或断点恢复后一次步进过大
    pub max_live_delta_time: f64,

    // ========== 数值 ==========
    /// 判定骨骼旋转是否变化的阈值，默认 1e-9
    pub rotation_change_epsilon: f64,

    // ========== 调试 ==========
    /// 是否输出调试日志，默认 false
    pub debug_log: bool,
}

impl Default for SpringBoneConfig {
    fn default() -> Self {
        Self {
            // ====== 确定性模式 ======
            // 物理节奏与宿主帧率无关
            substep_fps: 60,
            max_catch_up_steps: 600,

            // ====== 实时模式 ======
            // 约 30Hz 足够交互预览，响应优先于可复现
            live_tick_hz: 30.0,
            max_live_delta_time: 0.25,

            // ====== 数值 ======
            rotation_change_epsilon: 1e-9,

            // ====== 调试 ======
            debug_log: false,
        }
    }
}

/// 全局配置实例
static SPRING_BONE_CONFIG: Lazy<RwLock<SpringBoneConfig>> = Lazy::new(|| {
    RwLock::new(SpringBoneConfig::default())
});

/// 获取当前配置（只读）
pub fn get_config() -> SpringBoneConfig {
    SPRING_BONE_CONFIG.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// 手动设置配置（用于运行时调试）
pub fn set_config(config: SpringBoneConfig) {
    *SPRING_BONE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = config;
}

/// 重置为默认配置
pub fn reset_config() {
    *SPRING_BONE_CONFIG.write().unwrap_or_else(|e| e.into_inner()) = SpringBoneConfig::default();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_reset_config() {
        // 只切换日志开关，其余测试读到的数值参数不受影响
        set_config(SpringBoneConfig {
            debug_log: true,
            ..get_config()
        });
        assert!(get_config().debug_log);
        assert_eq!(get_config().substep_fps, 60);

        reset_config();
        assert!(!get_config().debug_log);
    }
}
