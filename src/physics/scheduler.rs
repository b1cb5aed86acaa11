//! 时钟调度
//!
//! 两种互斥模式共享同一份 AnimationState：
//! - 确定性模式：按时间轴位置计算经过了多少个 1/60 秒子步，逐个步进。
//!   同一时间轴序列总能复现同样的物理状态，且与宿主帧率无关。
//! - 实时模式：约 30Hz 自由运行，直接使用墙钟 delta_time，响应优先于可复现。
//!
//! SchedulerState 由 SpringRig 持有，不使用全局状态，多个角色可独立模拟。

use std::time::{Duration, Instant};

use crate::{Result, SpringBoneError};
use super::config::{get_config, SpringBoneConfig};
use super::rational::Rational;

/// 一次时间轴更新的步进计划
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimelinePlan {
    /// 步进前是否清除历史
    pub reset: bool,
    /// 每个子步的 delta_time（按子步边界时间精确计算）
    pub delta_times: Vec<f64>,
}

impl TimelinePlan {
    #[inline]
    pub fn step_count(&self) -> usize {
        self.delta_times.len()
    }
}

/// 时钟状态
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchedulerState {
    /// 已完成的子步序号
    tick_count: Option<i64>,
    /// 上次观察到的宿主帧率
    last_fps: Option<Rational>,
    /// 上次使用的子步频率
    last_substep_fps: Option<i64>,
    /// 上次实时步进的墙钟时间
    last_wall_clock: Option<Instant>,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 清除所有计数，下一次更新重新开始
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn tick_count(&self) -> Option<i64> {
        self.tick_count
    }

    #[inline]
    pub fn last_fps(&self) -> Option<Rational> {
        self.last_fps
    }

    /// 确定性模式：时间轴位置变化
    ///
    /// `frame` 为时间轴帧号（可含子帧），`fps` 为宿主帧率。
    /// - 帧率或子步频率变化：重置
    /// - 首次观察：只记录子步序号
    /// - 时间轴后退：重置并重新记录
    /// - 前进超过 `max_catch_up_steps`：保留历史，只积分最近的 `max_catch_up_steps` 个子步
    pub fn plan_timeline(&mut self, frame: Rational, fps: Rational) -> Result<TimelinePlan> {
        self.plan_timeline_with(frame, fps, &get_config())
    }

    fn plan_timeline_with(
        &mut self,
        frame: Rational,
        fps: Rational,
        config: &SpringBoneConfig,
    ) -> Result<TimelinePlan> {
        if !fps.is_positive() {
            return Err(SpringBoneError::InvalidFrameRate(fps.to_string()));
        }
        let substep_fps = config.substep_fps.max(1);
        let mut plan = TimelinePlan::default();

        // 切换到确定性模式后实时时钟重新开始
        self.last_wall_clock = None;

        if self.last_fps != Some(fps) || self.last_substep_fps != Some(substep_fps) {
            if config.debug_log {
                log::debug!(
                    "[SpringBone] 时基变化 {:?}@{:?} -> {}@{}, 重置",
                    self.last_fps,
                    self.last_substep_fps,
                    fps,
                    substep_fps
                );
            }
            plan.reset = true;
            self.tick_count = None;
            self.last_fps = Some(fps);
            self.last_substep_fps = Some(substep_fps);
        }

        let substep_rate = Rational::from_integer(substep_fps);
        let target_tick = (frame / fps * substep_rate).floor();

        let Some(tick) = self.tick_count else {
            self.tick_count = Some(target_tick);
            return Ok(plan);
        };

        if target_tick < tick {
            if config.debug_log {
                log::debug!("[SpringBone] 时间轴后退 {} -> {}, 重置", tick, target_tick);
            }
            plan.reset = true;
            self.tick_count = Some(target_tick);
            return Ok(plan);
        }

        let max_steps = config.max_catch_up_steps.max(1);
        let first_tick = tick.max(target_tick.saturating_sub(max_steps));
        if first_tick > tick && config.debug_log {
            log::debug!(
                "[SpringBone] 时间轴跳跃 {} 子步, 只积分最近 {} 子步",
                target_tick - tick,
                max_steps
            );
        }

        plan.delta_times = (first_tick..target_tick)
            .map(|k| {
                let start = Rational::from_integer(k) / substep_rate;
                let end = Rational::from_integer(k + 1) / substep_rate;
                (end - start).to_f64()
            })
            .collect();
        self.tick_count = Some(target_tick);
        Ok(plan)
    }

    /// 实时模式：返回本次应步进的 delta_time
    ///
    /// 首次采样只记录时间；距上次步进不足一个 tick 间隔时返回 None。
    pub fn plan_live(&mut self, now: Instant) -> Option<f64> {
        self.plan_live_with(now, &get_config())
    }

    fn plan_live_with(&mut self, now: Instant, config: &SpringBoneConfig) -> Option<f64> {
        // 实时步进打断了时间轴，下次时间轴更新重新记录
        self.tick_count = None;

        let Some(last) = self.last_wall_clock else {
            self.last_wall_clock = Some(now);
            return None;
        };

        let elapsed = now.saturating_duration_since(last).as_secs_f64();
        if elapsed < live_interval(config.live_tick_hz).as_secs_f64() {
            return None;
        }
        self.last_wall_clock = Some(now);
        Some(elapsed.min(config.max_live_delta_time.max(0.0)))
    }
}

/// 实时模式的 tick 间隔
pub fn live_interval(live_tick_hz: f64) -> Duration {
    if live_tick_hz.is_finite() && live_tick_hz > 0.0 {
        Duration::from_secs_f64(1.0 / live_tick_hz)
    } else {
        Duration::from_secs_f64(1.0 / 30.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fps(value: i64) -> Rational {
        Rational::from_integer(value)
    }

    fn frame(value: i64) -> Rational {
        Rational::from_integer(value)
    }

    #[test]
    fn test_first_observation_seeds() {
        let mut state = SchedulerState::new();
        let plan = state.plan_timeline(frame(10), fps(30)).unwrap();
        assert!(plan.reset);
        assert_eq!(plan.step_count(), 0);
        assert_eq!(state.tick_count(), Some(20));
    }

    #[test]
    fn test_substeps_independent_of_host_fps() {
        let mut state = SchedulerState::new();
        state.plan_timeline(frame(0), fps(30)).unwrap();
        let plan = state.plan_timeline(frame(1), fps(30)).unwrap();
        assert!(!plan.reset);
        assert_eq!(plan.step_count(), 2);
        for dt in &plan.delta_times {
            assert!((dt - 1.0 / 60.0).abs() < 1e-15);
        }

        let mut state = SchedulerState::new();
        state.plan_timeline(frame(0), fps(120)).unwrap();
        assert_eq!(state.plan_timeline(frame(1), fps(120)).unwrap().step_count(), 0);
        assert_eq!(state.plan_timeline(frame(2), fps(120)).unwrap().step_count(), 1);
    }

    #[test]
    fn test_ntsc_accumulates_exactly() {
        let mut state = SchedulerState::new();
        let ntsc = Rational::new(30000, 1001).unwrap();
        state.plan_timeline(frame(0), ntsc).unwrap();
        let mut total = 0;
        for f in 1..=30000 {
            total += state.plan_timeline(frame(f), ntsc).unwrap().step_count();
        }
        // 30000 帧 = 1001 秒 = 60060 子步
        assert_eq!(total, 60060);
    }

    #[test]
    fn test_backward_resets() {
        let mut state = SchedulerState::new();
        state.plan_timeline(frame(10), fps(60)).unwrap();
        let plan = state.plan_timeline(frame(5), fps(60)).unwrap();
        assert!(plan.reset);
        assert_eq!(plan.step_count(), 0);
        assert_eq!(state.tick_count(), Some(5));
    }

    #[test]
    fn test_fps_change_resets() {
        let mut state = SchedulerState::new();
        state.plan_timeline(frame(10), fps(60)).unwrap();
        let plan = state.plan_timeline(frame(11), fps(24)).unwrap();
        assert!(plan.reset);
        assert_eq!(plan.step_count(), 0);
        assert_eq!(state.last_fps(), Some(fps(24)));
    }

    #[test]
    fn test_same_frame_is_idle() {
        let mut state = SchedulerState::new();
        state.plan_timeline(frame(3), fps(60)).unwrap();
        let plan = state.plan_timeline(frame(3), fps(60)).unwrap();
        assert_eq!(plan, TimelinePlan::default());
    }

    #[test]
    fn test_large_jump_keeps_history_and_caps_work() {
        let mut state = SchedulerState::new();
        state.plan_timeline(frame(0), fps(60)).unwrap();
        state.plan_timeline(frame(1), fps(60)).unwrap();
        let plan = state.plan_timeline(frame(700), fps(60)).unwrap();
        assert!(!plan.reset);
        assert_eq!(plan.step_count(), 600);
        assert_eq!(state.tick_count(), Some(700));

        // 未超过上限时全部积分
        let plan = state.plan_timeline(frame(1200), fps(60)).unwrap();
        assert!(!plan.reset);
        assert_eq!(plan.step_count(), 500);
    }

    #[test]
    fn test_substep_rate_change_resets() {
        let mut state = SchedulerState::new();
        let mut config = SpringBoneConfig::default();
        state.plan_timeline_with(frame(0), fps(30), &config).unwrap();
        let plan = state.plan_timeline_with(frame(1), fps(30), &config).unwrap();
        assert_eq!(plan.step_count(), 2);

        config.substep_fps = 120;
        let plan = state.plan_timeline_with(frame(2), fps(30), &config).unwrap();
        assert!(plan.reset);
        assert_eq!(plan.step_count(), 0);
        assert_eq!(state.tick_count(), Some(8));

        let plan = state.plan_timeline_with(frame(3), fps(30), &config).unwrap();
        assert!(!plan.reset);
        assert_eq!(plan.step_count(), 4);
        for dt in &plan.delta_times {
            assert!((dt - 1.0 / 120.0).abs() < 1e-15);
        }
    }

    #[test]
    fn test_invalid_fps() {
        let mut state = SchedulerState::new();
        assert!(state.plan_timeline(frame(0), fps(0)).is_err());
        assert!(state.plan_timeline(frame(0), fps(-24)).is_err());
    }

    #[test]
    fn test_live_ticks() {
        let mut state = SchedulerState::new();
        let start = Instant::now();
        assert_eq!(state.plan_live(start), None);
        assert_eq!(state.plan_live(start + Duration::from_millis(5)), None);

        let dt = state.plan_live(start + Duration::from_millis(50)).unwrap();
        assert!((dt - 0.05).abs() < 1e-9);

        // 长时间停顿被钳制
        let dt = state.plan_live(start + Duration::from_secs(10)).unwrap();
        assert!(dt <= 0.25 + 1e-12);
    }

    #[test]
    fn test_live_delta_clamp_follows_config() {
        let mut state = SchedulerState::new();
        let config = SpringBoneConfig {
            max_live_delta_time: 0.05,
            live_tick_hz: 10.0,
            ..SpringBoneConfig::default()
        };
        let start = Instant::now();
        assert_eq!(state.plan_live_with(start, &config), None);
        // 10Hz 下 50ms 不足一个间隔
        assert_eq!(state.plan_live_with(start + Duration::from_millis(50), &config), None);
        let dt = state.plan_live_with(start + Duration::from_millis(500), &config).unwrap();
        assert!((dt - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_live_interrupts_timeline() {
        let mut state = SchedulerState::new();
        state.plan_timeline(frame(0), fps(60)).unwrap();
        state.plan_live(Instant::now());
        assert_eq!(state.tick_count(), None);
        let plan = state.plan_timeline(frame(30), fps(60)).unwrap();
        assert_eq!(plan.step_count(), 0);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut state = SchedulerState::new();
        state.plan_timeline(frame(10), fps(60)).unwrap();
        state.plan_live(Instant::now());
        state.reset();
        assert_eq!(state, SchedulerState::default());
    }
}
