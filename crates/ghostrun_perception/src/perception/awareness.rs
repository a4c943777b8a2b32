//! Awareness — накопитель тревоги поверх выходов сенсоров
//!
//! Потребитель perception-результатов: пока сенсор видит цель, уровень
//! растёт, иначе спадает. Время приходит явным tick-аргументом, никакого
//! глобального deltaTime внутри.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::perception::fov::TargetVisibility;
use crate::perception::vision::DetectedTarget;

/// Уровень тревоги сенсора (проценты)
///
/// Инвариант: 0 ≤ level ≤ 100
#[derive(Component, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct Awareness {
    /// Текущий уровень (0 = спокоен, 100 = цель поймана)
    pub level: f32,
    /// Прирост в процентах за секунду, пока цель видна
    pub increase_rate: f32,
    /// Спад в процентах за секунду, пока цели не видно
    pub decrease_rate: f32,
}

impl Default for Awareness {
    fn default() -> Self {
        Self {
            level: 0.0,
            increase_rate: 10.0,
            decrease_rate: 5.0,
        }
    }
}

impl Awareness {
    pub const MAX_LEVEL: f32 = 100.0;

    /// Один шаг накопления. Возвращает true, если именно этот шаг довёл
    /// уровень до максимума (edge-trigger для TargetCaught).
    pub fn tick(&mut self, target_visible: bool, delta: f32) -> bool {
        let was_full = self.is_full();

        if target_visible {
            self.level = (self.level + self.increase_rate * delta).min(Self::MAX_LEVEL);
        } else {
            self.level = (self.level - self.decrease_rate * delta).max(0.0);
        }

        !was_full && self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.level >= Self::MAX_LEVEL
    }

    /// Сенсор в тревоге: цель видна была недавно и уровень ещё жив
    pub fn is_alert(&self) -> bool {
        self.level > 0.0
    }

    pub fn reset(&mut self) {
        self.level = 0.0;
    }
}

/// Событие: awareness дошёл до 100% — цель окончательно поймана
#[derive(Event, Debug, Clone)]
pub struct TargetCaught {
    pub sensor: Entity,
}

/// Система: накопление awareness от выходов сенсоров
///
/// Работает и с FOV-сенсором (TargetVisibility), и с area-сенсором
/// (DetectedTarget) — у кого что есть.
pub fn accumulate_awareness(
    mut sensors: Query<(
        Entity,
        &mut Awareness,
        Option<&TargetVisibility>,
        Option<&DetectedTarget>,
    )>,
    time: Res<Time<Fixed>>,
    mut caught_events: EventWriter<TargetCaught>,
) {
    let delta = time.delta_secs();

    for (sensor, mut awareness, visibility, detected) in sensors.iter_mut() {
        let target_visible = visibility.map(|v| v.visible).unwrap_or(false)
            || detected.map(|d| d.current.is_some()).unwrap_or(false);

        if awareness.tick(target_visible, delta) {
            caught_events.write(TargetCaught { sensor });
        }
    }
}
