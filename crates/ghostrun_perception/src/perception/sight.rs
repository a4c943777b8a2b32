//! Одиночная sight-проверка: радиус + угол + obstruction-луч
//!
//! Stateless-помощник, им пользуется и FieldOfViewSensor (IsTargetVisible),
//! и любой потребитель, которому нужен pass/fail без полигона видимости.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::raycast::Raycaster;

/// Параметры sight-проверки (радиус зоны, полный угол конуса в радианах).
#[derive(Debug, Clone, Copy, PartialEq, Reflect, Serialize, Deserialize)]
pub struct SightParams {
    /// Радиус зоны видимости (метры)
    pub radius: f32,
    /// Полный угол обзора (радианы); проверка идёт против angle / 2
    pub angle: f32,
}

impl Default for SightParams {
    fn default() -> Self {
        Self {
            radius: 10.0,
            angle: 90f32.to_radians(),
        }
    }
}

/// Видна ли точка `target` из `origin` при направлении взгляда `forward`.
///
/// Порядок проверок:
/// 1. Радиус — по *плоской* дистанции (y игнорируется). Зона видимости —
///    вертикальная колонна: высота цели не важна, пока её горизонтальная
///    проекция в радиусе.
/// 2. Угол — между `forward` и полным 3D-направлением на цель, против
///    половины `angle`.
/// 3. Obstruction-луч вдоль 3D-направления, длиной в плоскую дистанцию:
///    любое попадание = цель заслонена.
///
/// Асимметрия (плоский радиус / 3D-угол) намеренная, не унифицировать.
pub fn line_of_sight(
    origin: Vec3,
    forward: Vec3,
    target: Vec3,
    params: SightParams,
    ray: &impl Raycaster,
) -> bool {
    let dir_to_target = target - origin;
    let mut plane_dir = dir_to_target;
    plane_dir.y = 0.0;

    // Вне радиуса (плоская дистанция)?
    let dst_to_target = plane_dir.length();
    if dst_to_target > params.radius {
        return false;
    }

    // Вне угла обзора?
    if forward.angle_between(dir_to_target) >= params.angle / 2.0 {
        return false;
    }

    ray.cast(origin, dir_to_target.normalize_or_zero(), dst_to_target)
        .is_none()
}
