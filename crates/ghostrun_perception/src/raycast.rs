//! Sight raycast seam — узкий интерфейс к физике для perception-запросов
//!
//! Системы оборачивают rapier-контекст в closure, pure-функции и тесты
//! работают через trait. Occlusion-фильтр запечён при конструировании
//! raycaster'а, сами алгоритмы о слоях ничего не знают.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

/// Результат sight-луча: ближайшая поверхность вдоль направления.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Entity коллайдера, в который попал луч
    pub collider: Entity,
    /// Точка попадания (world space)
    pub point: Vec3,
    /// Дистанция от origin до точки попадания
    pub distance: f32,
}

/// Физический коллаборатор perception-запросов.
///
/// Контракт: вернуть *ближайшее* пересечение вдоль `direction` не дальше
/// `max_distance`, либо `None`. Сбой физического запроса (разрушенный
/// collider и т.п.) эквивалентен промаху — ошибок этот интерфейс не знает.
pub trait Raycaster {
    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit>;
}

impl<F> Raycaster for F
where
    F: Fn(Vec3, Vec3, f32) -> Option<RayHit>,
{
    fn cast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        self(origin, direction, max_distance)
    }
}

/// Adapter: rapier nearest-hit query → [`RayHit`].
///
/// Системы заворачивают его в closure с запечённым фильтром:
/// `|o, d, max| cast_sight_ray(&ctx, o, d, max, filter)`.
pub fn cast_sight_ray(
    ctx: &RapierContext,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
    filter: QueryFilter,
) -> Option<RayHit> {
    ctx.cast_ray_and_get_normal(origin, direction, max_distance, true, filter)
        .map(|(collider, hit)| RayHit {
            collider,
            point: hit.point,
            distance: hit.time_of_impact,
        })
}
