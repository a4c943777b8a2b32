//! Area-based vision: ближайшая видимая цель из trigger-объёма
//!
//! Candidate pool приходит из ObjectsInArea, на каждого кандидата — один
//! sight-луч. Кандидат засчитывается только если луч попал *в него первым*:
//! всё, что ближе по лучу (стена, другой кандидат), дисквалифицирует.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::collision_layers::{sight_filter_excluding, COLLISION_MASK_SIGHT};
use crate::perception::area::{DetectionTag, ObjectsInArea};
use crate::perception::fov::ViewMesh;
use crate::raycast::{cast_sight_ray, Raycaster};

/// Конфигурация area-сенсора
///
/// Неизменна в течение запроса; правится только конфигурационным кодом
/// (spawn, загрузка профиля), никогда — из detection-систем.
#[derive(Component, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct VisionSensor {
    /// Полный угол раствора зоны обнаружения (радианы, косметика frustum-меша)
    pub detection_angle: f32,
    /// Высота зоны обнаружения (метры)
    pub sensor_height: f32,
    /// Глубина зоны обнаружения (метры)
    pub sensor_depth: f32,
    /// Вертикальный offset точки взгляда относительно transform
    pub vertical_offset: f32,
    /// Точка прицеливания: высота над базой кандидата. Луч в точную базу
    /// цепляет пол, поэтому целимся чуть выше.
    pub target_offset: f32,
    /// Теги объектов, которые сенсор вообще замечает
    pub detectable_tags: Vec<String>,
    /// Слои sight-луча: обязан включать и кандидатов, и occluder'ы,
    /// иначе first-hit проверка теряет смысл
    pub sight_mask: u32,
}

impl Default for VisionSensor {
    fn default() -> Self {
        Self {
            detection_angle: 90f32.to_radians(),
            sensor_height: 1.0,
            sensor_depth: 5.0,
            vertical_offset: 0.0,
            target_offset: 0.5,
            detectable_tags: vec!["Player".to_string()],
            sight_mask: COLLISION_MASK_SIGHT,
        }
    }
}

impl VisionSensor {
    pub fn detects(&self, tag: &str) -> bool {
        self.detectable_tags.iter().any(|t| t == tag)
    }

    /// Косметический wedge-меш зоны обнаружения (local space).
    ///
    /// Origin + 4 угла дальней грани на глубине sensor_depth, разведённые
    /// на tan(angle/2). Перестраивать при смене конфигурации, не каждый тик.
    pub fn frustum_mesh(&self) -> ViewMesh {
        let half_spread = (self.detection_angle / 2.0).tan() * self.sensor_depth;
        let y_low = self.vertical_offset - self.sensor_height / 2.0;
        let y_high = self.vertical_offset + self.sensor_height / 2.0;

        ViewMesh {
            vertices: vec![
                Vec3::Y * self.vertical_offset,
                Vec3::new(-half_spread, y_low, self.sensor_depth),
                Vec3::new(-half_spread, y_high, self.sensor_depth),
                Vec3::new(half_spread, y_low, self.sensor_depth),
                Vec3::new(half_spread, y_high, self.sensor_depth),
            ],
            indices: vec![0, 1, 2, 0, 2, 4, 0, 4, 3, 0, 1, 3],
        }
    }
}

/// Результат последнего closest-target запроса сенсора
///
/// Сам запрос каждый тик считается заново; компонент — только кэш для
/// polling-потребителей и диффа событий. `(цель, квадрат дистанции)`.
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct DetectedTarget {
    pub current: Option<(Entity, f32)>,
}

impl DetectedTarget {
    pub fn target(&self) -> Option<Entity> {
        self.current.map(|(target, _)| target)
    }
}

/// Событие: сенсор увидел цель
///
/// Потребители решают сами, что с этим делать (FSM-переход, смена
/// материала у рендера и т.п.) — контракт выбора цели событие не трогает.
#[derive(Event, Debug, Clone)]
pub struct TargetDetected {
    pub sensor: Entity,
    pub target: Entity,
}

/// Событие: сенсор потерял ранее видимую цель
#[derive(Event, Debug, Clone)]
pub struct TargetLost {
    pub sensor: Entity,
    pub target: Entity,
}

/// Ближайшая видимая цель из пула кандидатов.
///
/// На кандидата — один неограниченный луч к его точке прицеливания.
/// Кандидат проходит, только если первая поверхность на луче — он сам;
/// победитель — минимальный квадрат дистанции, ничьи решает порядок
/// обхода (первый встреченный). Пустой пул → None.
pub fn find_closest_visible(
    sight_origin: Vec3,
    candidates: impl IntoIterator<Item = (Entity, Vec3)>,
    ray: &impl Raycaster,
) -> Option<(Entity, f32)> {
    let mut closest: Option<(Entity, f32)> = None;

    for (candidate, target_pos) in candidates {
        let dir = target_pos - sight_origin;
        if dir == Vec3::ZERO {
            continue;
        }
        let Some(hit) = ray.cast(sight_origin, dir.normalize_or_zero(), f32::MAX) else {
            continue;
        };
        // Что-то ближе по лучу заслоняет кандидата (стена, другой кандидат)
        if hit.collider != candidate {
            continue;
        }

        let dst_sq = dir.length_squared();
        match closest {
            Some((_, best)) if dst_sq >= best => {}
            _ => closest = Some((candidate, dst_sq)),
        }
    }

    closest
}

/// Система: closest-target запрос для всех area-сенсоров
///
/// Membership к этому моменту уже обновлён (см. порядок в PerceptionPlugin).
/// Дифф против прошлого тика → TargetDetected / TargetLost.
pub fn detect_closest_targets(
    rapier: ReadRapierContext,
    mut sensors: Query<(
        Entity,
        &VisionSensor,
        &Transform,
        &ObjectsInArea,
        &mut DetectedTarget,
    )>,
    candidates: Query<&Transform, With<DetectionTag>>,
    mut detected_events: EventWriter<TargetDetected>,
    mut lost_events: EventWriter<TargetLost>,
) {
    let Ok(ctx) = rapier.single() else {
        return;
    };

    for (sensor_entity, config, transform, area, mut detected) in sensors.iter_mut() {
        let filter = sight_filter_excluding(config.sight_mask, sensor_entity);
        let ray = |origin: Vec3, dir: Vec3, max_dst: f32| {
            cast_sight_ray(&ctx, origin, dir, max_dst, filter)
        };

        let sight_origin = transform.translation + Vec3::Y * config.vertical_offset;

        // Пул сортируем по entity index: HashSet-порядок недетерминирован,
        // а прогоны обязаны совпадать бит-в-бит
        let mut pool: Vec<(Entity, Vec3)> = area
            .iter()
            .filter_map(|object| {
                candidates
                    .get(object)
                    .ok()
                    .map(|t| (object, t.translation + Vec3::Y * config.target_offset))
            })
            .collect();
        pool.sort_by_key(|(object, _)| object.index());

        let result = find_closest_visible(sight_origin, pool, &ray);

        match (detected.target(), result.map(|(target, _)| target)) {
            (None, Some(target)) => {
                detected_events.write(TargetDetected { sensor: sensor_entity, target });
            }
            (Some(prev), Some(next)) if prev != next => {
                lost_events.write(TargetLost { sensor: sensor_entity, target: prev });
                detected_events.write(TargetDetected { sensor: sensor_entity, target: next });
            }
            (Some(prev), None) => {
                lost_events.write(TargetLost { sensor: sensor_entity, target: prev });
            }
            _ => {}
        }

        detected.current = result;
    }
}
