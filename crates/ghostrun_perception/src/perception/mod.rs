//! Perception Engine — сенсоры обнаружения для stealth-геймплея
//!
//! Два типа сенсоров над одним физическим коллаборатором:
//! - area-сенсор: trigger-объём + closest-visible-target запрос
//! - FOV-сенсор: полигон видимости (sweep + edge refinement) и дешёвый
//!   одиночный IsTargetVisible
//!
//! Один запрос на сенсор за тик; membership всегда обновляется раньше
//! closest-target запросов того же тика.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

pub mod area;
pub mod awareness;
pub mod fov;
pub mod sight;
pub mod vision;

// Re-export основных типов
pub use area::{DetectionTag, ObjectsInArea, SensorVolumeEvent};
pub use awareness::{Awareness, TargetCaught};
pub use fov::{FieldOfViewSensor, TargetVisibility, ViewCast, ViewEdge, ViewMesh};
pub use sight::{line_of_sight, SightParams};
pub use vision::{find_closest_visible, DetectedTarget, TargetDetected, TargetLost, VisionSensor};

/// Событие: эпизодный reset всех сенсоров
///
/// Внешний reset-коллаборатор шлёт его при рестарте эпизода: membership,
/// закэшированные результаты и awareness обнуляются до следующего запроса.
#[derive(Event, Debug, Clone, Default)]
pub struct PerceptionReset;

/// Система: применяет PerceptionReset ко всем сенсорам
pub fn apply_perception_reset(
    mut resets: EventReader<PerceptionReset>,
    mut areas: Query<&mut ObjectsInArea>,
    mut detected: Query<&mut DetectedTarget>,
    mut visibility: Query<&mut TargetVisibility>,
    mut awareness: Query<&mut Awareness>,
) {
    if resets.is_empty() {
        return;
    }
    resets.clear();

    for mut area in areas.iter_mut() {
        area.reset();
    }
    for mut target in detected.iter_mut() {
        target.current = None;
    }
    for mut vis in visibility.iter_mut() {
        vis.visible = false;
    }
    for mut level in awareness.iter_mut() {
        level.reset();
    }
}

/// Perception Plugin
///
/// Регистрирует perception-конвейер в FixedUpdate после физики.
/// Порядок выполнения (chain — детерминизм и контракт "membership раньше
/// запросов"):
/// 1. apply_perception_reset — эпизодный reset
/// 2. emit_sensor_volume_events — rapier CollisionEvent → volume-события
/// 3. apply_sensor_volume_events — volume-события → ObjectsInArea
/// 4. evict_missing_objects — чистка исчезнувших объектов
/// 5. detect_closest_targets — closest-visible запрос area-сенсоров
/// 6. build_view_meshes — перестройка полигонов видимости
/// 7. update_target_visibility — IsTargetVisible FOV-сенсоров
/// 8. accumulate_awareness — накопление тревоги потребителей
pub struct PerceptionPlugin;

impl Plugin for PerceptionPlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SensorVolumeEvent>()
            .add_event::<TargetDetected>()
            .add_event::<TargetLost>()
            .add_event::<TargetCaught>()
            .add_event::<PerceptionReset>()
            .add_systems(
                FixedUpdate,
                (
                    apply_perception_reset,
                    area::emit_sensor_volume_events,
                    area::apply_sensor_volume_events,
                    area::evict_missing_objects,
                    vision::detect_closest_targets,
                    fov::build_view_meshes,
                    fov::update_target_visibility,
                    awareness::accumulate_awareness,
                )
                    .chain()
                    .after(PhysicsSet::Writeback),
            );
    }
}
