//! GHOSTRUN Perception Core
//!
//! Headless-симуляция stealth-перцепции на Bevy 0.16:
//! - area-сенсоры (trigger-объём + ближайшая видимая цель)
//! - FOV-сенсоры (полигон видимости + одиночный IsTargetVisible)
//! - rapier как физический коллаборатор (sensor volumes + sight-лучи)
//!
//! Ядро не владеет game loop'ом: внешний планировщик гонит тики через
//! [`step_simulation`], потребители (AI, рендер) опрашивают выходы сенсоров
//! раз за тик.

use bevy::prelude::*;
use bevy::transform::TransformPlugin;
use bevy_rapier3d::prelude::*;

// Публичные модули
pub mod collision_layers;
pub mod logger;
pub mod perception;
pub mod raycast;

// Re-export базовых типов для удобства
pub use collision_layers::{
    layer_groups, sight_filter, COLLISION_LAYER_ACTORS, COLLISION_LAYER_ENVIRONMENT,
    COLLISION_LAYER_SENSORS, COLLISION_MASK_OBSTACLES, COLLISION_MASK_SIGHT,
};
pub use perception::{
    Awareness, DetectedTarget, DetectionTag, FieldOfViewSensor, ObjectsInArea, PerceptionPlugin,
    PerceptionReset, SightParams, TargetCaught, TargetDetected, TargetLost, TargetVisibility,
    ViewMesh, VisionSensor,
};
pub use raycast::{RayHit, Raycaster};

// Re-export logger (вызовы вида crate::log / ghostrun_perception::log_warning)
pub use logger::{
    init_logger, log, log_error, log_info, log_warning, set_log_level, set_logger, LogLevel,
    LogPrinter,
};

/// Создаёт minimal Bevy App для headless симуляции
///
/// MinimalPlugins + transform propagation + rapier в fixed schedule +
/// perception-конвейер. Рендера нет: ViewMesh остаётся data product'ом.
pub fn create_headless_app() -> App {
    let mut app = App::new();
    init_logger();
    app.add_plugins(MinimalPlugins)
        .add_plugins(TransformPlugin)
        .add_plugins(RapierPhysicsPlugin::<NoUserData>::default().in_schedule(FixedUpdate))
        .insert_resource(Time::<Fixed>::from_hz(60.0)) // 60Hz simulation tick
        .add_plugins(PerceptionPlugin);

    app
}

/// Прогоняет ровно один simulation tick.
///
/// Main-проход подбирает housekeeping (event update, transform propagation
/// после спавнов/перемещений), затем fixed-тик выполняется явно: физика и
/// perception шагают один раз независимо от wall-clock.
pub fn step_simulation(app: &mut App) {
    app.update();

    let timestep = app.world().resource::<Time<Fixed>>().timestep();
    app.world_mut().resource_mut::<Time<Fixed>>().advance_by(timestep);
    app.world_mut().run_schedule(FixedUpdate);
}

/// Snapshot компонентов мира для сравнения детерминизма
///
/// Сортировка по Entity ID — порядок итерации архетипов не детерминирован.
pub fn world_snapshot<T: Component>(world: &mut World) -> Vec<u8>
where
    T: std::fmt::Debug,
{
    let mut snapshot = Vec::new();

    let mut query = world.query::<(Entity, &T)>();
    let mut entities: Vec<_> = query.iter(world).collect();

    entities.sort_by_key(|(entity, _)| entity.index());

    for (entity, component) in entities {
        snapshot.extend_from_slice(&entity.index().to_le_bytes());
        snapshot.extend_from_slice(format!("{:?}", component).as_bytes());
    }

    snapshot
}
