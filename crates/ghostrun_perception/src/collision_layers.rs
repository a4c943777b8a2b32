//! Collision Layers Constants
//!
//! Rapier collision groups — centralised константы для всего проекта.
//!
//! ## Архитектура:
//! - **Layer (битовая маска):** на каком слое находится collider
//! - **Mask (битовая маска):** какие слои видит запрос/объект
//!
//! Sensor volumes (trigger'ы) в sight-запросы не попадают никогда:
//! [`sight_filter`] всегда ставит `exclude_sensors`.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;

/// Layer 2: Actors (персонажи — игрок, NPC, цели сенсоров)
pub const COLLISION_LAYER_ACTORS: u32 = 0b10; // 2

/// Layer 3: Environment (стены, препятствия, terrain)
pub const COLLISION_LAYER_ENVIRONMENT: u32 = 0b100; // 4

/// Layer 4: Sensor volumes (trigger-объёмы зон обнаружения)
pub const COLLISION_LAYER_SENSORS: u32 = 0b1000; // 8

/// Mask: sight-луч для поиска цели (Actors + Environment)
///
/// Используется VisionSensor: луч обязан уметь попасть и в кандидата,
/// и в заслоняющую геометрию, иначе first-hit проверка теряет смысл.
pub const COLLISION_MASK_SIGHT: u32 = COLLISION_LAYER_ACTORS | COLLISION_LAYER_ENVIRONMENT;

/// Mask: только occluder'ы (Environment)
///
/// Используется FieldOfViewSensor: и для полигона видимости, и для
/// obstruction-проверки цели (сама цель лучом не считается).
pub const COLLISION_MASK_OBSTACLES: u32 = COLLISION_LAYER_ENVIRONMENT;

/// Собирает rapier [`QueryFilter`] для sight-запросов из u32 маски.
///
/// Trigger-коллайдеры исключаются всегда (occlusion-тесты не должны
/// упираться в чужие зоны обнаружения).
pub fn sight_filter(mask: u32) -> QueryFilter<'static> {
    QueryFilter::new()
        .groups(CollisionGroups::new(
            Group::ALL,
            Group::from_bits_truncate(mask),
        ))
        .exclude_sensors()
}

/// Собирает [`CollisionGroups`] компонента: membership = layer, filter = mask.
pub fn layer_groups(layer: u32, mask: u32) -> CollisionGroups {
    CollisionGroups::new(
        Group::from_bits_truncate(layer),
        Group::from_bits_truncate(mask),
    )
}

/// Получить название слоя для debug логов
pub fn get_layer_name(layer_bits: u32) -> &'static str {
    match layer_bits {
        COLLISION_LAYER_ACTORS => "Actors",
        COLLISION_LAYER_ENVIRONMENT => "Environment",
        COLLISION_LAYER_SENSORS => "Sensors",
        _ => "Unknown",
    }
}

/// Исключает собственный collider сенсора из sight-запроса.
///
/// Луч стартует изнутри тела владельца: без exclude solid-режим вернул бы
/// попадание в самого себя на дистанции 0.
pub fn sight_filter_excluding(mask: u32, own: Entity) -> QueryFilter<'static> {
    sight_filter(mask).exclude_collider(own)
}
