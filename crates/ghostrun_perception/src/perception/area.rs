//! Area membership — кто сейчас внутри trigger-объёма сенсора
//!
//! Rapier sensor collider (аналог Area3D/OnTriggerEnter) → SensorVolumeEvent
//! → ObjectsInArea. Сам tracker — чистая set-семантика без геометрии:
//! физика доставки событий отделена от membership.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::collections::HashSet;

/// Тег обнаруживаемого объекта (аналог engine-тегов)
///
/// Сенсор берёт в candidate pool только объекты, чей тег входит в его
/// detectable-список.
#[derive(Component, Debug, Clone, Default, PartialEq, Eq, Reflect)]
#[reflect(Component)]
pub struct DetectionTag(pub String);

impl DetectionTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }
}

/// Множество объектов внутри trigger-объёма сенсора
///
/// Инварианты:
/// - объект встречается не более одного раза (set)
/// - membership зеркалит физический overlap: исчезнувший из мира объект
///   вычищается eviction-системой до любых запросов этого тика
///
/// Повторный enter/exit — идемпотентный no-op, не ошибка.
#[derive(Component, Debug, Clone, Default, Reflect)]
#[reflect(Component)]
pub struct ObjectsInArea {
    objects: HashSet<Entity>,
}

impl ObjectsInArea {
    pub fn on_enter(&mut self, object: Entity) {
        self.objects.insert(object);
    }

    pub fn on_exit(&mut self, object: Entity) {
        self.objects.remove(&object);
    }

    pub fn reset(&mut self) {
        self.objects.clear();
    }

    pub fn contains(&self, object: Entity) -> bool {
        self.objects.contains(&object)
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.objects.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn evict_missing(&mut self, alive: impl Fn(Entity) -> bool) {
        self.objects.retain(|object| alive(*object));
    }
}

/// Абстрактные enter/exit события trigger-объёма
///
/// Внешний collision-коллаборатор (rapier, тест, replay) пишет их; tracker
/// знает только set-семантику, не механизм доставки.
#[derive(Event, Debug, Clone)]
pub enum SensorVolumeEvent {
    /// Объект вошёл в объём сенсора
    Entered { sensor: Entity, object: Entity },
    /// Объект покинул объём сенсора
    Exited { sensor: Entity, object: Entity },
}

/// Система: rapier CollisionEvent → SensorVolumeEvent
///
/// Trigger-пары у rapier неупорядоченные: выясняем, какая из сторон — наш
/// сенсор. Пары без сенсора игнорируем.
pub fn emit_sensor_volume_events(
    mut collisions: EventReader<CollisionEvent>,
    sensors: Query<(), With<ObjectsInArea>>,
    mut volume_events: EventWriter<SensorVolumeEvent>,
) {
    for event in collisions.read() {
        match *event {
            CollisionEvent::Started(a, b, _) => {
                if sensors.contains(a) {
                    volume_events.write(SensorVolumeEvent::Entered { sensor: a, object: b });
                } else if sensors.contains(b) {
                    volume_events.write(SensorVolumeEvent::Entered { sensor: b, object: a });
                }
            }
            CollisionEvent::Stopped(a, b, _) => {
                if sensors.contains(a) {
                    volume_events.write(SensorVolumeEvent::Exited { sensor: a, object: b });
                } else if sensors.contains(b) {
                    volume_events.write(SensorVolumeEvent::Exited { sensor: b, object: a });
                }
            }
        }
    }
}

/// Система: применяет volume-события к trackers
///
/// Tag-фильтр на enter: объект без DetectionTag или с тегом вне
/// detectable-списка сенсора в pool не попадает. Exit — безусловный.
pub fn apply_sensor_volume_events(
    mut events: EventReader<SensorVolumeEvent>,
    mut sensors: Query<(&super::vision::VisionSensor, &mut ObjectsInArea)>,
    tags: Query<&DetectionTag>,
) {
    for event in events.read() {
        match *event {
            SensorVolumeEvent::Entered { sensor, object } => {
                let Ok((config, mut area)) = sensors.get_mut(sensor) else {
                    continue;
                };
                let Ok(tag) = tags.get(object) else {
                    continue;
                };
                if config.detects(&tag.0) {
                    area.on_enter(object);
                }
            }
            SensorVolumeEvent::Exited { sensor, object } => {
                if let Ok((_, mut area)) = sensors.get_mut(sensor) {
                    area.on_exit(object);
                }
            }
        }
    }
}

/// Система: вычищает из trackers объекты, исчезнувшие из мира
///
/// Rapier шлёт Stopped при despawn коллайдера, но membership обязан
/// зеркалить мир даже если событие потерялось (деактивация, ручной despawn
/// без физики). Бежит до любых closest-target запросов тика.
pub fn evict_missing_objects(
    mut areas: Query<&mut ObjectsInArea>,
    objects: Query<(), With<DetectionTag>>,
) {
    for mut area in areas.iter_mut() {
        if !area.is_empty() {
            area.evict_missing(|object| objects.contains(object));
        }
    }
}
