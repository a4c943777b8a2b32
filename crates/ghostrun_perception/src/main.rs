//! Headless демо GHOSTRUN perception
//!
//! Сцена: охранник с trigger-объёмом, камера наблюдения с FOV-сенсором,
//! стена и нарушитель, идущий через уровень. Гоняем тики без рендера и
//! печатаем переходы состояний обнаружения.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use ghostrun_perception::perception::PerceptionReset;
use ghostrun_perception::*;

/// Маршрут нарушителя: идём вдоль -Z до точки остановки
#[derive(Component)]
struct IntruderRoute {
    speed: f32,
    stop_z: f32,
}

fn move_intruder(mut intruders: Query<(&IntruderRoute, &mut Transform)>, time: Res<Time<Fixed>>) {
    let delta = time.delta_secs();
    for (route, mut transform) in intruders.iter_mut() {
        if transform.translation.z > route.stop_z {
            transform.translation.z -= route.speed * delta;
        }
    }
}

fn main() {
    let mut app = create_headless_app();
    app.add_systems(FixedUpdate, move_intruder.before(PhysicsSet::SyncBackend));

    let world = app.world_mut();

    // Нарушитель: kinematic капсула, стартует в z=30, идёт к камере
    let intruder = world
        .spawn((
            Transform::from_translation(Vec3::new(0.0, 0.9, 30.0)),
            RigidBody::KinematicPositionBased,
            Collider::capsule_y(0.6, 0.3),
            layer_groups(
                COLLISION_LAYER_ACTORS,
                COLLISION_LAYER_ENVIRONMENT | COLLISION_LAYER_SENSORS,
            ),
            ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_STATIC,
            DetectionTag::new("Player"),
            IntruderRoute { speed: 2.0, stop_z: 2.0 },
        ))
        .id();

    // Охранник на посту z=20: trigger-объём 12x4x12 вокруг себя
    let guard = world
        .spawn((
            Transform::from_translation(Vec3::new(0.0, 0.0, 20.0)),
            Collider::cuboid(6.0, 2.0, 6.0),
            Sensor,
            ActiveEvents::COLLISION_EVENTS,
            ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_STATIC,
            layer_groups(COLLISION_LAYER_SENSORS, COLLISION_LAYER_ACTORS),
            VisionSensor {
                vertical_offset: 1.0,
                ..Default::default()
            },
            ObjectsInArea::default(),
            DetectedTarget::default(),
        ))
        .id();

    // Стена перед камерой: заслоняет дальнюю часть коридора
    world.spawn((
        Transform::from_translation(Vec3::new(-2.0, 1.5, 8.0)),
        Collider::cuboid(3.0, 1.5, 0.25),
        layer_groups(COLLISION_LAYER_ENVIRONMENT, COLLISION_LAYER_ACTORS),
    ));

    // Камера наблюдения в origin, смотрит на +Z вдоль коридора
    let post = world
        .spawn((
            Transform::IDENTITY.looking_to(Vec3::Z, Vec3::Y),
            FieldOfViewSensor {
                view_radius: 12.0,
                view_angle: 70f32.to_radians(),
                target: Some(intruder),
                ..Default::default()
            },
            ViewMesh::default(),
            TargetVisibility::default(),
            Awareness::default(),
        ))
        .id();

    println!("GHOSTRUN headless perception demo");
    println!(
        "guard={:?} post={:?} intruder={:?}, frustum mesh: {} vertices",
        guard,
        post,
        intruder,
        VisionSensor::default().frustum_mesh().vertices.len()
    );

    let mut was_detected = false;
    let mut was_visible = false;

    for tick in 0..1800 {
        step_simulation(&mut app);

        let world = app.world_mut();

        let intruder_z = world
            .get::<Transform>(intruder)
            .map(|t| t.translation.z)
            .unwrap_or(f32::NAN);

        if let Some(detected) = world.get::<DetectedTarget>(guard) {
            let now = detected.target().is_some();
            if now != was_detected {
                println!(
                    "tick {}: охранник {} нарушителя (z={:.1})",
                    tick,
                    if now { "видит" } else { "потерял" },
                    intruder_z
                );
                was_detected = now;
            }
        }

        if let Some(visibility) = world.get::<TargetVisibility>(post) {
            if visibility.visible != was_visible {
                println!(
                    "tick {}: камера {} нарушителя (z={:.1})",
                    tick,
                    if visibility.visible { "видит" } else { "потеряла" },
                    intruder_z
                );
                was_visible = visibility.visible;
            }
        }

        if tick % 120 == 0 {
            let awareness = world.get::<Awareness>(post).map(|a| a.level).unwrap_or(0.0);
            let mesh_vertices = world.get::<ViewMesh>(post).map(|m| m.vertices.len()).unwrap_or(0);
            println!(
                "tick {}: intruder z={:.1}, awareness={:.0}%, view mesh {} vertices",
                tick, intruder_z, awareness, mesh_vertices
            );
        }

        if world.get::<Awareness>(post).is_some_and(|a| a.is_full()) {
            println!("tick {}: тревога — нарушитель пойман камерой", tick);
            break;
        }
    }

    // Эпизодный reset: membership, результаты и awareness обнуляются
    app.world_mut().send_event(PerceptionReset);
    step_simulation(&mut app);

    let world = app.world_mut();
    let area_len = world.get::<ObjectsInArea>(guard).map(|a| a.len()).unwrap_or(0);
    let awareness = world.get::<Awareness>(post).map(|a| a.level).unwrap_or(f32::NAN);
    println!(
        "после reset: objects in area = {}, awareness = {:.0}%",
        area_len, awareness
    );

    println!("Simulation complete!");
}
