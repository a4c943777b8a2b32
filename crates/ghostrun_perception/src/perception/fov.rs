//! Field-of-view полигон: угловой sweep + binary search по silhouette-краям
//!
//! Каждый тик сенсор прогоняет веер лучей по дуге обзора, находит разрывы
//! (hit-флаг сменился или скачок дистанции) и уточняет их бинарным поиском
//! с фиксированным бюджетом итераций. Результат — fan-меш, чьи края лежат
//! на силуэтах occluder'ов, а не на шаге угловой сетки.

use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use serde::{Deserialize, Serialize};

use crate::collision_layers::{sight_filter_excluding, COLLISION_MASK_OBSTACLES};
use crate::logger;
use crate::perception::sight::{line_of_sight, SightParams};
use crate::raycast::{cast_sight_ray, Raycaster};

/// Конфигурация FOV-сенсора
#[derive(Component, Debug, Clone, Reflect, Serialize, Deserialize)]
#[reflect(Component)]
pub struct FieldOfViewSensor {
    /// Радиус обзора (метры)
    pub view_radius: f32,
    /// Полный угол обзора (радианы)
    pub view_angle: f32,
    /// Плотность sweep'а: сэмплов на радиан дуги
    pub mesh_resolution: f32,
    /// Бюджет итераций binary search на один край
    pub edge_resolve_iterations: u32,
    /// Порог скачка дистанции между соседними сэмплами, после которого
    /// считаем, что между ними silhouette-край
    pub edge_dst_threshold: f32,
    /// Вертикальный offset вершин меша: зону рисуем спроецированной на пол,
    /// даже если детекция происходит на другой высоте
    pub vertical_draw_offset: f32,
    /// Слои occluder'ов. Только геометрия-заслонка: сама цель в маску
    /// входить не должна, иначе она заслонит саму себя
    pub obstruction_mask: u32,
    /// Преднастроенная цель для IsTargetVisible-запроса
    #[serde(skip)]
    pub target: Option<Entity>,
}

impl Default for FieldOfViewSensor {
    fn default() -> Self {
        Self {
            view_radius: 10.0,
            view_angle: 90f32.to_radians(),
            mesh_resolution: 60.0, // ~1 сэмпл на градус
            edge_resolve_iterations: 6,
            edge_dst_threshold: 0.5,
            vertical_draw_offset: 0.0,
            obstruction_mask: COLLISION_MASK_OBSTACLES,
            target: None,
        }
    }
}

impl FieldOfViewSensor {
    /// Количество шагов sweep'а. Clamp к 1: нулевая resolution не должна
    /// давать деление на ноль.
    pub fn step_count(&self) -> u32 {
        ((self.view_angle * self.mesh_resolution).round() as i64).max(1) as u32
    }

    /// Радиус sweep'а. Clamp к нулю: отрицательный радиус из конфига не
    /// должен разворачивать лучи назад.
    pub fn radius(&self) -> f32 {
        self.view_radius.max(0.0)
    }

    pub fn sight_params(&self) -> SightParams {
        SightParams {
            radius: self.view_radius,
            angle: self.view_angle,
        }
    }
}

/// Результат последнего IsTargetVisible-запроса (polling-поверхность)
#[derive(Component, Debug, Clone, Copy, Default, Reflect)]
#[reflect(Component)]
pub struct TargetVisibility {
    pub visible: bool,
}

/// Renderable-буферы полигона видимости (local space сенсора)
///
/// Чистый data product: vertex buffer + triangle indices, без привязки
/// к рендеру. Перестраивается каждый тик системой build_view_meshes.
#[derive(Component, Debug, Clone, Default, PartialEq, Reflect)]
#[reflect(Component)]
pub struct ViewMesh {
    pub vertices: Vec<Vec3>,
    pub indices: Vec<u32>,
}

/// Один угловой сэмпл sweep'а
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewCast {
    /// Луч во что-то попал (false = дошёл до радиуса)
    pub hit: bool,
    /// Точка попадания либо radius-capped конец луча (world space)
    pub point: Vec3,
    /// Дистанция до точки
    pub dst: f32,
    /// Угол сэмпла (мировой yaw)
    pub angle: f32,
}

/// Уточнённый silhouette-край между двумя соседними сэмплами
///
/// near — последняя точка, ещё совпадающая по состоянию с min-сэмплом,
/// far — первая точка по другую сторону края. Каждая может отсутствовать,
/// если бюджет итераций ни разу не сузил соответствующую границу.
#[derive(Debug, Clone, Copy, Default)]
pub struct ViewEdge {
    pub near: Option<Vec3>,
    pub far: Option<Vec3>,
}

/// Горизонтальное направление из yaw-угла (0 = +Z, по часовой к +X).
pub fn dir_from_angle(angle: f32) -> Vec3 {
    Vec3::new(angle.sin(), 0.0, angle.cos())
}

/// Yaw-угол взгляда transform'а в конвенции dir_from_angle.
pub fn facing_angle(transform: &Transform) -> f32 {
    let forward = *transform.forward();
    forward.x.atan2(forward.z)
}

/// Один сэмпл sweep'а: луч длиной view_radius в горизонтальном направлении.
pub fn view_cast(origin: Vec3, angle: f32, radius: f32, ray: &impl Raycaster) -> ViewCast {
    let dir = dir_from_angle(angle);
    match ray.cast(origin, dir, radius) {
        Some(hit) => ViewCast {
            hit: true,
            point: hit.point,
            dst: hit.distance,
            angle,
        },
        None => ViewCast {
            hit: false,
            point: origin + dir * radius,
            dst: radius,
            angle,
        },
    }
}

/// Binary search silhouette-края между min- и max-сэмплами.
///
/// Фиксированный бюджет итераций — это и есть bound на стоимость: поиск
/// никогда не open-ended. Середина, совпадающая по hit-состоянию с min и
/// не превысившая порог дистанции, сужает min-границу, иначе — max.
pub fn find_edge(
    min_cast: ViewCast,
    max_cast: ViewCast,
    sensor: &FieldOfViewSensor,
    origin: Vec3,
    ray: &impl Raycaster,
) -> ViewEdge {
    let mut min_angle = min_cast.angle;
    let mut max_angle = max_cast.angle;
    let mut edge = ViewEdge::default();

    for _ in 0..sensor.edge_resolve_iterations {
        let angle = (min_angle + max_angle) / 2.0;
        let cast = view_cast(origin, angle, sensor.radius(), ray);

        let threshold_exceeded = (min_cast.dst - cast.dst).abs() > sensor.edge_dst_threshold;
        if cast.hit == min_cast.hit && !threshold_exceeded {
            min_angle = angle;
            edge.near = Some(cast.point);
        } else {
            max_angle = angle;
            edge.far = Some(cast.point);
        }
    }

    edge
}

/// Угловой sweep: все точки границы полигона (world space), с уже
/// вставленными edge-точками.
///
/// Ровно step_count + 1 сэмплов; каждый обнаруженный край добавляет
/// 0..2 точки (near, потом far) перед сэмплом своей стороны.
pub fn build_view_points(
    sensor: &FieldOfViewSensor,
    origin: Vec3,
    facing: f32,
    ray: &impl Raycaster,
) -> Vec<Vec3> {
    let step_count = sensor.step_count();
    let step_angle = sensor.view_angle / step_count as f32;

    let mut points = Vec::with_capacity(step_count as usize + 1);
    let mut old_cast: Option<ViewCast> = None;

    for i in 0..=step_count {
        let angle = facing - sensor.view_angle / 2.0 + step_angle * i as f32;
        let new_cast = view_cast(origin, angle, sensor.radius(), ray);

        if let Some(old) = old_cast {
            let threshold_exceeded = (old.dst - new_cast.dst).abs() > sensor.edge_dst_threshold;
            if old.hit != new_cast.hit || (old.hit && new_cast.hit && threshold_exceeded) {
                let edge = find_edge(old, new_cast, sensor, origin, ray);
                if let Some(point) = edge.near {
                    points.push(point);
                }
                if let Some(point) = edge.far {
                    points.push(point);
                }
            }
        }

        points.push(new_cast.point);
        old_cast = Some(new_cast);
    }

    points
}

/// Fan-триангуляция точек границы в ViewMesh (local space сенсора).
///
/// Вершина 0 — origin с vertical_draw_offset, дальше точки границы;
/// треугольники (0, i, i+1).
pub fn emit_view_mesh(
    points: &[Vec3],
    transform: &Transform,
    vertical_draw_offset: f32,
    mesh: &mut ViewMesh,
) {
    let vertex_count = points.len() + 1;

    mesh.vertices.clear();
    mesh.indices.clear();
    mesh.vertices.reserve(vertex_count);

    mesh.vertices.push(Vec3::Y * vertical_draw_offset);

    let to_local = transform.compute_affine().inverse();
    for point in points {
        let mut local = to_local.transform_point3(*point);
        local.y += vertical_draw_offset;
        mesh.vertices.push(local);
    }

    for i in 1..vertex_count.saturating_sub(1) as u32 {
        mesh.indices.extend_from_slice(&[0, i, i + 1]);
    }
}

/// Система: перестраивает полигоны видимости всех FOV-сенсоров
pub fn build_view_meshes(
    rapier: ReadRapierContext,
    mut sensors: Query<(Entity, &FieldOfViewSensor, &Transform, &mut ViewMesh)>,
) {
    let Ok(ctx) = rapier.single() else {
        return;
    };

    for (sensor_entity, sensor, transform, mut mesh) in sensors.iter_mut() {
        let filter = sight_filter_excluding(sensor.obstruction_mask, sensor_entity);
        let ray = |origin: Vec3, dir: Vec3, max_dst: f32| {
            cast_sight_ray(&ctx, origin, dir, max_dst, filter)
        };

        let points = build_view_points(sensor, transform.translation, facing_angle(transform), &ray);
        emit_view_mesh(&points, transform, sensor.vertical_draw_offset, &mut mesh);
    }
}

/// Система: IsTargetVisible-запрос против преднастроенной цели
///
/// Отсутствующая или исчезнувшая цель — не ошибка: деградируем в
/// "не видно" и предупреждаем в лог.
pub fn update_target_visibility(
    rapier: ReadRapierContext,
    mut sensors: Query<(
        Entity,
        &FieldOfViewSensor,
        &Transform,
        &mut TargetVisibility,
    )>,
    targets: Query<&Transform>,
) {
    let Ok(ctx) = rapier.single() else {
        return;
    };

    for (sensor_entity, sensor, transform, mut visibility) in sensors.iter_mut() {
        let Some(target) = sensor.target else {
            visibility.visible = false;
            continue;
        };
        let Ok(target_transform) = targets.get(target) else {
            logger::log_warning(&format!(
                "FieldOfViewSensor {:?}: target {:?} отсутствует в мире, запрос деградирует в false",
                sensor_entity, target
            ));
            visibility.visible = false;
            continue;
        };

        let filter = sight_filter_excluding(sensor.obstruction_mask, sensor_entity);
        let ray = |origin: Vec3, dir: Vec3, max_dst: f32| {
            cast_sight_ray(&ctx, origin, dir, max_dst, filter)
        };

        visibility.visible = line_of_sight(
            transform.translation,
            *transform.forward(),
            target_transform.translation,
            sensor.sight_params(),
            &ray,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raycast::test_scene::{self, TestScene, Wall};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn wall_entity() -> Entity {
        let mut world = World::new();
        world.spawn_empty().id()
    }

    fn open_sensor() -> FieldOfViewSensor {
        FieldOfViewSensor {
            view_radius: 10.0,
            view_angle: 90f32.to_radians(),
            mesh_resolution: 12.0,
            edge_resolve_iterations: 6,
            edge_dst_threshold: 0.5,
            ..Default::default()
        }
    }

    #[test]
    fn test_step_count_clamps_to_one() {
        let sensor = FieldOfViewSensor {
            mesh_resolution: 0.0,
            ..Default::default()
        };
        assert_eq!(sensor.step_count(), 1);
    }

    #[test]
    fn test_negative_radius_collapses_to_origin() {
        let sensor = FieldOfViewSensor {
            view_radius: -5.0,
            ..open_sensor()
        };
        let scene = test_scene::empty();

        let points = build_view_points(&sensor, Vec3::ZERO, 0.0, &scene);
        for point in &points {
            assert!(point.length() < 1e-6);
        }
    }

    #[test]
    fn test_open_sweep_has_exact_sample_count() {
        let sensor = open_sensor();
        let scene = test_scene::empty();

        let points = build_view_points(&sensor, Vec3::ZERO, 0.0, &scene);

        // Без occluder'ов края не вставляются: ровно step_count + 1 точек,
        // все на радиусе
        assert_eq!(points.len(), sensor.step_count() as usize + 1);
        for point in &points {
            assert!((point.length() - sensor.view_radius).abs() < 1e-3);
        }
    }

    #[test]
    fn test_sweep_spans_view_angle() {
        let sensor = open_sensor();
        let scene = test_scene::empty();
        let facing = 0.0;

        let points = build_view_points(&sensor, Vec3::ZERO, facing, &scene);

        let first_angle = points.first().unwrap().x.atan2(points.first().unwrap().z);
        let last_angle = points.last().unwrap().x.atan2(points.last().unwrap().z);
        let half = sensor.view_angle / 2.0;
        assert!((first_angle + half).abs() < 1e-3);
        assert!((last_angle - half).abs() < 1e-3);
    }

    #[test]
    fn test_wall_inserts_edge_points() {
        // Порог повыше: плавный рост дистанции вдоль стены — не край
        let sensor = FieldOfViewSensor {
            edge_dst_threshold: 1.0,
            ..open_sensor()
        };
        // Стена перекрывает правую половину дуги: silhouette-край один
        let scene = TestScene {
            spheres: vec![],
            walls: vec![Wall { entity: wall_entity(), z_plane: 5.0, x_min: 0.0, x_max: 50.0 }],
        };

        let points = build_view_points(&sensor, Vec3::ZERO, 0.0, &scene);

        let base = sensor.step_count() as usize + 1;
        assert!(points.len() > base, "края не вставлены");
        assert!(points.len() <= base + 2, "один край даёт максимум 2 точки");
    }

    // Сходимость уточнения: для жёсткой границы на угле θ найденный край
    // лежит в пределах (step / 2^iterations) от θ
    #[test]
    fn test_edge_refinement_converges() {
        let sensor = FieldOfViewSensor {
            view_radius: 10.0,
            view_angle: 90f32.to_radians(),
            mesh_resolution: 12.0,
            edge_resolve_iterations: 8,
            edge_dst_threshold: 0.5,
            ..Default::default()
        };
        // Стена с торцом на x=1: луч попадает при sin(angle) >= 1/dst.
        // Жёсткая вертикальная граница silhouette на θ = asin(0.2)
        let wall_z = 5.0;
        let scene = TestScene {
            spheres: vec![],
            walls: vec![Wall { entity: wall_entity(), z_plane: wall_z, x_min: 1.0, x_max: 50.0 }],
        };
        let theta = (1.0f32 / wall_z).atan(); // угол на торец стены

        let step_angle = sensor.view_angle / sensor.step_count() as f32;
        let tolerance = step_angle / 2f32.powi(sensor.edge_resolve_iterations as i32);

        // Ищем пару соседних сэмплов через границу и уточняем её напрямую
        let below = view_cast(Vec3::ZERO, theta - step_angle / 2.0, sensor.view_radius, &scene);
        let above = view_cast(Vec3::ZERO, theta + step_angle / 2.0, sensor.view_radius, &scene);
        assert_ne!(below.hit, above.hit);

        let edge = find_edge(below, above, &sensor, Vec3::ZERO, &scene);
        for point in [edge.near, edge.far].into_iter().flatten() {
            let point_angle = point.x.atan2(point.z);
            assert!(
                (point_angle - theta).abs() <= step_angle,
                "edge-точка вне интервала поиска"
            );
        }
        // Границы поиска сжались до tolerance: near и far существуют и
        // лежат по разные стороны θ не дальше tolerance каждая
        let near_angle = edge.near.map(|p| p.x.atan2(p.z)).unwrap();
        let far_angle = edge.far.map(|p| p.x.atan2(p.z)).unwrap();
        assert!((near_angle - theta).abs() <= tolerance + 1e-4);
        assert!((far_angle - theta).abs() <= tolerance + 1e-4);
    }

    #[test]
    fn test_emit_view_mesh_fan() {
        let points = vec![
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::new(1.0, 0.0, 5.0),
            Vec3::new(2.0, 0.0, 5.0),
        ];
        let transform = Transform::IDENTITY;
        let mut mesh = ViewMesh::default();

        emit_view_mesh(&points, &transform, 0.1, &mut mesh);

        assert_eq!(mesh.vertices.len(), 4);
        // (vertex_count - 2) треугольника
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(&mesh.indices[..3], &[0, 1, 2]);
        assert_eq!(&mesh.indices[3..], &[0, 2, 3]);
        // Вершина 0 — origin с draw offset
        assert!((mesh.vertices[0].y - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_emit_view_mesh_respects_sensor_transform() {
        // Сенсор сдвинут: world-точки уходят в local space
        let transform = Transform::from_translation(Vec3::new(10.0, 0.0, 0.0));
        let points = vec![Vec3::new(10.0, 0.0, 5.0), Vec3::new(11.0, 0.0, 5.0)];
        let mut mesh = ViewMesh::default();

        emit_view_mesh(&points, &transform, 0.0, &mut mesh);

        assert!((mesh.vertices[1] - Vec3::new(0.0, 0.0, 5.0)).length() < 1e-4);
        assert!((mesh.vertices[2] - Vec3::new(1.0, 0.0, 5.0)).length() < 1e-4);
    }

    #[test]
    fn test_facing_angle_matches_dir_from_angle() {
        for yaw_deg in [0.0f32, 45.0, 90.0, -60.0, 180.0] {
            let yaw = yaw_deg.to_radians();
            let transform = Transform::from_rotation(Quat::from_rotation_y(0.0))
                .looking_to(dir_from_angle(yaw), Vec3::Y);
            let recovered = facing_angle(&transform);
            let diff = (dir_from_angle(recovered) - dir_from_angle(yaw)).length();
            assert!(diff < 1e-4, "yaw {} восстановился как {}", yaw, recovered);
        }
    }

    // Randomized sweep: инвариант количества точек держится на случайных
    // сценах (seeded ChaCha8 — прогоны воспроизводимы)
    #[test]
    fn test_random_scenes_vertex_count_invariant() {
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..50 {
            let sensor = FieldOfViewSensor {
                view_radius: 10.0,
                view_angle: rng.gen_range(0.3..3.0),
                mesh_resolution: rng.gen_range(2.0..20.0),
                edge_resolve_iterations: 4,
                edge_dst_threshold: 0.5,
                ..Default::default()
            };
            let walls = (0..rng.gen_range(0..4))
                .map(|_| Wall {
                    entity: wall_entity(),
                    z_plane: rng.gen_range(2.0..9.0),
                    x_min: rng.gen_range(-8.0..0.0),
                    x_max: rng.gen_range(0.0..8.0),
                })
                .collect();
            let scene = TestScene { spheres: vec![], walls };

            let points = build_view_points(&sensor, Vec3::ZERO, 0.0, &scene);

            let base = sensor.step_count() as usize + 1;
            // Каждый из step_count интервалов может вставить максимум 2 точки
            let max = base + 2 * sensor.step_count() as usize;
            assert!(points.len() >= base && points.len() <= max);
            // Все точки в пределах радиуса (с эпсилоном на пересечения)
            for point in &points {
                assert!(point.length() <= sensor.view_radius + 1e-3);
            }
        }
    }
}
