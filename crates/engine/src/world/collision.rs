use crate::geometry::{Rect, Vec2};

use super::registry::{EntityHandle, EntityRegistry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Corrects `moved` against `obstacles` along one axis. `previous` is the hitbox before
/// this axis step; an obstacle lying wholly between `previous` and `moved` blocks as well,
/// so a fast mover cannot skip over it. Stops at the first blocking obstacle.
pub fn resolve_axis(
    previous: Rect,
    moved: Rect,
    axis: Axis,
    velocity: f32,
    obstacles: &[Rect],
) -> Option<Rect> {
    if velocity == 0.0 {
        return None;
    }

    let blocker = obstacles.iter().find(|obstacle| {
        if moved.intersects(obstacle) {
            return true;
        }
        match axis {
            Axis::Horizontal => {
                let lane = moved.top() <= obstacle.bottom() && obstacle.top() <= moved.bottom();
                lane && if velocity > 0.0 {
                    obstacle.left() > previous.right() && obstacle.left() <= moved.right()
                } else {
                    obstacle.right() < previous.left() && obstacle.right() >= moved.left()
                }
            }
            Axis::Vertical => {
                let lane = moved.left() <= obstacle.right() && obstacle.left() <= moved.right();
                lane && if velocity > 0.0 {
                    obstacle.top() > previous.bottom() && obstacle.top() <= moved.bottom()
                } else {
                    obstacle.bottom() < previous.top() && obstacle.bottom() >= moved.top()
                }
            }
        }
    })?;

    let mut corrected = moved;
    match (axis, velocity > 0.0) {
        (Axis::Horizontal, true) => corrected.set_right(blocker.left() - 1),
        (Axis::Horizontal, false) => corrected.set_left(blocker.right() + 1),
        (Axis::Vertical, true) => corrected.set_bottom(blocker.top() - 1),
        (Axis::Vertical, false) => corrected.set_top(blocker.bottom() + 1),
    }
    Some(corrected)
}

/// Moves the entity along `direction` (normalized here) at `speed` for `dt` seconds, X first
/// and then Y, each axis corrected against the hitboxes of `obstacle_group`. Returns false
/// when the handle is stale.
pub fn move_with_collisions(
    registry: &mut EntityRegistry,
    handle: EntityHandle,
    direction: Vec2,
    speed: f32,
    dt: f32,
    obstacle_group: &str,
) -> bool {
    let obstacles: Vec<Rect> = registry
        .alive_in_group(obstacle_group)
        .filter(|(other, _)| *other != handle)
        .map(|(_, entity)| entity.hitbox)
        .collect();
    let Some(entity) = registry.get_mut(handle) else {
        return false;
    };

    let direction = direction.normalized_or_zero();

    if direction.x != 0.0 {
        entity.position.x += direction.x * speed * dt;
        let previous = entity.hitbox;
        let moved = previous.with_center(Vec2::new(entity.position.x, previous.center().y));
        let moved = Rect { y: previous.y, ..moved };
        entity.set_hitbox(moved);
        if let Some(corrected) =
            resolve_axis(previous, moved, Axis::Horizontal, direction.x, &obstacles)
        {
            entity.set_hitbox(corrected);
            entity.position.x = corrected.center().x;
        }
    }

    if direction.y != 0.0 {
        entity.position.y += direction.y * speed * dt;
        let previous = entity.hitbox;
        let moved = previous.with_center(Vec2::new(previous.center().x, entity.position.y));
        let moved = Rect { x: previous.x, ..moved };
        entity.set_hitbox(moved);
        if let Some(corrected) =
            resolve_axis(previous, moved, Axis::Vertical, direction.y, &obstacles)
        {
            entity.set_hitbox(corrected);
            entity.position.y = corrected.center().y;
        }
    }

    true
}
