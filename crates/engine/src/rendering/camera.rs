use crate::geometry::{Rect, Vec2};
use crate::world::{Entity, EntityRegistry};

use super::{DrawCommand, DrawList, Viewport};

const MISSING_IMAGE_COLOR: [u8; 4] = [220, 220, 240, 255];

/// Screen offset for one frame. Derived from the focus entity every frame, never stored
/// across frames.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Camera {
    pub offset: Vec2,
}

impl Camera {
    pub fn focused_on(focus_footprint: Rect, viewport: Viewport) -> Self {
        let center = focus_footprint.center();
        Self {
            offset: Vec2::new(
                center.x - viewport.width as f32 * 0.5,
                center.y - viewport.height as f32 * 0.5,
            ),
        }
    }

    pub fn to_screen(&self, world: Rect) -> Rect {
        world.translated_by(self.offset)
    }
}

/// Appends the alive members of `group` to `out`, lowest z-layer first and, within a layer,
/// by ascending footprint center y. Ties keep group insertion order. Entities whose screen
/// footprint misses the viewport, or that have no sprite, are skipped. Returns the number
/// of entities drawn.
pub fn draw_entities(
    registry: &EntityRegistry,
    group: &str,
    camera: &Camera,
    viewport: Viewport,
    out: &mut DrawList,
) -> usize {
    let mut visible: Vec<&Entity> = registry
        .alive_in_group(group)
        .map(|(_, entity)| entity)
        .filter(|entity| entity.sprite.is_some())
        .collect();
    visible.sort_by(|a, b| {
        a.z.cmp(&b.z)
            .then_with(|| a.footprint.center().y.total_cmp(&b.footprint.center().y))
    });

    let screen = viewport.rect();
    let mut drawn = 0;
    for entity in visible {
        let Some(sprite) = entity.sprite.as_ref() else {
            continue;
        };
        let dest = camera.to_screen(entity.footprint);
        if !dest.intersects(&screen) {
            continue;
        }
        out.push(DrawCommand::Image {
            image: sprite.image.clone(),
            source: sprite.source,
            dest,
            fallback: MISSING_IMAGE_COLOR,
            silhouette: sprite.silhouette,
        });
        drawn += 1;
    }
    drawn
}
