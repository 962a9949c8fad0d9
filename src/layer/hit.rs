//! Content bounds and point hit-testing over a layer tree.

use crate::document::model::{LayerContentDef, TrackMatteType};
use crate::foundation::core::{Point, Rect, map_point_inverted, map_rect, rect_contains};
use crate::layer::node::{LayerId, NodeKind};
use crate::layer::tree::LayerArena;

fn join(a: Rect, b: Rect) -> Rect {
    match (a.is_zero_area(), b.is_zero_area()) {
        (true, _) => b,
        (_, true) => a,
        _ => a.union(b),
    }
}

fn intersect(a: Rect, b: Rect) -> Rect {
    let r = a.intersect(b);
    if r.is_zero_area() { Rect::ZERO } else { r }
}

impl LayerArena {
    /// Bounds of the layer's content at the current frame, in layer space.
    pub(crate) fn measure_bounds(&self, id: LayerId) -> Rect {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Solid(s) => Rect::new(0.0, 0.0, f64::from(s.width), f64::from(s.height)),
            NodeKind::Image(i) => Rect::new(
                0.0,
                0.0,
                f64::from(i.default_image.width),
                f64::from(i.default_image.height),
            ),
            NodeKind::Text(_) | NodeKind::Plain => match &node.def.content {
                LayerContentDef::Text { bounds, .. } | LayerContentDef::Shape { bounds } => *bounds,
                _ => Rect::ZERO,
            },
            NodeKind::Composition(c) => {
                let mut bounds = Rect::ZERO;
                for &child in &c.children {
                    if self.node(child).visible {
                        bounds = join(bounds, self.child_bounds(child));
                    }
                }
                if c.has_clip() {
                    let clip = Rect::new(0.0, 0.0, f64::from(c.width), f64::from(c.height));
                    bounds = intersect(bounds, clip);
                }
                bounds
            }
        }
    }

    /// Bounds of `id` in its parent's space, cut by a non-inverted matte.
    fn child_bounds(&self, id: LayerId) -> Rect {
        let Some(transform) = self.get_transform(id) else {
            return Rect::ZERO;
        };
        let mut bounds = map_rect(transform.matrix, self.measure_bounds(id));
        let node = self.node(id);
        let kind = node.def.track_matte_type;
        if let Some(matte) = node.track_matte
            && kind != TrackMatteType::None
            && !kind.is_inverted()
        {
            let matte_bounds = self
                .get_transform(matte)
                .map_or(Rect::ZERO, |t| map_rect(t.matrix, self.measure_bounds(matte)));
            bounds = intersect(bounds, matte_bounds);
        }
        bounds
    }

    /// Bounds of `id` in the space of the topmost layer of its tree.
    pub(crate) fn global_bounds(&self, id: LayerId) -> Rect {
        let mut bounds = self.measure_bounds(id);
        let mut current = Some(id);
        while let Some(layer) = current {
            bounds = map_rect(self.total_matrix(layer), bounds);
            current = self.node(layer).parent;
        }
        bounds
    }

    fn matte_covers(&self, owner: LayerId, point: Point) -> bool {
        let node = self.node(owner);
        let kind = node.def.track_matte_type;
        let Some(matte) = node.track_matte.filter(|_| kind != TrackMatteType::None) else {
            return true;
        };
        let hit = self
            .get_transform(matte)
            .and_then(|t| map_point_inverted(t.matrix, point))
            .is_some_and(|p| rect_contains(self.measure_bounds(matte), p));
        hit != kind.is_inverted()
    }

    /// Collect leaf layers under `point`, given in `id`'s space, top-most first.
    pub(crate) fn layers_under_point(&self, id: LayerId, point: Point, out: &mut Vec<LayerId>) -> bool {
        let Some(c) = self.node(id).composition() else {
            return false;
        };
        if c.has_clip() {
            let clip = Rect::new(0.0, 0.0, f64::from(c.width), f64::from(c.height));
            if !rect_contains(clip, point) {
                return false;
            }
        }
        let mut found = false;
        for &child in c.children.iter().rev() {
            if !self.node(child).visible || !self.matte_covers(child, point) {
                continue;
            }
            let Some(local) = self
                .get_transform(child)
                .and_then(|t| map_point_inverted(t.matrix, point))
            else {
                continue;
            };
            if self.node(child).composition().is_some() {
                found |= self.layers_under_point(child, local, out);
            } else if rect_contains(self.measure_bounds(child), local) {
                out.push(child);
                found = true;
            }
        }
        found
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/hit.rs"]
mod tests;
