use crate::foundation::core::Affine;

/// How content is fitted into a target box.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleMode {
    /// Leave the content untouched.
    None,
    /// Stretch both axes independently to fill the target.
    Stretch,
    /// Scale uniformly to fit inside the target, centering the short axis.
    #[default]
    LetterBox,
    /// Scale uniformly to cover the target, cropping the long axis.
    Zoom,
}

/// Matrix that fits a `source` sized box into a `target` sized box.
///
/// Degenerate sizes produce the identity.
pub fn apply_scale_mode(
    mode: ScaleMode,
    source_width: i32,
    source_height: i32,
    target_width: i32,
    target_height: i32,
) -> Affine {
    if mode == ScaleMode::None
        || source_width <= 0
        || source_height <= 0
        || target_width <= 0
        || target_height <= 0
    {
        return Affine::IDENTITY;
    }
    let (sw, sh) = (f64::from(source_width), f64::from(source_height));
    let (tw, th) = (f64::from(target_width), f64::from(target_height));
    let scale_x = tw / sw;
    let scale_y = th / sh;
    match mode {
        ScaleMode::Stretch => Affine::scale_non_uniform(scale_x, scale_y),
        ScaleMode::Zoom => {
            let scale = scale_x.max(scale_y);
            let offset = if scale_x < scale_y {
                ((tw - sw * scale) * 0.5, 0.0)
            } else {
                (0.0, (th - sh * scale) * 0.5)
            };
            Affine::translate(offset) * Affine::scale(scale)
        }
        ScaleMode::LetterBox | ScaleMode::None => {
            let scale = scale_x.min(scale_y);
            let offset = if scale_x < scale_y {
                (0.0, (th - sh * scale) * 0.5)
            } else {
                ((tw - sw * scale) * 0.5, 0.0)
            };
            Affine::translate(offset) * Affine::scale(scale)
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/scale.rs"]
mod tests;
