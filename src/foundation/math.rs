pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// Premultiply straight-alpha RGBA8 pixels in place.
pub(crate) fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

/// Source-over composite of premultiplied `src` onto `dst`.
pub(crate) fn premul_over_in_place(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255 - sa;
        d[3] = s[3].saturating_add(mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            d[c] = s[c].saturating_add(mul_div255_u8(u16::from(d[c]), inv));
        }
    }
}

/// Scale premultiplied `src` by a per-pixel matte weight into `dst`.
///
/// `luma` selects the Rec.709-ish luma of the matte instead of its alpha.
pub(crate) fn matte_apply_rgba8_premul(
    src: &[u8],
    matte: &[u8],
    dst: &mut [u8],
    luma: bool,
    inverted: bool,
) {
    debug_assert_eq!(src.len(), matte.len());
    debug_assert_eq!(src.len(), dst.len());
    for ((s, m), d) in src
        .chunks_exact(4)
        .zip(matte.chunks_exact(4))
        .zip(dst.chunks_exact_mut(4))
    {
        let mut w = if luma {
            let r = u16::from(m[0]);
            let g = u16::from(m[1]);
            let b = u16::from(m[2]);
            ((r * 54 + g * 183 + b * 19 + 128) >> 8) as u8
        } else {
            m[3]
        };
        if inverted {
            w = 255 - w;
        }
        let w16 = u16::from(w);
        for c in 0..4 {
            d[c] = mul_div255_u8(u16::from(s[c]), w16);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
