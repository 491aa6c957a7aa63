use image::Rgba;

// ============================================================================
// BLEND MODES – straight-alpha compositing used by every raster write
// ============================================================================

/// How a source pixel is combined with the destination pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// Source-over: the normal "paint on top" composite.
    #[default]
    Over,
    /// Destination-out: source alpha cuts a hole into the destination.
    /// Source colour channels are ignored.
    DestinationOut,
    /// Replace the destination outright.
    Copy,
}

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Composite `src` onto `dst` using `mode` (unpremultiplied RGBA8).
#[inline]
pub fn blend_pixel(dst: Rgba<u8>, src: Rgba<u8>, mode: BlendMode) -> Rgba<u8> {
    match mode {
        BlendMode::Copy => src,
        BlendMode::Over => over(dst, src),
        BlendMode::DestinationOut => destination_out(dst, src),
    }
}

#[inline]
fn over(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3];
    if sa == 255 {
        return src;
    }
    if sa == 0 {
        return dst;
    }
    let da = dst[3];
    if da == 0 {
        return src;
    }

    let sa_f = sa as f32 / 255.0;
    let da_f = da as f32 / 255.0;
    let out_a = sa_f + da_f * (1.0 - sa_f);
    // out_a > 0 here: both alphas are non-zero.
    let channel = |s: u8, d: u8| -> u8 {
        let v = (s as f32 * sa_f + d as f32 * da_f * (1.0 - sa_f)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba([
        channel(src[0], dst[0]),
        channel(src[1], dst[1]),
        channel(src[2], dst[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

#[inline]
fn destination_out(dst: Rgba<u8>, src: Rgba<u8>) -> Rgba<u8> {
    let sa = src[3];
    if sa == 0 {
        return dst;
    }
    if sa == 255 || dst[3] == 0 {
        return TRANSPARENT;
    }
    let keep = 1.0 - sa as f32 / 255.0;
    let a = (dst[3] as f32 * keep).round() as u8;
    if a == 0 {
        TRANSPARENT
    } else {
        Rgba([dst[0], dst[1], dst[2], a])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    #[test]
    fn opaque_over_replaces_destination() {
        assert_eq!(blend_pixel(BLUE, RED, BlendMode::Over), RED);
    }

    #[test]
    fn transparent_over_keeps_destination() {
        assert_eq!(blend_pixel(BLUE, TRANSPARENT, BlendMode::Over), BLUE);
    }

    #[test]
    fn half_alpha_over_opaque_mixes_channels() {
        let half_red = Rgba([255, 0, 0, 128]);
        let out = blend_pixel(BLUE, half_red, BlendMode::Over);
        assert_eq!(out[3], 255);
        assert!(out[0] > 120 && out[0] < 135);
        assert!(out[2] > 120 && out[2] < 135);
    }

    #[test]
    fn opaque_destination_out_clears_pixel() {
        assert_eq!(blend_pixel(BLUE, RED, BlendMode::DestinationOut), TRANSPARENT);
    }

    #[test]
    fn partial_destination_out_reduces_alpha_only() {
        let out = blend_pixel(BLUE, Rgba([9, 9, 9, 51]), BlendMode::DestinationOut);
        assert_eq!(out, Rgba([0, 0, 255, 204]));
    }
}
