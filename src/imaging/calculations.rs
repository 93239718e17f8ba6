//! Resize policy engine.
//!
//! Turns one `resize` operation's options plus the source geometry into the
//! exact list of backend geometry calls. Everything here is pure and testable
//! without any image.
//!
//! Each [`ResizeMode`] plans through its own function with the same contract:
//!
//! | Mode | Plan |
//! |---|---|
//! | `pad` | scale by the smaller factor, then embed centred on a `w×h` canvas |
//! | `fill` | cover `w×h`, centre-crop (skipped when limited and no axis shrinks) |
//! | `fixed` | stretch to `w×h`, or scale along the single given axis |
//! | `mfit` | scale by the larger per-axis factor |
//! | default | scale by the smaller per-axis factor, never past the source |
//!
//! With no edge given, `p_` scales uniformly by `p/100`.

use super::params::{Background, ExtendStrategy, Interesting, Kernel, Rgb, SizeMode};
use crate::error::ProcessError;
use crate::options::{ResizeMode, ResizeOptions};

/// What the planner needs to know about the image being resized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceGeometry {
    pub width: u32,
    pub height: u32,
    pub has_alpha: bool,
}

/// One backend geometry call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GeometryStep {
    Resize {
        scale: f64,
        kernel: Kernel,
    },
    ResizeAxes {
        hscale: f64,
        vscale: f64,
        kernel: Kernel,
    },
    Thumbnail {
        width: u32,
        height: u32,
        interest: Interesting,
        size: SizeMode,
    },
    /// Embed on a `width × height` canvas, centred on whatever size the image
    /// has when this step runs.
    EmbedCentered {
        width: u32,
        height: u32,
        background: Background,
    },
}

/// Working copy of the requested box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TargetBox {
    w: u32,
    h: u32,
    l: u32,
    s: u32,
    limit: bool,
}

/// If either value is zero, both take the other's value.
pub fn coalesce<T: PartialEq + Default + Copy>(a: T, b: T) -> (T, T) {
    let zero = T::default();
    if a == zero {
        (b, b)
    } else if b == zero {
        (a, a)
    } else {
        (a, b)
    }
}

/// Derive `w`/`h` from the long and short edges when neither is set.
///
/// Landscape sources (height < width) take `w = l, h = s`; portrait and
/// square sources take `w = s, h = l`.
fn fill_missing_axis(target: &mut TargetBox, source: SourceGeometry) {
    if target.w > 0 || target.h > 0 {
        return;
    }
    if source.height < source.width {
        target.h = target.s;
        target.w = target.l;
    } else {
        target.h = target.l;
        target.w = target.s;
    }
}

/// Requested box is smaller than the source on at least one axis.
fn shrinks_any_axis(target: &TargetBox, source: SourceGeometry) -> bool {
    (target.w > 0 && target.w < source.width) || (target.h > 0 && target.h < source.height)
}

fn axis_scales(target: &TargetBox, source: SourceGeometry) -> (f64, f64) {
    (
        target.w as f64 / source.width as f64,
        target.h as f64 / source.height as f64,
    )
}

fn plan_pad(
    mut target: TargetBox,
    source: SourceGeometry,
    color: Option<Rgb>,
) -> Vec<GeometryStep> {
    fill_missing_axis(&mut target, source);
    (target.w, target.h) = coalesce(target.w, target.h);

    let (wscale, hscale) = axis_scales(&target, source);
    let scale = wscale.min(hscale);
    let background = match color {
        Some(c) => Background::Color(c),
        None if source.has_alpha => Background::Extend(ExtendStrategy::Background),
        None => Background::Extend(ExtendStrategy::White),
    };
    vec![
        GeometryStep::ResizeAxes {
            hscale: scale,
            vscale: scale,
            kernel: Kernel::Linear,
        },
        GeometryStep::EmbedCentered {
            width: target.w,
            height: target.h,
            background,
        },
    ]
}

fn plan_fill(mut target: TargetBox, source: SourceGeometry) -> Vec<GeometryStep> {
    fill_missing_axis(&mut target, source);
    (target.w, target.h) = coalesce(target.w, target.h);

    if !(shrinks_any_axis(&target, source) || !target.limit) {
        return Vec::new();
    }
    vec![GeometryStep::Thumbnail {
        width: target.w,
        height: target.h,
        interest: Interesting::Centre,
        size: SizeMode::Both,
    }]
}

fn plan_fixed(mut target: TargetBox, source: SourceGeometry) -> Vec<GeometryStep> {
    fill_missing_axis(&mut target, source);

    if target.w > 0 && target.h > 0 {
        let shrinks_both = target.w < source.width && target.h < source.height;
        if !(shrinks_both || !target.limit) {
            return Vec::new();
        }
        return vec![GeometryStep::Thumbnail {
            width: target.w,
            height: target.h,
            interest: Interesting::All,
            size: SizeMode::Force,
        }];
    }

    if !(shrinks_any_axis(&target, source) || !target.limit) {
        return Vec::new();
    }
    let (wscale, hscale) = axis_scales(&target, source);
    let (wscale, hscale) = coalesce(wscale, hscale);
    let scale = wscale.min(hscale);
    vec![GeometryStep::ResizeAxes {
        hscale: scale,
        vscale: scale,
        kernel: Kernel::Linear,
    }]
}

fn plan_mfit(mut target: TargetBox, source: SourceGeometry) -> Vec<GeometryStep> {
    (target.l, target.s) = coalesce(target.l, target.s);
    fill_missing_axis(&mut target, source);

    let inside_source = (target.w > 0 || target.h > 0)
        && target.w < source.width
        && target.h < source.height;
    if !(inside_source || !target.limit) {
        return Vec::new();
    }
    let (wscale, hscale) = axis_scales(&target, source);
    vec![GeometryStep::Resize {
        scale: wscale.max(hscale),
        kernel: Kernel::Linear,
    }]
}

fn plan_default(mut target: TargetBox, source: SourceGeometry) -> Vec<GeometryStep> {
    fill_missing_axis(&mut target, source);

    if !(shrinks_any_axis(&target, source) || !target.limit) {
        return Vec::new();
    }
    if target.w == 0 {
        target.w = source.width;
    }
    if target.h == 0 {
        target.h = source.height;
    }
    let (wscale, hscale) = axis_scales(&target, source);
    vec![GeometryStep::Resize {
        scale: wscale.min(hscale),
        kernel: Kernel::Linear,
    }]
}

impl ResizeMode {
    fn plan(self, opts: &ResizeOptions, source: SourceGeometry) -> Vec<GeometryStep> {
        let target = TargetBox {
            w: opts.w,
            h: opts.h,
            l: opts.l,
            s: opts.s,
            limit: opts.limit,
        };
        match self {
            ResizeMode::Pad => plan_pad(target, source, opts.color),
            ResizeMode::Fill => plan_fill(target, source),
            ResizeMode::Fixed => plan_fixed(target, source),
            ResizeMode::Mfit => plan_mfit(target, source),
            ResizeMode::Default => plan_default(target, source),
        }
    }
}

/// Plan the geometry calls for one resize.
///
/// An empty plan means the limit flag suppressed the resize. Fails with
/// `Param` when neither an edge nor a percentage is usable.
pub fn plan_resize(
    opts: &ResizeOptions,
    source: SourceGeometry,
) -> Result<Vec<GeometryStep>, ProcessError> {
    if source.width == 0 || source.height == 0 {
        return Err(ProcessError::param("resize: source image has no pixels"));
    }
    if opts.has_edges() {
        Ok(opts.mode.plan(opts, source))
    } else if opts.p > 0 {
        Ok(vec![GeometryStep::Resize {
            scale: opts.p as f64 / 100.0,
            kernel: Kernel::Linear,
        }])
    } else {
        Err(ProcessError::param("Missing required param"))
    }
}

/// Offset that centres `current` inside `target` (negative when it overflows).
pub fn centered_offset(target: u32, current: u32) -> i64 {
    (target as i64 - current as i64) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(width: u32, height: u32) -> SourceGeometry {
        SourceGeometry {
            width,
            height,
            has_alpha: false,
        }
    }

    fn opts(mode: ResizeMode) -> ResizeOptions {
        ResizeOptions {
            mode,
            ..ResizeOptions::default()
        }
    }

    fn single_scale(plan: &[GeometryStep]) -> f64 {
        match plan {
            [GeometryStep::Resize { scale, .. }] => *scale,
            [GeometryStep::ResizeAxes { hscale, vscale, .. }] => {
                assert_eq!(hscale, vscale);
                *hscale
            }
            other => panic!("expected a single resize, got {other:?}"),
        }
    }

    // =========================================================================
    // helpers
    // =========================================================================

    #[test]
    fn coalesce_copies_nonzero_value() {
        assert_eq!(coalesce(0, 5), (5, 5));
        assert_eq!(coalesce(7, 0), (7, 7));
        assert_eq!(coalesce(3, 4), (3, 4));
        assert_eq!(coalesce(0, 0), (0, 0));
        assert_eq!(coalesce(0.0, 0.25), (0.25, 0.25));
    }

    #[test]
    fn fill_missing_axis_landscape_uses_long_as_width() {
        let mut t = TargetBox {
            w: 0,
            h: 0,
            l: 300,
            s: 100,
            limit: true,
        };
        fill_missing_axis(&mut t, source(800, 600));
        assert_eq!((t.w, t.h), (300, 100));
    }

    #[test]
    fn fill_missing_axis_portrait_and_square_use_long_as_height() {
        let mut t = TargetBox {
            w: 0,
            h: 0,
            l: 300,
            s: 100,
            limit: true,
        };
        fill_missing_axis(&mut t, source(600, 600));
        assert_eq!((t.w, t.h), (100, 300));
    }

    #[test]
    fn fill_missing_axis_keeps_explicit_box() {
        let mut t = TargetBox {
            w: 50,
            h: 0,
            l: 300,
            s: 100,
            limit: true,
        };
        fill_missing_axis(&mut t, source(800, 600));
        assert_eq!((t.w, t.h), (50, 0));
    }

    #[test]
    fn centered_offset_truncates_toward_zero() {
        assert_eq!(centered_offset(200, 100), 50);
        assert_eq!(centered_offset(200, 199), 0);
        assert_eq!(centered_offset(100, 103), -1);
    }

    // =========================================================================
    // default mode
    // =========================================================================

    #[test]
    fn default_mode_takes_smaller_scale() {
        // 400x400, w200 h100 → scales 0.5 / 0.25 → 0.25
        let o = ResizeOptions {
            w: 200,
            h: 100,
            ..opts(ResizeMode::Default)
        };
        let plan = plan_resize(&o, source(400, 400)).unwrap();
        assert_eq!(
            plan,
            vec![GeometryStep::Resize {
                scale: 0.25,
                kernel: Kernel::Linear
            }]
        );
    }

    #[test]
    fn default_mode_missing_axis_uses_source_size() {
        let o = ResizeOptions {
            w: 200,
            ..opts(ResizeMode::Default)
        };
        // h defaults to 300 → hscale 1.0; w gives 0.5
        assert_eq!(single_scale(&plan_resize(&o, source(400, 300)).unwrap()), 0.5);
    }

    #[test]
    fn default_mode_limited_does_not_upscale() {
        let o = ResizeOptions {
            w: 800,
            h: 800,
            ..opts(ResizeMode::Default)
        };
        assert!(plan_resize(&o, source(400, 400)).unwrap().is_empty());
    }

    #[test]
    fn default_mode_unlimited_upscales() {
        let o = ResizeOptions {
            w: 800,
            limit: false,
            ..opts(ResizeMode::Default)
        };
        // h defaults to source height → min(2.0, 1.0)
        assert_eq!(single_scale(&plan_resize(&o, source(400, 400)).unwrap()), 1.0);
    }

    #[test]
    fn default_mode_from_long_edge() {
        let o = ResizeOptions {
            l: 200,
            ..opts(ResizeMode::Default)
        };
        // landscape 800x400: w = l = 200, h = s = 0 → h = 400 → min(0.25, 1.0)
        assert_eq!(single_scale(&plan_resize(&o, source(800, 400)).unwrap()), 0.25);
    }

    // =========================================================================
    // pad
    // =========================================================================

    #[test]
    fn pad_scales_then_embeds_with_color() {
        let white = Rgb::WHITE;
        let o = ResizeOptions {
            w: 200,
            h: 200,
            color: Some(white),
            ..opts(ResizeMode::Pad)
        };
        let plan = plan_resize(&o, source(400, 200)).unwrap();
        assert_eq!(
            plan,
            vec![
                GeometryStep::ResizeAxes {
                    hscale: 0.5,
                    vscale: 0.5,
                    kernel: Kernel::Linear
                },
                GeometryStep::EmbedCentered {
                    width: 200,
                    height: 200,
                    background: Background::Color(white)
                },
            ]
        );
    }

    #[test]
    fn pad_single_axis_makes_square_canvas() {
        let o = ResizeOptions {
            w: 100,
            ..opts(ResizeMode::Pad)
        };
        let plan = plan_resize(&o, source(400, 200)).unwrap();
        assert!(matches!(
            plan[1],
            GeometryStep::EmbedCentered {
                width: 100,
                height: 100,
                ..
            }
        ));
        // min(100/400, 100/200)
        assert!(matches!(plan[0], GeometryStep::ResizeAxes { hscale, .. } if hscale == 0.25));
    }

    #[test]
    fn pad_background_depends_on_alpha() {
        let o = ResizeOptions {
            w: 100,
            h: 100,
            ..opts(ResizeMode::Pad)
        };
        let opaque = plan_resize(&o, source(200, 200)).unwrap();
        assert!(matches!(
            opaque[1],
            GeometryStep::EmbedCentered {
                background: Background::Extend(ExtendStrategy::White),
                ..
            }
        ));

        let transparent = plan_resize(
            &o,
            SourceGeometry {
                width: 200,
                height: 200,
                has_alpha: true,
            },
        )
        .unwrap();
        assert!(matches!(
            transparent[1],
            GeometryStep::EmbedCentered {
                background: Background::Extend(ExtendStrategy::Background),
                ..
            }
        ));
    }

    #[test]
    fn pad_ignores_limit() {
        let o = ResizeOptions {
            w: 1000,
            h: 1000,
            ..opts(ResizeMode::Pad)
        };
        let plan = plan_resize(&o, source(100, 50)).unwrap();
        assert!(matches!(plan[0], GeometryStep::ResizeAxes { hscale, .. } if hscale == 10.0));
    }

    // =========================================================================
    // fill
    // =========================================================================

    #[test]
    fn fill_crops_to_exact_box() {
        let o = ResizeOptions {
            w: 100,
            h: 300,
            ..opts(ResizeMode::Fill)
        };
        assert_eq!(
            plan_resize(&o, source(400, 400)).unwrap(),
            vec![GeometryStep::Thumbnail {
                width: 100,
                height: 300,
                interest: Interesting::Centre,
                size: SizeMode::Both
            }]
        );
    }

    #[test]
    fn fill_limited_skips_when_box_covers_source() {
        let o = ResizeOptions {
            w: 500,
            h: 500,
            ..opts(ResizeMode::Fill)
        };
        assert!(plan_resize(&o, source(400, 400)).unwrap().is_empty());
    }

    #[test]
    fn fill_unlimited_always_runs() {
        let o = ResizeOptions {
            w: 500,
            h: 600,
            limit: false,
            ..opts(ResizeMode::Fill)
        };
        assert!(matches!(
            plan_resize(&o, source(400, 400)).unwrap()[..],
            [GeometryStep::Thumbnail {
                width: 500,
                height: 600,
                ..
            }]
        ));
    }

    #[test]
    fn fill_single_axis_is_square() {
        let o = ResizeOptions {
            h: 50,
            ..opts(ResizeMode::Fill)
        };
        assert!(matches!(
            plan_resize(&o, source(400, 400)).unwrap()[..],
            [GeometryStep::Thumbnail {
                width: 50,
                height: 50,
                ..
            }]
        ));
    }

    // =========================================================================
    // fixed
    // =========================================================================

    #[test]
    fn fixed_both_axes_forces_stretch() {
        let o = ResizeOptions {
            w: 100,
            h: 300,
            ..opts(ResizeMode::Fixed)
        };
        assert_eq!(
            plan_resize(&o, source(400, 400)).unwrap(),
            vec![GeometryStep::Thumbnail {
                width: 100,
                height: 300,
                interest: Interesting::All,
                size: SizeMode::Force
            }]
        );
    }

    #[test]
    fn fixed_both_axes_limited_needs_both_to_shrink() {
        let o = ResizeOptions {
            w: 100,
            h: 500,
            ..opts(ResizeMode::Fixed)
        };
        assert!(plan_resize(&o, source(400, 400)).unwrap().is_empty());
    }

    #[test]
    fn fixed_single_axis_scales_by_that_axis() {
        let o = ResizeOptions {
            h: 100,
            ..opts(ResizeMode::Fixed)
        };
        // wscale 0 inherits hscale 0.25
        assert_eq!(single_scale(&plan_resize(&o, source(800, 400)).unwrap()), 0.25);
    }

    #[test]
    fn fixed_single_axis_limited_skips_upscale() {
        let o = ResizeOptions {
            w: 900,
            ..opts(ResizeMode::Fixed)
        };
        assert!(plan_resize(&o, source(800, 400)).unwrap().is_empty());
    }

    // =========================================================================
    // mfit
    // =========================================================================

    #[test]
    fn mfit_takes_larger_scale() {
        let o = ResizeOptions {
            w: 200,
            h: 100,
            ..opts(ResizeMode::Mfit)
        };
        assert_eq!(single_scale(&plan_resize(&o, source(400, 400)).unwrap()), 0.5);
    }

    #[test]
    fn mfit_coalesces_edges() {
        let o = ResizeOptions {
            l: 100,
            ..opts(ResizeMode::Mfit)
        };
        // s inherits l → 100x100 box on a 400x200 source → max(0.25, 0.5)
        assert_eq!(single_scale(&plan_resize(&o, source(400, 200)).unwrap()), 0.5);
    }

    #[test]
    fn mfit_limited_needs_both_axes_inside_source() {
        let o = ResizeOptions {
            w: 200,
            h: 500,
            ..opts(ResizeMode::Mfit)
        };
        assert!(plan_resize(&o, source(400, 400)).unwrap().is_empty());

        let unlimited = ResizeOptions { limit: false, ..o };
        assert_eq!(
            single_scale(&plan_resize(&unlimited, source(400, 400)).unwrap()),
            1.25
        );
    }

    // =========================================================================
    // percent / errors
    // =========================================================================

    #[test]
    fn percent_scales_uniformly() {
        let o = ResizeOptions {
            p: 50,
            ..ResizeOptions::default()
        };
        assert_eq!(single_scale(&plan_resize(&o, source(400, 300)).unwrap()), 0.5);
    }

    #[test]
    fn percent_ignored_when_width_given() {
        // parse() zeroes p when w is set; the plan matches the w-only plan
        let with_w = ResizeOptions {
            w: 100,
            ..ResizeOptions::default()
        };
        assert_eq!(single_scale(&plan_resize(&with_w, source(400, 400)).unwrap()), 0.25);
    }

    #[test]
    fn nothing_usable_is_param_error() {
        let o = ResizeOptions::default();
        assert!(matches!(
            plan_resize(&o, source(400, 400)),
            Err(ProcessError::Param(_))
        ));
    }
}
