/// Output surface sizing relative to the container and the viewport

/// Share of the viewport used when the container is at least as wide as it
pub const VIEWPORT_FILL: f64 = 0.7;

/// Width at which the requested height is used unscaled
pub const REFERENCE_WIDTH: f64 = 600.0;

/// Surface size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

impl SurfaceSize {
    pub fn aspect(&self) -> f64 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Size in device pixels, never smaller than one pixel per axis
    pub fn device_pixels(&self, pixel_ratio: f64) -> (u32, u32) {
        let ratio = if pixel_ratio > 0.0 { pixel_ratio } else { 1.0 };
        (
            (self.width * ratio).round().max(1.0) as u32,
            (self.height * ratio).round().max(1.0) as u32,
        )
    }
}

/// Width used for a container: its own width while it fits in the viewport,
/// otherwise a fixed share of the viewport
pub fn surface_width(container_width: f64, viewport_width: f64) -> f64 {
    if container_width < viewport_width {
        container_width
    } else {
        viewport_width * VIEWPORT_FILL
    }
}

/// Initial surface size. When the width is clamped to the viewport, the
/// requested height is rescaled against [`REFERENCE_WIDTH`].
pub fn initial_size(container_width: f64, viewport_width: f64, requested_height: f64) -> SurfaceSize {
    if container_width < viewport_width {
        SurfaceSize {
            width: container_width,
            height: requested_height,
        }
    } else {
        let width = surface_width(container_width, viewport_width);
        SurfaceSize {
            width,
            height: requested_height * width / REFERENCE_WIDTH,
        }
    }
}

/// Size after a resize: width follows the policy, height stays fixed
pub fn resized(current: SurfaceSize, container_width: f64, viewport_width: f64) -> SurfaceSize {
    SurfaceSize {
        width: surface_width(container_width, viewport_width),
        height: current.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_narrow_container_keeps_height() {
        let size = initial_size(500.0, 1200.0, 400.0);
        assert_eq!(size, SurfaceSize { width: 500.0, height: 400.0 });
    }

    #[test]
    fn test_wide_container_is_clamped() {
        let size = initial_size(1500.0, 1000.0, 400.0);
        assert!((size.width - 700.0).abs() < 1e-9);
        assert!((size.height - 400.0 * 700.0 / 600.0).abs() < 1e-9);
    }

    #[test]
    fn test_equal_widths_are_clamped() {
        let size = initial_size(1000.0, 1000.0, 600.0);
        assert!((size.width - 700.0).abs() < 1e-9);
    }

    #[test]
    fn test_resize_keeps_height() {
        let start = initial_size(500.0, 1200.0, 400.0);
        let after = resized(start, 300.0, 1200.0);
        assert_eq!(after, SurfaceSize { width: 300.0, height: 400.0 });
    }

    #[test]
    fn test_device_pixels_scale_with_ratio() {
        let size = SurfaceSize { width: 300.0, height: 150.5 };
        assert_eq!(size.device_pixels(2.0), (600, 301));
        assert_eq!(size.device_pixels(0.0), (300, 151));
    }

    proptest! {
        #[test]
        fn prop_clamped_when_container_not_narrower(
            viewport in 1.0f64..4000.0,
            extra in 0.0f64..4000.0,
            height in 1.0f64..2000.0,
        ) {
            let size = initial_size(viewport + extra, viewport, height);
            let expected_width = VIEWPORT_FILL * viewport;
            prop_assert!((size.width - expected_width).abs() < 1e-9);
            prop_assert!((size.height - height * expected_width / REFERENCE_WIDTH).abs() < 1e-6);
        }

        #[test]
        fn prop_unchanged_when_container_narrower(
            viewport in 2.0f64..4000.0,
            share in 0.0f64..0.999,
            height in 1.0f64..2000.0,
        ) {
            let container = viewport * share;
            let size = initial_size(container, viewport, height);
            prop_assert_eq!(size.width, container);
            prop_assert_eq!(size.height, height);
        }
    }
}
