//! Scroll planning for paged capture

use crate::{Error, Result};

/// Compute the scroll offsets needed to cover a page of `total_height` with
/// viewports of `viewport_height`.
///
/// Stops are `0, V, 2V, ...` with the last one pulled back to `H - V` so the
/// final capture sits flush with the bottom of the page instead of running
/// past it. A page no taller than the viewport has the single stop `0`.
pub fn scroll_stops(total_height: u32, viewport_height: u32) -> Result<Vec<u32>> {
    if viewport_height == 0 {
        return Err(Error::InvalidMetrics("viewport height is zero".into()));
    }
    if total_height == 0 {
        return Err(Error::InvalidMetrics("page height is zero".into()));
    }

    let count = total_height.div_ceil(viewport_height);
    let mut stops: Vec<u32> = (0..count).map(|i| i * viewport_height).collect();
    if let Some(last) = stops.last_mut() {
        *last = total_height.saturating_sub(viewport_height);
    }
    Ok(stops)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_page_has_single_stop() {
        assert_eq!(scroll_stops(100, 100).unwrap(), vec![0]);
        assert_eq!(scroll_stops(40, 100).unwrap(), vec![0]);
    }

    #[test]
    fn last_stop_is_flush_with_bottom() {
        assert_eq!(scroll_stops(250, 100).unwrap(), vec![0, 100, 150]);
        assert_eq!(scroll_stops(300, 100).unwrap(), vec![0, 100, 200]);
        assert_eq!(scroll_stops(301, 100).unwrap(), vec![0, 100, 200, 201]);
    }

    #[test]
    fn stops_are_strictly_increasing() {
        for h in 1..500u32 {
            let stops = scroll_stops(h, 37).unwrap();
            assert!(stops.windows(2).all(|w| w[0] < w[1]), "h={}", h);
            let last = *stops.last().unwrap();
            assert_eq!(last, h.saturating_sub(37));
        }
    }

    #[test]
    fn zero_dimensions_are_rejected() {
        assert!(matches!(scroll_stops(0, 100), Err(Error::InvalidMetrics(_))));
        assert!(matches!(scroll_stops(100, 0), Err(Error::InvalidMetrics(_))));
    }
}
