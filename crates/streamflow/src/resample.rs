//! Control-member resampling
//!
//! The high-resolution control forecast starts hourly (90 samples) and
//! then coarsens, while regular ensemble members run at a uniform coarser
//! step. Before the control can join the `[member][timestep]` matrix its
//! segments are stride-sampled down to the shared analysis window and
//! concatenated in chronological order.

/// Number of leading samples of the control series that are hourly.
const HOURLY_SEGMENT: usize = 90;

/// One-past-last index of the control's three-hourly segment.
const THREE_HOURLY_END: usize = 109;

/// The shared analysis window for an ensemble whose regular members have
/// `time_len` samples.
///
/// Known forecast layouts map 41- and 61-sample members to a 41-sample
/// window and 85- and 125-sample members to a 65-sample window; anything
/// else falls back to 40 samples.
pub fn analysis_window(time_len: usize) -> usize {
    match time_len {
        41 | 61 => 41,
        85 | 125 => 65,
        _ => 40,
    }
}

/// Resample the control series into an analysis window.
///
/// - window 65: every 3rd sample of the hourly segment, then the
///   remainder unchanged (three-hourly alignment).
/// - window 41: every 6th sample of the hourly segment, every 2nd of the
///   three-hourly segment, then the remainder unchanged (six-hourly
///   alignment).
/// - any other window: the leading `window` samples unchanged.
///
/// Concatenation preserves chronological order. Output length equals the
/// window when the control carries the full 125-sample layout.
pub fn resample_control_series(series: &[f64], window: usize) -> Vec<f64> {
    match window {
        65 => {
            let split = HOURLY_SEGMENT.min(series.len());
            let mut out: Vec<f64> = series[..split].iter().step_by(3).copied().collect();
            out.extend_from_slice(&series[split..]);
            out
        }
        41 => {
            let hourly_end = HOURLY_SEGMENT.min(series.len());
            let three_hourly_end = THREE_HOURLY_END.min(series.len());
            let mut out: Vec<f64> = series[..hourly_end].iter().step_by(6).copied().collect();
            out.extend(series[hourly_end..three_hourly_end].iter().step_by(2));
            out.extend_from_slice(&series[three_hourly_end..]);
            out
        }
        _ => series[..window.min(series.len())].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 125-sample control series whose value encodes its position.
    fn control_series() -> Vec<f64> {
        (0..125).map(|i| i as f64).collect()
    }

    #[test]
    fn test_window_lookup() {
        assert_eq!(analysis_window(41), 41);
        assert_eq!(analysis_window(61), 41);
        assert_eq!(analysis_window(85), 65);
        assert_eq!(analysis_window(125), 65);
        assert_eq!(analysis_window(17), 40);
    }

    #[test]
    fn test_control_to_65() {
        let out = resample_control_series(&control_series(), 65);
        assert_eq!(out.len(), 65);
        // hourly segment thinned to every 3rd sample
        assert_eq!(&out[..4], &[0.0, 3.0, 6.0, 9.0]);
        assert_eq!(out[29], 87.0);
        // coarse tail passes through untouched
        assert_eq!(out[30], 90.0);
        assert_eq!(out[64], 124.0);
    }

    #[test]
    fn test_control_to_41() {
        let out = resample_control_series(&control_series(), 41);
        assert_eq!(out.len(), 41);
        // hourly segment: every 6th of [0, 90)
        assert_eq!(&out[..3], &[0.0, 6.0, 12.0]);
        assert_eq!(out[14], 84.0);
        // three-hourly segment: every 2nd of [90, 109)
        assert_eq!(out[15], 90.0);
        assert_eq!(out[16], 92.0);
        assert_eq!(out[24], 108.0);
        // six-hourly tail unchanged
        assert_eq!(out[25], 109.0);
        assert_eq!(out[40], 124.0);
    }

    #[test]
    fn test_chronological_order() {
        for window in [41, 65] {
            let out = resample_control_series(&control_series(), window);
            assert!(
                out.windows(2).all(|w| w[0] < w[1]),
                "window {window} not chronological"
            );
        }
    }

    #[test]
    fn test_fallback_truncates() {
        let out = resample_control_series(&control_series(), 40);
        assert_eq!(out.len(), 40);
        assert_eq!(out[39], 39.0);
    }

    #[test]
    fn test_short_series_survives() {
        let short: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let out = resample_control_series(&short, 65);
        // 50 hourly samples thinned by 3 -> 17, no tail
        assert_eq!(out.len(), 17);
    }
}
