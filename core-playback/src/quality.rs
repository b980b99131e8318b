//! Bitrate selection from network conditions.

use crate::models::StreamQuality;
use bridge_traits::{EffectiveType, NetworkInfo};

/// Bitrate ceiling (kbps) for the given network conditions.
///
/// The effective type sets the base ceiling; a low downlink estimate caps it
/// further.
pub fn target_bitrate(network: &NetworkInfo) -> u32 {
    let by_type = match network.effective_type {
        EffectiveType::Slow2g => 64,
        EffectiveType::Type2g => 128,
        EffectiveType::Type3g => 256,
        EffectiveType::Type4g => 320,
        EffectiveType::Unknown => 192,
    };

    if network.downlink_mbps < 1.0 {
        by_type.min(128)
    } else if network.downlink_mbps < 2.0 {
        by_type.min(192)
    } else {
        by_type
    }
}

/// Pick the quality to fetch.
///
/// Data saver forces the lowest bitrate. Otherwise the highest bitrate at or
/// below [`target_bitrate`] wins, falling back to the lowest available.
pub fn select_optimal_quality(
    qualities: &[StreamQuality],
    network: &NetworkInfo,
) -> Option<StreamQuality> {
    let mut sorted: Vec<&StreamQuality> = qualities.iter().collect();
    sorted.sort_by(|a, b| b.bitrate.cmp(&a.bitrate));

    let lowest = sorted.last().copied()?;
    if network.save_data {
        return Some(lowest.clone());
    }

    let target = target_bitrate(network);
    sorted
        .into_iter()
        .find(|q| q.bitrate <= target)
        .or(Some(lowest))
        .cloned()
}

/// Highest quality strictly below `current_bitrate`, `None` when already at
/// the bottom.
pub fn next_lower_quality(
    qualities: &[StreamQuality],
    current_bitrate: u32,
) -> Option<StreamQuality> {
    qualities
        .iter()
        .filter(|q| q.bitrate < current_bitrate)
        .max_by_key(|q| q.bitrate)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder() -> Vec<StreamQuality> {
        [320, 192, 128, 64]
            .into_iter()
            .map(|b| StreamQuality::new(b, "webm", format!("https://cdn/{b}")))
            .collect()
    }

    #[test]
    fn test_slow_3g_downlink_caps_to_128() {
        let network = NetworkInfo::new(EffectiveType::Type3g, 0.8, 300.0);
        let chosen = select_optimal_quality(&ladder(), &network).unwrap();
        assert_eq!(chosen.bitrate, 128);
    }

    #[test]
    fn test_fast_4g_takes_highest() {
        let network = NetworkInfo::new(EffectiveType::Type4g, 10.0, 50.0);
        assert_eq!(
            select_optimal_quality(&ladder(), &network).unwrap().bitrate,
            320
        );
    }

    #[test]
    fn test_save_data_takes_lowest() {
        let network = NetworkInfo::new(EffectiveType::Type4g, 10.0, 50.0).with_save_data(true);
        assert_eq!(
            select_optimal_quality(&ladder(), &network).unwrap().bitrate,
            64
        );
    }

    #[test]
    fn test_unknown_type_targets_192() {
        let network = NetworkInfo::new(EffectiveType::Unknown, 10.0, 0.0);
        assert_eq!(target_bitrate(&network), 192);
        assert_eq!(
            select_optimal_quality(&ladder(), &network).unwrap().bitrate,
            192
        );
    }

    #[test]
    fn test_nothing_under_target_falls_back_to_lowest() {
        let network = NetworkInfo::new(EffectiveType::Slow2g, 0.1, 2500.0);
        let qualities = vec![
            StreamQuality::new(256, "mp4", "a"),
            StreamQuality::new(160, "webm", "b"),
        ];
        assert_eq!(
            select_optimal_quality(&qualities, &network).unwrap().bitrate,
            160
        );
    }

    #[test]
    fn test_empty_list() {
        assert!(select_optimal_quality(&[], &NetworkInfo::default()).is_none());
    }

    #[test]
    fn test_next_lower_quality() {
        assert_eq!(next_lower_quality(&ladder(), 320).unwrap().bitrate, 192);
        assert_eq!(next_lower_quality(&ladder(), 100).unwrap().bitrate, 64);
        assert!(next_lower_quality(&ladder(), 64).is_none());
    }
}
