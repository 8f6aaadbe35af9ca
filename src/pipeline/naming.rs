use crate::device::AssetKind;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Derives `<dir>/<timestamp ms>.<ext>` names.
///
/// Names handed out for the same millisecond get a `-<n>` suffix so shots that
/// complete within one millisecond never collide.
#[derive(Debug, Default)]
pub struct AssetNamer {
    last: Mutex<Option<(i64, u32)>>,
}

impl AssetNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_name(&self, timestamp: DateTime<Utc>, kind: AssetKind) -> String {
        let millis = timestamp.timestamp_millis();

        let sequence = {
            let mut last = self.last.lock();
            let sequence = match *last {
                Some((previous, sequence)) if previous == millis => sequence + 1,
                _ => 0,
            };
            *last = Some((millis, sequence));
            sequence
        };

        if sequence == 0 {
            format!("{}.{}", millis, kind.extension())
        } else {
            format!("{}-{}.{}", millis, sequence, kind.extension())
        }
    }

    pub fn path_in(&self, dir: &Path, timestamp: DateTime<Utc>, kind: AssetKind) -> PathBuf {
        dir.join(self.file_name(timestamp, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_name_is_millisecond_timestamp() {
        let namer = AssetNamer::new();
        let timestamp = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

        assert_eq!(
            namer.file_name(timestamp, AssetKind::Photo),
            "1700000000123.jpg"
        );
        assert_eq!(
            namer.path_in(Path::new("/data/app"), timestamp + chrono::Duration::milliseconds(1), AssetKind::Video),
            PathBuf::from("/data/app/1700000000124.mp4")
        );
    }

    #[test]
    fn test_same_millisecond_is_disambiguated() {
        let namer = AssetNamer::new();
        let timestamp = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let names: Vec<_> = (0..3)
            .map(|_| namer.file_name(timestamp, AssetKind::Photo))
            .collect();
        assert_eq!(
            names,
            vec![
                "1700000000000.jpg",
                "1700000000000-1.jpg",
                "1700000000000-2.jpg"
            ]
        );

        let later = timestamp + chrono::Duration::milliseconds(5);
        assert_eq!(namer.file_name(later, AssetKind::Photo), "1700000000005.jpg");
    }
}
