//! 파일별 처리 크기 추적
//!
//! 경로마다 마지막으로 디코딩+병합에 성공한 파일 크기를 메모리에 보관합니다.
//! 재시작 시 상태가 사라지므로 모든 파일을 오프셋 0부터 다시 처리하며,
//! 이 경우 집계 파일에 중복 엔트리가 생길 수 있습니다.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// 경로 → 마지막 처리 크기(바이트) 매핑
///
/// 엔트리는 삭제되지 않으며, 로테이션으로 사라진 파일의 엔트리는 그대로 남습니다.
/// 한 경로의 크기는 절대 줄어들지 않습니다.
#[derive(Debug, Default)]
pub struct FileStateTracker {
    sizes: HashMap<PathBuf, u64>,
}

impl FileStateTracker {
    /// 빈 추적기를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 마지막 처리 크기를 반환합니다. 처음 보는 경로면 0입니다.
    pub fn get(&self, path: &Path) -> u64 {
        self.sizes.get(path).copied().unwrap_or(0)
    }

    /// 경로가 한 번이라도 처리되었는지 확인합니다.
    pub fn contains(&self, path: &Path) -> bool {
        self.sizes.contains_key(path)
    }

    /// 처리 크기를 기록합니다.
    ///
    /// 기존 값보다 작은 크기는 무시합니다. 실제로 갱신되었으면 `true`를 반환합니다.
    pub fn set(&mut self, path: &Path, size: u64) -> bool {
        match self.sizes.get_mut(path) {
            Some(current) if *current >= size => false,
            Some(current) => {
                *current = size;
                true
            }
            None => {
                self.sizes.insert(path.to_path_buf(), size);
                true
            }
        }
    }

    /// 추적 중인 파일 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// 추적 중인 파일이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_path_is_zero() {
        let tracker = FileStateTracker::new();
        let path = Path::new("/var/log/snort/snort.log.1");
        assert_eq!(tracker.get(path), 0);
        assert!(!tracker.contains(path));
        assert!(tracker.is_empty());
    }

    #[test]
    fn set_records_and_grows() {
        let mut tracker = FileStateTracker::new();
        let path = Path::new("/var/log/snort/snort.log.1");

        assert!(tracker.set(path, 500));
        assert_eq!(tracker.get(path), 500);
        assert!(tracker.set(path, 900));
        assert_eq!(tracker.get(path), 900);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn size_never_decreases() {
        let mut tracker = FileStateTracker::new();
        let path = Path::new("/var/log/snort/snort.log.1");

        tracker.set(path, 900);
        assert!(!tracker.set(path, 100));
        assert!(!tracker.set(path, 900));
        assert_eq!(tracker.get(path), 900);
    }

    #[test]
    fn paths_are_independent() {
        let mut tracker = FileStateTracker::new();
        tracker.set(Path::new("/var/log/snort/snort.log.1"), 10);
        tracker.set(Path::new("/var/log/snort/snort.log.2"), 20);
        assert_eq!(tracker.get(Path::new("/var/log/snort/snort.log.1")), 10);
        assert_eq!(tracker.get(Path::new("/var/log/snort/snort.log.2")), 20);
        assert_eq!(tracker.len(), 2);
    }
}
